use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use autolead_core::analytics::{
    Activity, BrandPreference, BudgetBucket, CarPerformanceReport, ChatbotReport,
    ClientPreferencesReport, ConversionFunnel, ConversionRate, DailySummary, DashboardReport,
    FlowStep, Granularity, LabelCount, LeadSummary, MessageFrequency, MissedOpportunity,
    PopularSearch, PreferenceCorrelation, PriceCompetitiveness, PricePreferences, SearchAnalytics,
    SessionLength, TermTrend, TimeCount, Timeframe, TrendsReport, TypePreference, ViewedCar,
};
use autolead_core::repository::AnalyticsRepository;
use autolead_core::StoreError;

/// Aggregate queries behind the analytics endpoints. Every window is the bound
/// parameter `$1` in days.
pub struct StoreAnalyticsRepository {
    pool: PgPool,
}

impl StoreAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn label_counts(&self, sql: &str, timeframe: Timeframe) -> Result<Vec<LabelCount>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(sql)
            .bind(timeframe.days())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(label, count)| LabelCount { label, count })
            .collect())
    }

    async fn time_counts(
        &self,
        sql: &str,
        timeframe: Timeframe,
        granularity: Granularity,
    ) -> Result<Vec<TimeCount>, StoreError> {
        let rows: Vec<(DateTime<Utc>, i64)> = sqlx::query_as(sql)
            .bind(timeframe.days())
            .bind(granularity.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(period, count)| TimeCount { period, count })
            .collect())
    }
}

#[async_trait]
impl AnalyticsRepository for StoreAnalyticsRepository {
    async fn dashboard(&self, timeframe: Timeframe) -> Result<DashboardReport, StoreError> {
        let days = timeframe.days();

        let (total_leads,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clients WHERE created_at >= NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .fetch_one(&self.pool)
        .await?;

        let leads_by_source = self
            .label_counts(
                r#"
                SELECT source, COUNT(*) FROM clients
                WHERE created_at >= NOW() - make_interval(days => $1)
                GROUP BY source ORDER BY 2 DESC, 1
                "#,
                timeframe,
            )
            .await?;

        let leads_by_status = self
            .label_counts(
                r#"
                SELECT status, COUNT(*) FROM clients
                WHERE created_at >= NOW() - make_interval(days => $1)
                GROUP BY status ORDER BY 2 DESC, 1
                "#,
                timeframe,
            )
            .await?;

        let most_searched_types = self
            .label_counts(
                r#"
                SELECT search_body_type, COUNT(*) FROM client_searches
                WHERE search_body_type IS NOT NULL
                  AND created_at >= NOW() - make_interval(days => $1)
                GROUP BY search_body_type ORDER BY 2 DESC, 1
                "#,
                timeframe,
            )
            .await?;

        let most_searched_brands = self
            .label_counts(
                r#"
                SELECT search_brand, COUNT(*) FROM client_searches
                WHERE search_brand IS NOT NULL
                  AND created_at >= NOW() - make_interval(days => $1)
                GROUP BY search_brand ORDER BY 2 DESC, 1
                LIMIT 10
                "#,
                timeframe,
            )
            .await?;

        let (avg_min_price, avg_max_price, lowest_min_price, highest_max_price): (
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
        ) = sqlx::query_as(
            r#"
            SELECT
                AVG(search_min_price)::FLOAT8,
                AVG(search_max_price)::FLOAT8,
                MIN(search_min_price),
                MAX(search_max_price)
            FROM client_searches
            WHERE (search_min_price IS NOT NULL OR search_max_price IS NOT NULL)
              AND created_at >= NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .fetch_one(&self.pool)
        .await?;

        let hourly: Vec<(DateTime<Utc>, i64)> = sqlx::query_as(
            r#"
            SELECT DATE_TRUNC('hour', created_at), COUNT(*)
            FROM client_interactions
            WHERE created_at >= NOW() - INTERVAL '24 hours'
            GROUP BY 1
            ORDER BY 1 DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let (new_leads, contacted, qualified, sold, lost): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'new'),
                    COUNT(*) FILTER (WHERE status = 'contacted'),
                    COUNT(*) FILTER (WHERE status = 'qualified'),
                    COUNT(*) FILTER (WHERE status = 'sold'),
                    COUNT(*) FILTER (WHERE status = 'lost')
                FROM clients
                WHERE created_at >= NOW() - make_interval(days => $1)
                "#,
            )
            .bind(days)
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardReport {
            timeframe: timeframe.label(),
            summary: LeadSummary {
                total_leads,
                leads_by_source,
                leads_by_status,
            },
            search_analytics: SearchAnalytics {
                most_searched_types,
                most_searched_brands,
                price_preferences: PricePreferences {
                    avg_min_price,
                    avg_max_price,
                    lowest_min_price,
                    highest_max_price,
                },
            },
            activity: Activity {
                recent_hourly: hourly
                    .into_iter()
                    .map(|(period, count)| TimeCount { period, count })
                    .collect(),
            },
            conversion_funnel: ConversionFunnel {
                new_leads,
                contacted,
                qualified,
                sold,
                lost,
            },
        })
    }

    async fn client_preferences(&self, timeframe: Timeframe) -> Result<ClientPreferencesReport, StoreError> {
        let days = timeframe.days();

        let types: Vec<(String, i64, Option<f64>, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT preferred_body_type, COUNT(*), AVG(max_price)::FLOAT8, AVG(max_mileage)::FLOAT8
            FROM clients
            WHERE preferred_body_type IS NOT NULL
              AND created_at >= NOW() - make_interval(days => $1)
            GROUP BY preferred_body_type
            ORDER BY 2 DESC, 1
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let brands: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT preferred_brand, COUNT(*), AVG(max_price)::FLOAT8
            FROM clients
            WHERE preferred_brand IS NOT NULL
              AND created_at >= NOW() - make_interval(days => $1)
            GROUP BY preferred_brand
            ORDER BY 2 DESC, 1
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let color_preferences = self
            .label_counts(
                r#"
                SELECT preferred_color, COUNT(*) FROM clients
                WHERE preferred_color IS NOT NULL
                  AND created_at >= NOW() - make_interval(days => $1)
                GROUP BY preferred_color ORDER BY 2 DESC, 1
                "#,
                timeframe,
            )
            .await?;

        let budgets: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT
                CASE
                    WHEN max_price < 200000 THEN 'Under 200K'
                    WHEN max_price < 400000 THEN '200K-400K'
                    WHEN max_price < 600000 THEN '400K-600K'
                    ELSE 'Over 600K'
                END AS budget_range,
                COUNT(*),
                AVG(max_price)::FLOAT8
            FROM clients
            WHERE max_price IS NOT NULL
              AND created_at >= NOW() - make_interval(days => $1)
            GROUP BY 1
            ORDER BY AVG(max_price)
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let correlation: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT c.preferred_body_type, cs.search_body_type, COUNT(*)
            FROM clients c
            JOIN client_searches cs ON c.id = cs.client_id
            WHERE c.preferred_body_type IS NOT NULL
              AND cs.search_body_type IS NOT NULL
              AND c.created_at >= NOW() - make_interval(days => $1)
            GROUP BY c.preferred_body_type, cs.search_body_type
            ORDER BY 3 DESC, 1, 2
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(ClientPreferencesReport {
            timeframe: timeframe.label(),
            vehicle_type_preferences: types
                .into_iter()
                .map(|(preferred_body_type, client_count, avg_budget, avg_mileage_tolerance)| {
                    TypePreference {
                        preferred_body_type,
                        client_count,
                        avg_budget,
                        avg_mileage_tolerance,
                    }
                })
                .collect(),
            brand_preferences: brands
                .into_iter()
                .map(|(preferred_brand, client_count, avg_budget)| BrandPreference {
                    preferred_brand,
                    client_count,
                    avg_budget,
                })
                .collect(),
            color_preferences,
            budget_analysis: budgets
                .into_iter()
                .map(|(budget_range, client_count, avg_budget)| BudgetBucket {
                    budget_range,
                    client_count,
                    avg_budget,
                })
                .collect(),
            preference_search_correlation: correlation
                .into_iter()
                .map(|(preferred_body_type, search_body_type, correlation_count)| {
                    PreferenceCorrelation {
                        preferred_body_type,
                        search_body_type,
                        correlation_count,
                    }
                })
                .collect(),
        })
    }

    async fn car_performance(&self, timeframe: Timeframe) -> Result<CarPerformanceReport, StoreError> {
        let days = timeframe.days();

        let viewed: Vec<(i64, String, String, i32, Option<String>, f64, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.brand, c.model, c.year, c.body_type, c.price, COUNT(cv.id)
            FROM cars c
            LEFT JOIN car_views cv
              ON c.id = cv.car_id
             AND cv.created_at >= NOW() - make_interval(days => $1)
            GROUP BY c.id, c.brand, c.model, c.year, c.body_type, c.price
            ORDER BY 7 DESC, c.id
            LIMIT 20
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let missed: Vec<(i64, String, String, i32, Option<String>, f64, i64, i64)> =
            sqlx::query_as(
                r#"
                SELECT
                    c.id, c.brand, c.model, c.year, c.body_type, c.price,
                    COUNT(cs.id) AS matching_searches,
                    COALESCE(v.view_count, 0) AS actual_views
                FROM cars c
                JOIN client_searches cs ON (
                    (cs.search_body_type IS NULL OR c.body_type = cs.search_body_type) AND
                    (cs.search_brand IS NULL OR LOWER(c.brand) LIKE LOWER('%' || cs.search_brand || '%')) AND
                    (cs.search_max_price IS NULL OR c.price <= cs.search_max_price) AND
                    (cs.search_min_price IS NULL OR c.price >= cs.search_min_price) AND
                    (cs.search_max_mileage IS NULL OR c.mileage <= cs.search_max_mileage)
                )
                LEFT JOIN (
                    SELECT car_id, COUNT(*) AS view_count
                    FROM car_views
                    WHERE created_at >= NOW() - make_interval(days => $1)
                    GROUP BY car_id
                ) v ON c.id = v.car_id
                WHERE cs.created_at >= NOW() - make_interval(days => $1)
                  AND c.available = TRUE
                GROUP BY c.id, c.brand, c.model, c.year, c.body_type, c.price, v.view_count
                HAVING COUNT(cs.id) > COALESCE(v.view_count, 0)
                ORDER BY (COUNT(cs.id) - COALESCE(v.view_count, 0)) DESC, c.id
                LIMIT 10
                "#,
            )
            .bind(days)
            .fetch_all(&self.pool)
            .await?;

        let competitiveness: Vec<(Option<String>, String, f64, f64, f64, i64, i64)> =
            sqlx::query_as(
                r#"
                SELECT
                    c.body_type,
                    c.brand,
                    AVG(c.price)::FLOAT8,
                    MIN(c.price),
                    MAX(c.price),
                    COUNT(*),
                    COALESCE(SUM(v.view_count), 0)::BIGINT
                FROM cars c
                LEFT JOIN (
                    SELECT car_id, COUNT(*) AS view_count
                    FROM car_views
                    WHERE created_at >= NOW() - make_interval(days => $1)
                    GROUP BY car_id
                ) v ON c.id = v.car_id
                WHERE c.available = TRUE
                GROUP BY c.body_type, c.brand
                ORDER BY c.body_type, 3
                "#,
            )
            .bind(days)
            .fetch_all(&self.pool)
            .await?;

        Ok(CarPerformanceReport {
            timeframe: timeframe.label(),
            most_viewed_cars: viewed
                .into_iter()
                .map(|(id, brand, model, year, body_type, price, view_count)| ViewedCar {
                    id,
                    brand,
                    model,
                    year,
                    body_type,
                    price,
                    view_count,
                })
                .collect(),
            missed_opportunities: missed
                .into_iter()
                .map(
                    |(id, brand, model, year, body_type, price, matching_searches, actual_views)| {
                        MissedOpportunity {
                            id,
                            brand,
                            model,
                            year,
                            body_type,
                            price,
                            matching_searches,
                            actual_views,
                        }
                    },
                )
                .collect(),
            price_competitiveness: competitiveness
                .into_iter()
                .map(
                    |(body_type, brand, avg_price, min_price, max_price, inventory_count, total_views)| {
                        PriceCompetitiveness {
                            body_type,
                            brand,
                            avg_price,
                            min_price,
                            max_price,
                            inventory_count,
                            total_views,
                        }
                    },
                )
                .collect(),
        })
    }

    async fn chatbot_effectiveness(&self, timeframe: Timeframe) -> Result<ChatbotReport, StoreError> {
        let days = timeframe.days();

        let flow: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT interaction_type, COUNT(*), COUNT(DISTINCT session_id)
            FROM client_interactions
            WHERE created_at >= NOW() - make_interval(days => $1)
            GROUP BY interaction_type
            ORDER BY 2 DESC, 1
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let sessions: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                session_id,
                COUNT(*),
                EXTRACT(EPOCH FROM MAX(created_at) - MIN(created_at))::BIGINT
            FROM client_interactions
            WHERE created_at >= NOW() - make_interval(days => $1)
            GROUP BY session_id
            ORDER BY 2 DESC, 1
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let (sessions_with_lead,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT session_id)
            FROM client_interactions
            WHERE client_id IS NOT NULL
              AND created_at >= NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .fetch_one(&self.pool)
        .await?;

        let messages: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT user_message, COUNT(*)
            FROM client_interactions
            WHERE user_message IS NOT NULL
              AND LENGTH(user_message) > 5
              AND created_at >= NOW() - make_interval(days => $1)
            GROUP BY user_message
            ORDER BY 2 DESC, 1
            LIMIT 20
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(ChatbotReport::assemble(
            timeframe,
            flow.into_iter()
                .map(|(interaction_type, interaction_count, unique_sessions)| FlowStep {
                    interaction_type,
                    interaction_count,
                    unique_sessions,
                })
                .collect(),
            sessions
                .into_iter()
                .map(|(session_id, interaction_count, session_duration_seconds)| SessionLength {
                    session_id,
                    interaction_count,
                    session_duration_seconds,
                })
                .collect(),
            sessions_with_lead,
            messages
                .into_iter()
                .map(|(user_message, frequency)| MessageFrequency { user_message, frequency })
                .collect(),
        ))
    }

    async fn trends(&self, timeframe: Timeframe, granularity: Granularity) -> Result<TrendsReport, StoreError> {
        let leads_over_time = self
            .time_counts(
                r#"
                SELECT DATE_TRUNC($2, created_at), COUNT(*)
                FROM clients
                WHERE created_at >= NOW() - make_interval(days => $1)
                GROUP BY 1 ORDER BY 1
                "#,
                timeframe,
                granularity,
            )
            .await?;

        let searches_over_time = self
            .time_counts(
                r#"
                SELECT DATE_TRUNC($2, created_at), COUNT(*)
                FROM client_searches
                WHERE created_at >= NOW() - make_interval(days => $1)
                GROUP BY 1 ORDER BY 1
                "#,
                timeframe,
                granularity,
            )
            .await?;

        let terms: Vec<(DateTime<Utc>, String, i64)> = sqlx::query_as(
            r#"
            SELECT DATE_TRUNC($2, created_at), search_body_type, COUNT(*)
            FROM client_searches
            WHERE search_body_type IS NOT NULL
              AND created_at >= NOW() - make_interval(days => $1)
            GROUP BY 1, 2
            ORDER BY 1, 3 DESC, 2
            "#,
        )
        .bind(timeframe.days())
        .bind(granularity.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(TrendsReport {
            timeframe: timeframe.label(),
            granularity,
            leads_over_time,
            searches_over_time,
            search_term_trends: terms
                .into_iter()
                .map(|(period, search_body_type, search_count)| TermTrend {
                    period,
                    search_body_type,
                    search_count,
                })
                .collect(),
        })
    }

    async fn daily_summary(&self, timeframe: Timeframe) -> Result<DailySummary, StoreError> {
        let (new_leads, total_searches, total_views, unique_sessions): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM clients
                      WHERE created_at >= NOW() - make_interval(days => $1)),
                    (SELECT COUNT(*) FROM client_searches
                      WHERE created_at >= NOW() - make_interval(days => $1)),
                    (SELECT COUNT(*) FROM car_views
                      WHERE created_at >= NOW() - make_interval(days => $1)),
                    (SELECT COUNT(DISTINCT session_id) FROM client_interactions
                      WHERE created_at >= NOW() - make_interval(days => $1))
                "#,
            )
            .bind(timeframe.days())
            .fetch_one(&self.pool)
            .await?;

        Ok(DailySummary {
            new_leads,
            total_searches,
            total_views,
            unique_sessions,
        })
    }

    async fn popular_searches(&self, timeframe: Timeframe) -> Result<Vec<PopularSearch>, StoreError> {
        let rows: Vec<(Option<String>, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT search_body_type, search_brand, COUNT(*)
            FROM client_searches
            WHERE created_at >= NOW() - make_interval(days => $1)
              AND (search_body_type IS NOT NULL OR search_brand IS NOT NULL)
            GROUP BY search_body_type, search_brand
            ORDER BY 3 DESC, 1, 2
            LIMIT 10
            "#,
        )
        .bind(timeframe.days())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(search_body_type, search_brand, search_count)| PopularSearch {
                search_body_type,
                search_brand,
                search_count,
            })
            .collect())
    }

    async fn conversion_rate(&self, timeframe: Timeframe) -> Result<ConversionRate, StoreError> {
        let (total, converted): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(DISTINCT session_id),
                COUNT(DISTINCT session_id) FILTER (WHERE client_id IS NOT NULL)
            FROM client_interactions
            WHERE created_at >= NOW() - make_interval(days => $1)
            "#,
        )
        .bind(timeframe.days())
        .fetch_one(&self.pool)
        .await?;

        Ok(ConversionRate::new(total, converted))
    }
}
