use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use autolead_core::car::Car;
use autolead_core::repository::{CarRepository, SearchLogRepository};
use autolead_core::search::{CarFilter, NewCarView, NewSearchLog};
use autolead_core::StoreError;

const CAR_COLUMNS: &str = "id, brand, model, year, body_type, color, mileage, price, fuel_type, \
     transmission, engine_size, doors, description, image_url, available, purchase_date";

#[derive(sqlx::FromRow)]
struct CarRow {
    id: i64,
    brand: String,
    model: String,
    year: i32,
    body_type: Option<String>,
    color: Option<String>,
    mileage: Option<i32>,
    price: f64,
    fuel_type: Option<String>,
    transmission: Option<String>,
    engine_size: Option<f64>,
    doors: Option<i32>,
    description: Option<String>,
    image_url: Option<String>,
    available: bool,
    purchase_date: Option<DateTime<Utc>>,
}

impl From<CarRow> for Car {
    fn from(row: CarRow) -> Self {
        Self {
            id: row.id,
            brand: row.brand,
            model: row.model,
            year: row.year,
            body_type: row.body_type,
            color: row.color,
            mileage: row.mileage,
            price: row.price,
            fuel_type: row.fuel_type,
            transmission: row.transmission,
            engine_size: row.engine_size,
            doors: row.doors,
            description: row.description,
            image_url: row.image_url,
            available: row.available,
            purchase_date: row.purchase_date,
        }
    }
}

/// Appends one bound SQL clause per filter.
pub(crate) fn push_car_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filters: &'a [CarFilter]) {
    for filter in filters {
        match filter {
            CarFilter::BodyType(body_type) => {
                qb.push(" AND body_type = ").push_bind(body_type.as_str());
            }
            CarFilter::BrandContains(brand) => {
                qb.push(" AND LOWER(brand) LIKE LOWER(")
                    .push_bind(like_pattern(brand))
                    .push(")");
            }
            CarFilter::ColorContains(color) => {
                qb.push(" AND LOWER(color) LIKE LOWER(")
                    .push_bind(like_pattern(color))
                    .push(")");
            }
            CarFilter::MinPrice(min) => {
                qb.push(" AND price >= ").push_bind(*min);
            }
            CarFilter::MaxPrice(max) => {
                qb.push(" AND price <= ").push_bind(*max);
            }
            CarFilter::MaxMileage(max) => {
                qb.push(" AND mileage <= ").push_bind(*max);
            }
        }
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct StoreCarRepository {
    pool: PgPool,
}

impl StoreCarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CarRepository for StoreCarRepository {
    async fn list_available(&self) -> Result<Vec<Car>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cars WHERE available = TRUE ORDER BY brand, model",
            CAR_COLUMNS
        );
        let rows: Vec<CarRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Car::from).collect())
    }

    async fn get_available(&self, id: i64) -> Result<Option<Car>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cars WHERE id = $1 AND available = TRUE",
            CAR_COLUMNS
        );
        let row: Option<CarRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Car::from))
    }

    async fn search(&self, filters: &[CarFilter], limit: i64) -> Result<Vec<Car>, StoreError> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM cars WHERE available = TRUE",
            CAR_COLUMNS
        ));
        push_car_filters(&mut qb, filters);
        qb.push(" ORDER BY price ASC, id ASC LIMIT ").push_bind(limit.max(0));

        let rows: Vec<CarRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Car::from).collect())
    }
}

pub struct StoreSearchLogRepository {
    pool: PgPool,
}

impl StoreSearchLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchLogRepository for StoreSearchLogRepository {
    async fn log_search(&self, search: NewSearchLog, views: Vec<NewCarView>) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let criteria = &search.criteria;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO client_searches (
                client_id, session_id, search_body_type, search_brand,
                search_min_price, search_max_price, search_color,
                search_max_mileage, results_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(search.client_id)
        .bind(&search.session_id)
        .bind(criteria.body_type.map(|b| b.as_str()))
        .bind(criteria.brand.as_deref().filter(|s| !s.is_empty()))
        .bind(criteria.min_price.filter(|v| *v != 0.0))
        .bind(criteria.max_price.filter(|v| *v != 0.0))
        .bind(criteria.color.as_deref().filter(|s| !s.is_empty()))
        .bind(criteria.max_mileage.filter(|v| *v != 0.0))
        .bind(search.results_count)
        .fetch_one(&mut *tx)
        .await?;

        for view in &views {
            sqlx::query(
                "INSERT INTO car_views (car_id, client_id, session_id, view_source) VALUES ($1, $2, $3, $4)",
            )
            .bind(view.car_id)
            .bind(view.client_id)
            .bind(&view.session_id)
            .bind(view.source.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn record_view(&self, view: NewCarView) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO car_views (car_id, client_id, session_id, view_source) VALUES ($1, $2, $3, $4)",
        )
        .bind(view.car_id)
        .bind(view.client_id)
        .bind(&view.session_id)
        .bind(view.source.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_session_to_client(&self, session_id: &str, client_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for table in ["client_interactions", "client_searches", "car_views"] {
            let sql = format!(
                "UPDATE {} SET client_id = $1 WHERE session_id = $2 AND client_id IS NULL",
                table
            );
            sqlx::query(&sql)
                .bind(client_id)
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
