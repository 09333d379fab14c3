use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use autolead_core::inventory::{
    BuyingPriceStats, DiscountCandidate, RotationEntry, SaleRecord, SalesPeriod, VehicleKey,
};
use autolead_core::repository::InventoryRepository;
use autolead_core::StoreError;

pub struct StoreInventoryRepository {
    pool: PgPool,
}

impl StoreInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SaleRow {
    brand: String,
    model: String,
    price: f64,
    sale_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RotationRow {
    brand: String,
    model: String,
    year: i32,
    avg_days_in_inventory: f64,
    total_sold: i64,
}

#[derive(sqlx::FromRow)]
struct DiscountRow {
    id: i64,
    brand: String,
    model: String,
    year: i32,
    price: f64,
    purchase_date: DateTime<Utc>,
    days_in_inventory: i64,
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    avg_sale_price: Option<f64>,
    avg_days_to_sell: Option<f64>,
}

#[async_trait]
impl InventoryRepository for StoreInventoryRepository {
    async fn sales_in_period(&self, period: SalesPeriod) -> Result<Vec<SaleRecord>, StoreError> {
        let rows: Vec<SaleRow> = sqlx::query_as(
            r#"
            SELECT c.brand, c.model, c.price, s.sale_date
            FROM sales s
            JOIN cars c ON s.car_id = c.id
            WHERE s.sale_date >= NOW() - make_interval(months => $1)
            ORDER BY s.sale_date, s.id
            "#,
        )
        .bind(period.months())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SaleRecord {
                brand: r.brand,
                model: r.model,
                price: r.price,
                sale_date: r.sale_date,
            })
            .collect())
    }

    async fn rotation(&self) -> Result<Vec<RotationEntry>, StoreError> {
        let rows: Vec<RotationRow> = sqlx::query_as(
            r#"
            SELECT
                c.brand,
                c.model,
                c.year,
                AVG(EXTRACT(DAY FROM s.sale_date - c.purchase_date))::FLOAT8 AS avg_days_in_inventory,
                COUNT(s.id) AS total_sold
            FROM sales s
            JOIN cars c ON s.car_id = c.id
            WHERE c.purchase_date IS NOT NULL
            GROUP BY c.brand, c.model, c.year
            ORDER BY avg_days_in_inventory ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RotationEntry {
                brand: r.brand,
                model: r.model,
                year: r.year,
                avg_days_in_inventory: r.avg_days_in_inventory,
                total_sold: r.total_sold,
            })
            .collect())
    }

    async fn discount_candidates(&self, threshold_days: i32) -> Result<Vec<DiscountCandidate>, StoreError> {
        let rows: Vec<DiscountRow> = sqlx::query_as(
            r#"
            SELECT
                c.id,
                c.brand,
                c.model,
                c.year,
                c.price,
                c.purchase_date,
                EXTRACT(DAY FROM NOW() - c.purchase_date)::BIGINT AS days_in_inventory
            FROM cars c
            WHERE c.available = TRUE
              AND c.purchase_date IS NOT NULL
              AND (NOW() - c.purchase_date) > make_interval(days => $1)
            ORDER BY days_in_inventory DESC
            "#,
        )
        .bind(threshold_days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DiscountCandidate {
                id: r.id,
                brand: r.brand,
                model: r.model,
                year: r.year,
                price: r.price,
                purchase_date: r.purchase_date,
                days_in_inventory: r.days_in_inventory,
            })
            .collect())
    }

    async fn buying_price_stats(&self, key: &VehicleKey) -> Result<Option<BuyingPriceStats>, StoreError> {
        let row: Option<StatsRow> = sqlx::query_as(
            r#"
            SELECT
                AVG(s.sale_price)::FLOAT8 AS avg_sale_price,
                AVG(EXTRACT(DAY FROM s.sale_date - c.purchase_date))::FLOAT8 AS avg_days_to_sell
            FROM sales s
            JOIN cars c ON s.car_id = c.id
            WHERE c.brand = $1 AND c.model = $2 AND c.year = $3
            GROUP BY c.brand, c.model, c.year
            "#,
        )
        .bind(&key.brand)
        .bind(&key.model)
        .bind(key.year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            r.avg_sale_price.map(|avg_sale_price| BuyingPriceStats {
                avg_sale_price,
                avg_days_to_sell: r.avg_days_to_sell,
            })
        }))
    }

    async fn avg_days_in_inventory(&self, key: &VehicleKey) -> Result<Option<f64>, StoreError> {
        let (avg_days,): (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT AVG(EXTRACT(DAY FROM s.sale_date - c.purchase_date))::FLOAT8
            FROM sales s
            JOIN cars c ON s.car_id = c.id
            WHERE c.brand = $1 AND c.model = $2 AND c.year = $3
            "#,
        )
        .bind(&key.brand)
        .bind(&key.model)
        .bind(key.year)
        .fetch_one(&self.pool)
        .await?;

        Ok(avg_days)
    }
}
