use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use autolead_core::client::{Client, ClientPage, ClientQuery, ClientUpsert, LeadStatus, Pagination};
use autolead_core::repository::ClientRepository;
use autolead_core::StoreError;

pub struct StoreClientRepository {
    pool: PgPool,
}

impl StoreClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CLIENT_COLUMNS: &str = "id, name, phone, email, preferred_body_type, preferred_brand, \
     min_price, max_price, preferred_color, max_mileage, contact_method, notes, source, status, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: i64,
    name: String,
    phone: String,
    email: Option<String>,
    preferred_body_type: Option<String>,
    preferred_brand: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    preferred_color: Option<String>,
    max_mileage: Option<f64>,
    contact_method: String,
    notes: Option<String>,
    source: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    client: ClientRow,
    inserted: bool,
}

impl TryFrom<ClientRow> for Client {
    type Error = StoreError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Client {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            preferred_body_type: row.preferred_body_type,
            preferred_brand: row.preferred_brand,
            min_price: row.min_price,
            max_price: row.max_price,
            preferred_color: row.preferred_color,
            max_mileage: row.max_mileage,
            contact_method: row.contact_method.parse()?,
            notes: row.notes,
            source: row.source,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &'a ClientQuery) {
    qb.push(" WHERE TRUE");
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(source) = query.source.as_deref() {
        qb.push(" AND source = ").push_bind(source);
    }
}

#[async_trait]
impl ClientRepository for StoreClientRepository {
    async fn upsert_by_phone(&self, upsert: ClientUpsert) -> Result<(Client, bool), StoreError> {
        // Single statement so concurrent captures of one phone serialize on the unique index.
        // `xmax = 0` only holds for a freshly inserted tuple.
        let sql = format!(
            r#"
            INSERT INTO clients (
                phone, name, email, preferred_body_type, preferred_brand,
                min_price, max_price, preferred_color, max_mileage,
                contact_method, notes, source
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                      COALESCE($10, 'whatsapp'), $11, COALESCE($12, 'chatbot'))
            ON CONFLICT (phone) DO UPDATE SET
                name = $2,
                email = COALESCE($3, clients.email),
                preferred_body_type = COALESCE($4, clients.preferred_body_type),
                preferred_brand = COALESCE($5, clients.preferred_brand),
                min_price = COALESCE($6, clients.min_price),
                max_price = COALESCE($7, clients.max_price),
                preferred_color = COALESCE($8, clients.preferred_color),
                max_mileage = COALESCE($9, clients.max_mileage),
                contact_method = COALESCE($10, clients.contact_method),
                notes = COALESCE($11, clients.notes),
                source = COALESCE($12, clients.source),
                updated_at = NOW()
            RETURNING {}, (xmax = 0) AS inserted
            "#,
            CLIENT_COLUMNS
        );

        let row: UpsertRow = sqlx::query_as(&sql)
            .bind(&upsert.phone)
            .bind(&upsert.name)
            .bind(&upsert.email)
            .bind(&upsert.preferred_body_type)
            .bind(&upsert.preferred_brand)
            .bind(upsert.min_price)
            .bind(upsert.max_price)
            .bind(&upsert.preferred_color)
            .bind(upsert.max_mileage)
            .bind(upsert.contact_method.map(|m| m.as_str()))
            .bind(&upsert.notes)
            .bind(&upsert.source)
            .fetch_one(&self.pool)
            .await?;

        Ok((Client::try_from(row.client)?, row.inserted))
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, StoreError> {
        let sql = format!("SELECT {} FROM clients WHERE id = $1", CLIENT_COLUMNS);
        let row: Option<ClientRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Client::try_from).transpose()
    }

    async fn list_clients(&self, query: &ClientQuery) -> Result<ClientPage, StoreError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM clients");
        push_filters(&mut count_qb, query);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM clients", CLIENT_COLUMNS));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows: Vec<ClientRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let clients = rows
            .into_iter()
            .map(Client::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ClientPage {
            clients,
            pagination: Pagination::new(total, query.limit, query.offset),
        })
    }

    async fn update_status(
        &self,
        id: i64,
        status: LeadStatus,
        notes: Option<String>,
    ) -> Result<Option<Client>, StoreError> {
        let sql = format!(
            r#"
            UPDATE clients
            SET status = $2, notes = COALESCE($3, notes), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );
        let row: Option<ClientRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(notes)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Client::try_from).transpose()
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Client>, StoreError> {
        let columns = CLIENT_COLUMNS
            .split(", ")
            .map(|c| format!("c.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {}
            FROM client_interactions ci
            JOIN clients c ON c.id = ci.client_id
            WHERE ci.session_id = $1
            ORDER BY ci.created_at DESC
            LIMIT 1
            "#,
            columns
        );
        let row: Option<ClientRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Client::try_from).transpose()
    }
}
