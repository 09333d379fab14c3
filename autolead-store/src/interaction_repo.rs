use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use autolead_core::interaction::{Interaction, NewInteraction};
use autolead_core::repository::InteractionRepository;
use autolead_core::StoreError;

pub struct StoreInteractionRepository {
    pool: PgPool,
}

impl StoreInteractionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InteractionRow {
    id: i64,
    client_id: Option<i64>,
    session_id: String,
    interaction_type: String,
    user_message: Option<String>,
    bot_response: Option<String>,
    extracted_data: Option<Value>,
    created_at: DateTime<Utc>,
}

impl From<InteractionRow> for Interaction {
    fn from(row: InteractionRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            session_id: row.session_id,
            interaction_type: row.interaction_type,
            user_message: row.user_message,
            bot_response: row.bot_response,
            extracted_data: row.extracted_data,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl InteractionRepository for StoreInteractionRepository {
    async fn log_interaction(&self, interaction: NewInteraction) -> Result<Interaction, StoreError> {
        let row: InteractionRow = sqlx::query_as(
            r#"
            INSERT INTO client_interactions (
                client_id, session_id, interaction_type, user_message, bot_response, extracted_data
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, client_id, session_id, interaction_type, user_message, bot_response,
                      extracted_data, created_at
            "#,
        )
        .bind(interaction.client_id)
        .bind(&interaction.session_id)
        .bind(&interaction.interaction_type)
        .bind(&interaction.user_message)
        .bind(&interaction.bot_response)
        .bind(&interaction.extracted_data)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_for_client(&self, client_id: i64) -> Result<Vec<Interaction>, StoreError> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            r#"
            SELECT id, client_id, session_id, interaction_type, user_message, bot_response,
                   extracted_data, created_at
            FROM client_interactions
            WHERE client_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Interaction::from).collect())
    }
}
