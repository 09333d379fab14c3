use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chatbot exchange, optionally tied to a captured client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    pub client_id: Option<i64>,
    pub session_id: String,
    pub interaction_type: String,
    pub user_message: Option<String>,
    pub bot_response: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewInteraction {
    pub client_id: Option<i64>,
    pub session_id: String,
    pub interaction_type: String,
    pub user_message: Option<String>,
    pub bot_response: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
}

impl NewInteraction {
    pub fn new(session_id: impl Into<String>, interaction_type: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            interaction_type: interaction_type.into(),
            ..Default::default()
        }
    }

    pub fn into_interaction(self, id: i64, created_at: DateTime<Utc>) -> Interaction {
        Interaction {
            id,
            client_id: self.client_id,
            session_id: self.session_id,
            interaction_type: self.interaction_type,
            user_message: self.user_message,
            bot_response: self.bot_response,
            extracted_data: self.extracted_data,
            created_at,
        }
    }
}
