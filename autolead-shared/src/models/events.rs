use crate::pii::Masked;

/// Emitted whenever a lead is created or refreshed through the API or the chatbot webhook.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct LeadCapturedEvent {
    pub client_id: i64,
    pub name: String,
    pub phone: Masked<String>,
    pub preferred_body_type: Option<String>,
    pub source: Option<String>,
    pub session_id: Option<String>,
    pub is_new: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SearchLoggedEvent {
    pub session_id: String,
    pub client_id: Option<i64>,
    pub body_type: Option<String>,
    pub brand: Option<String>,
    pub results_count: i64,
    pub timestamp: i64,
}

impl LeadCapturedEvent {
    pub fn now(
        client_id: i64,
        name: String,
        phone: String,
        preferred_body_type: Option<String>,
        source: Option<String>,
        session_id: Option<String>,
        is_new: bool,
    ) -> Self {
        Self {
            client_id,
            name,
            phone: Masked(phone),
            preferred_body_type,
            source,
            session_id,
            is_new,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
