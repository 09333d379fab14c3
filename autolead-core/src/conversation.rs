use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::SearchCriteria;

/// Session-scoped chatbot state kept by a `SessionStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    pub client_id: Option<i64>,
    pub last_criteria: Option<SearchCriteria>,
    pub turns: u32,
    pub started_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn start(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            client_id: None,
            last_criteria: None,
            turns: 0,
            started_at: Utc::now(),
        }
    }

    pub fn record_search(&mut self, criteria: SearchCriteria) {
        self.last_criteria = Some(criteria);
        self.turns += 1;
    }

    pub fn attach_client(&mut self, client_id: i64) {
        self.client_id = Some(client_id);
        self.turns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_tracks_turns() {
        let mut ctx = ConversationContext::start("sess-1");
        assert_eq!(ctx.turns, 0);

        ctx.record_search(SearchCriteria {
            brand: Some("ford".into()),
            ..Default::default()
        });
        ctx.attach_client(9);

        assert_eq!(ctx.turns, 2);
        assert_eq!(ctx.client_id, Some(9));
        assert_eq!(ctx.last_criteria.unwrap().brand.as_deref(), Some("ford"));
    }
}
