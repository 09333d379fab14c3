//! Live dashboard feed.
//!
//! A background task pulls the dashboard report on a fixed interval and broadcasts it.
//! Lead captures and logged searches are pushed onto the same channel as they happen.
//! `/api/analytics/stream` relays everything to SSE subscribers.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use autolead_core::analytics::{DashboardReport, Timeframe};
use autolead_core::client::Client;
use autolead_core::repository::AnalyticsRepository;
use autolead_core::search::NewSearchLog;
use autolead_core::StoreError;
use autolead_shared::models::events::{LeadCapturedEvent, SearchLoggedEvent};

use crate::state::AppState;

pub const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    Snapshot(Box<DashboardReport>),
    LeadCaptured(LeadCapturedEvent),
    SearchLogged(SearchLoggedEvent),
}

impl DashboardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::Snapshot(_) => "snapshot",
            DashboardEvent::LeadCaptured(_) => "lead_captured",
            DashboardEvent::SearchLogged(_) => "search_logged",
        }
    }
}

pub fn channel() -> broadcast::Sender<DashboardEvent> {
    broadcast::channel(CHANNEL_CAPACITY).0
}

// ============================================================================
// Refresh task
// ============================================================================

/// Fetches one snapshot and broadcasts it. Returns the number of subscribers reached.
pub async fn refresh_once(
    analytics: &dyn AnalyticsRepository,
    tx: &broadcast::Sender<DashboardEvent>,
) -> Result<usize, StoreError> {
    let report = analytics.dashboard(Timeframe::default()).await?;
    Ok(tx.send(DashboardEvent::Snapshot(Box::new(report))).unwrap_or(0))
}

pub fn spawn_refresh_task(
    analytics: Arc<dyn AnalyticsRepository>,
    tx: broadcast::Sender<DashboardEvent>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Dashboard refresh task started, interval {:?}", every);

        loop {
            ticker.tick().await;
            if tx.receiver_count() == 0 {
                continue;
            }
            if let Err(e) = refresh_once(analytics.as_ref(), &tx).await {
                tracing::error!("Dashboard refresh failed: {}", e);
            }
        }
    })
}

// ============================================================================
// Publishers
// ============================================================================

pub fn publish_lead_captured(state: &AppState, client: &Client, session_id: Option<String>, is_new: bool) {
    let event = LeadCapturedEvent::now(
        client.id,
        client.name.clone(),
        client.phone.clone(),
        client.preferred_body_type.clone(),
        Some(client.source.clone()),
        session_id,
        is_new,
    );
    tracing::info!(
        client_id = event.client_id,
        phone = %event.phone,
        is_new,
        "Lead captured"
    );
    // No subscribers is not an error.
    let _ = state.dashboard_tx.send(DashboardEvent::LeadCaptured(event));
}

pub fn publish_search_logged(state: &AppState, search: &NewSearchLog) {
    let event = SearchLoggedEvent {
        session_id: search.session_id.clone(),
        client_id: search.client_id,
        body_type: search.criteria.body_type.map(|b| b.to_string()),
        brand: search.criteria.brand.clone(),
        results_count: search.results_count,
        timestamp: chrono::Utc::now().timestamp(),
    };
    let _ = state.dashboard_tx.send(DashboardEvent::SearchLogged(event));
}

// ============================================================================
// SSE
// ============================================================================

pub fn event_stream(
    rx: broadcast::Receiver<DashboardEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    tracing::error!("Failed to encode dashboard event: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Dashboard subscriber lagged");
                None
            }
        }
    })
}

/// GET /api/analytics/stream
pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(state.dashboard_tx.subscribe())).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_skips_lagged_events() {
        let tx = broadcast::channel(1).0;
        let rx = tx.subscribe();

        for i in 0..3 {
            let event = SearchLoggedEvent {
                session_id: format!("s{}", i),
                client_id: None,
                body_type: None,
                brand: None,
                results_count: i,
                timestamp: 0,
            };
            tx.send(DashboardEvent::SearchLogged(event)).unwrap();
        }
        drop(tx);

        let events: Vec<_> = event_stream(rx).collect().await;
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_event_names() {
        let event = DashboardEvent::SearchLogged(SearchLoggedEvent {
            session_id: "s".into(),
            client_id: Some(1),
            body_type: Some("suv".into()),
            brand: None,
            results_count: 2,
            timestamp: 0,
        });
        assert_eq!(event.name(), "search_logged");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "search_logged");
        assert_eq!(json["data"]["results_count"], 2);
    }
}
