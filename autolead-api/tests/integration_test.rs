use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use autolead_api::{
    app, dashboard,
    middleware::auth::{issue_token, AdminClaims, ROLE_ADMIN},
    state::{AppState, AuthConfig},
};
use autolead_core::analytics::{
    CarPerformanceReport, ChatbotReport, ClientPreferencesReport, ConversionRate, DailySummary,
    DashboardReport, Granularity, PopularSearch, Timeframe, TrendsReport,
};
use autolead_core::car::Car;
use autolead_core::repository::AnalyticsRepository;
use autolead_core::StoreError;
use autolead_store::{app_config::BusinessRules, MemoryRateLimiter, MemorySessionStore, MemoryStore};

// ============================================================================
// Fixtures
// ============================================================================

/// Only the webhook metrics are served; the heavy reports need Postgres.
struct StubAnalytics;

fn unsupported() -> StoreError {
    "report not available in tests".into()
}

#[async_trait]
impl AnalyticsRepository for StubAnalytics {
    async fn dashboard(&self, _: Timeframe) -> Result<DashboardReport, StoreError> {
        Err(unsupported())
    }

    async fn client_preferences(&self, _: Timeframe) -> Result<ClientPreferencesReport, StoreError> {
        Err(unsupported())
    }

    async fn car_performance(&self, _: Timeframe) -> Result<CarPerformanceReport, StoreError> {
        Err(unsupported())
    }

    async fn chatbot_effectiveness(&self, _: Timeframe) -> Result<ChatbotReport, StoreError> {
        Err(unsupported())
    }

    async fn trends(&self, _: Timeframe, _: Granularity) -> Result<TrendsReport, StoreError> {
        Err(unsupported())
    }

    async fn daily_summary(&self, _: Timeframe) -> Result<DailySummary, StoreError> {
        Ok(DailySummary {
            new_leads: 3,
            total_searches: 12,
            total_views: 40,
            unique_sessions: 5,
        })
    }

    async fn popular_searches(&self, _: Timeframe) -> Result<Vec<PopularSearch>, StoreError> {
        Ok(vec![PopularSearch {
            search_body_type: Some("suv".into()),
            search_brand: Some("toyota".into()),
            search_count: 7,
        }])
    }

    async fn conversion_rate(&self, _: Timeframe) -> Result<ConversionRate, StoreError> {
        Ok(ConversionRate::new(8, 2))
    }
}

fn car(brand: &str, model: &str, body: &str, color: &str, price: f64, available: bool) -> Car {
    Car {
        id: 0,
        brand: brand.to_string(),
        model: model.to_string(),
        year: 2021,
        body_type: Some(body.to_string()),
        color: Some(color.to_string()),
        mileage: Some(30_000),
        price,
        fuel_type: Some("gasolina".to_string()),
        transmission: Some("automática".to_string()),
        engine_size: Some(2.0),
        doors: Some(4),
        description: None,
        image_url: None,
        available,
        purchase_date: None,
    }
}

struct TestApp {
    router: Router,
    store: MemoryStore,
    admin_token: String,
}

async fn setup_with(rules: BusinessRules) -> TestApp {
    let store = MemoryStore::new();
    store.insert_car(car("Toyota", "RAV4", "suv", "negro", 450_000.0, true)).await;
    store.insert_car(car("Toyota", "Highlander", "suv", "blanco", 650_000.0, true)).await;
    store.insert_car(car("Honda", "CR-V", "suv", "gris", 420_000.0, true)).await;
    store.insert_car(car("Honda", "Civic", "sedan", "azul", 380_000.0, true)).await;
    store.insert_car(car("Ford", "Ranger", "pickup", "rojo", 520_000.0, true)).await;
    store.insert_car(car("Toyota", "Tacoma", "pickup", "negro", 300_000.0, false)).await;

    let auth = AuthConfig {
        secret: "test-secret".to_string(),
        expiration: 3600,
        admin_api_key: "test-admin-key".to_string(),
    };
    let admin_token = issue_token(&auth, &AdminClaims::new("admin", ROLE_ADMIN, 3600)).unwrap();

    let state = AppState {
        client_repo: Arc::new(store.clone()),
        interaction_repo: Arc::new(store.clone()),
        car_repo: Arc::new(store.clone()),
        search_log_repo: Arc::new(store.clone()),
        inventory_repo: Arc::new(store.clone()),
        analytics_repo: Arc::new(StubAnalytics),
        sessions: Arc::new(MemorySessionStore::new()),
        rate_limiter: Arc::new(MemoryRateLimiter::new()),
        dashboard_tx: dashboard::channel(),
        auth,
        business_rules: rules,
    };

    TestApp {
        router: app(state),
        store,
        admin_token,
    }
}

async fn setup() -> TestApp {
    setup_with(BusinessRules::default()).await
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request("POST", uri, body, None)).await
    }

    async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = match body {
            Some(body) => json_request(method, uri, body, Some(&self.admin_token)),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.admin_token))
                .body(Body::empty())
                .unwrap(),
        };
        self.send(req).await
    }
}

fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Clients
// ============================================================================

#[tokio::test]
async fn test_client_upsert_by_phone() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/clients",
            json!({
                "name": "Ana López",
                "phone": "5512345678",
                "email": "ana@example.com",
                "preferred_body_type": "suv",
                "max_price": 500000
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Client created successfully");
    assert_eq!(body["client"]["source"], "chatbot");
    assert_eq!(body["client"]["status"], "new");
    let id = body["client"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/api/clients",
            json!({ "name": "Ana L.", "phone": "5512345678", "preferred_brand": "Toyota" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Client updated successfully");
    assert_eq!(body["client"]["id"].as_i64().unwrap(), id);
    assert_eq!(body["client"]["name"], "Ana L.");
    // Omitted fields keep their stored values
    assert_eq!(body["client"]["email"], "ana@example.com");
    assert_eq!(body["client"]["preferred_body_type"], "suv");
    assert_eq!(body["client"]["preferred_brand"], "Toyota");
}

#[tokio::test]
async fn test_client_validation_errors() {
    let app = setup().await;

    let (status, body) = app
        .post("/api/clients", json!({ "name": "Ana", "phone": "123" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .send(Request::builder()
            .method("POST")
            .uri("/api/clients")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = setup().await;

    for uri in [
        "/api/clients",
        "/api/clients/1",
        "/api/clients/1/interactions",
        "/api/inventory/rotation",
        "/api/analytics/dashboard",
    ] {
        let (status, _) = app.send(get(uri)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let bad = Request::builder()
        .uri("/api/clients")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.admin("GET", "/api/clients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_non_admin_role_is_forbidden() {
    let app = setup().await;
    let auth = AuthConfig {
        secret: "test-secret".to_string(),
        expiration: 3600,
        admin_api_key: String::new(),
    };
    let token = issue_token(&auth, &AdminClaims::new("viewer", "VIEWER", 3600)).unwrap();

    let req = Request::builder()
        .uri("/api/clients")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_exchange() {
    let app = setup().await;

    let (status, _) = app
        .post("/api/auth/token", json!({ "api_key": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .post("/api/auth/token", json!({ "api_key": "test-admin-key" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expires_in"], 3600);

    let token = body["token"].as_str().unwrap();
    let req = Request::builder()
        .uri("/api/inventory/rotation")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_status_update() {
    let app = setup().await;
    let (_, body) = app
        .post("/api/clients", json!({ "name": "Luis", "phone": "5598765432" }))
        .await;
    let id = body["client"]["id"].as_i64().unwrap();

    let (status, body) = app
        .admin("PUT", &format!("/api/clients/{}/status", id), Some(json!({ "status": "archived" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status");
    assert_eq!(
        body["valid_statuses"],
        json!(["new", "contacted", "qualified", "sold", "lost"])
    );

    let (status, body) = app
        .admin(
            "PUT",
            &format!("/api/clients/{}/status", id),
            Some(json!({ "status": "contacted", "notes": "Llamar el lunes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client"]["status"], "contacted");
    assert_eq!(body["client"]["notes"], "Llamar el lunes");

    let (status, body) = app
        .admin("PUT", "/api/clients/9999/status", Some(json!({ "status": "sold" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Client not found");

    let (status, body) = app.admin("GET", "/api/clients/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid client ID");
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_is_price_ordered_and_hides_unavailable() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/search/cars",
            json!({ "session_id": "s-1", "search_brand": "toyota" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let prices: Vec<f64> = body["cars"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["price"].as_f64().unwrap())
        .collect();
    // The Tacoma is unavailable
    assert_eq!(prices, vec![450_000.0, 650_000.0]);
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["search_criteria"]["brand"], "toyota");

    let searches = app.store.searches().await;
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].search.results_count, 2);
    assert_eq!(app.store.views().await.len(), 2);
}

#[tokio::test]
async fn test_search_respects_result_limit() {
    let app = setup_with(BusinessRules {
        search_result_limit: 2,
        ..BusinessRules::default()
    })
    .await;

    let (_, body) = app
        .post("/api/search/cars", json!({ "session_id": "s-1" }))
        .await;
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["cars"][0]["price"], 380_000.0);
}

#[tokio::test]
async fn test_intelligent_search() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/search/intelligent",
            json!({ "query_text": "Busco una camioneta Toyota", "session_id": "s-2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extracted_criteria"]["body_type"], "suv");
    assert_eq!(body["extracted_criteria"]["brand"], "toyota");
    assert_eq!(body["total_results"], 2);
    assert!(body["interpretation"].as_str().unwrap().contains("2"));

    // Logged without views
    assert_eq!(app.store.searches().await.len(), 1);
    assert!(app.store.views().await.is_empty());
}

#[tokio::test]
async fn test_intelligent_search_asks_for_clarification() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/search/intelligent",
            json!({ "query_text": "hola, qué tal", "session_id": "s-3" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["needs_clarification"], true);
    assert_eq!(body["total_results"], 0);
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 4);
    assert!(app.store.searches().await.is_empty());

    let (status, _) = app
        .post("/api/search/intelligent", json!({ "query_text": "suv" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Inventory and analytics
// ============================================================================

#[tokio::test]
async fn test_offer_suggestion_defaults_to_sixty_days() {
    let app = setup().await;

    let (status, body) = app
        .admin(
            "POST",
            "/api/inventory/offer-suggestion",
            Some(json!({
                "brand": "Toyota",
                "model": "Corolla",
                "year": 2020,
                "salesPrice": 200000,
                "dailyHoldingCost": 50,
                "salesCommission": 5,
                "reconditioningCost": 3000,
                "desiredProfitMargin": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["suggestedOfferPrice"], "162000.00");
    assert_eq!(body["breakdown"]["avgDaysInInventory"], "60.00");
    assert_eq!(body["breakdown"]["totalCosts"], "18000.00");
    assert_eq!(body["breakdown"]["projectedProfit"], "20000.00");

    let (status, _) = app
        .admin(
            "POST",
            "/api/inventory/offer-suggestion",
            Some(json!({ "brand": "Toyota", "model": "Corolla", "year": 2020, "salesPrice": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_buying_price_without_history_is_empty() {
    let app = setup().await;
    let (status, body) = app
        .admin(
            "POST",
            "/api/inventory/buying-price-suggestion",
            Some(json!({ "brand": "Kia", "model": "Rio", "year": 2018 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_analytics_rejects_bad_parameters() {
    let app = setup().await;

    let (status, _) = app
        .admin("GET", "/api/analytics/dashboard?timeframe=30%20OR%201=1", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .admin("GET", "/api/analytics/trends?granularity=minute", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Chatbot webhooks
// ============================================================================

#[tokio::test]
async fn test_webhook_conversation_flow() {
    let app = setup().await;

    let (status, body) = app
        .post("/api/webhooks/n8n/chatbot", json!({ "action": "start_conversation" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["session_id"], session_id.as_str());
    assert_eq!(body["data"]["options"].as_array().unwrap().len(), 5);

    let (status, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({
                "action": "search_cars",
                "session_id": session_id,
                "search_criteria": { "body_type": "suv", "max_price": 500000 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_results"], 2);
    assert_eq!(
        body["data"]["message"],
        "Encontré 2 vehículos que coinciden con tu búsqueda:"
    );

    let (status, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({
                "action": "capture_lead",
                "session_id": session_id,
                "user_data": { "name": "María Pérez", "phone": "5511122233" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let client_id = body["data"]["client"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["client"]["source"], "chatbot");

    // Earlier anonymous activity now belongs to the lead
    let searches = app.store.searches().await;
    assert!(searches.iter().all(|s| s.search.client_id == Some(client_id)));
    let views = app.store.views().await;
    assert!(!views.is_empty());
    assert!(views.iter().all(|v| v.view.client_id == Some(client_id)));

    let (status, body) = app
        .send(get(&format!("/api/clients/session/{}", session_id)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client"]["id"].as_i64().unwrap(), client_id);
}

#[tokio::test]
async fn test_webhook_natural_search_uses_session_client() {
    let app = setup().await;

    app.post(
        "/api/webhooks/n8n/chatbot",
        json!({ "action": "start_conversation", "session_id": "chat-9" }),
    )
    .await;
    app.post(
        "/api/webhooks/n8n/chatbot",
        json!({
            "action": "capture_lead",
            "session_id": "chat-9",
            "user_data": { "name": "Pedro", "phone": "5544455566" }
        }),
    )
    .await;

    let (status, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({
                "action": "natural_search",
                "session_id": "chat-9",
                "user_message": "quiero una pickup ford"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_results"], 1);
    assert_eq!(body["data"]["extracted_criteria"]["brand"], "ford");
    assert!(body["data"]["interpretation"]
        .as_str()
        .unwrap()
        .starts_with("Busqué: "));

    let searches = app.store.searches().await;
    let last = searches.last().unwrap();
    assert!(last.search.client_id.is_some());

    let (_, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({ "action": "natural_search", "session_id": "chat-9", "user_message": "hola" }),
        )
        .await;
    assert_eq!(body["data"]["suggestions"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_webhook_repeated_greeting_keeps_session_client() {
    let app = setup().await;

    app.post(
        "/api/webhooks/n8n/chatbot",
        json!({ "action": "start_conversation", "session_id": "chat-x" }),
    )
    .await;
    let (_, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({
                "action": "capture_lead",
                "session_id": "chat-x",
                "user_data": { "name": "Marta", "phone": "5533322211" }
            }),
        )
        .await;
    let client_id = body["data"]["client"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({ "action": "start_conversation", "session_id": "chat-x" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.post(
        "/api/webhooks/n8n/chatbot",
        json!({
            "action": "natural_search",
            "session_id": "chat-x",
            "user_message": "quiero una pickup ford"
        }),
    )
    .await;

    let searches = app.store.searches().await;
    assert_eq!(searches.last().unwrap().search.client_id, Some(client_id));
}

#[tokio::test]
async fn test_webhook_car_details_and_interactions() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({ "action": "get_car_details", "session_id": "s-4", "car_id": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Toyota RAV4 2021");
    assert_eq!(body["data"]["price"], "$450,000");
    assert_eq!(app.store.views().await.len(), 1);

    // Unavailable car
    let (_, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({ "action": "get_car_details", "session_id": "s-4", "car_id": 6 }),
        )
        .await;
    assert_eq!(body["data"]["error"], "Car not found or not available");

    let (status, body) = app
        .post(
            "/api/webhooks/n8n/chatbot",
            json!({
                "action": "log_interaction",
                "session_id": "s-4",
                "interaction_type": "question",
                "user_message": "¿Tiene garantía?"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["interaction_logged"], true);
    assert_eq!(app.store.interactions().await.len(), 1);
}

#[tokio::test]
async fn test_webhook_rejects_unknown_action() {
    let app = setup().await;

    let (status, body) = app
        .post("/api/webhooks/n8n/chatbot", json!({ "action": "drop_tables" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action specified");

    let (status, _) = app
        .post("/api/webhooks/n8n/chatbot", json!({ "action": "search_cars" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics_webhook() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/webhooks/n8n/analytics",
            json!({ "metric_type": "conversion_rate", "timeframe": "14" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeframe"], "14 days");
    assert_eq!(body["data"]["conversion_rate"], 25.0);

    let (_, body) = app
        .post("/api/webhooks/n8n/analytics", json!({ "metric_type": "daily_summary" }))
        .await;
    assert_eq!(body["timeframe"], "7 days");
    assert_eq!(body["data"]["new_leads"], 3);

    let (status, body) = app
        .post("/api/webhooks/n8n/analytics", json!({ "metric_type": "revenue" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid metric_type");
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_rate_limit() {
    let app = setup_with(BusinessRules {
        rate_limit_per_minute: 3,
        ..BusinessRules::default()
    })
    .await;

    for _ in 0..3 {
        let (status, _) = app.send(get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = app.send(get("/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
