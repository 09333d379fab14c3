//! In-process implementations of the repository traits.
//!
//! Used by the API integration tests.
//! Semantics follow the SQL implementations: same ordering, same COALESCE rules.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

use autolead_core::car::Car;
use autolead_core::client::{Client, ClientPage, ClientQuery, ClientUpsert, LeadStatus, Pagination};
use autolead_core::conversation::ConversationContext;
use autolead_core::interaction::{Interaction, NewInteraction};
use autolead_core::inventory::{
    BuyingPriceStats, DiscountCandidate, RotationEntry, Sale, SaleRecord, SalesPeriod, VehicleKey,
};
use autolead_core::repository::{
    CarRepository, ClientRepository, InteractionRepository, InventoryRepository, RateLimiter,
    SearchLogRepository, SessionStore,
};
use autolead_core::search::{matches_all, CarFilter, NewCarView, NewSearchLog};
use autolead_core::StoreError;

#[derive(Debug, Clone)]
pub struct SearchLogEntry {
    pub id: i64,
    pub search: NewSearchLog,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CarViewEntry {
    pub id: i64,
    pub view: NewCarView,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    clients: Vec<Client>,
    interactions: Vec<Interaction>,
    cars: Vec<Car>,
    searches: Vec<SearchLogEntry>,
    views: Vec<CarViewEntry>,
    sales: Vec<Sale>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn car(&self, id: i64) -> Option<&Car> {
        self.cars.iter().find(|c| c.id == id)
    }

    /// Sales joined to their car, restricted to one vehicle line.
    fn sales_for<'a>(&'a self, key: &'a VehicleKey) -> impl Iterator<Item = (&'a Sale, &'a Car)> + 'a {
        self.sales.iter().filter_map(move |sale| {
            self.car(sale.car_id)
                .filter(|car| car.brand == key.brand && car.model == key.model && car.year == key.year)
                .map(|car| (sale, car))
        })
    }
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days()
}

/// Shared in-memory store. Cheap to clone; all clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a car, assigning an id when `car.id` is 0. Returns the id.
    pub async fn insert_car(&self, mut car: Car) -> i64 {
        let mut state = self.state.write().await;
        if car.id == 0 {
            car.id = state.next_id();
        }
        let id = car.id;
        state.cars.push(car);
        id
    }

    pub async fn insert_sale(&self, car_id: i64, sale_date: DateTime<Utc>, sale_price: f64) -> i64 {
        let mut state = self.state.write().await;
        let id = state.next_id();
        state.sales.push(Sale {
            id,
            car_id,
            sale_date,
            sale_price,
        });
        id
    }

    pub async fn searches(&self) -> Vec<SearchLogEntry> {
        self.state.read().await.searches.clone()
    }

    pub async fn views(&self) -> Vec<CarViewEntry> {
        self.state.read().await.views.clone()
    }

    pub async fn interactions(&self) -> Vec<Interaction> {
        self.state.read().await.interactions.clone()
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn upsert_by_phone(&self, upsert: ClientUpsert) -> Result<(Client, bool), StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some(existing) = state.clients.iter_mut().find(|c| c.phone == upsert.phone) {
            upsert.apply_to(existing, now);
            return Ok((existing.clone(), false));
        }

        let id = state.next_id();
        let client = upsert.into_new_client(id, now);
        state.clients.push(client.clone());
        Ok((client, true))
    }

    async fn get_client(&self, id: i64) -> Result<Option<Client>, StoreError> {
        let state = self.state.read().await;
        Ok(state.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn list_clients(&self, query: &ClientQuery) -> Result<ClientPage, StoreError> {
        let state = self.state.read().await;
        let mut matching: Vec<&Client> = state
            .clients
            .iter()
            .filter(|c| query.status.map_or(true, |s| c.status == s))
            .filter(|c| query.source.as_deref().map_or(true, |s| c.source == s))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let clients = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

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
        let mut state = self.state.write().await;
        let Some(client) = state.clients.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        client.status = status;
        if notes.is_some() {
            client.notes = notes;
        }
        client.updated_at = Utc::now();
        Ok(Some(client.clone()))
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Client>, StoreError> {
        let state = self.state.read().await;
        let latest = state
            .interactions
            .iter()
            .filter(|i| i.session_id == session_id)
            .filter_map(|i| i.client_id.map(|client_id| (i.created_at, i.id, client_id)))
            .max();

        Ok(latest.and_then(|(_, _, client_id)| {
            state.clients.iter().find(|c| c.id == client_id).cloned()
        }))
    }
}

#[async_trait]
impl InteractionRepository for MemoryStore {
    async fn log_interaction(&self, interaction: NewInteraction) -> Result<Interaction, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let stored = interaction.into_interaction(id, Utc::now());
        state.interactions.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_client(&self, client_id: i64) -> Result<Vec<Interaction>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Interaction> = state
            .interactions
            .iter()
            .filter(|i| i.client_id == Some(client_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }
}

#[async_trait]
impl CarRepository for MemoryStore {
    async fn list_available(&self) -> Result<Vec<Car>, StoreError> {
        let state = self.state.read().await;
        let mut cars: Vec<Car> = state.cars.iter().filter(|c| c.available).cloned().collect();
        cars.sort_by(|a, b| a.brand.cmp(&b.brand).then_with(|| a.model.cmp(&b.model)));
        Ok(cars)
    }

    async fn get_available(&self, id: i64) -> Result<Option<Car>, StoreError> {
        let state = self.state.read().await;
        Ok(state.car(id).filter(|c| c.available).cloned())
    }

    async fn search(&self, filters: &[CarFilter], limit: i64) -> Result<Vec<Car>, StoreError> {
        let state = self.state.read().await;
        let mut cars: Vec<Car> = state
            .cars
            .iter()
            .filter(|c| c.available && matches_all(filters, c))
            .cloned()
            .collect();
        cars.sort_by(|a, b| a.price.total_cmp(&b.price).then(a.id.cmp(&b.id)));
        cars.truncate(limit.max(0) as usize);
        Ok(cars)
    }
}

#[async_trait]
impl SearchLogRepository for MemoryStore {
    async fn log_search(&self, search: NewSearchLog, views: Vec<NewCarView>) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let id = state.next_id();
        state.searches.push(SearchLogEntry {
            id,
            search,
            created_at: now,
        });
        for view in views {
            let view_id = state.next_id();
            state.views.push(CarViewEntry {
                id: view_id,
                view,
                created_at: now,
            });
        }
        Ok(id)
    }

    async fn record_view(&self, view: NewCarView) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        state.views.push(CarViewEntry {
            id,
            view,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn attach_session_to_client(&self, session_id: &str, client_id: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        for interaction in state.interactions.iter_mut() {
            if interaction.session_id == session_id && interaction.client_id.is_none() {
                interaction.client_id = Some(client_id);
            }
        }
        for entry in state.searches.iter_mut() {
            if entry.search.session_id == session_id && entry.search.client_id.is_none() {
                entry.search.client_id = Some(client_id);
            }
        }
        for entry in state.views.iter_mut() {
            if entry.view.session_id == session_id && entry.view.client_id.is_none() {
                entry.view.client_id = Some(client_id);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryRepository for MemoryStore {
    async fn sales_in_period(&self, period: SalesPeriod) -> Result<Vec<SaleRecord>, StoreError> {
        let state = self.state.read().await;
        let start = period.start_from(Utc::now());

        let mut sales: Vec<&Sale> = state.sales.iter().filter(|s| s.sale_date >= start).collect();
        sales.sort_by(|a, b| a.sale_date.cmp(&b.sale_date).then(a.id.cmp(&b.id)));

        Ok(sales
            .into_iter()
            .filter_map(|sale| {
                state.car(sale.car_id).map(|car| SaleRecord {
                    brand: car.brand.clone(),
                    model: car.model.clone(),
                    price: car.price,
                    sale_date: sale.sale_date,
                })
            })
            .collect())
    }

    async fn rotation(&self) -> Result<Vec<RotationEntry>, StoreError> {
        let state = self.state.read().await;
        let mut groups: HashMap<VehicleKey, (i64, i64)> = HashMap::new();

        for sale in &state.sales {
            let Some(car) = state.car(sale.car_id) else { continue };
            let Some(purchased) = car.purchase_date else { continue };
            let key = VehicleKey {
                brand: car.brand.clone(),
                model: car.model.clone(),
                year: car.year,
            };
            let entry = groups.entry(key).or_insert((0, 0));
            entry.0 += days_between(purchased, sale.sale_date);
            entry.1 += 1;
        }

        let mut rotation: Vec<RotationEntry> = groups
            .into_iter()
            .map(|(key, (days, sold))| RotationEntry {
                brand: key.brand,
                model: key.model,
                year: key.year,
                avg_days_in_inventory: days as f64 / sold as f64,
                total_sold: sold,
            })
            .collect();
        rotation.sort_by(|a, b| {
            a.avg_days_in_inventory
                .total_cmp(&b.avg_days_in_inventory)
                .then_with(|| a.brand.cmp(&b.brand))
                .then_with(|| a.model.cmp(&b.model))
        });
        Ok(rotation)
    }

    async fn discount_candidates(&self, threshold_days: i32) -> Result<Vec<DiscountCandidate>, StoreError> {
        let state = self.state.read().await;
        let now = Utc::now();
        let threshold = Duration::days(i64::from(threshold_days));

        let mut candidates: Vec<DiscountCandidate> = state
            .cars
            .iter()
            .filter(|c| c.available)
            .filter_map(|car| {
                let purchased = car.purchase_date?;
                (now - purchased > threshold).then(|| DiscountCandidate {
                    id: car.id,
                    brand: car.brand.clone(),
                    model: car.model.clone(),
                    year: car.year,
                    price: car.price,
                    purchase_date: purchased,
                    days_in_inventory: days_between(purchased, now),
                })
            })
            .collect();
        candidates.sort_by(|a, b| b.days_in_inventory.cmp(&a.days_in_inventory).then(a.id.cmp(&b.id)));
        Ok(candidates)
    }

    async fn buying_price_stats(&self, key: &VehicleKey) -> Result<Option<BuyingPriceStats>, StoreError> {
        let state = self.state.read().await;
        let sales: Vec<(&Sale, &Car)> = state.sales_for(key).collect();
        if sales.is_empty() {
            return Ok(None);
        }

        let avg_sale_price = sales.iter().map(|(s, _)| s.sale_price).sum::<f64>() / sales.len() as f64;
        let held: Vec<i64> = sales
            .iter()
            .filter_map(|(s, c)| c.purchase_date.map(|p| days_between(p, s.sale_date)))
            .collect();
        let avg_days_to_sell =
            (!held.is_empty()).then(|| held.iter().sum::<i64>() as f64 / held.len() as f64);

        Ok(Some(BuyingPriceStats {
            avg_sale_price,
            avg_days_to_sell,
        }))
    }

    async fn avg_days_in_inventory(&self, key: &VehicleKey) -> Result<Option<f64>, StoreError> {
        let state = self.state.read().await;
        let held: Vec<i64> = state
            .sales_for(key)
            .filter_map(|(s, c)| c.purchase_date.map(|p| days_between(p, s.sale_date)))
            .collect();

        if held.is_empty() {
            return Ok(None);
        }
        Ok(Some(held.iter().sum::<i64>() as f64 / held.len() as f64))
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, ConversationContext>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationContext>, StoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, ctx: &ConversationContext) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(ctx.session_id.clone(), ctx.clone());
        Ok(())
    }
}

/// Fixed-window counter per key.
#[derive(Clone, Default)]
pub struct MemoryRateLimiter {
    windows: Arc<Mutex<HashMap<String, (Instant, u64)>>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str, limit: u64, window_secs: u64) -> Result<bool, StoreError> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert((now, 0));

        if now.duration_since(entry.0).as_secs() >= window_secs {
            *entry = (now, 0);
        }
        entry.1 += 1;
        Ok(entry.1 <= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autolead_core::search::{BodyType, SearchCriteria, ViewSource};

    fn car(brand: &str, model: &str, body: &str, price: f64) -> Car {
        Car {
            id: 0,
            brand: brand.to_string(),
            model: model.to_string(),
            year: 2020,
            body_type: Some(body.to_string()),
            color: Some("blanco".to_string()),
            mileage: Some(30_000),
            price,
            fuel_type: None,
            transmission: None,
            engine_size: None,
            doors: None,
            description: None,
            image_url: None,
            available: true,
            purchase_date: None,
        }
    }

    fn lead(phone: &str) -> ClientUpsert {
        ClientUpsert {
            name: "Luis".into(),
            phone: phone.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_by_phone_keeps_unspecified_fields() {
        let store = MemoryStore::new();

        let mut first = lead("5511112222");
        first.email = Some("luis@example.com".into());
        first.max_price = Some(300_000.0);
        let (created, is_new) = store.upsert_by_phone(first).await.unwrap();
        assert!(is_new);

        let mut second = lead("5511112222");
        second.preferred_color = Some("azul".into());
        let (updated, is_new) = store.upsert_by_phone(second).await.unwrap();

        assert!(!is_new);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.email.as_deref(), Some("luis@example.com"));
        assert_eq!(updated.max_price, Some(300_000.0));
        assert_eq!(updated.preferred_color.as_deref(), Some("azul"));
    }

    #[tokio::test]
    async fn test_concurrent_captures_of_one_phone_create_one_client() {
        let store = MemoryStore::new();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert_by_phone(lead("5577778888")).await })
            })
            .collect();

        let mut ids = Vec::new();
        let mut created = 0;
        for handle in handles {
            let (client, is_new) = handle.await.unwrap().unwrap();
            if is_new {
                created += 1;
            }
            ids.push(client.id);
        }

        assert_eq!(created, 1);
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_search_is_cheapest_first_and_bounded() {
        let store = MemoryStore::new();
        for (i, price) in [450_000.0, 150_000.0, 300_000.0, 220_000.0].iter().enumerate() {
            store.insert_car(car("Toyota", &format!("M{}", i), "suv", *price)).await;
        }
        store.insert_car(car("Honda", "Civic", "sedan", 10.0)).await;

        let filters = vec![CarFilter::BodyType(BodyType::Suv)];
        let cars = store.search(&filters, 3).await.unwrap();
        let prices: Vec<f64> = cars.iter().map(|c| c.price).collect();
        assert_eq!(prices, vec![150_000.0, 220_000.0, 300_000.0]);
    }

    #[tokio::test]
    async fn test_unavailable_cars_hidden() {
        let store = MemoryStore::new();
        let mut sold = car("Ford", "Ranger", "pickup", 1.0);
        sold.available = false;
        let id = store.insert_car(sold).await;

        assert!(store.get_available(id).await.unwrap().is_none());
        assert!(store.search(&[], 10).await.unwrap().is_empty());
        assert!(store.list_available().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_session_backfills_only_unowned_rows() {
        let store = MemoryStore::new();
        let car_id = store.insert_car(car("Kia", "Rio", "sedan", 1.0)).await;

        store
            .log_interaction(NewInteraction::new("sess", "greeting"))
            .await
            .unwrap();
        let mut owned = NewInteraction::new("sess", "message");
        owned.client_id = Some(99);
        store.log_interaction(owned).await.unwrap();

        store
            .log_search(
                NewSearchLog {
                    client_id: None,
                    session_id: "sess".into(),
                    criteria: SearchCriteria::default(),
                    results_count: 1,
                },
                vec![NewCarView {
                    car_id,
                    client_id: None,
                    session_id: "sess".into(),
                    source: ViewSource::Chatbot,
                }],
            )
            .await
            .unwrap();

        store.attach_session_to_client("sess", 7).await.unwrap();

        let owners: Vec<Option<i64>> = store.interactions().await.iter().map(|i| i.client_id).collect();
        assert_eq!(owners, vec![Some(7), Some(99)]);
        assert_eq!(store.searches().await[0].search.client_id, Some(7));
        assert_eq!(store.views().await[0].view.client_id, Some(7));
    }

    #[tokio::test]
    async fn test_find_by_session_uses_latest_interaction() {
        let store = MemoryStore::new();
        let (client, _) = store.upsert_by_phone(lead("5599990000")).await.unwrap();

        assert!(store.find_by_session("s1").await.unwrap().is_none());

        let mut interaction = NewInteraction::new("s1", "lead_capture");
        interaction.client_id = Some(client.id);
        store.log_interaction(interaction).await.unwrap();

        let found = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(found.id, client.id);
    }

    #[tokio::test]
    async fn test_list_clients_filters_and_paginates() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.upsert_by_phone(lead(&format!("55000000{:02}", i))).await.unwrap();
        }
        store.update_status(1, LeadStatus::Sold, None).await.unwrap();

        let page = store
            .list_clients(&ClientQuery::new(None, None, Some(2), Some(0)))
            .await
            .unwrap();
        assert_eq!(page.clients.len(), 2);
        assert_eq!(page.pagination.total, 5);
        assert_eq!(page.pagination.pages, 3);

        let sold = store
            .list_clients(&ClientQuery::new(Some(LeadStatus::Sold), None, None, None))
            .await
            .unwrap();
        assert_eq!(sold.pagination.total, 1);
    }

    #[tokio::test]
    async fn test_inventory_history() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut corolla = car("Toyota", "Corolla", "sedan", 250_000.0);
        corolla.available = false;
        corolla.purchase_date = Some(now - Duration::days(50));
        let sold_id = store.insert_car(corolla).await;
        store.insert_sale(sold_id, now - Duration::days(10), 240_000.0).await;

        let mut stale = car("Nissan", "Versa", "sedan", 180_000.0);
        stale.purchase_date = Some(now - Duration::days(90));
        store.insert_car(stale).await;

        let key = VehicleKey {
            brand: "Toyota".into(),
            model: "Corolla".into(),
            year: 2020,
        };
        assert_eq!(store.avg_days_in_inventory(&key).await.unwrap(), Some(40.0));

        let stats = store.buying_price_stats(&key).await.unwrap().unwrap();
        assert_eq!(stats.avg_sale_price, 240_000.0);

        let unknown = VehicleKey {
            brand: "Tesla".into(),
            model: "3".into(),
            year: 2022,
        };
        assert_eq!(store.avg_days_in_inventory(&unknown).await.unwrap(), None);
        assert!(store.buying_price_stats(&unknown).await.unwrap().is_none());

        let candidates = store.discount_candidates(60).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].brand, "Nissan");
        assert_eq!(candidates[0].days_in_inventory, 90);

        let sales = store.sales_in_period(SalesPeriod::OneMonth).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].price, 250_000.0);
    }

    #[tokio::test]
    async fn test_rate_limiter_window() {
        let limiter = MemoryRateLimiter::new();
        assert!(limiter.check("1.2.3.4", 2, 60).await.unwrap());
        assert!(limiter.check("1.2.3.4", 2, 60).await.unwrap());
        assert!(!limiter.check("1.2.3.4", 2, 60).await.unwrap());
        assert!(limiter.check("5.6.7.8", 2, 60).await.unwrap());
    }
}
