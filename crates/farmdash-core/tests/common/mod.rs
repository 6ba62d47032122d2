#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use farmdash_core::aggregate::DashboardAggregator;
use farmdash_core::error::GatewayError;
use farmdash_core::gateway::ApiGateway;
use farmdash_core::network::ConnectivityMonitor;
use farmdash_core::offline::MemoryStore;
use farmdash_core::types::PostQuery;
use serde_json::{json, Value};
use tokio::sync::Notify;

/// Gateway double answering from canned payloads and recording every call.
pub struct ScriptedGateway {
    farms: Result<Value, GatewayError>,
    crops: HashMap<String, Result<Value, GatewayError>>,
    weather: Result<Value, GatewayError>,
    posts: Result<Value, GatewayError>,
    farm_payloads: Mutex<VecDeque<Value>>,
    farms_gate: Mutex<Option<Arc<Notify>>>,
    mutation_errors: Mutex<VecDeque<GatewayError>>,
    mutation_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            farms: Ok(json!([])),
            crops: HashMap::new(),
            weather: Ok(json!([])),
            posts: Ok(json!([])),
            farm_payloads: Mutex::new(VecDeque::new()),
            farms_gate: Mutex::new(None),
            mutation_errors: Mutex::new(VecDeque::new()),
            mutation_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_farms(mut self, payload: Value) -> Self {
        self.farms = Ok(payload);
        self
    }

    pub fn with_farms_error(mut self, err: GatewayError) -> Self {
        self.farms = Err(err);
        self
    }

    pub fn with_crops(mut self, farm_id: &str, payload: Value) -> Self {
        self.crops.insert(farm_id.to_string(), Ok(payload));
        self
    }

    pub fn with_crops_error(mut self, farm_id: &str, err: GatewayError) -> Self {
        self.crops.insert(farm_id.to_string(), Err(err));
        self
    }

    pub fn with_weather(mut self, payload: Value) -> Self {
        self.weather = Ok(payload);
        self
    }

    pub fn with_weather_error(mut self, err: GatewayError) -> Self {
        self.weather = Err(err);
        self
    }

    pub fn with_posts(mut self, payload: Value) -> Self {
        self.posts = Ok(payload);
        self
    }

    pub fn with_posts_error(mut self, err: GatewayError) -> Self {
        self.posts = Err(err);
        self
    }

    /// Queues failures returned, in order, by the next mutations.
    pub fn fail_mutations(&self, errors: impl IntoIterator<Item = GatewayError>) {
        self.mutation_errors.lock().unwrap().extend(errors);
    }

    /// Payloads answered, in order, by the next farm fetches before the
    /// configured one takes over.
    pub fn queue_farms(&self, payloads: impl IntoIterator<Item = Value>) {
        self.farm_payloads.lock().unwrap().extend(payloads);
    }

    /// Makes the next farm fetch wait until the returned handle is notified.
    /// The payload is picked before waiting.
    pub fn hold_next_farms_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.farms_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Makes the next mutation wait until the returned handle is notified.
    pub fn hold_next_mutation(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.mutation_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn mutate(&self, call: String) -> Result<(), GatewayError> {
        self.record(call);
        let outcome = self.mutation_errors.lock().unwrap().pop_front();
        let gate = self.mutation_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match outcome {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ApiGateway for ScriptedGateway {
    async fn get_farms(&self) -> Result<Value, GatewayError> {
        self.record("get_farms".into());
        let queued = self.farm_payloads.lock().unwrap().pop_front();
        let gate = self.farms_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match queued {
            Some(payload) => Ok(payload),
            None => self.farms.clone(),
        }
    }

    async fn create_farm(&self, mut data: Value) -> Result<Value, GatewayError> {
        self.mutate("create_farm".into()).await?;
        data["_id"] = json!("farm-new");
        Ok(json!({ "farm": data }))
    }

    async fn delete_farm(&self, id: &str) -> Result<(), GatewayError> {
        self.mutate(format!("delete_farm:{id}")).await
    }

    async fn get_crops(&self, farm_id: Option<&str>) -> Result<Value, GatewayError> {
        let farm_id = farm_id.unwrap_or_default();
        self.record(format!("get_crops:{farm_id}"));
        self.crops.get(farm_id).cloned().unwrap_or(Ok(json!([])))
    }

    async fn create_crop(&self, mut data: Value) -> Result<Value, GatewayError> {
        self.mutate("create_crop".into()).await?;
        data["_id"] = json!("crop-new");
        Ok(json!({ "success": true, "data": data }))
    }

    async fn delete_crop(&self, id: &str) -> Result<(), GatewayError> {
        self.mutate(format!("delete_crop:{id}")).await
    }

    async fn get_crop_activities(&self, crop_id: &str) -> Result<Value, GatewayError> {
        self.record(format!("get_crop_activities:{crop_id}"));
        Ok(json!({ "activities": [
            { "_id": "act-1", "type": "irrigation", "date": "2024-04-02" },
            { "type": "weeding" }
        ] }))
    }

    async fn get_crop_images(&self, crop_id: &str) -> Result<Value, GatewayError> {
        self.record(format!("get_crop_images:{crop_id}"));
        Ok(json!([{ "_id": "img-1", "url": "https://img.test/1.jpg" }, { "_id": "img-2" }]))
    }

    async fn get_weather(&self, location: Option<&str>) -> Result<Value, GatewayError> {
        self.record(format!("get_weather:{}", location.unwrap_or_default()));
        self.weather.clone()
    }

    async fn get_community_posts(&self, query: &PostQuery) -> Result<Value, GatewayError> {
        self.record(format!("get_community_posts:{}:{}", query.page, query.limit));
        self.posts.clone()
    }

    async fn get_trending_posts(&self, limit: usize) -> Result<Value, GatewayError> {
        self.record(format!("get_trending_posts:{limit}"));
        self.posts.clone()
    }

    async fn create_community_post(&self, mut data: Value) -> Result<Value, GatewayError> {
        self.mutate("create_community_post".into()).await?;
        data["_id"] = json!("post-new");
        Ok(data)
    }

    async fn like_community_post(&self, id: &str) -> Result<(), GatewayError> {
        self.mutate(format!("like:{id}")).await
    }

    async fn unlike_community_post(&self, id: &str) -> Result<(), GatewayError> {
        self.mutate(format!("unlike:{id}")).await
    }

    async fn get_post_comments(&self, post_id: &str) -> Result<Value, GatewayError> {
        self.record(format!("get_post_comments:{post_id}"));
        Ok(json!({ "comments": [{ "_id": "c-1", "text": "Nice", "author": { "_id": "u2", "name": "Ama" } }] }))
    }

    async fn add_post_comment(&self, post_id: &str, text: &str) -> Result<Value, GatewayError> {
        self.mutate(format!("comment:{post_id}")).await?;
        Ok(json!({ "comment": { "_id": "c-new", "text": text } }))
    }

    async fn get_sensor_data(&self, farm_id: &str) -> Result<Value, GatewayError> {
        self.record(format!("get_sensor_data:{farm_id}"));
        Ok(json!({ "readings": [
            { "sensorId": "s-1", "type": "soil_moisture", "value": "31.5", "unit": "%" },
            { "sensorId": "s-2", "type": "temperature" }
        ] }))
    }

    async fn get_automation_rules(&self, farm_id: &str) -> Result<Value, GatewayError> {
        self.record(format!("get_automation_rules:{farm_id}"));
        Ok(json!([{ "_id": "r-1", "name": "Irrigate when dry", "isActive": true, "farm": { "_id": farm_id } }]))
    }
}

pub fn network_error() -> GatewayError {
    GatewayError::Network("connection refused".into())
}

/// Farm A (size 10) and Farm B (size "5"), A being the newer one.
pub fn two_farms() -> Value {
    json!({ "data": { "farms": [
        { "_id": "farm-a", "name": "Farm A", "size": 10, "location": "Nakuru", "createdAt": "2024-02-01T08:00:00Z" },
        { "id": "farm-b", "name": "Farm B", "size": "5", "location": { "country": "Kenya", "district": "Bomet" }, "createdAt": "2023-06-01T08:00:00Z" }
    ] } })
}

/// Three crops for Farm A, two distinct names, one per reference shape.
pub fn farm_a_crops() -> Value {
    json!([
        { "_id": "crop-1", "name": "Maize", "farmId": "farm-a", "status": "growing" },
        { "_id": "crop-2", "name": "Maize", "farm": { "_id": "farm-a" }, "status": "planted" },
        { "_id": "crop-3", "name": "Beans", "farm": { "id": "farm-a" }, "status": "flowering" }
    ])
}

/// Farm A alone, as the backend reports it before Farm B exists.
pub fn farm_a_only() -> Value {
    json!({ "farms": [
        { "_id": "farm-a", "name": "Farm A", "size": 10, "createdAt": "2024-02-01T08:00:00Z" }
    ] })
}

pub fn sample_posts() -> Value {
    json!({ "posts": [
        { "_id": "post-1", "content": "Use mulch to keep moisture", "category": "Tips", "tags": ["soil", "water"], "likes": 5, "comments": 2, "isLiked": false },
        { "_id": "post-2", "content": "Why are my bean leaves yellow?", "category": "Questions", "tags": ["beans"], "likes": ["u1"], "isLiked": true }
    ] })
}

pub fn sample_weather() -> Value {
    json!({ "current": { "location": "Nakuru", "temperature": 24.5, "humidity": 60, "condition": "Sunny" } })
}

pub struct Harness {
    pub gateway: Arc<ScriptedGateway>,
    pub store: Arc<MemoryStore>,
    pub network: Arc<ConnectivityMonitor>,
}

impl Harness {
    pub fn new(gateway: ScriptedGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            store: Arc::new(MemoryStore::new()),
            network: Arc::new(ConnectivityMonitor::new(true)),
        }
    }

    pub fn aggregator(&self) -> DashboardAggregator {
        DashboardAggregator::new(self.gateway.clone(), self.store.clone(), self.network.clone())
    }
}

/// Fully populated gateway used by the happy-path scenarios.
pub fn healthy_gateway() -> ScriptedGateway {
    ScriptedGateway::new()
        .with_farms(two_farms())
        .with_crops("farm-a", farm_a_crops())
        .with_crops("farm-b", json!({ "crops": [] }))
        .with_weather(sample_weather())
        .with_posts(sample_posts())
}
