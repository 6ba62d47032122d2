use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::PostQuery;

/// Facade over the remote farm-management API.
///
/// Read operations return the raw JSON payload; shape differences are
/// resolved by [`crate::normalize`] in the per-entity fetchers.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn get_farms(&self) -> Result<Value, GatewayError>;
    async fn create_farm(&self, data: Value) -> Result<Value, GatewayError>;
    async fn delete_farm(&self, id: &str) -> Result<(), GatewayError>;

    async fn get_crops(&self, farm_id: Option<&str>) -> Result<Value, GatewayError>;
    async fn create_crop(&self, data: Value) -> Result<Value, GatewayError>;
    async fn delete_crop(&self, id: &str) -> Result<(), GatewayError>;
    async fn get_crop_activities(&self, crop_id: &str) -> Result<Value, GatewayError>;
    async fn get_crop_images(&self, crop_id: &str) -> Result<Value, GatewayError>;

    async fn get_weather(&self, location: Option<&str>) -> Result<Value, GatewayError>;

    async fn get_community_posts(&self, query: &PostQuery) -> Result<Value, GatewayError>;
    async fn get_trending_posts(&self, limit: usize) -> Result<Value, GatewayError>;
    async fn create_community_post(&self, data: Value) -> Result<Value, GatewayError>;
    async fn like_community_post(&self, id: &str) -> Result<(), GatewayError>;
    async fn unlike_community_post(&self, id: &str) -> Result<(), GatewayError>;
    async fn get_post_comments(&self, post_id: &str) -> Result<Value, GatewayError>;
    async fn add_post_comment(&self, post_id: &str, text: &str) -> Result<Value, GatewayError>;

    async fn get_sensor_data(&self, farm_id: &str) -> Result<Value, GatewayError>;
    async fn get_automation_rules(&self, farm_id: &str) -> Result<Value, GatewayError>;
}
