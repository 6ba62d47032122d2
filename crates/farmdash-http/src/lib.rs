//! reqwest-backed implementation of the farmdash API gateway.

use std::time::Duration;

use async_trait::async_trait;
use farmdash_core::config::ApiConfig;
use farmdash_core::error::GatewayError;
use farmdash_core::gateway::ApiGateway;
use farmdash_core::types::PostQuery;
use reqwest::{Method, RequestBuilder, Url};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(GatewayError::Configuration(
                "base url cannot be empty".into(),
            ));
        }
        let base = Url::parse(base_url)
            .map_err(|err| GatewayError::Configuration(format!("invalid base url {base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Configuration(format!(
                "{base_url} cannot be used as a base url"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Configuration(err.to_string()))?;

        Ok(Self {
            client,
            base,
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, GatewayError> {
        Self::new(
            &config.base_url,
            config.auth_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Appends `segments` to the base path, percent-encoding each one so
    /// an id can never change the route.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                GatewayError::Configuration(format!("{} cannot be used as a base url", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, GatewayError> {
        let builder = self.client.request(method, self.endpoint(segments)?);
        Ok(match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, GatewayError> {
        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.map_err(map_transport)?;
        debug!(%url, status, "gateway response");

        match classify_status(status, &body) {
            Some(err) => Err(err),
            None => Ok(body),
        }
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, GatewayError> {
        let body = self.send(builder).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), GatewayError> {
        self.send(builder).await.map(|_| ())
    }
}

/// Maps a non-success status to the gateway error taxonomy. `None` means
/// the response succeeded.
pub fn classify_status(status: u16, body: &str) -> Option<GatewayError> {
    if (200..300).contains(&status) {
        return None;
    }
    let message = error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    Some(match status {
        401 | 403 => GatewayError::Auth(message),
        404 => GatewayError::NotFound(message),
        code => GatewayError::Status { code, message },
    })
}

fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ["message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

fn map_transport(err: reqwest::Error) -> GatewayError {
    if err.is_builder() {
        GatewayError::Configuration(err.to_string())
    } else if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else {
        GatewayError::Network(err.to_string())
    }
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn get_farms(&self) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::GET, &["farms"])?).await
    }

    async fn create_farm(&self, data: Value) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::POST, &["farms"])?.json(&data))
            .await
    }

    async fn delete_farm(&self, id: &str) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::DELETE, &["farms", id])?)
            .await
    }

    async fn get_crops(&self, farm_id: Option<&str>) -> Result<Value, GatewayError> {
        let mut builder = self.request(Method::GET, &["crops"])?;
        if let Some(farm_id) = farm_id {
            builder = builder.query(&[("farmId", farm_id)]);
        }
        self.send_json(builder).await
    }

    async fn create_crop(&self, data: Value) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::POST, &["crops"])?.json(&data))
            .await
    }

    async fn delete_crop(&self, id: &str) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::DELETE, &["crops", id])?)
            .await
    }

    async fn get_crop_activities(&self, crop_id: &str) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::GET, &["crops", crop_id, "activities"])?)
            .await
    }

    async fn get_crop_images(&self, crop_id: &str) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::GET, &["crops", crop_id, "images"])?)
            .await
    }

    async fn get_weather(&self, location: Option<&str>) -> Result<Value, GatewayError> {
        let mut builder = self.request(Method::GET, &["weather"])?;
        if let Some(location) = location {
            builder = builder.query(&[("location", location)]);
        }
        self.send_json(builder).await
    }

    async fn get_community_posts(&self, query: &PostQuery) -> Result<Value, GatewayError> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(category) = query.category {
            params.push(("category", category.label().to_string()));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("search", search.trim().to_string()));
        }
        self.send_json(self.request(Method::GET, &["community", "posts"])?.query(&params))
            .await
    }

    async fn get_trending_posts(&self, limit: usize) -> Result<Value, GatewayError> {
        self.send_json(
            self.request(Method::GET, &["community", "posts", "trending"])?
                .query(&[("limit", limit.to_string())]),
        )
        .await
    }

    async fn create_community_post(&self, data: Value) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::POST, &["community", "posts"])?.json(&data))
            .await
    }

    async fn like_community_post(&self, id: &str) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::POST, &["community", "posts", id, "like"])?)
            .await
    }

    async fn unlike_community_post(&self, id: &str) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::DELETE, &["community", "posts", id, "like"])?)
            .await
    }

    async fn get_post_comments(&self, post_id: &str) -> Result<Value, GatewayError> {
        self.send_json(self.request(Method::GET, &["community", "posts", post_id, "comments"])?)
            .await
    }

    async fn add_post_comment(&self, post_id: &str, text: &str) -> Result<Value, GatewayError> {
        self.send_json(
            self.request(Method::POST, &["community", "posts", post_id, "comments"])?
                .json(&json!({ "text": text })),
        )
        .await
    }

    async fn get_sensor_data(&self, farm_id: &str) -> Result<Value, GatewayError> {
        self.send_json(
            self.request(Method::GET, &["iot", "sensors"])?
                .query(&[("farmId", farm_id)]),
        )
        .await
    }

    async fn get_automation_rules(&self, farm_id: &str) -> Result<Value, GatewayError> {
        self.send_json(
            self.request(Method::GET, &["iot", "automation-rules"])?
                .query(&[("farmId", farm_id)]),
        )
        .await
    }
}
