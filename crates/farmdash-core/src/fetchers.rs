//! Per-entity fetchers: one gateway call each, normalized into view-model
//! types. Records that cannot be identified are skipped with a warning.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{GatewayError, MutationError};
use crate::gateway::ApiGateway;
use crate::normalize::{
    extract_list, extract_object, normalize_activity, normalize_automation_rule, normalize_comment,
    normalize_crop, normalize_farm, normalize_image, normalize_post, normalize_sensor_reading,
    normalize_weather,
};
use crate::types::{
    AutomationRule, Comment, CommunityPost, Crop, CropActivity, CropImage, Farm, Location,
    NewCrop, NewFarm, NewPost, PostQuery, SensorReading, WeatherData,
};
use crate::validation::{validate_comment, validate_new_crop, validate_new_farm, validate_new_post};

fn normalize_all<T>(
    entity: &'static str,
    items: &[Value],
    normalize: impl Fn(&Value) -> Option<T>,
) -> Vec<T> {
    let mut skipped = 0usize;
    let out: Vec<T> = items
        .iter()
        .filter_map(|item| {
            let parsed = normalize(item);
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();
    if skipped > 0 {
        warn!(entity, skipped, "skipped records without a usable identifier");
    }
    out
}

pub async fn fetch_farms(gateway: &dyn ApiGateway) -> Result<Vec<Farm>, GatewayError> {
    let payload = gateway.get_farms().await?;
    let items = extract_list(&payload, &["farms"])?;
    Ok(normalize_all("farm", &items, normalize_farm))
}

pub async fn fetch_crops(
    gateway: &dyn ApiGateway,
    farm_id: Option<&str>,
) -> Result<Vec<Crop>, GatewayError> {
    let payload = gateway.get_crops(farm_id).await?;
    let items = extract_list(&payload, &["crops"])?;
    let crops = normalize_all("crop", &items, |item| normalize_crop(item, farm_id));
    debug!(farm_id, count = crops.len(), "fetched crops");
    Ok(crops)
}

pub async fn fetch_weather(
    gateway: &dyn ApiGateway,
    location: Option<&str>,
) -> Result<Vec<WeatherData>, GatewayError> {
    let payload = gateway.get_weather(location).await?;
    normalize_weather(&payload)
}

pub async fn fetch_posts(
    gateway: &dyn ApiGateway,
    query: &PostQuery,
) -> Result<Vec<CommunityPost>, GatewayError> {
    let payload = gateway.get_community_posts(query).await?;
    let items = extract_list(&payload, &["posts"])?;
    Ok(normalize_all("post", &items, normalize_post))
}

pub async fn fetch_trending_posts(
    gateway: &dyn ApiGateway,
    limit: usize,
) -> Result<Vec<CommunityPost>, GatewayError> {
    let payload = gateway.get_trending_posts(limit).await?;
    let items = extract_list(&payload, &["posts"])?;
    let mut posts = normalize_all("post", &items, normalize_post);
    posts.truncate(limit);
    Ok(posts)
}

pub async fn fetch_comments(
    gateway: &dyn ApiGateway,
    post_id: &str,
) -> Result<Vec<Comment>, GatewayError> {
    let payload = gateway.get_post_comments(post_id).await?;
    let items = extract_list(&payload, &["comments"])?;
    Ok(normalize_all("comment", &items, |item| {
        normalize_comment(item, post_id)
    }))
}

pub async fn fetch_crop_activities(
    gateway: &dyn ApiGateway,
    crop_id: &str,
) -> Result<Vec<CropActivity>, GatewayError> {
    let payload = gateway.get_crop_activities(crop_id).await?;
    let items = extract_list(&payload, &["activities"])?;
    Ok(normalize_all("crop_activity", &items, |item| {
        normalize_activity(item, crop_id)
    }))
}

pub async fn fetch_crop_images(
    gateway: &dyn ApiGateway,
    crop_id: &str,
) -> Result<Vec<CropImage>, GatewayError> {
    let payload = gateway.get_crop_images(crop_id).await?;
    let items = extract_list(&payload, &["images"])?;
    Ok(normalize_all("crop_image", &items, |item| {
        normalize_image(item, crop_id)
    }))
}

pub async fn fetch_sensor_readings(
    gateway: &dyn ApiGateway,
    farm_id: &str,
) -> Result<Vec<SensorReading>, GatewayError> {
    let payload = gateway.get_sensor_data(farm_id).await?;
    let items = extract_list(&payload, &["sensors", "readings"])?;
    Ok(normalize_all("sensor_reading", &items, |item| {
        normalize_sensor_reading(item, farm_id)
    }))
}

pub async fn fetch_automation_rules(
    gateway: &dyn ApiGateway,
    farm_id: &str,
) -> Result<Vec<AutomationRule>, GatewayError> {
    let payload = gateway.get_automation_rules(farm_id).await?;
    let items = extract_list(&payload, &["rules"])?;
    Ok(normalize_all("automation_rule", &items, |item| {
        normalize_automation_rule(item, farm_id)
    }))
}

fn decode_created<T>(
    entity: &str,
    payload: &Value,
    keys: &[&str],
    normalize: impl Fn(&Value) -> Option<T>,
) -> Result<T, GatewayError> {
    let object = extract_object(payload, keys)?;
    normalize(&object).ok_or_else(|| {
        GatewayError::Decode(format!("created {entity} response carried no identifier"))
    })
}

pub async fn create_crop(gateway: &dyn ApiGateway, crop: &NewCrop) -> Result<Crop, MutationError> {
    validate_new_crop(crop)?;
    let body = serde_json::to_value(crop)
        .map_err(|err| GatewayError::Decode(format!("failed to encode crop: {err}")))?;
    let payload = gateway.create_crop(body).await?;
    let created = decode_created("crop", &payload, &["crop"], |item| {
        normalize_crop(item, Some(crop.farm_id.as_str()))
    })?;
    Ok(created)
}

fn location_body(location: &Location) -> Value {
    match location {
        Location::FreeText { text } => json!(text.trim()),
        Location::Structured {
            country,
            province,
            district,
        } => json!({ "country": country, "province": province, "district": district }),
    }
}

pub async fn create_farm(gateway: &dyn ApiGateway, farm: &NewFarm) -> Result<Farm, MutationError> {
    validate_new_farm(farm)?;
    let body = json!({
        "name": farm.name.trim(),
        "location": location_body(&farm.location),
        "size": farm.size,
    });
    let payload = gateway.create_farm(body).await?;
    Ok(decode_created("farm", &payload, &["farm"], normalize_farm)?)
}

pub async fn create_post(
    gateway: &dyn ApiGateway,
    post: &NewPost,
) -> Result<CommunityPost, MutationError> {
    let post = validate_new_post(post)?;
    let body = json!({
        "content": post.content,
        "category": post.category.label(),
        "tags": post.tags,
    });
    let payload = gateway.create_community_post(body).await?;
    Ok(decode_created("post", &payload, &["post"], normalize_post)?)
}

/// Adds a comment. The backend may answer with the comment or with an
/// empty body; only the former yields `Some`.
pub async fn add_comment(
    gateway: &dyn ApiGateway,
    post_id: &str,
    text: &str,
) -> Result<Option<Comment>, MutationError> {
    let text = validate_comment(text)?;
    let payload = gateway.add_post_comment(post_id, &text).await?;
    if payload.is_null() {
        return Ok(None);
    }
    let comment = extract_object(&payload, &["comment"])
        .ok()
        .and_then(|object| normalize_comment(&object, post_id));
    Ok(comment)
}

pub async fn delete_crop(gateway: &dyn ApiGateway, crop_id: &str) -> Result<(), GatewayError> {
    gateway.delete_crop(crop_id).await
}

pub async fn delete_farm(gateway: &dyn ApiGateway, farm_id: &str) -> Result<(), GatewayError> {
    gateway.delete_farm(farm_id).await
}

pub async fn like_post(gateway: &dyn ApiGateway, post_id: &str) -> Result<(), GatewayError> {
    gateway.like_community_post(post_id).await
}

pub async fn unlike_post(gateway: &dyn ApiGateway, post_id: &str) -> Result<(), GatewayError> {
    gateway.unlike_community_post(post_id).await
}
