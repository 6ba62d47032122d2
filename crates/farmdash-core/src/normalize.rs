//! Canonicalizes raw gateway payloads into view-model entities.
//!
//! The backend is inconsistent about envelopes, identifier keys and how a
//! crop refers to its farm. Every shape is resolved here, once, so the
//! rest of the crate only sees the canonical fields.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{
    AuthorRef, AutomationRule, Comment, CommunityPost, Crop, CropActivity, CropImage, CropStatus,
    Farm, Location, PostCategory, SensorReading, WeatherData,
};

const ENVELOPE_KEYS: [&str; 3] = ["data", "items", "results"];

/// Pulls a list of entities out of a bare array or an envelope object.
///
/// `keys` are entity-specific envelope names (`farms`, `crops`, ...) tried
/// before the generic ones. `null` is treated as an empty list.
pub fn extract_list(payload: &Value, keys: &[&str]) -> Result<Vec<Value>, GatewayError> {
    match payload {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => {
            for key in keys.iter().chain(ENVELOPE_KEYS.iter()) {
                if let Some(inner) = map.get(*key) {
                    return extract_list(inner, keys);
                }
            }
            Err(GatewayError::Decode(format!(
                "expected a list under one of {keys:?}, got object with keys {:?}",
                map.keys().collect::<Vec<_>>()
            )))
        }
        other => Err(GatewayError::Decode(format!(
            "expected a list payload, got {}",
            type_name(other)
        ))),
    }
}

/// Pulls a single entity out of a bare object or an envelope object.
pub fn extract_object(payload: &Value, keys: &[&str]) -> Result<Value, GatewayError> {
    let Value::Object(map) = payload else {
        return Err(GatewayError::Decode(format!(
            "expected an object payload, got {}",
            type_name(payload)
        )));
    };
    for key in keys.iter().chain(ENVELOPE_KEYS.iter()) {
        if let Some(inner @ Value::Object(_)) = map.get(*key) {
            return extract_object(inner, keys);
        }
    }
    Ok(payload.clone())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty string (or number) among `keys`.
fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(scalar_string)
}

/// Identifier of an entity: `_id`, then `id`.
pub fn entity_id(value: &Value) -> Option<String> {
    text_field(value, &["_id", "id"])
}

/// Resolves a crop's farm reference.
///
/// Precedence: flat `farmId`, then nested `farm._id`, then nested
/// `farm.id`, then a bare `farm` string.
pub fn farm_reference(value: &Value) -> Option<String> {
    if let Some(flat) = value.get("farmId").and_then(scalar_string) {
        return Some(flat);
    }
    match value.get("farm") {
        Some(farm @ Value::Object(_)) => entity_id(farm),
        Some(other) => scalar_string(other),
        None => None,
    }
}

/// Numeric coercion used for sizes and areas: numbers and numeric strings
/// pass through, everything else (including negatives and NaN) is 0.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() && n > 0.0 => n,
        _ => 0.0,
    }
}

fn optional_number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn count_field(value: &Value, key: &str) -> u32 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(0),
        Some(Value::Array(items)) => u32::try_from(items.len()).unwrap_or(u32::MAX),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Parses RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp_field(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| parse_timestamp(value.get(*key)))
}

fn normalize_location(value: Option<&Value>) -> Option<Location> {
    let location = match value? {
        Value::String(text) => Location::FreeText {
            text: text.trim().to_string(),
        },
        obj @ Value::Object(_) => Location::Structured {
            country: text_field(obj, &["country"]),
            province: text_field(obj, &["province", "state", "region"]),
            district: text_field(obj, &["district", "city"]),
        },
        _ => return None,
    };
    (!location.is_empty()).then_some(location)
}

fn normalize_author(value: &Value) -> AuthorRef {
    match value.get("author").or_else(|| value.get("user")) {
        Some(author @ Value::Object(_)) => AuthorRef {
            id: entity_id(author),
            name: text_field(author, &["name", "username", "fullName"]),
        },
        Some(other) => AuthorRef {
            id: scalar_string(other),
            name: text_field(value, &["authorName"]),
        },
        None => AuthorRef {
            id: text_field(value, &["authorId", "userId"]),
            name: text_field(value, &["authorName"]),
        },
    }
}

pub fn normalize_farm(value: &Value) -> Option<Farm> {
    let id = entity_id(value)?;
    let size_value = value.get("size").or_else(|| value.get("area"));
    Some(Farm {
        name: text_field(value, &["name"]).unwrap_or_default(),
        location: normalize_location(value.get("location")),
        size: coerce_number(size_value),
        created_at: timestamp_field(value, &["createdAt", "created_at"]),
        id,
    })
}

/// `fallback_farm_id` is the farm the crop was requested for; it applies
/// only when the payload carries no farm reference of its own.
pub fn normalize_crop(value: &Value, fallback_farm_id: Option<&str>) -> Option<Crop> {
    let id = entity_id(value)?;
    let images = value
        .get("images")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(url) => Some(url.clone()),
                    obj @ Value::Object(_) => text_field(obj, &["url", "uri"]),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Crop {
        name: text_field(value, &["name", "cropName"]).unwrap_or_default(),
        variety: text_field(value, &["variety"]),
        planting_date: timestamp_field(value, &["plantingDate", "planting_date"]),
        expected_harvest_date: timestamp_field(
            value,
            &["expectedHarvestDate", "harvestDate", "expected_harvest_date"],
        ),
        status: text_field(value, &["status"])
            .map(|raw| CropStatus::parse(&raw))
            .unwrap_or(CropStatus::Planted),
        growth_stage: text_field(value, &["growthStage", "growth_stage"]),
        area: coerce_number(value.get("area")),
        farm_id: farm_reference(value).or_else(|| fallback_farm_id.map(str::to_string)),
        user_id: text_field(value, &["userId", "user"]),
        notes: text_field(value, &["notes"]),
        images,
        id,
    })
}

pub fn normalize_post(value: &Value) -> Option<CommunityPost> {
    let id = entity_id(value)?;
    let tags: BTreeSet<String> = value
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(scalar_string).collect())
        .unwrap_or_default();

    Some(CommunityPost {
        author: normalize_author(value),
        content: value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        category: text_field(value, &["category"])
            .map(|raw| PostCategory::parse(&raw))
            .unwrap_or(PostCategory::General),
        tags,
        likes: count_field(value, "likes"),
        comments: count_field(value, "comments"),
        views: count_field(value, "views"),
        is_liked: value
            .get("isLiked")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        created_at: timestamp_field(value, &["createdAt", "created_at"]),
        id,
    })
}

pub fn normalize_comment(value: &Value, post_id: &str) -> Option<Comment> {
    Some(Comment {
        id: entity_id(value)?,
        post_id: text_field(value, &["postId"]).unwrap_or_else(|| post_id.to_string()),
        author: normalize_author(value),
        text: text_field(value, &["text", "content"]).unwrap_or_default(),
        created_at: timestamp_field(value, &["createdAt", "created_at"]),
    })
}

fn normalize_weather_entry(value: &Value) -> Option<WeatherData> {
    if !value.is_object() {
        return None;
    }
    let entry = WeatherData {
        location: text_field(value, &["location", "name"]),
        temperature_c: optional_number(value.get("temperature").or_else(|| value.get("temp"))),
        humidity_percent: optional_number(value.get("humidity")),
        condition: text_field(value, &["condition", "description", "weather"]),
        recorded_at: timestamp_field(value, &["date", "timestamp", "recordedAt"]),
    };
    let has_reading = entry.temperature_c.is_some()
        || entry.humidity_percent.is_some()
        || entry.condition.is_some();
    has_reading.then_some(entry)
}

/// Weather arrives as a list, an envelope, or a single current reading.
pub fn normalize_weather(payload: &Value) -> Result<Vec<WeatherData>, GatewayError> {
    match extract_list(payload, &["weather", "forecast"]) {
        Ok(items) => Ok(items.iter().filter_map(normalize_weather_entry).collect()),
        Err(err) => match payload.get("current").unwrap_or(payload) {
            current @ Value::Object(_) => Ok(normalize_weather_entry(current).into_iter().collect()),
            _ => Err(err),
        },
    }
}

pub fn normalize_activity(value: &Value, crop_id: &str) -> Option<CropActivity> {
    Some(CropActivity {
        id: entity_id(value)?,
        crop_id: text_field(value, &["cropId"]).unwrap_or_else(|| crop_id.to_string()),
        activity_type: text_field(value, &["type", "activityType"])
            .unwrap_or_else(|| "other".to_string()),
        description: text_field(value, &["description", "notes"]),
        performed_at: timestamp_field(value, &["date", "performedAt", "createdAt"]),
    })
}

pub fn normalize_image(value: &Value, crop_id: &str) -> Option<CropImage> {
    Some(CropImage {
        id: entity_id(value)?,
        crop_id: text_field(value, &["cropId"]).unwrap_or_else(|| crop_id.to_string()),
        url: text_field(value, &["url", "uri", "imageUrl"])?,
        caption: text_field(value, &["caption", "description"]),
        uploaded_at: timestamp_field(value, &["uploadedAt", "createdAt"]),
    })
}

pub fn normalize_sensor_reading(value: &Value, farm_id: &str) -> Option<SensorReading> {
    Some(SensorReading {
        sensor_id: text_field(value, &["sensorId"]).or_else(|| entity_id(value))?,
        farm_id: farm_reference(value).unwrap_or_else(|| farm_id.to_string()),
        kind: text_field(value, &["type", "kind"]).unwrap_or_else(|| "unknown".to_string()),
        value: optional_number(value.get("value"))?,
        unit: text_field(value, &["unit"]),
        recorded_at: timestamp_field(value, &["timestamp", "recordedAt", "createdAt"]),
    })
}

pub fn normalize_automation_rule(value: &Value, farm_id: &str) -> Option<AutomationRule> {
    Some(AutomationRule {
        id: entity_id(value)?,
        farm_id: farm_reference(value).unwrap_or_else(|| farm_id.to_string()),
        name: text_field(value, &["name"]).unwrap_or_default(),
        enabled: value
            .get("enabled")
            .or_else(|| value.get("isActive"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        condition: text_field(value, &["condition", "trigger"]),
        action: text_field(value, &["action"]),
    })
}
