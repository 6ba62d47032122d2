// crates/farmdash-core/src/types.rs

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AggregationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    FreeText {
        text: String,
    },
    Structured {
        country: Option<String>,
        province: Option<String>,
        district: Option<String>,
    },
}

impl Location {
    pub fn is_empty(&self) -> bool {
        match self {
            Location::FreeText { text } => text.trim().is_empty(),
            Location::Structured {
                country,
                province,
                district,
            } => [country, province, district]
                .iter()
                .all(|part| part.as_deref().map_or(true, |p| p.trim().is_empty())),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::FreeText { text } => f.write_str(text),
            Location::Structured {
                country,
                province,
                district,
            } => {
                let parts: Vec<&str> = [district, province, country]
                    .iter()
                    .filter_map(|part| part.as_deref())
                    .filter(|part| !part.trim().is_empty())
                    .collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub id: String,
    pub name: String,
    pub location: Option<Location>,
    /// Area in the backend's unit; never negative, 0 when unknown.
    pub size: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropStatus {
    Planted,
    Growing,
    Flowering,
    Ready,
    Other(String),
}

impl CropStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "planted" => CropStatus::Planted,
            "growing" => CropStatus::Growing,
            "flowering" => CropStatus::Flowering,
            "ready" => CropStatus::Ready,
            _ => CropStatus::Other(raw.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub id: String,
    pub name: String,
    pub variety: Option<String>,
    pub planting_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    pub status: CropStatus,
    pub growth_stage: Option<String>,
    pub area: f64,
    /// Canonical farm reference, resolved once at fetch time.
    pub farm_id: Option<String>,
    pub user_id: Option<String>,
    pub notes: Option<String>,
    pub images: Vec<String>,
}

impl Crop {
    /// Growth progress in percent at `now`, clamped to `[0, 100]`.
    pub fn progress_at(&self, now: DateTime<Utc>) -> f64 {
        let Some(planted) = self.planting_date else {
            return 0.0;
        };
        if now < planted {
            return 0.0;
        }
        let Some(harvest) = self.expected_harvest_date else {
            return 100.0;
        };
        if harvest <= planted || now >= harvest {
            return 100.0;
        }

        let elapsed = (now - planted).num_milliseconds() as f64;
        let total = (harvest - planted).num_milliseconds() as f64;
        (elapsed / total * 100.0).clamp(0.0, 100.0)
    }

    pub fn progress(&self) -> f64 {
        self.progress_at(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostCategory {
    Tips,
    Questions,
    #[serde(rename = "Success Stories")]
    SuccessStories,
    Problems,
    General,
}

impl PostCategory {
    pub fn label(self) -> &'static str {
        match self {
            PostCategory::Tips => "Tips",
            PostCategory::Questions => "Questions",
            PostCategory::SuccessStories => "Success Stories",
            PostCategory::Problems => "Problems",
            PostCategory::General => "General",
        }
    }

    /// Unknown labels fall back to `General`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tips" => PostCategory::Tips,
            "questions" => PostCategory::Questions,
            "success stories" | "success_stories" | "successstories" => {
                PostCategory::SuccessStories
            }
            "problems" => PostCategory::Problems,
            _ => PostCategory::General,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: String,
    pub author: AuthorRef,
    pub content: String,
    pub category: PostCategory,
    pub tags: BTreeSet<String>,
    pub likes: u32,
    pub comments: u32,
    pub views: u32,
    pub is_liked: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: AuthorRef,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub location: Option<String>,
    pub temperature_c: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub condition: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropActivity {
    pub id: String,
    pub crop_id: String,
    pub activity_type: String,
    pub description: Option<String>,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropImage {
    pub id: String,
    pub crop_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub farm_id: String,
    pub kind: String,
    pub value: f64,
    pub unit: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub farm_id: String,
    pub name: String,
    pub enabled: bool,
    pub condition: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub farm_count: usize,
    pub total_area: f64,
    pub crop_types: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmOverview {
    pub farm: Farm,
    pub crops: Vec<Crop>,
}

/// Output of one aggregation pass. Either live or cached data is
/// authoritative; `is_offline` says which.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardViewModel {
    pub stats: UserStats,
    pub farms: Vec<FarmOverview>,
    pub recent_farms: Vec<Farm>,
    pub weather: Vec<WeatherData>,
    pub posts: Vec<CommunityPost>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_offline: bool,
    pub pending_changes: usize,
    pub error: Option<AggregationError>,
}

impl DashboardViewModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.farms.is_empty() && self.weather.is_empty() && self.posts.is_empty()
    }

    pub fn crop_count(&self) -> usize {
        self.farms.iter().map(|overview| overview.crops.len()).sum()
    }

    pub fn farm(&self, farm_id: &str) -> Option<&FarmOverview> {
        self.farms.iter().find(|overview| overview.farm.id == farm_id)
    }

    pub fn post(&self, post_id: &str) -> Option<&CommunityPost> {
        self.posts.iter().find(|post| post.id == post_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrop {
    pub name: String,
    pub variety: Option<String>,
    pub farm_id: String,
    pub planting_date: Option<NaiveDate>,
    pub expected_harvest_date: Option<NaiveDate>,
    pub area: Option<f64>,
    pub growth_stage: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFarm {
    pub name: String,
    pub location: Location,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub content: String,
    pub category: PostCategory,
    pub tags: Vec<String>,
}

/// Paging and filtering for the community feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<PostCategory>,
    pub search: Option<String>,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            category: None,
            search: None,
        }
    }
}

impl PostQuery {
    pub fn first_page(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn crop(planted: Option<DateTime<Utc>>, harvest: Option<DateTime<Utc>>) -> Crop {
        Crop {
            id: "c1".into(),
            name: "Maize".into(),
            variety: None,
            planting_date: planted,
            expected_harvest_date: harvest,
            status: CropStatus::Growing,
            growth_stage: None,
            area: 0.0,
            farm_id: None,
            user_id: None,
            notes: None,
            images: Vec::new(),
        }
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let c = crop(Some(day(2024, 3, 1)), Some(day(2024, 3, 11)));
        assert_eq!(c.progress_at(day(2024, 2, 1)), 0.0);
        assert_eq!(c.progress_at(day(2024, 3, 6)), 50.0);
        assert_eq!(c.progress_at(day(2024, 4, 1)), 100.0);

        let samples: Vec<f64> = (1..=12).map(|d| c.progress_at(day(2024, 3, d))).collect();
        assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn progress_without_dates() {
        assert_eq!(crop(None, None).progress_at(day(2024, 1, 1)), 0.0);
        assert_eq!(crop(Some(day(2024, 1, 1)), None).progress_at(day(2024, 2, 1)), 100.0);
        let inverted = crop(Some(day(2024, 5, 1)), Some(day(2024, 4, 1)));
        assert_eq!(inverted.progress_at(day(2024, 5, 2)), 100.0);
    }

    #[test]
    fn unknown_labels_fall_back() {
        assert_eq!(CropStatus::parse(" Ready "), CropStatus::Ready);
        assert_eq!(CropStatus::parse("Harvested"), CropStatus::Other("Harvested".into()));
        assert_eq!(PostCategory::parse("nonsense"), PostCategory::General);
    }
}
