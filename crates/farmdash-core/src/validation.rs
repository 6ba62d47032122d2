//! Form validation for user-submitted entities. Runs before any network
//! call; every issue is collected rather than stopping at the first.

use thiserror::Error;

use crate::types::{NewCrop, NewFarm, NewPost};

pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_POST_TAGS: usize = 10;

/// Collection of validation issues encountered while preparing a mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation failed: {}", summary(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    /// Message suitable for an alert dialog.
    pub fn user_message(&self) -> String {
        summary(&self.issues)
    }
}

/// Validation failure for a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn required(&mut self, field: &str, value: &str, label: &str) {
        if value.trim().is_empty() {
            self.0.push(ValidationIssue::new(
                field,
                "required",
                format!("{label} is required"),
            ));
        }
    }

    fn push(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.0.push(ValidationIssue::new(field, code, message));
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.0))
        }
    }
}

pub fn validate_new_crop(crop: &NewCrop) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    issues.required("name", &crop.name, "Crop name");
    issues.required("farm_id", &crop.farm_id, "Farm");

    match (crop.planting_date, crop.expected_harvest_date) {
        (None, _) => issues.push("planting_date", "required", "Planting date is required"),
        (Some(planted), Some(harvest)) if harvest < planted => issues.push(
            "expected_harvest_date",
            "before_planting",
            "Expected harvest date cannot be before the planting date",
        ),
        _ => {}
    }

    if let Some(area) = crop.area {
        if !area.is_finite() || area < 0.0 {
            issues.push("area", "range", "Area must be a non-negative number");
        }
    }

    issues.finish()
}

pub fn validate_new_farm(farm: &NewFarm) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    issues.required("name", &farm.name, "Farm name");
    if farm.location.is_empty() {
        issues.push("location", "required", "Location is required");
    }
    if !farm.size.is_finite() || farm.size < 0.0 {
        issues.push("size", "range", "Farm size must be a non-negative number");
    }
    issues.finish()
}

/// Returns the post with content trimmed and tags cleaned up.
pub fn validate_new_post(post: &NewPost) -> Result<NewPost, ValidationError> {
    let mut issues = Issues::default();
    let content = post.content.trim().to_string();
    issues.required("content", &content, "Post content");
    if content.chars().count() > MAX_POST_LENGTH {
        issues.push(
            "content",
            "too_long",
            format!("Post content cannot exceed {MAX_POST_LENGTH} characters"),
        );
    }

    let mut tags: Vec<String> = Vec::new();
    for tag in post.tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()) {
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.len() > MAX_POST_TAGS {
        issues.push(
            "tags",
            "too_many",
            format!("A post can have at most {MAX_POST_TAGS} tags"),
        );
    }

    issues.finish()?;
    Ok(NewPost {
        content,
        category: post.category,
        tags,
    })
}

pub fn validate_comment(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::single("text", "required", "Comment text is required"));
    }
    Ok(text.to_string())
}
