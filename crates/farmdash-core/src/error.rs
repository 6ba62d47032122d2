// crates/farmdash-core/src/error.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationError;

/// Failure reported by the API gateway for a single request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unexpected status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("offline store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("offline store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("offline store unavailable: {0}")]
    Unavailable(String),
}

/// Hard failures of a dashboard load. Everything else degrades into the
/// view model's error slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("invalid user id {0:?}")]
    InvalidUserId(String),
}

/// Errors returned by validated mutations. Validation runs before the
/// gateway is touched.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationErrorKind {
    NetworkUnreachable,
    PartialFarmFailure,
    PartialCropFailure,
    AuthFailure,
    SyncFailure,
}

impl AggregationErrorKind {
    /// Higher ranks win when several failures compete for the error slot.
    fn rank(self) -> u8 {
        match self {
            AggregationErrorKind::AuthFailure => 4,
            AggregationErrorKind::NetworkUnreachable => 3,
            AggregationErrorKind::PartialFarmFailure => 2,
            AggregationErrorKind::PartialCropFailure => 1,
            AggregationErrorKind::SyncFailure => 0,
        }
    }
}

/// Classified failure carried in `DashboardViewModel::error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationError {
    pub kind: AggregationErrorKind,
    pub cause: String,
}

impl AggregationError {
    pub fn new(kind: AggregationErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    /// Classifies a gateway failure, promoting auth errors over `fallback`.
    pub fn from_gateway(fallback: AggregationErrorKind, err: &GatewayError) -> Self {
        let kind = if err.is_auth() {
            AggregationErrorKind::AuthFailure
        } else {
            fallback
        };
        Self::new(kind, err.to_string())
    }

    pub fn is_auth(&self) -> bool {
        self.kind == AggregationErrorKind::AuthFailure
    }
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.cause)
    }
}

/// Keeps whichever error ranks higher in `slot`. Ties keep the earlier one.
pub fn record_error(slot: &mut Option<AggregationError>, candidate: AggregationError) {
    match slot {
        Some(existing) if existing.kind.rank() >= candidate.kind.rank() => {}
        _ => *slot = Some(candidate),
    }
}
