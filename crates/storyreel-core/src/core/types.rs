//! Storyreel Core Type Definitions
//!
//! Fundamental identifier and status types used throughout the crate.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity unique identifier (ULID)
pub type EntityId = String;

/// Generated asset unique identifier (UUID v4)
pub type AssetId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Timestamp in milliseconds since the Unix epoch
pub type TimestampMs = i64;

/// Returns the current timestamp in milliseconds
pub fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Generation Status
// =============================================================================

/// Lifecycle status shared by entity image generation and per-asset video
/// generation. The cycle `pending → generating → {completed, failed}` can
/// re-enter `generating` from either terminal state; no state is final.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Never attempted (or recreated by reconciliation)
    #[default]
    Pending,
    /// A service call is in flight
    Generating,
    /// Last attempt succeeded
    Completed,
    /// Last attempt failed
    Failed,
}

impl GenerationStatus {
    /// Whether the status is a terminal state of one attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Whether a new generation attempt may start from this status
    pub fn can_start(&self) -> bool {
        !matches!(self, GenerationStatus::Generating)
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationStatus::Pending => write!(f, "pending"),
            GenerationStatus::Generating => write!(f, "generating"),
            GenerationStatus::Completed => write!(f, "completed"),
            GenerationStatus::Failed => write!(f, "failed"),
        }
    }
}
