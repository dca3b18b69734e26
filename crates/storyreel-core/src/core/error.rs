//! Storyreel Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::EntityId;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Analysis Errors
    // =========================================================================
    #[error("Script analysis failed: {0}")]
    AnalysisFailed(String),

    // =========================================================================
    // Generation Errors
    // =========================================================================
    /// Content-policy rejection; carries the model-provided reason verbatim
    #[error("Generation refused: {0}")]
    GenerationRefused(String),

    /// Network or service fault during image generation
    #[error("Generation failed: {0}")]
    GenerationTransport(String),

    #[error("Video generation failed: {0}")]
    VideoFailed(String),

    // =========================================================================
    // Entity Errors
    // =========================================================================
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Asset not found in history: {0}")]
    AssetNotFound(String),

    // =========================================================================
    // Scheduler Errors
    // =========================================================================
    #[error("A generation batch is already running")]
    BatchActive,

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this error is a content-policy refusal rather than a
    /// transport-level fault
    pub fn is_refusal(&self) -> bool {
        matches!(self, CoreError::GenerationRefused(_))
    }
}
