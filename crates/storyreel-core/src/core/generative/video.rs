//! Video Generation Types
//!
//! Parameters for animating a generated image into a short video clip.
//! Video generation is a long-running operation on the service side; clients
//! submit a request and poll the returned operation handle until terminal.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed interval between polls of a pending video operation
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// Enums
// =============================================================================

/// Video generation model tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoModel {
    /// Fast tier, default
    #[default]
    Fast,
    /// Quality tier
    Quality,
}

impl VideoModel {
    /// Model identifier sent to the service
    pub fn model_id(&self) -> &'static str {
        match self {
            VideoModel::Fast => "veo-3.1-fast-generate-preview",
            VideoModel::Quality => "veo-3.1-generate-preview",
        }
    }
}

impl std::fmt::Display for VideoModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoModel::Fast => write!(f, "Fast"),
            VideoModel::Quality => write!(f, "Quality"),
        }
    }
}

/// Output resolution for generated video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoResolution {
    /// 720p, default
    #[default]
    #[serde(rename = "720p")]
    P720,
    /// 1080p
    #[serde(rename = "1080p")]
    P1080,
}

impl VideoResolution {
    /// Resolution string sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoResolution::P720 => "720p",
            VideoResolution::P1080 => "1080p",
        }
    }
}

// =============================================================================
// Settings & Request
// =============================================================================

/// User-selectable video generation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    pub model: VideoModel,
    pub resolution: VideoResolution,
}

impl VideoSettings {
    /// Sets the model tier
    pub fn with_model(mut self, model: VideoModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the resolution
    pub fn with_resolution(mut self, resolution: VideoResolution) -> Self {
        self.resolution = resolution;
        self
    }
}

/// One image-to-video generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    /// Source image reference (an asset url from an entity's history)
    pub source_url: String,
    /// Motion / direction prompt
    pub prompt: String,
    /// Model and resolution selection
    pub settings: VideoSettings,
}

impl VideoRequest {
    /// Creates a new request
    pub fn new(
        source_url: impl Into<String>,
        prompt: impl Into<String>,
        settings: VideoSettings,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            prompt: prompt.into(),
            settings,
        }
    }

    /// Validates the request
    pub fn validate(&self) -> Result<(), String> {
        if self.source_url.trim().is_empty() {
            return Err("Source image URL cannot be empty".to_string());
        }
        if self.prompt.trim().is_empty() {
            return Err("Video prompt cannot be empty".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
