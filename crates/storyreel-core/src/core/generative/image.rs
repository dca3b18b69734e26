//! Image Generation Types
//!
//! Parameters for storyboard image generation.

use serde::{Deserialize, Serialize};

/// Longest prompt accepted before validation rejects the request
const MAX_PROMPT_LEN: usize = 4000;

// =============================================================================
// Enums
// =============================================================================

/// Image generation engine selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEngine {
    /// Fast engine, default
    #[default]
    Flash,
    /// Quality engine; additionally requests an explicit output size
    Pro,
}

impl ImageEngine {
    /// Model identifier sent to the service
    pub fn model_id(&self) -> &'static str {
        match self {
            ImageEngine::Flash => "imagen-3.0-generate-001",
            ImageEngine::Pro => "imagen-3.0-generate-001",
        }
    }

    /// Whether the engine honors an explicit resolution request
    pub fn supports_resolution(&self) -> bool {
        matches!(self, ImageEngine::Pro)
    }
}

impl std::fmt::Display for ImageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageEngine::Flash => write!(f, "Flash"),
            ImageEngine::Pro => write!(f, "Pro"),
        }
    }
}

/// Output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 1:1, used for character portraits
    Square,
    /// 16:9, the storyboard default
    #[default]
    Landscape,
    /// 9:16, for vertical formats
    Portrait,
}

impl AspectRatio {
    /// Ratio string sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// Output resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 1K output, default
    #[default]
    OneK,
    /// 2K output
    TwoK,
    /// 4K output
    FourK,
}

impl Resolution {
    /// Size string sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

// =============================================================================
// Image Request
// =============================================================================

/// One image generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    /// Prompt describing the image
    pub prompt: String,
    /// Engine selector
    pub engine: ImageEngine,
    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,
    /// Output resolution (honored by Pro only)
    pub resolution: Resolution,
}

impl ImageRequest {
    /// Creates a request with default engine settings
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            engine: ImageEngine::default(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
        }
    }

    /// Sets the engine
    pub fn with_engine(mut self, engine: ImageEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the aspect ratio
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Sets the resolution
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Validates the request
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        if self.prompt.len() > MAX_PROMPT_LEN {
            return Err(format!(
                "Prompt too long (max {} characters)",
                MAX_PROMPT_LEN
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
