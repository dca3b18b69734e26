//! Generation Settings
//!
//! User-selectable settings that shape analysis and image generation.

use serde::{Deserialize, Serialize};

use crate::core::generative::{AspectRatio, ImageEngine, Resolution};
use crate::core::scheduler::DEFAULT_CONCURRENCY;

/// Default number of scenes requested from analysis
const DEFAULT_TARGET_SCENE_COUNT: u32 = 20;

/// Settings applied to analysis and every image generation in a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Image generation engine
    pub engine: ImageEngine,
    /// Aspect ratio for scene images (characters always render square)
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier
    pub resolution: Resolution,
    /// Number of scenes the analysis should produce
    pub target_scene_count: u32,
    /// Concurrency cap for batch generation
    pub concurrency: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            engine: ImageEngine::Flash,
            aspect_ratio: AspectRatio::Landscape,
            resolution: Resolution::OneK,
            target_scene_count: DEFAULT_TARGET_SCENE_COUNT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl GenerationSettings {
    /// Sets the engine
    pub fn with_engine(mut self, engine: ImageEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the scene aspect ratio
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Sets the resolution tier
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the target scene count (minimum 1)
    pub fn with_target_scene_count(mut self, count: u32) -> Self {
        self.target_scene_count = count.max(1);
        self
    }

    /// Sets the batch concurrency cap (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}
