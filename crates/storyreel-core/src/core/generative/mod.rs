//! Generation Service Integration
//!
//! Request types and the client abstraction for the external generation
//! service: script analysis, image generation, and image-to-video animation.

pub mod client;
pub mod gemini;
pub mod image;
pub mod video;

// Re-export main types
pub use client::{GenerationClient, MockGenerationClient};
pub use gemini::GeminiClient;
pub use image::{AspectRatio, ImageEngine, ImageRequest, Resolution};
pub use video::{VideoModel, VideoRequest, VideoResolution, VideoSettings};
