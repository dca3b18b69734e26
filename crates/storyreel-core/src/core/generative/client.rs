//! Generation Service Client
//!
//! Client abstraction for the external generation service, plus a
//! configurable mock used by tests and dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::image::ImageRequest;
use super::video::VideoRequest;
use crate::core::analysis::AnalysisResult;
use crate::core::{CoreError, CoreResult};

/// Trait for generation service clients
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the client name
    fn name(&self) -> &str;

    /// Analyzes script parts into a storyboard of scenes and characters.
    ///
    /// Fails with [`CoreError::AnalysisFailed`] on malformed input, an empty
    /// script, or upstream rejection.
    async fn analyze(
        &self,
        script_parts: &[String],
        target_scene_count: u32,
    ) -> CoreResult<AnalysisResult>;

    /// Generates one image and returns its asset URL.
    ///
    /// Fails with [`CoreError::GenerationRefused`] on a content-policy block
    /// (carrying the model-provided reason) or
    /// [`CoreError::GenerationTransport`] on a network/service fault.
    async fn generate_image(&self, request: &ImageRequest) -> CoreResult<String>;

    /// Animates a source image into a video and returns the video URL.
    ///
    /// Implemented as submit-then-poll against a long-running operation
    /// handle; fails with [`CoreError::VideoFailed`].
    async fn generate_video(&self, request: &VideoRequest) -> CoreResult<String>;
}

// ============================================================================
// Mock Client for Testing
// ============================================================================

/// Mock generation client with scripted behavior.
///
/// Refusals are triggered by prompt substring so tests can fail one entity of
/// a batch without touching its siblings. In-flight call counting lets tests
/// assert the scheduler's concurrency bound from the service's point of view.
pub struct MockGenerationClient {
    latency: Duration,
    analysis: Mutex<Option<AnalysisResult>>,
    refuse_substring: Option<String>,
    fail_substring: Option<String>,
    fail_video: bool,
    image_calls: AtomicUsize,
    video_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationClient {
    /// Creates a mock that succeeds on every call
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(10),
            analysis: Mutex::new(None),
            refuse_substring: None,
            fail_substring: None,
            fail_video: false,
            image_calls: AtomicUsize::new(0),
            video_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the simulated per-call latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the analysis result returned by `analyze`
    pub fn with_analysis(self, analysis: AnalysisResult) -> Self {
        *self.analysis.lock().unwrap() = Some(analysis);
        self
    }

    /// Refuses image prompts containing the given substring
    pub fn refusing_prompts_containing(mut self, fragment: impl Into<String>) -> Self {
        self.refuse_substring = Some(fragment.into());
        self
    }

    /// Fails image prompts containing the given substring with a transport
    /// error
    pub fn failing_prompts_containing(mut self, fragment: impl Into<String>) -> Self {
        self.fail_substring = Some(fragment.into());
        self
    }

    /// Fails every video request
    pub fn with_failing_video(mut self) -> Self {
        self.fail_video = true;
        self
    }

    /// Number of image calls issued so far
    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    /// Number of video calls issued so far
    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }

    /// Highest number of image calls observed in flight simultaneously
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(
        &self,
        script_parts: &[String],
        _target_scene_count: u32,
    ) -> CoreResult<AnalysisResult> {
        if script_parts.iter().all(|p| p.trim().is_empty()) {
            return Err(CoreError::AnalysisFailed("script is empty".to_string()));
        }
        tokio::time::sleep(self.latency).await;
        self.analysis
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CoreError::AnalysisFailed("no scripted analysis result".to_string()))
    }

    async fn generate_image(&self, request: &ImageRequest) -> CoreResult<String> {
        let call = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.enter();
        tokio::time::sleep(self.latency).await;
        self.exit();

        if let Some(fragment) = &self.refuse_substring {
            if request.prompt.contains(fragment.as_str()) {
                return Err(CoreError::GenerationRefused(format!(
                    "prompt contains disallowed content: {}",
                    fragment
                )));
            }
        }
        if let Some(fragment) = &self.fail_substring {
            if request.prompt.contains(fragment.as_str()) {
                return Err(CoreError::GenerationTransport(
                    "service unavailable".to_string(),
                ));
            }
        }
        Ok(format!("mock://image/{}", call))
    }

    async fn generate_video(&self, request: &VideoRequest) -> CoreResult<String> {
        let call = self.video_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;
        if self.fail_video {
            return Err(CoreError::VideoFailed("operation failed".to_string()));
        }
        if request.source_url.is_empty() {
            return Err(CoreError::VideoFailed("missing source image".to_string()));
        }
        Ok(format!("mock://video/{}", call))
    }
}

// ============================================================================
// Tests
// ============================================================================
