//! Gemini Generation Client
//!
//! [`GenerationClient`] implementation backed by the Google Generative
//! Language API: Gemini for script analysis, Imagen for storyboard images,
//! and Veo (submit + poll) for image-to-video animation.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::GenerationClient;
use super::image::ImageRequest;
use super::video::{VideoRequest, POLL_INTERVAL};
use crate::core::analysis::{format_script_parts, AnalysisResult};
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Constants
// =============================================================================

/// Default base URL for the Generative Language API
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for script analysis
const DEFAULT_ANALYSIS_MODEL: &str = "gemini-1.5-flash";

/// Sampling temperature for analysis; raised for dramatic creativity
const ANALYSIS_TEMPERATURE: f32 = 0.5;

/// House-style suffix appended to every image prompt
const SAFE_PROMPT_SUFFIX: &str = "Masterpiece, best quality, authentic historical drama style, \
     detailed period costumes and accessories. NO children, NO babies. \
     If prompt implies a child, use POV or obscure view.";

fn data_url_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:image/\w+;base64,").expect("valid data-url regex"))
}

fn analysis_system_instruction(target_scene_count: u32, body_parts: usize) -> String {
    format!(
        "You are an expert film director and cinematographer specializing in \
         WORLD HISTORY DRAMA (Historical Epic).\n\
         You are provided with a script structure containing:\n\
         1. **INTRO**: This is the \"HOOK\". It contains the HIGHEST CONFLICT/CLIMAX of the story.\n\
         2. **BODY PARTS (1~{body_parts})**: The rest of the narrative (context, development, etc.).\n\n\
         **CORE TASK:**\n\
         1. **Analyze the Intro (The Conflict)**: Understand the intense emotion, danger, or drama in the Intro.\n\
         2. **Analyze the Flow**: Read the Body Parts to understand how this conflict fits into the wider story.\n\
         3. **Storyboard Generation**: Create exactly {target_scene_count} scenes.\n\
            - **SCENE #1 MUST CORRESPOND TO THE INTRO (CLIMAX).**\n\
            - Scene #1 must be the most visually striking scene to capture the audience immediately.\n\n\
         **VIDEO PROMPT RULES (CRITICAL):**\n\
         - **Goal**: Create a prompt that generates a NATURAL, highly realistic, and INTENSE video.\n\
         - **Focus**: Since the Intro is the climax, the video prompt for Scene #1 must describe extreme tension.\n\
         - **Structure (English)**: \"[Camera Movement]. [Lighting/Atmosphere]. [Action/Emotion]. [Details].\"\n\n\
         **SAFETY RULE (NO CHILDREN):**\n\
         - **ABSOLUTELY NO VISUAL DEPICTION OF CHILDREN OR BABIES.**\n\
         - If the script involves a child, use a **CINEMATIC WORKAROUND** for the 'imagePrompt':\n\
           POV Shot, Over-the-shoulder, Focus on objects/hands, or Adult's reaction.\n\
         - The 'imagePrompt' MUST reflect this workaround explicitly in English.\n\n\
         **OUTPUT JSON SCHEMA:**\n\
         Return a JSON object with 'characters' and 'scenes'."
    )
}

fn analysis_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "characters": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "description": {
                            "type": "STRING",
                            "description": "Detailed physical appearance strictly in ENGLISH."
                        }
                    },
                    "required": ["name", "description"]
                }
            },
            "scenes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "sceneNumber": { "type": "INTEGER" },
                        "originalText": {
                            "type": "STRING",
                            "description": "The specific sentence(s) from the script."
                        },
                        "imagePrompt": {
                            "type": "STRING",
                            "description": "Detailed prompt strictly in ENGLISH. NO CHILDREN allowed. Use workarounds."
                        },
                        "videoPrompt": {
                            "type": "STRING",
                            "description": "Cinematic video prompt in ENGLISH. Make Scene #1 (Intro) very intense and natural."
                        }
                    },
                    "required": ["sceneNumber", "originalText", "imagePrompt", "videoPrompt"]
                }
            }
        },
        "required": ["characters", "scenes"]
    })
}

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Serialize)]
struct PredictVideoRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Serialize)]
struct VideoInstance {
    prompt: String,
    image: VideoSourceImage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoSourceImage {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    resolution: String,
    number_of_videos: u32,
}

#[derive(Deserialize)]
struct OperationHandle {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResponse>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<GeneratedVideos>,
    #[serde(default)]
    generated_videos: Option<Vec<GeneratedVideo>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedVideos {
    #[serde(default)]
    generated_samples: Vec<GeneratedVideo>,
}

#[derive(Deserialize)]
struct GeneratedVideo {
    video: Option<VideoUri>,
}

#[derive(Deserialize)]
struct VideoUri {
    uri: Option<String>,
}

#[derive(Deserialize)]
struct OperationError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// =============================================================================
// GeminiClient
// =============================================================================

/// Generation client backed by the Google Generative Language API
pub struct GeminiClient {
    /// HTTP client with configured timeout
    client: reqwest::Client,
    /// API key for authentication
    api_key: String,
    /// Base URL for API requests
    base_url: String,
    /// Model used for script analysis
    analysis_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("analysis_model", &self.analysis_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a new client
    pub fn new(api_key: impl Into<String>) -> CoreResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(CoreError::ValidationError(
                "Gemini API key cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
        })
    }

    /// Sets a custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets a custom analysis model
    pub fn with_analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn predict_url(&self, model: &str) -> String {
        format!("{}/models/{}:predictLongRunning", self.base_url, model)
    }

    fn operation_url(&self, operation_name: &str) -> String {
        format!("{}/{}", self.base_url, operation_name)
    }

    async fn post_json(
        &self,
        url: &str,
        body: &impl Serialize,
        map_err: impl Fn(String) -> CoreError,
    ) -> CoreResult<String> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| map_err(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_err(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(map_err(Self::format_api_error(status, &body)));
        }
        Ok(body)
    }

    fn format_api_error(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<ApiError>(body) {
            Ok(parsed) => format!(
                "API error ({}; status={}): {}",
                status,
                parsed.error.status.as_deref().unwrap_or("unknown"),
                parsed.error.message
            ),
            Err(_) => format!("API error ({}): {}", status, body),
        }
    }

    // =========================================================================
    // Response Parsing
    // =========================================================================

    fn parse_analysis_response(body: &str) -> CoreResult<AnalysisResult> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| CoreError::AnalysisFailed(format!("failed to parse response: {}", e)))?;

        let text = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.clone())
            .ok_or_else(|| {
                CoreError::AnalysisFailed("no response from analysis model".to_string())
            })?;

        let mut result: AnalysisResult = serde_json::from_str(&text).map_err(|e| {
            CoreError::AnalysisFailed(format!("analysis model returned malformed JSON: {}", e))
        })?;

        // The model occasionally omits video prompts; fall back to the
        // script excerpt so the field is always usable.
        for scene in &mut result.scenes {
            if scene.video_prompt.trim().is_empty() {
                scene.video_prompt = format!("(no video prompt provided) {}", scene.original_text);
            }
        }
        Ok(result)
    }

    fn parse_image_response(body: &str) -> CoreResult<String> {
        let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
            CoreError::GenerationTransport(format!("failed to parse response: {}", e))
        })?;

        if let Some(feedback) = &response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(CoreError::GenerationRefused(format!(
                    "blocked by safety filters: {}",
                    reason
                )));
            }
        }

        let candidate = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .ok_or_else(|| {
                CoreError::GenerationTransport("no candidates in response".to_string())
            })?;

        let parts = candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();

        for part in parts {
            if let Some(inline) = &part.inline_data {
                return Ok(format!(
                    "data:{};base64,{}",
                    inline.mime_type, inline.data
                ));
            }
        }

        // A text part in place of image data is the model explaining why it
        // refused; preserve the reason verbatim.
        if let Some(text) = parts.iter().find_map(|p| p.text.as_deref()) {
            return Err(CoreError::GenerationRefused(text.to_string()));
        }

        if let Some(reason) = &candidate.finish_reason {
            return Err(CoreError::GenerationRefused(format!(
                "generation blocked, reason: {}",
                reason
            )));
        }

        Err(CoreError::GenerationTransport(
            "no image data found in response".to_string(),
        ))
    }

    /// Returns `Ok(Some(uri))` once the operation is done, `Ok(None)` while
    /// it is still running.
    fn parse_operation_response(body: &str) -> CoreResult<Option<String>> {
        let status: OperationStatus = serde_json::from_str(body).map_err(|e| {
            CoreError::VideoFailed(format!("failed to parse operation status: {}", e))
        })?;

        if !status.done {
            return Ok(None);
        }

        if let Some(error) = status.error {
            return Err(CoreError::VideoFailed(
                error
                    .message
                    .unwrap_or_else(|| "operation reported an unspecified error".to_string()),
            ));
        }

        let uri = status.response.and_then(|r| {
            let samples = r
                .generate_video_response
                .map(|v| v.generated_samples)
                .or(r.generated_videos)
                .unwrap_or_default();
            samples
                .into_iter()
                .next()
                .and_then(|v| v.video)
                .and_then(|v| v.uri)
        });

        match uri {
            Some(uri) => Ok(Some(uri)),
            None => Err(CoreError::VideoFailed("no video URI returned".to_string())),
        }
    }

    /// Extracts the base64 payload of an inline image data URL
    fn data_url_payload(source_url: &str) -> CoreResult<String> {
        let re = data_url_prefix();
        if !re.is_match(source_url) {
            return Err(CoreError::VideoFailed(
                "source image is not an inline data URL".to_string(),
            ));
        }
        Ok(re.replace(source_url, "").into_owned())
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(
        &self,
        script_parts: &[String],
        target_scene_count: u32,
    ) -> CoreResult<AnalysisResult> {
        if script_parts.iter().all(|p| p.trim().is_empty()) {
            return Err(CoreError::AnalysisFailed("script is empty".to_string()));
        }

        let body_parts = script_parts.len().saturating_sub(1);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(format_script_parts(script_parts))],
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(analysis_system_instruction(
                    target_scene_count,
                    body_parts,
                ))],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(ANALYSIS_TEMPERATURE),
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(analysis_response_schema()),
                image_config: None,
            }),
        };

        info!(
            model = %self.analysis_model,
            parts = script_parts.len(),
            target_scene_count,
            "analyzing script"
        );

        let body = self
            .post_json(
                &self.generate_url(&self.analysis_model),
                &request,
                CoreError::AnalysisFailed,
            )
            .await?;

        let result = Self::parse_analysis_response(&body)?;
        info!(
            scenes = result.scenes.len(),
            characters = result.characters.len(),
            "script analysis complete"
        );
        Ok(result)
    }

    async fn generate_image(&self, request: &ImageRequest) -> CoreResult<String> {
        request
            .validate()
            .map_err(CoreError::ValidationError)?;

        let prompt = format!("{}. {}", request.prompt, SAFE_PROMPT_SUFFIX);
        let api_request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: None,
                response_mime_type: None,
                response_schema: None,
                image_config: Some(ImageConfig {
                    aspect_ratio: request.aspect_ratio.as_str().to_string(),
                    image_size: request
                        .engine
                        .supports_resolution()
                        .then(|| request.resolution.as_str().to_string()),
                }),
            }),
        };

        debug!(
            engine = %request.engine,
            aspect = request.aspect_ratio.as_str(),
            "generating image"
        );

        let body = self
            .post_json(
                &self.generate_url(request.engine.model_id()),
                &api_request,
                CoreError::GenerationTransport,
            )
            .await?;

        Self::parse_image_response(&body)
    }

    async fn generate_video(&self, request: &VideoRequest) -> CoreResult<String> {
        request.validate().map_err(CoreError::ValidationError)?;

        let api_request = PredictVideoRequest {
            instances: vec![VideoInstance {
                prompt: request.prompt.clone(),
                image: VideoSourceImage {
                    bytes_base64_encoded: Self::data_url_payload(&request.source_url)?,
                    mime_type: "image/png".to_string(),
                },
            }],
            parameters: VideoParameters {
                resolution: request.settings.resolution.as_str().to_string(),
                number_of_videos: 1,
            },
        };

        let model = request.settings.model.model_id();
        info!(model, "submitting video generation");

        let body = self
            .post_json(&self.predict_url(model), &api_request, CoreError::VideoFailed)
            .await?;
        let handle: OperationHandle = serde_json::from_str(&body)
            .map_err(|e| CoreError::VideoFailed(format!("failed to parse operation: {}", e)))?;

        // Poll the operation handle at a fixed interval until it reports a
        // terminal state. No deadline is imposed here.
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .client
                .get(self.operation_url(&handle.name))
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await
                .map_err(|e| CoreError::VideoFailed(format!("poll failed: {}", e)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| CoreError::VideoFailed(format!("failed to read poll response: {}", e)))?;
            if !status.is_success() {
                return Err(CoreError::VideoFailed(Self::format_api_error(
                    status, &body,
                )));
            }

            match Self::parse_operation_response(&body)? {
                Some(uri) => {
                    info!(model, "video generation complete");
                    return Ok(uri);
                }
                None => {
                    debug!(operation = %handle.name, "video operation still running");
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
