//! Script Analysis
//!
//! Types produced by the analysis call of the generation service, plus the
//! reconciler that merges a fresh analysis into an existing entity set.

mod reconcile;

pub use reconcile::reconcile;

use serde::{Deserialize, Serialize};

// =============================================================================
// Analysis Result
// =============================================================================

/// One storyboard scene extracted from the script
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAnalysis {
    /// Storyboard position assigned by the analysis model
    pub scene_number: u32,
    /// The specific sentence(s) from the script
    pub original_text: String,
    /// Image prompt, English
    pub image_prompt: String,
    /// Cinematic video prompt, English
    #[serde(default)]
    pub video_prompt: String,
}

/// One recurring character extracted from the script
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterAnalysis {
    /// Character name
    pub name: String,
    /// Detailed physical appearance
    pub description: String,
}

/// Full result of one analysis call
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scenes: Vec<SceneAnalysis>,
    pub characters: Vec<CharacterAnalysis>,
}

impl AnalysisResult {
    /// Whether the analysis produced nothing usable
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty() && self.characters.is_empty()
    }
}

// =============================================================================
// Script Formatting
// =============================================================================

/// Concatenates script parts with structural delimiters for the analysis
/// model. The first part is the intro (the story's highest-conflict hook);
/// the remaining parts are the body in order.
pub fn format_script_parts(parts: &[String]) -> String {
    let intro = parts.first().map(String::as_str).unwrap_or_default();
    let mut formatted = format!(
        "[INTRO (HIGH CONFLICT / CLIMAX START)]\n{}\n[INTRO END]\n\n",
        intro
    );
    let body = parts
        .iter()
        .skip(1)
        .enumerate()
        .map(|(i, part)| {
            format!(
                "[BODY PART {n} START]\n{part}\n[BODY PART {n} END]",
                n = i + 1,
                part = part
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    formatted.push_str(&body);
    formatted
}

// =============================================================================
// Tests
// =============================================================================
