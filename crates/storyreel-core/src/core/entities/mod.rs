//! Entity Model
//!
//! Scenes and characters tracked by the orchestrator, their generated-asset
//! history, and the per-entity / per-asset status transitions.
//!
//! An entity's `history` is append-only and newest-first; `image_url` always
//! references the history head after a successful generation. Each historical
//! asset carries its own independent video sub-state.

mod store;

pub use store::{EntityStore, ScenePatch, StoreSnapshot};

use serde::{Deserialize, Serialize};

use crate::core::{now_ms, AssetId, CoreError, CoreResult, EntityId, GenerationStatus, TimestampMs};

// =============================================================================
// Layout
// =============================================================================

/// Grid placement constants for newly created scene cards. The values match
/// the presentation layer's card dimensions; the core never interprets them.
const GRID_COLUMNS: usize = 4;
const GRID_CELL_WIDTH: f64 = 320.0;
const GRID_CELL_HEIGHT: f64 = 280.0;
const GRID_ORIGIN: f64 = 100.0;
const CARD_WIDTH: f64 = 280.0;
const CARD_HEIGHT: f64 = 240.0;

/// Canvas placement hints for a scene card. Owned by the presentation layer;
/// the core stores and round-trips these values opaquely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl CardLayout {
    /// Deterministic grid placement for the `index`-th scene of an analysis
    pub fn grid_slot(index: usize) -> Self {
        let col = index % GRID_COLUMNS;
        let row = index / GRID_COLUMNS;
        Self {
            x: col as f64 * GRID_CELL_WIDTH + GRID_ORIGIN,
            y: row as f64 * GRID_CELL_HEIGHT + GRID_ORIGIN,
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
            rotation: None,
        }
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            x: GRID_ORIGIN,
            y: GRID_ORIGIN,
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
            rotation: None,
        }
    }
}

// =============================================================================
// Generated Asset
// =============================================================================

/// One successful image generation result plus its video sub-state.
///
/// Immutable once recorded, except for the `video_*` fields which transition
/// independently of the owning entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAsset {
    /// Unique asset ID
    pub id: AssetId,
    /// Opaque reference to the generated content
    pub url: String,
    /// Prompt used to produce the asset
    pub prompt: String,
    /// Creation timestamp (unix millis)
    pub created_at: TimestampMs,
    /// Video sub-state for this asset
    pub video_status: GenerationStatus,
    /// Generated video reference, present once the video completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Last video failure message, overwritten by the next attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_error: Option<String>,
}

impl GeneratedAsset {
    /// Creates a new asset record for a freshly generated image
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            prompt: prompt.into(),
            created_at: now_ms(),
            video_status: GenerationStatus::Pending,
            video_url: None,
            video_error: None,
        }
    }
}

// =============================================================================
// Entity Kinds
// =============================================================================

/// Scene narrative fields plus canvas layout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDetails {
    /// Storyboard position; the reconciliation matching key
    pub scene_number: u32,
    /// Script excerpt this scene illustrates
    pub original_text: String,
    /// Image prompt produced by analysis (or edited by the user)
    pub image_prompt: String,
    /// Video prompt produced by analysis (or edited by the user)
    pub video_prompt: String,
    /// Canvas placement, preserved opaquely
    pub layout: CardLayout,
}

/// Character fields
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDetails {
    /// Character name; the reconciliation matching key
    pub name: String,
    /// Physical appearance description used for portrait prompts
    pub description: String,
}

/// Kind-specific payload of an entity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityKind {
    Scene(SceneDetails),
    Character(CharacterDetails),
}

impl EntityKind {
    /// Builds the image prompt for this entity.
    ///
    /// Characters render as a solo portrait from name + description; scenes
    /// use their analysis prompt, falling back to the raw script excerpt.
    pub fn image_prompt(&self) -> String {
        match self {
            EntityKind::Scene(scene) => {
                if scene.image_prompt.trim().is_empty() {
                    scene.original_text.clone()
                } else {
                    scene.image_prompt.clone()
                }
            }
            EntityKind::Character(character) => format!(
                "Solo close-up portrait of ONE single person named {}, {}, \
                 looking at camera, historical drama style, plain background, \
                 high quality, highly detailed face",
                character.name, character.description
            ),
        }
    }

    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Scene(_) => "scene",
            EntityKind::Character(_) => "character",
        }
    }
}

// =============================================================================
// Entity
// =============================================================================

/// A scene or character record tracked by the orchestrator
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique ID (ULID), assigned at creation, never reused or mutated
    pub id: EntityId,
    /// Image generation lifecycle status
    pub status: GenerationStatus,
    /// Last image generation failure, overwritten by the next attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// URL of the most recent successfully generated asset (the history head)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Every successful generation, newest-first; append-only
    pub history: Vec<GeneratedAsset>,
    /// Convenience mirror of the head asset's video status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_status: Option<GenerationStatus>,
    /// Convenience mirror of the head asset's video URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Kind-specific payload
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl Entity {
    /// Creates a pending scene entity
    pub fn new_scene(
        scene_number: u32,
        original_text: impl Into<String>,
        image_prompt: impl Into<String>,
        video_prompt: impl Into<String>,
        layout: CardLayout,
    ) -> Self {
        Self::pending(EntityKind::Scene(SceneDetails {
            scene_number,
            original_text: original_text.into(),
            image_prompt: image_prompt.into(),
            video_prompt: video_prompt.into(),
            layout,
        }))
    }

    /// Creates a pending character entity
    pub fn new_character(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::pending(EntityKind::Character(CharacterDetails {
            name: name.into(),
            description: description.into(),
        }))
    }

    fn pending(kind: EntityKind) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            status: GenerationStatus::Pending,
            error: None,
            image_url: None,
            history: Vec::new(),
            video_status: None,
            video_url: None,
            kind,
        }
    }

    /// Returns the scene payload, if this entity is a scene
    pub fn as_scene(&self) -> Option<&SceneDetails> {
        match &self.kind {
            EntityKind::Scene(scene) => Some(scene),
            EntityKind::Character(_) => None,
        }
    }

    /// Returns the character payload, if this entity is a character
    pub fn as_character(&self) -> Option<&CharacterDetails> {
        match &self.kind {
            EntityKind::Character(character) => Some(character),
            EntityKind::Scene(_) => None,
        }
    }

    /// The history head, i.e. the most recently generated asset
    pub fn current_asset(&self) -> Option<&GeneratedAsset> {
        self.history.first()
    }

    // =========================================================================
    // Generation State Machine
    // =========================================================================

    /// Enters `generating` for a new image attempt, clearing the previous
    /// error. Rejected if an attempt is already in flight.
    pub fn begin_generation(&mut self) -> CoreResult<()> {
        if !self.status.can_start() {
            return Err(CoreError::ValidationError(format!(
                "entity {} is already generating",
                self.id
            )));
        }
        self.status = GenerationStatus::Generating;
        self.error = None;
        Ok(())
    }

    /// Records a successful generation: prepends the asset to history, moves
    /// the head reference, and enters `completed`.
    pub fn complete_generation(&mut self, asset: GeneratedAsset) {
        self.image_url = Some(asset.url.clone());
        self.history.insert(0, asset);
        self.status = GenerationStatus::Completed;
        self.error = None;
    }

    /// Records a failed generation. History and the head reference are left
    /// untouched; the message is preserved verbatim for the caller.
    pub fn fail_generation(&mut self, message: impl Into<String>) {
        self.status = GenerationStatus::Failed;
        self.error = Some(message.into());
    }

    // =========================================================================
    // Video Sub-State Machine
    // =========================================================================

    /// Enters `generating` on the video sub-state of the asset addressed by
    /// `asset_url`. The entity-level mirror fields follow only when the asset
    /// is the current head.
    pub fn begin_video(&mut self, asset_url: &str) -> CoreResult<()> {
        let id = self.id.clone();
        let asset = self.asset_by_url_mut(asset_url)?;
        if !asset.video_status.can_start() {
            return Err(CoreError::ValidationError(format!(
                "a video is already generating for asset {} of entity {}",
                asset_url, id
            )));
        }
        asset.video_status = GenerationStatus::Generating;
        asset.video_error = None;
        if self.image_url.as_deref() == Some(asset_url) {
            self.video_status = Some(GenerationStatus::Generating);
        }
        Ok(())
    }

    /// Records a completed video for the asset addressed by `asset_url`.
    /// Head equality is re-evaluated here: a regeneration that moved the head
    /// while the video was in flight stops the entity-level mirror.
    pub fn complete_video(&mut self, asset_url: &str, video_url: impl Into<String>) -> CoreResult<()> {
        let video_url = video_url.into();
        let asset = self.asset_by_url_mut(asset_url)?;
        asset.video_status = GenerationStatus::Completed;
        asset.video_url = Some(video_url.clone());
        asset.video_error = None;
        if self.image_url.as_deref() == Some(asset_url) {
            self.video_status = Some(GenerationStatus::Completed);
            self.video_url = Some(video_url);
        }
        Ok(())
    }

    /// Records a failed video for the asset addressed by `asset_url`
    pub fn fail_video(&mut self, asset_url: &str, message: impl Into<String>) -> CoreResult<()> {
        let asset = self.asset_by_url_mut(asset_url)?;
        asset.video_status = GenerationStatus::Failed;
        asset.video_error = Some(message.into());
        if self.image_url.as_deref() == Some(asset_url) {
            self.video_status = Some(GenerationStatus::Failed);
        }
        Ok(())
    }

    fn asset_by_url_mut(&mut self, asset_url: &str) -> CoreResult<&mut GeneratedAsset> {
        self.history
            .iter_mut()
            .find(|asset| asset.url == asset_url)
            .ok_or_else(|| CoreError::AssetNotFound(asset_url.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Entity {
        Entity::new_scene(
            1,
            "The gates fall at dawn.",
            "A besieged fortress gate splintering at sunrise",
            "Slow push-in on the breaking gate",
            CardLayout::grid_slot(0),
        )
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn test_new_scene_defaults() {
        let entity = scene();
        assert!(!entity.id.is_empty());
        assert_eq!(entity.status, GenerationStatus::Pending);
        assert!(entity.history.is_empty());
        assert!(entity.image_url.is_none());
        assert!(entity.error.is_none());
        assert_eq!(entity.as_scene().unwrap().scene_number, 1);
    }

    #[test]
    fn test_new_character_defaults() {
        let entity = Entity::new_character("Mara", "a weathered sea captain in her fifties");
        assert_eq!(entity.status, GenerationStatus::Pending);
        assert_eq!(entity.as_character().unwrap().name, "Mara");
        assert!(entity.as_scene().is_none());
    }

    #[test]
    fn test_grid_slot_placement() {
        let first = CardLayout::grid_slot(0);
        assert_eq!(first.x, 100.0);
        assert_eq!(first.y, 100.0);

        // Fifth card wraps to the second row
        let fifth = CardLayout::grid_slot(4);
        assert_eq!(fifth.x, 100.0);
        assert_eq!(fifth.y, 380.0);

        let second = CardLayout::grid_slot(1);
        assert_eq!(second.x, 420.0);
        assert_eq!(second.width, 280.0);
        assert_eq!(second.height, 240.0);
    }

    // =========================================================================
    // Prompt Construction
    // =========================================================================

    #[test]
    fn test_scene_prompt_prefers_image_prompt() {
        let entity = scene();
        assert_eq!(
            entity.kind.image_prompt(),
            "A besieged fortress gate splintering at sunrise"
        );
    }

    #[test]
    fn test_scene_prompt_falls_back_to_original_text() {
        let entity = Entity::new_scene(2, "Rain over the harbor.", "  ", "", CardLayout::default());
        assert_eq!(entity.kind.image_prompt(), "Rain over the harbor.");
    }

    #[test]
    fn test_character_prompt_is_solo_portrait() {
        let entity = Entity::new_character("Mara", "a weathered sea captain");
        let prompt = entity.kind.image_prompt();
        assert!(prompt.contains("Solo close-up portrait"));
        assert!(prompt.contains("Mara"));
        assert!(prompt.contains("a weathered sea captain"));
    }

    // =========================================================================
    // Generation State Machine
    // =========================================================================

    #[test]
    fn test_generation_success_cycle() {
        let mut entity = scene();
        entity.begin_generation().unwrap();
        assert_eq!(entity.status, GenerationStatus::Generating);

        entity.complete_generation(GeneratedAsset::new("asset://1", "prompt"));
        assert_eq!(entity.status, GenerationStatus::Completed);
        assert_eq!(entity.image_url.as_deref(), Some("asset://1"));
        assert_eq!(entity.history.len(), 1);
        assert_eq!(entity.current_asset().unwrap().url, "asset://1");
    }

    #[test]
    fn test_generation_failure_keeps_history() {
        let mut entity = scene();
        entity.begin_generation().unwrap();
        entity.complete_generation(GeneratedAsset::new("asset://1", "prompt"));

        entity.begin_generation().unwrap();
        entity.fail_generation("service unavailable");
        assert_eq!(entity.status, GenerationStatus::Failed);
        assert_eq!(entity.error.as_deref(), Some("service unavailable"));
        // The failed attempt never reaches history
        assert_eq!(entity.history.len(), 1);
        assert_eq!(entity.image_url.as_deref(), Some("asset://1"));
    }

    #[test]
    fn test_begin_clears_previous_error() {
        let mut entity = scene();
        entity.begin_generation().unwrap();
        entity.fail_generation("refused");
        assert!(entity.error.is_some());

        entity.begin_generation().unwrap();
        assert!(entity.error.is_none());
        assert_eq!(entity.status, GenerationStatus::Generating);
    }

    #[test]
    fn test_begin_while_generating_rejected() {
        let mut entity = scene();
        entity.begin_generation().unwrap();
        assert!(entity.begin_generation().is_err());
    }

    #[test]
    fn test_history_is_append_only_newest_first() {
        let mut entity = scene();
        for i in 1..=3 {
            entity.begin_generation().unwrap();
            entity.complete_generation(GeneratedAsset::new(format!("asset://{}", i), "prompt"));
        }
        assert_eq!(entity.history.len(), 3);
        assert_eq!(entity.history[0].url, "asset://3");
        assert_eq!(entity.history[2].url, "asset://1");
        assert_eq!(entity.image_url.as_deref(), Some("asset://3"));
    }

    // =========================================================================
    // Video Sub-State Machine
    // =========================================================================

    fn scene_with_history() -> Entity {
        let mut entity = scene();
        entity.begin_generation().unwrap();
        entity.complete_generation(GeneratedAsset::new("asset://old", "prompt"));
        entity.begin_generation().unwrap();
        entity.complete_generation(GeneratedAsset::new("asset://new", "prompt"));
        entity
    }

    #[test]
    fn test_video_on_head_mirrors_entity_fields() {
        let mut entity = scene_with_history();
        entity.begin_video("asset://new").unwrap();
        assert_eq!(entity.video_status, Some(GenerationStatus::Generating));

        entity.complete_video("asset://new", "video://new").unwrap();
        assert_eq!(entity.video_status, Some(GenerationStatus::Completed));
        assert_eq!(entity.video_url.as_deref(), Some("video://new"));
        assert_eq!(entity.history[0].video_url.as_deref(), Some("video://new"));
    }

    #[test]
    fn test_video_on_historical_asset_leaves_entity_fields() {
        let mut entity = scene_with_history();
        entity.begin_video("asset://old").unwrap();
        // Entity-level fields mirror only the head
        assert!(entity.video_status.is_none());

        entity.complete_video("asset://old", "video://old").unwrap();
        assert!(entity.video_status.is_none());
        assert!(entity.video_url.is_none());

        let old = entity.history.iter().find(|a| a.url == "asset://old").unwrap();
        assert_eq!(old.video_status, GenerationStatus::Completed);
        assert_eq!(old.video_url.as_deref(), Some("video://old"));
    }

    #[test]
    fn test_video_failure_preserves_message() {
        let mut entity = scene_with_history();
        entity.begin_video("asset://new").unwrap();
        entity.fail_video("asset://new", "operation timed out").unwrap();

        assert_eq!(entity.history[0].video_status, GenerationStatus::Failed);
        assert_eq!(
            entity.history[0].video_error.as_deref(),
            Some("operation timed out")
        );
        assert_eq!(entity.video_status, Some(GenerationStatus::Failed));
    }

    #[test]
    fn test_video_reentry_after_terminal_state() {
        let mut entity = scene_with_history();
        entity.begin_video("asset://new").unwrap();
        entity.complete_video("asset://new", "video://1").unwrap();

        // A new explicit request resets the sub-state to generating
        entity.begin_video("asset://new").unwrap();
        assert_eq!(entity.history[0].video_status, GenerationStatus::Generating);
        assert!(entity.history[0].video_error.is_none());
    }

    #[test]
    fn test_video_while_generating_rejected() {
        let mut entity = scene_with_history();
        entity.begin_video("asset://new").unwrap();
        assert!(entity.begin_video("asset://new").is_err());
    }

    #[test]
    fn test_video_unknown_asset_rejected() {
        let mut entity = scene_with_history();
        let err = entity.begin_video("asset://missing").unwrap_err();
        assert!(matches!(err, CoreError::AssetNotFound(_)));
    }

    #[test]
    fn test_head_moved_during_video_stops_mirroring() {
        let mut entity = scene_with_history();
        entity.begin_video("asset://new").unwrap();

        // Regeneration moves the head while the video is still in flight
        entity.begin_generation().unwrap();
        entity.complete_generation(GeneratedAsset::new("asset://newer", "prompt"));

        entity.complete_video("asset://new", "video://late").unwrap();
        let asset = entity.history.iter().find(|a| a.url == "asset://new").unwrap();
        assert_eq!(asset.video_status, GenerationStatus::Completed);
        // Entity-level fields belong to the new head now
        assert!(entity.video_url.is_none());
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn test_entity_serializes_flat_with_kind_tag() {
        let entity = scene();
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "scene");
        assert_eq!(json["sceneNumber"], 1);
        assert_eq!(json["status"], "pending");
        assert!(json.get("imageUrl").is_none());

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back.as_scene().unwrap().scene_number, 1);
    }

    #[test]
    fn test_character_round_trip() {
        let entity = Entity::new_character("Mara", "captain");
        let json = serde_json::to_string(&entity).unwrap();
        assert!(json.contains("\"kind\":\"character\""));
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_character().unwrap().name, "Mara");
    }
}
