//! Entity Store
//!
//! Holds the current scene and character collections and applies the
//! presentation-layer commands (update, delete, manual add). Collection order
//! is meaningful: it follows the analysis output order, so entities live in
//! `Vec`s rather than maps.

use serde::{Deserialize, Serialize};

use super::{CardLayout, Entity, EntityKind};
use crate::core::{CoreError, CoreResult, EntityId, GenerationStatus};

/// Placeholder texts for manually added scenes
const MANUAL_SCENE_TEXT: &str = "A new scene idea";
const MANUAL_SCENE_PROMPT: &str = "A creative new scene...";

// =============================================================================
// Patches
// =============================================================================

/// Partial update for a scene's editable fields. Absent fields are untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<CardLayout>,
}

impl ScenePatch {
    /// Patch that replaces the canvas layout only
    pub fn layout(layout: CardLayout) -> Self {
        Self {
            layout: Some(layout),
            ..Default::default()
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Read-only copy of the store handed to the presentation layer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub scenes: Vec<Entity>,
    pub characters: Vec<Entity>,
}

impl StoreSnapshot {
    /// Number of scenes whose latest generation succeeded
    pub fn completed_scene_count(&self) -> usize {
        self.scenes
            .iter()
            .filter(|s| s.status == GenerationStatus::Completed)
            .count()
    }
}

// =============================================================================
// Entity Store
// =============================================================================

/// Current collections of scene and character entities
#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    /// Scenes in storyboard order
    pub scenes: Vec<Entity>,
    /// Characters in analysis order
    pub characters: Vec<Entity>,
}

impl EntityStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entity of either kind by ID
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.scenes
            .iter()
            .chain(self.characters.iter())
            .find(|e| e.id == id)
    }

    /// Mutable lookup of an entity of either kind by ID
    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.scenes
            .iter_mut()
            .chain(self.characters.iter_mut())
            .find(|e| e.id == id)
    }

    /// Whether an entity with this ID exists
    pub fn contains(&self, id: &str) -> bool {
        self.entity(id).is_some()
    }

    /// IDs of every entity whose latest attempt is pending or failed, scenes
    /// first. This is the caller-level filter for "retry everything
    /// unfinished"; completed entities are excluded.
    pub fn pending_targets(&self) -> Vec<EntityId> {
        self.scenes
            .iter()
            .chain(self.characters.iter())
            .filter(|e| {
                matches!(
                    e.status,
                    GenerationStatus::Pending | GenerationStatus::Failed
                )
            })
            .map(|e| e.id.clone())
            .collect()
    }

    /// IDs of every entity, scenes first. Used for explicit full
    /// regeneration, a distinct caller-level choice.
    pub fn all_targets(&self) -> Vec<EntityId> {
        self.scenes
            .iter()
            .chain(self.characters.iter())
            .map(|e| e.id.clone())
            .collect()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Adds a manually created scene with placeholder content. Returns the
    /// new entity's ID.
    pub fn add_scene(&mut self) -> EntityId {
        let scene = Entity::new_scene(
            self.scenes.len() as u32 + 1,
            MANUAL_SCENE_TEXT,
            MANUAL_SCENE_PROMPT,
            "",
            CardLayout::default(),
        );
        let id = scene.id.clone();
        self.scenes.push(scene);
        id
    }

    /// Deletes an entity of either kind
    pub fn delete(&mut self, id: &str) -> CoreResult<()> {
        let before = self.scenes.len() + self.characters.len();
        self.scenes.retain(|e| e.id != id);
        self.characters.retain(|e| e.id != id);
        if self.scenes.len() + self.characters.len() == before {
            return Err(CoreError::EntityNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Applies a partial update to a scene's editable fields
    pub fn update_scene(&mut self, id: &str, patch: ScenePatch) -> CoreResult<()> {
        let entity = self
            .entity_mut(id)
            .ok_or_else(|| CoreError::EntityNotFound(id.to_string()))?;
        let scene = match &mut entity.kind {
            EntityKind::Scene(scene) => scene,
            EntityKind::Character(_) => {
                return Err(CoreError::ValidationError(format!(
                    "entity {} is not a scene",
                    id
                )))
            }
        };
        if let Some(text) = patch.original_text {
            scene.original_text = text;
        }
        if let Some(prompt) = patch.image_prompt {
            scene.image_prompt = prompt;
        }
        if let Some(prompt) = patch.video_prompt {
            scene.video_prompt = prompt;
        }
        if let Some(layout) = patch.layout {
            scene.layout = layout;
        }
        Ok(())
    }

    /// Read-only snapshot of both collections
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            scenes: self.scenes.clone(),
            characters: self.characters.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::GeneratedAsset;

    fn store_with_entities() -> EntityStore {
        let mut store = EntityStore::new();
        store.scenes.push(Entity::new_scene(
            1,
            "Opening",
            "prompt one",
            "",
            CardLayout::grid_slot(0),
        ));
        store.scenes.push(Entity::new_scene(
            2,
            "Aftermath",
            "prompt two",
            "",
            CardLayout::grid_slot(1),
        ));
        store
            .characters
            .push(Entity::new_character("Mara", "sea captain"));
        store
    }

    #[test]
    fn test_lookup_across_kinds() {
        let store = store_with_entities();
        let scene_id = store.scenes[0].id.clone();
        let char_id = store.characters[0].id.clone();

        assert!(store.entity(&scene_id).is_some());
        assert!(store.entity(&char_id).is_some());
        assert!(store.entity("missing").is_none());
        assert!(store.contains(&char_id));
    }

    #[test]
    fn test_add_scene_numbering_and_defaults() {
        let mut store = store_with_entities();
        let id = store.add_scene();

        let added = store.entity(&id).unwrap();
        let details = added.as_scene().unwrap();
        assert_eq!(details.scene_number, 3);
        assert_eq!(details.original_text, MANUAL_SCENE_TEXT);
        assert_eq!(added.status, GenerationStatus::Pending);
        assert!(added.history.is_empty());
    }

    #[test]
    fn test_delete_both_kinds() {
        let mut store = store_with_entities();
        let scene_id = store.scenes[0].id.clone();
        let char_id = store.characters[0].id.clone();

        store.delete(&scene_id).unwrap();
        store.delete(&char_id).unwrap();
        assert_eq!(store.scenes.len(), 1);
        assert!(store.characters.is_empty());

        assert!(matches!(
            store.delete("missing"),
            Err(CoreError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_update_scene_patch() {
        let mut store = store_with_entities();
        let id = store.scenes[0].id.clone();

        store
            .update_scene(
                &id,
                ScenePatch {
                    original_text: Some("Rewritten".to_string()),
                    layout: Some(CardLayout {
                        x: 10.0,
                        y: 20.0,
                        width: 300.0,
                        height: 200.0,
                        rotation: None,
                    }),
                    ..Default::default()
                },
            )
            .unwrap();

        let details = store.entity(&id).unwrap().as_scene().unwrap();
        assert_eq!(details.original_text, "Rewritten");
        assert_eq!(details.layout.x, 10.0);
        // Untouched fields survive
        assert_eq!(details.image_prompt, "prompt one");
    }

    #[test]
    fn test_update_scene_rejects_characters() {
        let mut store = store_with_entities();
        let char_id = store.characters[0].id.clone();
        assert!(store.update_scene(&char_id, ScenePatch::default()).is_err());
    }

    #[test]
    fn test_pending_targets_excludes_completed() {
        let mut store = store_with_entities();
        let completed_id = store.scenes[0].id.clone();
        {
            let entity = store.entity_mut(&completed_id).unwrap();
            entity.begin_generation().unwrap();
            entity.complete_generation(GeneratedAsset::new("asset://1", "p"));
        }
        let failed_id = store.scenes[1].id.clone();
        {
            let entity = store.entity_mut(&failed_id).unwrap();
            entity.begin_generation().unwrap();
            entity.fail_generation("boom");
        }

        let targets = store.pending_targets();
        assert!(!targets.contains(&completed_id));
        assert!(targets.contains(&failed_id));
        // The untouched character is still pending
        assert_eq!(targets.len(), 2);

        assert_eq!(store.all_targets().len(), 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = store_with_entities();
        let snapshot = store.snapshot();
        store.scenes.clear();

        assert_eq!(snapshot.scenes.len(), 2);
        assert_eq!(snapshot.completed_scene_count(), 0);
    }
}
