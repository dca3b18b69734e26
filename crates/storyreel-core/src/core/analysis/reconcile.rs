//! Analysis Reconciliation
//!
//! Merges a fresh analysis result into an existing entity set without losing
//! finished work. Matching is keyed by scene number (scenes) and name
//! (characters); a previous entity is carried over only when it has at least
//! one completed generation, otherwise the fresh entity replaces it wholesale.

use std::collections::HashMap;

use tracing::debug;

use super::AnalysisResult;
use crate::core::entities::{CardLayout, Entity, EntityKind, EntityStore};

/// Merges `analysis` into `previous`, producing the next entity set.
///
/// Output order follows the analysis order for both collections. Previous
/// entities whose key does not appear in the fresh result are dropped; fresh
/// entities with no preserved match become brand-new pending entities (scenes
/// receive a deterministic grid placement by output index).
pub fn reconcile(previous: &EntityStore, analysis: &AnalysisResult) -> EntityStore {
    let next = EntityStore {
        scenes: reconcile_scenes(previous, analysis),
        characters: reconcile_characters(previous, analysis),
    };
    debug!(
        scenes = next.scenes.len(),
        characters = next.characters.len(),
        "reconciled analysis into entity store"
    );
    next
}

fn reconcile_scenes(previous: &EntityStore, analysis: &AnalysisResult) -> Vec<Entity> {
    // Only scenes with a completed generation are worth preserving; on
    // duplicate scene numbers the later entry wins.
    let mut preserved: HashMap<u32, &Entity> = HashMap::new();
    for entity in &previous.scenes {
        if entity.image_url.is_none() {
            continue;
        }
        if let EntityKind::Scene(details) = &entity.kind {
            preserved.insert(details.scene_number, entity);
        }
    }

    analysis
        .scenes
        .iter()
        .enumerate()
        .map(|(index, fresh)| match preserved.get(&fresh.scene_number) {
            Some(prev) => {
                let mut merged = (*prev).clone();
                if let EntityKind::Scene(details) = &mut merged.kind {
                    details.original_text = fresh.original_text.clone();
                    details.image_prompt = fresh.image_prompt.clone();
                    details.video_prompt = fresh.video_prompt.clone();
                }
                merged
            }
            None => Entity::new_scene(
                fresh.scene_number,
                fresh.original_text.clone(),
                fresh.image_prompt.clone(),
                fresh.video_prompt.clone(),
                CardLayout::grid_slot(index),
            ),
        })
        .collect()
}

fn reconcile_characters(previous: &EntityStore, analysis: &AnalysisResult) -> Vec<Entity> {
    let mut preserved: HashMap<&str, &Entity> = HashMap::new();
    for entity in &previous.characters {
        if entity.image_url.is_none() {
            continue;
        }
        if let EntityKind::Character(details) = &entity.kind {
            preserved.insert(details.name.as_str(), entity);
        }
    }

    analysis
        .characters
        .iter()
        .map(|fresh| match preserved.get(fresh.name.as_str()) {
            Some(prev) => {
                let mut merged = (*prev).clone();
                if let EntityKind::Character(details) = &mut merged.kind {
                    details.description = fresh.description.clone();
                }
                merged
            }
            None => Entity::new_character(fresh.name.clone(), fresh.description.clone()),
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
