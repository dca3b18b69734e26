//! Storyboard Engine
//!
//! The orchestrator facade: owns the entity store, the generation client,
//! and the batch scheduler, and exposes the command surface consumed by the
//! presentation layer. All entity mutations happen under the store mutex in
//! short critical sections that are never held across an await point.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::core::analysis::reconcile;
use crate::core::entities::{
    EntityKind, EntityStore, GeneratedAsset, ScenePatch, StoreSnapshot,
};
use crate::core::events::{EngineEvent, EventChannel, EventSender};
use crate::core::generative::{
    AspectRatio, GenerationClient, ImageRequest, VideoRequest, VideoSettings,
};
use crate::core::scheduler::{BatchScheduler, BatchSummary, JobOutcome};
use crate::core::settings::GenerationSettings;
use crate::core::{CoreError, CoreResult, EntityId};

// =============================================================================
// Engine
// =============================================================================

/// Generation orchestrator for one storyboard session
pub struct StoryboardEngine {
    /// Entity collections, shared with spawned jobs
    store: Arc<Mutex<EntityStore>>,
    /// External generation service
    client: Arc<dyn GenerationClient>,
    /// Bounded-concurrency, single-flight batch scheduler
    scheduler: BatchScheduler,
    /// Settings applied to analysis and image generation
    settings: GenerationSettings,
    /// Progress events for observers
    events: EventChannel,
}

impl StoryboardEngine {
    /// Creates an engine with an empty entity store
    pub fn new(client: Arc<dyn GenerationClient>, settings: GenerationSettings) -> Self {
        Self {
            store: Arc::new(Mutex::new(EntityStore::new())),
            client,
            scheduler: BatchScheduler::new(settings.concurrency),
            settings,
            events: EventChannel::new(),
        }
    }

    /// The settings this engine was created with
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Whether a generation batch is currently running
    pub fn is_batch_active(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Takes the progress event receiver (can only be called once)
    pub fn take_event_receiver(
        &mut self,
    ) -> Option<tokio::sync::mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.take_receiver()
    }

    // =========================================================================
    // Store Access & Commands
    // =========================================================================

    /// Read-only snapshot of the entity collections
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.lock().unwrap().snapshot()
    }

    /// IDs of every entity whose latest attempt is pending or failed
    pub fn pending_targets(&self) -> Vec<EntityId> {
        self.store.lock().unwrap().pending_targets()
    }

    /// IDs of every entity, for explicit full regeneration
    pub fn all_targets(&self) -> Vec<EntityId> {
        self.store.lock().unwrap().all_targets()
    }

    /// Adds a manually created scene and returns its ID
    pub fn add_scene(&self) -> EntityId {
        self.store.lock().unwrap().add_scene()
    }

    /// Deletes an entity of either kind
    pub fn delete_entity(&self, id: &str) -> CoreResult<()> {
        self.store.lock().unwrap().delete(id)
    }

    /// Applies a partial update to a scene's editable fields
    pub fn update_scene(&self, id: &str, patch: ScenePatch) -> CoreResult<()> {
        self.store.lock().unwrap().update_scene(id, patch)
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Analyzes the script parts and reconciles the result into the entity
    /// store, preserving completed work by matching key.
    ///
    /// Rejected with [`CoreError::BatchActive`] while a batch is running:
    /// reconciliation must not interleave with in-flight generation.
    pub async fn analyze_script(&self, script_parts: &[String]) -> CoreResult<()> {
        if self.scheduler.is_active() {
            return Err(CoreError::BatchActive);
        }

        let analysis = self
            .client
            .analyze(script_parts, self.settings.target_scene_count)
            .await?;

        // A batch may have been admitted while the analysis call was in
        // flight; merging now would race its entity updates.
        if self.scheduler.is_active() {
            return Err(CoreError::BatchActive);
        }

        let (scenes, characters) = {
            let mut store = self.store.lock().unwrap();
            let next = reconcile(&store, &analysis);
            let counts = (next.scenes.len(), next.characters.len());
            *store = next;
            counts
        };

        info!(scenes, characters, "analysis merged into entity store");
        self.events
            .sender()
            .emit(EngineEvent::AnalysisMerged { scenes, characters });
        Ok(())
    }

    // =========================================================================
    // Image Generation
    // =========================================================================

    /// Submits a batch of entities for image generation under the configured
    /// concurrency cap.
    ///
    /// Unknown IDs are skipped with a warning. Returns
    /// [`CoreError::BatchActive`] if another batch is still running; the
    /// returned handle resolves once every admitted job reached a terminal
    /// state (dropping it does not stop the batch).
    pub fn submit_batch(
        &self,
        targets: Vec<EntityId>,
    ) -> CoreResult<tokio::task::JoinHandle<BatchSummary>> {
        let known: Vec<EntityId> = {
            let store = self.store.lock().unwrap();
            targets
                .into_iter()
                .filter(|id| {
                    let exists = store.contains(id);
                    if !exists {
                        warn!(entity_id = %id, "skipping unknown batch target");
                    }
                    exists
                })
                .collect()
        };
        let count = known.len();

        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let settings = self.settings;
        let events = self.events.sender();

        let handle = self.scheduler.submit(known, move |id| {
            run_generation_job(
                Arc::clone(&store),
                Arc::clone(&client),
                settings,
                events.clone(),
                id,
            )
        })?;

        self.events.sender().emit(EngineEvent::BatchStarted {
            targets: count,
            concurrency: self.scheduler.concurrency(),
        });

        let events = self.events.sender();
        Ok(tokio::spawn(async move {
            let summary = match handle.wait().await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!("batch wait failed: {}", e);
                    BatchSummary::default()
                }
            };
            events.emit(EngineEvent::BatchFinished { summary });
            summary
        }))
    }

    /// Regenerates a single entity's image, independent of any batch.
    ///
    /// The job is spawned and runs to a terminal state even if the returned
    /// handle is dropped.
    pub fn retry_generation(&self, id: &str) -> CoreResult<tokio::task::JoinHandle<JobOutcome>> {
        if !self.store.lock().unwrap().contains(id) {
            return Err(CoreError::EntityNotFound(id.to_string()));
        }

        let job = run_generation_job(
            Arc::clone(&self.store),
            Arc::clone(&self.client),
            self.settings,
            self.events.sender(),
            id.to_string(),
        );
        Ok(tokio::spawn(job))
    }

    // =========================================================================
    // Video Generation
    // =========================================================================

    /// Requests a video for the asset addressed by `asset_url` inside the
    /// entity's history. The asset need not be the current head.
    ///
    /// When `prompt` is empty, the scene's video prompt (falling back to its
    /// script excerpt) or the character's description is used. The request is
    /// single-shot and unpooled; it always runs to a terminal state.
    pub fn request_video(
        &self,
        entity_id: &str,
        asset_url: &str,
        prompt: &str,
        settings: VideoSettings,
    ) -> CoreResult<tokio::task::JoinHandle<JobOutcome>> {
        let prompt = {
            let mut store = self.store.lock().unwrap();
            let entity = store
                .entity_mut(entity_id)
                .ok_or_else(|| CoreError::EntityNotFound(entity_id.to_string()))?;
            entity.begin_video(asset_url)?;

            if prompt.trim().is_empty() {
                match &entity.kind {
                    EntityKind::Scene(scene) => {
                        if scene.video_prompt.trim().is_empty() {
                            scene.original_text.clone()
                        } else {
                            scene.video_prompt.clone()
                        }
                    }
                    EntityKind::Character(character) => character.description.clone(),
                }
            } else {
                prompt.to_string()
            }
        };

        self.events.sender().emit(EngineEvent::VideoStarted {
            entity_id: entity_id.to_string(),
            asset_url: asset_url.to_string(),
        });
        info!(entity_id = %entity_id, asset_url = %asset_url, "video generation requested");

        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let events = self.events.sender();
        let entity_id = entity_id.to_string();
        let asset_url = asset_url.to_string();

        Ok(tokio::spawn(async move {
            let request = VideoRequest::new(asset_url.clone(), prompt, settings);
            match client.generate_video(&request).await {
                Ok(video_url) => {
                    let mut store = store.lock().unwrap();
                    match store.entity_mut(&entity_id) {
                        Some(entity) => {
                            if let Err(e) = entity.complete_video(&asset_url, video_url.clone()) {
                                warn!(entity_id = %entity_id, "video completion lost: {}", e);
                                return JobOutcome::Skipped;
                            }
                            events.emit(EngineEvent::VideoCompleted {
                                entity_id,
                                asset_url,
                                video_url,
                            });
                            JobOutcome::Completed
                        }
                        None => {
                            warn!(entity_id = %entity_id, "entity removed during video generation");
                            JobOutcome::Skipped
                        }
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    let mut store = store.lock().unwrap();
                    if let Some(entity) = store.entity_mut(&entity_id) {
                        let _ = entity.fail_video(&asset_url, message.clone());
                    }
                    events.emit(EngineEvent::VideoFailed {
                        entity_id,
                        asset_url,
                        error: message,
                    });
                    JobOutcome::Failed
                }
            }
        }))
    }
}

// =============================================================================
// Generation Job
// =============================================================================

/// Runs one entity through the generation state machine: admit, call the
/// service, record the terminal outcome. Shared by batch workers and single
/// retries.
async fn run_generation_job(
    store: Arc<Mutex<EntityStore>>,
    client: Arc<dyn GenerationClient>,
    settings: GenerationSettings,
    events: EventSender,
    entity_id: EntityId,
) -> JobOutcome {
    let request = {
        let mut store = store.lock().unwrap();
        let Some(entity) = store.entity_mut(&entity_id) else {
            warn!(entity_id = %entity_id, "generation target vanished before start");
            return JobOutcome::Skipped;
        };
        if let Err(e) = entity.begin_generation() {
            warn!(entity_id = %entity_id, "generation not started: {}", e);
            return JobOutcome::Skipped;
        }

        // Characters always render as square portraits; scenes follow the
        // configured aspect ratio.
        let aspect_ratio = match &entity.kind {
            EntityKind::Character(_) => AspectRatio::Square,
            EntityKind::Scene(_) => settings.aspect_ratio,
        };
        ImageRequest::new(entity.kind.image_prompt())
            .with_engine(settings.engine)
            .with_aspect_ratio(aspect_ratio)
            .with_resolution(settings.resolution)
    };

    events.emit(EngineEvent::GenerationStarted {
        entity_id: entity_id.clone(),
    });

    match client.generate_image(&request).await {
        Ok(url) => {
            let asset = GeneratedAsset::new(url.clone(), request.prompt);
            let mut store = store.lock().unwrap();
            match store.entity_mut(&entity_id) {
                Some(entity) => {
                    entity.complete_generation(asset);
                    info!(entity_id = %entity_id, "image generation completed");
                    events.emit(EngineEvent::GenerationCompleted { entity_id, url });
                    JobOutcome::Completed
                }
                None => {
                    warn!(entity_id = %entity_id, "entity removed during generation");
                    JobOutcome::Skipped
                }
            }
        }
        Err(e) => {
            let message = e.to_string();
            let mut store = store.lock().unwrap();
            match store.entity_mut(&entity_id) {
                Some(entity) => {
                    entity.fail_generation(message.clone());
                    warn!(entity_id = %entity_id, "image generation failed: {}", message);
                    events.emit(EngineEvent::GenerationFailed {
                        entity_id,
                        error: message,
                    });
                    JobOutcome::Failed
                }
                None => {
                    warn!(entity_id = %entity_id, "entity removed during generation");
                    JobOutcome::Skipped
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{AnalysisResult, SceneAnalysis};
    use crate::core::generative::MockGenerationClient;
    use crate::core::GenerationStatus;
    use std::time::Duration;

    fn scene_analysis(n: u32, prompt: &str) -> SceneAnalysis {
        SceneAnalysis {
            scene_number: n,
            original_text: format!("scene text {}", n),
            image_prompt: prompt.to_string(),
            video_prompt: format!("video prompt {}", n),
        }
    }

    fn analysis_with_scenes(prompts: &[&str]) -> AnalysisResult {
        AnalysisResult {
            scenes: prompts
                .iter()
                .enumerate()
                .map(|(i, p)| scene_analysis(i as u32 + 1, p))
                .collect(),
            characters: vec![],
        }
    }

    fn engine_with(client: MockGenerationClient) -> (StoryboardEngine, Arc<MockGenerationClient>) {
        let client = Arc::new(client);
        let engine = StoryboardEngine::new(client.clone(), GenerationSettings::default());
        (engine, client)
    }

    async fn seeded_engine(
        client: MockGenerationClient,
        prompts: &[&str],
    ) -> (StoryboardEngine, Arc<MockGenerationClient>) {
        let (engine, client) =
            engine_with(client.with_analysis(analysis_with_scenes(prompts)));
        engine
            .analyze_script(&["the script".to_string()])
            .await
            .unwrap();
        (engine, client)
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    #[tokio::test]
    async fn test_analyze_populates_store() {
        let (engine, _) = seeded_engine(MockGenerationClient::new(), &["one", "two"]).await;
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.scenes.len(), 2);
        assert!(snapshot
            .scenes
            .iter()
            .all(|s| s.status == GenerationStatus::Pending));
    }

    #[tokio::test]
    async fn test_analyze_failure_leaves_store_untouched() {
        let (engine, _) = seeded_engine(MockGenerationClient::new(), &["one"]).await;

        // Empty script fails analysis; the previous entity set survives
        let err = engine.analyze_script(&["  ".to_string()]).await.unwrap_err();
        assert!(matches!(err, CoreError::AnalysisFailed(_)));
        assert_eq!(engine.snapshot().scenes.len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_rejected_while_batch_active() {
        let (engine, _) = seeded_engine(
            MockGenerationClient::new().with_latency(Duration::from_millis(50)),
            &["one", "two", "three"],
        )
        .await;

        let batch = engine.submit_batch(engine.pending_targets()).unwrap();
        assert!(engine.is_batch_active());

        let err = engine
            .analyze_script(&["the script".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BatchActive));

        batch.await.unwrap();
        assert!(!engine.is_batch_active());
        engine
            .analyze_script(&["the script".to_string()])
            .await
            .unwrap();
    }

    // =========================================================================
    // Batch Generation
    // =========================================================================

    #[tokio::test]
    async fn test_batch_of_five_under_cap_of_three() {
        // Scenario: 5 pending scenes, C=3. All complete; the cap holds; the
        // active flag clears exactly once at the end.
        let (engine, client) = seeded_engine(
            MockGenerationClient::new().with_latency(Duration::from_millis(20)),
            &["one", "two", "three", "four", "five"],
        )
        .await;

        let handle = engine.submit_batch(engine.pending_targets()).unwrap();
        let summary = handle.await.unwrap();

        assert_eq!(summary.completed, 5);
        assert_eq!(summary.failed, 0);
        assert!(!engine.is_batch_active());
        assert_eq!(client.max_in_flight(), 3);

        let snapshot = engine.snapshot();
        assert!(snapshot
            .scenes
            .iter()
            .all(|s| s.status == GenerationStatus::Completed));
        assert_eq!(snapshot.completed_scene_count(), 5);
        // Every scene got exactly one history entry with the head mirrored
        for scene in &snapshot.scenes {
            assert_eq!(scene.history.len(), 1);
            assert_eq!(scene.image_url.as_deref(), Some(scene.history[0].url.as_str()));
        }
    }

    #[tokio::test]
    async fn test_one_refusal_does_not_affect_siblings() {
        // Scenario: entity A refused, entity B proceeds, batch completes.
        let (engine, _) = seeded_engine(
            MockGenerationClient::new().refusing_prompts_containing("forbidden"),
            &["a forbidden subject", "a plain subject"],
        )
        .await;

        let summary = engine
            .submit_batch(engine.pending_targets())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);

        let snapshot = engine.snapshot();
        let failed = &snapshot.scenes[0];
        assert_eq!(failed.status, GenerationStatus::Failed);
        let reason = failed.error.as_deref().unwrap();
        assert!(reason.contains("forbidden"));
        assert!(failed.history.is_empty());

        let completed = &snapshot.scenes[1];
        assert_eq!(completed.status, GenerationStatus::Completed);
        assert!(completed.image_url.is_some());
    }

    #[tokio::test]
    async fn test_second_batch_rejected_while_active() {
        let (engine, _) = seeded_engine(
            MockGenerationClient::new().with_latency(Duration::from_millis(50)),
            &["one", "two"],
        )
        .await;

        let first = engine.submit_batch(engine.pending_targets()).unwrap();
        assert!(matches!(
            engine.submit_batch(engine.pending_targets()),
            Err(CoreError::BatchActive)
        ));
        first.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_targets_are_skipped() {
        let (engine, client) = seeded_engine(MockGenerationClient::new(), &["one"]).await;

        let mut targets = engine.pending_targets();
        targets.push("no-such-entity".to_string());

        let summary = engine.submit_batch(targets).unwrap().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(client.image_calls(), 1);
    }

    #[tokio::test]
    async fn test_entity_deleted_mid_batch_is_skipped() {
        let (engine, _) = seeded_engine(
            MockGenerationClient::new().with_latency(Duration::from_millis(50)),
            &["one", "two"],
        )
        .await;

        // C=3 admits both immediately; delete the second before its service
        // call resolves.
        let targets = engine.pending_targets();
        let doomed = targets[1].clone();
        let handle = engine.submit_batch(targets).unwrap();
        engine.delete_entity(&doomed).unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary.completed + summary.skipped, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(engine.snapshot().scenes.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_filter_excludes_completed_between_batches() {
        let (engine, _) = seeded_engine(
            MockGenerationClient::new().refusing_prompts_containing("forbidden"),
            &["a forbidden subject", "a plain subject"],
        )
        .await;

        engine
            .submit_batch(engine.pending_targets())
            .unwrap()
            .await
            .unwrap();

        // Only the refused scene is retried
        let retry_targets = engine.pending_targets();
        assert_eq!(retry_targets.len(), 1);
        assert_eq!(engine.all_targets().len(), 2);
    }

    // =========================================================================
    // Retry
    // =========================================================================

    #[tokio::test]
    async fn test_retry_after_failure_clears_error_and_appends() {
        let (engine, client) = seeded_engine(
            MockGenerationClient::new().refusing_prompts_containing("forbidden"),
            &["a plain subject"],
        )
        .await;

        let id = engine.pending_targets()[0].clone();
        engine.retry_generation(&id).unwrap().await.unwrap();
        assert_eq!(
            engine.snapshot().scenes[0].status,
            GenerationStatus::Completed
        );

        // A second retry regenerates and grows the history
        engine.retry_generation(&id).unwrap().await.unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.scenes[0].history.len(), 2);
        assert_eq!(client.image_calls(), 2);
        assert_eq!(
            snapshot.scenes[0].image_url.as_deref(),
            Some(snapshot.scenes[0].history[0].url.as_str())
        );
    }

    #[tokio::test]
    async fn test_retry_unknown_entity() {
        let (engine, _) = engine_with(MockGenerationClient::new());
        assert!(matches!(
            engine.retry_generation("missing"),
            Err(CoreError::EntityNotFound(_))
        ));
    }

    // =========================================================================
    // Video
    // =========================================================================

    async fn completed_engine() -> (StoryboardEngine, Arc<MockGenerationClient>) {
        let (engine, client) = seeded_engine(MockGenerationClient::new(), &["one"]).await;
        engine
            .submit_batch(engine.pending_targets())
            .unwrap()
            .await
            .unwrap();
        (engine, client)
    }

    #[tokio::test]
    async fn test_video_on_head_asset_mirrors_entity() {
        let (engine, _) = completed_engine().await;
        let snapshot = engine.snapshot();
        let id = snapshot.scenes[0].id.clone();
        let head_url = snapshot.scenes[0].image_url.clone().unwrap();

        let outcome = engine
            .request_video(&id, &head_url, "slow pan", VideoSettings::default())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);

        let scene = &engine.snapshot().scenes[0];
        assert_eq!(scene.video_status, Some(GenerationStatus::Completed));
        assert!(scene.video_url.is_some());
        assert_eq!(scene.history[0].video_status, GenerationStatus::Completed);
        assert_eq!(scene.video_url, scene.history[0].video_url);
    }

    #[tokio::test]
    async fn test_video_on_historical_asset_leaves_entity_mirror() {
        // Scenario: history = [new, old]; a video for the old asset completes
        // without touching the entity-level convenience fields.
        let (engine, _) = completed_engine().await;
        let id = engine.snapshot().scenes[0].id.clone();
        engine.retry_generation(&id).unwrap().await.unwrap();

        let snapshot = engine.snapshot();
        let scene = &snapshot.scenes[0];
        assert_eq!(scene.history.len(), 2);
        let old_url = scene.history[1].url.clone();

        let outcome = engine
            .request_video(&id, &old_url, "slow pan", VideoSettings::default())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed);

        let scene = &engine.snapshot().scenes[0];
        let old = scene.history.iter().find(|a| a.url == old_url).unwrap();
        assert_eq!(old.video_status, GenerationStatus::Completed);
        assert!(old.video_url.is_some());
        assert!(scene.video_status.is_none());
        assert!(scene.video_url.is_none());
    }

    #[tokio::test]
    async fn test_video_failure_records_error_on_asset() {
        let (engine, _) = {
            let (engine, client) = seeded_engine(
                MockGenerationClient::new().with_failing_video(),
                &["one"],
            )
            .await;
            engine
                .submit_batch(engine.pending_targets())
                .unwrap()
                .await
                .unwrap();
            (engine, client)
        };

        let snapshot = engine.snapshot();
        let id = snapshot.scenes[0].id.clone();
        let head_url = snapshot.scenes[0].image_url.clone().unwrap();

        let outcome = engine
            .request_video(&id, &head_url, "slow pan", VideoSettings::default())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Failed);

        let scene = &engine.snapshot().scenes[0];
        assert_eq!(scene.history[0].video_status, GenerationStatus::Failed);
        assert!(scene.history[0]
            .video_error
            .as_deref()
            .unwrap()
            .contains("operation failed"));
        assert_eq!(scene.video_status, Some(GenerationStatus::Failed));
    }

    #[tokio::test]
    async fn test_video_unknown_asset_rejected_up_front() {
        let (engine, client) = completed_engine().await;
        let id = engine.snapshot().scenes[0].id.clone();

        let err = engine
            .request_video(&id, "asset://missing", "", VideoSettings::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::AssetNotFound(_)));
        assert_eq!(client.video_calls(), 0);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[tokio::test]
    async fn test_event_stream_reports_batch_lifecycle() {
        let client = Arc::new(
            MockGenerationClient::new().with_analysis(analysis_with_scenes(&["one"])),
        );
        let mut engine =
            StoryboardEngine::new(client.clone(), GenerationSettings::default());
        let mut rx = engine.take_event_receiver().unwrap();

        engine
            .analyze_script(&["the script".to_string()])
            .await
            .unwrap();
        engine
            .submit_batch(engine.pending_targets())
            .unwrap()
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(seen
            .iter()
            .any(|e| matches!(e, EngineEvent::AnalysisMerged { scenes: 1, .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, EngineEvent::GenerationStarted { .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, EngineEvent::GenerationCompleted { .. })));
        assert!(seen.iter().any(|e| matches!(
            e,
            EngineEvent::BatchFinished { summary } if summary.completed == 1
        )));
    }

    // =========================================================================
    // Commands
    // =========================================================================

    #[tokio::test]
    async fn test_manual_scene_lifecycle() {
        let (engine, _) = engine_with(MockGenerationClient::new());

        let id = engine.add_scene();
        engine
            .update_scene(
                &id,
                ScenePatch {
                    image_prompt: Some("a lighthouse in a storm".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        engine.retry_generation(&id).unwrap().await.unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.scenes[0].status, GenerationStatus::Completed);
        assert_eq!(
            snapshot.scenes[0].history[0].prompt,
            "a lighthouse in a storm"
        );

        engine.delete_entity(&id).unwrap();
        assert!(engine.snapshot().scenes.is_empty());
    }
}
