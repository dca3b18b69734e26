//! Engine Events
//!
//! Progress events emitted by the engine for the presentation layer. Events
//! flow through an unbounded channel; the receiver can be taken exactly once.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::scheduler::BatchSummary;
use crate::core::EntityId;

/// Engine progress event
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    /// A fresh analysis was merged into the entity store
    AnalysisMerged { scenes: usize, characters: usize },
    /// An entity entered `generating`
    GenerationStarted { entity_id: EntityId },
    /// An entity's image generation succeeded
    GenerationCompleted { entity_id: EntityId, url: String },
    /// An entity's image generation failed
    GenerationFailed { entity_id: EntityId, error: String },
    /// A batch was admitted
    BatchStarted { targets: usize, concurrency: usize },
    /// A batch finished; the single-flight guard has been released
    BatchFinished { summary: BatchSummary },
    /// A video request entered `generating`
    VideoStarted { entity_id: EntityId, asset_url: String },
    /// A video request completed
    VideoCompleted {
        entity_id: EntityId,
        asset_url: String,
        video_url: String,
    },
    /// A video request failed
    VideoFailed {
        entity_id: EntityId,
        asset_url: String,
        error: String,
    },
}

/// Event channel owned by the engine
#[derive(Debug)]
pub(crate) struct EventChannel {
    tx: mpsc::UnboundedSender<EngineEvent>,
    rx: Option<mpsc::UnboundedReceiver<EngineEvent>>,
}

impl EventChannel {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }

    pub(crate) fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Takes the receiver (can only be called once)
    pub(crate) fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.rx.take()
    }
}

/// Cloneable sending half handed to spawned jobs
#[derive(Clone, Debug)]
pub(crate) struct EventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSender {
    /// Emits an event; send failures (no receiver) are ignored
    pub(crate) fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_flow_through_channel() {
        let mut channel = EventChannel::new();
        let mut rx = channel.take_receiver().unwrap();
        assert!(channel.take_receiver().is_none());

        let sender = channel.sender();
        sender.emit(EngineEvent::GenerationStarted {
            entity_id: "e1".to_string(),
        });

        match rx.recv().await.unwrap() {
            EngineEvent::GenerationStarted { entity_id } => assert_eq!(entity_id, "e1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_receiver_is_silent() {
        let mut channel = EventChannel::new();
        drop(channel.take_receiver());
        channel.sender().emit(EngineEvent::BatchStarted {
            targets: 1,
            concurrency: 1,
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::GenerationFailed {
            entity_id: "e2".to_string(),
            error: "refused".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"generationFailed\""));
        assert!(json.contains("\"entityId\":\"e2\""));
    }
}
