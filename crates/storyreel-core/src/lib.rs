//! Storyreel Core Library
//!
//! Generation orchestrator for script-to-storyboard pipelines: a script is
//! analyzed into scenes and characters, each entity's illustration is
//! generated through an external service under a bounded-concurrency
//! scheduler, and any historical asset can be animated into a video.
//!
//! The presentation layer (canvas, cards, modals) lives outside this crate;
//! it drives the engine through the command surface on
//! [`core::engine::StoryboardEngine`] and observes progress through its
//! event stream.

pub mod core;
