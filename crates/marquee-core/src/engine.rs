//! Adaptive-streaming engine capability
//!
//! HLS playback on platforms without native support goes through an
//! external engine (bitrate ladder selection, manifest and segment
//! fetching). The controller never does any of that itself: it drives the
//! engine through [`AdaptiveEngine`], learns about it through
//! [`EngineEvent`]s, and probes for its availability once through
//! [`EngineFactory`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::{
    error::{EngineError, Result},
    surface::PlaybackSurface,
    types::{ActiveRendition, AudioTrackInfo, EngineConfig},
};

/// Events emitted by an engine instance.
///
/// Surface events and engine events may interleave arbitrarily; nothing in
/// the controller assumes an ordering between the two.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The manifest was fetched and parsed; tracks are known
    ManifestParsed,
    /// An audio track list became available or changed after the manifest
    AudioTrackLoaded,
    /// An error occurred; only fatal ones require action
    Error(EngineError),
}

/// A live adaptive-streaming engine instance, already bound to a playback
/// surface. At most one instance exists per session; a new load fully
/// destroys the previous instance first.
#[async_trait]
pub trait AdaptiveEngine: Send + Sync {
    /// Begin loading a manifest. Completion and failure are observed via
    /// [`EngineEvent`]s, not the return value.
    async fn load_source(&self, url: &Url) -> Result<()>;

    /// (Re)start loading for the current manifest. Used as the corrective
    /// action for fatal network errors; the engine's internal retry
    /// counters take it from there.
    fn start_load(&self);

    /// Halt fragment loading without destroying the instance
    fn stop_load(&self);

    /// Invoke the engine's media-error-recovery procedure
    fn recover_media_error(&self);

    /// Tear the instance down: timers, subscriptions, media bindings.
    /// Idempotent.
    fn destroy(&self);

    /// Audio tracks known to the engine
    fn audio_tracks(&self) -> Vec<AudioTrackInfo>;

    /// Force the active audio track by index
    fn set_audio_track(&self, index: usize);

    /// Rendition currently feeding the surface
    fn active_rendition(&self) -> Option<ActiveRendition>;

    /// Bandwidth estimate in bits per second
    fn bandwidth_estimate(&self) -> Option<u64>;

    /// Seconds of media buffered ahead of the playhead inside the engine
    fn forward_buffer_length(&self) -> Option<f64>;
}

/// Capability probe and constructor for the adaptive-streaming engine.
///
/// Resolved once at session construction; `is_supported` is the
/// "engine present and functional on this platform" probe used during
/// strategy selection.
pub trait EngineFactory: Send + Sync {
    /// Whether the engine can run on this platform at all
    fn is_supported(&self) -> bool;

    /// Construct an engine bound to `surface`, emitting events on `events`
    fn create(
        &self,
        config: &EngineConfig,
        surface: Arc<dyn PlaybackSurface>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Box<dyn AdaptiveEngine>>;
}
