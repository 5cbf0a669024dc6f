//! Delivery strategies
//!
//! A strategy is the format-specific way of getting a source playing on
//! the surface:
//! - Progressive: direct source assignment
//! - Engine HLS: adaptive-streaming engine instance
//! - Native HLS: surface plays the manifest itself
//! - Native DASH: surface plays the manifest itself (no engine integration)

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    engine::{AdaptiveEngine, EngineEvent, EngineFactory},
    error::{Error, Result},
    surface::PlaybackSurface,
    telemetry::TelemetryRow,
    types::{DeliveryKind, EngineConfig, MediaSource},
};

/// The concrete delivery path a session ended up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Progressive,
    EngineHls,
    NativeHls,
    NativeDash,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Progressive => write!(f, "progressive"),
            StrategyKind::EngineHls => write!(f, "engine-hls"),
            StrategyKind::NativeHls => write!(f, "native-hls"),
            StrategyKind::NativeDash => write!(f, "native-dash"),
        }
    }
}

/// Format-specific attachment of a source to the playback surface.
///
/// A session owns at most one strategy at a time. `dispose` is idempotent
/// and must leave no engine instance, timer, or subscription behind.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Begin loading the source on the surface
    async fn attach(&mut self, source: &MediaSource) -> Result<()>;

    /// Tear down whatever `attach` set up. Safe to call repeatedly or when
    /// nothing is attached.
    fn dispose(&mut self);

    /// Engine-specific telemetry rows; empty when not applicable
    fn describe(&self) -> Vec<TelemetryRow>;

    /// The engine instance backing this strategy, if any
    fn engine(&self) -> Option<&dyn AdaptiveEngine> {
        None
    }

    /// React to an engine event addressed to this strategy
    fn handle_engine_event(&mut self, _event: &EngineEvent) {}
}

/// Pure strategy choice from delivery kind plus the two capability probes.
///
/// HLS precedence: engine-backed > native > fatal. DASH relies on native
/// surface support with no dedicated engine integration.
pub fn choose(
    kind: DeliveryKind,
    engine_supported: bool,
    native_support: impl Fn(DeliveryKind) -> bool,
) -> Result<StrategyKind> {
    match kind {
        DeliveryKind::Progressive => Ok(StrategyKind::Progressive),
        DeliveryKind::Hls => {
            if engine_supported {
                Ok(StrategyKind::EngineHls)
            } else if native_support(DeliveryKind::Hls) {
                Ok(StrategyKind::NativeHls)
            } else {
                Err(Error::FormatUnsupported { kind })
            }
        }
        DeliveryKind::Dash => Ok(StrategyKind::NativeDash),
    }
}

/// Select and construct the delivery strategy for a resolved kind.
///
/// Engine-backed strategies receive a freshly constructed engine wired to
/// `engine_events`; the caller owns the receiving end.
pub fn select_strategy(
    kind: DeliveryKind,
    surface: Arc<dyn PlaybackSurface>,
    factory: &dyn EngineFactory,
    config: &EngineConfig,
    engine_events: mpsc::UnboundedSender<EngineEvent>,
) -> Result<Box<dyn DeliveryStrategy>> {
    let choice = choose(kind, factory.is_supported(), |k| surface.can_play_native(k))?;
    debug!(kind = %kind, strategy = %choice, "Delivery strategy selected");

    match choice {
        StrategyKind::Progressive => Ok(Box::new(ProgressiveStrategy::new(surface))),
        StrategyKind::EngineHls => {
            let engine = factory.create(config, surface.clone(), engine_events)?;
            Ok(Box::new(EngineHlsStrategy::new(surface, engine)))
        }
        StrategyKind::NativeHls => Ok(Box::new(NativeStrategy::new(
            surface,
            StrategyKind::NativeHls,
        ))),
        StrategyKind::NativeDash => Ok(Box::new(NativeStrategy::new(
            surface,
            StrategyKind::NativeDash,
        ))),
    }
}

/// Direct file playback. No autoplay-policy workaround is needed since the
/// load is user-initiated, so the surface is unmuted immediately.
pub struct ProgressiveStrategy {
    surface: Arc<dyn PlaybackSurface>,
    attached: bool,
}

impl ProgressiveStrategy {
    pub fn new(surface: Arc<dyn PlaybackSurface>) -> Self {
        Self {
            surface,
            attached: false,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for ProgressiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Progressive
    }

    async fn attach(&mut self, source: &MediaSource) -> Result<()> {
        self.surface.set_source(&source.url);
        self.surface.set_muted(false);
        self.surface.play();
        self.attached = true;
        Ok(())
    }

    fn dispose(&mut self) {
        if self.attached {
            self.surface.clear_source();
            self.attached = false;
        }
    }

    fn describe(&self) -> Vec<TelemetryRow> {
        Vec::new()
    }
}

/// HLS playback through the adaptive-streaming engine
pub struct EngineHlsStrategy {
    surface: Arc<dyn PlaybackSurface>,
    engine: Option<Box<dyn AdaptiveEngine>>,
}

impl EngineHlsStrategy {
    pub fn new(surface: Arc<dyn PlaybackSurface>, engine: Box<dyn AdaptiveEngine>) -> Self {
        Self {
            surface,
            engine: Some(engine),
        }
    }

    /// Force explicit audio-track selection to index 0 when several tracks
    /// exist and none is active. Some platforms otherwise emit video with
    /// no audio; track lists can also bind late, so this runs on both
    /// manifest-parsed and audio-track-loaded.
    fn ensure_audio_track(&self) {
        let Some(engine) = &self.engine else { return };
        let tracks = engine.audio_tracks();
        if tracks.len() > 1 && !tracks.iter().any(|t| t.active) {
            info!(tracks = tracks.len(), "No active audio track, forcing index 0");
            engine.set_audio_track(0);
        }
    }
}

#[async_trait]
impl DeliveryStrategy for EngineHlsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EngineHls
    }

    async fn attach(&mut self, source: &MediaSource) -> Result<()> {
        let Some(engine) = &self.engine else {
            return Err(Error::Internal("engine already disposed".into()));
        };
        engine.load_source(&source.url).await
    }

    fn dispose(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.stop_load();
            engine.destroy();
            debug!("Adaptive engine destroyed");
        }
    }

    fn describe(&self) -> Vec<TelemetryRow> {
        let Some(engine) = &self.engine else {
            return Vec::new();
        };

        let mut rows = vec![TelemetryRow::entry("Delivery", "HLS (engine)")];
        if let Some(rendition) = engine.active_rendition() {
            rows.push(TelemetryRow::entry(
                "Bitrate",
                format!("{} kbps", rendition.bitrate / 1000),
            ));
            rows.push(TelemetryRow::entry(
                "Rendition",
                format!("{}x{}", rendition.width, rendition.height),
            ));
            if let Some(codec) = rendition.video_codec {
                rows.push(TelemetryRow::entry("Video Codec", codec));
            }
            if let Some(codec) = rendition.audio_codec {
                rows.push(TelemetryRow::entry("Audio Codec", codec));
            }
        }
        if let Some(estimate) = engine.bandwidth_estimate() {
            rows.push(TelemetryRow::entry(
                "Bandwidth Est.",
                format!("{:.1} Mbps", estimate as f64 / 1_000_000.0),
            ));
        }
        if let Some(ahead) = engine.forward_buffer_length() {
            rows.push(TelemetryRow::entry("Forward Buffer", format!("{ahead:.1}s")));
        }
        rows
    }

    fn engine(&self) -> Option<&dyn AdaptiveEngine> {
        self.engine.as_deref()
    }

    fn handle_engine_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::ManifestParsed => {
                self.ensure_audio_track();
                self.surface.set_muted(false);
                self.surface.play();
            }
            EngineEvent::AudioTrackLoaded => self.ensure_audio_track(),
            EngineEvent::Error(_) => {}
        }
    }
}

/// Native playback of a manifest URL, used for HLS when the engine is
/// unavailable and for DASH always. The surface is handed the URL as-is;
/// unmuting happens through the session's autoplay sequence.
pub struct NativeStrategy {
    surface: Arc<dyn PlaybackSurface>,
    kind: StrategyKind,
    attached: bool,
}

impl NativeStrategy {
    pub fn new(surface: Arc<dyn PlaybackSurface>, kind: StrategyKind) -> Self {
        Self {
            surface,
            kind,
            attached: false,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for NativeStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attach(&mut self, source: &MediaSource) -> Result<()> {
        self.surface.set_source(&source.url);
        self.surface.play();
        self.attached = true;
        Ok(())
    }

    fn dispose(&mut self) {
        if self.attached {
            self.surface.clear_source();
            self.attached = false;
        }
    }

    fn describe(&self) -> Vec<TelemetryRow> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEngine, MockSurface};
    use crate::types::AudioTrackInfo;
    use url::Url;

    fn track(name: &str, active: bool) -> AudioTrackInfo {
        AudioTrackInfo {
            name: name.to_string(),
            language: None,
            active,
        }
    }

    #[test]
    fn test_choose_precedence() {
        // Engine-backed HLS beats native HLS
        assert_eq!(
            choose(DeliveryKind::Hls, true, |_| true).unwrap(),
            StrategyKind::EngineHls
        );
        // Native HLS when the engine is absent
        assert_eq!(
            choose(DeliveryKind::Hls, false, |_| true).unwrap(),
            StrategyKind::NativeHls
        );
        // Neither path viable -> fatal
        assert!(matches!(
            choose(DeliveryKind::Hls, false, |_| false),
            Err(Error::FormatUnsupported {
                kind: DeliveryKind::Hls
            })
        ));
        // DASH is always native, probes irrelevant
        assert_eq!(
            choose(DeliveryKind::Dash, true, |_| false).unwrap(),
            StrategyKind::NativeDash
        );
        assert_eq!(
            choose(DeliveryKind::Progressive, false, |_| false).unwrap(),
            StrategyKind::Progressive
        );
    }

    #[tokio::test]
    async fn test_progressive_attach_unmutes_and_plays() {
        let surface = Arc::new(MockSurface::new());
        surface.set_muted(true);

        let mut strategy = ProgressiveStrategy::new(surface.clone());
        let source = MediaSource::new(
            Url::parse("https://example.com/clip.mp4").unwrap(),
            "Clip",
        );
        strategy.attach(&source).await.unwrap();

        assert_eq!(surface.source(), Some(source.url.clone()));
        assert!(!surface.is_muted());
        assert!(!surface.is_paused());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let surface = Arc::new(MockSurface::new());
        let mut strategy = ProgressiveStrategy::new(surface.clone());
        let source = MediaSource::new(
            Url::parse("https://example.com/clip.mp4").unwrap(),
            "Clip",
        );
        strategy.attach(&source).await.unwrap();

        strategy.dispose();
        assert_eq!(surface.source(), None);
        // Second dispose is a no-op, not a panic
        strategy.dispose();

        // Disposing a never-attached strategy is safe too
        let mut fresh = ProgressiveStrategy::new(surface);
        fresh.dispose();
    }

    #[tokio::test]
    async fn test_audio_track_forced_when_none_active() {
        let surface = Arc::new(MockSurface::new());
        let engine = MockEngine::new();
        engine.set_audio_tracks(vec![track("en", false), track("es", false)]);

        let mut strategy = EngineHlsStrategy::new(surface, Box::new(engine.clone()));
        strategy.handle_engine_event(&EngineEvent::ManifestParsed);

        assert_eq!(engine.selected_audio_track(), Some(0));
    }

    #[tokio::test]
    async fn test_audio_track_not_forced_when_active_exists() {
        let surface = Arc::new(MockSurface::new());
        let engine = MockEngine::new();
        engine.set_audio_tracks(vec![track("en", false), track("es", true)]);

        let mut strategy = EngineHlsStrategy::new(surface, Box::new(engine.clone()));
        strategy.handle_engine_event(&EngineEvent::ManifestParsed);

        assert_eq!(engine.selected_audio_track(), None);
    }

    #[tokio::test]
    async fn test_audio_track_not_forced_for_single_track() {
        let surface = Arc::new(MockSurface::new());
        let engine = MockEngine::new();
        engine.set_audio_tracks(vec![track("en", false)]);

        let mut strategy = EngineHlsStrategy::new(surface, Box::new(engine.clone()));
        strategy.handle_engine_event(&EngineEvent::ManifestParsed);

        assert_eq!(engine.selected_audio_track(), None);
    }

    #[tokio::test]
    async fn test_audio_fix_reapplied_on_late_track_list() {
        let surface = Arc::new(MockSurface::new());
        let engine = MockEngine::new();

        let mut strategy = EngineHlsStrategy::new(surface, Box::new(engine.clone()));
        // Manifest parsed before the track list bound: nothing to force yet
        strategy.handle_engine_event(&EngineEvent::ManifestParsed);
        assert_eq!(engine.selected_audio_track(), None);

        engine.set_audio_tracks(vec![track("en", false), track("es", false)]);
        strategy.handle_engine_event(&EngineEvent::AudioTrackLoaded);
        assert_eq!(engine.selected_audio_track(), Some(0));
    }

    #[tokio::test]
    async fn test_manifest_parsed_unmutes_and_plays() {
        let surface = Arc::new(MockSurface::new());
        surface.set_muted(true);
        let engine = MockEngine::new();

        let mut strategy = EngineHlsStrategy::new(surface.clone(), Box::new(engine));
        strategy.handle_engine_event(&EngineEvent::ManifestParsed);

        assert!(!surface.is_muted());
        assert!(!surface.is_paused());
    }

    #[tokio::test]
    async fn test_engine_dispose_destroys_instance() {
        let surface = Arc::new(MockSurface::new());
        let engine = MockEngine::new();

        let mut strategy = EngineHlsStrategy::new(surface, Box::new(engine.clone()));
        strategy.dispose();

        assert!(engine.destroyed());
        assert!(strategy.engine().is_none());
        assert!(strategy.describe().is_empty());
        // Idempotent
        strategy.dispose();
    }
}
