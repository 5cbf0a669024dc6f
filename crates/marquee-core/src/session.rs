//! Playback session - main orchestrator
//!
//! Owns exactly one delivery strategy at a time and coordinates:
//! - Format resolution and strategy attachment
//! - Load/teardown lifecycle with explicit instance invalidation
//! - The autoplay mute-then-unmute sequence
//! - Engine error recovery
//! - Telemetry polling while the stats view is open

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{
    bridge::{ControllerSignal, EventBridge, SurfaceEvent},
    engine::{AdaptiveEngine, EngineEvent, EngineFactory},
    error::{Error, Result},
    recovery::{RecoveryAction, RecoveryPolicy},
    resolve,
    strategy::{self, DeliveryStrategy, StrategyKind},
    surface::PlaybackSurface,
    telemetry::{self, TelemetryRow},
    types::{ControllerConfig, MediaSource, PlaybackState, SessionId},
};

/// Playback session managing one surface for the application's lifetime.
///
/// One session exists at a time; everything that was ambient module state
/// in less disciplined players (the live engine instance, the pending
/// unmute timer, the telemetry poller) is an owned field here, invalidated
/// explicitly on every reload.
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    /// Controller configuration
    config: ControllerConfig,
    /// Platform media element
    surface: Arc<dyn PlaybackSurface>,
    /// Adaptive-streaming engine capability, probed at selection time
    engine_factory: Arc<dyn EngineFactory>,
    /// Surface-event to controller-signal translation
    bridge: EventBridge,
    /// Current playback state
    state: Arc<RwLock<PlaybackState>>,
    /// State change broadcaster
    state_tx: watch::Sender<PlaybackState>,
    /// Source currently loaded, if any
    current_source: RwLock<Option<MediaSource>>,
    /// Active delivery strategy; `Some` iff state != Idle (modulo Errored
    /// loads that never produced a strategy)
    strategy: RwLock<Option<Box<dyn DeliveryStrategy>>>,
    /// Engine error recovery state, reset on every load
    recovery: RwLock<RecoveryPolicy>,
    /// Load generation; engine events from older generations are stale
    generation: AtomicU64,
    /// Whether the surface is muted only to satisfy autoplay policies
    muted_for_autoplay: Arc<AtomicBool>,
    /// Pending autoplay-unmute timer (at most one)
    unmute_task: Mutex<Option<JoinHandle<()>>>,
    /// Telemetry poller while the stats view is open
    telemetry_task: Mutex<Option<JoinHandle<()>>>,
    /// Task draining the active engine's event channel
    engine_pump: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackSession {
    /// Create a session. The returned receiver carries every
    /// [`ControllerSignal`] the session emits; subscribe once and keep it.
    pub fn new(
        surface: Arc<dyn PlaybackSurface>,
        engine_factory: Arc<dyn EngineFactory>,
        config: ControllerConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ControllerSignal>) {
        let (bridge, signal_rx) = EventBridge::new();
        let (state_tx, _) = watch::channel(PlaybackState::Idle);

        let session = Arc::new(Self {
            id: SessionId::new(),
            config,
            surface,
            engine_factory,
            bridge,
            state: Arc::new(RwLock::new(PlaybackState::Idle)),
            state_tx,
            current_source: RwLock::new(None),
            strategy: RwLock::new(None),
            recovery: RwLock::new(RecoveryPolicy::new()),
            generation: AtomicU64::new(0),
            muted_for_autoplay: Arc::new(AtomicBool::new(false)),
            unmute_task: Mutex::new(None),
            telemetry_task: Mutex::new(None),
            engine_pump: Mutex::new(None),
        });

        (session, signal_rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current state
    pub async fn state(&self) -> PlaybackState {
        *self.state.read().await
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Source currently loaded, if any
    pub async fn current_source(&self) -> Option<MediaSource> {
        self.current_source.read().await.clone()
    }

    /// Kind of the active delivery strategy, if any
    pub async fn strategy_kind(&self) -> Option<StrategyKind> {
        self.strategy.read().await.as_ref().map(|s| s.kind())
    }

    /// Transition to a new state, enforcing the state machine
    async fn set_state(&self, new_state: PlaybackState) -> Result<()> {
        let current = *self.state.read().await;

        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        *self.state.write().await = new_state;
        let _ = self.state_tx.send(new_state);
        self.bridge.emit(ControllerSignal::StateChanged(new_state));

        info!(from = %current, to = %new_state, "State transition");
        Ok(())
    }

    /// Transition when valid, ignore otherwise. Used for event-driven
    /// transitions where repeated surface events are normal.
    async fn maybe_set_state(&self, new_state: PlaybackState) {
        if let Err(err) = self.set_state(new_state).await {
            debug!(error = %err, "Ignored state transition");
        }
    }

    /// Load a media source, replacing whatever is currently playing.
    ///
    /// Returns once the strategy has dispatched its attach; progress past
    /// that is observed through state transitions and signals, not the
    /// return value. A later `load` always wins: the previous strategy and
    /// engine are fully disposed before the new one is constructed, and
    /// their in-flight events are discarded by generation.
    #[instrument(skip(self, source), fields(session_id = %self.id, url = %source.url))]
    pub async fn load(self: &Arc<Self>, source: MediaSource) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, title = %source.title, "Loading media source");

        self.cancel_unmute().await;
        self.stop_engine_pump().await;
        if let Some(mut previous) = self.strategy.write().await.take() {
            previous.dispose();
        }
        self.recovery.write().await.reset();

        self.bridge.emit(ControllerSignal::ErrorCleared);
        self.bridge.emit(ControllerSignal::Loading(true));
        self.set_state(PlaybackState::Loading).await?;

        // Autoplay is blocked unmuted on most platforms; start muted and
        // restore audio once playback is confirmed.
        self.surface.set_muted(true);
        self.muted_for_autoplay.store(true, Ordering::SeqCst);

        let kind = resolve::classify(source.url.as_str());
        debug!(kind = %kind, "Source classified");

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut strategy = match strategy::select_strategy(
            kind,
            self.surface.clone(),
            self.engine_factory.as_ref(),
            &self.config.engine,
            events_tx,
        ) {
            Ok(strategy) => strategy,
            Err(err) => return self.fail_load(err).await,
        };

        if let Err(err) = strategy.attach(&source).await {
            strategy.dispose();
            return self.fail_load(err).await;
        }

        *self.current_source.write().await = Some(source);
        *self.strategy.write().await = Some(strategy);

        let session = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                session.on_engine_event(generation, event).await;
            }
        });
        *self.engine_pump.lock().await = Some(pump);

        Ok(())
    }

    /// Mark the load failed: error display, Errored state, propagated error
    async fn fail_load(&self, err: Error) -> Result<()> {
        warn!(error = %err, code = err.error_code(), "Load failed");
        self.bridge.emit(ControllerSignal::Loading(false));
        self.bridge.emit(ControllerSignal::ErrorDisplay {
            message: err.to_string(),
        });
        let _ = self.set_state(PlaybackState::Errored).await;
        Err(err)
    }

    /// Release everything and return to Idle
    pub async fn teardown(&self) {
        info!(session_id = %self.id, "Tearing down session");

        // Invalidate any in-flight engine events before releasing resources
        self.generation.fetch_add(1, Ordering::SeqCst);

        self.cancel_unmute().await;
        self.stop_telemetry().await;
        self.stop_engine_pump().await;
        if let Some(mut strategy) = self.strategy.write().await.take() {
            strategy.dispose();
        }

        self.surface.pause();
        self.surface.clear_source();
        *self.current_source.write().await = None;
        self.recovery.write().await.reset();
        self.muted_for_autoplay.store(false, Ordering::SeqCst);

        *self.state.write().await = PlaybackState::Idle;
        let _ = self.state_tx.send(PlaybackState::Idle);
        self.bridge.emit(ControllerSignal::StateChanged(PlaybackState::Idle));
        self.bridge.emit(ControllerSignal::Loading(false));
        self.bridge
            .emit(ControllerSignal::PlayState { playing: false });
    }

    /// Feed a raw surface event into the controller
    pub async fn on_surface_event(&self, event: SurfaceEvent) {
        self.bridge.handle(&event, self.surface.as_ref());

        match event {
            SurfaceEvent::Play | SurfaceEvent::Playing => {
                self.maybe_set_state(PlaybackState::Playing).await;
                self.maybe_schedule_unmute().await;
            }
            SurfaceEvent::TimeUpdate => {
                self.maybe_schedule_unmute().await;
            }
            SurfaceEvent::Pause | SurfaceEvent::Ended => {
                self.maybe_set_state(PlaybackState::Paused).await;
            }
            SurfaceEvent::Error { .. } => {
                self.maybe_set_state(PlaybackState::Errored).await;
            }
            _ => {}
        }
    }

    /// Handle an engine event for the given load generation; events from
    /// disposed engines compare unequal and are dropped here.
    async fn on_engine_event(&self, generation: u64, event: EngineEvent) {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(generation, "Stale engine event discarded");
            return;
        }

        match event {
            EngineEvent::ManifestParsed | EngineEvent::AudioTrackLoaded => {
                if let Some(strategy) = self.strategy.write().await.as_mut() {
                    strategy.handle_engine_event(&event);
                }
            }
            EngineEvent::Error(error) => {
                let action = self.recovery.write().await.on_engine_error(&error);
                match action {
                    RecoveryAction::RestartLoad => {
                        self.with_engine(|engine| engine.start_load()).await;
                    }
                    RecoveryAction::RecoverMedia => {
                        self.with_engine(|engine| engine.recover_media_error())
                            .await;
                    }
                    RecoveryAction::Fatal(detail) => {
                        self.bridge.emit(ControllerSignal::Loading(false));
                        self.bridge.emit(ControllerSignal::ErrorDisplay {
                            message: format!("Playback failed: {detail}"),
                        });
                        self.maybe_set_state(PlaybackState::Errored).await;
                    }
                    RecoveryAction::Ignore => {}
                }
            }
        }
    }

    async fn with_engine(&self, f: impl FnOnce(&dyn AdaptiveEngine)) {
        if let Some(strategy) = self.strategy.read().await.as_ref() {
            if let Some(engine) = strategy.engine() {
                f(engine);
            }
        }
    }

    /// Toggle between play and pause on the surface
    pub async fn toggle_play_pause(&self) -> Result<()> {
        if self.state().await == PlaybackState::Idle {
            return Err(Error::NothingLoaded);
        }
        if self.surface.is_paused() {
            self.surface.play();
        } else {
            self.surface.pause();
        }
        Ok(())
    }

    /// Seek relative to the current position, clamped to `[0, duration]`
    pub async fn seek(&self, delta: f64) -> Result<()> {
        if self.state().await == PlaybackState::Idle {
            return Err(Error::NothingLoaded);
        }

        let position = self.surface.current_time();
        let target = match self.surface.duration() {
            Some(duration) => (position + delta).clamp(0.0, duration),
            None => (position + delta).max(0.0),
        };

        debug!(from = position, to = target, delta, "Seeking");
        self.surface.set_current_time(target);
        Ok(())
    }

    /// Enter or leave fullscreen; icon sync arrives via the
    /// `FullscreenChange` surface event.
    pub fn toggle_fullscreen(&self) {
        if self.surface.is_fullscreen() {
            self.surface.exit_fullscreen();
        } else {
            self.surface.request_fullscreen();
        }
    }

    /// Open or close the stats view. While open, a fresh telemetry
    /// snapshot is emitted every poll interval; the poller is fully torn
    /// down on close, never left running in the background. Returns
    /// whether the view is now open.
    pub async fn toggle_stats(self: &Arc<Self>) -> bool {
        let mut guard = self.telemetry_task.lock().await;
        if let Some(task) = guard.take() {
            task.abort();
            debug!("Telemetry poller stopped");
            return false;
        }

        let session = Arc::clone(self);
        let interval = Duration::from_millis(self.config.telemetry_interval_ms);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let rows = session.snapshot().await;
                session.bridge.emit(ControllerSignal::Telemetry { rows });
            }
        }));
        debug!(interval_ms = self.config.telemetry_interval_ms, "Telemetry poller started");
        true
    }

    /// Whether the stats view is currently open
    pub async fn stats_open(&self) -> bool {
        self.telemetry_task.lock().await.is_some()
    }

    /// Build a point-in-time telemetry snapshot
    pub async fn snapshot(&self) -> Vec<TelemetryRow> {
        let strategy = self.strategy.read().await;
        telemetry::build_snapshot(self.surface.as_ref(), strategy.as_deref())
    }

    /// The user grabbed the scrubber; position display is theirs until release
    pub fn begin_scrub(&self) {
        self.bridge.begin_scrub();
    }

    pub fn end_scrub(&self) {
        self.bridge.end_scrub();
    }

    pub fn begin_volume_drag(&self) {
        self.bridge.begin_volume_drag();
    }

    pub fn end_volume_drag(&self) {
        self.bridge.end_volume_drag();
    }

    /// Schedule the autoplay unmute once playback is confirmed and the
    /// playhead has moved past the threshold. Debounced: scheduling again
    /// replaces the pending timer, so at most one is ever live.
    async fn maybe_schedule_unmute(&self) {
        if !self.muted_for_autoplay.load(Ordering::SeqCst)
            || self.surface.is_paused()
            || self.surface.current_time() <= self.config.unmute_position_threshold
        {
            return;
        }

        let mut guard = self.unmute_task.lock().await;
        if let Some(pending) = guard.take() {
            pending.abort();
        }

        let surface = self.surface.clone();
        let flag = Arc::clone(&self.muted_for_autoplay);
        let delay = Duration::from_millis(self.config.unmute_debounce_ms);
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            surface.set_muted(false);
            flag.store(false, Ordering::SeqCst);
            debug!("Autoplay unmute applied");
        }));
    }

    async fn cancel_unmute(&self) {
        if let Some(task) = self.unmute_task.lock().await.take() {
            task.abort();
        }
    }

    async fn stop_telemetry(&self) {
        if let Some(task) = self.telemetry_task.lock().await.take() {
            task.abort();
        }
    }

    async fn stop_engine_pump(&self) {
        if let Some(task) = self.engine_pump.lock().await.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEngineFactory, MockSurface};
    use url::Url;

    fn test_session(
        engine_supported: bool,
    ) -> (
        Arc<PlaybackSession>,
        mpsc::UnboundedReceiver<ControllerSignal>,
        Arc<MockSurface>,
        Arc<MockEngineFactory>,
    ) {
        let surface = Arc::new(MockSurface::new());
        let factory = Arc::new(MockEngineFactory::new(engine_supported));
        let config = ControllerConfig {
            unmute_debounce_ms: 10,
            telemetry_interval_ms: 10,
            ..ControllerConfig::default()
        };
        let (session, signals) =
            PlaybackSession::new(surface.clone(), factory.clone(), config);
        (session, signals, surface, factory)
    }

    fn mp4_source() -> MediaSource {
        MediaSource::new(
            Url::parse("https://example.com/clip.mp4").unwrap(),
            "Clip",
        )
    }

    fn hls_source() -> MediaSource {
        MediaSource::new(
            Url::parse("https://example.com/stream.m3u8").unwrap(),
            "Stream",
        )
    }

    #[tokio::test]
    async fn test_session_starts_idle() {
        let (session, _signals, _surface, _factory) = test_session(true);
        assert_eq!(session.state().await, PlaybackState::Idle);
        assert!(session.current_source().await.is_none());
        assert!(session.strategy_kind().await.is_none());
    }

    #[tokio::test]
    async fn test_seek_clamps_to_timeline() {
        let (session, _signals, surface, _factory) = test_session(true);
        session.load(mp4_source()).await.unwrap();
        surface.set_duration(Some(120.0));

        surface.set_position(3.0);
        session.seek(-10.0).await.unwrap();
        assert_eq!(surface.current_time(), 0.0);

        surface.set_position(115.0);
        session.seek(10.0).await.unwrap();
        assert_eq!(surface.current_time(), 120.0);

        surface.set_position(50.0);
        session.seek(10.0).await.unwrap();
        assert_eq!(surface.current_time(), 60.0);
    }

    #[tokio::test]
    async fn test_actions_require_loaded_media() {
        let (session, _signals, _surface, _factory) = test_session(true);
        assert!(matches!(
            session.seek(10.0).await,
            Err(Error::NothingLoaded)
        ));
        assert!(matches!(
            session.toggle_play_pause().await,
            Err(Error::NothingLoaded)
        ));
    }

    #[tokio::test]
    async fn test_unsupported_format_errors_the_session() {
        let (session, _signals, surface, _factory) = test_session(false);
        surface.set_native_support(crate::types::DeliveryKind::Hls, false);

        let result = session.load(hls_source()).await;
        assert!(matches!(
            result,
            Err(Error::FormatUnsupported { .. })
        ));
        assert_eq!(session.state().await, PlaybackState::Errored);

        // The next successful load clears the error state
        session.load(mp4_source()).await.unwrap();
        assert_eq!(session.state().await, PlaybackState::Loading);
    }

    #[tokio::test]
    async fn test_autoplay_unmute_after_debounce() {
        let (session, _signals, surface, _factory) = test_session(true);
        // DASH attaches natively and leaves the surface muted
        let source = MediaSource::new(
            Url::parse("https://example.com/show.mpd").unwrap(),
            "Show",
        );
        session.load(source).await.unwrap();
        assert!(surface.is_muted());

        surface.set_position(0.5);
        session.on_surface_event(SurfaceEvent::Playing).await;
        // Still muted until the debounce elapses
        assert!(surface.is_muted());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!surface.is_muted());
    }

    #[tokio::test]
    async fn test_unmute_not_scheduled_before_threshold() {
        let (session, _signals, surface, _factory) = test_session(true);
        let source = MediaSource::new(
            Url::parse("https://example.com/show.mpd").unwrap(),
            "Show",
        );
        session.load(source).await.unwrap();

        surface.set_position(0.05);
        session.on_surface_event(SurfaceEvent::Playing).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(surface.is_muted());

        // Once the playhead passes the threshold, a time update schedules it
        surface.set_position(1.0);
        session.on_surface_event(SurfaceEvent::TimeUpdate).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!surface.is_muted());
    }

    #[tokio::test]
    async fn test_teardown_returns_to_idle() {
        let (session, _signals, surface, _factory) = test_session(true);
        session.load(mp4_source()).await.unwrap();
        let _ = session.toggle_stats().await;

        session.teardown().await;

        assert_eq!(session.state().await, PlaybackState::Idle);
        assert!(session.current_source().await.is_none());
        assert!(session.strategy_kind().await.is_none());
        assert!(!session.stats_open().await);
        assert_eq!(surface.source(), None);
    }

    #[tokio::test]
    async fn test_telemetry_poller_toggles() {
        let (session, mut signals, _surface, _factory) = test_session(true);

        assert!(session.toggle_stats().await);
        let snapshot = tokio::time::timeout(Duration::from_millis(200), async {
            loop {
                match signals.recv().await {
                    Some(ControllerSignal::Telemetry { rows }) => break rows,
                    Some(_) => continue,
                    None => panic!("signal channel closed"),
                }
            }
        })
        .await
        .expect("telemetry snapshot not emitted");
        // Rate row is always available on the mock surface
        assert!(!snapshot.is_empty());

        assert!(!session.toggle_stats().await);
        assert!(!session.stats_open().await);
    }

    #[tokio::test]
    async fn test_fullscreen_toggle() {
        let (session, _signals, surface, _factory) = test_session(true);
        session.toggle_fullscreen();
        assert!(surface.is_fullscreen());
        session.toggle_fullscreen();
        assert!(!surface.is_fullscreen());
    }
}
