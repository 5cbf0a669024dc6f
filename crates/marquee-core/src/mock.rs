//! Test doubles for the surface and engine seams
//!
//! Used by the crate's own tests and by embedders that want to exercise
//! controller behavior without a real platform.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::{
    engine::{AdaptiveEngine, EngineEvent, EngineFactory},
    error::Result,
    surface::PlaybackSurface,
    types::{
        ActiveRendition, AudioTrackInfo, ConnectionInfo, DeliveryKind, EngineConfig, FrameStats,
        Resolution, TimeRange,
    },
};

#[derive(Default)]
struct SurfaceState {
    source: Option<Url>,
    position: f64,
    duration: Option<f64>,
    volume: f64,
    rate: f64,
    buffered: Vec<TimeRange>,
    video_size: Option<Resolution>,
    viewport_size: Option<Resolution>,
    frame_stats: Option<FrameStats>,
    connection: Option<ConnectionInfo>,
}

/// In-memory playback surface whose properties tests set directly
pub struct MockSurface {
    state: Mutex<SurfaceState>,
    paused: AtomicBool,
    muted: AtomicBool,
    fullscreen: AtomicBool,
    native_hls: AtomicBool,
    native_dash: AtomicBool,
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SurfaceState {
                volume: 1.0,
                rate: 1.0,
                ..SurfaceState::default()
            }),
            paused: AtomicBool::new(true),
            muted: AtomicBool::new(false),
            fullscreen: AtomicBool::new(false),
            native_hls: AtomicBool::new(false),
            native_dash: AtomicBool::new(true),
        }
    }

    pub fn source(&self) -> Option<Url> {
        self.state.lock().unwrap().source.clone()
    }

    /// Move the playhead without it counting as a seek request
    pub fn set_position(&self, position: f64) {
        self.state.lock().unwrap().position = position;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.state.lock().unwrap().duration = duration;
    }

    pub fn set_buffered(&self, ranges: Vec<TimeRange>) {
        self.state.lock().unwrap().buffered = ranges;
    }

    pub fn set_video_size(&self, size: Option<Resolution>) {
        self.state.lock().unwrap().video_size = size;
    }

    pub fn set_viewport_size(&self, size: Option<Resolution>) {
        self.state.lock().unwrap().viewport_size = size;
    }

    pub fn set_frame_stats(&self, stats: Option<FrameStats>) {
        self.state.lock().unwrap().frame_stats = stats;
    }

    pub fn set_connection_info(&self, connection: Option<ConnectionInfo>) {
        self.state.lock().unwrap().connection = connection;
    }

    pub fn set_native_support(&self, kind: DeliveryKind, supported: bool) {
        match kind {
            DeliveryKind::Hls => self.native_hls.store(supported, Ordering::SeqCst),
            DeliveryKind::Dash => self.native_dash.store(supported, Ordering::SeqCst),
            DeliveryKind::Progressive => {}
        }
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSurface for MockSurface {
    fn set_source(&self, url: &Url) {
        self.state.lock().unwrap().source = Some(url.clone());
    }

    fn clear_source(&self) {
        self.state.lock().unwrap().source = None;
        self.paused.store(true, Ordering::SeqCst);
    }

    fn play(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn volume(&self) -> f64 {
        self.state.lock().unwrap().volume
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().position
    }

    fn set_current_time(&self, position: f64) {
        self.state.lock().unwrap().position = position;
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().unwrap().duration
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    fn buffered(&self) -> Vec<TimeRange> {
        self.state.lock().unwrap().buffered.clone()
    }

    fn video_size(&self) -> Option<Resolution> {
        self.state.lock().unwrap().video_size
    }

    fn viewport_size(&self) -> Option<Resolution> {
        self.state.lock().unwrap().viewport_size
    }

    fn frame_stats(&self) -> Option<FrameStats> {
        self.state.lock().unwrap().frame_stats
    }

    fn connection_info(&self) -> Option<ConnectionInfo> {
        self.state.lock().unwrap().connection.clone()
    }

    fn can_play_native(&self, kind: DeliveryKind) -> bool {
        match kind {
            DeliveryKind::Progressive => true,
            DeliveryKind::Hls => self.native_hls.load(Ordering::SeqCst),
            DeliveryKind::Dash => self.native_dash.load(Ordering::SeqCst),
        }
    }

    fn request_fullscreen(&self) {
        self.fullscreen.store(true, Ordering::SeqCst);
    }

    fn exit_fullscreen(&self) {
        self.fullscreen.store(false, Ordering::SeqCst);
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct EngineState {
    loaded: Mutex<Option<Url>>,
    audio_tracks: Mutex<Vec<AudioTrackInfo>>,
    selected_audio_track: Mutex<Option<usize>>,
    active_rendition: Mutex<Option<ActiveRendition>>,
    bandwidth: Mutex<Option<u64>>,
    forward_buffer: Mutex<Option<f64>>,
    events: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
    start_loads: AtomicU32,
    stop_loads: AtomicU32,
    media_recoveries: AtomicU32,
    destroyed: AtomicBool,
}

/// Recording adaptive-engine double. Clones share state so tests can keep
/// a handle after the engine is boxed into a strategy.
#[derive(Clone, Default)]
pub struct MockEngine {
    inner: Arc<EngineState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach_events(&self, events: mpsc::UnboundedSender<EngineEvent>) {
        *self.inner.events.lock().unwrap() = Some(events);
    }

    /// Emit an event as the engine would; dropped receivers are ignored
    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = self.inner.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }

    pub fn set_audio_tracks(&self, tracks: Vec<AudioTrackInfo>) {
        *self.inner.audio_tracks.lock().unwrap() = tracks;
    }

    pub fn selected_audio_track(&self) -> Option<usize> {
        *self.inner.selected_audio_track.lock().unwrap()
    }

    pub fn set_active_rendition(&self, rendition: Option<ActiveRendition>) {
        *self.inner.active_rendition.lock().unwrap() = rendition;
    }

    pub fn set_bandwidth_estimate(&self, estimate: Option<u64>) {
        *self.inner.bandwidth.lock().unwrap() = estimate;
    }

    pub fn set_forward_buffer(&self, seconds: Option<f64>) {
        *self.inner.forward_buffer.lock().unwrap() = seconds;
    }

    pub fn loaded_url(&self) -> Option<Url> {
        self.inner.loaded.lock().unwrap().clone()
    }

    pub fn start_loads(&self) -> u32 {
        self.inner.start_loads.load(Ordering::SeqCst)
    }

    pub fn media_recoveries(&self) -> u32 {
        self.inner.media_recoveries.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdaptiveEngine for MockEngine {
    async fn load_source(&self, url: &Url) -> Result<()> {
        *self.inner.loaded.lock().unwrap() = Some(url.clone());
        Ok(())
    }

    fn start_load(&self) {
        self.inner.start_loads.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_load(&self) {
        self.inner.stop_loads.fetch_add(1, Ordering::SeqCst);
    }

    fn recover_media_error(&self) {
        self.inner.media_recoveries.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        *self.inner.events.lock().unwrap() = None;
    }

    fn audio_tracks(&self) -> Vec<AudioTrackInfo> {
        self.inner.audio_tracks.lock().unwrap().clone()
    }

    fn set_audio_track(&self, index: usize) {
        *self.inner.selected_audio_track.lock().unwrap() = Some(index);
        let mut tracks = self.inner.audio_tracks.lock().unwrap();
        for (i, track) in tracks.iter_mut().enumerate() {
            track.active = i == index;
        }
    }

    fn active_rendition(&self) -> Option<ActiveRendition> {
        self.inner.active_rendition.lock().unwrap().clone()
    }

    fn bandwidth_estimate(&self) -> Option<u64> {
        *self.inner.bandwidth.lock().unwrap()
    }

    fn forward_buffer_length(&self) -> Option<f64> {
        *self.inner.forward_buffer.lock().unwrap()
    }
}

/// Factory double that records every engine it constructs
pub struct MockEngineFactory {
    supported: AtomicBool,
    created: Mutex<Vec<MockEngine>>,
}

impl MockEngineFactory {
    pub fn new(supported: bool) -> Self {
        Self {
            supported: AtomicBool::new(supported),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn engine(&self, index: usize) -> Option<MockEngine> {
        self.created.lock().unwrap().get(index).cloned()
    }

    pub fn last_engine(&self) -> Option<MockEngine> {
        self.created.lock().unwrap().last().cloned()
    }
}

impl EngineFactory for MockEngineFactory {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    fn create(
        &self,
        _config: &EngineConfig,
        _surface: Arc<dyn PlaybackSurface>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Box<dyn AdaptiveEngine>> {
        let engine = MockEngine::new();
        engine.attach_events(events);
        self.created.lock().unwrap().push(engine.clone());
        Ok(Box::new(engine))
    }
}
