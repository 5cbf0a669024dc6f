//! Core types for the Marquee playback controller

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A media item handed to the controller by the catalog layer.
///
/// Immutable once passed to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// URL of the media (progressive file or HLS/DASH manifest)
    pub url: Url,
    /// Human-readable title
    pub title: String,
}

impl MediaSource {
    pub fn new(url: Url, title: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
        }
    }
}

/// Delivery path a URL classifies into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryKind {
    /// Plain file playback (MP4, WebM, ...)
    Progressive,
    /// HTTP Live Streaming manifest
    Hls,
    /// MPEG-DASH manifest
    Dash,
}

impl std::fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryKind::Progressive => write!(f, "progressive"),
            DeliveryKind::Hls => write!(f, "hls"),
            DeliveryKind::Dash => write!(f, "dash"),
        }
    }
}

/// Playback session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No content loaded
    Idle,
    /// A source is being attached / buffered
    Loading,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// A fatal error occurred; cleared by the next successful load
    Errored,
}

impl PlaybackState {
    /// Check if transition to target state is valid.
    ///
    /// A later `load` always wins, so `Loading` is reachable from every
    /// state, and teardown (`Idle`) is always legal.
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            (_, Loading)
                | (_, Idle)
                | (Loading, Playing)
                | (Loading, Paused)
                | (Loading, Errored)
                | (Playing, Paused)
                | (Playing, Errored)
                | (Paused, Playing)
                | (Paused, Errored)
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Errored => write!(f, "errored"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A contiguous buffered interval on the playback timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position <= self.end
    }
}

/// Frame-quality introspection counters from the playback surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub dropped: u64,
    pub total: u64,
}

impl FrameStats {
    /// Dropped frames as a percentage of total frames (0.0 when no frames)
    pub fn drop_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.dropped as f64 / self.total as f64 * 100.0
        }
    }
}

/// Network introspection, when the platform exposes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Downlink estimate in Mbps
    pub downlink_mbps: f64,
    /// Effective connection type label ("4g", "wifi", ...)
    pub effective_type: String,
}

/// Audio track as reported by the adaptive-streaming engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrackInfo {
    /// Human-readable name
    pub name: String,
    /// BCP-47 language code, if known
    pub language: Option<String>,
    /// Whether this track is currently active
    pub active: bool,
}

/// The rendition the adaptive-streaming engine is currently playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveRendition {
    /// Bandwidth of the rendition in bits per second
    pub bitrate: u64,
    /// Video dimensions
    pub width: u32,
    pub height: u32,
    /// Codec identifiers, if the engine reports them
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

/// Tuning options forwarded to the adaptive-streaming engine.
///
/// The built-in defaults are conservative: worker-thread demuxing on,
/// moderate buffer targets, capped retry counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Demux media in a worker thread
    pub enable_worker: bool,
    /// Forward buffer target in seconds
    pub max_buffer_length: f64,
    /// Back buffer retained behind the playhead in seconds
    pub back_buffer_length: f64,
    /// Retry cap for manifest requests
    pub manifest_retry_limit: u32,
    /// Retry cap for fragment requests
    pub fragment_retry_limit: u32,
    /// Fraction of the bandwidth estimate the engine may commit to (0.0-1.0)
    pub bandwidth_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_worker: true,
            max_buffer_length: 30.0,
            back_buffer_length: 30.0,
            manifest_retry_limit: 4,
            fragment_retry_limit: 6,
            bandwidth_factor: 0.8,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Playhead position that must be reached before scheduling the
    /// autoplay unmute (seconds)
    pub unmute_position_threshold: f64,
    /// Debounce applied to the autoplay unmute (milliseconds)
    pub unmute_debounce_ms: u64,
    /// Telemetry poll interval while the stats view is open (milliseconds)
    pub telemetry_interval_ms: u64,
    /// Adaptive-streaming engine tuning
    pub engine: EngineConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            unmute_position_threshold: 0.1,
            unmute_debounce_ms: 100,
            telemetry_interval_ms: 1000,
            engine: EngineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_transitions() {
        use PlaybackState::*;

        assert!(Idle.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Playing));
        assert!(Loading.can_transition_to(Errored));

        // A later load always wins
        assert!(Playing.can_transition_to(Loading));
        assert!(Errored.can_transition_to(Loading));

        // Teardown is always legal
        assert!(Playing.can_transition_to(Idle));

        // Errored only clears through a new load
        assert!(!Errored.can_transition_to(Playing));
        assert!(!Idle.can_transition_to(Playing));
    }

    #[test]
    fn test_frame_stats_percent() {
        let stats = FrameStats {
            dropped: 5,
            total: 200,
        };
        assert!((stats.drop_percent() - 2.5).abs() < f64::EPSILON);
        assert_eq!(FrameStats::default().drop_percent(), 0.0);
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(5.0, 20.0);
        assert!(range.contains(5.0));
        assert!(range.contains(12.0));
        assert!(range.contains(20.0));
        assert!(!range.contains(20.1));
        assert!(!range.contains(4.9));
    }

    #[test]
    fn test_config_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.unmute_debounce_ms, 100);
        assert_eq!(config.telemetry_interval_ms, 1000);
        assert!(config.engine.enable_worker);
        assert_eq!(config.engine.max_buffer_length, 30.0);
    }
}
