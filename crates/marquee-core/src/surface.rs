//! Playback surface abstraction
//!
//! The surface is the platform-provided media-rendering element the
//! controller attaches sources to and reads playback state from. The
//! embedding layer implements this trait over whatever the platform
//! offers; the controller only ever talks to the trait.

use url::Url;

use crate::types::{ConnectionInfo, DeliveryKind, FrameStats, Resolution, TimeRange};

/// Platform media element the controller drives.
///
/// All methods are synchronous property reads/writes; anything that takes
/// time on the platform (loading, seeking) completes via [`SurfaceEvent`]s
/// fed back into the session.
///
/// [`SurfaceEvent`]: crate::bridge::SurfaceEvent
pub trait PlaybackSurface: Send + Sync {
    /// Point the surface at a source URL and begin loading it
    fn set_source(&self, url: &Url);

    /// Detach the current source
    fn clear_source(&self);

    fn play(&self);
    fn pause(&self);
    fn is_paused(&self) -> bool;

    fn set_muted(&self, muted: bool);
    fn is_muted(&self) -> bool;

    /// Current volume in `[0.0, 1.0]`
    fn volume(&self) -> f64;

    /// Current playhead position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, position: f64);

    /// Media duration in seconds, when known
    fn duration(&self) -> Option<f64>;

    fn playback_rate(&self) -> f64;

    /// Buffered intervals, in timeline order
    fn buffered(&self) -> Vec<TimeRange>;

    /// Intrinsic video dimensions, once known
    fn video_size(&self) -> Option<Resolution>;

    /// Rendered viewport dimensions
    fn viewport_size(&self) -> Option<Resolution>;

    /// Frame-quality counters, when the platform supports introspection
    fn frame_stats(&self) -> Option<FrameStats>;

    /// Network introspection, when the platform exposes it
    fn connection_info(&self) -> Option<ConnectionInfo>;

    /// Whether the surface can play the given format natively
    fn can_play_native(&self, kind: DeliveryKind) -> bool;

    fn request_fullscreen(&self);
    fn exit_fullscreen(&self);
    fn is_fullscreen(&self) -> bool;
}
