//! Event bridge
//!
//! Translates raw playback-surface events into a small closed set of
//! controller signals consumed by the embedding layer. Engine events take
//! a separate path through the session; nothing here assumes an ordering
//! between the two.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{
    error::{surface_error_message, SurfaceErrorKind},
    surface::PlaybackSurface,
    telemetry::TelemetryRow,
    types::{PlaybackState, TimeRange},
};

/// Raw events from the playback surface. Payloads are read back from the
/// surface at translation time, the way platform event handlers do.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Playback stalled waiting for data
    Waiting,
    /// Enough data buffered to resume
    CanPlay,
    /// A play request was accepted
    Play,
    /// Playback genuinely started or resumed
    Playing,
    Pause,
    Ended,
    /// Playhead advanced
    TimeUpdate,
    /// Buffered ranges changed
    Progress,
    VolumeChange,
    FullscreenChange,
    /// Surface-level playback error
    Error { kind: Option<SurfaceErrorKind> },
}

/// Signals exposed to collaborators (UI glue, catalog layer)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ControllerSignal {
    /// Show/hide the loading indicator
    Loading(bool),
    PlayState { playing: bool },
    Time { position: f64, duration: Option<f64> },
    /// Fraction of the duration covered by the furthest buffered interval
    Buffered { fraction: f64 },
    Volume { muted: bool, volume: f64 },
    Fullscreen { active: bool },
    ErrorDisplay { message: String },
    ErrorCleared,
    StateChanged(PlaybackState),
    Telemetry { rows: Vec<TelemetryRow> },
}

/// Buffered fraction for the scrubber: end of the furthest contiguous
/// buffered interval containing or following `position`, over `duration`.
pub fn buffered_fraction(ranges: &[TimeRange], position: f64, duration: f64) -> Option<f64> {
    if duration <= 0.0 {
        return None;
    }
    ranges
        .iter()
        .filter(|range| range.end >= position)
        .map(|range| range.end)
        .fold(None, |best: Option<f64>, end| {
            Some(best.map_or(end, |b| b.max(end)))
        })
        .map(|end| (end / duration).clamp(0.0, 1.0))
}

/// Translates surface events into controller signals.
///
/// Drag ownership: while the user drags the scrubber or the volume slider,
/// the drag owns the displayed value and the corresponding sync signals
/// are suppressed until release.
pub struct EventBridge {
    signal_tx: mpsc::UnboundedSender<ControllerSignal>,
    scrub_drag: AtomicBool,
    volume_drag: AtomicBool,
}

impl EventBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ControllerSignal>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        (
            Self {
                signal_tx,
                scrub_drag: AtomicBool::new(false),
                volume_drag: AtomicBool::new(false),
            },
            signal_rx,
        )
    }

    /// Emit a signal; receivers that went away are not an error
    pub fn emit(&self, signal: ControllerSignal) {
        trace!(?signal, "Controller signal");
        let _ = self.signal_tx.send(signal);
    }

    pub fn begin_scrub(&self) {
        self.scrub_drag.store(true, Ordering::SeqCst);
    }

    pub fn end_scrub(&self) {
        self.scrub_drag.store(false, Ordering::SeqCst);
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub_drag.load(Ordering::SeqCst)
    }

    pub fn begin_volume_drag(&self) {
        self.volume_drag.store(true, Ordering::SeqCst);
    }

    pub fn end_volume_drag(&self) {
        self.volume_drag.store(false, Ordering::SeqCst);
    }

    /// Translate one surface event, reading current values off the surface
    pub fn handle(&self, event: &SurfaceEvent, surface: &dyn PlaybackSurface) {
        match event {
            SurfaceEvent::Waiting => self.emit(ControllerSignal::Loading(true)),
            SurfaceEvent::CanPlay => self.emit(ControllerSignal::Loading(false)),
            SurfaceEvent::Play | SurfaceEvent::Playing => {
                if *event == SurfaceEvent::Playing {
                    self.emit(ControllerSignal::Loading(false));
                }
                self.emit(ControllerSignal::PlayState { playing: true });
            }
            SurfaceEvent::Pause | SurfaceEvent::Ended => {
                self.emit(ControllerSignal::PlayState { playing: false });
            }
            SurfaceEvent::TimeUpdate => {
                // The drag owns the displayed position until released
                if !self.scrub_drag.load(Ordering::SeqCst) {
                    self.emit(ControllerSignal::Time {
                        position: surface.current_time(),
                        duration: surface.duration(),
                    });
                }
            }
            SurfaceEvent::Progress => {
                if let Some(duration) = surface.duration() {
                    if let Some(fraction) =
                        buffered_fraction(&surface.buffered(), surface.current_time(), duration)
                    {
                        self.emit(ControllerSignal::Buffered { fraction });
                    }
                }
            }
            SurfaceEvent::VolumeChange => {
                if !self.volume_drag.load(Ordering::SeqCst) {
                    self.emit(ControllerSignal::Volume {
                        muted: surface.is_muted(),
                        volume: surface.volume(),
                    });
                }
            }
            SurfaceEvent::FullscreenChange => self.emit(ControllerSignal::Fullscreen {
                active: surface.is_fullscreen(),
            }),
            SurfaceEvent::Error { kind } => {
                self.emit(ControllerSignal::Loading(false));
                self.emit(ControllerSignal::ErrorDisplay {
                    message: surface_error_message(*kind).to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSurface;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ControllerSignal>) -> Vec<ControllerSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        signals
    }

    #[test]
    fn test_buffered_fraction_uses_furthest_interval() {
        let ranges = vec![TimeRange::new(0.0, 30.0), TimeRange::new(40.0, 80.0)];
        // Interval following the position counts too
        assert_eq!(buffered_fraction(&ranges, 10.0, 100.0), Some(0.8));
        // Intervals entirely behind the position do not
        assert_eq!(
            buffered_fraction(&[TimeRange::new(0.0, 5.0)], 10.0, 100.0),
            None
        );
        assert_eq!(buffered_fraction(&ranges, 10.0, 0.0), None);
    }

    #[test]
    fn test_waiting_and_canplay_drive_loading_indicator() {
        let (bridge, mut rx) = EventBridge::new();
        let surface = MockSurface::new();

        bridge.handle(&SurfaceEvent::Waiting, &surface);
        bridge.handle(&SurfaceEvent::CanPlay, &surface);

        assert_eq!(
            drain(&mut rx),
            vec![
                ControllerSignal::Loading(true),
                ControllerSignal::Loading(false)
            ]
        );
    }

    #[test]
    fn test_time_update_suppressed_while_scrubbing() {
        let (bridge, mut rx) = EventBridge::new();
        let surface = MockSurface::new();
        surface.set_position(12.0);
        surface.set_duration(Some(120.0));

        bridge.begin_scrub();
        bridge.handle(&SurfaceEvent::TimeUpdate, &surface);
        assert!(drain(&mut rx).is_empty());

        bridge.end_scrub();
        bridge.handle(&SurfaceEvent::TimeUpdate, &surface);
        assert_eq!(
            drain(&mut rx),
            vec![ControllerSignal::Time {
                position: 12.0,
                duration: Some(120.0)
            }]
        );
    }

    #[test]
    fn test_volume_sync_suppressed_while_dragging() {
        let (bridge, mut rx) = EventBridge::new();
        let surface = MockSurface::new();

        bridge.begin_volume_drag();
        bridge.handle(&SurfaceEvent::VolumeChange, &surface);
        assert!(drain(&mut rx).is_empty());

        bridge.end_volume_drag();
        bridge.handle(&SurfaceEvent::VolumeChange, &surface);
        let signals = drain(&mut rx);
        assert!(matches!(signals[0], ControllerSignal::Volume { .. }));
    }

    #[test]
    fn test_error_maps_to_fixed_message() {
        let (bridge, mut rx) = EventBridge::new();
        let surface = MockSurface::new();

        bridge.handle(
            &SurfaceEvent::Error {
                kind: Some(SurfaceErrorKind::Network),
            },
            &surface,
        );
        let signals = drain(&mut rx);
        assert_eq!(signals[0], ControllerSignal::Loading(false));
        assert_eq!(
            signals[1],
            ControllerSignal::ErrorDisplay {
                message: "A network error caused the video download to fail".to_string()
            }
        );

        bridge.handle(&SurfaceEvent::Error { kind: None }, &surface);
        let signals = drain(&mut rx);
        assert_eq!(
            signals[1],
            ControllerSignal::ErrorDisplay {
                message: "The video could not be loaded".to_string()
            }
        );
    }

    #[test]
    fn test_progress_emits_buffered_fraction() {
        let (bridge, mut rx) = EventBridge::new();
        let surface = MockSurface::new();
        surface.set_position(10.0);
        surface.set_duration(Some(100.0));
        surface.set_buffered(vec![TimeRange::new(0.0, 30.0), TimeRange::new(40.0, 80.0)]);

        bridge.handle(&SurfaceEvent::Progress, &surface);
        assert_eq!(
            drain(&mut rx),
            vec![ControllerSignal::Buffered { fraction: 0.8 }]
        );
    }
}
