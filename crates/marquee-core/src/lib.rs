//! # Marquee Core
//!
//! Adaptive playback controller: resolves media URLs to delivery
//! strategies, drives a platform playback surface through an explicit
//! state machine, and recovers from adaptive-streaming engine errors.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    PlaybackSession                    │
//! │  load / teardown / transport / stats  ──────────────► │
//! │                                      ControllerSignal │
//! ├───────────┬───────────────┬───────────┬───────────────┤
//! │  resolve  │   strategy    │  recovery │   telemetry   │
//! │ (classify)│ (progressive, │  (engine  │  (snapshot    │
//! │           │  engine-hls,  │   errors) │   builder)    │
//! │           │  native)      │           │               │
//! ├───────────┴───────┬───────┴───────────┴───────────────┤
//! │  PlaybackSurface  │  AdaptiveEngine / EngineFactory   │
//! │  (platform media  │  (HLS engine seam, events over    │
//! │   element seam)   │   an unbounded channel)           │
//! └───────────────────┴───────────────────────────────────┘
//! ```
//!
//! The two traits at the bottom are the only platform contact points;
//! everything above them is host-agnostic and tested against the doubles
//! in [`mock`].

pub mod bridge;
pub mod engine;
pub mod error;
pub mod mock;
pub mod recovery;
pub mod resolve;
pub mod session;
pub mod strategy;
pub mod surface;
pub mod telemetry;
pub mod types;

pub use bridge::{ControllerSignal, EventBridge, SurfaceEvent};
pub use engine::{AdaptiveEngine, EngineEvent, EngineFactory};
pub use error::{EngineError, EngineErrorKind, Error, Result, SurfaceErrorKind};
pub use recovery::{RecoveryAction, RecoveryPolicy};
pub use resolve::classify;
pub use session::PlaybackSession;
pub use strategy::{DeliveryStrategy, StrategyKind};
pub use surface::PlaybackSurface;
pub use telemetry::TelemetryRow;
pub use types::{
    ControllerConfig, DeliveryKind, EngineConfig, MediaSource, PlaybackState, SessionId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
