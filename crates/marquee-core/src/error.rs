//! Error types for the Marquee playback controller

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DeliveryKind;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error classes reported by the playback surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceErrorKind {
    /// Fetch was aborted before completion
    Aborted,
    /// The download failed mid-flight
    Network,
    /// The media could not be decoded
    Decode,
    /// The container/codec is not supported by the surface
    SourceUnsupported,
}

impl SurfaceErrorKind {
    /// Fixed human-readable message for this error class
    pub fn message(&self) -> &'static str {
        match self {
            SurfaceErrorKind::Aborted => "Playback was aborted",
            SurfaceErrorKind::Network => "A network error caused the video download to fail",
            SurfaceErrorKind::Decode => "The video could not be decoded",
            SurfaceErrorKind::SourceUnsupported => "The video format is not supported",
        }
    }
}

impl std::fmt::Display for SurfaceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Human-readable message for a surface error, generic when the surface
/// reported no detail.
pub fn surface_error_message(kind: Option<SurfaceErrorKind>) -> &'static str {
    match kind {
        Some(kind) => kind.message(),
        None => "The video could not be loaded",
    }
}

/// Error classes reported by the adaptive-streaming engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineErrorKind {
    /// Manifest/fragment network failure
    Network,
    /// Demux/decode failure
    Media,
    /// Anything else
    Other,
}

/// Error signal from the adaptive-streaming engine.
///
/// Only fatal errors drive recovery; non-fatal errors are self-resolving
/// and absorbed silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub fatal: bool,
    pub detail: Option<String>,
}

impl EngineError {
    pub fn fatal(kind: EngineErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            detail: Some(detail.into()),
        }
    }

    pub fn non_fatal(kind: EngineErrorKind) -> Self {
        Self {
            kind,
            fatal: false,
            detail: None,
        }
    }
}

/// Controller error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("no playback path available for {kind} content")]
    FormatUnsupported { kind: DeliveryKind },

    #[error("invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("no media loaded")]
    NothingLoaded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the caller can retry the operation as-is
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NothingLoaded)
    }

    /// Stable error code for logging and signal payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::FormatUnsupported { .. } => "FORMAT_UNSUPPORTED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::NothingLoaded => "NOTHING_LOADED",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_error_messages() {
        assert_eq!(
            surface_error_message(Some(SurfaceErrorKind::Decode)),
            "The video could not be decoded"
        );
        assert_eq!(surface_error_message(None), "The video could not be loaded");
    }

    #[test]
    fn test_error_codes() {
        let err = Error::FormatUnsupported {
            kind: DeliveryKind::Hls,
        };
        assert_eq!(err.error_code(), "FORMAT_UNSUPPORTED");
        assert!(!err.is_recoverable());
        assert!(Error::NothingLoaded.is_recoverable());
    }
}
