//! Recovery policy for adaptive-engine errors
//!
//! Fatal network errors get one load restart per occurrence (the engine's
//! internal retry counters handle the rest), fatal media errors get one
//! recovery-procedure invocation per occurrence, anything else fatal is
//! terminal. Non-fatal errors are absorbed silently.

use tracing::{debug, warn};

use crate::error::{EngineError, EngineErrorKind};

/// Corrective action the session must take for an engine error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Restart the load pipeline for the current manifest
    RestartLoad,
    /// Invoke the engine's media-error-recovery procedure
    RecoverMedia,
    /// Terminal: surface to the user, no further automatic action
    Fatal(String),
    /// Non-fatal, self-resolving
    Ignore,
}

/// Per-load error state machine. Reset completely on every new load.
#[derive(Debug, Default)]
pub struct RecoveryPolicy {
    network_restarts: u32,
    media_recoveries: u32,
}

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the corrective action for an engine error. Exactly one
    /// action is issued per fatal error occurrence.
    pub fn on_engine_error(&mut self, error: &EngineError) -> RecoveryAction {
        if !error.fatal {
            debug!(kind = ?error.kind, "Non-fatal engine error absorbed");
            return RecoveryAction::Ignore;
        }

        match error.kind {
            EngineErrorKind::Network => {
                self.network_restarts += 1;
                warn!(
                    restarts = self.network_restarts,
                    detail = error.detail.as_deref().unwrap_or("unknown"),
                    "Fatal network error, restarting load"
                );
                RecoveryAction::RestartLoad
            }
            EngineErrorKind::Media => {
                self.media_recoveries += 1;
                warn!(
                    recoveries = self.media_recoveries,
                    detail = error.detail.as_deref().unwrap_or("unknown"),
                    "Fatal media error, invoking recovery procedure"
                );
                RecoveryAction::RecoverMedia
            }
            EngineErrorKind::Other => {
                let detail = error.detail.clone().unwrap_or_else(|| "unknown".to_string());
                warn!(detail = %detail, "Unrecoverable engine error");
                RecoveryAction::Fatal(detail)
            }
        }
    }

    /// Forget all per-load error history
    pub fn reset(&mut self) {
        self.network_restarts = 0;
        self.media_recoveries = 0;
    }

    pub fn network_restarts(&self) -> u32 {
        self.network_restarts
    }

    pub fn media_recoveries(&self) -> u32 {
        self.media_recoveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_fatal_ignored() {
        let mut policy = RecoveryPolicy::new();
        let action = policy.on_engine_error(&EngineError::non_fatal(EngineErrorKind::Network));
        assert_eq!(action, RecoveryAction::Ignore);
        assert_eq!(policy.network_restarts(), 0);
    }

    #[test]
    fn test_network_fatal_one_restart_per_occurrence() {
        let mut policy = RecoveryPolicy::new();
        let error = EngineError::fatal(EngineErrorKind::Network, "manifest timeout");

        assert_eq!(policy.on_engine_error(&error), RecoveryAction::RestartLoad);
        assert_eq!(policy.network_restarts(), 1);

        // Each occurrence gets exactly one corrective action
        assert_eq!(policy.on_engine_error(&error), RecoveryAction::RestartLoad);
        assert_eq!(policy.network_restarts(), 2);
    }

    #[test]
    fn test_media_fatal_invokes_recovery() {
        let mut policy = RecoveryPolicy::new();
        let error = EngineError::fatal(EngineErrorKind::Media, "decode stall");
        assert_eq!(policy.on_engine_error(&error), RecoveryAction::RecoverMedia);
        assert_eq!(policy.media_recoveries(), 1);
    }

    #[test]
    fn test_other_fatal_is_terminal() {
        let mut policy = RecoveryPolicy::new();

        let with_detail = EngineError::fatal(EngineErrorKind::Other, "key system failure");
        assert_eq!(
            policy.on_engine_error(&with_detail),
            RecoveryAction::Fatal("key system failure".to_string())
        );

        let without_detail = EngineError {
            kind: EngineErrorKind::Other,
            fatal: true,
            detail: None,
        };
        assert_eq!(
            policy.on_engine_error(&without_detail),
            RecoveryAction::Fatal("unknown".to_string())
        );
    }

    #[test]
    fn test_reset_clears_history() {
        let mut policy = RecoveryPolicy::new();
        policy.on_engine_error(&EngineError::fatal(EngineErrorKind::Network, "x"));
        policy.on_engine_error(&EngineError::fatal(EngineErrorKind::Media, "y"));

        policy.reset();
        assert_eq!(policy.network_restarts(), 0);
        assert_eq!(policy.media_recoveries(), 0);
    }
}
