//! Error types that cross crate boundaries.
//!
//! Subsystem-local errors (tape misuse, storage lookups, configuration)
//! live beside their types; this module holds the failures every layer
//! can observe. Non-convergence is deliberately not an error: it is a
//! flag in the solve report, and the outer loop proceeds with the best
//! available state.

use std::error::Error;
use std::fmt;

use crate::kind::RecordingKind;

/// Failure inside a physics module call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleError {
    /// The residual left the representable range.
    ResidualDiverged {
        /// Name of the failing module.
        module: String,
        /// The offending residual value.
        value: f64,
    },

    /// Module-specific failure with a human-readable reason.
    Failed {
        /// Name of the failing module.
        module: String,
        /// What went wrong.
        reason: String,
    },

    /// The module lacks a capability the controller asked for, such as
    /// adjoint registration on a primal-only module.
    Unsupported {
        /// Name of the module.
        module: String,
        /// The missing capability.
        capability: &'static str,
    },
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResidualDiverged { module, value } => {
                write!(f, "module '{module}' residual diverged to {value}")
            }
            Self::Failed { module, reason } => {
                write!(f, "module '{module}' failed: {reason}")
            }
            Self::Unsupported { module, capability } => {
                write!(f, "module '{module}' does not support {capability}")
            }
        }
    }
}

impl Error for ModuleError {}

/// Failure of a collective operation between ranks.
///
/// Desynchronization is fatal: once ranks disagree on a recording kind
/// or tape transition, the distributed tape structures are undefined and
/// no local recovery exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    /// Ranks presented different tokens to a collective agreement check.
    Desync {
        /// Rank reporting the mismatch.
        rank: usize,
        /// Token this rank presented.
        local: u64,
        /// Differing token observed from a peer.
        remote: u64,
    },

    /// A peer disconnected mid-collective.
    Disconnected {
        /// Rank reporting the loss.
        rank: usize,
    },
}

impl CommError {
    /// Agreement token for a recording transition, combining the kind
    /// and the tape generation so both must match across ranks.
    pub fn recording_token(kind: RecordingKind, tape_generation: u64) -> u64 {
        (tape_generation << 3) | kind.token()
    }
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desync { rank, local, remote } => {
                write!(
                    f,
                    "rank {rank} desynchronized: local token {local:#x}, \
                     peer token {remote:#x}"
                )
            }
            Self::Disconnected { rank } => {
                write!(f, "rank {rank} lost a peer mid-collective")
            }
        }
    }
}

impl Error for CommError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_tokens_separate_kind_and_generation() {
        let a = CommError::recording_token(RecordingKind::SolutionVariables, 1);
        let b = CommError::recording_token(RecordingKind::MeshCoords, 1);
        let c = CommError::recording_token(RecordingKind::SolutionVariables, 2);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_messages_name_the_module() {
        let err = ModuleError::ResidualDiverged {
            module: "flow".to_string(),
            value: f64::NAN,
        };
        let text = err.to_string();
        assert!(text.contains("flow"));
        assert!(text.contains("diverged"));
    }

    #[test]
    fn desync_display_shows_both_tokens() {
        let err = CommError::Desync {
            rank: 2,
            local: 0x9,
            remote: 0xa,
        };
        let text = err.to_string();
        assert!(text.contains("rank 2"));
        assert!(text.contains("0x9"));
        assert!(text.contains("0xa"));
    }
}
