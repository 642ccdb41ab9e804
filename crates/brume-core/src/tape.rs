//! Control surface of the reverse-mode AD tape.
//!
//! The operation graph and the backward sweep live in the external AD
//! engine. This type models the lifecycle the orchestration layer is
//! responsible for: reset, a single bounded recording scope, input and
//! output registration, and forward-step accounting. Scope-discipline
//! violations are programming errors surfaced as [`TapeError`]; callers
//! abort the run rather than retry.

use std::error::Error;
use std::fmt;

// ── State ──────────────────────────────────────────────────────────

/// Lifecycle state of the tape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapeState {
    /// No recording scope is open. Evaluation is permitted.
    Passive,
    /// A recording scope is open. Registrations and exactly one forward
    /// step are permitted.
    Recording,
}

/// Handle to a registered block of tape slots.
///
/// A binding is only valid for the generation it was issued under; a
/// reset invalidates it. Modules keep their most recent binding so that
/// stale registrations are observable after a recording-kind switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapeBinding {
    /// Tape generation the binding belongs to.
    pub generation: u64,
    /// First slot of the registered block.
    pub base: u64,
    /// Number of registered slots.
    pub len: u64,
}

impl TapeBinding {
    /// Whether the binding was issued under the tape's live generation.
    pub fn is_live(&self, tape: &Tape) -> bool {
        self.generation == tape.generation()
    }
}

// ── Tape ───────────────────────────────────────────────────────────

/// Per-rank recording resource.
///
/// At most one recording scope may be open at a time, and exactly one
/// forward primal step may execute inside it; recording several steps
/// would turn the extracted adjoint into a telescoping sum the
/// extraction logic does not expect.
#[derive(Debug)]
pub struct Tape {
    state: TapeState,
    generation: u64,
    cursor: u64,
    inputs: u64,
    outputs: u64,
    forward_steps: u32,
    recorded: bool,
    evaluations: u64,
}

impl Tape {
    /// A fresh passive tape with nothing recorded.
    pub fn new() -> Self {
        Self {
            state: TapeState::Passive,
            generation: 0,
            cursor: 0,
            inputs: 0,
            outputs: 0,
            forward_steps: 0,
            recorded: false,
            evaluations: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TapeState {
        self.state
    }

    /// Whether a recording scope is open.
    pub fn is_recording(&self) -> bool {
        self.state == TapeState::Recording
    }

    /// Generation counter; bumped by every [`Tape::reset`]. Bindings from
    /// earlier generations are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registered input slots in the live generation.
    pub fn input_count(&self) -> u64 {
        self.inputs
    }

    /// Registered output slots in the live generation.
    pub fn output_count(&self) -> u64 {
        self.outputs
    }

    /// Forward steps taken inside the live recording scope.
    pub fn forward_steps(&self) -> u32 {
        self.forward_steps
    }

    /// Backward sweeps evaluated against the live generation.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Whether the live generation holds a completed recording.
    pub fn has_recording(&self) -> bool {
        self.recorded
    }

    /// Discard the recorded graph and start a new generation.
    ///
    /// Always permitted, even mid-scope; outstanding bindings become
    /// stale.
    pub fn reset(&mut self) {
        self.state = TapeState::Passive;
        self.generation += 1;
        self.cursor = 0;
        self.inputs = 0;
        self.outputs = 0;
        self.forward_steps = 0;
        self.recorded = false;
        self.evaluations = 0;
    }

    /// Open a recording scope.
    ///
    /// # Errors
    ///
    /// [`TapeError::AlreadyRecording`] if a scope is already open.
    pub fn start(&mut self) -> Result<(), TapeError> {
        if self.state == TapeState::Recording {
            return Err(TapeError::AlreadyRecording);
        }
        self.state = TapeState::Recording;
        self.forward_steps = 0;
        Ok(())
    }

    /// Close the open recording scope.
    ///
    /// # Errors
    ///
    /// [`TapeError::NotRecording`] if no scope is open.
    pub fn stop(&mut self) -> Result<(), TapeError> {
        if self.state != TapeState::Recording {
            return Err(TapeError::NotRecording);
        }
        self.state = TapeState::Passive;
        self.recorded = true;
        Ok(())
    }

    /// Register `len` input slots and return their binding.
    ///
    /// # Errors
    ///
    /// [`TapeError::RegistrationOutsideScope`] if no scope is open.
    pub fn register_input(&mut self, len: usize) -> Result<TapeBinding, TapeError> {
        let binding = self.register(len)?;
        self.inputs += binding.len;
        Ok(binding)
    }

    /// Register `len` output slots and return their binding.
    ///
    /// # Errors
    ///
    /// [`TapeError::RegistrationOutsideScope`] if no scope is open.
    pub fn register_output(&mut self, len: usize) -> Result<TapeBinding, TapeError> {
        let binding = self.register(len)?;
        self.outputs += binding.len;
        Ok(binding)
    }

    /// Account for one forward primal step inside the open scope.
    ///
    /// # Errors
    ///
    /// [`TapeError::NotRecording`] if no scope is open;
    /// [`TapeError::MultipleForwardSteps`] on the second step in one scope.
    pub fn note_forward_step(&mut self) -> Result<(), TapeError> {
        if self.state != TapeState::Recording {
            return Err(TapeError::NotRecording);
        }
        if self.forward_steps >= 1 {
            return Err(TapeError::MultipleForwardSteps);
        }
        self.forward_steps += 1;
        Ok(())
    }

    /// Account for one backward sweep over the recorded graph.
    ///
    /// Repeated evaluation of the same generation is normal: steady
    /// adjoints re-seed and re-sweep one tape to a fixed point.
    ///
    /// # Errors
    ///
    /// [`TapeError::EvaluateWhileRecording`] if a scope is still open;
    /// [`TapeError::NothingRecorded`] if the live generation never
    /// completed a recording.
    pub fn evaluate(&mut self) -> Result<(), TapeError> {
        if self.state == TapeState::Recording {
            return Err(TapeError::EvaluateWhileRecording);
        }
        if !self.recorded {
            return Err(TapeError::NothingRecorded);
        }
        self.evaluations += 1;
        Ok(())
    }

    fn register(&mut self, len: usize) -> Result<TapeBinding, TapeError> {
        if self.state != TapeState::Recording {
            return Err(TapeError::RegistrationOutsideScope);
        }
        let base = self.cursor;
        let len = len as u64;
        self.cursor += len;
        Ok(TapeBinding {
            generation: self.generation,
            base,
            len,
        })
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// Tape lifecycle misuse. Fatal: the distributed tape structures are
/// undefined after a violation, so callers abort instead of retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeError {
    /// `start` was called while a recording scope was already open.
    AlreadyRecording,
    /// `stop` or forward-step accounting was called with no open scope.
    NotRecording,
    /// Input/output registration was attempted outside a recording scope.
    RegistrationOutsideScope,
    /// A second forward primal step was taken inside one scope.
    MultipleForwardSteps,
    /// A backward sweep was requested while a scope was still open.
    EvaluateWhileRecording,
    /// A backward sweep was requested but the live generation holds no
    /// completed recording.
    NothingRecorded,
}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRecording => {
                write!(f, "recording scope already open; scopes do not nest")
            }
            Self::NotRecording => write!(f, "no recording scope is open"),
            Self::RegistrationOutsideScope => {
                write!(f, "tape registration outside a recording scope")
            }
            Self::MultipleForwardSteps => {
                write!(f, "second forward step inside one recording scope")
            }
            Self::EvaluateWhileRecording => {
                write!(f, "backward sweep requested while still recording")
            }
            Self::NothingRecorded => {
                write!(f, "backward sweep requested on an empty tape generation")
            }
        }
    }
}

impl Error for TapeError {}
