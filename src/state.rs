//! The enclave state machine (SPEC_FULL.md §4.5).
//!
//! `INVALID` from the original C monitor's `enum enclave_state` is not given a variant here: an
//! eid whose slot holds no descriptor at all *is* the invalid state, so absence from the registry
//! (`Option::None`/`Err(EnclaveError::UnknownEnclave)`) already covers it. Every variant below is
//! therefore a state some live descriptor can actually be in.

use crate::error::EnclaveError;

/// Lifecycle state of a live enclave descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnclaveState {
    /// Created but never run.
    Fresh,
    /// Eligible to run (after `resume_from_stop`, or after a timer preemption).
    Runnable,
    /// Currently executing on some hart.
    Running,
    /// Host asked the enclave to pause; its context is parked, waiting for `resume_from_stop`.
    Stopped,
    /// Enclave issued an OCALL; waiting on the host to service it and call `resume_from_ocall`.
    Ocalling,
    /// Torn down; the slot is about to be (or has been) returned to the registry.
    Destroyed,
}

impl EnclaveState {
    /// Transition to `Running`, the very first entry into a newly created enclave. Allowed only
    /// from `Fresh`; every later re-entry goes through [`EnclaveState::resume`] or
    /// [`EnclaveState::resume_from_ocall`] instead.
    pub fn run(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Fresh => Ok(Self::Running),
            actual => Err(EnclaveError::InvalidState { expected: "Fresh", actual }),
        }
    }

    /// Transition to `Running` from `Runnable` — the ordinary resume path, reached after
    /// `resume_from_stop` or a timer preemption. Mirrors `resume_enclave`'s `RUNNABLE` case.
    pub fn resume(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Runnable => Ok(Self::Running),
            actual => Err(EnclaveError::InvalidState { expected: "Runnable", actual }),
        }
    }

    /// Transition to `Stopped`. Host-initiated, and — mirroring the original monitor's blanket
    /// `state > FRESH` guard in `stop_enclave` — allowed from any state in which the enclave has
    /// actually been created and not yet torn down: `Runnable`, `Running`, or `Ocalling`.
    pub fn stop(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Runnable | Self::Running | Self::Ocalling => Ok(Self::Stopped),
            actual => {
                Err(EnclaveError::InvalidState { expected: "Runnable, Running, or Ocalling", actual })
            }
        }
    }

    /// Transition back to `Runnable` from `Stopped`.
    pub fn resume_from_stop(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Stopped => Ok(Self::Runnable),
            actual => Err(EnclaveError::InvalidState { expected: "Stopped", actual }),
        }
    }

    /// Transition to `Ocalling`, allowed only from `Running`.
    pub fn ocall(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Running => Ok(Self::Ocalling),
            actual => Err(EnclaveError::InvalidState { expected: "Running", actual }),
        }
    }

    /// Transition directly back to `Running` from `Ocalling`, once the host has serviced the
    /// OCALL. Unlike the plain stop/resume path, this skips the `Runnable` intermediate state:
    /// `resume_from_ocall` itself performs the context swap-in, matching the table's
    /// "OCALLING → RUNNING" row rather than routing through a separate resume call.
    pub fn resume_from_ocall(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Ocalling => Ok(Self::Running),
            actual => Err(EnclaveError::InvalidState { expected: "Ocalling", actual }),
        }
    }

    /// A timer interrupt arrived while this enclave was `Running`; it becomes `Runnable` again
    /// so the next `resume` call restarts it, mirroring `do_timer_irq`'s unconditional
    /// `state = ENCLAVE_RUNNABLE` in the original monitor.
    pub fn preempt(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Running => Ok(Self::Runnable),
            actual => Err(EnclaveError::InvalidState { expected: "Running", actual }),
        }
    }

    /// Transition to `Destroyed`. Only reachable from `Running`: `exit` is enclave-initiated, so
    /// by the time it fires the calling hart has already been authenticated as the one actively
    /// executing this enclave (`hart::check_enclave_authentication`), which by invariant 5 means
    /// the descriptor's own state is `Running`.
    pub fn destroy(self) -> Result<Self, EnclaveError> {
        match self {
            Self::Running => Ok(Self::Destroyed),
            actual => Err(EnclaveError::InvalidState { expected: "Running", actual }),
        }
    }
}
