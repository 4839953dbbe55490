//! Error kinds for the enclave supervisor core.
//!
//! See SPEC_FULL.md §7. One hand-rolled enum rather than the C monitor's overloaded sentinel
//! integers (`-1`, `ENCLAVE_ERROR`); the legacy integer ABI is reconstructed at the dispatch
//! surface only (`src/dispatch.rs`), not threaded through internal code.

use core::fmt;

use crate::state::EnclaveState;

/// Everything that can go wrong inside the supervisor core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnclaveError {
    /// The registry could not grow: the backing allocator failed.
    OutOfMemory,
    /// A caller-supplied argument violated a layout or alignment requirement.
    InvalidArgument,
    /// An enclave id did not resolve to a live descriptor (out of range, or a slot that is
    /// currently unoccupied).
    UnknownEnclave,
    /// A call was attempted from a state that does not permit it.
    InvalidState {
        /// The state the call required.
        expected: &'static str,
        /// The state the descriptor was actually in.
        actual: EnclaveState,
    },
    /// The caller's `satp` does not match the enclave's immutable `host_ptbr`.
    NotOwner,
    /// An enclave-originated call's hart-recorded eid did not match the claimed eid.
    AuthenticationFailed,
    /// The calling hart is not actually executing enclave code.
    NotInEnclaveWorld,
    /// The platform failed to install or revoke memory isolation for the enclave.
    PlatformIsolationFailed,
}

impl fmt::Display for EnclaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "enclave registry out of memory"),
            Self::InvalidArgument => write!(f, "invalid enclave creation argument"),
            Self::UnknownEnclave => write!(f, "unknown enclave id"),
            Self::InvalidState { expected, actual } => {
                write!(f, "expected enclave state {expected}, found {actual:?}")
            }
            Self::NotOwner => write!(f, "enclave does not belong to current host process"),
            Self::AuthenticationFailed => write!(f, "enclave authentication failed"),
            Self::NotInEnclaveWorld => write!(f, "hart is not currently in enclave world"),
            Self::PlatformIsolationFailed => write!(f, "platform memory isolation failed"),
        }
    }
}

/// Legacy sentinel returned to the host for any [`EnclaveError`] other than the two
/// dispatch-level non-error outcomes (`ENCLAVE_TIMER_IRQ`, `ENCLAVE_OCALL`). See SPEC_FULL.md §6.
pub const ENCLAVE_ERROR_SENTINEL: u64 = u64::MAX;
