//! C3: per-hart world state (SPEC_FULL.md §4.3), grounded on `struct cpu_state_t cpus[MAX_HARTS]`
//! and `enter_enclave_world`/`exit_enclave_world`/`check_in_enclave_world`/
//! `check_enclave_authentication` in `original_source/sm/enclave.c`.

use crate::config::MAX_HARTS;
use crate::descriptor::Eid;
use crate::error::EnclaveError;
use crate::swap::ThreadContext;

/// Which enclave (if any) a single hart is currently executing, plus the host's own privileged
/// state while that's true. `host_ctx` is only ever meaningful between an `enter` and the
/// matching `exit`; a host-world hart's `host_ctx` is stale leftover data nobody reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HartState {
    current_eid: Option<Eid>,
    host_ctx: ThreadContext,
}

impl HartState {
    const fn host() -> Self {
        Self { current_eid: None, host_ctx: ThreadContext::zeroed() }
    }

    /// `true` if this hart is currently executing enclave code.
    pub fn in_enclave_world(&self) -> bool {
        self.current_eid.is_some()
    }
}

/// Fixed-size table of per-hart state, indexed by hart id. Mirrors the original monitor's flat
/// `cpus[MAX_HARTS]` array; cross-hart access is forbidden by construction (SPEC_FULL.md §4.3) —
/// every accessor below takes `&mut self` scoped to one hart id, never a reference another hart
/// could alias.
pub struct HartTable {
    harts: [HartState; MAX_HARTS],
}

impl HartTable {
    /// Every hart starts in the host world.
    pub fn new() -> Self {
        Self { harts: [HartState::host(); MAX_HARTS] }
    }

    fn slot(&mut self, hart_id: usize) -> Result<&mut HartState, EnclaveError> {
        self.harts.get_mut(hart_id).ok_or(EnclaveError::InvalidArgument)
    }

    /// Mark `hart_id` as now executing `eid`. Mirrors `enter_enclave_world`.
    pub fn enter(&mut self, hart_id: usize, eid: Eid) -> Result<(), EnclaveError> {
        self.slot(hart_id)?.current_eid = Some(eid);
        Ok(())
    }

    /// Mark `hart_id` as back in the host world. Mirrors `exit_enclave_world`.
    pub fn exit(&mut self, hart_id: usize) -> Result<(), EnclaveError> {
        self.slot(hart_id)?.current_eid = None;
        Ok(())
    }

    /// Mutable access to `hart_id`'s saved host-world privileged state, used by the swap engine
    /// around an enter/leave pair.
    pub fn host_ctx_mut(&mut self, hart_id: usize) -> Result<&mut ThreadContext, EnclaveError> {
        Ok(&mut self.slot(hart_id)?.host_ctx)
    }

    /// Require that `hart_id` is currently executing *some* enclave, returning which. Mirrors
    /// `check_in_enclave_world`.
    pub fn check_in_enclave_world(&self, hart_id: usize) -> Result<Eid, EnclaveError> {
        self.harts
            .get(hart_id)
            .ok_or(EnclaveError::InvalidArgument)?
            .current_eid
            .ok_or(EnclaveError::NotInEnclaveWorld)
    }

    /// Require that `hart_id` is currently executing exactly `claimed_eid`. An OCALL/exit/
    /// timer event arrives claiming to originate from `claimed_eid`; if the hart's own bookkeeping
    /// disagrees, that claim is a forgery and the call is rejected outright. Mirrors
    /// `check_enclave_authentication`.
    pub fn check_enclave_authentication(
        &self,
        hart_id: usize,
        claimed_eid: Eid,
    ) -> Result<(), EnclaveError> {
        let actual = self.check_in_enclave_world(hart_id)?;
        if actual == claimed_eid {
            Ok(())
        } else {
            Err(EnclaveError::AuthenticationFailed)
        }
    }
}

impl Default for HartTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_is_all_host() {
        let table = HartTable::new();
        assert!(table.check_in_enclave_world(0).is_err());
    }

    #[test]
    fn enter_then_check_succeeds() {
        let mut table = HartTable::new();
        table.enter(0, 42).unwrap();
        assert_eq!(table.check_in_enclave_world(0).unwrap(), 42);
        assert!(table.check_enclave_authentication(0, 42).is_ok());
        assert!(table.check_enclave_authentication(0, 7).is_err());
    }

    #[test]
    fn exit_returns_hart_to_host() {
        let mut table = HartTable::new();
        table.enter(1, 5).unwrap();
        table.exit(1).unwrap();
        assert!(table.check_in_enclave_world(1).is_err());
    }

    #[test]
    fn out_of_range_hart_is_invalid_argument() {
        let mut table = HartTable::new();
        assert_eq!(table.enter(MAX_HARTS + 1, 0), Err(EnclaveError::InvalidArgument));
    }
}
