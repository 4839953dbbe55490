//! C2: the enclave registry (SPEC_FULL.md §4.2), grounded on `alloc_enclave`/`free_enclave`/
//! `get_enclave`/`__get_real_enclave` in `original_source/sm/enclave.c`. A thin, spec-aware
//! wrapper around a [`SlabList`] of [`EnclaveDescriptor`]s: this is the only place that knows
//! eids map onto slab slots, and the only place allowed to call [`SlabList::alloc`]/
//! [`SlabList::free`] directly.

use crate::descriptor::{Eid, EnclaveDescriptor};
use crate::error::EnclaveError;
use crate::slab::SlabList;

/// Owns every live [`EnclaveDescriptor`].
pub struct EnclaveRegistry {
    slabs: SlabList<EnclaveDescriptor>,
}

impl EnclaveRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { slabs: SlabList::new() }
    }

    /// Insert `descriptor`, returning its freshly assigned eid. Mirrors `alloc_enclave`.
    pub fn alloc(&mut self, descriptor: EnclaveDescriptor) -> Result<Eid, EnclaveError> {
        self.slabs.alloc(descriptor)
    }

    /// Remove and return the descriptor at `eid`. Mirrors `free_enclave`.
    pub fn free(&mut self, eid: Eid) -> Option<EnclaveDescriptor> {
        self.slabs.free(eid)
    }

    /// Look up `eid`, failing with [`EnclaveError::UnknownEnclave`] instead of `None` since
    /// every call site needs that error variant anyway. Mirrors `get_enclave`.
    pub fn get(&self, eid: Eid) -> Result<&EnclaveDescriptor, EnclaveError> {
        self.slabs.get(eid).ok_or(EnclaveError::UnknownEnclave)
    }

    /// Mutable counterpart of [`EnclaveRegistry::get`].
    pub fn get_mut(&mut self, eid: Eid) -> Result<&mut EnclaveDescriptor, EnclaveError> {
        self.slabs.get_mut(eid).ok_or(EnclaveError::UnknownEnclave)
    }

    /// Resolve `eid` to the descriptor that is actually executing, following `cur_callee_eid`
    /// links to the deepest enclave in an inter-enclave call chain. Mirrors
    /// `__get_real_enclave`: if enclave A called into enclave B, a stop/resume/timer event
    /// addressed to A's eid actually needs to act on B.
    pub fn get_real(&self, eid: Eid) -> Result<&EnclaveDescriptor, EnclaveError> {
        let mut current = self.get(eid)?;
        while let Some(callee) = current.cur_callee_eid {
            current = self.get(callee)?;
        }
        Ok(current)
    }

    /// Number of live enclaves.
    pub fn len(&self) -> usize {
        self.slabs.len()
    }

    /// `true` if no enclave is currently registered.
    pub fn is_empty(&self) -> bool {
        self.slabs.is_empty()
    }
}

impl Default for EnclaveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CreateParams, OcallSlots, Region};

    fn sample_params() -> CreateParams {
        CreateParams {
            host_ptbr: 0x1000,
            memory: Region { paddr: 0, size: 0x1000 },
            encl_ptbr: 0x2000,
            entry_point: 0x1000,
            free_mem: 0x800,
            untrusted: Region { paddr: 0x4000, size: 0x800 },
            kbuffer: Region { paddr: 0x1000, size: 0x1000 },
            ocall_slots: OcallSlots { func_id: 0x3000, arg0: 0x3008, arg1: 0x3010, syscall_num: 0x3018 },
            eid_ptr: 0x5000,
        }
    }

    #[test]
    fn alloc_then_get_round_trips() {
        let mut reg = EnclaveRegistry::new();
        let eid = reg.alloc(EnclaveDescriptor::new(sample_params())).unwrap();
        assert_eq!(reg.get(eid).unwrap().host_ptbr, 0x1000);
    }

    #[test]
    fn free_then_get_is_unknown_enclave() {
        let mut reg = EnclaveRegistry::new();
        let eid = reg.alloc(EnclaveDescriptor::new(sample_params())).unwrap();
        assert!(reg.free(eid).is_some());
        assert_eq!(reg.get(eid).unwrap_err(), EnclaveError::UnknownEnclave);
    }

    #[test]
    fn get_real_follows_callee_chain() {
        let mut reg = EnclaveRegistry::new();
        let a = reg.alloc(EnclaveDescriptor::new(sample_params())).unwrap();
        let b = reg.alloc(EnclaveDescriptor::new(sample_params())).unwrap();
        reg.get_mut(a).unwrap().cur_callee_eid = Some(b);
        assert_eq!(reg.get_real(a).unwrap().host_ptbr, reg.get(b).unwrap().host_ptbr);
    }
}
