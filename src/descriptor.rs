//! The enclave data model (SPEC_FULL.md §3/§4.5): everything the registry keeps about one
//! enclave instance, grounded on `struct enclave_t` in `original_source/sm/enclave.c`.

use alloc::vec::Vec;

use crate::platform::PhysAddr;
use crate::state::EnclaveState;
use crate::swap::ThreadContext;

/// Stable identifier for a live enclave; the index a [`crate::slab::SlabList`] hands back.
pub type Eid = usize;

/// Physical memory region description (base + size), used both for the enclave's own backing
/// memory and for each private memory area (pma) it has been granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub paddr: PhysAddr,
    pub size: usize,
}

/// Host-memory pointers the supervisor writes through when an enclave makes an OCALL
/// (`ecall_arg0..3` in the creation argument record, SPEC_FULL.md §6). The host allocates these
/// words and reads them back after the ecall returns `ENCLAVE_OCALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcallSlots {
    pub func_id: PhysAddr,
    pub arg0: PhysAddr,
    pub arg1: PhysAddr,
    pub syscall_num: PhysAddr,
}

/// Everything the supervisor tracks about one enclave, from creation to destruction.
pub struct EnclaveDescriptor {
    /// Current lifecycle state.
    pub state: EnclaveState,

    /// `satp` value of the host process that created this enclave; `run`/`resume`/`stop`/
    /// `destroy` all require the caller's live `satp` to match this (SPEC_FULL.md §4.3,
    /// "host-binding" invariant).
    pub host_ptbr: usize,

    /// The enclave's own backing memory, granted exclusively to it for its lifetime.
    pub memory: Region,

    /// Root of the enclave's own Sv39 page table, as a raw `satp` value (`encl_ptbr` in the
    /// original monitor).
    pub encl_ptbr: usize,

    /// Guest-virtual entry point the enclave starts execution at (only meaningful before the
    /// first `run`; after that the live `mepc` in `thread_context`'s snapshot tracks the actual
    /// program counter).
    pub entry_point: usize,

    /// Host-supplied argument buffer (`untrusted_ptr`/`untrusted_size`) the enclave's own
    /// runtime may map and read; the core only stores this pair and hands it to the
    /// (out-of-scope, SPEC_FULL.md §1) page-table builder, it never dereferences it itself.
    pub untrusted: Region,

    /// Host-visible buffer the enclave and host exchange OCALL arguments through.
    pub kbuffer: Region,

    /// Host-memory pointers the supervisor writes an OCALL descriptor through (SPEC_FULL.md §3,
    /// "OCALL slots").
    pub ocall_slots: OcallSlots,

    /// Additional private memory areas granted to the enclave after creation (SPEC_FULL.md's
    /// "enclave may request additional memory" extension point).
    pub pma_list: Vec<Region>,

    /// Saved privileged register state while the enclave is not the one executing
    /// (`Stopped`/`Ocalling`), or the last snapshot taken on the most recent world switch.
    pub thread_context: ThreadContext,

    /// Eid of the enclave that called into this one via inter-enclave call, if any.
    pub caller_eid: Option<Eid>,
    /// Eid at the root of the current inter-enclave call chain.
    pub top_caller_eid: Option<Eid>,
    /// Eid this enclave most recently called into, if it is currently waiting on a nested call.
    pub cur_callee_eid: Option<Eid>,
}

/// Caller-supplied parameters for creating a new enclave (`create_param_t` in the original
/// monitor), validated and copied into a fresh [`EnclaveDescriptor`] by `dispatch::create`.
pub struct CreateParams {
    pub host_ptbr: usize,
    pub memory: Region,
    pub encl_ptbr: usize,
    pub entry_point: usize,
    /// Start of the free-page pool within `memory` (SPEC_FULL.md §4.7 layout); validated by
    /// `dispatch::create` and not retained on the descriptor afterward — carving the actual LIFO
    /// free-page pool is the out-of-scope page-table builder's job (§1).
    pub free_mem: PhysAddr,
    pub untrusted: Region,
    pub kbuffer: Region,
    pub ocall_slots: OcallSlots,
    /// Host-memory word `dispatch::create` writes the freshly assigned eid into on success
    /// (`eid_ptr` in SPEC_FULL.md §6's creation argument record).
    pub eid_ptr: PhysAddr,
}

impl EnclaveDescriptor {
    /// Build a fresh descriptor in state [`EnclaveState::Fresh`] from validated creation
    /// parameters. Does not itself touch platform memory; `dispatch::create` is responsible for
    /// granting isolation before constructing this.
    pub fn new(params: CreateParams) -> Self {
        Self {
            state: EnclaveState::Fresh,
            host_ptbr: params.host_ptbr,
            memory: params.memory,
            encl_ptbr: params.encl_ptbr,
            entry_point: params.entry_point,
            untrusted: params.untrusted,
            kbuffer: params.kbuffer,
            ocall_slots: params.ocall_slots,
            pma_list: Vec::new(),
            thread_context: ThreadContext::fresh(params.encl_ptbr, params.entry_point),
            caller_eid: None,
            top_caller_eid: None,
            cur_callee_eid: None,
        }
    }

    /// `true` if `candidate_ptbr` (the caller's live `satp`) is the process that owns this
    /// enclave.
    pub fn is_owned_by(&self, candidate_ptbr: usize) -> bool {
        self.host_ptbr == candidate_ptbr
    }
}
