//! Compile-time layout and sizing constants.
//!
//! Mirrors the teacher's `memmap::constant` module: platform layout knobs live here so the
//! logic modules never hard-code a magic number.

/// Size of a page, in bytes.
pub const PAGE_SIZE: usize = 4096;
/// `log2(PAGE_SIZE)`, used to build an satp-encoded PPN from a physical address.
pub const PAGE_SHIFT: u32 = 12;

/// Number of `EnclaveDescriptor` slots carved into a single slab node.
///
/// Mirrors the C monitor's `ENCLAVE_METADATA_REGION_SIZE / sizeof(struct enclave_t)`; picked
/// small here so registry-growth tests (SPEC_FULL.md §8 scenario 6) don't need to allocate
/// thousands of descriptors to exercise a second node.
pub const SLAB_NODE_CAPACITY: usize = 8;

/// Maximum number of physical harts this supervisor will track per-hart state for.
pub const MAX_HARTS: usize = 8;

/// Default guest-virtual base of the enclave's text segment.
pub const ENCLAVE_DEFAULT_TEXT_BASE: usize = 0x1000;
/// Default guest-virtual base of the enclave's stack (stack grows down from here).
pub const ENCLAVE_DEFAULT_STACK_BASE: usize = 0x8000_0000;
/// Default stack pointer value an enclave starts execution with.
pub const ENCLAVE_DEFAULT_STACK: usize = ENCLAVE_DEFAULT_STACK_BASE;
/// Default guest-virtual base of the enclave's heap.
pub const ENCLAVE_DEFAULT_HEAP_BASE: usize = 0x4000_0000;
/// Default guest-virtual address the shared kernel buffer is mapped at.
pub const ENCLAVE_DEFAULT_KBUFFER: usize = 0xC000_0000;

/// satp MODE field value selecting Sv39 paging, shifted into position.
pub const SATP_MODE_SV39: usize = 8 << 60;

/// OCALL function ids written into an enclave descriptor's `ocall_slots.func_id` (SPEC_FULL.md
/// §6). Only `sys_write` is implemented by this core (SPEC_FULL.md §1 Non-goals); further OCALL
/// kinds extend this list without changing the publish mechanism.
pub const OCALL_SYS_WRITE: u64 = 1;
