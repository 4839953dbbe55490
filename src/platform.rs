//! The `Platform` seam: every collaborator SPEC_FULL.md's out-of-scope list hands to "the rest
//! of the firmware image" lives behind this one trait, the way the teacher hands everything
//! device-shaped to its `MmioDevice` trait (`src/device.rs`) instead of hard-coding a concrete
//! UART/CLINT in the trap path.
//!
//! `src/dispatch.rs` and `src/swap.rs` are generic over `P: Platform` (or take `&mut dyn
//! Platform`), so none of the core logic depends on a concrete memory allocator, page-table
//! walker, or console. Tests instantiate [`MockPlatform`] instead.

use crate::error::EnclaveError;

/// Physical address, in the host's address space.
pub type PhysAddr = usize;

/// Everything the enclave supervisor core needs from its environment but does not implement
/// itself (SPEC_FULL.md §1, "Non-goals / out of scope").
pub trait Platform {
    /// Allocate `num_pages` contiguous physical pages for enclave metadata (descriptor slabs).
    /// Mirrors `mm_alloc` in `original_source/sm/enclave.c`.
    fn mm_alloc(&mut self, num_pages: usize) -> Result<PhysAddr, EnclaveError>;

    /// Return pages previously obtained from [`Platform::mm_alloc`].
    fn mm_free(&mut self, addr: PhysAddr, num_pages: usize);

    /// Validate that `[paddr, paddr + size)` is backed by host memory the calling process
    /// actually owns, and is not already claimed by another enclave. Mirrors `mmap`/
    /// `traverse_vmas` in the original monitor.
    fn check_host_region(&self, paddr: PhysAddr, size: usize) -> Result<(), EnclaveError>;

    /// Install whatever isolation mechanism (PMP entries, a secure-world bitmap, ...) keeps the
    /// host from touching `[paddr, paddr + size)` while it belongs to an enclave. Mirrors
    /// `grant_enclave_access`.
    fn grant_enclave_access(&mut self, paddr: PhysAddr, size: usize) -> Result<(), EnclaveError>;

    /// Undo [`Platform::grant_enclave_access`]. Mirrors `retrieve_enclave_access`.
    fn retrieve_enclave_access(&mut self, paddr: PhysAddr, size: usize) -> Result<(), EnclaveError>;

    /// Zero `[paddr, paddr + size)`. Mirrors `exit_enclave`'s memset-zero scrub of enclave
    /// memory before it is returned to the host.
    fn scrub(&mut self, paddr: PhysAddr, size: usize);

    /// Copy `bytes` into the host's address space at `dst`, used to marshal OCALL arguments and
    /// the `eid_ptr` out-parameter back across the host/monitor boundary. Mirrors
    /// `copy_to_host`/`copy_word_to_host`/`copy_dword_to_host`.
    fn copy_to_host(&mut self, dst: PhysAddr, bytes: &[u8]) -> Result<(), EnclaveError>;

    /// Read `len` bytes out of the host's address space at `src`. Mirrors `copy_from_host`.
    fn copy_from_host(&self, src: PhysAddr, len: usize) -> Result<alloc::vec::Vec<u8>, EnclaveError>;

    /// Best-effort diagnostic line, used by the `print!`/`println!` macros in [`crate::log`].
    /// Never fails: a dropped log line is not a supervisor error.
    fn log_write(&mut self, s: &str);
}

/// An in-memory [`Platform`] for unit tests: a byte arena stands in for host/physical memory,
/// and isolation/ownership bookkeeping is a couple of `Vec`s instead of real PMP entries.
#[cfg(any(test, feature = "mock-platform"))]
pub struct MockPlatform {
    arena: alloc::vec::Vec<u8>,
    next_free: PhysAddr,
    isolated_ranges: alloc::vec::Vec<(PhysAddr, usize)>,
    pub log: alloc::string::String,
}

#[cfg(any(test, feature = "mock-platform"))]
impl MockPlatform {
    /// Build a mock backed by `arena_size` bytes of zeroed memory.
    pub fn new(arena_size: usize) -> Self {
        Self {
            arena: alloc::vec![0u8; arena_size],
            next_free: 0,
            isolated_ranges: alloc::vec::Vec::new(),
            log: alloc::string::String::new(),
        }
    }

    fn is_isolated(&self, paddr: PhysAddr, size: usize) -> bool {
        self.isolated_ranges.iter().any(|&(base, len)| base == paddr && len == size)
    }
}

#[cfg(any(test, feature = "mock-platform"))]
impl Platform for MockPlatform {
    fn mm_alloc(&mut self, num_pages: usize) -> Result<PhysAddr, EnclaveError> {
        let size = num_pages * crate::config::PAGE_SIZE;
        if self.next_free + size > self.arena.len() {
            return Err(EnclaveError::OutOfMemory);
        }
        let addr = self.next_free;
        self.next_free += size;
        Ok(addr)
    }

    fn mm_free(&mut self, _addr: PhysAddr, _num_pages: usize) {
        // Bump allocator: the mock never reclaims, matching the simplest valid `mm_free`
        // behavior (a no-op is a legal, if wasteful, implementation of "return the pages").
    }

    fn check_host_region(&self, paddr: PhysAddr, size: usize) -> Result<(), EnclaveError> {
        if paddr + size > self.arena.len() {
            return Err(EnclaveError::InvalidArgument);
        }
        Ok(())
    }

    fn grant_enclave_access(&mut self, paddr: PhysAddr, size: usize) -> Result<(), EnclaveError> {
        self.isolated_ranges.push((paddr, size));
        Ok(())
    }

    fn retrieve_enclave_access(&mut self, paddr: PhysAddr, size: usize) -> Result<(), EnclaveError> {
        if !self.is_isolated(paddr, size) {
            return Err(EnclaveError::PlatformIsolationFailed);
        }
        self.isolated_ranges.retain(|&(base, len)| !(base == paddr && len == size));
        Ok(())
    }

    fn scrub(&mut self, paddr: PhysAddr, size: usize) {
        self.arena[paddr..paddr + size].fill(0);
    }

    fn copy_to_host(&mut self, dst: PhysAddr, bytes: &[u8]) -> Result<(), EnclaveError> {
        if dst + bytes.len() > self.arena.len() {
            return Err(EnclaveError::InvalidArgument);
        }
        self.arena[dst..dst + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn copy_from_host(&self, src: PhysAddr, len: usize) -> Result<alloc::vec::Vec<u8>, EnclaveError> {
        if src + len > self.arena.len() {
            return Err(EnclaveError::InvalidArgument);
        }
        Ok(self.arena[src..src + len].to_vec())
    }

    fn log_write(&mut self, s: &str) {
        self.log.push_str(s);
    }
}
