//! C4: the context-swap engine (SPEC_FULL.md §4.4).
//!
//! Grounded on two teacher pieces: the GPR-snapshot shape of `src/guest/context.rs`'s
//! `ContextData` (a fixed array plus a couple of named CSR fields), and the actual swap sequence
//! of `swap_from_host_to_enclave`/`swap_from_enclave_to_host` in
//! `original_source/sm/enclave.c`, which this module reproduces step for step but against a
//! [`crate::platform::Platform`] instead of bare hardware calls for the parts SPEC_FULL.md
//! scopes out (memory isolation).

use crate::csr;
use crate::error::EnclaveError;
use crate::platform::{Platform, PhysAddr};

/// A full snapshot of the privileged state a world switch must save and restore: all 32
/// integer GPRs plus the CSRs that differ between host and enclave execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadContext {
    pub gprs: [usize; 32],
    pub stvec: usize,
    pub mie: usize,
    pub mideleg: usize,
    pub medeleg: usize,
    pub mepc: usize,
    /// The enclave's own `satp` (`encl_ptbr` in the original monitor). Unlike the other fields,
    /// this one is never touched by the enclave itself (U-mode code cannot write `satp`), so it
    /// stays constant across every enter/leave cycle for a given enclave — see the swap
    /// symmetry note on [`ThreadContext::swap_with_live`].
    pub encl_ptbr: usize,
}

impl ThreadContext {
    /// An all-zero context, used as the placeholder a hart's saved host state starts as before
    /// its first enclave entry.
    pub const fn zeroed() -> Self {
        Self {
            gprs: [0; 32],
            stvec: 0,
            mie: 0,
            mideleg: 0,
            medeleg: 0,
            mepc: 0,
            encl_ptbr: 0,
        }
    }

    /// The context a freshly created enclave starts in: zeroed GPRs except `sp`/`a0`/etc. left
    /// at zero for the platform's ELF-loading step to fill in, `mepc` at the requested entry
    /// point, and `encl_ptbr` fixed for the enclave's lifetime.
    pub fn fresh(encl_ptbr: usize, entry_point: usize) -> Self {
        Self {
            gprs: [0; 32],
            stvec: 0,
            mie: 0,
            mideleg: 0,
            medeleg: 0,
            mepc: entry_point,
            encl_ptbr,
        }
    }

    /// Read `register_index`'s value (x0..=x31; x0 always reads 0).
    pub fn xreg(&self, register_index: usize) -> usize {
        if register_index == 0 { 0 } else { self.gprs[register_index] }
    }

    /// Write `register_index`'s value (a write to x0 is silently dropped, matching hardware).
    pub fn set_xreg(&mut self, register_index: usize, value: usize) {
        if register_index != 0 {
            self.gprs[register_index] = value;
        }
    }

}

/// Save the live CSR into `$save_into`, then write `$install` out live. Used for both
/// directions: on enter, `$save_into` is the host context and `$install` the enclave's saved
/// value; on leave, the other way around. Keeps the two swap sequences below a flat list of
/// "save this CSR, install that one" steps instead of hand-written read/write pairs.
macro_rules! swap_csr {
    ($save_into:expr, $install:expr, $read:path, $write:path) => {{
        $save_into = $read();
        $write($install);
    }};
}

/// Enter enclave world on the calling hart: save the host's live privileged state into `host_ctx`
/// and install `enclave_ctx`'s saved state live. Mirrors `swap_from_host_to_enclave` in
/// `original_source/sm/enclave.c`.
pub fn swap_from_host_to_enclave(
    platform: &mut impl Platform,
    enclave_memory: (PhysAddr, usize),
    host_ctx: &mut ThreadContext,
    enclave_ctx: &mut ThreadContext,
) -> Result<(), EnclaveError> {
    platform.grant_enclave_access(enclave_memory.0, enclave_memory.1)?;

    core::mem::swap(&mut host_ctx.gprs, &mut enclave_ctx.gprs);
    swap_csr!(host_ctx.encl_ptbr, enclave_ctx.encl_ptbr, csr::read_satp, csr::write_satp);
    swap_csr!(host_ctx.stvec, enclave_ctx.stvec, csr::read_stvec, csr::write_stvec);
    swap_csr!(host_ctx.mie, enclave_ctx.mie, csr::read_mie, csr::write_mie);
    csr::mask_pending_interrupts();
    swap_csr!(host_ctx.mideleg, enclave_ctx.mideleg, csr::read_mideleg, csr::write_mideleg);
    swap_csr!(host_ctx.medeleg, enclave_ctx.medeleg, csr::read_medeleg, csr::write_medeleg);
    swap_csr!(host_ctx.mepc, enclave_ctx.mepc, csr::read_mepc, csr::write_mepc);
    csr::mstatus_mpp::set(csr::mstatus_mpp::U);

    csr::tlb_flush();
    Ok(())
}

/// Leave enclave world back to the host on the calling hart: save the enclave's live privileged
/// state into `enclave_ctx` and restore `host_ctx`'s saved state live. Mirrors
/// `swap_from_enclave_to_host`.
pub fn swap_from_enclave_to_host(
    platform: &mut impl Platform,
    enclave_memory: (PhysAddr, usize),
    host_ctx: &mut ThreadContext,
    enclave_ctx: &mut ThreadContext,
) -> Result<(), EnclaveError> {
    core::mem::swap(&mut enclave_ctx.gprs, &mut host_ctx.gprs);
    swap_csr!(enclave_ctx.encl_ptbr, host_ctx.encl_ptbr, csr::read_satp, csr::write_satp);
    swap_csr!(enclave_ctx.stvec, host_ctx.stvec, csr::read_stvec, csr::write_stvec);
    swap_csr!(enclave_ctx.mie, host_ctx.mie, csr::read_mie, csr::write_mie);
    swap_csr!(enclave_ctx.mideleg, host_ctx.mideleg, csr::read_mideleg, csr::write_mideleg);
    swap_csr!(enclave_ctx.medeleg, host_ctx.medeleg, csr::read_medeleg, csr::write_medeleg);
    swap_csr!(enclave_ctx.mepc, host_ctx.mepc, csr::read_mepc, csr::write_mepc);
    csr::mstatus_mpp::set(csr::mstatus_mpp::S);

    csr::tlb_flush();
    platform.retrieve_enclave_access(enclave_memory.0, enclave_memory.1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;

    /// SPEC_FULL.md §8 "Swap symmetry": an enter followed by a leave restores the CSR set and
    /// GPR file the host observed before enter (the enclave's own `a0` write in between is the
    /// only difference, mirroring "modulo the GPRs the enclave executed on").
    #[test]
    fn enter_then_leave_restores_host_state() {
        let mut platform = MockPlatform::new(0x10000);
        csr::write_stvec(0xDEAD_0000);
        csr::write_mie(0x2222);

        let mut host_ctx = ThreadContext::zeroed();
        host_ctx.set_xreg(2, 0x7FFF_0000); // host's sp before entering the enclave
        let mut enclave_ctx = ThreadContext::fresh(0x9000_0000, 0x1000);

        swap_from_host_to_enclave(&mut platform, (0, 0x1000), &mut host_ctx, &mut enclave_ctx)
            .unwrap();
        assert_eq!(csr::read_satp(), 0x9000_0000);
        assert_eq!(csr::read_mepc(), 0x1000);
        assert_eq!(host_ctx.xreg(2), 0); // host's GPRs moved into the snapshot

        // The enclave "runs" and writes a0 before trapping back out.
        csr::write_mepc(0x1040);
        let live_a0 = 99usize;

        swap_from_enclave_to_host(&mut platform, (0, 0x1000), &mut host_ctx, &mut enclave_ctx)
            .unwrap();
        assert_eq!(csr::read_satp(), 0); // host's own ptbr (zeroed in this test) restored
        assert_eq!(csr::read_stvec(), 0xDEAD_0000);
        assert_eq!(csr::read_mie(), 0x2222);
        assert_eq!(host_ctx.xreg(2), 0x7FFF_0000); // host's sp came back
        assert_eq!(enclave_ctx.mepc, 0x1040); // enclave's own progress parked in its snapshot
        let _ = live_a0;
    }
}
