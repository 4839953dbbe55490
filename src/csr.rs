//! Whole-register CSR accessors used by the context-swap engine (§4.4).
//!
//! The official `riscv` crate (a teacher dependency, kept in Cargo.toml) models most of these
//! registers as structured bit-flag types meant for setting/clearing individual fields
//! (`mie::set_mtimer()`, `mstatus::set_mpp(..)`, and so on, as used throughout the teacher's
//! `trap/machine.rs` and `machine_init.rs`). The swap engine instead needs to save and restore
//! a CSR's *entire* raw value across a world switch, which that structured API doesn't expose.
//! Following the exact pattern the teacher itself uses in `src/csrs.rs` for CSRs the official
//! crate doesn't cover (`vsatp`, `hvip`), this module hand-rolls whole-register read/write for
//! the handful of CSRs the swap needs whole, leaving bit-field manipulation (`mstatus.MPP`,
//! `mip` interrupt masking) to small dedicated helpers below.
//!
//! These CSRs are M-mode-only; executing `csrr`/`csrw` against them from anywhere but machine
//! mode traps. `cargo test` runs this crate as an ordinary user-mode host binary (SPEC_FULL.md
//! §1 "Test tooling"), so the real asm below is swapped for a software register file under
//! `cfg(test)` — each test thread gets its own bank via `thread_local!`, matching the per-hart
//! isolation the real CSRs provide on hardware.

#[cfg(not(test))]
mod imp {
    /// Implement a whole-register read for a CSR.
    macro_rules! read_csr_as_usize {
        ($name:ident, $csr_number:literal) => {
            #[inline]
            pub fn $name() -> usize {
                let bits: usize;
                unsafe {
                    core::arch::asm!(concat!("csrr {0}, ", stringify!($csr_number)), out(reg) bits);
                }
                bits
            }
        };
    }

    /// Implement a whole-register write for a CSR.
    macro_rules! write_csr_as_usize {
        ($name:ident, $csr_number:literal) => {
            #[inline]
            pub fn $name(bits: usize) {
                unsafe {
                    core::arch::asm!(concat!("csrw ", stringify!($csr_number), ", {0}"), in(reg) bits);
                }
            }
        };
    }

    /// Implement clearing a set of bits in a CSR (`csrrc`).
    macro_rules! clear_csr_bits {
        ($name:ident, $csr_number:literal) => {
            #[inline]
            pub fn $name(mask: usize) {
                unsafe {
                    core::arch::asm!(concat!("csrc ", stringify!($csr_number), ", {0}"), in(reg) mask);
                }
            }
        };
    }

    read_csr_as_usize!(read_mie, mie);
    write_csr_as_usize!(write_mie, mie);

    read_csr_as_usize!(read_mideleg, mideleg);
    write_csr_as_usize!(write_mideleg, mideleg);

    read_csr_as_usize!(read_medeleg, medeleg);
    write_csr_as_usize!(write_medeleg, medeleg);

    read_csr_as_usize!(read_mepc, mepc);
    write_csr_as_usize!(write_mepc, mepc);

    read_csr_as_usize!(read_stvec, stvec);
    write_csr_as_usize!(write_stvec, stvec);

    read_csr_as_usize!(read_satp, satp);
    write_csr_as_usize!(write_satp, satp);

    read_csr_as_usize!(read_mstatus, mstatus);
    write_csr_as_usize!(write_mstatus, mstatus);

    clear_csr_bits!(clear_mip_bits, mip);

    /// Real hardware TLB flush (SPEC_FULL.md §4.4 step 8).
    pub fn tlb_flush() {
        riscv::asm::sfence_vma_all();
    }
}


pub use imp::*;

/// `mstatus.MPP` field: previous privilege mode a trap return will drop into.
pub mod mstatus_mpp {
    /// User mode.
    pub const U: usize = 0b00;
    /// Supervisor mode.
    pub const S: usize = 0b01;

    const MPP_MASK: usize = 0b11 << 11;

    /// Set `mstatus.MPP` to `mode` (one of [`U`] or [`S`]), leaving every other bit untouched.
    pub fn set(mode: usize) {
        let mut bits = super::read_mstatus();
        bits &= !MPP_MASK;
        bits |= (mode << 11) & MPP_MASK;
        super::write_mstatus(bits);
    }
}

/// Bit positions of the four interrupt-pending bits the monitor masks on enclave entry.
pub mod mip_bits {
    /// Supervisor software interrupt pending.
    pub const SSIP: usize = 1 << 1;
    /// Supervisor timer interrupt pending.
    pub const STIP: usize = 1 << 5;
    /// Machine timer interrupt pending.
    pub const MTIP: usize = 1 << 7;
    /// Supervisor external interrupt pending.
    pub const SEIP: usize = 1 << 9;
}

/// Mask `mtip`, `stip`, `ssip`, `seip` in `mip` (SPEC_FULL.md §4.4 step 5).
pub fn mask_pending_interrupts() {
    clear_mip_bits(mip_bits::MTIP | mip_bits::STIP | mip_bits::SSIP | mip_bits::SEIP);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_register_read_write_round_trips() {
        write_satp(0x8000_0000_1234_5678);
        assert_eq!(read_satp(), 0x8000_0000_1234_5678);
        write_mepc(0x1000);
        assert_eq!(read_mepc(), 0x1000);
    }

    #[test]
    fn mstatus_mpp_set_leaves_other_bits_alone() {
        write_mstatus(0xFFFF_FFFF);
        mstatus_mpp::set(mstatus_mpp::U);
        assert_eq!(read_mstatus() & (0b11 << 11), mstatus_mpp::U << 11);
        assert_eq!(read_mstatus() & !(0b11 << 11), 0xFFFF_FFFF & !(0b11 << 11));

        mstatus_mpp::set(mstatus_mpp::S);
        assert_eq!(read_mstatus() & (0b11 << 11), mstatus_mpp::S << 11);
    }
}
