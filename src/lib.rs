//! A RISC-V M-mode trusted supervisor that creates, destroys, and world-switches into isolated
//! user-mode enclaves (SPEC_FULL.md §1). `no_std` except under `cfg(test)`, following the same
//! pattern the teacher's bring-up crates use to let `cargo test` run under `std` while the
//! production build stays freestanding.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod csr;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod hart;
pub mod log;
pub mod monitor;
pub mod platform;
pub mod registry;
pub mod slab;
pub mod state;
pub mod swap;

use core::cell::OnceCell;

use spin::Mutex;

use monitor::Monitor;

/// The single global instance of [`Monitor`], grounded on the teacher's own
/// `static HYPERVISOR_DATA: Mutex<OnceCell<HypervisorData>>` / `static SBI: Mutex<OnceCell<Sbi>>`
/// pattern in `src/main.rs`. `OnceCell` defers construction past `static` initialization (this
/// type has no `const fn new` that allocates); `Mutex` is C7, the single lock every dispatch
/// operation holds for its entire duration.
static MONITOR: Mutex<OnceCell<Monitor>> = Mutex::new(OnceCell::new());

/// Run `f` with exclusive access to the global monitor, initializing it on first use. This is
/// the only place in the crate that locks [`MONITOR`]; every `dispatch::*` entry point below
/// holds the guard for its entire duration, so a panic mid-operation is the only way the lock
/// is ever held past a single call (SPEC_FULL.md §4.6).
fn with_monitor<R>(f: impl FnOnce(&mut Monitor) -> R) -> R {
    let mut guard = MONITOR.lock();
    if guard.get().is_none() {
        let _ = guard.set(Monitor::new());
    }
    f(guard.get_mut().expect("monitor initialized above"))
}

/// The extension id this supervisor's host-call dispatch surface answers to, in the SBI ecall
/// convention's `a7` register (SPEC_FULL.md §6). Chosen in the vendor-specific SBI extension
/// space, the same band the original monitor's `enclave_*` ecalls occupy.
pub const SBI_EXT_ENCLAVE: usize = 0x0A00_0000;

/// Function ids within [`SBI_EXT_ENCLAVE`], carried in `a6`.
pub mod function_id {
    pub const CREATE: usize = 0;
    pub const RUN: usize = 1;
    pub const STOP: usize = 2;
    pub const RESUME_FROM_STOP: usize = 3;
    pub const RESUME: usize = 4;
    pub const RESUME_FROM_OCALL: usize = 5;
    pub const EXIT: usize = 6;
    pub const SYS_WRITE: usize = 7;
    pub const TIMER_IRQ: usize = 8;
    pub const CALL: usize = 9;
    pub const RETURN: usize = 10;
}

/// Dispatch one `(a7 = `[`SBI_EXT_ENCLAVE`]`, a6 = function id)` ecall, lowering the typed
/// [`dispatch::DispatchOutcome`]/[`error::EnclaveError`] result down to the legacy sentinel ABI
/// (SPEC_FULL.md §6): `Ok` carries the SBI-style value the caller should see in `a0`/`a1`, `Err`
/// is [`error::ENCLAVE_ERROR_SENTINEL`].
///
/// Takes a caller-supplied `platform` rather than reaching for a global, since the concrete
/// `Platform` (real PMP-backed hardware vs. a test double) is a property of the environment this
/// crate is linked into, not of the monitor state itself.
pub fn handle_ecall(
    platform: &mut impl platform::Platform,
    hart_id: usize,
    host_ptbr: usize,
    function: usize,
    args: [usize; 14],
) -> sbi_rt::SbiRet {
    use dispatch::DispatchOutcome;
    use error::EnclaveError;

    let result: Result<DispatchOutcome, EnclaveError> = with_monitor(|monitor| match function {
        function_id::CREATE => {
            let params = descriptor::CreateParams {
                host_ptbr,
                memory: descriptor::Region { paddr: args[0], size: args[1] },
                encl_ptbr: args[2],
                entry_point: args[3],
                free_mem: args[4],
                untrusted: descriptor::Region { paddr: args[5], size: args[6] },
                kbuffer: descriptor::Region { paddr: args[7], size: args[8] },
                ocall_slots: descriptor::OcallSlots {
                    func_id: args[9],
                    arg0: args[10],
                    arg1: args[11],
                    syscall_num: args[12],
                },
                eid_ptr: args[13],
            };
            dispatch::create(monitor, platform, params)
        }
        function_id::RUN => dispatch::run(monitor, platform, hart_id, args[0], host_ptbr),
        function_id::STOP => dispatch::stop(monitor, args[0], host_ptbr),
        function_id::RESUME_FROM_STOP => {
            dispatch::resume_from_stop(monitor, args[0], host_ptbr).map(|()| DispatchOutcome::Running)
        }
        function_id::RESUME => dispatch::resume(monitor, platform, hart_id, args[0], host_ptbr),
        function_id::RESUME_FROM_OCALL => dispatch::resume_from_ocall(
            monitor,
            platform,
            hart_id,
            args[0],
            host_ptbr,
            args[1] as u64,
        ),
        function_id::EXIT => dispatch::exit(monitor, platform, hart_id, args[0]),
        function_id::SYS_WRITE => dispatch::sys_write(monitor, platform, hart_id, args[0]),
        function_id::TIMER_IRQ => dispatch::timer_irq(monitor, platform, hart_id, args[0]),
        function_id::CALL => {
            dispatch::call(platform, args[0], args[1]).map(|()| DispatchOutcome::Running)
        }
        function_id::RETURN => {
            dispatch::enclave_return(platform, args[0]).map(|()| DispatchOutcome::Running)
        }
        _ => Err(EnclaveError::InvalidArgument),
    });

    match result {
        Ok(DispatchOutcome::Created(eid)) => sbi_rt::SbiRet { error: 0, value: eid },
        Ok(DispatchOutcome::TimerIrq) => sbi_rt::SbiRet { error: 0, value: 1 },
        Ok(DispatchOutcome::Ocall) => sbi_rt::SbiRet { error: 0, value: 2 },
        Ok(_) => sbi_rt::SbiRet { error: 0, value: 0 },
        Err(_) => sbi_rt::SbiRet { error: error::ENCLAVE_ERROR_SENTINEL as usize, value: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::MockPlatform;

    #[test]
    fn create_then_run_round_trips_through_the_ecall_surface() {
        let mut platform = MockPlatform::new(0x10000);
        // memory, encl_ptbr, entry_point, free_mem, untrusted, kbuffer, ocall_slots, eid_ptr
        let create_ret = handle_ecall(
            &mut platform,
            0,
            0xAAAA,
            function_id::CREATE,
            [
                0, 0x4000, 0x9000_0000, 0x1000, 0x1000, 0x2000, 0x800, 0x3000, 0x1000, 0x5000, 0x5008,
                0x5010, 0x5018, 0x5020,
            ],
        );
        assert_eq!(create_ret.error, 0);
        let eid = create_ret.value;

        let run_ret = handle_ecall(
            &mut platform,
            0,
            0xAAAA,
            function_id::RUN,
            [eid, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        );
        assert_eq!(run_ret.error, 0);
    }

    #[test]
    fn unknown_function_id_is_an_error() {
        let mut platform = MockPlatform::new(0x10000);
        let ret = handle_ecall(&mut platform, 0, 0xAAAA, 0xFFFF, [0; 14]);
        assert_eq!(ret.error, error::ENCLAVE_ERROR_SENTINEL as usize);
    }
}
