//! C6: the host-call dispatch surface (SPEC_FULL.md §5/§6), grounded on the
//! `create_enclave`/`run_enclave`/`stop_enclave`/`resume_from_stop`/`resume_enclave`/
//! `resume_from_ocall`/`exit_enclave`/`enclave_sys_write`/`do_timer_irq`/`call_enclave`/
//! `enclave_return` family in `original_source/sm/enclave.c`.
//!
//! Every function here takes `&mut Monitor` directly rather than locking a global itself, so
//! they're plain testable functions; `src/lib.rs` is the only place that actually owns a
//! `spin::Mutex<Monitor>` and is responsible for holding the guard across one call (SPEC_FULL.md
//! §4.6 — the lock is never released and reacquired mid-operation).

use crate::config::PAGE_SIZE;
use crate::descriptor::{CreateParams, Eid};
use crate::error::EnclaveError;
use crate::monitor::Monitor;
use crate::platform::Platform;
use crate::state::EnclaveState;
use crate::swap;

/// What a dispatch call handed back to the host, beyond plain success/[`EnclaveError`].
/// Reifies the legacy monitor's overloaded integer return value
/// (`ENCLAVE_TIMER_IRQ`/`ENCLAVE_OCALL`/a real a0) as a proper enum; `src/lib.rs`'s ecall
/// entry point is the only place that lowers this back down to a sentinel integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new enclave was created; the id bound in the request's out-parameter.
    Created(Eid),
    /// The enclave is now running (first `run`, or a `resume`/`resume_from_ocall` swap-in).
    Running,
    /// The enclave was descheduled by the host's request; its context is parked.
    Stopped,
    /// A timer interrupt preempted the enclave mid-run, or `resume` was called while the enclave
    /// was `Stopped` (the original monitor's `resume_enclave` quirk: report `TIMER_IRQ` and leave
    /// the state untouched until the host explicitly calls `resume_from_stop`). Mirrors
    /// `ENCLAVE_TIMER_IRQ`.
    TimerIrq,
    /// The enclave issued an OCALL and is waiting for the host to service it. Mirrors
    /// `ENCLAVE_OCALL`.
    Ocall,
    /// The enclave finished and its resources have been released.
    Exited,
}

/// Create a new enclave from validated parameters. Mirrors `create_enclave`, including its
/// `free_mem`/`kbuffer` layout validation (SPEC_FULL.md §4.7) and its `*eid_ptr = eid` write
/// before returning success (§6).
pub fn create(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    params: CreateParams,
) -> Result<DispatchOutcome, EnclaveError> {
    if params.memory.size == 0 {
        return Err(EnclaveError::InvalidArgument);
    }
    let region_end = params.memory.paddr + params.memory.size;
    if params.free_mem < params.memory.paddr
        || params.free_mem >= region_end
        || params.free_mem % PAGE_SIZE != 0
    {
        return Err(EnclaveError::InvalidArgument);
    }
    if params.kbuffer.size == 0
        || params.kbuffer.paddr % PAGE_SIZE != 0
        || params.kbuffer.size % PAGE_SIZE != 0
    {
        return Err(EnclaveError::InvalidArgument);
    }
    platform.check_host_region(params.memory.paddr, params.memory.size)?;
    platform.check_host_region(params.kbuffer.paddr, params.kbuffer.size)?;

    let eid_ptr = params.eid_ptr;
    let descriptor = crate::descriptor::EnclaveDescriptor::new(params);
    let eid = monitor.registry.alloc(descriptor)?;
    platform.copy_to_host(eid_ptr, &(eid as u64).to_ne_bytes())?;
    Ok(DispatchOutcome::Created(eid))
}

/// First entry into a freshly created enclave: `Fresh → Running`. Mirrors `run_enclave`.
pub fn run(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
    host_ptbr: usize,
) -> Result<DispatchOutcome, EnclaveError> {
    enter(monitor, platform, hart_id, eid, host_ptbr, EnclaveState::run)?;
    Ok(DispatchOutcome::Running)
}

/// Host asks an enclave to pause. No context swap: the original `stop_enclave` (enclave.c:
/// 570-600) only flips `state`, and this call does not require the enclave to be live on the
/// calling hart — it may be targeting a `Runnable` enclave that has not been (re-)entered yet.
/// Host-initiated and guarded only by `host_ptbr`, never by hart authentication (that guards
/// enclave-*originated* calls, not this one). Mirrors `stop_enclave`.
pub fn stop(monitor: &mut Monitor, eid: Eid, host_ptbr: usize) -> Result<DispatchOutcome, EnclaveError> {
    let descriptor = monitor.registry.get_mut(eid)?;
    if !descriptor.is_owned_by(host_ptbr) {
        return Err(EnclaveError::NotOwner);
    }
    descriptor.state = descriptor.state.stop()?;
    Ok(DispatchOutcome::Stopped)
}

/// Host marks a stopped enclave eligible to run again (does not itself swap it back in; a
/// subsequent [`resume`] call does that). Mirrors `resume_from_stop`.
pub fn resume_from_stop(
    monitor: &mut Monitor,
    eid: Eid,
    host_ptbr: usize,
) -> Result<(), EnclaveError> {
    let descriptor = monitor.registry.get_mut(eid)?;
    if !descriptor.is_owned_by(host_ptbr) {
        return Err(EnclaveError::NotOwner);
    }
    descriptor.state = descriptor.state.resume_from_stop()?;
    Ok(())
}

/// Swap a `Runnable` enclave back in. Mirrors `resume_enclave`'s general case — except when the
/// enclave is `Stopped`: the original special-cases that state (enclave.c:657-661) by reporting
/// `ENCLAVE_TIMER_IRQ` back to the host and leaving the state untouched, rather than swapping in
/// an enclave the host has not yet un-stopped via [`resume_from_stop`].
pub fn resume(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
    host_ptbr: usize,
) -> Result<DispatchOutcome, EnclaveError> {
    {
        let descriptor = monitor.registry.get(eid)?;
        if !descriptor.is_owned_by(host_ptbr) {
            return Err(EnclaveError::NotOwner);
        }
        if descriptor.state == EnclaveState::Stopped {
            return Ok(DispatchOutcome::TimerIrq);
        }
    }
    enter(monitor, platform, hart_id, eid, host_ptbr, EnclaveState::resume)?;
    Ok(DispatchOutcome::Running)
}

/// Host resumes an enclave that issued an OCALL, handing back `ocall_retval` as the result the
/// enclave sees in `a0`. Unlike [`resume_from_stop`], this performs the actual context swap-in
/// itself — `Ocalling → Running` directly, with no `Runnable` stopover (SPEC_FULL.md §4.5).
/// Mirrors `resume_from_ocall`.
pub fn resume_from_ocall(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
    host_ptbr: usize,
    ocall_retval: u64,
) -> Result<DispatchOutcome, EnclaveError> {
    enter(monitor, platform, hart_id, eid, host_ptbr, EnclaveState::resume_from_ocall)?;
    let descriptor = monitor.registry.get_mut(eid)?;
    descriptor.thread_context.set_xreg(10, ocall_retval as usize);
    Ok(DispatchOutcome::Running)
}

/// Enclave voluntarily issues an OCALL: park its context, mark it `Ocalling`, and hand control
/// back to the host. Mirrors `enclave_sys_write` (generalized past just `sys_write`'s specific
/// argument shape, to any OCALL payload already written into the kbuffer by the enclave).
pub fn sys_write(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
) -> Result<DispatchOutcome, EnclaveError> {
    monitor.harts.check_enclave_authentication(hart_id, eid)?;
    leave(monitor, platform, hart_id, eid, EnclaveState::ocall)?;
    publish_ocall(monitor, platform, eid, crate::config::OCALL_SYS_WRITE)?;
    Ok(DispatchOutcome::Ocall)
}

/// Write the OCALL function id into host memory through the enclave's `ocall_slots.func_id`
/// pointer. SPEC_FULL.md §6 ("Host memory writes") is explicit that `*ocall_func_id` is the only
/// word written on an OCALL — no other host memory is touched here. Mirrors the single
/// `copy_word_to_host(enclave->ocall_func_id, OCALL_SYS_WRITE)` call in
/// `original_source/sm/enclave.c`'s `enclave_sys_write`.
fn publish_ocall(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    eid: Eid,
    func_id: u64,
) -> Result<(), EnclaveError> {
    let descriptor = monitor.registry.get(eid)?;
    let slot = descriptor.ocall_slots.func_id;
    platform.copy_to_host(slot, &func_id.to_ne_bytes())
}

/// A timer interrupt fired while `eid` was running on `hart_id`: force it back to `Runnable`
/// unconditionally (no state-machine rejection — a timer can always preempt a running enclave)
/// and hand control back to the host. Mirrors `do_timer_irq`.
pub fn timer_irq(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
) -> Result<DispatchOutcome, EnclaveError> {
    leave(monitor, platform, hart_id, eid, EnclaveState::preempt)?;
    Ok(DispatchOutcome::TimerIrq)
}

/// Enclave-initiated exit: the enclave itself traps out of the hart it was running on, so this
/// call is authenticated exactly like [`sys_write`] (`check_in_enclave_world` +
/// `check_enclave_authentication`), never by `host_ptbr` — at this trap the live `satp` is the
/// enclave's own, not its creating host's, so comparing against `host_ptbr` would always fail.
/// Mirrors `exit_enclave` (enclave.c:739-783).
pub fn exit(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
) -> Result<DispatchOutcome, EnclaveError> {
    monitor.harts.check_enclave_authentication(hart_id, eid)?;
    leave(monitor, platform, hart_id, eid, EnclaveState::destroy)?;
    let descriptor = monitor.registry.get_mut(eid)?;
    let memory = descriptor.memory;
    platform.scrub(memory.paddr, memory.size);
    platform.mm_free(memory.paddr, memory.size.div_ceil(PAGE_SIZE));
    monitor.registry.free(eid);
    Ok(DispatchOutcome::Exited)
}

/// Inter-enclave call: stub, matching `call_enclave` in the original monitor, which only logs
/// (`printm`) and does not implement cross-enclave calls. See the Open Question decision in
/// DESIGN.md.
pub fn call(platform: &mut impl Platform, caller_eid: Eid, callee_eid: Eid) -> Result<(), EnclaveError> {
    platform.log_write("enclave call requested (unimplemented)\n");
    let _ = (caller_eid, callee_eid);
    Ok(())
}

/// Inter-enclave return: stub, matching `enclave_return`. See the Open Question decision in
/// DESIGN.md.
pub fn enclave_return(platform: &mut impl Platform, eid: Eid) -> Result<(), EnclaveError> {
    platform.log_write("enclave return requested (unimplemented)\n");
    let _ = eid;
    Ok(())
}

/// Shared swap-in sequence used by [`run`], [`resume`], and [`resume_from_ocall`]: validate
/// ownership, drive the state machine via `transition`, perform the world switch, and mark the
/// hart as now in enclave world.
fn enter(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
    host_ptbr: usize,
    transition: impl FnOnce(EnclaveState) -> Result<EnclaveState, EnclaveError>,
) -> Result<(), EnclaveError> {
    let descriptor = monitor.registry.get_mut(eid)?;
    if !descriptor.is_owned_by(host_ptbr) {
        return Err(EnclaveError::NotOwner);
    }
    descriptor.state = transition(descriptor.state)?;
    let memory = (descriptor.memory.paddr, descriptor.memory.size);
    let host_ctx = monitor.harts.host_ctx_mut(hart_id)?;
    let descriptor = monitor.registry.get_mut(eid)?;
    swap::swap_from_host_to_enclave(platform, memory, host_ctx, &mut descriptor.thread_context)?;
    monitor.harts.enter(hart_id, eid)?;
    Ok(())
}

/// Shared swap-out sequence used by [`sys_write`], [`timer_irq`], and [`exit`]: perform the
/// world switch back to the host, apply `transition` to the descriptor's state, and mark the
/// hart as back in the host world. [`stop`] does *not* go through here — it performs no swap.
fn leave(
    monitor: &mut Monitor,
    platform: &mut impl Platform,
    hart_id: usize,
    eid: Eid,
    transition: impl FnOnce(EnclaveState) -> Result<EnclaveState, EnclaveError>,
) -> Result<(), EnclaveError> {
    let descriptor = monitor.registry.get_mut(eid)?;
    let memory = (descriptor.memory.paddr, descriptor.memory.size);
    let host_ctx = monitor.harts.host_ctx_mut(hart_id)?;
    let descriptor = monitor.registry.get_mut(eid)?;
    swap::swap_from_enclave_to_host(platform, memory, host_ctx, &mut descriptor.thread_context)?;
    descriptor.state = transition(descriptor.state)?;
    monitor.harts.exit(hart_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{OcallSlots, Region};
    use crate::platform::MockPlatform;

    fn params() -> CreateParams {
        CreateParams {
            host_ptbr: 0xAAAA,
            memory: Region { paddr: 0, size: 0x2000 },
            encl_ptbr: 0x9000_0000,
            entry_point: 0x1000,
            free_mem: 0x1000,
            untrusted: Region { paddr: 0x3000, size: 0x800 },
            kbuffer: Region { paddr: 0x2000, size: 0x1000 },
            ocall_slots: OcallSlots { func_id: 0x4000, arg0: 0x4008, arg1: 0x4010, syscall_num: 0x4018 },
            eid_ptr: 0x4020,
        }
    }

    fn created_eid(monitor: &mut Monitor, platform: &mut MockPlatform) -> Eid {
        match create(monitor, platform, params()).unwrap() {
            DispatchOutcome::Created(eid) => eid,
            _ => panic!("expected Created"),
        }
    }

    #[test]
    fn create_writes_eid_to_eid_ptr() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        let published = platform.copy_from_host(0x4020, 8).unwrap();
        assert_eq!(u64::from_ne_bytes(published.try_into().unwrap()), eid as u64);
    }

    #[test]
    fn create_rejects_misaligned_free_mem() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let mut p = params();
        p.free_mem = 0x801;
        assert_eq!(create(&mut monitor, &mut platform, p), Err(EnclaveError::InvalidArgument));
    }

    #[test]
    fn create_rejects_free_mem_outside_region() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let mut p = params();
        p.free_mem = 0x2000;
        assert_eq!(create(&mut monitor, &mut platform, p), Err(EnclaveError::InvalidArgument));
    }

    #[test]
    fn create_rejects_misaligned_kbuffer() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let mut p = params();
        p.kbuffer.size = 0x123;
        assert_eq!(create(&mut monitor, &mut platform, p), Err(EnclaveError::InvalidArgument));
    }

    #[test]
    fn create_then_run_then_exit() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        assert_eq!(run(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap(), DispatchOutcome::Running);
        assert!(monitor.harts.check_in_enclave_world(0).is_ok());

        assert_eq!(exit(&mut monitor, &mut platform, 0, eid).unwrap(), DispatchOutcome::Exited);
        assert!(monitor.registry.get(eid).is_err());
        assert!(monitor.harts.check_in_enclave_world(0).is_err());
    }

    #[test]
    fn foreign_host_is_rejected() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        assert_eq!(run(&mut monitor, &mut platform, 0, eid, 0xBEEF), Err(EnclaveError::NotOwner));
    }

    #[test]
    fn timer_preemption_then_resume() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        run(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap();
        assert_eq!(
            timer_irq(&mut monitor, &mut platform, 0, eid).unwrap(),
            DispatchOutcome::TimerIrq
        );
        assert_eq!(monitor.registry.get(eid).unwrap().state, EnclaveState::Runnable);
        assert_eq!(
            resume(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap(),
            DispatchOutcome::Running
        );
    }

    #[test]
    fn ocall_round_trip_via_sys_write_and_resume_from_ocall() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        run(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap();
        assert_eq!(
            sys_write(&mut monitor, &mut platform, 0, eid).unwrap(),
            DispatchOutcome::Ocall
        );
        assert_eq!(monitor.registry.get(eid).unwrap().state, EnclaveState::Ocalling);
        let published = platform.copy_from_host(0x4000, 8).unwrap();
        assert_eq!(u64::from_ne_bytes(published.try_into().unwrap()), crate::config::OCALL_SYS_WRITE);
        // Only the func_id slot is written; arg0/arg1/syscall_num are untouched.
        assert_eq!(platform.copy_from_host(0x4008, 8).unwrap(), alloc::vec![0u8; 8]);

        assert_eq!(
            resume_from_ocall(&mut monitor, &mut platform, 0, eid, 0xAAAA, 7).unwrap(),
            DispatchOutcome::Running
        );
        assert_eq!(monitor.registry.get(eid).unwrap().state, EnclaveState::Running);
        assert_eq!(monitor.registry.get(eid).unwrap().thread_context.xreg(10), 7);
    }

    #[test]
    fn stop_when_runnable_then_resume_reports_timer_irq_until_unstopped() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        run(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap();
        timer_irq(&mut monitor, &mut platform, 0, eid).unwrap();
        assert_eq!(monitor.registry.get(eid).unwrap().state, EnclaveState::Runnable);

        assert_eq!(stop(&mut monitor, eid, 0xAAAA).unwrap(), DispatchOutcome::Stopped);
        assert_eq!(monitor.registry.get(eid).unwrap().state, EnclaveState::Stopped);

        assert_eq!(
            resume(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap(),
            DispatchOutcome::TimerIrq
        );
        assert_eq!(monitor.registry.get(eid).unwrap().state, EnclaveState::Stopped);

        resume_from_stop(&mut monitor, eid, 0xAAAA).unwrap();
        assert_eq!(
            resume(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap(),
            DispatchOutcome::Running
        );
    }

    #[test]
    fn stop_does_not_require_hart_to_be_in_enclave_world() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        run(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap();
        timer_irq(&mut monitor, &mut platform, 0, eid).unwrap();
        assert!(monitor.harts.check_in_enclave_world(0).is_err());
        assert_eq!(stop(&mut monitor, eid, 0xAAAA).unwrap(), DispatchOutcome::Stopped);
    }

    #[test]
    fn exit_does_not_check_host_ptbr() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10000);
        let eid = created_eid(&mut monitor, &mut platform);
        run(&mut monitor, &mut platform, 0, eid, 0xAAAA).unwrap();
        // The enclave's own live satp at the exit trap is encl_ptbr, never host_ptbr; exit must
        // still succeed purely on hart authentication.
        assert_eq!(exit(&mut monitor, &mut platform, 0, eid).unwrap(), DispatchOutcome::Exited);
    }

    #[test]
    fn registry_grows_past_a_single_slab_node() {
        let mut monitor = Monitor::new();
        let mut platform = MockPlatform::new(0x10_0000);
        for i in 0..(crate::config::SLAB_NODE_CAPACITY + 2) {
            let mut p = params();
            p.memory.paddr = i * 0x1000;
            p.free_mem = i * 0x1000;
            p.kbuffer.paddr = (i + 100) * 0x1000;
            p.eid_ptr = (i + 200) * 0x1000;
            create(&mut monitor, &mut platform, p).unwrap();
        }
        assert_eq!(monitor.registry.len(), crate::config::SLAB_NODE_CAPACITY + 2);
    }
}
