//! Software-trap dispatch.
//!
//! [`trap_dispatch`] is entered from the trap vector (through
//! [`crate::kernel::Kernel::software_trap`]) with interrupts masked and the
//! kernel state locked. It applies the selector's effect to the tables,
//! writes any result into the trapping frame's return slot, and tells the
//! caller which scheduling request to run.

pub mod numbers;

use crate::arch::{Arch, SavedFrame, ARG0_SLOT, ARG1_SLOT, RETURN_SLOT};
use crate::counter::CounterHandle;
use crate::kernel::KernelState;
use crate::sched::ScheduleRequest;
use crate::semaphore::SemaphoreHandle;
use crate::thread::ThreadState;
use numbers::*;

/// Apply trap `which` for the thread owning `current`.
///
/// # Safety contract
///
/// `current` is the saved frame the trap vector handed us; it stays valid
/// and exclusively ours for the whole call because interrupts are masked.
/// Borrows of it are kept short and never overlap descriptor lookups.
pub(crate) fn trap_dispatch<A: Arch>(
    state: &mut KernelState<A>,
    current: *mut A::Frame,
    which: u32,
) -> ScheduleRequest {
    let (arg0, arg1) = unsafe { ((*current).gp(ARG0_SLOT), (*current).gp(ARG1_SLOT)) };

    match which {
        SYS_GLOBAL_COUNTER_INCREMENT => {
            state.counters.increment(CounterHandle::from_raw(arg0));
            ScheduleRequest::Current
        }
        SYS_GLOBAL_COUNTER_DECREMENT => {
            state.counters.decrement(CounterHandle::from_raw(arg0));
            ScheduleRequest::Current
        }
        SYS_GLOBAL_COUNTER_VALUE => {
            let value = state.counters.value(CounterHandle::from_raw(arg0));
            unsafe { (*current).set_gp(RETURN_SLOT, value) };
            ScheduleRequest::Current
        }
        SYS_THREAD_YIELD => ScheduleRequest::Other,
        SYS_THREAD_START => {
            if let Some(thread) = state.threads.find_by_id_mut(arg0) {
                if thread.state() == ThreadState::Stopped {
                    thread.set_state(ThreadState::Running);
                }
            }
            ScheduleRequest::Any
        }
        SYS_THREAD_STOP => {
            if let Some(thread) = state.threads.find_by_id_mut(arg0) {
                if thread.state() == ThreadState::Running {
                    thread.set_state(ThreadState::Stopped);
                }
            }
            ScheduleRequest::Any
        }
        SYS_THREAD_PRIORITY => {
            if let Some(thread) = state.threads.find_by_id_mut(arg0) {
                thread.set_priority(arg1 as i32);
            }
            ScheduleRequest::Any
        }
        SYS_THREAD_ID => {
            let id = state
                .threads
                .find_by_context(current)
                .map_or(0, |thread| thread.id());
            unsafe { (*current).set_gp(RETURN_SLOT, id) };
            ScheduleRequest::Current
        }
        SYS_SEMAPHORE_ACQUIRE => semaphore_acquire(state, current, arg0),
        SYS_SEMAPHORE_RELEASE => semaphore_release(state, arg0),
        SYS_THREAD_JOIN => thread_join(state, current, arg0),
        _ => ScheduleRequest::Current,
    }
}

fn semaphore_acquire<A: Arch>(
    state: &mut KernelState<A>,
    current: *mut A::Frame,
    raw: u32,
) -> ScheduleRequest {
    let handle = SemaphoreHandle::from_raw(raw);
    let KernelState {
        threads,
        semaphores,
        ..
    } = state;

    let Some(sem) = semaphores.get_mut(handle) else {
        return ScheduleRequest::Current;
    };

    if sem.try_acquire() {
        return ScheduleRequest::Current;
    }

    if let Some(thread) = threads.find_by_context_mut(current) {
        thread.set_state(ThreadState::Waiting);
        thread.set_waiting_semaphore(Some(handle));
        ScheduleRequest::Any
    } else {
        ScheduleRequest::Current
    }
}

fn semaphore_release<A: Arch>(state: &mut KernelState<A>, raw: u32) -> ScheduleRequest {
    let handle = SemaphoreHandle::from_raw(raw);
    let KernelState {
        threads,
        semaphores,
        ..
    } = state;

    let Some(sem) = semaphores.get_mut(handle) else {
        return ScheduleRequest::Current;
    };

    // Hand the permit straight to the first waiter in slot order; the count
    // never goes up and back down, so a wakeup cannot be lost to a racing
    // acquire.
    if let Some(waiter) = threads.first_waiting_on(handle) {
        waiter.set_waiting_semaphore(None);
        waiter.set_state(ThreadState::Running);
        ScheduleRequest::Any
    } else {
        sem.release();
        ScheduleRequest::Current
    }
}

fn thread_join<A: Arch>(
    state: &mut KernelState<A>,
    current: *mut A::Frame,
    target_id: u32,
) -> ScheduleRequest {
    let target = state
        .threads
        .find_by_id(target_id)
        .map(|t| (t.state(), t.retval()));

    match target {
        Some((ThreadState::Finished, retval)) => {
            unsafe { (*current).set_gp(RETURN_SLOT, retval as usize as u32) };
            if let Some(target) = state.threads.find_by_id_mut(target_id) {
                target.set_state(ThreadState::Zombie);
            }
            ScheduleRequest::Current
        }
        Some((ThreadState::Zombie, _)) | None => {
            unsafe { (*current).set_gp(RETURN_SLOT, 0) };
            ScheduleRequest::Current
        }
        Some(_) => {
            if let Some(caller) = state.threads.find_by_context_mut(current) {
                caller.set_state(ThreadState::Waiting);
                caller.set_joining(Some(target_id));
                ScheduleRequest::Any
            } else {
                ScheduleRequest::Current
            }
        }
    }
}
