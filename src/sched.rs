//! Priority-banded round-robin scheduling.
//!
//! [`schedule`] is a pure function over the thread table: no allocation, no
//! I/O, no interrupt manipulation. The caller supplies the critical section
//! and installs the returned frame as the context to resume.

use crate::arch::Arch;
use crate::thread::{ThreadState, ThreadTable};

/// What the caller wants from a scheduling point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRequest {
    /// Keep the current thread if it is still schedulable.
    Current,
    /// Prefer a different thread in the current priority band if one exists.
    Other,
    /// Re-evaluate the whole table.
    Any,
}

/// Pick the saved frame to resume next.
///
/// The highest priority among schedulable threads defines the band (the
/// current thread is excluded from that computation for
/// [`ScheduleRequest::Other`]); within the band, selection is round-robin in
/// slot order starting after the current thread's slot. A
/// [`ScheduleRequest::Current`] keeps the current thread only while it still
/// belongs to the band, so a higher-priority thread waking up wins at the
/// next tick. The band can only collapse onto the current thread itself when
/// it is the sole member, which the always-running idle thread confines to
/// the idle case.
///
/// If `current` does not resolve to any descriptor the input frame is
/// returned unchanged; the guaranteed idle thread makes the remaining
/// fallbacks unreachable.
pub fn schedule<A: Arch>(
    threads: &ThreadTable<A>,
    current: *mut A::Frame,
    request: ScheduleRequest,
) -> *mut A::Frame {
    let Some((current_slot, current_thread)) = threads.find_by_context_indexed(current) else {
        return current;
    };

    // The band priority starts at the idle thread's floor so that an empty
    // candidate set falls through to idle.
    let mut priority = i32::MIN;
    for (slot, thread) in threads.occupied() {
        if request == ScheduleRequest::Other && slot == current_slot {
            continue;
        }
        if thread.state() != ThreadState::Running {
            continue;
        }
        priority = priority.max(thread.priority());
    }

    if request == ScheduleRequest::Current
        && current_thread.state() == ThreadState::Running
        && current_thread.priority() >= priority
    {
        return current;
    }

    // Round-robin: first band member after the current slot...
    for (slot, thread) in threads.occupied() {
        if slot <= current_slot {
            continue;
        }
        if thread.state() == ThreadState::Running && thread.priority() == priority {
            return thread.frame_ptr();
        }
    }

    // ...wrapping to the first band member in the table.
    for (_, thread) in threads.occupied() {
        if thread.state() == ThreadState::Running && thread.priority() == priority {
            return thread.frame_ptr();
        }
    }

    current
}
