//! Software-trap numbers.
//!
//! The trap instruction carries one of these selectors; arguments travel in
//! saved GP slots 4 and 5 and results come back in slot 0. Numbers 0-7 are
//! fixed by the on-cabinet ABI; unknown selectors are no-ops that keep the
//! current thread scheduled.

/// Increment a global counter. arg0 = counter handle.
pub const SYS_GLOBAL_COUNTER_INCREMENT: u32 = 0;

/// Decrement a global counter, saturating at zero. arg0 = counter handle.
pub const SYS_GLOBAL_COUNTER_DECREMENT: u32 = 1;

/// Read a global counter. arg0 = counter handle. Returns the value, or 0
/// for unknown handles.
pub const SYS_GLOBAL_COUNTER_VALUE: u32 = 2;

/// Give up the CPU, preferring another runnable thread in the same
/// priority band.
pub const SYS_THREAD_YIELD: u32 = 3;

/// Make a stopped thread schedulable. arg0 = thread id.
pub const SYS_THREAD_START: u32 = 4;

/// Make a running thread unschedulable. arg0 = thread id.
pub const SYS_THREAD_STOP: u32 = 5;

/// Change a thread's priority. arg0 = thread id, arg1 = new priority.
pub const SYS_THREAD_PRIORITY: u32 = 6;

/// Return the calling thread's id, or 0 if the current context is unknown.
pub const SYS_THREAD_ID: u32 = 7;

/// Take a semaphore permit, blocking the caller when none remain.
/// arg0 = semaphore handle.
pub const SYS_SEMAPHORE_ACQUIRE: u32 = 8;

/// Return a semaphore permit, waking the first blocked waiter if any.
/// arg0 = semaphore handle.
pub const SYS_SEMAPHORE_RELEASE: u32 = 9;

/// Wait for a thread to finish and collect its return value.
/// arg0 = thread id. Returns the target's return value, or 0 for unknown
/// or already-joined targets.
pub const SYS_THREAD_JOIN: u32 = 10;
