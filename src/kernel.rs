//! The kernel facade: tables, trap entry points and the user-context API.
//!
//! A [`Kernel`] owns the thread, counter and semaphore tables behind one
//! spin lock. The interrupt vectors call [`Kernel::timer_tick`] and
//! [`Kernel::software_trap`] with interrupts already masked; user-context
//! helpers take the scoped [`IrqGuard`] themselves before touching any
//! table, including on error paths.
//!
//! ```ignore
//! use arcade_kernel::{Kernel, HostedArch};
//! use spin::Lazy;
//!
//! static KERNEL: Lazy<Kernel<HostedArch>> = Lazy::new(Kernel::new);
//!
//! fn boot(boot_frame: *mut arcade_kernel::arch::HostedFrame) {
//!     KERNEL.init();
//!     KERNEL.register_main(boot_frame);
//!     let worker = KERNEL.thread_create("worker", run, core::ptr::null_mut());
//! }
//! ```

use crate::arch::{Arch, IrqGuard, SavedFrame, ThreadEntry, ARG0_SLOT, ARG1_SLOT, RETURN_SLOT};
use crate::config::{IDLE_THREAD_STACK_SIZE, THREAD_STACK_SIZE};
use crate::counter::{CounterHandle, CounterTable};
use crate::errors::SpawnError;
use crate::mem::Stack;
use crate::sched::{self, ScheduleRequest};
use crate::semaphore::{SemaphoreHandle, SemaphoreTable};
use crate::syscall::{self, numbers};
use crate::thread::{Thread, ThreadInfo, ThreadState, ThreadTable};
use alloc::boxed::Box;
use portable_atomic::{AtomicBool, AtomicPtr, Ordering};

/// Everything behind the kernel lock.
pub(crate) struct KernelState<A: Arch> {
    pub(crate) threads: ThreadTable<A>,
    pub(crate) counters: CounterTable,
    pub(crate) semaphores: SemaphoreTable,
    /// Next thread id; wraps at 2^32, skipping the 0 sentinel.
    pub(crate) thread_counter: u32,
}

impl<A: Arch> KernelState<A> {
    fn new() -> Self {
        Self {
            threads: ThreadTable::new(),
            counters: CounterTable::new(),
            semaphores: SemaphoreTable::new(),
            thread_counter: 1,
        }
    }

    pub(crate) fn next_thread_id(&mut self) -> u32 {
        let id = self.thread_counter;
        self.thread_counter = self.thread_counter.wrapping_add(1);
        if self.thread_counter == 0 {
            self.thread_counter = 1;
        }
        id
    }
}

/// Heap record that carries a new thread's entry information into the
/// trampoline. The trampoline reclaims it before the thread is marked
/// Finished.
struct RunContext<A: Arch> {
    kernel: *const Kernel<A>,
    thread_id: u32,
    entry: ThreadEntry,
    arg: *mut (),
}

/// The microkernel core.
pub struct Kernel<A: Arch> {
    state: spin::Mutex<KernelState<A>>,
    /// The frame most recently installed as the running context.
    current: AtomicPtr<A::Frame>,
    initialized: AtomicBool,
}

// All raw pointers inside are either owned by descriptors or tracked as the
// installed context; every access is serialized by the irq mask plus the
// state lock.
unsafe impl<A: Arch> Send for Kernel<A> {}
unsafe impl<A: Arch> Sync for Kernel<A> {}

impl<A: Arch> Kernel<A> {
    pub fn new() -> Self {
        Self {
            state: spin::Mutex::new(KernelState::new()),
            current: AtomicPtr::new(core::ptr::null_mut()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Reset the tables, create the idle thread and hook the software trap.
    ///
    /// The idle thread sits at the minimum representable priority in a
    /// permanent yield loop, so scheduling always has a candidate.
    pub fn init(&'static self) {
        let this: &'static Self = self;
        A::install_trap_handler(Box::new(move |which, arg0, arg1| {
            this.trap_from_current(which, arg0, arg1)
        }));

        self.locked(|state| {
            state.thread_counter = 1;
            state.counters.clear();
            state.semaphores.clear();
            state.threads.clear();

            let id = state.next_thread_id();
            let mut idle = Thread::new("idle", id, i32::MIN);
            let mut stack = Stack::new(IDLE_THREAD_STACK_SIZE);
            let frame = A::new_frame(idle_entry::<A>, core::ptr::null_mut(), stack.top());
            idle.attach_context(frame, stack);
            idle.set_state(ThreadState::Running);
            let _ = state.threads.insert(idle);
        });

        self.current.store(core::ptr::null_mut(), Ordering::Release);
        self.initialized.store(true, Ordering::Release);
        log::trace!("kernel initialized");
    }

    /// Release every counter, semaphore and thread descriptor.
    pub fn free(&self) {
        self.locked(|state| {
            state.counters.clear();
            state.semaphores.clear();
            state.threads.clear();
        });
        self.current.store(core::ptr::null_mut(), Ordering::Release);
        self.initialized.store(false, Ordering::Release);
        log::trace!("kernel torn down");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Adopt the boot context as the main thread.
    ///
    /// The frame and the stack it runs on belong to the boot environment;
    /// destroying the main thread never frees them.
    pub fn register_main(&self, frame: *mut A::Frame) {
        self.locked(|state| {
            let id = state.next_thread_id();
            let mut main = Thread::new("main", id, 0);
            main.adopt_boot_context(frame);
            main.set_state(ThreadState::Running);
            let _ = state.threads.insert(main);
            log::trace!("main thread registered as id {}", id);
        });
        self.current.store(frame, Ordering::Release);
    }

    /// Timer-tick entry: keep the current thread unless it is no longer
    /// schedulable. Called with interrupts masked.
    pub fn timer_tick(&self, current: *mut A::Frame) -> *mut A::Frame {
        let state = self.state.lock();
        let next = sched::schedule(&state.threads, current, ScheduleRequest::Current);
        drop(state);
        self.current.store(next, Ordering::Release);
        next
    }

    /// Software-trap entry: apply the syscall, then reschedule as the
    /// syscall requests. Called with interrupts masked. The returned frame
    /// is the context to resume.
    pub fn software_trap(&self, current: *mut A::Frame, which: u32) -> *mut A::Frame {
        let mut state = self.state.lock();
        let request = syscall::trap_dispatch(&mut state, current, which);
        let next = sched::schedule(&state.threads, current, request);
        drop(state);
        self.current.store(next, Ordering::Release);
        next
    }

    /// The most recently installed context.
    pub fn current_context(&self) -> *mut A::Frame {
        self.current.load(Ordering::Acquire)
    }

    /// Create a thread in the `Stopped` state.
    ///
    /// The thread gets its own stack and a saved frame that enters a
    /// trampoline; the trampoline calls `entry(arg)`, records the return
    /// value, marks the thread Finished and yields away for good.
    pub fn thread_create(
        &self,
        name: &str,
        entry: ThreadEntry,
        arg: *mut (),
    ) -> Result<u32, SpawnError> {
        if !self.is_initialized() {
            return Err(SpawnError::NotInitialized);
        }

        let kernel = self as *const Kernel<A>;
        self.locked(|state| {
            if !state.threads.has_capacity() {
                return Err(SpawnError::TooManyThreads);
            }

            let id = state.next_thread_id();
            let mut thread = Thread::new(name, id, 0);
            let mut stack = Stack::new(THREAD_STACK_SIZE);
            let run = Box::new(RunContext::<A> {
                kernel,
                thread_id: id,
                entry,
                arg,
            });
            let frame = A::new_frame(
                thread_trampoline::<A>,
                Box::into_raw(run) as *mut (),
                stack.top(),
            );
            thread.attach_context(frame, stack);
            let _ = state.threads.insert(thread);

            log::trace!("thread {} created", id);
            Ok(id)
        })
    }

    /// Free a thread descriptor outright, from any state. No join
    /// bookkeeping happens; waiters and held handles are the caller's
    /// responsibility.
    pub fn thread_destroy(&self, id: u32) {
        self.locked(|state| {
            if state.threads.remove_by_id(id).is_some() {
                log::trace!("thread {} destroyed", id);
            }
        });
    }

    /// Info snapshot for a thread; zero-filled for unknown ids.
    pub fn thread_info(&self, id: u32) -> ThreadInfo {
        self.locked(|state| {
            state
                .threads
                .find_by_id(id)
                .map(Thread::info)
                .unwrap_or_default()
        })
    }

    /// Make a stopped thread schedulable.
    pub fn thread_start(&self, id: u32) {
        A::trap(numbers::SYS_THREAD_START, id, 0);
    }

    /// Make a running thread unschedulable. Its descriptor stays intact.
    pub fn thread_stop(&self, id: u32) {
        A::trap(numbers::SYS_THREAD_STOP, id, 0);
    }

    /// Change a thread's priority.
    pub fn thread_set_priority(&self, id: u32, priority: i32) {
        A::trap(numbers::SYS_THREAD_PRIORITY, id, priority as u32);
    }

    /// Give up the CPU to another runnable thread in the same band, if any.
    pub fn thread_yield(&self) {
        A::trap(numbers::SYS_THREAD_YIELD, 0, 0);
    }

    /// The calling thread's id, or 0 if the current context is unknown.
    pub fn thread_id(&self) -> u32 {
        A::trap(numbers::SYS_THREAD_ID, 0, 0)
    }

    /// Wait for `id` to finish and collect its return value.
    pub fn thread_join(&self, id: u32) -> *mut () {
        A::trap(numbers::SYS_THREAD_JOIN, id, 0) as usize as *mut ()
    }

    /// Allocate a global counter, or `None` when the table is full.
    pub fn counter_init(&self, initial: u32) -> Option<CounterHandle> {
        self.locked(|state| state.counters.init(initial))
    }

    /// Release a global counter. Unknown handles are ignored.
    pub fn counter_free(&self, handle: CounterHandle) {
        self.locked(|state| state.counters.free(handle));
    }

    pub fn counter_increment(&self, handle: CounterHandle) {
        A::trap(numbers::SYS_GLOBAL_COUNTER_INCREMENT, handle.as_raw(), 0);
    }

    pub fn counter_decrement(&self, handle: CounterHandle) {
        A::trap(numbers::SYS_GLOBAL_COUNTER_DECREMENT, handle.as_raw(), 0);
    }

    /// Current counter value, or 0 for unknown handles.
    pub fn counter_value(&self, handle: CounterHandle) -> u32 {
        A::trap(numbers::SYS_GLOBAL_COUNTER_VALUE, handle.as_raw(), 0)
    }

    /// Allocate a semaphore with `max` permits, all available.
    pub fn semaphore_init(&self, max: u32) -> Option<SemaphoreHandle> {
        self.locked(|state| state.semaphores.init(max))
    }

    /// Release a semaphore. Threads still blocked on it stay blocked; that
    /// is the caller's contract.
    pub fn semaphore_free(&self, handle: SemaphoreHandle) {
        self.locked(|state| state.semaphores.free(handle));
    }

    /// Take a permit, blocking the calling thread until one is available.
    pub fn semaphore_acquire(&self, handle: SemaphoreHandle) {
        A::trap(numbers::SYS_SEMAPHORE_ACQUIRE, handle.as_raw(), 0);
    }

    /// Return a permit, waking the first blocked waiter if there is one.
    pub fn semaphore_release(&self, handle: SemaphoreHandle) {
        A::trap(numbers::SYS_SEMAPHORE_RELEASE, handle.as_raw(), 0);
    }

    /// Record a finished thread's return value and hand it to every thread
    /// blocked joining it. Called by the trampoline in thread context.
    ///
    /// All concurrent joiners of a live target wake with the same return
    /// value; leaving any of them Waiting would strand them for good, since
    /// nothing else ever revisits a join link.
    pub(crate) fn thread_finish(&self, id: u32, retval: *mut ()) {
        self.locked(|state| {
            let mut joined = false;
            for joiner in state.threads.joiners_of(id) {
                joiner.set_joining(None);
                joiner.set_state(ThreadState::Running);
                if let Some(frame) = joiner.frame_mut() {
                    frame.set_gp(RETURN_SLOT, retval as usize as u32);
                }
                joined = true;
            }

            if let Some(thread) = state.threads.find_by_id_mut(id) {
                thread.set_retval(retval);
                thread.set_state(if joined {
                    ThreadState::Zombie
                } else {
                    ThreadState::Finished
                });
            }
            log::trace!("thread {} finished", id);
        });
    }

    /// Hosted trap path: stage the arguments into the installed context,
    /// dispatch, and read back the return slot.
    fn trap_from_current(&self, which: u32, arg0: u32, arg1: u32) -> u32 {
        let current = self.current.load(Ordering::Acquire);
        if current.is_null() {
            return 0;
        }
        unsafe {
            (*current).set_gp(ARG0_SLOT, arg0);
            (*current).set_gp(ARG1_SLOT, arg1);
        }
        self.software_trap(current, which);
        unsafe { (*current).gp(RETURN_SLOT) }
    }

    /// Run `f` on the kernel state inside the scoped critical section.
    fn locked<R>(&self, f: impl FnOnce(&mut KernelState<A>) -> R) -> R {
        let _irq = IrqGuard::<A>::new();
        let mut state = self.state.lock();
        f(&mut state)
    }

    #[cfg(test)]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut KernelState<A>) -> R) -> R {
        self.locked(f)
    }
}

impl<A: Arch> Default for Kernel<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// First code a new thread runs. Reclaims the run context, executes the
/// entry, records the outcome and yields into oblivion; it must never
/// return to the frame allocator's synthetic caller.
fn thread_trampoline<A: Arch>(raw: *mut ()) -> *mut () {
    // Safety: `raw` is the Box<RunContext> produced in thread_create, handed
    // to exactly one trampoline invocation.
    let run = unsafe { Box::from_raw(raw as *mut RunContext<A>) };
    // Safety: the kernel outlives every thread it created.
    let kernel = unsafe { &*run.kernel };
    let id = run.thread_id;
    let entry = run.entry;
    let arg = run.arg;
    drop(run);

    let retval = entry(arg);
    kernel.thread_finish(id, retval);

    loop {
        A::trap(numbers::SYS_THREAD_YIELD, 0, 0);
    }
}

/// Idle thread body: yield forever at the bottom of the priority range.
fn idle_entry<A: Arch>(_arg: *mut ()) -> *mut () {
    loop {
        A::trap(numbers::SYS_THREAD_YIELD, 0, 0);
    }
}
