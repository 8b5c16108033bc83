//! Thread descriptors and the fixed-capacity thread table.

use crate::arch::Arch;
use crate::config::{MAX_THREADS, THREAD_NAME_LENGTH};
use crate::mem::Stack;
use crate::semaphore::SemaphoreHandle;
use alloc::boxed::Box;
use alloc::string::String;

/// Lifecycle state of a thread descriptor.
///
/// `Running` means schedulable; several threads are `Running` at once and
/// the scheduler round-robins among the highest-priority band of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Not yet started, or explicitly stopped.
    Stopped,
    /// Schedulable.
    Running,
    /// Entry function returned; return value is waiting to be joined.
    Finished,
    /// Finished and joined; only destruction remains.
    Zombie,
    /// Blocked on a semaphore or a join.
    Waiting,
}

/// Snapshot of a thread returned by info queries.
///
/// Unknown ids produce the zero-filled default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Thread name, truncated at creation.
    pub name: String,
    /// Scheduling priority.
    pub priority: i32,
    /// True while the descriptor can still run or be started.
    pub alive: bool,
    /// True while the descriptor is schedulable.
    pub running: bool,
}

/// A thread descriptor slot.
///
/// The descriptor owns its saved frame and stack unless it is the main
/// thread, whose context and stack belong to the boot environment.
#[derive(Debug)]
pub struct Thread<A: Arch> {
    name: String,
    id: u32,
    priority: i32,
    state: ThreadState,
    waiting_semaphore: Option<SemaphoreHandle>,
    joining: Option<u32>,
    main_thread: bool,
    frame: *mut A::Frame,
    stack: Option<Stack>,
    retval: *mut (),
}

// Descriptors only move between contexts under the kernel lock with
// interrupts masked; the raw frame and return-value pointers are never
// shared outside it.
unsafe impl<A: Arch> Send for Thread<A> {}

impl<A: Arch> Thread<A> {
    /// Create a descriptor in the `Stopped` state with no context attached.
    pub fn new(name: &str, id: u32, priority: i32) -> Self {
        let mut bounded = String::new();
        for c in name.chars() {
            if bounded.len() + c.len_utf8() > THREAD_NAME_LENGTH {
                break;
            }
            bounded.push(c);
        }

        Self {
            name: bounded,
            id,
            priority,
            state: ThreadState::Stopped,
            waiting_semaphore: None,
            joining: None,
            main_thread: false,
            frame: core::ptr::null_mut(),
            stack: None,
            retval: core::ptr::null_mut(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    /// True while the thread can still run or be started.
    pub fn is_alive(&self) -> bool {
        matches!(
            self.state,
            ThreadState::Stopped | ThreadState::Running | ThreadState::Waiting
        )
    }

    pub fn is_main(&self) -> bool {
        self.main_thread
    }

    /// Semaphore this thread is blocked on, if any.
    pub fn waiting_semaphore(&self) -> Option<SemaphoreHandle> {
        self.waiting_semaphore
    }

    pub fn set_waiting_semaphore(&mut self, handle: Option<SemaphoreHandle>) {
        self.waiting_semaphore = handle;
    }

    /// Id of the thread this one is joining, if any.
    pub fn joining(&self) -> Option<u32> {
        self.joining
    }

    pub fn set_joining(&mut self, id: Option<u32>) {
        self.joining = id;
    }

    pub fn retval(&self) -> *mut () {
        self.retval
    }

    pub fn set_retval(&mut self, retval: *mut ()) {
        self.retval = retval;
    }

    /// Attach an owned saved frame and stack. The descriptor frees both on
    /// destruction.
    pub fn attach_context(&mut self, frame: Box<A::Frame>, stack: Stack) {
        self.frame = Box::into_raw(frame);
        self.stack = Some(stack);
    }

    /// Adopt an externally owned frame as the main thread's context. The
    /// frame and the boot stack are never freed by the table.
    pub fn adopt_boot_context(&mut self, frame: *mut A::Frame) {
        self.frame = frame;
        self.main_thread = true;
    }

    /// Raw pointer to the saved frame; the scheduler's identity for this
    /// thread. Null only before a context is attached.
    pub fn frame_ptr(&self) -> *mut A::Frame {
        self.frame
    }

    /// Mutable access to the saved frame, if one is attached.
    pub fn frame_mut(&mut self) -> Option<&mut A::Frame> {
        if self.frame.is_null() {
            None
        } else {
            // Owned by this descriptor (or by the boot environment, which
            // outlives the table); exclusive by the kernel lock.
            Some(unsafe { &mut *self.frame })
        }
    }

    /// Info snapshot for this descriptor.
    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            name: self.name.clone(),
            priority: self.priority,
            alive: self.is_alive(),
            running: self.state == ThreadState::Running,
        }
    }
}

impl<A: Arch> Drop for Thread<A> {
    fn drop(&mut self) {
        if !self.main_thread && !self.frame.is_null() {
            // Reclaim the frame handed out by Arch::new_frame.
            drop(unsafe { Box::from_raw(self.frame) });
        }
        self.frame = core::ptr::null_mut();
    }
}

/// Fixed-capacity table of thread descriptors.
pub struct ThreadTable<A: Arch> {
    slots: [Option<Thread<A>>; MAX_THREADS],
}

impl<A: Arch> ThreadTable<A> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Place `thread` in the first empty slot, returning its index, or give
    /// the descriptor back when the table is full.
    pub fn insert(&mut self, thread: Thread<A>) -> Result<usize, Thread<A>> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(thread);
                return Ok(i);
            }
        }
        Err(thread)
    }

    /// Whether an empty slot remains.
    pub fn has_capacity(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Remove and return the descriptor with the given id.
    pub fn remove_by_id(&mut self, id: u32) -> Option<Thread<A>> {
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|t| t.id() == id) {
                return slot.take();
            }
        }
        None
    }

    /// Drop every descriptor.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Thread<A>> {
        self.occupied().map(|(_, t)| t).find(|t| t.id() == id)
    }

    pub fn find_by_id_mut(&mut self, id: u32) -> Option<&mut Thread<A>> {
        self.occupied_mut().map(|(_, t)| t).find(|t| t.id() == id)
    }

    /// Resolve a saved frame pointer to its owning descriptor.
    pub fn find_by_context(&self, frame: *mut A::Frame) -> Option<&Thread<A>> {
        self.find_by_context_indexed(frame).map(|(_, t)| t)
    }

    pub fn find_by_context_mut(&mut self, frame: *mut A::Frame) -> Option<&mut Thread<A>> {
        self.occupied_mut()
            .map(|(_, t)| t)
            .find(|t| !t.frame_ptr().is_null() && t.frame_ptr() == frame)
    }

    /// Resolve a saved frame pointer to (slot index, descriptor).
    pub fn find_by_context_indexed(&self, frame: *mut A::Frame) -> Option<(usize, &Thread<A>)> {
        self.occupied()
            .find(|(_, t)| !t.frame_ptr().is_null() && t.frame_ptr() == frame)
    }

    /// First thread blocked on the given semaphore, in slot order.
    pub fn first_waiting_on(&mut self, handle: SemaphoreHandle) -> Option<&mut Thread<A>> {
        self.occupied_mut().map(|(_, t)| t).find(|t| {
            t.state() == ThreadState::Waiting && t.waiting_semaphore() == Some(handle)
        })
    }

    /// Every thread joining the given id, in slot order. More than one
    /// thread may block on the same target; the finish path wakes them all.
    pub fn joiners_of(&mut self, id: u32) -> impl Iterator<Item = &mut Thread<A>> {
        self.occupied_mut()
            .map(|(_, t)| t)
            .filter(move |t| t.state() == ThreadState::Waiting && t.joining() == Some(id))
    }

    /// Occupied slots in table order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Thread<A>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|t| (i, t)))
    }

    pub fn occupied_mut(&mut self) -> impl Iterator<Item = (usize, &mut Thread<A>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|t| (i, t)))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: Arch> Default for ThreadTable<A> {
    fn default() -> Self {
        Self::new()
    }
}
