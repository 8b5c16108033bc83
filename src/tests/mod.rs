//! Cross-module test suites.
//!
//! Module-local `#[cfg(test)]` blocks cover focused units; the suites here
//! exercise the scheduler, dispatcher and codec together.

mod property;

use crate::arch::{HostedArch, HostedFrame, SavedFrame, ARG0_SLOT, ARG1_SLOT};
use crate::kernel::Kernel;
use crate::thread::ThreadState;
use alloc::boxed::Box;

/// The hosted trap handler is process-global, so kernels that install one
/// must not overlap.
static HOSTED_SERIAL: spin::Mutex<()> = spin::Mutex::new(());

/// A booted kernel: idle thread created, a synthetic boot frame adopted as
/// the main thread, and the hosted trap handler pointed at this kernel for
/// as long as the value lives.
pub(crate) struct TestKernel {
    pub(crate) kernel: &'static Kernel<HostedArch>,
    pub(crate) main_id: u32,
    pub(crate) main_frame: *mut HostedFrame,
    _serial: spin::MutexGuard<'static, ()>,
}

impl TestKernel {
    pub(crate) fn boot() -> Self {
        let serial = HOSTED_SERIAL.lock();
        let kernel: &'static Kernel<HostedArch> = Box::leak(Box::new(Kernel::new()));
        kernel.init();

        let main_frame = Box::into_raw(Box::new(HostedFrame::new()));
        kernel.register_main(main_frame);
        let main_id =
            kernel.with_state(|state| state.threads.find_by_context(main_frame).unwrap().id());

        Self {
            kernel,
            main_id,
            main_frame,
            _serial: serial,
        }
    }

    /// Create a thread with a no-op entry; it stays `Stopped` until started.
    pub(crate) fn spawn(&self, name: &str) -> u32 {
        self.kernel
            .thread_create(name, noop_entry, core::ptr::null_mut())
            .unwrap()
    }

    pub(crate) fn frame_of(&self, id: u32) -> *mut HostedFrame {
        self.kernel
            .with_state(|state| state.threads.find_by_id(id).unwrap().frame_ptr())
    }

    pub(crate) fn state_of(&self, id: u32) -> ThreadState {
        self.kernel
            .with_state(|state| state.threads.find_by_id(id).unwrap().state())
    }

    /// Write trap arguments into a thread's saved frame, as the trap vector
    /// would find them on hardware.
    pub(crate) fn stage_args(&self, id: u32, arg0: u32, arg1: u32) {
        self.kernel.with_state(|state| {
            let frame = state
                .threads
                .find_by_id_mut(id)
                .unwrap()
                .frame_mut()
                .unwrap();
            frame.set_gp(ARG0_SLOT, arg0);
            frame.set_gp(ARG1_SLOT, arg1);
        });
    }

    /// Id of the thread owning the frame the scheduler picked.
    pub(crate) fn owner_of(&self, frame: *mut HostedFrame) -> u32 {
        self.kernel
            .with_state(|state| state.threads.find_by_context(frame).unwrap().id())
    }

    /// Dispatch a trap with the main thread as the calling context and
    /// return what lands in its return slot. The main thread is never
    /// destroyed, so its frame stays valid for the kernel's lifetime.
    pub(crate) fn trap_as_main(&self, which: u32, arg0: u32, arg1: u32) -> u32 {
        self.stage_args(self.main_id, arg0, arg1);
        self.kernel.software_trap(self.main_frame, which);
        self.kernel.with_state(|state| {
            state
                .threads
                .find_by_id_mut(self.main_id)
                .unwrap()
                .frame_mut()
                .unwrap()
                .gp(crate::arch::RETURN_SLOT)
        })
    }
}

pub(crate) fn noop_entry(_arg: *mut ()) -> *mut () {
    core::ptr::null_mut()
}

/// Simple linear congruential generator for deterministic property tests.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub(crate) fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        min + (self.next_u64() % (max - min))
    }

    pub(crate) fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 0
    }
}
