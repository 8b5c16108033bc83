#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Bare-metal microkernel core for arcade cabinet hardware.
//!
//! Two subsystems carry the weight here:
//!
//! - A fixed-capacity thread table with a priority-banded round-robin
//!   scheduler and a trap-based syscall surface, entered from the timer tick
//!   and from explicit software traps. The scheduler itself is a pure
//!   function; an always-running idle thread guarantees it has a choice.
//! - A sequenced message codec that fragments payloads into fixed-MTU
//!   packets and reassembles them from a best-effort transport's peek
//!   window, tolerating loss-free reordering and interleaving.
//!
//! The interrupt controller, context save/restore and the packet transport
//! itself are platform collaborators, reached through the [`arch::Arch`] and
//! [`message::PacketTransport`] seams. [`arch::HostedArch`] and
//! [`message::LoopbackTransport`] serve hosted builds and the test suite.
//!
//! # Quick start
//!
//! ```ignore
//! use arcade_kernel::{Kernel, HostedArch};
//! use spin::Lazy;
//!
//! static KERNEL: Lazy<Kernel<HostedArch>> = Lazy::new(Kernel::new);
//!
//! fn worker(_arg: *mut ()) -> *mut () {
//!     core::ptr::null_mut()
//! }
//!
//! fn main_thread() {
//!     KERNEL.init();
//!     let id = KERNEL.thread_create("worker", worker, core::ptr::null_mut()).unwrap();
//!     KERNEL.thread_start(id);
//!     KERNEL.thread_yield();
//! }
//! ```

pub mod arch;
pub mod config;
pub mod counter;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod message;
pub mod sched;
pub mod semaphore;
pub mod syscall;
pub mod thread;

#[cfg(test)]
mod tests;

#[cfg(test)]
extern crate std;

extern crate alloc;

// Panic handler for bare-metal builds; hosted builds and the test suite
// bring their own.
#[cfg(all(not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Platform seam
pub use arch::{Arch, HostedArch, IrqGuard, SavedFrame, ThreadEntry};

// Kernel
pub use kernel::Kernel;

// Scheduler
pub use sched::{schedule, ScheduleRequest};

// Threads
pub use thread::{ThreadInfo, ThreadState};

// Synchronization
pub use counter::CounterHandle;
pub use semaphore::SemaphoreHandle;

// Messaging
pub use message::{LoopbackTransport, Message, MessageHeader, Messenger, PacketTransport};

// Errors
pub use errors::{KernelError, KernelResult, MessageError, SpawnError, TransportError};
