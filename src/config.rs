//! Compile-time tunables for the kernel core.
//!
//! The tables in this kernel are all fixed capacity; there is no dynamic
//! growth. Sizes here are chosen for the target cabinet hardware and can be
//! adjusted at build time.

/// Maximum number of live thread descriptors, including main and idle.
pub const MAX_THREADS: usize = 64;

/// Maximum number of allocated global counters.
pub const MAX_GLOBAL_COUNTERS: usize = 64;

/// Maximum number of allocated semaphores.
pub const MAX_SEMAPHORES: usize = 64;

/// Number of slots in the packet transport's receive window.
///
/// Sized so that a maximum-length message split into minimum-capacity
/// fragments still fits the window in one piece.
pub const MAX_OUTSTANDING_PACKETS: usize = 512;

/// Stack size for threads created through [`crate::kernel::Kernel::thread_create`].
pub const THREAD_STACK_SIZE: usize = 32 * 1024;

/// Stack size for the idle thread. Its entry is a bare yield loop.
pub const IDLE_THREAD_STACK_SIZE: usize = 256;

/// Transport MTU: the largest packet the transport will accept.
pub const MAX_PACKET_LENGTH: usize = 253;

/// Largest payload a single logical message may carry (u16 total_length).
pub const MAX_MESSAGE_LENGTH: usize = 0xFFFF;

/// Bytes of framing in front of every fragment's payload.
pub const MESSAGE_HEADER_LENGTH: usize = 8;

/// Thread name bound, excluding any terminator.
pub const THREAD_NAME_LENGTH: usize = 63;
