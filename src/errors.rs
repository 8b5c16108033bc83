//! Error types for kernel and messaging operations.
//!
//! Errors are returned as values; nothing in the core panics or unwinds.

use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Top-level error type covering every subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread creation errors.
    Spawn(SpawnError),
    /// Message codec errors.
    Message(MessageError),
}

/// Errors that can occur while creating a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The kernel has not been initialized yet.
    NotInitialized,
    /// Every descriptor slot in the thread table is occupied.
    TooManyThreads,
}

/// Errors produced by the message codec.
///
/// Each variant has a stable on-wire ABI code used by peers that still speak
/// the C convention; see [`MessageError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    /// The payload exceeds the 16-bit total-length field.
    TooLarge,
    /// The transport rejected one of the fragments. Fragments already
    /// handed to the transport are not revoked.
    TransportFailed,
    /// No complete message is waiting in the receive window. Idempotent;
    /// nothing is consumed.
    NotReady,
}

impl MessageError {
    /// The negative ABI code for this error (success is 0).
    pub fn code(self) -> i32 {
        match self {
            MessageError::TooLarge => -3,
            MessageError::TransportFailed => -4,
            MessageError::NotReady => -5,
        }
    }
}

/// The packet transport refused a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportError;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Spawn(e) => write!(f, "thread spawn error: {}", e),
            KernelError::Message(e) => write!(f, "message error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotInitialized => write!(f, "kernel not initialized"),
            SpawnError::TooManyThreads => write!(f, "thread table is full"),
        }
    }
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::TooLarge => write!(f, "payload exceeds maximum message length"),
            MessageError::TransportFailed => write!(f, "packet transport send failed"),
            MessageError::NotReady => write!(f, "no complete message in the receive window"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "packet transport rejected the send")
    }
}

impl From<SpawnError> for KernelError {
    fn from(error: SpawnError) -> Self {
        KernelError::Spawn(error)
    }
}

impl From<MessageError> for KernelError {
    fn from(error: MessageError) -> Self {
        KernelError::Message(error)
    }
}
