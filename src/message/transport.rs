//! Packet transport contract and the loopback reference implementation.

use crate::config::MAX_OUTSTANDING_PACKETS;
use crate::errors::TransportError;
use alloc::vec::Vec;

/// Best-effort single-packet transport with a peek window.
///
/// The receive side is a fixed array of slots; a received packet stays
/// visible in its slot until it is explicitly discarded. There is no
/// acknowledgement and no retransmission at this layer.
pub trait PacketTransport {
    /// Send one packet of at most the transport MTU.
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// Borrow the packet in slot `slot`, if one is pending.
    fn peek(&self, slot: usize) -> Option<&[u8]>;

    /// Release slot `slot`. Releasing an empty slot is a no-op.
    fn discard(&mut self, slot: usize);
}

/// In-memory transport whose sends land in its own peek window.
///
/// Doubles as the reference for the slot semantics above and as the
/// codec's host-test harness; slots can be swapped to simulate reordered
/// delivery.
pub struct LoopbackTransport {
    window: Vec<Option<Vec<u8>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            window: (0..MAX_OUTSTANDING_PACKETS).map(|_| None).collect(),
        }
    }

    /// Number of occupied window slots.
    pub fn pending(&self) -> usize {
        self.window.iter().filter(|slot| slot.is_some()).count()
    }

    /// Exchange two slots to simulate out-of-order arrival.
    pub fn swap_slots(&mut self, a: usize, b: usize) {
        self.window.swap(a, b);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketTransport for LoopbackTransport {
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        for slot in self.window.iter_mut() {
            if slot.is_none() {
                *slot = Some(packet.to_vec());
                return Ok(());
            }
        }
        Err(TransportError)
    }

    fn peek(&self, slot: usize) -> Option<&[u8]> {
        self.window.get(slot)?.as_deref()
    }

    fn discard(&mut self, slot: usize) {
        if let Some(entry) = self.window.get_mut(slot) {
            *entry = None;
        }
    }
}
