//! Length-prefixed, sequenced message reassembly over a best-effort packet
//! transport.
//!
//! The sender splits a payload into MTU-sized fragments, each tagged with
//! (type, sequence, total length, offset). The receiver holds no state
//! between calls: every [`Messenger::recv`] rebuilds its picture of the
//! in-flight sequences from the transport's peek window, then extracts and
//! consumes the first sequence that is fully present. Fragments of a
//! sequence that never completes stay in the window until the transport
//! evicts them; this layer never gives up on them.

pub mod transport;
pub mod wire;

pub use transport::{LoopbackTransport, PacketTransport};
pub use wire::MessageHeader;

use crate::config::{MAX_MESSAGE_LENGTH, MAX_OUTSTANDING_PACKETS, MAX_PACKET_LENGTH, MESSAGE_HEADER_LENGTH};
use crate::errors::MessageError;
use alloc::vec;
use alloc::vec::Vec;
use zerocopy::AsBytes;
use zerocopy::FromBytes;

/// A reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Application-defined type code.
    pub msg_type: u16,
    /// The payload; empty for zero-length messages.
    pub data: Vec<u8>,
}

/// Fragmenting sender and reassembling receiver over one transport.
///
/// `MTU` is the transport's packet ceiling; each fragment carries up to
/// `MTU - 8` payload bytes. The default matches the cabinet transport.
pub struct Messenger<T: PacketTransport, const MTU: usize = MAX_PACKET_LENGTH> {
    transport: T,
    sequence: u16,
}

impl<T: PacketTransport, const MTU: usize> Messenger<T, MTU> {
    /// Payload bytes per fragment. Underflows at compile time if `MTU`
    /// cannot even fit the header.
    const DATA_CAPACITY: usize = MTU - MESSAGE_HEADER_LENGTH;

    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sequence: 1,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Fragment `payload` and hand every piece to the transport.
    ///
    /// A zero-length payload still produces one header-only fragment. If the
    /// transport rejects a fragment the send aborts; fragments already sent
    /// are not unwound. The sequence counter only advances after a fully
    /// transmitted message.
    pub fn send(&mut self, msg_type: u16, payload: &[u8]) -> Result<(), MessageError> {
        if payload.len() > MAX_MESSAGE_LENGTH {
            return Err(MessageError::TooLarge);
        }

        let mut buffer = [0u8; MTU];
        let mut offset = 0usize;
        let mut fragments = 0usize;
        loop {
            let chunk = Self::DATA_CAPACITY.min(payload.len() - offset);
            let header = MessageHeader::new(
                msg_type,
                self.sequence,
                payload.len() as u16,
                offset as u16,
            );
            buffer[..MESSAGE_HEADER_LENGTH].copy_from_slice(header.as_bytes());
            buffer[MESSAGE_HEADER_LENGTH..MESSAGE_HEADER_LENGTH + chunk]
                .copy_from_slice(&payload[offset..offset + chunk]);

            self.transport
                .send(&buffer[..MESSAGE_HEADER_LENGTH + chunk])
                .map_err(|_| MessageError::TransportFailed)?;

            fragments += 1;
            offset += Self::DATA_CAPACITY;
            if offset >= payload.len() {
                break;
            }
        }

        log::trace!(
            "message seq {} sent in {} fragment(s)",
            self.sequence,
            fragments
        );
        self.sequence = next_sequence(self.sequence);
        Ok(())
    }

    /// Deliver the first fully received message, or [`MessageError::NotReady`].
    ///
    /// Undersized fragments and fragments with the reserved sequence 0 are
    /// discarded on sight. Fragments of incomplete sequences are left in
    /// place; eviction of stragglers is the transport's concern, not ours.
    pub fn recv(&mut self) -> Result<Message, MessageError> {
        // Pass 1: classify every pending fragment by sequence, in order of
        // first appearance.
        let mut pending: Vec<PendingMessage> = Vec::new();
        for slot in 0..MAX_OUTSTANDING_PACKETS {
            let header = match self.transport.peek(slot) {
                None => continue,
                Some(packet) => MessageHeader::read_from_prefix(packet),
            };
            let Some(header) = header else {
                self.transport.discard(slot);
                continue;
            };
            let sequence = header.sequence.get();
            if sequence == 0 {
                self.transport.discard(slot);
                continue;
            }

            let position = header.offset.get() as usize / Self::DATA_CAPACITY;
            match pending.iter_mut().find(|p| p.sequence == sequence) {
                Some(entry) => entry.fragments.set(position),
                None => {
                    let total_length = header.total_length.get();
                    let mut fragments =
                        FragmentMap::new(Self::fragments_needed(total_length));
                    fragments.set(position);
                    pending.push(PendingMessage {
                        sequence,
                        total_length,
                        fragments,
                    });
                }
            }
        }

        // Pass 2: extract the first complete sequence.
        for entry in &pending {
            if !entry.fragments.is_complete() {
                continue;
            }

            let total = entry.total_length as usize;
            let mut data = vec![0u8; total];
            let mut msg_type = 0u16;

            for slot in 0..MAX_OUTSTANDING_PACKETS {
                let mut fragment = [0u8; MTU];
                let fragment_len;
                let header;
                match self.transport.peek(slot) {
                    Some(packet) if packet.len() >= MESSAGE_HEADER_LENGTH => {
                        let Some(h) = MessageHeader::read_from_prefix(packet) else {
                            continue;
                        };
                        if h.sequence.get() != entry.sequence {
                            continue;
                        }
                        header = h;
                        fragment_len = packet.len().min(MTU);
                        fragment[..fragment_len].copy_from_slice(&packet[..fragment_len]);
                    }
                    _ => continue,
                }

                msg_type = header.msg_type.get();
                if total > 0 {
                    let offset = header.offset.get() as usize;
                    if offset < total {
                        let payload = &fragment[MESSAGE_HEADER_LENGTH..fragment_len];
                        let end = total.min(offset + payload.len());
                        data[offset..end].copy_from_slice(&payload[..end - offset]);
                    }
                }
                self.transport.discard(slot);
            }

            log::debug!(
                "message seq {} reassembled ({} bytes)",
                entry.sequence,
                total
            );
            return Ok(Message { msg_type, data });
        }

        Err(MessageError::NotReady)
    }

    #[cfg(test)]
    pub(crate) fn set_sequence(&mut self, sequence: u16) {
        self.sequence = sequence;
    }

    #[cfg(test)]
    pub(crate) fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Fragments a message of `total_length` bytes occupies on the wire,
    /// not counting the lone fragment of a zero-length message.
    fn fragments_needed(total_length: u16) -> usize {
        let total = total_length as usize;
        total.div_ceil(Self::DATA_CAPACITY)
    }
}

/// Transient reassembly record for one sequence; rebuilt on every receive.
struct PendingMessage {
    sequence: u16,
    total_length: u16,
    fragments: FragmentMap,
}

/// Which fragment positions of a message have been seen.
struct FragmentMap {
    words: Vec<u32>,
    needed: usize,
}

impl FragmentMap {
    fn new(needed: usize) -> Self {
        Self {
            words: vec![0; needed.div_ceil(32)],
            needed,
        }
    }

    /// Mark position `index` as received. Positions past the end (from a
    /// corrupt offset field) are ignored rather than miscounted.
    fn set(&mut self, index: usize) {
        if index < self.needed {
            self.words[index / 32] |= 1 << (index % 32);
        }
    }

    fn is_complete(&self) -> bool {
        (0..self.needed).all(|i| self.words[i / 32] & (1 << (i % 32)) != 0)
    }
}

/// Advance the message sequence counter, skipping the reserved value 0.
fn next_sequence(sequence: u16) -> u16 {
    let next = sequence.wrapping_add(1);
    if next == 0 {
        1
    } else {
        next
    }
}
