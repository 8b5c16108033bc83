//! On-wire fragment header.
//!
//! Every fragment starts with this 8-byte little-endian header; the layout
//! is fixed by the deployed cabinet fleet and must not change.
//!
//! ```text
//!  0.. 2  msg_type      application-defined message type code
//!  2.. 4  sequence      per-message id; 0 reserved as "invalid"
//!  4.. 6  total_length  bytes in the full message
//!  6.. 8  offset        byte offset of this fragment's payload
//! ```

use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// The 8-byte header in front of every fragment's payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromZeroes, FromBytes, AsBytes)]
pub struct MessageHeader {
    pub msg_type: U16<LittleEndian>,
    pub sequence: U16<LittleEndian>,
    pub total_length: U16<LittleEndian>,
    pub offset: U16<LittleEndian>,
}

static_assertions::assert_eq_size!(MessageHeader, [u8; 8]);

impl MessageHeader {
    pub fn new(msg_type: u16, sequence: u16, total_length: u16, offset: u16) -> Self {
        Self {
            msg_type: U16::new(msg_type),
            sequence: U16::new(sequence),
            total_length: U16::new(total_length),
            offset: U16::new(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_byte_layout() {
        let header = MessageHeader::new(0x1234, 0x0001, 0x0102, 0x00F5);
        assert_eq!(
            header.as_bytes(),
            &[0x34, 0x12, 0x01, 0x00, 0x02, 0x01, 0xF5, 0x00]
        );
    }

    #[test]
    fn test_header_parse() {
        let bytes = [0x34, 0x12, 0x07, 0x00, 0x05, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        let header = MessageHeader::read_from_prefix(&bytes[..]).unwrap();
        assert_eq!(header.msg_type.get(), 0x1234);
        assert_eq!(header.sequence.get(), 7);
        assert_eq!(header.total_length.get(), 5);
        assert_eq!(header.offset.get(), 0);
    }

    #[test]
    fn test_header_parse_short_input() {
        assert!(MessageHeader::read_from_prefix(&[0u8; 7][..]).is_none());
    }
}
