//! Mode parameter header handling for MODE SENSE/SELECT (6) and (10).
//!
//! Layout of the header that precedes block descriptors and the page:
//!
//! | width | mode data length | block descriptor length | header size |
//! |-------|------------------|-------------------------|-------------|
//! | 6     | byte 0           | byte 3                  | 4           |
//! | 10    | bytes 0..2       | bytes 6..8              | 8           |
//!
//! The mode data length excludes itself, so the total response length is
//! the stored value plus one (6-byte) or two (10-byte).

use crate::error::MalformedError;

/// Header length for MODE SENSE(6)/MODE SELECT(6).
pub const MODE6_HEADER_LEN: usize = 4;
/// Header length for MODE SENSE(10)/MODE SELECT(10).
pub const MODE10_HEADER_LEN: usize = 8;

/// Mode parameter header length for the command width.
#[must_use]
pub const fn header_len(six_byte: bool) -> usize {
    if six_byte {
        MODE6_HEADER_LEN
    } else {
        MODE10_HEADER_LEN
    }
}

/// Parsed mode parameter header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeHeader {
    six_byte: bool,
    mode_data_len: usize,
    block_descriptor_len: usize,
}

impl ModeHeader {
    /// Parses the header at the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedError::HeaderTooShort`] when `bytes` cannot hold
    /// the header.
    pub fn parse(bytes: &[u8], six_byte: bool) -> Result<Self, MalformedError> {
        let needed = header_len(six_byte);
        let Some(header) = bytes.get(..needed) else {
            return Err(MalformedError::HeaderTooShort {
                needed,
                len: bytes.len(),
            });
        };
        let (mode_data_len, block_descriptor_len) = if six_byte {
            (usize::from(header[0]), usize::from(header[3]))
        } else {
            (
                usize::from(u16::from_be_bytes([header[0], header[1]])),
                usize::from(u16::from_be_bytes([header[6], header[7]])),
            )
        };
        Ok(Self {
            six_byte,
            mode_data_len,
            block_descriptor_len,
        })
    }

    /// Header length.
    #[must_use]
    pub const fn header_len(&self) -> usize {
        header_len(self.six_byte)
    }

    /// Total response length declared by the header.
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.mode_data_len + if self.six_byte { 1 } else { 2 }
    }

    /// Block descriptor length.
    #[must_use]
    pub const fn block_descriptor_len(&self) -> usize {
        self.block_descriptor_len
    }

    /// Offset of the first page byte in the response.
    #[must_use]
    pub const fn page_offset(&self) -> usize {
        self.header_len() + self.block_descriptor_len
    }
}

/// Zeroes the mode data length, which is reserved in MODE SELECT.
pub fn clear_mode_data_length(response: &mut [u8], six_byte: bool) {
    let width = if six_byte { 1 } else { 2 };
    for byte in response.iter_mut().take(width) {
        *byte = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{clear_mode_data_length, ModeHeader};
    use crate::error::MalformedError;

    #[test]
    fn six_byte_header() {
        let header = ModeHeader::parse(&[0x1F, 0x00, 0x10, 0x08], true).expect("header");
        assert_eq!(header.total_len(), 0x20);
        assert_eq!(header.page_offset(), 12);
    }

    #[test]
    fn ten_byte_header() {
        let bytes = [0x01, 0x02, 0, 0, 0, 0, 0x00, 0x10];
        let header = ModeHeader::parse(&bytes, false).expect("header");
        assert_eq!(header.total_len(), 0x104);
        assert_eq!(header.block_descriptor_len(), 16);
        assert_eq!(header.page_offset(), 24);
    }

    #[test]
    fn short_header_is_malformed() {
        assert_eq!(
            ModeHeader::parse(&[0x10, 0, 0], true),
            Err(MalformedError::HeaderTooShort { needed: 4, len: 3 })
        );
    }

    #[test]
    fn clears_only_length_bytes() {
        let mut response = [0x12, 0x34, 0x56, 0x78];
        clear_mode_data_length(&mut response, false);
        assert_eq!(response, [0, 0, 0x56, 0x78]);
        let mut response = [0x12, 0x34];
        clear_mode_data_length(&mut response, true);
        assert_eq!(response, [0, 0x34]);
    }
}
