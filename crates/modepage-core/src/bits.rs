//! Bit-addressed big-endian field codec.
//!
//! A field is addressed by `(start_byte, start_bit, width)`: its most
//! significant bit is bit `start_bit` (7 = MSB) of `buf[start_byte]`, and it
//! continues through less significant bits into the following bytes. Values
//! are unsigned and zero-extended to 64 bits.

use std::fmt;

use thiserror::Error;

/// Widest field the codec can address.
pub const MAX_FIELD_WIDTH: u8 = 64;

/// Widths whose all-ones pattern is used as an "unbounded"/"not applicable"
/// sentinel by the protocol.
pub const SENTINEL_WIDTHS: [u8; 6] = [8, 16, 24, 32, 48, 64];

/// Widths that may be rendered as two's-complement values.
pub const SIGNED_WIDTHS: [u8; 6] = [4, 8, 16, 24, 32, 64];

/// Caller contract violations rejected by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BitsError {
    /// Width outside `1..=64`.
    #[error("field width {width} is outside 1..=64")]
    InvalidWidth {
        /// Requested width in bits.
        width: u8,
    },
    /// Start bit outside `0..=7`.
    #[error("start bit {start_bit} is outside 0..=7")]
    InvalidStartBit {
        /// Requested start bit.
        start_bit: u8,
    },
    /// Field span runs past the end of the buffer.
    #[error("field at byte {start_byte} spanning {span} bytes exceeds buffer of {len} bytes")]
    OutOfBounds {
        /// First byte of the field.
        start_byte: usize,
        /// Number of bytes the field touches.
        span: usize,
        /// Buffer length.
        len: usize,
    },
}

/// Returns a mask with the low `width` bits set (`width` 0..=64).
#[must_use]
pub const fn mask(width: u8) -> u64 {
    if width >= MAX_FIELD_WIDTH {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Returns the number of bytes touched by a field starting at `start_bit`.
///
/// # Errors
///
/// Returns [`BitsError::InvalidWidth`] or [`BitsError::InvalidStartBit`] for
/// out-of-contract coordinates.
pub const fn span_bytes(start_bit: u8, width: u8) -> Result<usize, BitsError> {
    if width == 0 || width > MAX_FIELD_WIDTH {
        return Err(BitsError::InvalidWidth { width });
    }
    if start_bit > 7 {
        return Err(BitsError::InvalidStartBit { start_bit });
    }
    let total = (7 - start_bit) as usize + width as usize;
    Ok(total.div_ceil(8))
}

/// Validated location of a field inside a concrete buffer.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    len: usize,
    shift: u32,
    mask: u128,
}

fn locate(buf_len: usize, start_byte: usize, start_bit: u8, width: u8) -> Result<Span, BitsError> {
    let len = span_bytes(start_bit, width)?;
    let fits = start_byte
        .checked_add(len)
        .is_some_and(|end| end <= buf_len);
    if !fits {
        return Err(BitsError::OutOfBounds {
            start_byte,
            span: len,
            len: buf_len,
        });
    }
    let total = (7 - u32::from(start_bit)) + u32::from(width);
    #[allow(clippy::cast_possible_truncation)]
    let shift = (len as u32) * 8 - total;
    Ok(Span {
        start: start_byte,
        len,
        shift,
        mask: u128::from(mask(width)),
    })
}

fn load(buf: &[u8], span: Span) -> u128 {
    buf[span.start..span.start + span.len]
        .iter()
        .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte))
}

/// Reads `width` bits whose MSB is bit `start_bit` of `buf[start_byte]`.
///
/// # Errors
///
/// Returns a [`BitsError`] when the coordinates are out of contract or the
/// field does not fit inside `buf`.
pub fn get_bits(buf: &[u8], start_byte: usize, start_bit: u8, width: u8) -> Result<u64, BitsError> {
    let span = locate(buf.len(), start_byte, start_bit, width)?;
    let value = (load(buf, span) >> span.shift) & span.mask;
    #[allow(clippy::cast_possible_truncation)]
    Ok(value as u64)
}

/// Writes the low `width` bits of `value` into the addressed span.
///
/// Bits of the first and last touched bytes that lie outside the span are
/// preserved.
///
/// # Errors
///
/// Returns a [`BitsError`] when the coordinates are out of contract or the
/// field does not fit inside `buf`.
pub fn set_bits(
    value: u64,
    buf: &mut [u8],
    start_byte: usize,
    start_bit: u8,
    width: u8,
) -> Result<(), BitsError> {
    let span = locate(buf.len(), start_byte, start_bit, width)?;
    let field_mask = span.mask << span.shift;
    let merged = (load(buf, span) & !field_mask) | ((u128::from(value) << span.shift) & field_mask);
    for (index, byte) in buf[span.start..span.start + span.len]
        .iter_mut()
        .enumerate()
    {
        let shift = (span.len - 1 - index) * 8;
        #[allow(clippy::cast_possible_truncation)]
        {
            *byte = (merged >> shift) as u8;
        }
    }
    Ok(())
}

/// Returns `true` when `value` is the all-ones sentinel for `width`.
///
/// Only the canonical sentinel widths ([`SENTINEL_WIDTHS`]) qualify.
#[must_use]
pub fn is_all_ones(value: u64, width: u8) -> bool {
    SENTINEL_WIDTHS.contains(&width) && value == mask(width)
}

/// Reads a field and reports whether it holds the all-ones sentinel.
///
/// # Errors
///
/// Same as [`get_bits`].
pub fn get_bits_with_sentinel(
    buf: &[u8],
    start_byte: usize,
    start_bit: u8,
    width: u8,
) -> Result<(u64, bool), BitsError> {
    let value = get_bits(buf, start_byte, start_bit, width)?;
    Ok((value, is_all_ones(value, width)))
}

/// Reinterprets the low `width` bits of `value` as two's complement.
///
/// Returns `None` for widths outside [`SIGNED_WIDTHS`].
#[must_use]
pub fn sign_extend(value: u64, width: u8) -> Option<i64> {
    if !SIGNED_WIDTHS.contains(&width) {
        return None;
    }
    let unused = 64 - u32::from(width);
    #[allow(clippy::cast_possible_wrap)]
    let shifted = (value << unused) as i64;
    Some(shifted >> unused)
}

/// Display adapter that renders a field value as a signed decimal.
///
/// Widths without a two's-complement interpretation render unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedValue {
    /// Raw field value.
    pub value: u64,
    /// Field width in bits.
    pub width: u8,
    /// Pad to at least two digits.
    pub leading_zeros: bool,
}

impl fmt::Display for SignedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (sign_extend(self.value, self.width), self.leading_zeros) {
            (Some(signed), true) => write!(f, "{signed:02}"),
            (Some(signed), false) => write!(f, "{signed}"),
            (None, true) => write!(f, "{:02}", self.value & mask(self.width)),
            (None, false) => write!(f, "{}", self.value & mask(self.width)),
        }
    }
}

/// Renders `value` as a signed decimal string, see [`SignedValue`].
#[must_use]
pub fn render_signed(value: u64, width: u8, leading_zeros: bool) -> String {
    SignedValue {
        value,
        width,
        leading_zeros,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{
        get_bits, get_bits_with_sentinel, is_all_ones, mask, render_signed, set_bits, span_bytes,
        BitsError,
    };

    #[test]
    fn reads_top_two_bits_of_byte() {
        let buf = [0x05, 0x0A, 0b1000_0001, 0x00];
        assert_eq!(get_bits(&buf, 2, 7, 2), Ok(2));
    }

    #[test]
    fn write_preserves_neighbouring_bits() {
        let mut buf = [0x05, 0x0A, 0b1000_0001, 0x00];
        set_bits(3, &mut buf, 2, 7, 2).expect("in bounds");
        assert_eq!(buf[2], 0b1100_0001);
        assert_eq!(get_bits(&buf, 2, 7, 2), Ok(3));
    }

    #[test]
    fn multi_byte_field_spanning_unaligned_bits() {
        // 12-bit field starting at bit 3 of byte 0: low nibble of byte 0 and
        // top byte of byte 1.
        let buf = [0b1010_1011, 0b1100_1101, 0xFF];
        assert_eq!(get_bits(&buf, 0, 3, 12), Ok(0b1011_1100_1101));
    }

    #[test]
    fn full_width_field_across_nine_bytes() {
        let mut buf = [0u8; 9];
        set_bits(u64::MAX, &mut buf, 0, 3, 64).expect("in bounds");
        assert_eq!(buf[0], 0x0F);
        assert_eq!(buf[8], 0xF0);
        assert_eq!(get_bits(&buf, 0, 3, 64), Ok(u64::MAX));
    }

    #[rstest]
    #[case(0)]
    #[case(65)]
    fn rejects_out_of_contract_width(#[case] width: u8) {
        assert_eq!(
            get_bits(&[0; 16], 0, 7, width),
            Err(BitsError::InvalidWidth { width })
        );
    }

    #[test]
    fn rejects_start_bit_above_seven() {
        assert_eq!(
            span_bytes(8, 1),
            Err(BitsError::InvalidStartBit { start_bit: 8 })
        );
    }

    #[test]
    fn rejects_span_past_buffer_end() {
        assert_eq!(
            get_bits(&[0; 4], 3, 7, 16),
            Err(BitsError::OutOfBounds {
                start_byte: 3,
                span: 2,
                len: 4
            })
        );
    }

    #[rstest]
    #[case(0xFF, 8, "-1")]
    #[case(0x8, 4, "-8")]
    #[case(0x7FFF, 16, "32767")]
    #[case(0x80_0000, 24, "-8388608")]
    #[case(u64::MAX, 64, "-1")]
    #[case(0x1F, 5, "31")]
    fn signed_rendering(#[case] value: u64, #[case] width: u8, #[case] expected: &str) {
        assert_eq!(render_signed(value, width, false), expected);
    }

    #[test]
    fn signed_rendering_pads_to_two_digits() {
        assert_eq!(render_signed(5, 8, true), "05");
        assert_eq!(render_signed(0xFF, 8, true), "-1");
    }

    #[test]
    fn sentinel_only_for_canonical_widths() {
        assert!(is_all_ones(0xFF, 8));
        assert!(is_all_ones(0xFFFF_FFFF_FFFF, 48));
        assert!(!is_all_ones(0x7F, 7));
        assert!(!is_all_ones(0xFE, 8));
    }

    fn field_coordinates() -> impl Strategy<Value = (usize, u8, u8)> {
        (0usize..8, 0u8..=7, 1u8..=64)
    }

    proptest! {
        #[test]
        fn set_then_get_round_trips_and_preserves_other_bits(
            (start_byte, start_bit, width) in field_coordinates(),
            raw in any::<u64>(),
            original in prop::collection::vec(any::<u8>(), 24),
        ) {
            let value = raw & mask(width);
            let mut buf = original.clone();
            set_bits(value, &mut buf, start_byte, start_bit, width).expect("fits");
            prop_assert_eq!(get_bits(&buf, start_byte, start_bit, width), Ok(value));

            let first_bit = start_byte * 8 + (7 - usize::from(start_bit));
            let last_bit = first_bit + usize::from(width);
            for bit in 0..buf.len() * 8 {
                if bit >= first_bit && bit < last_bit {
                    continue;
                }
                let byte = bit / 8;
                let shift = 7 - (bit % 8);
                prop_assert_eq!((buf[byte] >> shift) & 1, (original[byte] >> shift) & 1);
            }
        }

        #[test]
        fn sentinel_flag_matches_all_ones_definition(
            (start_byte, start_bit, width) in field_coordinates(),
            bytes in prop::collection::vec(any::<u8>(), 24),
        ) {
            let (value, all_ones) =
                get_bits_with_sentinel(&bytes, start_byte, start_bit, width).expect("fits");
            let expected = [8u8, 16, 24, 32, 48, 64].contains(&width) && value == mask(width);
            prop_assert_eq!(all_ones, expected);
        }
    }
}
