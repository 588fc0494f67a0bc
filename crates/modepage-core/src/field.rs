//! Field descriptors: named bit spans inside a mode page.

use std::fmt;

use bitflags::bitflags;

use crate::bits::{self, BitsError};
use crate::pdt::PdtFilter;

bitflags! {
    /// Presentation and matching hints attached to a field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u8 {
        /// Prefer hexadecimal output.
        const HEX = 1 << 0;
        /// Shown in the short (common fields only) listing.
        const COMMON = 1 << 1;
        /// Value is a two's-complement signed integer.
        const TWOS_COMP = 1 << 2;
        /// Field shares its offset with another field of the same page that
        /// is told apart by the descriptor id.
        const CLASH_OK = 1 << 3;
    }
}

/// Immutable description of one field inside a page.
///
/// `start_byte` is relative to the first byte of the page (the byte that
/// carries the page code), not to the mode parameter header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Short name used on the command line, `None` for raw coordinates.
    pub acronym: Option<&'static str>,
    /// Owning page number.
    pub page: u8,
    /// Owning subpage number.
    pub subpage: u8,
    /// Device-type restriction.
    pub pdt: PdtFilter,
    /// Byte holding the most significant bit of the field.
    pub start_byte: usize,
    /// Bit (7 = MSB) of `start_byte` holding the field's MSB.
    pub start_bit: u8,
    /// Width in bits (1..=64).
    pub width: u8,
    /// Presentation hints.
    pub flags: FieldFlags,
    /// Descriptor id the field belongs to when [`FieldFlags::CLASH_OK`] is
    /// set.
    pub desc_id: Option<u8>,
    /// One-line description.
    pub description: &'static str,
    /// Optional longer explanation of the values.
    pub extra: Option<&'static str>,
}

impl FieldDescriptor {
    /// Describes a named field.
    #[must_use]
    pub const fn new(
        acronym: &'static str,
        page: u8,
        subpage: u8,
        start_byte: usize,
        start_bit: u8,
        width: u8,
        description: &'static str,
    ) -> Self {
        Self {
            acronym: Some(acronym),
            page,
            subpage,
            pdt: PdtFilter::Any,
            start_byte,
            start_bit,
            width,
            flags: FieldFlags::empty(),
            desc_id: None,
            description,
            extra: None,
        }
    }

    /// Describes an unnamed field given only by coordinates.
    #[must_use]
    pub const fn raw(page: u8, subpage: u8, start_byte: usize, start_bit: u8, width: u8) -> Self {
        Self {
            acronym: None,
            page,
            subpage,
            pdt: PdtFilter::Any,
            start_byte,
            start_bit,
            width,
            flags: FieldFlags::empty(),
            desc_id: None,
            description: "",
            extra: None,
        }
    }

    /// Adds presentation hints.
    #[must_use]
    pub const fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Restricts the field to one device type.
    #[must_use]
    pub const fn for_pdt(mut self, pdt: PdtFilter) -> Self {
        self.pdt = pdt;
        self
    }

    /// Ties the field to a descriptor id (implies [`FieldFlags::CLASH_OK`]).
    #[must_use]
    pub const fn with_desc_id(mut self, id: u8) -> Self {
        self.desc_id = Some(id & 0x0F);
        self.flags = self.flags.union(FieldFlags::CLASH_OK);
        self
    }

    /// Attaches a longer explanation.
    #[must_use]
    pub const fn with_extra(mut self, extra: &'static str) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Checks that the coordinates are within codec contract.
    ///
    /// # Errors
    ///
    /// Returns the [`BitsError`] describing the violated limit.
    pub const fn validate(&self) -> Result<(), BitsError> {
        match bits::span_bytes(self.start_bit, self.width) {
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Number of bytes the field touches, starting at `start_byte`.
    #[must_use]
    pub const fn span(&self) -> usize {
        match bits::span_bytes(self.start_bit, self.width) {
            Ok(len) => len,
            Err(_) => 0,
        }
    }

    /// Case-insensitive acronym comparison.
    #[must_use]
    pub fn matches_acronym(&self, acronym: &str) -> bool {
        self.acronym
            .is_some_and(|own| own.eq_ignore_ascii_case(acronym))
    }

    /// Display label: the acronym, or `byte:bit:width` for raw fields.
    #[must_use]
    pub const fn label(&self) -> FieldLabel<'_> {
        FieldLabel {
            field: self,
            instance: 0,
        }
    }

    /// Display label for descriptor instance `instance`.
    #[must_use]
    pub const fn instance_label(&self, instance: usize) -> FieldLabel<'_> {
        FieldLabel {
            field: self,
            instance,
        }
    }
}

/// Display adapter naming a field (and its descriptor instance).
#[derive(Debug, Clone, Copy)]
pub struct FieldLabel<'a> {
    field: &'a FieldDescriptor,
    instance: usize,
}

impl fmt::Display for FieldLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field.acronym {
            Some(acronym) => f.write_str(acronym)?,
            None => write!(
                f,
                "{}:{}:{}",
                self.field.start_byte, self.field.start_bit, self.field.width
            )?,
        }
        if self.instance > 0 {
            write!(f, ".{}", self.instance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldDescriptor, FieldFlags};
    use crate::bits::BitsError;

    const WCE: FieldDescriptor = FieldDescriptor::new("WCE", 0x08, 0, 2, 2, 1, "Write cache enable")
        .with_flags(FieldFlags::COMMON);

    #[test]
    fn acronym_matching_ignores_case() {
        assert!(WCE.matches_acronym("wce"));
        assert!(WCE.matches_acronym("WCE"));
        assert!(!WCE.matches_acronym("RCD"));
        assert!(!FieldDescriptor::raw(0x08, 0, 2, 2, 1).matches_acronym("WCE"));
    }

    #[test]
    fn labels_name_acronym_or_coordinates() {
        assert_eq!(WCE.label().to_string(), "WCE");
        assert_eq!(WCE.instance_label(2).to_string(), "WCE.2");
        assert_eq!(
            FieldDescriptor::raw(0x08, 0, 12, 7, 16).label().to_string(),
            "12:7:16"
        );
    }

    #[test]
    fn desc_id_implies_clash_ok() {
        let field = FieldDescriptor::new("X", 0x19, 1, 8, 3, 4, "x").with_desc_id(0x12);
        assert_eq!(field.desc_id, Some(0x2));
        assert!(field.flags.contains(FieldFlags::CLASH_OK));
    }

    #[test]
    fn validate_rejects_zero_width() {
        assert_eq!(
            FieldDescriptor::raw(0x08, 0, 2, 7, 0).validate(),
            Err(BitsError::InvalidWidth { width: 0 })
        );
        assert_eq!(WCE.span(), 1);
    }
}
