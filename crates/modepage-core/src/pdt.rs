//! Peripheral device types and the family "decay" used for table fallback.

use std::fmt;

/// Peripheral device type reported in byte 0 (bits 4..0) of INQUIRY data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Pdt(u8);

impl Pdt {
    /// Direct-access block device (disk).
    pub const DISK: Self = Self(0x00);
    /// Sequential-access device (tape).
    pub const TAPE: Self = Self(0x01);
    /// Printer.
    pub const PRINTER: Self = Self(0x02);
    /// Processor.
    pub const PROCESSOR: Self = Self(0x03);
    /// Write-once device.
    pub const WRITE_ONCE: Self = Self(0x04);
    /// CD/DVD (multi-media) device.
    pub const MMC: Self = Self(0x05);
    /// Scanner (obsolete).
    pub const SCANNER: Self = Self(0x06);
    /// Optical memory device.
    pub const OPTICAL: Self = Self(0x07);
    /// Medium changer.
    pub const MEDIUM_CHANGER: Self = Self(0x08);
    /// Communications device (obsolete).
    pub const COMMS: Self = Self(0x09);
    /// Storage array controller.
    pub const SAC: Self = Self(0x0C);
    /// Enclosure services device.
    pub const SES: Self = Self(0x0D);
    /// Simplified direct-access device.
    pub const RBC: Self = Self(0x0E);
    /// Optical card reader/writer.
    pub const OCRW: Self = Self(0x0F);
    /// Bridge controller commands.
    pub const BCC: Self = Self(0x10);
    /// Object-based storage device.
    pub const OSD: Self = Self(0x11);
    /// Automation/drive interface.
    pub const ADC: Self = Self(0x12);
    /// Security manager device.
    pub const SMD: Self = Self(0x13);
    /// Host-managed zoned block device.
    pub const ZBC: Self = Self(0x14);
    /// Well-known logical unit.
    pub const WLUN: Self = Self(0x1E);
    /// Unknown or no device type.
    pub const UNKNOWN: Self = Self(0x1F);

    /// Builds a pdt from the low five bits of `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value & 0x1F)
    }

    /// Returns the raw 5-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Maps this pdt to the broader family whose tables it shares.
    ///
    /// Write-once, optical, RBC and ZBC devices decay to disk; printers and
    /// ADC devices decay to tape. Every other type decays to itself.
    #[must_use]
    pub const fn decay(self) -> Self {
        match self.0 {
            0x04 | 0x07 | 0x0E | 0x14 => Self::DISK,
            0x02 | 0x12 => Self::TAPE,
            _ => self,
        }
    }

    /// Short name of the device type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            0x00 => "disk",
            0x01 => "tape",
            0x02 => "printer",
            0x03 => "processor",
            0x04 => "write once",
            0x05 => "cd/dvd",
            0x06 => "scanner",
            0x07 => "optical memory",
            0x08 => "medium changer",
            0x09 => "communications",
            0x0C => "storage array controller",
            0x0D => "enclosure services",
            0x0E => "simplified direct access",
            0x0F => "optical card reader/writer",
            0x10 => "bridge controller",
            0x11 => "object based storage",
            0x12 => "automation/drive interface",
            0x13 => "security manager",
            0x14 => "zoned block",
            0x1E => "well known logical unit",
            0x1F => "unknown",
            _ => "reserved",
        }
    }
}

impl fmt::Display for Pdt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.0)
    }
}

/// Device-type restriction carried by page and field descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PdtFilter {
    /// Applies to every device type.
    #[default]
    Any,
    /// Applies only to the given device type.
    Only(Pdt),
}

impl PdtFilter {
    /// Returns `true` when a descriptor with this restriction applies to
    /// `pdt`. A query without a pdt only matches unrestricted descriptors.
    #[must_use]
    pub fn accepts(self, pdt: Option<Pdt>) -> bool {
        match (self, pdt) {
            (Self::Any, _) => true,
            (Self::Only(own), Some(pdt)) => own == pdt,
            (Self::Only(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Pdt, PdtFilter};

    #[rstest]
    #[case(Pdt::OPTICAL, Pdt::DISK)]
    #[case(Pdt::RBC, Pdt::DISK)]
    #[case(Pdt::ZBC, Pdt::DISK)]
    #[case(Pdt::WRITE_ONCE, Pdt::DISK)]
    #[case(Pdt::ADC, Pdt::TAPE)]
    #[case(Pdt::MMC, Pdt::MMC)]
    #[case(Pdt::DISK, Pdt::DISK)]
    fn decay_maps_to_family(#[case] pdt: Pdt, #[case] family: Pdt) {
        assert_eq!(pdt.decay(), family);
    }

    #[test]
    fn new_keeps_low_five_bits() {
        assert_eq!(Pdt::new(0xE5), Pdt::MMC);
    }

    #[test]
    fn filter_matching() {
        assert!(PdtFilter::Any.accepts(None));
        assert!(PdtFilter::Any.accepts(Some(Pdt::TAPE)));
        assert!(PdtFilter::Only(Pdt::TAPE).accepts(Some(Pdt::TAPE)));
        assert!(!PdtFilter::Only(Pdt::TAPE).accepts(Some(Pdt::DISK)));
        assert!(!PdtFilter::Only(Pdt::TAPE).accepts(None));
    }
}
