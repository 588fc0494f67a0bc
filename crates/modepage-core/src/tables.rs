//! Sample page and field tables.
//!
//! A representative subset of the SPC/SBC/SSC mode pages, the SAS
//! protocol-specific port pages and one vendor page. Callers with full
//! tables build their own [`Registry`].

use crate::descriptor::{DescriptorBlock, DescriptorCount, DescriptorStride};
use crate::field::{FieldDescriptor as F, FieldFlags};
use crate::page::PageDescriptor as P;
use crate::pdt::{Pdt, PdtFilter};
use crate::registry::{PageTable, Registry, TransportId, VendorId};

const COMMON: FieldFlags = FieldFlags::COMMON;
const HEX: FieldFlags = FieldFlags::HEX;
const TAPE: PdtFilter = PdtFilter::Only(Pdt::TAPE);

/// Generic pages.
pub static GENERIC_PAGES: [P; 7] = [
    P::new(0x01, 0x00, "rw", "Read write error recovery"),
    P::new(0x08, 0x00, "ca", "Caching"),
    P::new(0x0A, 0x00, "co", "Control"),
    P::new(0x0A, 0x01, "coe", "Control extension"),
    P::new(0x10, 0x00, "dc", "Device configuration").for_pdt(TAPE),
    P::new(0x1A, 0x00, "po", "Power condition"),
    P::new(0x1C, 0x00, "ie", "Informational exceptions control"),
];

/// Generic fields.
pub static GENERIC_FIELDS: [F; 47] = [
    F::new("AWRE", 0x01, 0, 2, 7, 1, "Automatic write reallocation enabled").with_flags(COMMON),
    F::new("ARRE", 0x01, 0, 2, 6, 1, "Automatic read reallocation enabled").with_flags(COMMON),
    F::new("TB", 0x01, 0, 2, 5, 1, "Transfer block"),
    F::new("RC", 0x01, 0, 2, 4, 1, "Read continuous"),
    F::new("EER", 0x01, 0, 2, 3, 1, "Enable early recovery"),
    F::new("PER", 0x01, 0, 2, 2, 1, "Post error").with_flags(COMMON),
    F::new("DTE", 0x01, 0, 2, 1, 1, "Data terminate on error"),
    F::new("DCR", 0x01, 0, 2, 0, 1, "Disable correction"),
    F::new("RRC", 0x01, 0, 3, 7, 8, "Read retry count"),
    F::new("WRC", 0x01, 0, 8, 7, 8, "Write retry count"),
    F::new("RTL", 0x01, 0, 10, 7, 16, "Recovery time limit (ms)"),
    F::new("IC", 0x08, 0, 2, 7, 1, "Initiator control"),
    F::new("ABPF", 0x08, 0, 2, 6, 1, "Abort pre-fetch"),
    F::new("CAP", 0x08, 0, 2, 5, 1, "Caching analysis permitted"),
    F::new("DISC", 0x08, 0, 2, 4, 1, "Discontinuity"),
    F::new("SIZE", 0x08, 0, 2, 3, 1, "Size enable"),
    F::new("WCE", 0x08, 0, 2, 2, 1, "Write cache enable").with_flags(COMMON),
    F::new("MF", 0x08, 0, 2, 1, 1, "Multiplication factor"),
    F::new("RCD", 0x08, 0, 2, 0, 1, "Read cache disable").with_flags(COMMON),
    F::new("DRRP", 0x08, 0, 3, 7, 4, "Demand read retention priority"),
    F::new("WRP", 0x08, 0, 3, 3, 4, "Write retention priority"),
    F::new("DPTL", 0x08, 0, 4, 7, 16, "Disable pre-fetch transfer length"),
    F::new("MIPF", 0x08, 0, 6, 7, 16, "Minimum pre-fetch"),
    F::new("MAPF", 0x08, 0, 8, 7, 16, "Maximum pre-fetch"),
    F::new("MAPFC", 0x08, 0, 10, 7, 16, "Maximum pre-fetch ceiling"),
    F::new("FSW", 0x08, 0, 12, 7, 1, "Force sequential write"),
    F::new("DRA", 0x08, 0, 12, 5, 1, "Disable read ahead"),
    F::new("NCS", 0x08, 0, 13, 7, 8, "Number of cache segments"),
    F::new("CSS", 0x08, 0, 14, 7, 16, "Cache segment size"),
    F::new("TST", 0x0A, 0, 2, 7, 3, "Task set type"),
    F::new("D_SENSE", 0x0A, 0, 2, 2, 1, "Descriptor format sense data").with_flags(COMMON),
    F::new("GLTSD", 0x0A, 0, 2, 1, 1, "Global logging target save disable"),
    F::new("QAM", 0x0A, 0, 3, 7, 4, "Queue algorithm modifier"),
    F::new("QERR", 0x0A, 0, 3, 2, 2, "Queue error management"),
    F::new("SWP", 0x0A, 0, 4, 3, 1, "Software write protect").with_flags(COMMON),
    F::new("BTP", 0x0A, 0, 8, 7, 16, "Busy timeout period (100us)"),
    F::new("ESTCT", 0x0A, 0, 10, 7, 16, "Extended self test completion time (s)"),
    F::new("IALUAE", 0x0A, 1, 4, 0, 1, "Implicit ALUA enable"),
    F::new("MSDL", 0x0A, 1, 6, 7, 8, "Maximum sense data length"),
    F::new("CAF", 0x10, 0, 2, 5, 1, "Change active format").for_pdt(TAPE),
    F::new("ACT_PART", 0x10, 0, 3, 7, 8, "Active partition").for_pdt(TAPE),
    F::new("IDLE", 0x1A, 0, 3, 1, 1, "Idle timer active").with_flags(COMMON),
    F::new("STANDBY", 0x1A, 0, 3, 0, 1, "Standby timer active").with_flags(COMMON),
    F::new("ICT", 0x1A, 0, 4, 7, 32, "Idle condition timer (100 ms)")
        .with_extra("0 means the device chooses"),
    F::new("SCT", 0x1A, 0, 8, 7, 32, "Standby condition timer (100 ms)"),
    F::new("DEXCPT", 0x1C, 0, 2, 3, 1, "Disable exceptions").with_flags(COMMON),
    F::new("MRIE", 0x1C, 0, 3, 3, 4, "Method of reporting informational exceptions")
        .with_flags(COMMON),
];

/// Phy descriptors of the SAS phy control and discovery page: the count is
/// at byte 7, 48-byte descriptors start at byte 8.
pub const SAS_PHY_DESCRIPTORS: DescriptorBlock = DescriptorBlock {
    first_offset: 8,
    count: DescriptorCount::Counted {
        offset: 7,
        width: 1,
        increment: 0,
    },
    stride: DescriptorStride::Fixed(48),
    id_offset: None,
    name: "phy descriptor",
};

/// Enhanced phy control descriptors: counted, each with its own length at
/// bytes 2..4.
pub const SAS_ENHANCED_PHY_DESCRIPTORS: DescriptorBlock = DescriptorBlock {
    first_offset: 8,
    count: DescriptorCount::Counted {
        offset: 7,
        width: 1,
        increment: 0,
    },
    stride: DescriptorStride::Variable {
        len_offset: 2,
        len_width: 2,
    },
    id_offset: None,
    name: "enhanced phy descriptor",
};

/// SAS pages.
pub static SAS_PAGES: [P; 3] = [
    P::new(0x19, 0x00, "pspo", "Protocol specific port (SAS)"),
    P::new(0x19, 0x01, "pcd", "Phy control and discovery (SAS)")
        .with_descriptors(SAS_PHY_DESCRIPTORS),
    P::new(0x19, 0x03, "epc", "Enhanced phy control (SAS)")
        .with_descriptors(SAS_ENHANCED_PHY_DESCRIPTORS),
];

/// SAS fields.
pub static SAS_FIELDS: [F; 17] = [
    F::new("RLM", 0x19, 0, 2, 4, 1, "Ready LED meaning").with_flags(COMMON),
    F::new("PPID", 0x19, 0, 2, 3, 4, "Port's (transport) protocol identifier"),
    F::new("ITNLT", 0x19, 0, 4, 7, 16, "I_T nexus loss time (ms)").with_flags(COMMON),
    F::new("IRT", 0x19, 0, 6, 7, 16, "Initiator response timeout (ms)"),
    F::new("NOP", 0x19, 1, 7, 7, 8, "Number of phys"),
    F::new("PHID", 0x19, 1, 9, 7, 8, "Phy identifier").with_flags(COMMON),
    F::new("ADT", 0x19, 1, 12, 6, 3, "Attached device type"),
    F::new("NLR", 0x19, 1, 13, 3, 4, "Negotiated logical link rate"),
    F::new("SASA", 0x19, 1, 16, 7, 64, "SAS address").with_flags(HEX.union(COMMON)),
    F::new("ASASA", 0x19, 1, 24, 7, 64, "Attached SAS address").with_flags(HEX),
    F::new("APHID", 0x19, 1, 32, 7, 8, "Attached phy identifier"),
    F::new("PMINLR", 0x19, 1, 40, 7, 4, "Programmed minimum link rate"),
    F::new("HMINLR", 0x19, 1, 40, 3, 4, "Hardware minimum link rate"),
    F::new("PMAXLR", 0x19, 1, 41, 7, 4, "Programmed maximum link rate"),
    F::new("HMAXLR", 0x19, 1, 41, 3, 4, "Hardware maximum link rate"),
    F::new("EPHID", 0x19, 3, 9, 7, 8, "Phy identifier (enhanced)"),
    F::new("PPC", 0x19, 3, 20, 7, 32, "Programmed phy capabilities").with_flags(HEX),
];

/// Seagate pages.
pub static SEAGATE_PAGES: [P; 1] = [P::new(0x00, 0x00, "ua", "Unit attention (Seagate)")];

/// Seagate fields.
pub static SEAGATE_FIELDS: [F; 4] = [
    F::new("PM", 0x00, 0, 2, 7, 1, "Performance mode"),
    F::new("SSM", 0x00, 0, 2, 6, 1, "Synchronous select mode"),
    F::new("UAI", 0x00, 0, 2, 4, 1, "Unit attention interlock").with_flags(COMMON),
    F::new("DAR", 0x00, 0, 2, 2, 1, "Delay after reset"),
];

/// Registry over the sample tables.
#[must_use]
pub fn sample_registry() -> Registry {
    Registry::builder()
        .generic(PageTable::new(&GENERIC_PAGES, &GENERIC_FIELDS))
        .transport(TransportId::SAS, PageTable::new(&SAS_PAGES, &SAS_FIELDS))
        .vendor(VendorId::SEAGATE, PageTable::new(&SEAGATE_PAGES, &SEAGATE_FIELDS))
        .build()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{sample_registry, GENERIC_FIELDS, SAS_FIELDS, SEAGATE_FIELDS};
    use crate::page::PageKey;
    use crate::pdt::Pdt;
    use crate::registry::{FieldCursor, Namespace};

    #[test]
    fn every_field_is_within_codec_limits() {
        for field in GENERIC_FIELDS.iter().chain(&SAS_FIELDS).chain(&SEAGATE_FIELDS) {
            assert_eq!(field.validate(), Ok(()), "{}", field.label());
        }
    }

    #[test]
    fn acronyms_unique_per_page() {
        for table in [&GENERIC_FIELDS[..], &SAS_FIELDS[..], &SEAGATE_FIELDS[..]] {
            let mut seen = HashSet::new();
            for field in table {
                assert!(
                    seen.insert((field.page, field.subpage, field.acronym)),
                    "duplicate {}",
                    field.label()
                );
            }
        }
    }

    #[test]
    fn phy_identifier_needs_sas_fallback() {
        let registry = sample_registry();
        let found = registry
            .find_field_by_acronym("phid", Namespace::Generic, FieldCursor::START)
            .expect("fallback");
        assert_eq!(found.field.start_byte, 9);
    }

    #[test]
    fn tape_page_found_for_adc_through_decay() {
        let registry = sample_registry();
        let key = PageKey::new(0x10, 0);
        assert!(registry.find_page(key, Some(Pdt::ADC), Namespace::Generic).is_some());
        assert!(registry.find_page(key, Some(Pdt::DISK), Namespace::Generic).is_none());
    }
}
