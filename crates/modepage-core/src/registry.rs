//! Field/page registry and namespace resolution.
//!
//! Tables are grouped by namespace: one generic table, one per transport
//! protocol identifier (0..=15) and one per vendor. The registry never
//! mutates its tables; a namespace without a table behaves as empty.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::field::FieldDescriptor;
use crate::page::{PageDescriptor, PageKey};
use crate::pdt::{Pdt, PdtFilter};

/// Number of transport protocol identifiers.
pub const TRANSPORT_ID_COUNT: usize = 16;

/// Transport protocol identifier (SPC-4 protocol identifier values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TransportId(u8);

impl TransportId {
    /// Fibre Channel.
    pub const FCP: Self = Self(0x0);
    /// Parallel SCSI.
    pub const SPI: Self = Self(0x1);
    /// SSA.
    pub const SSA: Self = Self(0x2);
    /// IEEE 1394.
    pub const IEEE1394: Self = Self(0x3);
    /// SCSI RDMA protocol.
    pub const SRP: Self = Self(0x4);
    /// iSCSI.
    pub const ISCSI: Self = Self(0x5);
    /// Serial attached SCSI.
    pub const SAS: Self = Self(0x6);
    /// Automation/drive interface transport.
    pub const ADT: Self = Self(0x7);
    /// ATA/ATAPI.
    pub const ATA: Self = Self(0x8);
    /// USB attached SCSI.
    pub const UAS: Self = Self(0x9);
    /// SCSI over PCIe.
    pub const SOP: Self = Self(0xA);
    /// PCIe.
    pub const PCIE: Self = Self(0xB);

    /// Builds an identifier, rejecting values above 15.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if (value as usize) < TRANSPORT_ID_COUNT {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Raw protocol identifier.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Short protocol name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            0x0 => "fcp",
            0x1 => "spi",
            0x2 => "ssa",
            0x3 => "1394",
            0x4 => "srp",
            0x5 => "iscsi",
            0x6 => "sas",
            0x7 => "adt",
            0x8 => "ata",
            0x9 => "uas",
            0xA => "sop",
            0xB => "pcie",
            _ => "reserved",
        }
    }

    /// Looks an identifier up by its short name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        (0..16u8)
            .map(Self)
            .find(|id| id.name() != "reserved" && id.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport consulted when a generic lookup by acronym fails.
pub const DEFAULT_TRANSPORT: TransportId = TransportId::SAS;

/// Vendor table identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct VendorId(pub u8);

impl VendorId {
    /// Seagate.
    pub const SEAGATE: Self = Self(0);
    /// Hitachi.
    pub const HITACHI: Self = Self(1);
    /// Maxtor.
    pub const MAXTOR: Self = Self(2);
    /// Fujitsu.
    pub const FUJITSU: Self = Self(3);
    /// IBM LTO-5 tape.
    pub const LTO5: Self = Self(5);
    /// IBM LTO-6 tape.
    pub const LTO6: Self = Self(6);

    /// Short vendor name, when known.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("sea"),
            1 => Some("hit"),
            2 => Some("max"),
            3 => Some("fuj"),
            5 => Some("lto5"),
            6 => Some("lto6"),
            _ => None,
        }
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "vendor {}", self.0),
        }
    }
}

/// Which table set a lookup consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Namespace {
    /// Pages and fields common to all transports and vendors.
    #[default]
    Generic,
    /// Transport-protocol-specific pages.
    Transport(TransportId),
    /// Vendor-specific pages.
    Vendor(VendorId),
}

impl Namespace {
    /// Resolves a selection: vendor beats transport, which beats generic.
    #[must_use]
    pub const fn select(vendor: Option<VendorId>, transport: Option<TransportId>) -> Self {
        match (vendor, transport) {
            (Some(vendor), _) => Self::Vendor(vendor),
            (None, Some(transport)) => Self::Transport(transport),
            (None, None) => Self::Generic,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => f.write_str("generic"),
            Self::Transport(id) => write!(f, "transport {id}"),
            Self::Vendor(id) => write!(f, "{id}"),
        }
    }
}

/// One namespace's pages and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageTable {
    /// Page descriptors.
    pub pages: &'static [PageDescriptor],
    /// Field descriptors, grouped by page in table order.
    pub fields: &'static [FieldDescriptor],
}

impl PageTable {
    /// Table with no entries.
    pub const EMPTY: Self = Self {
        pages: &[],
        fields: &[],
    };

    /// Builds a table.
    #[must_use]
    pub const fn new(
        pages: &'static [PageDescriptor],
        fields: &'static [FieldDescriptor],
    ) -> Self {
        Self { pages, fields }
    }
}

/// Borrowed view of the table selected for one namespace.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    namespace: Namespace,
    table: &'a PageTable,
}

impl TableView<'_> {
    /// Namespace this view was resolved from.
    #[must_use]
    pub const fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Pages of the namespace.
    #[must_use]
    pub const fn pages(&self) -> &'static [PageDescriptor] {
        self.table.pages
    }

    /// Fields of the namespace.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldDescriptor] {
        self.table.fields
    }

    /// Exact (page, subpage) match whose pdt restriction admits `pdt`.
    #[must_use]
    pub fn find_page(&self, key: PageKey, pdt: Option<Pdt>) -> Option<&'static PageDescriptor> {
        self.table
            .pages
            .iter()
            .find(|page| page.key() == key && page.pdt.accepts(pdt))
    }
}

/// Resume position for enumerating fields that share an acronym.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldCursor {
    index: usize,
    fallback: bool,
}

impl FieldCursor {
    /// Cursor for a fresh search.
    pub const START: Self = Self {
        index: 0,
        fallback: false,
    };
}

/// A field found by acronym.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMatch {
    /// The matching field.
    pub field: &'static FieldDescriptor,
    /// Namespace whose table held the field.
    pub namespace: Namespace,
    /// Cursor that resumes after this match.
    pub next: FieldCursor,
}

/// `true` when a descriptor restricted by `filter` applies to `pdt` or to
/// its decayed family.
#[must_use]
pub fn pdt_applies(filter: PdtFilter, pdt: Option<Pdt>) -> bool {
    filter.accepts(pdt) || pdt.is_some_and(|pdt| filter.accepts(Some(pdt.decay())))
}

/// Immutable collection of page tables keyed by namespace.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    generic: PageTable,
    transports: [PageTable; TRANSPORT_ID_COUNT],
    vendors: BTreeMap<VendorId, PageTable>,
}

/// Incremental builder for a [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Sets the generic table.
    #[must_use]
    pub const fn generic(mut self, table: PageTable) -> Self {
        self.registry.generic = table;
        self
    }

    /// Sets the table of one transport protocol.
    #[must_use]
    pub fn transport(mut self, id: TransportId, table: PageTable) -> Self {
        self.registry.transports[usize::from(id.value())] = table;
        self
    }

    /// Sets the table of one vendor.
    #[must_use]
    pub fn vendor(mut self, id: VendorId, table: PageTable) -> Self {
        self.registry.vendors.insert(id, table);
        self
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> Registry {
        self.registry
    }
}

impl Registry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Table view for `namespace`; unknown vendors yield an empty view.
    #[must_use]
    pub fn view(&self, namespace: Namespace) -> TableView<'_> {
        let table = match namespace {
            Namespace::Generic => &self.generic,
            Namespace::Transport(id) => &self.transports[usize::from(id.value())],
            Namespace::Vendor(id) => self.vendors.get(&id).unwrap_or(&PageTable::EMPTY),
        };
        TableView { namespace, table }
    }

    /// Finds the page descriptor for `key`.
    ///
    /// In the generic namespace a miss is retried once with the decayed
    /// device type.
    #[must_use]
    pub fn find_page(
        &self,
        key: PageKey,
        pdt: Option<Pdt>,
        namespace: Namespace,
    ) -> Option<&'static PageDescriptor> {
        let view = self.view(namespace);
        if let Some(page) = view.find_page(key, pdt) {
            return Some(page);
        }
        if namespace != Namespace::Generic {
            return None;
        }
        let pdt = pdt?;
        let decayed = pdt.decay();
        if decayed == pdt {
            return None;
        }
        debug!("page {key} not found for pdt {pdt}, retrying as {decayed}");
        view.find_page(key, Some(decayed))
    }

    fn scan_acronym(
        &self,
        namespace: Namespace,
        acronym: &str,
        from: usize,
        fallback: bool,
    ) -> Option<FieldMatch> {
        let fields = self.view(namespace).fields();
        fields
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, field)| field.matches_acronym(acronym))
            .map(|(index, field)| FieldMatch {
                field,
                namespace,
                next: FieldCursor {
                    index: index + 1,
                    fallback,
                },
            })
    }

    /// Finds the next field named `acronym` (case-insensitive) at or after
    /// `cursor`.
    ///
    /// When the generic namespace holds no field of that name at all, the
    /// search moves once to the [`DEFAULT_TRANSPORT`] table.
    #[must_use]
    pub fn find_field_by_acronym(
        &self,
        acronym: &str,
        namespace: Namespace,
        cursor: FieldCursor,
    ) -> Option<FieldMatch> {
        let fallback_ns = Namespace::Transport(DEFAULT_TRANSPORT);
        if cursor.fallback {
            return self.scan_acronym(fallback_ns, acronym, cursor.index, true);
        }
        let found = self.scan_acronym(namespace, acronym, cursor.index, false);
        if found.is_some() || namespace != Namespace::Generic || cursor != FieldCursor::START {
            return found;
        }
        debug!("acronym {acronym} not in generic tables, trying {fallback_ns}");
        self.scan_acronym(fallback_ns, acronym, 0, true)
    }

    /// Every field named `acronym`, in table order.
    #[must_use]
    pub fn fields_by_acronym(&self, acronym: &str, namespace: Namespace) -> Vec<FieldMatch> {
        std::iter::successors(
            self.find_field_by_acronym(acronym, namespace, FieldCursor::START),
            |found| self.find_field_by_acronym(acronym, namespace, found.next),
        )
        .collect()
    }

    /// Finds the table field of `key` located exactly at the given
    /// coordinates, used to name raw coordinates.
    #[must_use]
    pub fn find_field_by_position(
        &self,
        key: PageKey,
        start_byte: usize,
        start_bit: u8,
        namespace: Namespace,
    ) -> Option<&'static FieldDescriptor> {
        self.view(namespace).fields().iter().find(|field| {
            field.page == key.page
                && field.subpage == key.subpage
                && field.start_byte == start_byte
                && field.start_bit == start_bit
        })
    }

    /// Fields of page `key` that apply to `pdt`, in table order.
    #[must_use]
    pub fn fields_of_page(
        &self,
        key: PageKey,
        pdt: Option<Pdt>,
        namespace: Namespace,
    ) -> Vec<&'static FieldDescriptor> {
        self.view(namespace)
            .fields()
            .iter()
            .filter(|field| {
                field.page == key.page
                    && field.subpage == key.subpage
                    && pdt_applies(field.pdt, pdt)
            })
            .collect()
    }
}
