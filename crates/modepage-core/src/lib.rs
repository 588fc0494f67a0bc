//! Mode page field access for SCSI storage devices.
//!
//! Fields are named by acronym or raw `byte:bit:width` coordinates,
//! resolved through namespaced tables, and read or written inside pages
//! fetched through a [`DeviceCommandExecutor`].

/// Bit-level field codec.
pub mod bits;
pub use bits::{
    get_bits, get_bits_with_sentinel, is_all_ones, mask, render_signed, set_bits, sign_extend,
    BitsError, SignedValue, MAX_FIELD_WIDTH, SENTINEL_WIDTHS, SIGNED_WIDTHS,
};

/// Peripheral device types and decay.
pub mod pdt;
pub use pdt::{Pdt, PdtFilter};

/// Field descriptors.
pub mod field;
pub use field::{FieldDescriptor, FieldFlags, FieldLabel};

/// Repeated descriptor blocks.
pub mod descriptor;
pub use descriptor::{
    instance_acronym, split_instance_suffix, DescriptorBlock, DescriptorCount, DescriptorError,
    DescriptorStride, Instances, MAX_DESCRIPTOR_COUNT, MAX_DESCRIPTOR_LEN,
};

/// Page descriptors, control variants and buffers.
pub mod page;
pub use page::{
    page_numbers_match, PageBuffer, PageControl, PageDescriptor, PageKey, PageVariants,
    EQUIVALENT_PAGE_NUMBERS, PS_BIT, SPF_BIT,
};

/// Namespaced page and field tables.
pub mod registry;
pub use registry::{
    FieldCursor, FieldMatch, Namespace, PageTable, Registry, RegistryBuilder, TableView,
    TransportId, VendorId, DEFAULT_TRANSPORT,
};

/// Device command boundary.
pub mod device;
pub use device::{
    DeviceCommandExecutor, DeviceError, DeviceIdentity, ModeCommand, ModeReadRequest,
    ModeResponse, ModeWriteRequest, MAX_MODE_SENSE10_LEN, MAX_MODE_SENSE6_LEN,
};

/// Error taxonomy and exit statuses.
pub mod error;
pub use error::{
    ConsistencyError, Error, ErrorClass, MalformedError, ResolutionError, TransportError,
};

/// Mode parameter header parsing.
pub mod mode_data;
pub use mode_data::ModeHeader;

/// Per-operation configuration.
pub mod config;
pub use config::EditConfig;

/// Item parsing and resolution.
pub mod items;
pub use items::{
    parse_item, parse_items, parse_value, resolve_items, ItemBinding, ItemMode, ItemName,
    ItemSpec, ItemValue, RawValue, ResolvedItems,
};

/// Transactional page editor.
pub mod editor;
pub use editor::{
    EditOutcome, FieldReport, FieldValue, PageEditor, PageReport, ValueStyle, VariantSet,
};

/// Multi-device runs.
pub mod session;
pub use session::{run_devices, DeviceOpener, RunStatus};

/// Sample tables.
pub mod tables;
pub use tables::sample_registry;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
