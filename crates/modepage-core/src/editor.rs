//! Transactional page editor.
//!
//! Every operation has the same shape: probe the current variant for the
//! mode data length, fetch the wanted variants, validate them, then either
//! report field values or edit the current variant and write the whole
//! mode data response back.

use std::fmt;

use bitflags::bitflags;
use log::{debug, info, warn};

use crate::bits::{self, SignedValue};
use crate::config::EditConfig;
use crate::descriptor::Instances;
use crate::device::{
    DeviceCommandExecutor, ModeCommand, ModeReadRequest, ModeResponse, ModeWriteRequest,
    MAX_MODE_SENSE10_LEN, MAX_MODE_SENSE6_LEN,
};
use crate::error::{ConsistencyError, Error, MalformedError, ResolutionError, TransportError};
use crate::field::{FieldDescriptor, FieldFlags};
use crate::items::{ItemValue, ResolvedItems};
use crate::mode_data::{self, ModeHeader};
use crate::page::{
    self, PageBuffer, PageControl, PageDescriptor, PageKey, PageVariants, PS_BIT,
};
use crate::pdt::Pdt;
use crate::registry::{Namespace, Registry, DEFAULT_TRANSPORT};

bitflags! {
    /// Page control variants an operation fetches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VariantSet: u8 {
        /// Current values.
        const CURRENT = 1 << 0;
        /// Changeable mask.
        const CHANGEABLE = 1 << 1;
        /// Default values.
        const DEFAULT = 1 << 2;
        /// Saved values.
        const SAVED = 1 << 3;
    }
}

impl VariantSet {
    /// Set holding only `control`.
    #[must_use]
    pub const fn of(control: PageControl) -> Self {
        match control {
            PageControl::Current => Self::CURRENT,
            PageControl::Changeable => Self::CHANGEABLE,
            PageControl::Default => Self::DEFAULT,
            PageControl::Saved => Self::SAVED,
        }
    }
}

/// One extracted field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FieldValue {
    /// Unsigned value.
    pub value: u64,
    /// Every bit set at a sentinel width.
    pub all_ones: bool,
}

/// How to render a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueStyle {
    /// Follow the field flags; sentinels print as `-1`.
    #[default]
    Auto,
    /// Unsigned decimal.
    Decimal,
    /// `0x` prefixed hex.
    Hex,
    /// Two's-complement decimal.
    Signed,
}

impl FieldValue {
    fn from_buffer(
        buffer: &PageBuffer,
        field: &FieldDescriptor,
        start: usize,
        flexible: bool,
    ) -> Option<Self> {
        let bytes = if flexible {
            buffer.page_tail()
        } else {
            buffer.page()
        };
        bits::get_bits_with_sentinel(bytes, start, field.start_bit, field.width)
            .ok()
            .map(|(value, all_ones)| Self { value, all_ones })
    }

    /// Renders the value of `field` in `style`.
    #[must_use]
    pub fn render(self, field: &FieldDescriptor, style: ValueStyle) -> String {
        let signed = SignedValue {
            value: self.value,
            width: field.width,
            leading_zeros: false,
        };
        match style {
            ValueStyle::Decimal => self.value.to_string(),
            ValueStyle::Hex => format!("0x{:x}", self.value),
            ValueStyle::Signed => signed.to_string(),
            ValueStyle::Auto if self.all_ones => "-1".to_string(),
            ValueStyle::Auto if field.flags.contains(FieldFlags::TWOS_COMP) => signed.to_string(),
            ValueStyle::Auto if field.flags.contains(FieldFlags::HEX) => {
                format!("0x{:x}", self.value)
            }
            ValueStyle::Auto => self.value.to_string(),
        }
    }
}

/// Values of one field across the fetched variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReport {
    /// Acronym or coordinates, with the instance suffix.
    pub label: String,
    /// Field reported.
    pub field: FieldDescriptor,
    /// Descriptor instance.
    pub instance: usize,
    /// Current value.
    pub current: Option<FieldValue>,
    /// Changeable mask.
    pub changeable: Option<FieldValue>,
    /// Default value.
    pub default: Option<FieldValue>,
    /// Saved value.
    pub saved: Option<FieldValue>,
}

impl FieldReport {
    /// Value for one variant, when it was fetched.
    #[must_use]
    pub const fn value(&self, control: PageControl) -> Option<FieldValue> {
        match control {
            PageControl::Current => self.current,
            PageControl::Changeable => self.changeable,
            PageControl::Default => self.default,
            PageControl::Saved => self.saved,
        }
    }

    /// Rendered value for one variant.
    #[must_use]
    pub fn render(&self, control: PageControl, style: ValueStyle) -> Option<String> {
        self.value(control)
            .map(|value| value.render(&self.field, style))
    }
}

impl fmt::Display for FieldReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}", self.label)?;
        for control in PageControl::ALL {
            if let Some(text) = self.render(control, ValueStyle::Auto) {
                write!(f, "  {}={text}", &control.name()[..3])?;
            }
        }
        if !self.field.description.is_empty() {
            write!(f, "  [{}]", self.field.description)?;
        }
        Ok(())
    }
}

/// Full report of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    /// Page reported.
    pub page: PageKey,
    /// Table description, when the page is known.
    pub descriptor: Option<&'static PageDescriptor>,
    /// PS bit of the current variant.
    pub savable: bool,
    /// Descriptor instances present (1 without repeating descriptors).
    pub instances: usize,
    /// Field values in page order.
    pub fields: Vec<FieldReport>,
}

/// Result of a write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Dummy mode: the parameter list that would have been sent.
    DryRun {
        /// MODE SELECT parameter list.
        bytes: Vec<u8>,
    },
    /// MODE SELECT was issued.
    Written {
        /// Parameter list length.
        len: usize,
    },
}

fn ends_beyond(start: usize, field: &FieldDescriptor, page_len: usize) -> bool {
    !start
        .checked_add(field.span())
        .is_some_and(|end| end <= page_len)
}

/// Page operations against one device.
#[derive(Debug)]
pub struct PageEditor<'a, E: DeviceCommandExecutor> {
    executor: &'a mut E,
    registry: &'a Registry,
    config: &'a EditConfig,
    pdt: Option<Pdt>,
}

impl<'a, E: DeviceCommandExecutor> PageEditor<'a, E> {
    /// Editor using the configured pdt override, if any.
    pub fn new(executor: &'a mut E, registry: &'a Registry, config: &'a EditConfig) -> Self {
        Self {
            executor,
            registry,
            config,
            pdt: config.pdt_override,
        }
    }

    /// Uses the device type INQUIRY reported unless overridden.
    #[must_use]
    pub fn with_reported_pdt(mut self, pdt: Pdt) -> Self {
        self.pdt = self.config.effective_pdt(Some(pdt));
        self
    }

    /// Device type used for table lookups.
    #[must_use]
    pub const fn pdt(&self) -> Option<Pdt> {
        self.pdt
    }

    fn sense(
        &mut self,
        key: PageKey,
        control: PageControl,
        alloc_len: usize,
    ) -> Result<ModeResponse, TransportError> {
        let request = ModeReadRequest {
            six_byte: self.config.six_byte,
            disable_block_descriptors: self.config.disable_block_descriptors,
            control,
            page: key.page,
            subpage: key.subpage,
            alloc_len,
        };
        self.executor.mode_read(&request).map_err(|source| {
            TransportError::from_device(ModeCommand::sense(self.config.six_byte), key, source, true)
        })
    }

    /// Fetches the wanted variants of a page.
    ///
    /// The current variant is always probed first to learn the length, and
    /// is always part of the result; refusal of any other variant leaves
    /// its slot empty.
    ///
    /// # Errors
    ///
    /// Transport errors for the current variant and validation errors for
    /// any variant.
    pub fn fetch(&mut self, key: PageKey, wanted: VariantSet) -> Result<PageVariants, Error> {
        let six_byte = self.config.six_byte;
        let header_len = mode_data::header_len(six_byte);
        let probe = self.sense(key, PageControl::Current, header_len)?;
        let received = probe.received().min(probe.bytes.len());
        let header = ModeHeader::parse(&probe.bytes[..received], six_byte)?;
        let cap = if six_byte {
            MAX_MODE_SENSE6_LEN
        } else {
            MAX_MODE_SENSE10_LEN
        };
        let alloc_len = header.total_len().clamp(header_len, cap);
        debug!(
            "page {key}: probe reports {} bytes, fetching with allocation {alloc_len}",
            header.total_len()
        );

        let mut variants = PageVariants::default();
        for control in PageControl::ALL {
            if control != PageControl::Current && !wanted.contains(VariantSet::of(control)) {
                continue;
            }
            match self.sense(key, control, alloc_len) {
                Ok(response) => variants.insert(self.validate(key, control, response, alloc_len)?),
                Err(e) if control == PageControl::Current => return Err(e.into()),
                Err(e) => debug!("page {key}: {control} values unavailable: {e}"),
            }
        }
        Ok(variants)
    }

    fn validate(
        &self,
        key: PageKey,
        control: PageControl,
        response: ModeResponse,
        alloc_len: usize,
    ) -> Result<PageBuffer, MalformedError> {
        let received = response.received();
        let mut bytes = response.bytes;
        bytes.truncate(received);

        let header = ModeHeader::parse(&bytes, self.config.six_byte)?;
        let mut declared = header.total_len();
        if declared > alloc_len {
            if !self.config.flexible {
                return Err(MalformedError::ExceedsAllocation {
                    page: key,
                    declared,
                    allocated: alloc_len,
                });
            }
            warn!(
                "page {key} ({control}): declared length {declared} exceeds allocation \
                 {alloc_len}, clamping"
            );
            declared = alloc_len;
        }
        if bytes.len() < declared {
            return Err(MalformedError::Truncated {
                page: key,
                declared,
                received: bytes.len(),
            });
        }
        bytes.truncate(declared);

        let offset = header.page_offset();
        let page_bytes = bytes.get(offset..).unwrap_or_default();
        let (Some(code), Some(page_len)) =
            (page::page_code(page_bytes), page::reported_page_len(page_bytes))
        else {
            return Err(MalformedError::PageBeyondResponse {
                page: key,
                offset,
                len: bytes.len(),
            });
        };
        let subpage = if page::has_subpage_format(page_bytes) {
            page_bytes.get(1).copied().unwrap_or_default()
        } else {
            0
        };
        if !page::page_numbers_match(key.page, code) || subpage != key.subpage {
            return Err(MalformedError::PageMismatch {
                expected: key,
                found: PageKey::new(code, subpage),
            });
        }
        if code != key.page {
            debug!("page {key}: device reports equivalent page 0x{code:02x}");
        }
        if page_len > page_bytes.len() {
            return Err(MalformedError::Truncated {
                page: key,
                declared: offset + page_len,
                received: bytes.len(),
            });
        }
        Ok(PageBuffer::new(control, bytes, offset, page_len))
    }

    /// Page descriptor for `key`. A generic lookup that misses is retried
    /// once in the default transport table, the same fallback acronyms get.
    fn page_descriptor(&self, key: PageKey) -> (Option<&'static PageDescriptor>, Namespace) {
        let namespace = self.config.namespace;
        if let Some(found) = self.registry.find_page(key, self.pdt, namespace) {
            return (Some(found), namespace);
        }
        if namespace == Namespace::Generic {
            let fallback = Namespace::Transport(DEFAULT_TRANSPORT);
            if let Some(found) = self.registry.find_page(key, self.pdt, fallback) {
                debug!("page {key} resolved in {fallback} tables");
                return (Some(found), fallback);
            }
        }
        (None, namespace)
    }

    fn instances(
        key: PageKey,
        descriptor: Option<&PageDescriptor>,
        page: &[u8],
    ) -> Result<Option<Instances>, MalformedError> {
        descriptor
            .and_then(|descriptor| descriptor.descriptors)
            .map(|block| block.instances(page))
            .transpose()
            .map_err(|source| MalformedError::Descriptor { page: key, source })
    }

    /// Effective start byte of `field` in descriptor instance `instance`.
    fn locate(
        &self,
        key: PageKey,
        field: &FieldDescriptor,
        label: &str,
        instance: usize,
        instances: Option<&Instances>,
        page_len: usize,
    ) -> Result<usize, Error> {
        let out_of_range = |count: usize| ResolutionError::DescriptorIndexOutOfRange {
            label: label.to_string(),
            page: key,
            index: instance,
            count,
        };
        let start = match instances {
            Some(instances) => {
                let start = instances
                    .offset_of(field, instance)
                    .ok_or_else(|| out_of_range(instances.len()))?;
                if !instances.applies(field, instance) {
                    warn!("{label}: descriptor {instance} carries a different descriptor id");
                }
                start
            }
            None if instance > 0 => return Err(out_of_range(1).into()),
            None => field.start_byte,
        };
        if ends_beyond(start, field, page_len) {
            if !self.config.flexible {
                return Err(MalformedError::FieldBeyondPage {
                    label: label.to_string(),
                    page: key,
                    start_byte: start,
                    page_len,
                }
                .into());
            }
            warn!("{label}: byte {start} beyond page {key} length {page_len}, continuing");
        }
        Ok(start)
    }

    fn report(
        &self,
        field: &FieldDescriptor,
        label: String,
        instance: usize,
        start: usize,
        variants: &PageVariants,
    ) -> FieldReport {
        let value = |control| {
            variants.get(control).and_then(|buffer| {
                FieldValue::from_buffer(buffer, field, start, self.config.flexible)
            })
        };
        FieldReport {
            label,
            field: *field,
            instance,
            current: value(PageControl::Current),
            changeable: value(PageControl::Changeable),
            default: value(PageControl::Default),
            saved: value(PageControl::Saved),
        }
    }

    /// Reports every table field of a page in all four variants.
    ///
    /// Fields lying beyond the page the device returned are skipped. A page
    /// no table describes is still fetched and validated, and reported
    /// without a descriptor or fields.
    ///
    /// # Errors
    ///
    /// Fetch and descriptor errors.
    pub fn read_page(&mut self, key: PageKey) -> Result<PageReport, Error> {
        let variants = self.fetch(key, VariantSet::all())?;
        let current = variants
            .current
            .as_ref()
            .ok_or(TransportError::PageNotSupported { page: key })?;
        let (descriptor, namespace) = self.page_descriptor(key);
        if descriptor.is_none() {
            warn!("{}", ResolutionError::UnknownPage { page: key, namespace });
        }
        let instances = Self::instances(key, descriptor, current.page())?;
        let count = instances.as_ref().map_or(1, Instances::len);
        let page_len = current.page_len();
        let fields = self.registry.fields_of_page(key, self.pdt, namespace);

        let mut reports = Vec::new();
        for k in 0..count {
            for field in &fields {
                let start = match &instances {
                    Some(instances) if !instances.applies(field, k) => continue,
                    Some(instances) => match instances.offset_of(field, k) {
                        Some(start) => start,
                        None => continue,
                    },
                    None => field.start_byte,
                };
                let label = field.instance_label(k).to_string();
                if ends_beyond(start, field, page_len) {
                    debug!("{label}: beyond page {key} length {page_len}, skipped");
                    continue;
                }
                reports.push(self.report(field, label, k, start, &variants));
            }
        }
        Ok(PageReport {
            page: key,
            descriptor,
            savable: current.is_savable(),
            instances: count,
            fields: reports,
        })
    }

    /// Reads the fields named by `items`.
    ///
    /// Only the current variant is fetched unless `all_variants` is set.
    ///
    /// # Errors
    ///
    /// Fetch errors, descriptor index errors and fields beyond the page.
    pub fn get_items(&mut self, items: &ResolvedItems) -> Result<Vec<FieldReport>, Error> {
        let key = items.page;
        let wanted = if self.config.all_variants {
            VariantSet::all()
        } else {
            VariantSet::CURRENT
        };
        let variants = self.fetch(key, wanted)?;
        let current = variants
            .current
            .as_ref()
            .ok_or(TransportError::PageNotSupported { page: key })?;
        let (descriptor, _) = self.page_descriptor(key);
        let instances = Self::instances(key, descriptor, current.page())?;
        let page_len = current.page_len();

        items
            .bindings
            .iter()
            .map(|binding| {
                let label = binding.label();
                let instance = binding.instance.unwrap_or(0);
                let start = self.locate(
                    key,
                    &binding.field,
                    &label,
                    instance,
                    instances.as_ref(),
                    page_len,
                )?;
                let report = self.report(&binding.field, label, instance, start, &variants);
                if report.current.is_none() {
                    return Err(MalformedError::FieldBeyondPage {
                        label: report.label,
                        page: key,
                        start_byte: start,
                        page_len,
                    }
                    .into());
                }
                Ok(report)
            })
            .collect()
    }

    /// Writes the values of `items` into the current variant and sends it
    /// back.
    ///
    /// # Errors
    ///
    /// Fetch and location errors, [`ConsistencyError::NotSavable`] when a
    /// save is requested for a page that is not savable, and write
    /// failures. Nothing is written when any binding fails.
    pub fn set_items(&mut self, items: &ResolvedItems) -> Result<EditOutcome, Error> {
        let key = items.page;
        let wanted = if self.config.check_changeable {
            VariantSet::CURRENT | VariantSet::CHANGEABLE
        } else {
            VariantSet::CURRENT
        };
        let mut variants = self.fetch(key, wanted)?;
        let mut current = variants
            .current
            .take()
            .ok_or(TransportError::PageNotSupported { page: key })?;
        let savable = current.is_savable();
        let (descriptor, _) = self.page_descriptor(key);
        let instances = Self::instances(key, descriptor, current.page())?;
        let page_len = current.page_len();

        for binding in &items.bindings {
            let label = binding.label();
            let ItemValue::Set(value) = binding.value else {
                debug!("{label}: query item in a write request ignored");
                continue;
            };
            let field = &binding.field;
            let instance = binding.instance.unwrap_or(0);
            let start = self.locate(key, field, &label, instance, instances.as_ref(), page_len)?;
            if binding.is_truncated() {
                warn!(
                    "{label}: value {} does not fit in {} bits, truncated to 0x{value:x}",
                    binding.literal.as_deref().unwrap_or_default(),
                    field.width
                );
            }
            if let Some(mask) = variants
                .changeable
                .as_ref()
                .and_then(|changeable| FieldValue::from_buffer(changeable, field, start, true))
            {
                let old =
                    FieldValue::from_buffer(&current, field, start, true).map_or(0, |v| v.value);
                if (value ^ old) & !mask.value != 0 {
                    warn!("{label}: device reports some of the modified bits as not changeable");
                }
            }
            bits::set_bits(value, current.page_tail_mut(), start, field.start_bit, field.width)
                .map_err(|_| MalformedError::FieldBeyondPage {
                    label: label.clone(),
                    page: key,
                    start_byte: start,
                    page_len,
                })?;
            debug!("{label} <- 0x{value:x} at page byte {start}");
        }

        self.normalize(&mut current);
        self.commit(key, current, savable)
    }

    /// Replaces the current values of a page with its defaults and sends
    /// the result back.
    ///
    /// # Errors
    ///
    /// Fetch errors, [`ConsistencyError::NoDefaults`] when the device has
    /// no default variant, then the same conflict and write errors as
    /// [`PageEditor::set_items`].
    pub fn reset_to_defaults(&mut self, key: PageKey) -> Result<EditOutcome, Error> {
        let mut variants = self.fetch(key, VariantSet::CURRENT | VariantSet::DEFAULT)?;
        let mut current = variants
            .current
            .take()
            .ok_or(TransportError::PageNotSupported { page: key })?;
        let default = variants
            .default
            .take()
            .ok_or(ConsistencyError::NoDefaults { page: key })?;
        let savable = current.is_savable();

        let len = current.page_len().min(default.page_len());
        if current.page_len() != default.page_len() {
            warn!(
                "page {key}: default length {} differs from current {}, copying {len} bytes",
                default.page_len(),
                current.page_len()
            );
        }
        let header = page::page_header_len(current.page());
        if let (Some(target), Some(source)) = (
            current.page_tail_mut().get_mut(header..len),
            default.page().get(header..len),
        ) {
            target.copy_from_slice(source);
        }

        self.normalize(&mut current);
        self.commit(key, current, savable)
    }

    /// Clears the bits that are reserved in MODE SELECT.
    fn normalize(&self, buffer: &mut PageBuffer) {
        mode_data::clear_mode_data_length(buffer.response_mut(), self.config.six_byte);
        if let Some(first) = buffer.page_tail_mut().first_mut() {
            *first &= !PS_BIT;
        }
    }

    fn commit(
        &mut self,
        key: PageKey,
        buffer: PageBuffer,
        savable: bool,
    ) -> Result<EditOutcome, Error> {
        let save = self.config.save;
        if save && !savable {
            return Err(ConsistencyError::NotSavable { page: key }.into());
        }
        let command = ModeCommand::select(self.config.six_byte);
        let bytes = buffer.into_response();
        if self.config.dummy {
            info!("page {key}: dry run, {command} with {} bytes not sent", bytes.len());
            return Ok(EditOutcome::DryRun { bytes });
        }
        let request = ModeWriteRequest {
            six_byte: self.config.six_byte,
            save,
            bytes: &bytes,
        };
        self.executor
            .mode_write(&request)
            .map_err(|source| TransportError::from_device(command, key, source, false))?;
        info!(
            "page {key}: {command} sent {} bytes{}",
            bytes.len(),
            if save { ", saved" } else { "" }
        );
        Ok(EditOutcome::Written { len: bytes.len() })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{FieldValue, ValueStyle, VariantSet};
    use crate::field::{FieldDescriptor, FieldFlags};
    use crate::page::PageControl;

    const PLAIN: FieldDescriptor =
        FieldDescriptor::new("MAPF", 0x08, 0, 8, 7, 16, "Maximum pre-fetch");

    #[rstest]
    #[case(0xFFFF, true, ValueStyle::Auto, "-1")]
    #[case(0xFFFF, true, ValueStyle::Decimal, "65535")]
    #[case(0x7FFF, false, ValueStyle::Signed, "32767")]
    #[case(0x8000, false, ValueStyle::Signed, "-32768")]
    #[case(0x1F, false, ValueStyle::Hex, "0x1f")]
    #[case(12, false, ValueStyle::Auto, "12")]
    fn rendering(
        #[case] value: u64,
        #[case] all_ones: bool,
        #[case] style: ValueStyle,
        #[case] expected: &str,
    ) {
        assert_eq!(FieldValue { value, all_ones }.render(&PLAIN, style), expected);
    }

    #[test]
    fn auto_rendering_follows_flags() {
        let hex = PLAIN.with_flags(FieldFlags::HEX);
        let signed = FieldDescriptor::new("OFS", 0x08, 0, 3, 7, 8, "offset")
            .with_flags(FieldFlags::TWOS_COMP);
        let value = FieldValue {
            value: 0xFE,
            all_ones: false,
        };
        assert_eq!(value.render(&hex, ValueStyle::Auto), "0xfe");
        assert_eq!(value.render(&signed, ValueStyle::Auto), "-2");
    }

    #[test]
    fn variant_set_per_control() {
        let set = VariantSet::of(PageControl::Current) | VariantSet::of(PageControl::Default);
        assert!(set.contains(VariantSet::DEFAULT));
        assert!(!set.contains(VariantSet::SAVED));
        assert_eq!(VariantSet::all().bits().count_ones(), 4);
    }
}
