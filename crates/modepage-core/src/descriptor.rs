//! Repeated descriptor blocks inside a page.
//!
//! Some pages carry a sub-structure repeated an a-priori unknown number of
//! times (SAS phy descriptors, command duration limit descriptors, ...).
//! [`DescriptorBlock`] describes how to count the instances and where each
//! one starts; [`Instances`] is the resolved layout of one concrete page and
//! is the only place descriptor offsets are computed.

use log::{debug, warn};
use thiserror::Error;

use crate::bits::{self, BitsError};
use crate::field::{FieldDescriptor, FieldFlags};
use crate::page;

/// Largest descriptor count accepted as plausible.
pub const MAX_DESCRIPTOR_COUNT: usize = 512;

/// Per-instance reported length above which a walk is abandoned.
pub const MAX_DESCRIPTOR_LEN: usize = 1024;

/// How the number of descriptors is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorCount {
    /// A field holds the byte length of the descriptor list; the count is
    /// `(value - base_adjustment) / stride`.
    ByteLength {
        /// Byte offset of the length field within the page.
        offset: usize,
        /// Width of the length field in bytes.
        width: u8,
        /// Bytes covered by the length but not part of any descriptor.
        base_adjustment: usize,
    },
    /// A field holds the number of descriptors, offset by `increment`.
    Counted {
        /// Byte offset of the count field within the page.
        offset: usize,
        /// Width of the count field in bytes.
        width: u8,
        /// Correction added to the stored count.
        increment: i32,
    },
    /// No count field: descriptors repeat until the page length is used up.
    UntilPageEnd,
}

/// Distance between consecutive descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorStride {
    /// Every descriptor has the same length.
    Fixed(usize),
    /// Each descriptor carries its own length field.
    Variable {
        /// Offset of the length field within a descriptor.
        len_offset: usize,
        /// Width of the length field in bytes.
        len_width: u8,
    },
}

/// Layout metadata for a page with repeating descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBlock {
    /// Byte offset of the first descriptor within the page.
    pub first_offset: usize,
    /// Counting rule.
    pub count: DescriptorCount,
    /// Stride rule.
    pub stride: DescriptorStride,
    /// Offset within a descriptor of the byte whose low nibble is the
    /// descriptor id, when descriptors carry one.
    pub id_offset: Option<usize>,
    /// Human name of one descriptor.
    pub name: &'static str,
}

/// Failures while resolving descriptor instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DescriptorError {
    /// Computed count is larger than any real page carries.
    #[error("implausible {name} count {count} (limit {MAX_DESCRIPTOR_COUNT})")]
    ImplausibleCount {
        /// Descriptor name.
        name: &'static str,
        /// Count derived from the page.
        count: usize,
    },
    /// The count or length field lies outside the page.
    #[error("{name} count field unreadable: {source}")]
    CountField {
        /// Descriptor name.
        name: &'static str,
        /// Underlying codec error.
        source: BitsError,
    },
    /// Descriptor stride of zero would never advance.
    #[error("{name} has zero stride")]
    ZeroStride {
        /// Descriptor name.
        name: &'static str,
    },
}

fn read_be(page: &[u8], offset: usize, width: u8) -> Result<u64, BitsError> {
    bits::get_bits(page, offset, 7, width.saturating_mul(8))
}

impl DescriptorBlock {
    fn read_count_field(
        &self,
        page: &[u8],
        offset: usize,
        width: u8,
    ) -> Result<u64, DescriptorError> {
        read_be(page, offset, width).map_err(|source| DescriptorError::CountField {
            name: self.name,
            source,
        })
    }

    /// End of the walkable area: the page's reported length, bounded by the
    /// bytes actually present.
    fn page_end(page: &[u8]) -> usize {
        page::reported_page_len(page).map_or(page.len(), |len| len.min(page.len()))
    }

    /// Resolves the descriptor instances present in `page`.
    ///
    /// `page` starts at the page code byte.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when the count field is unreadable or the
    /// count is implausible.
    pub fn instances(&self, page: &[u8]) -> Result<Instances, DescriptorError> {
        let starts = match self.stride {
            DescriptorStride::Fixed(0) => {
                return Err(DescriptorError::ZeroStride { name: self.name })
            }
            DescriptorStride::Fixed(stride) => self.fixed_starts(page, stride)?,
            DescriptorStride::Variable {
                len_offset,
                len_width,
            } => self.walk(page, len_offset, len_width)?,
        };

        if starts.len() > MAX_DESCRIPTOR_COUNT {
            return Err(DescriptorError::ImplausibleCount {
                name: self.name,
                count: starts.len(),
            });
        }

        let ids = starts
            .iter()
            .map(|start| {
                self.id_offset
                    .and_then(|off| page.get(start + off))
                    .map(|byte| byte & 0x0F)
            })
            .collect();

        Ok(Instances {
            block: *self,
            starts,
            ids,
        })
    }

    /// Number of descriptors present in `page`.
    ///
    /// # Errors
    ///
    /// Same as [`DescriptorBlock::instances`].
    pub fn count(&self, page: &[u8]) -> Result<usize, DescriptorError> {
        self.instances(page).map(|instances| instances.len())
    }

    fn declared_count(&self, page: &[u8], stride: usize) -> Result<usize, DescriptorError> {
        let count = match self.count {
            DescriptorCount::ByteLength {
                offset,
                width,
                base_adjustment,
            } => {
                let len = usize::try_from(self.read_count_field(page, offset, width)?)
                    .unwrap_or(usize::MAX);
                len.saturating_sub(base_adjustment) / stride
            }
            DescriptorCount::Counted {
                offset,
                width,
                increment,
            } => {
                let raw = i64::try_from(self.read_count_field(page, offset, width)?)
                    .unwrap_or(i64::MAX);
                usize::try_from(raw.saturating_add(i64::from(increment)).max(0))
                    .unwrap_or(usize::MAX)
            }
            DescriptorCount::UntilPageEnd => {
                Self::page_end(page).saturating_sub(self.first_offset) / stride
            }
        };
        if count > MAX_DESCRIPTOR_COUNT {
            return Err(DescriptorError::ImplausibleCount {
                name: self.name,
                count,
            });
        }
        Ok(count)
    }

    fn fixed_starts(&self, page: &[u8], stride: usize) -> Result<Vec<usize>, DescriptorError> {
        let count = self.declared_count(page, stride)?.max(1);
        debug!("{}: {count} fixed-stride descriptors of {stride} bytes", self.name);
        Ok((0..count).map(|k| self.first_offset + stride * k).collect())
    }

    fn walk(
        &self,
        page: &[u8],
        len_offset: usize,
        len_width: u8,
    ) -> Result<Vec<usize>, DescriptorError> {
        let page_end = Self::page_end(page);
        let (end, limit) = match self.count {
            DescriptorCount::Counted { .. } => (page_end, Some(self.declared_count(page, 1)?)),
            DescriptorCount::ByteLength {
                offset,
                width,
                base_adjustment,
            } => {
                let len = usize::try_from(self.read_count_field(page, offset, width)?)
                    .unwrap_or(usize::MAX);
                let list_end = self
                    .first_offset
                    .saturating_add(len.saturating_sub(base_adjustment));
                (list_end.min(page_end), None)
            }
            DescriptorCount::UntilPageEnd => (page_end, None),
        };

        let header = len_offset + usize::from(len_width);
        let mut starts = Vec::new();
        let mut start = self.first_offset;
        while !limit.is_some_and(|limit| starts.len() >= limit) && start + header <= end {
            let Ok(reported) = read_be(page, start + len_offset, len_width) else {
                break;
            };
            let reported = usize::try_from(reported).unwrap_or(usize::MAX);
            if reported > MAX_DESCRIPTOR_LEN {
                warn!(
                    "{} at offset {start} reports length {reported}, \
                     abandoning walk after {} descriptors",
                    self.name,
                    starts.len()
                );
                break;
            }
            if start + header + reported > end {
                break;
            }
            debug!("{} {} at offset {start}, length {reported}", self.name, starts.len());
            starts.push(start);
            start += header + reported;
        }

        if starts.is_empty() {
            starts.push(self.first_offset);
        }
        Ok(starts)
    }
}

/// Resolved descriptor layout of one concrete page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instances {
    block: DescriptorBlock,
    starts: Vec<usize>,
    ids: Vec<Option<u8>>,
}

impl Instances {
    /// Number of descriptor instances (at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Always `false`: a page has at least its nominal instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// `true` when more than one instance is present.
    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.starts.len() > 1
    }

    /// Start offset of instance `k` within the page.
    #[must_use]
    pub fn start_of(&self, k: usize) -> Option<usize> {
        self.starts.get(k).copied()
    }

    /// Descriptor id embedded in instance `k`, when descriptors carry one.
    #[must_use]
    pub fn id_of(&self, k: usize) -> Option<u8> {
        self.ids.get(k).copied().flatten()
    }

    /// `true` when `field` lives inside the repeated descriptors rather than
    /// in the page-level part before them.
    #[must_use]
    pub const fn is_descriptor_field(&self, field: &FieldDescriptor) -> bool {
        field.start_byte >= self.block.first_offset
    }

    /// Effective offset of `field` in instance `k`.
    ///
    /// Page-level fields only exist in instance 0 and are never shifted.
    #[must_use]
    pub fn offset_of(&self, field: &FieldDescriptor, k: usize) -> Option<usize> {
        if !self.is_descriptor_field(field) {
            return (k == 0).then_some(field.start_byte);
        }
        let relative = field.start_byte - self.block.first_offset;
        match self.block.stride {
            DescriptorStride::Fixed(stride) => {
                (k < self.len()).then(|| field.start_byte + stride * k)
            }
            DescriptorStride::Variable { .. } => self.start_of(k).map(|start| start + relative),
        }
    }

    /// `true` when `field` is meaningful for instance `k`.
    ///
    /// Fields flagged [`FieldFlags::CLASH_OK`] apply only to instances whose
    /// embedded id equals the field's descriptor id.
    #[must_use]
    pub fn applies(&self, field: &FieldDescriptor, k: usize) -> bool {
        if k >= self.len() || (!self.is_descriptor_field(field) && k > 0) {
            return false;
        }
        if !field.flags.contains(FieldFlags::CLASH_OK) {
            return true;
        }
        match (field.desc_id, self.id_of(k)) {
            (Some(want), Some(have)) => want == have,
            _ => true,
        }
    }
}

/// Acronym of `acronym` for descriptor instance `k` (`ACRON`, `ACRON.1`, ...).
#[must_use]
pub fn instance_acronym(acronym: &str, k: usize) -> String {
    if k == 0 {
        acronym.to_string()
    } else {
        format!("{acronym}.{k}")
    }
}

/// Splits a trailing `.k` instance suffix off an acronym.
///
/// `"PHID.2"` yields `("PHID", Some(2))`; text without a numeric suffix is
/// returned unchanged with `None`.
#[must_use]
pub fn split_instance_suffix(text: &str) -> (&str, Option<usize>) {
    match text.rsplit_once('.') {
        Some((name, suffix)) if !name.is_empty() && !suffix.is_empty() => {
            suffix.parse().map_or((text, None), |k| (name, Some(k)))
        }
        _ => (text, None),
    }
}
