//! Page descriptors, page control variants and fetched page buffers.

use std::fmt;

use crate::descriptor::DescriptorBlock;
use crate::pdt::PdtFilter;

/// Parameter savable bit in byte 0 of a page.
pub const PS_BIT: u8 = 0x80;
/// Subpage format bit in byte 0 of a page.
pub const SPF_BIT: u8 = 0x40;
/// Page code bits in byte 0 of a page.
pub const PAGE_CODE_MASK: u8 = 0x3F;
/// Highest page code that names a real page (0x3f means "all pages").
pub const MAX_PAGE_CODE: u8 = 0x3E;

/// Page codes that some devices report in place of the requested one.
///
/// Each entry is `(requested, reported)`: the power condition page (0x1a)
/// shares its layout with the page 0x0d that pre-standard devices return.
pub const EQUIVALENT_PAGE_NUMBERS: &[(u8, u8)] = &[(0x1A, 0x0D)];

/// Returns `true` when a page reporting `reported` answers a request for
/// `requested`.
#[must_use]
pub fn page_numbers_match(requested: u8, reported: u8) -> bool {
    requested == reported || EQUIVALENT_PAGE_NUMBERS.contains(&(requested, reported))
}

/// Page code carried in byte 0.
#[must_use]
pub fn page_code(page: &[u8]) -> Option<u8> {
    page.first().map(|byte| byte & PAGE_CODE_MASK)
}

/// `true` when the page uses the subpage (4-byte header) format.
#[must_use]
pub fn has_subpage_format(page: &[u8]) -> bool {
    page.first().is_some_and(|byte| byte & SPF_BIT != 0)
}

/// `true` when the device reports the page as savable.
#[must_use]
pub fn is_savable(page: &[u8]) -> bool {
    page.first().is_some_and(|byte| byte & PS_BIT != 0)
}

/// Header length of the page: 4 bytes in subpage format, else 2.
#[must_use]
pub fn page_header_len(page: &[u8]) -> usize {
    if has_subpage_format(page) {
        4
    } else {
        2
    }
}

/// Total page length (header included) as reported by the page itself.
///
/// Returns `None` when the header bytes are not present.
#[must_use]
pub fn reported_page_len(page: &[u8]) -> Option<usize> {
    if has_subpage_format(page) {
        let len = page.get(2..4)?;
        Some(4 + usize::from(u16::from_be_bytes([len[0], len[1]])))
    } else {
        page.get(1).map(|len| 2 + usize::from(*len))
    }
}

/// Page/subpage pair identifying a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PageKey {
    /// Page code (0..=0x3e).
    pub page: u8,
    /// Subpage code.
    pub subpage: u8,
}

impl PageKey {
    /// Builds a key.
    #[must_use]
    pub const fn new(page: u8, subpage: u8) -> Self {
        Self { page, subpage }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subpage == 0 {
            write!(f, "0x{:02x}", self.page)
        } else {
            write!(f, "0x{:02x},0x{:02x}", self.page, self.subpage)
        }
    }
}

/// Immutable description of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageDescriptor {
    /// Page code.
    pub page: u8,
    /// Subpage code.
    pub subpage: u8,
    /// Device-type restriction.
    pub pdt: PdtFilter,
    /// Short name.
    pub acronym: &'static str,
    /// Human name.
    pub name: &'static str,
    /// Repeated descriptor layout, when the page has one.
    pub descriptors: Option<DescriptorBlock>,
}

impl PageDescriptor {
    /// Describes a page without repeating descriptors.
    #[must_use]
    pub const fn new(page: u8, subpage: u8, acronym: &'static str, name: &'static str) -> Self {
        Self {
            page,
            subpage,
            pdt: PdtFilter::Any,
            acronym,
            name,
            descriptors: None,
        }
    }

    /// Restricts the page to one device type.
    #[must_use]
    pub const fn for_pdt(mut self, pdt: PdtFilter) -> Self {
        self.pdt = pdt;
        self
    }

    /// Attaches a repeated descriptor layout.
    #[must_use]
    pub const fn with_descriptors(mut self, block: DescriptorBlock) -> Self {
        self.descriptors = Some(block);
        self
    }

    /// Page/subpage key.
    #[must_use]
    pub const fn key(&self) -> PageKey {
        PageKey::new(self.page, self.subpage)
    }
}

impl fmt::Display for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.name, self.acronym, self.key())
    }
}

/// Page control selector of MODE SENSE (byte 2, bits 7..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum PageControl {
    /// Values in effect.
    Current = 0b00,
    /// Mask of bits the device allows to change.
    Changeable = 0b01,
    /// Manufacturer defaults.
    Default = 0b10,
    /// Values restored at power on.
    Saved = 0b11,
}

impl PageControl {
    /// All variants in fetch order.
    pub const ALL: [Self; 4] = [Self::Current, Self::Changeable, Self::Default, Self::Saved];

    /// Two-bit selector value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Changeable => "changeable",
            Self::Default => "default",
            Self::Saved => "saved",
        }
    }
}

impl fmt::Display for PageControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One fetched page variant.
///
/// Holds the whole mode-data response so a write-back can resend it, plus
/// the offset of the page inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBuffer {
    control: PageControl,
    response: Vec<u8>,
    page_offset: usize,
    page_len: usize,
}

impl PageBuffer {
    /// Wraps a validated response. `page_offset + page_len` must not exceed
    /// the response length.
    #[must_use]
    pub(crate) fn new(
        control: PageControl,
        response: Vec<u8>,
        page_offset: usize,
        page_len: usize,
    ) -> Self {
        let page_offset = page_offset.min(response.len());
        let page_len = page_len.min(response.len() - page_offset);
        Self {
            control,
            response,
            page_offset,
            page_len,
        }
    }

    /// Variant this buffer holds.
    #[must_use]
    pub const fn control(&self) -> PageControl {
        self.control
    }

    /// Page bytes starting at the page code byte, limited to the validated
    /// page length.
    #[must_use]
    pub fn page(&self) -> &[u8] {
        &self.response[self.page_offset..self.page_offset + self.page_len]
    }

    /// Page bytes up to the end of the response (may exceed the page's
    /// declared length when the device over-reports).
    #[must_use]
    pub fn page_tail(&self) -> &[u8] {
        &self.response[self.page_offset..]
    }

    /// Mutable page bytes up to the end of the response.
    pub fn page_tail_mut(&mut self) -> &mut [u8] {
        &mut self.response[self.page_offset..]
    }

    /// Validated page length.
    #[must_use]
    pub const fn page_len(&self) -> usize {
        self.page_len
    }

    /// Offset of the page inside the mode-data response.
    #[must_use]
    pub const fn page_offset(&self) -> usize {
        self.page_offset
    }

    /// Whole mode-data response.
    #[must_use]
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Mutable whole mode-data response.
    pub fn response_mut(&mut self) -> &mut [u8] {
        &mut self.response
    }

    /// `true` when the page's PS bit is set.
    #[must_use]
    pub fn is_savable(&self) -> bool {
        is_savable(self.page())
    }

    /// Consumes the buffer, returning the response bytes.
    #[must_use]
    pub fn into_response(self) -> Vec<u8> {
        self.response
    }
}

/// The four variants of one page; absent variants were refused by the
/// device or not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageVariants {
    /// Current values.
    pub current: Option<PageBuffer>,
    /// Changeable mask.
    pub changeable: Option<PageBuffer>,
    /// Default values.
    pub default: Option<PageBuffer>,
    /// Saved values.
    pub saved: Option<PageBuffer>,
}

impl PageVariants {
    /// Returns the buffer for `control`, if fetched.
    #[must_use]
    pub const fn get(&self, control: PageControl) -> Option<&PageBuffer> {
        match control {
            PageControl::Current => self.current.as_ref(),
            PageControl::Changeable => self.changeable.as_ref(),
            PageControl::Default => self.default.as_ref(),
            PageControl::Saved => self.saved.as_ref(),
        }
    }

    /// Stores a buffer in the slot named by its control variant.
    pub fn insert(&mut self, buffer: PageBuffer) {
        let slot = match buffer.control() {
            PageControl::Current => &mut self.current,
            PageControl::Changeable => &mut self.changeable,
            PageControl::Default => &mut self.default,
            PageControl::Saved => &mut self.saved,
        };
        *slot = Some(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        page_code, page_header_len, page_numbers_match, reported_page_len, PageBuffer,
        PageControl, PageKey, PageVariants,
    };

    #[test]
    fn short_header_page_length() {
        let page = [0x88, 0x12, 0, 0];
        assert_eq!(page_code(&page), Some(0x08));
        assert_eq!(page_header_len(&page), 2);
        assert_eq!(reported_page_len(&page), Some(20));
    }

    #[test]
    fn subpage_header_page_length() {
        let page = [0x59, 0x01, 0x00, 0x30];
        assert_eq!(page_code(&page), Some(0x19));
        assert_eq!(page_header_len(&page), 4);
        assert_eq!(reported_page_len(&page), Some(0x34));
        assert_eq!(reported_page_len(&page[..3]), None);
    }

    #[test]
    fn legacy_power_condition_page_matches() {
        assert!(page_numbers_match(0x1A, 0x1A));
        assert!(page_numbers_match(0x1A, 0x0D));
        assert!(!page_numbers_match(0x0D, 0x1A));
        assert!(!page_numbers_match(0x08, 0x0A));
    }

    #[test]
    fn key_display() {
        assert_eq!(PageKey::new(0x08, 0).to_string(), "0x08");
        assert_eq!(PageKey::new(0x19, 1).to_string(), "0x19,0x01");
    }

    #[test]
    fn buffer_views_are_clamped_to_response() {
        let response = vec![0, 0, 0, 0, 0x08, 0x02, 1, 2];
        let buffer = PageBuffer::new(PageControl::Current, response, 4, 10);
        assert_eq!(buffer.page(), &[0x08, 0x02, 1, 2]);
        assert_eq!(buffer.page_len(), 4);
        assert!(!buffer.is_savable());
    }

    #[test]
    fn variants_slot_by_control() {
        let mut variants = PageVariants::default();
        variants.insert(PageBuffer::new(PageControl::Default, vec![0x08, 0x00], 0, 2));
        assert!(variants.get(PageControl::Default).is_some());
        assert!(variants.get(PageControl::Current).is_none());
    }
}
