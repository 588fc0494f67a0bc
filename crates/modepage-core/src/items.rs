//! Item parsing and resolution.
//!
//! An item names one field, either by acronym with an optional descriptor
//! instance (`WCE`, `PHID.2`) or by raw coordinates (`12:7:16`), optionally
//! followed by `=value`. Every item of one request must resolve to the same
//! page; this is checked here, before the device is touched.

use crate::bits::{self, BitsError};
use crate::descriptor::split_instance_suffix;
use crate::device::MAX_MODE_SENSE10_LEN;
use crate::error::ResolutionError;
use crate::field::FieldDescriptor;
use crate::page::PageKey;
use crate::pdt::Pdt;
use crate::registry::{pdt_applies, Namespace, Registry};

/// What a list of items is for; decides the implied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemMode {
    /// Read values; items carry no value.
    Get,
    /// Write values; a bare item means 1.
    Set,
    /// Write zero; items carry no value.
    Clear,
}

/// Value text after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawValue {
    /// Plain number.
    Number(u64),
    /// `-1`: every bit of the field set.
    AllOnes,
}

/// How an item names its field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemName {
    /// Table acronym plus optional descriptor instance.
    Acronym {
        /// Acronym text.
        acronym: String,
        /// Instance from a `.k` suffix.
        instance: Option<usize>,
    },
    /// Raw `byte:bit:width` coordinates.
    Coordinates {
        /// Start byte within the page.
        start_byte: usize,
        /// Bit holding the MSB.
        start_bit: u8,
        /// Width in bits.
        width: u8,
    },
}

/// One parsed but unresolved item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemSpec {
    /// Item text as supplied.
    pub text: String,
    /// Field name.
    pub name: ItemName,
    /// Parsed value, `None` for queries.
    pub value: Option<RawValue>,
    /// Value text as supplied, when one was given.
    pub literal: Option<String>,
}

/// Target of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ItemValue {
    /// Read the field.
    Query,
    /// Write this value, already masked to the field width.
    Set(u64),
}

/// A field resolved from an item, ready for the editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemBinding {
    /// Field addressed.
    pub field: FieldDescriptor,
    /// What to do with it.
    pub value: ItemValue,
    /// Descriptor instance, when one was named.
    pub instance: Option<usize>,
    /// Value text as supplied.
    pub literal: Option<String>,
    /// Value before masking.
    pub requested: Option<RawValue>,
}

impl ItemBinding {
    /// Field label including the instance suffix.
    #[must_use]
    pub fn label(&self) -> String {
        self.field
            .instance_label(self.instance.unwrap_or(0))
            .to_string()
    }

    /// `true` when masking to the field width dropped set bits.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        match (self.requested, self.value) {
            (Some(RawValue::Number(raw)), ItemValue::Set(masked)) => raw != masked,
            _ => false,
        }
    }
}

/// Items of one request, all on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItems {
    /// Page every binding belongs to.
    pub page: PageKey,
    /// Bindings in request order.
    pub bindings: Vec<ItemBinding>,
}

fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = text.strip_suffix('h').or_else(|| text.strip_suffix('H')) {
        return u64::from_str_radix(hex, 16).ok();
    }
    text.parse().ok()
}

/// Parses a value: decimal, `0x` prefixed or `h` suffixed hex, or `-1`.
#[must_use]
pub fn parse_value(text: &str) -> Option<RawValue> {
    if text.trim() == "-1" {
        Some(RawValue::AllOnes)
    } else {
        parse_number(text).map(RawValue::Number)
    }
}

fn parse_name(text: &str) -> Option<ItemName> {
    if text.contains(':') {
        let mut parts = text.split(':');
        let start_byte = parse_number(parts.next()?)?;
        let start_bit = parse_number(parts.next()?)?;
        let width = parse_number(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        return Some(ItemName::Coordinates {
            start_byte: usize::try_from(start_byte).ok()?,
            start_bit: u8::try_from(start_bit).ok()?,
            width: u8::try_from(width).ok()?,
        });
    }
    let (acronym, instance) = split_instance_suffix(text);
    let valid = !acronym.is_empty()
        && acronym
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| ItemName::Acronym {
        acronym: acronym.to_string(),
        instance,
    })
}

/// Parses one item.
///
/// # Errors
///
/// [`ResolutionError::BadItemSyntax`] for malformed names or values where
/// `mode` allows none, [`ResolutionError::BadValue`] for unparsable values.
pub fn parse_item(text: &str, mode: ItemMode) -> Result<ItemSpec, ResolutionError> {
    let bad_syntax = || ResolutionError::BadItemSyntax {
        item: text.to_string(),
    };
    let (name_text, literal) = match text.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (text.trim(), None),
    };
    let name = parse_name(name_text).ok_or_else(bad_syntax)?;
    let value = match (mode, literal) {
        (ItemMode::Get | ItemMode::Clear, Some(_)) => return Err(bad_syntax()),
        (ItemMode::Get, None) => None,
        (ItemMode::Clear, None) => Some(RawValue::Number(0)),
        (ItemMode::Set, None) => Some(RawValue::Number(1)),
        (ItemMode::Set, Some(literal)) => {
            Some(parse_value(literal).ok_or_else(|| ResolutionError::BadValue {
                item: name_text.to_string(),
                value: literal.to_string(),
            })?)
        }
    };
    Ok(ItemSpec {
        text: text.to_string(),
        name,
        value,
        literal: literal.map(str::to_string),
    })
}

/// Parses a comma separated item list.
///
/// # Errors
///
/// Same as [`parse_item`]; an empty entry is a syntax error.
pub fn parse_items(list: &str, mode: ItemMode) -> Result<Vec<ItemSpec>, ResolutionError> {
    list.split(',')
        .map(|item| {
            if item.trim().is_empty() {
                Err(ResolutionError::BadItemSyntax {
                    item: list.to_string(),
                })
            } else {
                parse_item(item, mode)
            }
        })
        .collect()
}

fn page_of(field: &FieldDescriptor) -> PageKey {
    PageKey::new(field.page, field.subpage)
}

fn resolve_acronym(
    registry: &Registry,
    acronym: &str,
    instance: Option<usize>,
    namespace: Namespace,
    pdt: Option<Pdt>,
    page: Option<PageKey>,
) -> Result<FieldDescriptor, ResolutionError> {
    let candidates: Vec<_> = registry
        .fields_by_acronym(acronym, namespace)
        .into_iter()
        .filter(|found| pdt_applies(found.field.pdt, pdt))
        .collect();
    let Some(first) = candidates.first() else {
        return Err(ResolutionError::UnknownAcronym {
            acronym: acronym.to_string(),
            namespace,
        });
    };
    let Some(expected) = page else {
        return Ok(*first.field);
    };
    candidates
        .iter()
        .find(|found| page_of(found.field) == expected)
        .map(|found| *found.field)
        .ok_or_else(|| ResolutionError::PageContradiction {
            label: first.field.instance_label(instance.unwrap_or(0)).to_string(),
            expected,
            found: page_of(first.field),
        })
}

/// Raw coordinates must be well formed and end inside the largest mode
/// data response a device can return.
fn within_mode_data(raw: &FieldDescriptor) -> Result<(), BitsError> {
    raw.validate()?;
    let span = raw.span();
    match raw.start_byte.checked_add(span) {
        Some(end) if end <= MAX_MODE_SENSE10_LEN => Ok(()),
        _ => Err(BitsError::OutOfBounds {
            start_byte: raw.start_byte,
            span,
            len: MAX_MODE_SENSE10_LEN,
        }),
    }
}

/// Resolves parsed items against the registry.
///
/// `page`, when given, is the page every item must belong to; otherwise
/// the first acronym item decides it. Raw coordinates take the page of the
/// request and are named after a table field at the same position when one
/// exists.
///
/// # Errors
///
/// Returns the first [`ResolutionError`]; no binding is produced when any
/// item fails.
pub fn resolve_items(
    registry: &Registry,
    specs: &[ItemSpec],
    namespace: Namespace,
    pdt: Option<Pdt>,
    page: Option<PageKey>,
) -> Result<ResolvedItems, ResolutionError> {
    let mut page = page;
    let mut bindings = Vec::with_capacity(specs.len());
    for spec in specs {
        let (field, instance) = match &spec.name {
            ItemName::Acronym { acronym, instance } => (
                resolve_acronym(registry, acronym, *instance, namespace, pdt, page)?,
                *instance,
            ),
            ItemName::Coordinates {
                start_byte,
                start_bit,
                width,
            } => {
                let key = page.ok_or_else(|| ResolutionError::PageRequired {
                    item: spec.text.clone(),
                })?;
                let raw =
                    FieldDescriptor::raw(key.page, key.subpage, *start_byte, *start_bit, *width);
                within_mode_data(&raw).map_err(|source| {
                    ResolutionError::CoordinatesOutOfRange {
                        item: spec.text.clone(),
                        source,
                    }
                })?;
                let named = registry
                    .find_field_by_position(key, *start_byte, *start_bit, namespace)
                    .filter(|field| field.width == *width)
                    .copied();
                (named.unwrap_or(raw), None)
            }
        };
        page.get_or_insert(page_of(&field));

        let mask = bits::mask(field.width);
        let value = match spec.value {
            None => ItemValue::Query,
            Some(RawValue::AllOnes) => ItemValue::Set(mask),
            Some(RawValue::Number(raw)) => ItemValue::Set(raw & mask),
        };
        bindings.push(ItemBinding {
            field,
            value,
            instance,
            literal: spec.literal.clone(),
            requested: spec.value,
        });
    }
    let page = page.ok_or_else(|| ResolutionError::BadItemSyntax {
        item: String::new(),
    })?;
    Ok(ResolvedItems { page, bindings })
}
