use thiserror::Error;

use crate::bits::BitsError;
use crate::descriptor::DescriptorError;
use crate::device::{DeviceError, ModeCommand};
use crate::page::PageKey;
use crate::registry::Namespace;

/// Process exit status for success.
pub const EXIT_SUCCESS: u8 = 0;
/// Item or option syntax error.
pub const EXIT_SYNTAX: u8 = 1;
/// Device not ready.
pub const EXIT_NOT_READY: u8 = 2;
/// Device rejected a field of the request.
pub const EXIT_ILLEGAL_REQUEST: u8 = 5;
/// Unit attention.
pub const EXIT_UNIT_ATTENTION: u8 = 6;
/// Command opcode not supported.
pub const EXIT_INVALID_OP: u8 = 9;
/// Command aborted.
pub const EXIT_ABORTED: u8 = 11;
/// Device could not be opened or identified.
pub const EXIT_FILE_ERROR: u8 = 15;
/// Request contradicts itself or the device state.
pub const EXIT_CONTRADICT: u8 = 31;
/// Device returned malformed data.
pub const EXIT_MALFORMED: u8 = 97;
/// Anything else.
pub const EXIT_OTHER: u8 = 99;

/// Error categories used for exit status aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Bad item, value or coordinates.
    Syntax,
    /// Device not ready.
    NotReady,
    /// Device rejected the request or page.
    IllegalRequest,
    /// Unit attention pending.
    UnitAttention,
    /// Command width or opcode unsupported.
    InvalidOp,
    /// Command aborted.
    Aborted,
    /// Device could not be opened or identified.
    DeviceOpen,
    /// Request contradicts itself or the page state.
    Contradiction,
    /// Response failed validation.
    Malformed,
    /// Unclassified transport failure.
    Other,
}

impl ErrorClass {
    /// sg3_utils style exit status for this class.
    #[must_use]
    pub const fn exit_status(self) -> u8 {
        match self {
            Self::Syntax => EXIT_SYNTAX,
            Self::NotReady => EXIT_NOT_READY,
            Self::IllegalRequest => EXIT_ILLEGAL_REQUEST,
            Self::UnitAttention => EXIT_UNIT_ATTENTION,
            Self::InvalidOp => EXIT_INVALID_OP,
            Self::Aborted => EXIT_ABORTED,
            Self::DeviceOpen => EXIT_FILE_ERROR,
            Self::Contradiction => EXIT_CONTRADICT,
            Self::Malformed => EXIT_MALFORMED,
            Self::Other => EXIT_OTHER,
        }
    }
}

/// Failures turning user items into field bindings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No table in the selected namespace defines the acronym.
    #[error("acronym {acronym} not found in {namespace} tables")]
    UnknownAcronym {
        /// Acronym as given.
        acronym: String,
        /// Namespace searched.
        namespace: Namespace,
    },
    /// Items of one request resolve to different pages.
    #[error("{label} belongs to page {found}, contradicting page {expected} of earlier items")]
    PageContradiction {
        /// Field label.
        label: String,
        /// Page established by the earlier items.
        expected: PageKey,
        /// Page of this item.
        found: PageKey,
    },
    /// Raw coordinates outside the codec limits.
    #[error("coordinates {item} out of range: {source}")]
    CoordinatesOutOfRange {
        /// Item text.
        item: String,
        /// Violated limit.
        source: BitsError,
    },
    /// Item text could not be parsed.
    #[error("cannot parse item {item:?}")]
    BadItemSyntax {
        /// Item text.
        item: String,
    },
    /// Value part of an item could not be parsed.
    #[error("bad value {value:?} for {item}")]
    BadValue {
        /// Field label.
        item: String,
        /// Value text.
        value: String,
    },
    /// Descriptor instance suffix beyond the descriptors present.
    #[error("{label}: descriptor {index} requested but page {page} holds {count}")]
    DescriptorIndexOutOfRange {
        /// Field label including the instance suffix.
        label: String,
        /// Page holding the field.
        page: PageKey,
        /// Requested instance.
        index: usize,
        /// Instances present.
        count: usize,
    },
    /// Raw coordinates given without any page to apply them to.
    #[error("{item}: raw coordinates need a page")]
    PageRequired {
        /// Item text.
        item: String,
    },
    /// Page not described in the selected namespace.
    #[error("page {page} not found in {namespace} tables")]
    UnknownPage {
        /// Page requested.
        page: PageKey,
        /// Namespace searched.
        namespace: Namespace,
    },
}

/// Device command failures, tagged with the page they concerned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// This command width is not supported by the device.
    #[error(
        "{command} not supported for page {page}, try the {}-byte variant",
        .command.other_width()
    )]
    UnsupportedCommand {
        /// Command that was refused.
        command: ModeCommand,
        /// Page concerned.
        page: PageKey,
    },
    /// Device refused to return the page.
    #[error("page {page} not supported by device")]
    PageNotSupported {
        /// Page concerned.
        page: PageKey,
    },
    /// Any other device failure.
    #[error("{command} on page {page} failed: {source}")]
    Device {
        /// Command issued.
        command: ModeCommand,
        /// Page concerned.
        page: PageKey,
        /// Device-reported category.
        source: DeviceError,
    },
}

impl TransportError {
    /// Classifies a failed mode command. `read` selects the plain-read
    /// interpretation of an illegal request.
    #[must_use]
    pub fn from_device(
        command: ModeCommand,
        page: PageKey,
        source: DeviceError,
        read: bool,
    ) -> Self {
        match source {
            DeviceError::UnsupportedCommand => Self::UnsupportedCommand { command, page },
            DeviceError::IllegalRequest if read => Self::PageNotSupported { page },
            source => Self::Device {
                command,
                page,
                source,
            },
        }
    }

    const fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedCommand { .. } => ErrorClass::InvalidOp,
            Self::PageNotSupported { .. } => ErrorClass::IllegalRequest,
            Self::Device { source, .. } => match source {
                DeviceError::UnsupportedCommand => ErrorClass::InvalidOp,
                DeviceError::IllegalRequest => ErrorClass::IllegalRequest,
                DeviceError::NotReady => ErrorClass::NotReady,
                DeviceError::UnitAttention => ErrorClass::UnitAttention,
                DeviceError::Aborted => ErrorClass::Aborted,
                DeviceError::Io(_) => ErrorClass::Other,
            },
        }
    }
}

/// Response data that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedError {
    /// Page code in the response differs from the one requested.
    #[error("requested page {expected} but device returned {found}")]
    PageMismatch {
        /// Page requested.
        expected: PageKey,
        /// Page found in the response.
        found: PageKey,
    },
    /// Response shorter than its own declared length.
    #[error("page {page}: response truncated, {received} of {declared} bytes")]
    Truncated {
        /// Page concerned.
        page: PageKey,
        /// Declared length.
        declared: usize,
        /// Bytes received.
        received: usize,
    },
    /// Declared mode data length larger than the allocation.
    #[error("page {page}: declared length {declared} exceeds allocation {allocated}")]
    ExceedsAllocation {
        /// Page concerned.
        page: PageKey,
        /// Declared length.
        declared: usize,
        /// Allocation length used.
        allocated: usize,
    },
    /// Block descriptors push the page header past the response.
    #[error("page {page}: page header at offset {offset} beyond response of {len} bytes")]
    PageBeyondResponse {
        /// Page concerned.
        page: PageKey,
        /// Page offset in the response.
        offset: usize,
        /// Response length.
        len: usize,
    },
    /// Field lies beyond the validated page length.
    #[error("{label}: byte {start_byte} beyond page {page} length {page_len}")]
    FieldBeyondPage {
        /// Field label.
        label: String,
        /// Page concerned.
        page: PageKey,
        /// Effective start byte.
        start_byte: usize,
        /// Validated page length.
        page_len: usize,
    },
    /// Response too short to hold a mode parameter header.
    #[error("mode parameter header needs {needed} bytes, got {len}")]
    HeaderTooShort {
        /// Header length for the command width.
        needed: usize,
        /// Bytes received.
        len: usize,
    },
    /// Descriptor block could not be resolved.
    #[error("page {page}: {source}")]
    Descriptor {
        /// Page concerned.
        page: PageKey,
        /// Descriptor failure.
        source: DescriptorError,
    },
}

/// Request inconsistent with what the device reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    /// Save requested for a page whose PS bit is clear.
    #[error("page {page} is not savable, refusing to save")]
    NotSavable {
        /// Page concerned.
        page: PageKey,
    },
    /// Reset requested but the default values are unavailable.
    #[error("page {page}: no default values available")]
    NoDefaults {
        /// Page concerned.
        page: PageKey,
    },
}

/// Umbrella error of every page operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Item resolution failure.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// Device command failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Response validation failure.
    #[error(transparent)]
    Malformed(#[from] MalformedError),
    /// Request inconsistent with the device state.
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    /// Device could not be opened or identified.
    #[error("{device}: cannot open: {reason}")]
    DeviceOpen {
        /// Device name.
        device: String,
        /// Failure description.
        reason: String,
    },
}

impl Error {
    /// Category used for exit status aggregation.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Resolution(ResolutionError::PageContradiction { .. }) => {
                ErrorClass::Contradiction
            }
            Self::Resolution(_) => ErrorClass::Syntax,
            Self::Transport(e) => e.class(),
            Self::Malformed(_) => ErrorClass::Malformed,
            Self::Consistency(_) => ErrorClass::Contradiction,
            Self::DeviceOpen { .. } => ErrorClass::DeviceOpen,
        }
    }

    /// sg3_utils style exit status.
    #[must_use]
    pub const fn exit_status(&self) -> u8 {
        self.class().exit_status()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{
        ConsistencyError, Error, ErrorClass, MalformedError, ResolutionError, TransportError,
        EXIT_CONTRADICT,
    };
    use crate::device::{DeviceError, ModeCommand};
    use crate::page::PageKey;
    use crate::registry::Namespace;

    const CACHING: PageKey = PageKey::new(0x08, 0);

    #[rstest]
    #[case(DeviceError::NotReady, 2)]
    #[case(DeviceError::UnitAttention, 6)]
    #[case(DeviceError::Aborted, 11)]
    #[case(DeviceError::UnsupportedCommand, 9)]
    #[case(DeviceError::Io("gone".into()), 99)]
    fn device_errors_map_to_exit_codes(#[case] source: DeviceError, #[case] status: u8) {
        let error = Error::from(TransportError::from_device(
            ModeCommand::Sense10,
            CACHING,
            source,
            false,
        ));
        assert_eq!(error.exit_status(), status);
    }

    #[test]
    fn illegal_request_on_read_means_page_not_supported() {
        let error = TransportError::from_device(
            ModeCommand::Sense6,
            CACHING,
            DeviceError::IllegalRequest,
            true,
        );
        assert_eq!(error, TransportError::PageNotSupported { page: CACHING });
        assert_eq!(Error::from(error).exit_status(), 5);
    }

    #[test]
    fn unsupported_command_suggests_other_width() {
        let error = TransportError::from_device(
            ModeCommand::Sense6,
            CACHING,
            DeviceError::UnsupportedCommand,
            true,
        );
        assert!(error.to_string().contains("10-byte"));
    }

    #[test]
    fn consistency_and_contradiction_share_exit_status() {
        let not_savable = Error::from(ConsistencyError::NotSavable { page: CACHING });
        let mixed = Error::from(ResolutionError::PageContradiction {
            label: "IDLE_A".into(),
            expected: CACHING,
            found: PageKey::new(0x1A, 0),
        });
        assert_eq!(not_savable.exit_status(), EXIT_CONTRADICT);
        assert_eq!(mixed.class(), ErrorClass::Contradiction);
    }

    #[test]
    fn messages_name_field_and_page() {
        let error = Error::from(MalformedError::FieldBeyondPage {
            label: "WCE.2".into(),
            page: CACHING,
            start_byte: 40,
            page_len: 20,
        });
        let text = error.to_string();
        assert!(text.contains("WCE.2"));
        assert!(text.contains("0x08"));
        assert_eq!(error.class(), ErrorClass::Malformed);
    }

    #[test]
    fn unknown_page_names_the_namespace_searched() {
        let error = Error::from(ResolutionError::UnknownPage {
            page: PageKey::new(0x05, 0),
            namespace: Namespace::Generic,
        });
        assert_eq!(error.to_string(), "page 0x05 not found in generic tables");
        assert_eq!(error.exit_status(), 1);
    }
}
