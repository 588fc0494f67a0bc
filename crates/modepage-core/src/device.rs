//! Narrow device boundary consumed by the page editor.
//!
//! The operating-system pass-through that actually issues MODE SENSE, MODE
//! SELECT and INQUIRY lives outside this crate; it is reached only through
//! [`DeviceCommandExecutor`].

use std::fmt;

use thiserror::Error;

use crate::page::PageControl;
use crate::pdt::Pdt;

/// Largest allocation length a MODE SENSE(6) response is requested with.
pub const MAX_MODE_SENSE6_LEN: usize = 252;
/// Largest allocation length a MODE SENSE(10) response is requested with.
pub const MAX_MODE_SENSE10_LEN: usize = 0xFFFF;

/// Failure categories reported by a device command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum DeviceError {
    /// Command opcode (or this width of it) is not supported.
    #[error("command not supported")]
    UnsupportedCommand,
    /// A field in the command or parameter data was rejected.
    #[error("illegal field in request")]
    IllegalRequest,
    /// Device is not ready.
    #[error("device not ready")]
    NotReady,
    /// Unit attention condition pending.
    #[error("unit attention")]
    UnitAttention,
    /// Command was aborted.
    #[error("aborted command")]
    Aborted,
    /// Any other transport or device failure.
    #[error("i/o failure: {0}")]
    Io(String),
}

/// Mode data command as issued to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeCommand {
    /// MODE SENSE(6).
    Sense6,
    /// MODE SENSE(10).
    Sense10,
    /// MODE SELECT(6).
    Select6,
    /// MODE SELECT(10).
    Select10,
}

impl ModeCommand {
    /// MODE SENSE of the requested width.
    #[must_use]
    pub const fn sense(six_byte: bool) -> Self {
        if six_byte {
            Self::Sense6
        } else {
            Self::Sense10
        }
    }

    /// MODE SELECT of the requested width.
    #[must_use]
    pub const fn select(six_byte: bool) -> Self {
        if six_byte {
            Self::Select6
        } else {
            Self::Select10
        }
    }

    /// CDB length of the alternative width, suggested when this one is not
    /// supported.
    #[must_use]
    pub const fn other_width(self) -> u8 {
        match self {
            Self::Sense6 | Self::Select6 => 10,
            Self::Sense10 | Self::Select10 => 6,
        }
    }
}

impl fmt::Display for ModeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sense6 => "MODE SENSE(6)",
            Self::Sense10 => "MODE SENSE(10)",
            Self::Select6 => "MODE SELECT(6)",
            Self::Select10 => "MODE SELECT(10)",
        })
    }
}

/// Parameters of one MODE SENSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeReadRequest {
    /// Use MODE SENSE(6) instead of MODE SENSE(10).
    pub six_byte: bool,
    /// Ask the device to omit block descriptors.
    pub disable_block_descriptors: bool,
    /// Page control variant.
    pub control: PageControl,
    /// Page code.
    pub page: u8,
    /// Subpage code.
    pub subpage: u8,
    /// Allocation length.
    pub alloc_len: usize,
}

/// Data returned by one MODE SENSE.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModeResponse {
    /// Response buffer; its tail may be unfilled when `residual` is non-zero.
    pub bytes: Vec<u8>,
    /// Number of bytes at the end of `bytes` the device did not transfer.
    pub residual: usize,
}

impl ModeResponse {
    /// Response that filled all of `bytes`.
    #[must_use]
    pub const fn complete(bytes: Vec<u8>) -> Self {
        Self { bytes, residual: 0 }
    }

    /// Number of bytes actually transferred.
    #[must_use]
    pub fn received(&self) -> usize {
        self.bytes.len().saturating_sub(self.residual)
    }
}

/// Parameters of one MODE SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeWriteRequest<'a> {
    /// Use MODE SELECT(6) instead of MODE SELECT(10).
    pub six_byte: bool,
    /// Ask the device to also store the page as its saved values.
    pub save: bool,
    /// Parameter list: mode parameter header, block descriptors and page.
    pub bytes: &'a [u8],
}

/// Identity fields from standard INQUIRY data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// Peripheral device type.
    pub pdt: Pdt,
    /// T10 vendor identification.
    pub vendor: String,
    /// Product identification.
    pub product: String,
    /// Product revision level.
    pub revision: String,
}

impl DeviceIdentity {
    /// Parses standard INQUIRY data (at least 36 bytes).
    #[must_use]
    pub fn from_inquiry(data: &[u8]) -> Option<Self> {
        if data.len() < 36 {
            return None;
        }
        Some(Self {
            pdt: Pdt::new(data[0]),
            vendor: trim_ascii(&data[8..16]),
            product: trim_ascii(&data[16..32]),
            revision: trim_ascii(&data[32..36]),
        })
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8}  {:<16}  {:<4}  [pdt={}]",
            self.vendor,
            self.product,
            self.revision,
            self.pdt.value()
        )
    }
}

fn trim_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Command/response channel to one device.
pub trait DeviceCommandExecutor {
    /// Issues MODE SENSE.
    ///
    /// # Errors
    ///
    /// Returns the [`DeviceError`] category reported by the device or
    /// transport.
    fn mode_read(&mut self, request: &ModeReadRequest) -> Result<ModeResponse, DeviceError>;

    /// Issues MODE SELECT with the page-format bit set.
    ///
    /// # Errors
    ///
    /// Returns the [`DeviceError`] category reported by the device or
    /// transport.
    fn mode_write(&mut self, request: &ModeWriteRequest<'_>) -> Result<(), DeviceError>;

    /// Issues a standard INQUIRY.
    ///
    /// # Errors
    ///
    /// Returns the [`DeviceError`] category reported by the device or
    /// transport.
    fn inquiry(&mut self) -> Result<DeviceIdentity, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::{DeviceIdentity, ModeCommand, ModeResponse};
    use crate::pdt::Pdt;

    #[test]
    fn parses_standard_inquiry() {
        let mut data = vec![0u8; 36];
        data[0] = 0x01;
        data[8..16].copy_from_slice(b"ACME    ");
        data[16..32].copy_from_slice(b"TAPE DRIVE      ");
        data[32..36].copy_from_slice(b"1.0 ");
        let identity = DeviceIdentity::from_inquiry(&data).expect("long enough");
        assert_eq!(identity.pdt, Pdt::TAPE);
        assert_eq!(identity.vendor, "ACME");
        assert_eq!(identity.product, "TAPE DRIVE");
        assert_eq!(identity.revision, "1.0");
        assert!(DeviceIdentity::from_inquiry(&data[..20]).is_none());
    }

    #[test]
    fn received_accounts_for_residual() {
        let response = ModeResponse {
            bytes: vec![0; 16],
            residual: 6,
        };
        assert_eq!(response.received(), 10);
    }

    #[test]
    fn command_names_and_alternatives() {
        assert_eq!(ModeCommand::sense(true).to_string(), "MODE SENSE(6)");
        assert_eq!(ModeCommand::select(false).to_string(), "MODE SELECT(10)");
        assert_eq!(ModeCommand::Sense10.other_width(), 6);
    }
}
