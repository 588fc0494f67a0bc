//! Device test doubles shared by the integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use modepage_core::{
    DeviceCommandExecutor, DeviceError, DeviceIdentity, ModeReadRequest, ModeResponse,
    ModeWriteRequest, PageControl, Pdt,
};

/// One recorded MODE SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub six_byte: bool,
    pub save: bool,
    pub bytes: Vec<u8>,
}

/// In-memory device holding pages per control variant and recording every
/// command it receives.
#[derive(Debug, Clone)]
pub struct RecordingDevice {
    pub identity: DeviceIdentity,
    pub pages: HashMap<(PageControl, u8, u8), Vec<u8>>,
    pub block_descriptors: Vec<u8>,
    pub refused: Vec<PageControl>,
    pub read_error: Option<DeviceError>,
    pub write_error: Option<DeviceError>,
    pub reads: Vec<ModeReadRequest>,
    pub writes: Vec<RecordedWrite>,
}

impl RecordingDevice {
    pub fn new(pdt: Pdt) -> Self {
        Self {
            identity: DeviceIdentity {
                pdt,
                vendor: "ACME".into(),
                product: "TESTDISK".into(),
                revision: "0001".into(),
            },
            pages: HashMap::new(),
            block_descriptors: Vec::new(),
            refused: Vec::new(),
            read_error: None,
            write_error: None,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Stores `page` (starting at the page code byte) for one variant.
    pub fn with_page(mut self, control: PageControl, page: Vec<u8>) -> Self {
        let subpage = if page[0] & 0x40 != 0 { page[1] } else { 0 };
        self.pages.insert((control, page[0] & 0x3F, subpage), page);
        self
    }

    /// Stores the same page for all four variants.
    pub fn with_all_variants(mut self, page: &[u8]) -> Self {
        for control in PageControl::ALL {
            self = self.with_page(control, page.to_vec());
        }
        self
    }

    pub fn refusing(mut self, control: PageControl) -> Self {
        self.refused.push(control);
        self
    }
}

/// Builds a full mode data response around `page`.
pub fn mode_data(six_byte: bool, block_descriptors: &[u8], page: &[u8]) -> Vec<u8> {
    let header_len = if six_byte { 4 } else { 8 };
    let total = header_len + block_descriptors.len() + page.len();
    let mut bytes = vec![0u8; header_len];
    if six_byte {
        bytes[0] = u8::try_from(total - 1).expect("6-byte mode data fits");
        bytes[3] = u8::try_from(block_descriptors.len()).expect("short block descriptors");
    } else {
        let len = u16::try_from(total - 2).expect("10-byte mode data fits");
        bytes[0..2].copy_from_slice(&len.to_be_bytes());
        let bd = u16::try_from(block_descriptors.len()).expect("short block descriptors");
        bytes[6..8].copy_from_slice(&bd.to_be_bytes());
    }
    bytes.extend_from_slice(block_descriptors);
    bytes.extend_from_slice(page);
    bytes
}

/// Truncates or pads `full` to the allocation length, as a transport does.
pub fn respond(full: &[u8], alloc_len: usize) -> ModeResponse {
    let transferred = full.len().min(alloc_len);
    let mut bytes = full[..transferred].to_vec();
    bytes.resize(alloc_len, 0);
    ModeResponse {
        bytes,
        residual: alloc_len - transferred,
    }
}

impl DeviceCommandExecutor for RecordingDevice {
    fn mode_read(&mut self, request: &ModeReadRequest) -> Result<ModeResponse, DeviceError> {
        self.reads.push(*request);
        if let Some(error) = &self.read_error {
            return Err(error.clone());
        }
        if self.refused.contains(&request.control) {
            return Err(DeviceError::IllegalRequest);
        }
        let page = self
            .pages
            .get(&(request.control, request.page, request.subpage))
            .ok_or(DeviceError::IllegalRequest)?;
        let block_descriptors = if request.disable_block_descriptors {
            &[][..]
        } else {
            &self.block_descriptors[..]
        };
        let full = mode_data(request.six_byte, block_descriptors, page);
        Ok(respond(&full, request.alloc_len))
    }

    fn mode_write(&mut self, request: &ModeWriteRequest<'_>) -> Result<(), DeviceError> {
        if let Some(error) = &self.write_error {
            return Err(error.clone());
        }
        self.writes.push(RecordedWrite {
            six_byte: request.six_byte,
            save: request.save,
            bytes: request.bytes.to_vec(),
        });
        Ok(())
    }

    fn inquiry(&mut self) -> Result<DeviceIdentity, DeviceError> {
        Ok(self.identity.clone())
    }
}

/// Device answering MODE SENSE from a fixed script of raw responses.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    pub responses: VecDeque<Result<Vec<u8>, DeviceError>>,
    pub reads: Vec<ModeReadRequest>,
    pub writes: Vec<Vec<u8>>,
}

impl ScriptedDevice {
    pub fn new(responses: impl IntoIterator<Item = Result<Vec<u8>, DeviceError>>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl DeviceCommandExecutor for ScriptedDevice {
    fn mode_read(&mut self, request: &ModeReadRequest) -> Result<ModeResponse, DeviceError> {
        self.reads.push(*request);
        let next = self
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(DeviceError::Io("script exhausted".into())))?;
        Ok(respond(&next, request.alloc_len))
    }

    fn mode_write(&mut self, request: &ModeWriteRequest<'_>) -> Result<(), DeviceError> {
        self.writes.push(request.bytes.to_vec());
        Ok(())
    }

    fn inquiry(&mut self) -> Result<DeviceIdentity, DeviceError> {
        Err(DeviceError::NotReady)
    }
}

/// Caching page (0x08), 20 bytes, with the PS bit as given.
pub fn caching_page(savable: bool) -> Vec<u8> {
    let mut page = vec![0u8; 20];
    page[0] = 0x08 | if savable { 0x80 } else { 0 };
    page[1] = 0x12;
    page[2] = 0b0000_0001;
    page[8..10].copy_from_slice(&0xFFFFu16.to_be_bytes());
    page
}

/// SAS phy control and discovery page with `phys` descriptors.
pub fn phy_page(phys: u8) -> Vec<u8> {
    let len = 8 + 48 * usize::from(phys);
    let mut page = vec![0u8; len];
    page[0] = 0x40 | 0x19;
    page[1] = 0x01;
    page[2..4].copy_from_slice(&u16::try_from(len - 4).expect("short page").to_be_bytes());
    page[5] = 0x06;
    page[7] = phys;
    for k in 0..usize::from(phys) {
        page[8 + 48 * k + 1] = u8::try_from(k).expect("few phys");
    }
    page
}
