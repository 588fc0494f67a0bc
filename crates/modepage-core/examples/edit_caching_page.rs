//! Reads the caching page of an in-memory disk, enables the write cache and
//! prints the page before and after.

use std::collections::HashMap;

use bitflags as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use log::{LevelFilter, Log, Metadata, Record};
use modepage_core::{
    parse_items, resolve_items, sample_registry, DeviceCommandExecutor, DeviceError,
    DeviceIdentity, EditConfig, EditOutcome, ItemMode, ModeReadRequest, ModeResponse,
    ModeWriteRequest, PageControl, PageEditor, PageKey, Pdt,
};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Disk that stores one page per variant and applies MODE SELECT to the
/// current one.
struct MemoryDisk {
    pages: HashMap<PageControl, Vec<u8>>,
}

impl MemoryDisk {
    fn new() -> Self {
        let mut current = vec![0u8; 20];
        current[0] = 0x88;
        current[1] = 0x12;
        current[2] = 0x01;
        current[8..10].copy_from_slice(&0xFFFFu16.to_be_bytes());
        let mut changeable = vec![0u8; 20];
        changeable[0] = 0x08;
        changeable[1] = 0x12;
        changeable[2] = 0x05;
        let default = current.clone();
        let saved = current.clone();
        Self {
            pages: HashMap::from([
                (PageControl::Current, current),
                (PageControl::Changeable, changeable),
                (PageControl::Default, default),
                (PageControl::Saved, saved),
            ]),
        }
    }
}

impl DeviceCommandExecutor for MemoryDisk {
    fn mode_read(&mut self, request: &ModeReadRequest) -> Result<ModeResponse, DeviceError> {
        if request.page != 0x08 || request.subpage != 0 {
            return Err(DeviceError::IllegalRequest);
        }
        let page = self
            .pages
            .get(&request.control)
            .ok_or(DeviceError::IllegalRequest)?;
        let mut full = vec![0u8; 8];
        let len = u16::try_from(6 + page.len()).map_err(|e| DeviceError::Io(e.to_string()))?;
        full[..2].copy_from_slice(&len.to_be_bytes());
        full.extend_from_slice(page);
        let transferred = full.len().min(request.alloc_len);
        full.truncate(transferred);
        Ok(ModeResponse::complete(full))
    }

    fn mode_write(&mut self, request: &ModeWriteRequest<'_>) -> Result<(), DeviceError> {
        let page = request.bytes.get(8..).ok_or(DeviceError::IllegalRequest)?;
        let mut stored = page.to_vec();
        if let Some(first) = stored.first_mut() {
            *first |= 0x80;
        }
        if request.save {
            self.pages.insert(PageControl::Saved, stored.clone());
        }
        self.pages.insert(PageControl::Current, stored);
        Ok(())
    }

    fn inquiry(&mut self) -> Result<DeviceIdentity, DeviceError> {
        Ok(DeviceIdentity {
            pdt: Pdt::DISK,
            vendor: "ACME".into(),
            product: "MEMORY DISK".into(),
            revision: "1.0".into(),
        })
    }
}

fn print_page(disk: &mut MemoryDisk, config: &EditConfig) -> Result<(), modepage_core::Error> {
    let registry = sample_registry();
    let report = PageEditor::new(disk, &registry, config).read_page(PageKey::new(0x08, 0))?;
    if let Some(descriptor) = report.descriptor {
        println!("{descriptor} (savable: {})", report.savable);
    }
    for field in &report.fields {
        println!("  {field}");
    }
    Ok(())
}

fn main() -> Result<(), modepage_core::Error> {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }

    let mut disk = MemoryDisk::new();
    let identity = disk.inquiry().map_err(|e| modepage_core::Error::DeviceOpen {
        device: "memory".into(),
        reason: e.to_string(),
    })?;
    println!("{identity}");

    let config = EditConfig {
        save: true,
        check_changeable: true,
        ..EditConfig::default()
    };
    print_page(&mut disk, &config)?;

    let registry = sample_registry();
    let specs = parse_items("WCE,RCD=0", ItemMode::Set)?;
    let items = resolve_items(&registry, &specs, config.namespace, Some(identity.pdt), None)?;
    let outcome = PageEditor::new(&mut disk, &registry, &config)
        .with_reported_pdt(identity.pdt)
        .set_items(&items)?;
    if let EditOutcome::Written { len } = outcome {
        println!("wrote {len} bytes");
    }

    print_page(&mut disk, &config)
}
