//! Multi-device run aggregation.

mod common;

use std::collections::HashMap;

use bitflags as _;
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use common::{caching_page, RecordingDevice};
use modepage_core::{
    parse_items, resolve_items, run_devices, sample_registry, DeviceError, DeviceOpener,
    EditConfig, ItemMode, PageControl, PageEditor, Pdt,
};

struct Opener {
    devices: HashMap<&'static str, RecordingDevice>,
    opened: Vec<String>,
}

impl DeviceOpener for Opener {
    type Device = RecordingDevice;

    fn open(&mut self, name: &str) -> Result<RecordingDevice, DeviceError> {
        self.opened.push(name.to_string());
        self.devices
            .get(name)
            .cloned()
            .ok_or_else(|| DeviceError::Io(format!("{name}: no such device")))
    }
}

fn opener() -> Opener {
    let savable =
        RecordingDevice::new(Pdt::DISK).with_page(PageControl::Current, caching_page(true));
    let fixed =
        RecordingDevice::new(Pdt::DISK).with_page(PageControl::Current, caching_page(false));
    Opener {
        devices: HashMap::from([("/dev/sg0", savable), ("/dev/sg1", fixed)]),
        opened: Vec::new(),
    }
}

fn save_wce(device: &mut RecordingDevice, pdt: Pdt) -> Result<(), modepage_core::Error> {
    let registry = sample_registry();
    let config = EditConfig {
        save: true,
        ..EditConfig::default()
    };
    let specs = parse_items("WCE", ItemMode::Set)?;
    let items = resolve_items(&registry, &specs, config.namespace, Some(pdt), None)?;
    PageEditor::new(device, &registry, &config)
        .with_reported_pdt(pdt)
        .set_items(&items)?;
    Ok(())
}

#[test]
fn all_devices_succeed() {
    let mut opener = opener();
    let status = run_devices(&mut opener, &["/dev/sg0", "/dev/sg0"], |device, identity| {
        save_wce(device, identity.pdt)
    });
    assert_eq!(status.exit_status(), 0);
    assert_eq!(status.processed(), 2);
}

#[test]
fn open_failure_does_not_stop_the_run() {
    let mut opener = opener();
    let status = run_devices(&mut opener, &["/dev/sg9", "/dev/sg0"], |device, identity| {
        save_wce(device, identity.pdt)
    });
    assert_eq!(opener.opened, ["/dev/sg9", "/dev/sg0"]);
    assert_eq!(status.failed(), 1);
    assert_eq!(status.exit_status(), 15);
}

#[test]
fn later_page_failure_upgrades_open_failure() {
    let mut opener = opener();
    let status = run_devices(
        &mut opener,
        &["/dev/sg9", "/dev/sg1", "/dev/sg0"],
        |device, identity| save_wce(device, identity.pdt),
    );
    assert_eq!(status.failed(), 2);
    assert_eq!(status.exit_status(), 31);
    assert!(status
        .first_failure()
        .is_some_and(|e| e.to_string().contains("not savable")));
}
