//! Sequential processing of several devices with one outcome.

use log::{debug, warn};

use crate::device::{DeviceCommandExecutor, DeviceError, DeviceIdentity};
use crate::error::{Error, ErrorClass, EXIT_SUCCESS};

/// Opens devices by name.
pub trait DeviceOpener {
    /// Executor for one opened device.
    type Device: DeviceCommandExecutor;

    /// Opens `name`.
    ///
    /// # Errors
    ///
    /// Returns the [`DeviceError`] describing why the device is unusable.
    fn open(&mut self, name: &str) -> Result<Self::Device, DeviceError>;
}

/// Aggregated outcome of a run over several devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatus {
    first_failure: Option<Error>,
    processed: usize,
    failed: usize,
}

impl RunStatus {
    /// Records the outcome of one device.
    ///
    /// The first failure is kept, except that an open failure gives way to
    /// a later failure of any other class.
    pub fn record(&mut self, result: Result<(), Error>) {
        self.processed += 1;
        let Err(error) = result else {
            return;
        };
        self.failed += 1;
        let replace = match &self.first_failure {
            None => true,
            Some(first) => {
                first.class() == ErrorClass::DeviceOpen && error.class() != ErrorClass::DeviceOpen
            }
        };
        if replace {
            self.first_failure = Some(error);
        }
    }

    /// Failure deciding the exit status, if any.
    #[must_use]
    pub const fn first_failure(&self) -> Option<&Error> {
        self.first_failure.as_ref()
    }

    /// Devices processed.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.processed
    }

    /// Devices that failed.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Exit status of the whole run.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        self.first_failure
            .as_ref()
            .map_or(EXIT_SUCCESS, Error::exit_status)
    }
}

/// Runs `op` on each device in turn.
///
/// A device that cannot be opened or identified is recorded as an open
/// failure and skipped. Each device is dropped before the next is opened.
pub fn run_devices<O, F>(opener: &mut O, devices: &[&str], mut op: F) -> RunStatus
where
    O: DeviceOpener,
    F: FnMut(&mut O::Device, &DeviceIdentity) -> Result<(), Error>,
{
    let mut status = RunStatus::default();
    for &name in devices {
        let open_failed = |reason: DeviceError| Error::DeviceOpen {
            device: name.to_string(),
            reason: reason.to_string(),
        };
        let result = opener
            .open(name)
            .map_err(open_failed)
            .and_then(|mut device| {
                let identity = device.inquiry().map_err(open_failed)?;
                debug!("{name}: {identity}");
                op(&mut device, &identity)
            });
        if let Err(error) = &result {
            warn!("{name}: {error}");
        }
        status.record(result);
    }
    status
}

#[cfg(test)]
mod tests {
    use super::RunStatus;
    use crate::error::{ConsistencyError, Error};
    use crate::page::PageKey;

    fn open_failure() -> Error {
        Error::DeviceOpen {
            device: "/dev/sg9".into(),
            reason: "no such device".into(),
        }
    }

    fn not_savable() -> Error {
        ConsistencyError::NotSavable {
            page: PageKey::new(0x08, 0),
        }
        .into()
    }

    #[test]
    fn success_only_exits_zero() {
        let mut status = RunStatus::default();
        status.record(Ok(()));
        status.record(Ok(()));
        assert_eq!(status.exit_status(), 0);
        assert_eq!(status.processed(), 2);
    }

    #[test]
    fn first_failure_is_kept() {
        let mut status = RunStatus::default();
        status.record(Err(not_savable()));
        status.record(Err(open_failure()));
        assert_eq!(status.exit_status(), 31);
        assert_eq!(status.failed(), 2);
    }

    #[test]
    fn open_failure_is_upgraded() {
        let mut status = RunStatus::default();
        status.record(Err(open_failure()));
        assert_eq!(status.exit_status(), 15);
        status.record(Ok(()));
        status.record(Err(not_savable()));
        assert_eq!(status.exit_status(), 31);
    }
}
