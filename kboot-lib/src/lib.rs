pub mod backdoor_key;
pub mod bootloader;
pub mod erase_flash;
pub mod error;
pub mod fill_memory;
pub mod hexdump;
pub mod image;
pub mod info;
pub mod progress;
pub mod read_memory;
pub mod reset;
pub mod session;
pub mod unlock;
pub mod utils;
pub mod write_memory;

pub use crate::backdoor_key::BackdoorKey;
pub use crate::bootloader::{Bootloader, DeviceCandidate, Property, Status, Transport};
pub use crate::erase_flash::{EraseFlashParams, EraseScope};
pub use crate::error::{Error, Result};
pub use crate::fill_memory::FillMemoryParams;
pub use crate::image::{FileFormat, MemoryImage};
pub use crate::read_memory::{ReadMemoryParams, ReadOutcome};
pub use crate::session::{DeviceSelector, DeviceSession, FixedSelector, SessionState};
pub use crate::unlock::{UnlockMethod, UnlockParams};
pub use crate::write_memory::{WriteMemoryParams, WriteOutcome};

use crate::progress::{ProgressCallbackArc, ProgressHelper, ProgressOperation, ProgressStatus};

/// Default USB vendor id of Kinetis bootloader devices.
pub const DEFAULT_VID: u16 = 0x15A2;
/// Default USB product id of Kinetis bootloader devices.
pub const DEFAULT_PID: u16 = 0x0073;
/// Header label written into S-record files saved from device memory.
pub const SREC_HEADER_LABEL: &str = "KBOOT";

/// Runs command workflows against the device behind a [`DeviceSession`].
///
/// Every workflow validates its arguments before the device is contacted and
/// releases the connection before returning, whatever the outcome.
pub struct KBootTool {
    session: DeviceSession,
    progress: ProgressHelper,
}

impl KBootTool {
    pub fn new(session: DeviceSession, progress: ProgressCallbackArc) -> Self {
        Self {
            session,
            progress: ProgressHelper::new(progress, 0),
        }
    }

    pub fn session(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn progress(&self) -> &ProgressHelper {
        &self.progress
    }
}

/// Run one device command behind a spinner, turning a non-success status
/// into [`Error::DeviceOperationFailed`].
pub(crate) fn run_step<T>(
    progress: &ProgressHelper,
    operation: ProgressOperation,
    command: &'static str,
    step: impl FnOnce() -> Result<(Status, T)>,
) -> Result<T> {
    let spinner = progress.create_spinner(operation);
    let result = step().and_then(|(status, value)| {
        tracing::debug!("{} -> {}", command, status);
        Error::check_status(command, status).map(|_| value)
    });
    spinner.finish(match result {
        Ok(_) => ProgressStatus::Success,
        Err(_) => ProgressStatus::Failed,
    });
    result
}

/// [`run_step`] for commands that only report a status.
pub(crate) fn run_command(
    progress: &ProgressHelper,
    operation: ProgressOperation,
    command: &'static str,
    step: impl FnOnce() -> Result<Status>,
) -> Result<Status> {
    run_step(progress, operation, command, || {
        step().map(|status| (status, status))
    })
}
