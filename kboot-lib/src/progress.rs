//! Progress reporting callbacks.
//!
//! Workflows report their long-running steps through [`ProgressCallback`], so
//! a front end (CLI, GUI, tests) decides how they are shown.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Device operations that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOperation {
    EraseAll,
    EraseAllUnsecure,
    EraseRegion { address: u32, len: u32 },
    WriteMemory { address: u32, len: u32 },
    ReadMemory { address: u32, len: u32 },
    FillMemory { address: u32, len: u32 },
    Unlock,
    Reset,
}

impl fmt::Display for ProgressOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EraseAll => write!(f, "Erasing all flash..."),
            Self::EraseAllUnsecure => write!(f, "Erasing all flash and unsecuring..."),
            Self::EraseRegion { address, len } => {
                write!(f, "Erasing 0x{:X} bytes at 0x{:08X}...", len, address)
            }
            Self::WriteMemory { address, len } => {
                write!(f, "Writing 0x{:X} bytes at 0x{:08X}...", len, address)
            }
            Self::ReadMemory { address, len } => {
                write!(f, "Reading 0x{:X} bytes at 0x{:08X}...", len, address)
            }
            Self::FillMemory { address, len } => {
                write!(f, "Filling 0x{:X} bytes at 0x{:08X}...", len, address)
            }
            Self::Unlock => write!(f, "Disabling flash security..."),
            Self::Reset => write!(f, "Resetting MCU..."),
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Success,
    Failed,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Step prefix, a hex step number.
    pub prefix: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

pub trait ProgressCallback: Send + Sync {
    /// Start a new spinner and return its id.
    fn start(&self, info: ProgressInfo) -> ProgressId;

    fn finish(&self, id: ProgressId, final_message: String);
}

/// Callback that shows nothing.
#[derive(Debug, Default)]
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn start(&self, _info: ProgressInfo) -> ProgressId {
        ProgressId(0)
    }

    fn finish(&self, _id: ProgressId, _final_message: String) {}
}

pub type ProgressCallbackArc = Arc<dyn ProgressCallback>;

pub fn no_op_progress_callback() -> ProgressCallbackArc {
    Arc::new(NoOpProgressCallback)
}

/// Hands out numbered indicators on top of a [`ProgressCallback`].
#[derive(Clone)]
pub struct ProgressHelper {
    callback: ProgressCallbackArc,
    step_counter: Arc<AtomicI32>,
}

impl ProgressHelper {
    pub fn new(callback: ProgressCallbackArc, initial_step: i32) -> Self {
        Self {
            callback,
            step_counter: Arc::new(AtomicI32::new(initial_step)),
        }
    }

    fn next_step(&self) -> i32 {
        self.step_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn create_spinner(&self, operation: ProgressOperation) -> ProgressHandler {
        let info = ProgressInfo {
            prefix: format!("0x{:02X}", self.next_step()),
            message: operation.to_string(),
        };
        let id = self.callback.start(info);
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
        }
    }
}

/// A single running indicator.
pub struct ProgressHandler {
    callback: ProgressCallbackArc,
    id: ProgressId,
}

impl ProgressHandler {
    pub fn finish(self, status: ProgressStatus) {
        self.callback.finish(self.id, status.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressCallback for Recorder {
        fn start(&self, info: ProgressInfo) -> ProgressId {
            let mut events = self.events.lock().unwrap();
            events.push(format!("start {} {}", info.prefix, info.message));
            ProgressId(events.len() as u64)
        }

        fn finish(&self, id: ProgressId, final_message: String) {
            self.events.lock().unwrap().push(format!("finish {} {}", id.0, final_message));
        }
    }

    #[test]
    fn steps_are_numbered() {
        let recorder = Arc::new(Recorder::default());
        let helper = ProgressHelper::new(recorder.clone(), 1);

        let spinner = helper.create_spinner(ProgressOperation::EraseAll);
        spinner.finish(ProgressStatus::Success);
        let write = helper.create_spinner(ProgressOperation::WriteMemory {
            address: 0x1000,
            len: 16,
        });
        write.finish(ProgressStatus::Failed);

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            [
                "start 0x01 Erasing all flash...",
                "finish 1 Done",
                "start 0x02 Writing 0x10 bytes at 0x00001000...",
                "finish 3 Failed",
            ]
        );
    }
}
