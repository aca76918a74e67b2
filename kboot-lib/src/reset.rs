use crate::progress::ProgressOperation;
use crate::{KBootTool, Result, Status, run_command};

impl KBootTool {
    /// Reset the MCU. The device may drop off the bus right away, so
    /// closing the connection afterwards is best effort.
    pub fn reset(&mut self) -> Result<Status> {
        let progress = self.progress.clone();
        self.session.scoped_best_effort(|device| {
            run_command(&progress, ProgressOperation::Reset, "reset", || {
                device.reset()
            })
        })
    }
}
