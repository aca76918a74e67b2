use crate::progress::ProgressOperation;
use crate::utils::Utils;
use crate::{KBootTool, Result, Status, run_command};

/// Pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "0xFFFFFFFF";

#[derive(Debug, Clone)]
pub struct FillMemoryParams {
    pub address: String,
    pub length: String,
    /// 32-bit word repeated across the region.
    pub pattern: String,
}

impl KBootTool {
    pub fn fill_memory(&mut self, params: &FillMemoryParams) -> Result<Status> {
        let address = Utils::parse_u32("address", &params.address)?;
        let length = Utils::parse_u32("length", &params.length)?;
        let pattern = Utils::parse_u32("pattern", &params.pattern)?;

        let progress = self.progress.clone();
        self.session.scoped(|device| {
            run_command(
                &progress,
                ProgressOperation::FillMemory {
                    address,
                    len: length,
                },
                "fill memory",
                || device.fill_memory(address, length, pattern),
            )
        })
    }
}
