use std::path::PathBuf;

use crate::image::{self, FileFormat};
use crate::progress::ProgressOperation;
use crate::utils::Utils;
use crate::{Error, KBootTool, Result, run_command};

#[derive(Debug, Clone)]
pub struct WriteMemoryParams {
    /// Target address. `0` lets hex and S-record files use their own address.
    pub address: String,
    /// Number of leading image bytes to skip.
    pub offset: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { address: u32, len: usize },
    /// The offset skipped the whole image; the device was not contacted.
    NothingToWrite,
}

impl KBootTool {
    /// Load an image, erase and unsecure the whole flash, then program it.
    pub fn write_memory(&mut self, params: &WriteMemoryParams) -> Result<WriteOutcome> {
        let mut address = Utils::parse_u32("address", &params.address)?;
        let offset = Utils::parse_u32("offset", &params.offset)? as usize;

        let format = FileFormat::detect(&params.file)?;
        let image = image::load_as(&params.file, format, address)?;
        if address == 0 && format.carries_address() {
            address = image.base_address();
        }

        let data = image.apply_offset(offset);
        if data.is_empty() {
            tracing::info!(
                "offset 0x{:X} skips the whole 0x{:X} byte image, nothing to write",
                offset,
                image.len()
            );
            return Ok(WriteOutcome::NothingToWrite);
        }

        let len = data.len();
        let length = u32::try_from(len)
            .map_err(|_| Error::invalid_argument("image larger than 4 GiB"))?;
        tracing::info!(
            "writing 0x{:X} bytes from {} to 0x{:08X}",
            len,
            params.file.display(),
            address
        );

        let progress = self.progress.clone();
        self.session.scoped(|device| {
            run_command(
                &progress,
                ProgressOperation::EraseAllUnsecure,
                "flash erase all unsecure",
                || device.flash_erase_all_unsecure(),
            )?;
            run_command(
                &progress,
                ProgressOperation::WriteMemory { address, len: length },
                "write memory",
                || device.write_memory(address, data.bytes()),
            )
        })?;

        Ok(WriteOutcome::Written { address, len })
    }
}
