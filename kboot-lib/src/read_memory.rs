use std::path::PathBuf;

use crate::image::{self, FileFormat, MemoryImage};
use crate::progress::ProgressOperation;
use crate::utils::Utils;
use crate::{KBootTool, Result, SREC_HEADER_LABEL, hexdump, run_step};

#[derive(Debug, Clone)]
pub struct ReadMemoryParams {
    pub address: String,
    pub length: String,
    /// Output file; the data is dumped to the console when absent.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Dump(String),
    Saved { path: PathBuf, format: FileFormat },
}

impl KBootTool {
    pub fn read_memory(&mut self, params: &ReadMemoryParams) -> Result<ReadOutcome> {
        let address = Utils::parse_u32("address", &params.address)?;
        let length = Utils::parse_u32("length", &params.length)?;
        let format = params.file.as_ref().map(FileFormat::detect).transpose()?;

        let progress = self.progress.clone();
        let data = self.session.scoped(|device| {
            run_step(
                &progress,
                ProgressOperation::ReadMemory {
                    address,
                    len: length,
                },
                "read memory",
                || device.read_memory(address, length),
            )
        })?;
        if data.len() != length as usize {
            tracing::warn!("requested 0x{:X} bytes, device returned 0x{:X}", length, data.len());
        }

        let image = MemoryImage::new(address, data);
        match (&params.file, format) {
            (Some(path), Some(format)) => {
                image::save_as(path, format, &image, SREC_HEADER_LABEL)?;
                Ok(ReadOutcome::Saved {
                    path: path.clone(),
                    format,
                })
            }
            _ => Ok(ReadOutcome::Dump(hexdump::render(
                image.bytes(),
                address,
                hexdump::MAX_ROW_WIDTH,
                '.',
            ))),
        }
    }
}
