//! Firmware image files.
//!
//! Every supported file format is decoded into one [`MemoryImage`]: a base
//! address plus a contiguous run of bytes. Formats that can describe sparse
//! data have their gaps filled with [`FILL_BYTE`].

mod binary;
mod intel_hex;
mod srec;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use strum::{Display, EnumIter};
use thiserror::Error;

use crate::{Error, Result};

pub use binary::RawBinary;
pub use intel_hex::IntelHex;
pub use srec::SRecord;

/// Value used for addresses a sparse image does not populate.
pub const FILL_BYTE: u8 = 0xFF;

/// Largest span a sparse image may cover once gaps are filled.
pub const MAX_IMAGE_SPAN: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line {line}: {reason}")]
    Record { line: usize, reason: String },

    #[error("file is not text: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("Intel HEX parse error: {0}")]
    IntelHex(#[from] ihex::ReaderError),

    #[error("image spans 0x{span:X} bytes, more than the 0x{limit:X} byte limit", limit = MAX_IMAGE_SPAN)]
    SpanTooLarge { span: u64 },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image at 0x{base:08X} with 0x{len:X} bytes runs past the 32-bit address space")]
    AddressOverflow { base: u32, len: usize },

    #[error("Intel HEX write error: {0}")]
    IntelHex(#[from] ihex::WriterError),
}

/// Normalized firmware content: `bytes[0]` lives at `base_address`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    base_address: u32,
    bytes: Vec<u8>,
}

impl MemoryImage {
    pub fn new(base_address: u32, bytes: Vec<u8>) -> Self {
        Self {
            base_address,
            bytes,
        }
    }

    /// Build a contiguous image from address-tagged bytes, filling holes with
    /// [`FILL_BYTE`]. An empty map yields an empty image at address 0.
    pub fn from_sparse(data: &BTreeMap<u32, u8>) -> std::result::Result<Self, DecodeError> {
        let (Some((&first, _)), Some((&last, _))) = (data.first_key_value(), data.last_key_value())
        else {
            return Ok(Self::default());
        };

        let span = u64::from(last - first) + 1;
        if span > MAX_IMAGE_SPAN {
            return Err(DecodeError::SpanTooLarge { span });
        }

        let mut bytes = vec![FILL_BYTE; span as usize];
        for (&address, &value) in data {
            bytes[(address - first) as usize] = value;
        }
        Ok(Self::new(first, bytes))
    }

    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address of the last byte, `None` for an empty image.
    pub fn last_address(&self) -> Option<u32> {
        let len = u32::try_from(self.bytes.len()).ok()?;
        len.checked_sub(1)
            .and_then(|last| self.base_address.checked_add(last))
    }

    pub(crate) fn check_address_space(&self) -> std::result::Result<(), EncodeError> {
        if u64::from(self.base_address) + self.bytes.len() as u64 > 1 << 32 {
            return Err(EncodeError::AddressOverflow {
                base: self.base_address,
                len: self.bytes.len(),
            });
        }
        Ok(())
    }

    /// Drop the first `byte_offset` bytes and advance the base address to match.
    ///
    /// Skipping the whole image is not an error; the result is simply empty.
    pub fn apply_offset(&self, byte_offset: usize) -> Self {
        let skip = byte_offset.min(self.bytes.len());
        Self {
            base_address: self.base_address.wrapping_add(skip as u32),
            bytes: self.bytes[skip..].to_vec(),
        }
    }
}

/// Load and save a [`MemoryImage`] in one on-disk encoding.
pub trait ImageCodec {
    /// Decode file content. `start_address` places formats that carry no
    /// addresses of their own.
    fn decode(
        &self,
        content: &[u8],
        start_address: u32,
    ) -> std::result::Result<MemoryImage, DecodeError>;

    /// Encode an image; `header_label` tags formats with a header record.
    fn encode(
        &self,
        image: &MemoryImage,
        header_label: &str,
    ) -> std::result::Result<Vec<u8>, EncodeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FileFormat {
    #[strum(to_string = "binary")]
    RawBinary,
    #[strum(to_string = "Intel HEX")]
    IntelHexRecord,
    #[strum(to_string = "S-record")]
    MotorolaSRecord,
}

impl FileFormat {
    /// Extensions recognised for each format, lower case and without the dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileFormat::RawBinary => &["bin"],
            FileFormat::IntelHexRecord => &["hex"],
            FileFormat::MotorolaSRecord => &["s19", "srec", "s"],
        }
    }

    /// Resolve the format from a file name's extension, ignoring case.
    pub fn detect(path: impl AsRef<Path>) -> Result<Self> {
        use strum::IntoEnumIterator;

        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;

        FileFormat::iter()
            .find(|format| format.extensions().contains(&extension.as_str()))
            .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))
    }

    /// Whether files of this format carry their own load address.
    pub fn carries_address(self) -> bool {
        !matches!(self, FileFormat::RawBinary)
    }

    pub fn codec(self) -> &'static dyn ImageCodec {
        match self {
            FileFormat::RawBinary => &RawBinary,
            FileFormat::IntelHexRecord => &IntelHex,
            FileFormat::MotorolaSRecord => &SRecord,
        }
    }
}

/// Shorthand for [`FileFormat::detect`].
pub fn detect_format(path: impl AsRef<Path>) -> Result<FileFormat> {
    FileFormat::detect(path)
}

/// Read an image file, picking the decoder from its extension.
///
/// `start_address` is only used for raw binaries, which carry no address.
pub fn load(path: impl AsRef<Path>, start_address: u32) -> Result<MemoryImage> {
    let path = path.as_ref();
    let format = FileFormat::detect(path)?;
    load_as(path, format, start_address)
}

pub fn load_as(path: &Path, format: FileFormat, start_address: u32) -> Result<MemoryImage> {
    let content = fs::read(path).map_err(|source| read_error(path, source))?;
    let image = format
        .codec()
        .decode(&content, start_address)
        .map_err(|source| Error::CorruptImage {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(
        "loaded {} image {}: 0x{:X} bytes at 0x{:08X}",
        format,
        path.display(),
        image.len(),
        image.base_address()
    );
    Ok(image)
}

/// Write an image file in the format implied by its extension.
pub fn save(path: impl AsRef<Path>, image: &MemoryImage, header_label: &str) -> Result<()> {
    let path = path.as_ref();
    let format = FileFormat::detect(path)?;
    save_as(path, format, image, header_label)
}

pub fn save_as(
    path: &Path,
    format: FileFormat,
    image: &MemoryImage,
    header_label: &str,
) -> Result<()> {
    let content = format
        .codec()
        .encode(image, header_label)
        .map_err(|source| Error::ImageEncode {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, content).map_err(|source| Error::ImageUnwritable {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "saved {} image {}: 0x{:X} bytes at 0x{:08X}",
        format,
        path.display(),
        image.len(),
        image.base_address()
    );
    Ok(())
}

fn read_error(path: &Path, source: std::io::Error) -> Error {
    if source.kind() == ErrorKind::NotFound {
        Error::ImageNotFound(PathBuf::from(path))
    } else {
        Error::ImageUnreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}
