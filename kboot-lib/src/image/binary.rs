use super::{DecodeError, EncodeError, ImageCodec, MemoryImage};

/// Plain memory dump with no addressing information.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBinary;

impl ImageCodec for RawBinary {
    fn decode(&self, content: &[u8], start_address: u32) -> Result<MemoryImage, DecodeError> {
        Ok(MemoryImage::new(start_address, content.to_vec()))
    }

    fn encode(&self, image: &MemoryImage, _header_label: &str) -> Result<Vec<u8>, EncodeError> {
        Ok(image.bytes().to_vec())
    }
}
