use std::collections::BTreeMap;

use ihex::Record;

use super::{DecodeError, EncodeError, ImageCodec, MemoryImage};

const RECORD_SIZE: usize = 16;

/// Intel HEX object file.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntelHex;

impl ImageCodec for IntelHex {
    fn decode(&self, content: &[u8], _start_address: u32) -> Result<MemoryImage, DecodeError> {
        let text = std::str::from_utf8(content)?;

        let mut upper_address = 0u32;
        let mut data = BTreeMap::new();
        for record in ihex::Reader::new(text) {
            match record? {
                Record::Data { offset, value } => {
                    let start = upper_address.wrapping_add(u32::from(offset));
                    for (i, byte) in value.into_iter().enumerate() {
                        data.insert(start.wrapping_add(i as u32), byte);
                    }
                }
                Record::ExtendedSegmentAddress(segment) => upper_address = u32::from(segment) << 4,
                Record::ExtendedLinearAddress(upper) => upper_address = u32::from(upper) << 16,
                Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
                Record::EndOfFile => break,
            }
        }

        Ok(MemoryImage::from_sparse(&data)?)
    }

    fn encode(&self, image: &MemoryImage, _header_label: &str) -> Result<Vec<u8>, EncodeError> {
        image.check_address_space()?;

        let mut records = Vec::with_capacity(image.len() / RECORD_SIZE + 3);
        let mut address = u64::from(image.base_address());
        let mut remaining = image.bytes();
        let mut current_upper = None;

        while !remaining.is_empty() {
            let upper = (address >> 16) as u16;
            if current_upper != Some(upper) {
                records.push(Record::ExtendedLinearAddress(upper));
                current_upper = Some(upper);
            }

            // Data records must not cross a 64 KiB boundary.
            let room = 0x1_0000 - (address & 0xFFFF) as usize;
            let len = remaining.len().min(RECORD_SIZE).min(room);
            records.push(Record::Data {
                offset: (address & 0xFFFF) as u16,
                value: remaining[..len].to_vec(),
            });

            address += len as u64;
            remaining = &remaining[len..];
        }

        records.push(Record::StartLinearAddress(image.base_address()));
        records.push(Record::EndOfFile);

        let text = ihex::create_object_file_representation(&records)?;
        Ok(text.into_bytes())
    }
}
