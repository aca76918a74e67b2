use std::collections::BTreeMap;

use super::{DecodeError, EncodeError, FILL_BYTE, ImageCodec, MAX_IMAGE_SPAN, MemoryImage};

const RECORD_SIZE: usize = 16;

/// Longest header text that still fits a single S0 record.
const MAX_HEADER_LEN: usize = 252;

/// Motorola S-record file.
///
/// The termination record (S7/S8/S9) carries the start address. When it
/// is present the image is based there, padded with [`FILL_BYTE`] up to the
/// first data record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SRecord;

struct Line {
    kind: u8,
    address: u32,
    data: Vec<u8>,
}

fn address_width(kind: u8) -> Option<usize> {
    match kind {
        0 | 1 | 5 | 9 => Some(2),
        2 | 6 | 8 => Some(3),
        3 | 7 => Some(4),
        _ => None,
    }
}

fn parse_line(text: &str) -> Result<Line, String> {
    let Some(body) = text.strip_prefix('S') else {
        return Err("record does not start with 'S'".to_string());
    };
    let mut chars = body.chars();
    let kind = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or("missing record type")? as u8;
    let width = address_width(kind).ok_or_else(|| format!("unsupported record type S{}", kind))?;

    let raw = hex::decode(chars.as_str()).map_err(|e| format!("invalid hex data: {}", e))?;
    let Some((&count, rest)) = raw.split_first() else {
        return Err("missing byte count".to_string());
    };
    if rest.len() != usize::from(count) {
        return Err(format!(
            "byte count 0x{:02X} does not match record length 0x{:02X}",
            count,
            rest.len()
        ));
    }
    if rest.len() < width + 1 {
        return Err(format!("record too short for S{}", kind));
    }

    let (payload, checksum) = rest.split_at(rest.len() - 1);
    let expected = checksum_of(count, payload);
    if checksum[0] != expected {
        return Err(format!(
            "checksum mismatch: expected 0x{:02X}, found 0x{:02X}",
            expected, checksum[0]
        ));
    }

    let (address, data) = payload.split_at(width);
    let address = address
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

    Ok(Line {
        kind,
        address,
        data: data.to_vec(),
    })
}

fn checksum_of(count: u8, payload: &[u8]) -> u8 {
    !payload.iter().fold(count, |acc, &b| acc.wrapping_add(b))
}

fn format_line(kind: u8, address: u32, data: &[u8]) -> String {
    let width = address_width(kind).unwrap_or(4);
    let mut payload = Vec::with_capacity(width + data.len());
    payload.extend_from_slice(&address.to_be_bytes()[4 - width..]);
    payload.extend_from_slice(data);

    let count = (payload.len() + 1) as u8;
    let checksum = checksum_of(count, &payload);
    format!(
        "S{}{:02X}{}{:02X}",
        kind,
        count,
        hex::encode_upper(&payload),
        checksum
    )
}

impl ImageCodec for SRecord {
    fn decode(&self, content: &[u8], _start_address: u32) -> Result<MemoryImage, DecodeError> {
        let text = std::str::from_utf8(content)?;

        let mut data = BTreeMap::new();
        let mut data_records = 0u32;
        let mut start_address = None;

        for (index, raw_line) in text.lines().enumerate() {
            let raw_line = raw_line.trim();
            if raw_line.is_empty() {
                continue;
            }
            let line_no = index + 1;
            let record_error = |reason: String| DecodeError::Record {
                line: line_no,
                reason,
            };

            let line = parse_line(raw_line).map_err(record_error)?;
            match line.kind {
                0 => tracing::debug!("S-record header: {}", String::from_utf8_lossy(&line.data)),
                1..=3 => {
                    for (i, byte) in line.data.iter().enumerate() {
                        let address = line.address.checked_add(i as u32).ok_or_else(|| {
                            record_error("data runs past the 32-bit address space".to_string())
                        })?;
                        data.insert(address, *byte);
                    }
                    data_records += 1;
                }
                5 | 6 => {
                    if line.address != data_records {
                        return Err(record_error(format!(
                            "record count {} does not match {} data records",
                            line.address, data_records
                        )));
                    }
                }
                _ => start_address = Some(line.address),
            }
        }

        let image = MemoryImage::from_sparse(&data)?;
        let Some(start) = start_address else {
            return Ok(image);
        };

        if image.is_empty() {
            return Ok(MemoryImage::new(start, Vec::new()));
        }
        if start > image.base_address() {
            tracing::warn!(
                "S-record start address 0x{:08X} lies inside the data, keeping base 0x{:08X}",
                start,
                image.base_address()
            );
            return Ok(image);
        }

        let padding = (image.base_address() - start) as usize;
        let span = (padding + image.len()) as u64;
        if span > MAX_IMAGE_SPAN {
            return Err(DecodeError::SpanTooLarge { span });
        }
        let mut bytes = vec![FILL_BYTE; padding];
        bytes.extend_from_slice(image.bytes());
        Ok(MemoryImage::new(start, bytes))
    }

    fn encode(&self, image: &MemoryImage, header_label: &str) -> Result<Vec<u8>, EncodeError> {
        image.check_address_space()?;

        let base = image.base_address();
        let last = image.last_address().unwrap_or(base);
        let (data_kind, end_kind) = if last <= 0xFFFF {
            (1, 9)
        } else if last <= 0xFF_FFFF {
            (2, 8)
        } else {
            (3, 7)
        };

        let header = &header_label.as_bytes()[..header_label.len().min(MAX_HEADER_LEN)];
        let mut lines = vec![format_line(0, 0, header)];

        let mut address = base;
        for chunk in image.bytes().chunks(RECORD_SIZE) {
            lines.push(format_line(data_kind, address, chunk));
            address = address.wrapping_add(chunk.len() as u32);
        }

        let records = image.len().div_ceil(RECORD_SIZE) as u32;
        if records <= 0xFFFF {
            lines.push(format_line(5, records, &[]));
        } else if records <= 0xFF_FFFF {
            lines.push(format_line(6, records, &[]));
        }
        lines.push(format_line(end_kind, base, &[]));

        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text.into_bytes())
    }
}
