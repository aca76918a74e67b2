//! Console hex dump of memory read back from a device.

use std::fmt::Write;

/// Widest row the dump renders.
pub const MAX_ROW_WIDTH: usize = 16;

/// Render `data` located at `base_address` as an `address | hex | ascii` grid.
///
/// Rows are aligned to multiples of `row_width` (at most 16 bytes). When
/// `base_address` is not aligned the first row starts at the previous
/// boundary and the leading columns are left blank. Bytes outside the
/// printable ASCII range are shown as `placeholder` in the text column.
pub fn render(data: &[u8], base_address: u32, row_width: usize, placeholder: char) -> String {
    let width = row_width.clamp(1, MAX_ROW_WIDTH);
    let rule = format!(" {}", "-".repeat(13 + 4 * width));

    let mut out = String::from("  address | ");
    for column in 0..width {
        let _ = write!(out, "{:02X} ", column);
    }
    out.push_str("| ");
    for column in 0..width {
        let _ = write!(out, "{:X}", column);
    }
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    let lead = base_address as usize % width;
    let mut row_address = base_address.wrapping_sub(lead as u32);
    let mut remaining = data;
    let mut blank = lead;

    while !remaining.is_empty() {
        let take = remaining.len().min(width - blank);
        let (row, rest) = remaining.split_at(take);

        let mut hex = " ".repeat(3 * blank);
        let mut text = " ".repeat(blank);
        for &byte in row {
            let _ = write!(hex, "{:02X} ", byte);
            text.push(if (0x20..=0x7E).contains(&byte) {
                byte as char
            } else {
                placeholder
            });
        }

        let _ = writeln!(
            out,
            " {:08X} | {:<hex_width$}| {}",
            row_address,
            hex,
            text,
            hex_width = 3 * width
        );

        row_address = row_address.wrapping_add(width as u32);
        remaining = rest;
        blank = 0;
    }

    out.push_str(&rule);
    out
}
