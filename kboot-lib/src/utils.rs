use thiserror::Error;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntLiteralError {
    #[error("empty value")]
    Empty,
    #[error("negative values are not allowed")]
    Negative,
    #[error("invalid digit '{0}'")]
    InvalidDigit(char),
    #[error("misplaced '_' separator")]
    Separator,
    #[error("leading zeros in decimal literal (use 0o for octal)")]
    LeadingZero,
    #[error("value too large")]
    Overflow,
}

pub struct Utils;

impl Utils {
    /// Parse an integer literal the way a base-0 parser does: decimal, `0x` hex,
    /// `0o` octal or `0b` binary, with optional `_` digit separators.
    pub fn parse_int(s: &str) -> std::result::Result<u64, IntLiteralError> {
        let s = s.trim();
        let s = s.strip_prefix('+').unwrap_or(s);
        if s.starts_with('-') {
            return Err(IntLiteralError::Negative);
        }
        if s.is_empty() {
            return Err(IntLiteralError::Empty);
        }

        let lower = s.to_ascii_lowercase();
        let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
            (hex.strip_prefix('_').unwrap_or(hex), 16)
        } else if let Some(oct) = lower.strip_prefix("0o") {
            (oct.strip_prefix('_').unwrap_or(oct), 8)
        } else if let Some(bin) = lower.strip_prefix("0b") {
            (bin.strip_prefix('_').unwrap_or(bin), 2)
        } else {
            (lower.as_str(), 10)
        };

        if digits.is_empty() {
            return Err(IntLiteralError::Empty);
        }
        if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
            return Err(IntLiteralError::Separator);
        }
        if radix == 10 && digits.starts_with('0') && digits.chars().any(|c| c != '0' && c != '_') {
            return Err(IntLiteralError::LeadingZero);
        }

        let mut value: u64 = 0;
        for c in digits.chars().filter(|&c| c != '_') {
            let digit = c.to_digit(radix).ok_or(IntLiteralError::InvalidDigit(c))?;
            value = value
                .checked_mul(u64::from(radix))
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or(IntLiteralError::Overflow)?;
        }
        Ok(value)
    }

    /// Parse a named 32-bit command argument, e.g. an address or a length.
    pub fn parse_u32(name: &str, value: &str) -> Result<u32> {
        let parsed = Self::parse_int(value)
            .map_err(|e| Error::invalid_argument(format!("{} '{}': {}", name, value, e)))?;
        u32::try_from(parsed).map_err(|_| {
            Error::invalid_argument(format!("{} '{}': value does not fit in 32 bits", name, value))
        })
    }

    /// Parse a named 16-bit argument such as a USB vendor or product id.
    pub fn parse_u16(name: &str, value: &str) -> Result<u16> {
        let parsed = Self::parse_int(value)
            .map_err(|e| Error::invalid_argument(format!("{} '{}': {}", name, value, e)))?;
        u16::try_from(parsed).map_err(|_| {
            Error::invalid_argument(format!("{} '{}': value does not fit in 16 bits", name, value))
        })
    }
}
