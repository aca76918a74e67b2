use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Length of the flash security backdoor key.
pub const KEY_LEN: usize = 16;

/// Key that disables flash security without a mass erase.
///
/// Parsed from `S:<16 ASCII characters>` or `X:<32 hex digits>`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BackdoorKey([u8; KEY_LEN]);

impl BackdoorKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Key bytes packed into little-endian words, the layout used in command parameters.
    pub fn words(&self) -> [u32; KEY_LEN / 4] {
        let mut words = [0u32; KEY_LEN / 4];
        for (word, chunk) in words.iter_mut().zip(self.0.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        words
    }

    fn from_ascii(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(Error::invalid_key("ASCII key must only contain ASCII characters"));
        }
        let bytes: [u8; KEY_LEN] = text.as_bytes().try_into().map_err(|_| {
            Error::invalid_key(format!(
                "ASCII key must be {} characters, got {}",
                KEY_LEN,
                text.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    fn from_hex(text: &str) -> Result<Self> {
        if text.len() != 2 * KEY_LEN {
            return Err(Error::invalid_key(format!(
                "hex key must be {} digits, got {}",
                2 * KEY_LEN,
                text.len()
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| Error::invalid_key(format!("hex key: {}", e)))?;
        Ok(Self(bytes))
    }
}

impl FromStr for BackdoorKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("S" | "s", text)) => Self::from_ascii(text),
            Some(("X" | "x", text)) => Self::from_hex(text),
            _ => Err(Error::invalid_key(
                "expected S:<16 characters> or X:<32 hex digits>",
            )),
        }
    }
}

// The key is a secret; keep it out of logs.
impl fmt::Debug for BackdoorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackdoorKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_hex_forms_agree() {
        let ascii: BackdoorKey = "S:TESTKEY123456789".parse().unwrap();
        let hex: BackdoorKey = "X:544553544B4559313233343536373839".parse().unwrap();
        assert_eq!(ascii, hex);
        assert_eq!(ascii.as_bytes(), b"TESTKEY123456789");
    }

    #[test]
    fn hex_digits_are_case_insensitive() {
        let upper: BackdoorKey = "X:00112233445566778899AABBCCDDEEFF".parse().unwrap();
        let lower: BackdoorKey = "x:00112233445566778899aabbccddeeff".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.words()[0], 0x3322_1100);
        assert_eq!(upper.words()[3], 0xFFEE_DDCC);
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        for key in [
            "S:TESTKEY1234567",
            "S:TESTKEY1234567890",
            "S:",
            "X:0011",
            "X:00112233445566778899AABBCCDDEEFF00",
        ] {
            assert!(
                matches!(key.parse::<BackdoorKey>(), Err(Error::KeyFormatInvalid(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for key in [
            "TESTKEY123456789",
            "K:TESTKEY123456789",
            "X:0011223344556677889900AABBCCDDZZ",
            "S:TESTKEY12345678\u{e9}",
        ] {
            assert!(
                matches!(key.parse::<BackdoorKey>(), Err(Error::KeyFormatInvalid(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn debug_hides_key() {
        let key: BackdoorKey = "S:TESTKEY123456789".parse().unwrap();
        assert_eq!(format!("{:?}", key), "BackdoorKey(..)");
    }
}
