//! Boundary to the bootloader protocol.
//!
//! The library never frames packets itself. A [`Transport`] finds devices and
//! opens connections; the connected [`Bootloader`] carries out the memory
//! commands and reports the device's status code for each of them.

use strum::Display;

use crate::Result;
use crate::backdoor_key::BackdoorKey;

/// Status code returned by the bootloader for a command.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Fail,
    ReadOnly,
    OutOfRange,
    InvalidArgument,
    Timeout,
    NoTransferInProgress,
    FlashSizeError,
    FlashAlignmentError,
    FlashAddressError,
    FlashAccessError,
    FlashProtectionViolation,
    FlashCommandFailure,
    FlashUnknownProperty,
    FlashEraseKeyError,
    FlashRegionExecuteOnly,
    UnknownCommand,
    SecurityViolation,
    AbortDataPhase,
    PingError,
    NoResponse,
    NoResponseExpected,
    RomLdrSectionOverrun,
    RomLdrSignature,
    RomLdrSectionLength,
    RomLdrUnencryptedOnly,
    RomLdrEOFReached,
    RomLdrChecksum,
    RomLdrCrc32Error,
    RomLdrUnknownCommand,
    RomLdrIdNotFound,
    RomLdrDataUnderrun,
    RomLdrJumpReturned,
    RomLdrCallFailed,
    RomLdrKeyNotFound,
    RomLdrSecureOnly,
    MemoryRangeInvalid,
    MemoryReadFailed,
    MemoryWriteFailed,
    UnknownProperty,
    ReadOnlyProperty,
    InvalidPropertyValue,
    AppCrcCheckPassed,
    AppCrcCheckFailed,
    AppCrcCheckInactive,
    AppCrcCheckInvalid,
    AppCrcCheckOutOfRange,
    #[strum(to_string = "Unknown(0x{code:X})")]
    Unknown { code: u32 },
}

const STATUS_CODES: &[(u32, Status)] = &[
    (0, Status::Success),
    (1, Status::Fail),
    (2, Status::ReadOnly),
    (3, Status::OutOfRange),
    (4, Status::InvalidArgument),
    (5, Status::Timeout),
    (6, Status::NoTransferInProgress),
    (100, Status::FlashSizeError),
    (101, Status::FlashAlignmentError),
    (102, Status::FlashAddressError),
    (103, Status::FlashAccessError),
    (104, Status::FlashProtectionViolation),
    (105, Status::FlashCommandFailure),
    (106, Status::FlashUnknownProperty),
    (107, Status::FlashEraseKeyError),
    (108, Status::FlashRegionExecuteOnly),
    (10000, Status::UnknownCommand),
    (10001, Status::SecurityViolation),
    (10002, Status::AbortDataPhase),
    (10003, Status::PingError),
    (10004, Status::NoResponse),
    (10005, Status::NoResponseExpected),
    (10100, Status::RomLdrSectionOverrun),
    (10101, Status::RomLdrSignature),
    (10102, Status::RomLdrSectionLength),
    (10103, Status::RomLdrUnencryptedOnly),
    (10104, Status::RomLdrEOFReached),
    (10105, Status::RomLdrChecksum),
    (10106, Status::RomLdrCrc32Error),
    (10107, Status::RomLdrUnknownCommand),
    (10108, Status::RomLdrIdNotFound),
    (10109, Status::RomLdrDataUnderrun),
    (10110, Status::RomLdrJumpReturned),
    (10111, Status::RomLdrCallFailed),
    (10112, Status::RomLdrKeyNotFound),
    (10113, Status::RomLdrSecureOnly),
    (10200, Status::MemoryRangeInvalid),
    (10201, Status::MemoryReadFailed),
    (10202, Status::MemoryWriteFailed),
    (10300, Status::UnknownProperty),
    (10301, Status::ReadOnlyProperty),
    (10302, Status::InvalidPropertyValue),
    (10400, Status::AppCrcCheckPassed),
    (10401, Status::AppCrcCheckFailed),
    (10402, Status::AppCrcCheckInactive),
    (10403, Status::AppCrcCheckInvalid),
    (10404, Status::AppCrcCheckOutOfRange),
];

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn code(self) -> u32 {
        if let Status::Unknown { code } = self {
            return code;
        }
        STATUS_CODES
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(code, _)| *code)
            .unwrap_or(u32::MAX)
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        STATUS_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, status)| *status)
            .unwrap_or(Status::Unknown { code })
    }
}

/// One device property as reported by the bootloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub raw_value: u32,
    pub decoded: String,
}

/// A bootloader-capable device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// System path used to open the device, e.g. a serial port name.
    pub path: String,
    /// Human-readable description shown when choosing between devices.
    pub description: String,
}

/// Finds devices and opens connections to them.
pub trait Transport {
    fn discover(&mut self, vid: u16, pid: u16) -> Result<Vec<DeviceCandidate>>;

    fn connect(&mut self, candidate: &DeviceCandidate) -> Result<Box<dyn Bootloader>>;
}

/// A connected bootloader.
///
/// Device commands return the bootloader's status. An `Err` is reserved for
/// failures of the link itself.
pub trait Bootloader {
    fn get_properties(&mut self) -> Result<Vec<Property>>;

    fn read_memory(&mut self, address: u32, length: u32) -> Result<(Status, Vec<u8>)>;

    fn write_memory(&mut self, address: u32, data: &[u8]) -> Result<Status>;

    fn flash_erase_all(&mut self) -> Result<Status>;

    fn flash_erase_all_unsecure(&mut self) -> Result<Status>;

    fn flash_erase_region(&mut self, address: u32, length: u32) -> Result<Status>;

    fn flash_security_disable(&mut self, key: &BackdoorKey) -> Result<Status>;

    fn fill_memory(&mut self, address: u32, length: u32, pattern: u32) -> Result<Status>;

    fn reset(&mut self) -> Result<Status>;

    /// Close the link. Called exactly once per connection.
    fn disconnect(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for &(code, status) in STATUS_CODES {
            assert_eq!(Status::from(code), status);
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn unknown_status_keeps_code() {
        let status = Status::from(0xBEEF);
        assert_eq!(status, Status::Unknown { code: 0xBEEF });
        assert_eq!(status.code(), 0xBEEF);
        assert_eq!(status.to_string(), "Unknown(0xBEEF)");
        assert!(!status.is_success());
    }

    #[test]
    fn status_names() {
        assert_eq!(Status::Success.to_string(), "Success");
        assert_eq!(Status::from(10001).to_string(), "SecurityViolation");
    }
}
