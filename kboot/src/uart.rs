//! KBoot serial framing.
//!
//! Every framed packet is `5A <type> <len u16> <crc16 u16> <payload>`, the
//! CRC-16/XMODEM covering the header (without the CRC field) and the payload.
//! Each framed packet is answered with an ACK.

use std::io::{Read, Write};

use crc::{CRC_16_XMODEM, Crc};
use kboot_lib::{BackdoorKey, Bootloader, Error, Property, Result, Status};
use strum::{Display, EnumIter, IntoEnumIterator};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const START_BYTE: u8 = 0x5A;
const HEADER_LEN: usize = 6;
/// Payload size of a data phase packet.
pub const MAX_DATA_PACKET: usize = 32;

const FLAG_HAS_DATA_PHASE: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum PacketType {
    Ack = 0xA1,
    Nak = 0xA2,
    AckAbort = 0xA3,
    Command = 0xA4,
    Data = 0xA5,
    Ping = 0xA6,
    PingResponse = 0xA7,
}

impl PacketType {
    fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xA1 => Self::Ack,
            0xA2 => Self::Nak,
            0xA3 => Self::AckAbort,
            0xA4 => Self::Command,
            0xA5 => Self::Data,
            0xA6 => Self::Ping,
            0xA7 => Self::PingResponse,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum CommandTag {
    FlashEraseAll = 0x01,
    FlashEraseRegion = 0x02,
    ReadMemory = 0x03,
    WriteMemory = 0x04,
    FillMemory = 0x05,
    FlashSecurityDisable = 0x06,
    GetProperty = 0x07,
    Reset = 0x0B,
    FlashEraseAllUnsecure = 0x0D,
}

const GENERIC_RESPONSE: u8 = 0xA0;
const READ_MEMORY_RESPONSE: u8 = 0xA3;
const GET_PROPERTY_RESPONSE: u8 = 0xA7;

/// Bootloader properties queried by [`UartBootloader::get_properties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[repr(u8)]
pub enum PropertyTag {
    CurrentVersion = 1,
    AvailablePeripherals = 2,
    FlashStartAddress = 3,
    FlashSizeInBytes = 4,
    FlashSectorSize = 5,
    FlashBlockCount = 6,
    AvailableCommands = 7,
    VerifyWrites = 10,
    MaxPacketSize = 11,
    RAMStartAddress = 14,
    RAMSizeInBytes = 15,
    SystemDeviceIdent = 16,
    FlashSecurityState = 17,
}

const PERIPHERALS: [&str; 7] = [
    "UART",
    "I2C-Slave",
    "SPI-Slave",
    "CAN",
    "USB-HID",
    "USB-CDC",
    "USB-DFU",
];

const COMMANDS: [&str; 16] = [
    "FlashEraseAll",
    "FlashEraseRegion",
    "ReadMemory",
    "WriteMemory",
    "FillMemory",
    "FlashSecurityDisable",
    "GetProperty",
    "ReceiveSBFile",
    "Execute",
    "Call",
    "Reset",
    "SetProperty",
    "FlashEraseAllUnsecure",
    "FlashProgramOnce",
    "FlashReadOnce",
    "FlashReadResource",
];

fn size_string(value: u32) -> String {
    const KIB: u32 = 1024;
    const MIB: u32 = 1024 * 1024;
    if value >= MIB && value % MIB == 0 {
        format!("{} MiB", value / MIB)
    } else if value >= KIB && value % KIB == 0 {
        format!("{} KiB", value / KIB)
    } else {
        format!("{} B", value)
    }
}

fn flag_names(value: u32, names: &[&str]) -> String {
    let listed: Vec<&str> = names
        .iter()
        .enumerate()
        .filter(|(bit, _)| value & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect();
    listed.join(", ")
}

impl PropertyTag {
    /// Human readable form of a raw property value.
    pub fn decode(self, value: u32) -> String {
        match self {
            Self::CurrentVersion => {
                let [bugfix, minor, major, name] = value.to_le_bytes();
                format!("{}{}.{}.{}", char::from(name), major, minor, bugfix)
            }
            Self::AvailablePeripherals => flag_names(value, &PERIPHERALS),
            Self::AvailableCommands => flag_names(value, &COMMANDS),
            Self::FlashStartAddress | Self::RAMStartAddress | Self::SystemDeviceIdent => {
                format!("0x{:08X}", value)
            }
            Self::FlashSizeInBytes | Self::FlashSectorSize | Self::RAMSizeInBytes => {
                size_string(value)
            }
            Self::FlashBlockCount | Self::MaxPacketSize => value.to_string(),
            Self::VerifyWrites => String::from(if value == 0 { "OFF" } else { "ON" }),
            Self::FlashSecurityState => {
                String::from(if value == 0 { "Unlocked" } else { "Locked" })
            }
        }
    }
}

/// Build a framed packet.
pub fn frame(packet_type: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() as u16).to_le_bytes();
    let header = [START_BYTE, packet_type, len[0], len[1]];

    let mut digest = CRC16.digest();
    digest.update(&header);
    digest.update(payload);
    let crc = digest.finalize().to_le_bytes();

    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&header);
    packet.extend_from_slice(&crc);
    packet.extend_from_slice(payload);
    packet
}

/// Payload of a command packet.
pub fn command_payload(tag: u8, flags: u8, params: &[u32]) -> Vec<u8> {
    let mut payload = vec![tag, flags, 0, params.len() as u8];
    for param in params {
        payload.extend_from_slice(&param.to_le_bytes());
    }
    payload
}

/// Bootloader version reported by the ping response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub name: char,
    pub major: u8,
    pub minor: u8,
    pub bugfix: u8,
}

struct Response {
    tag: u8,
    params: Vec<u32>,
}

impl Response {
    fn status(&self) -> Status {
        Status::from(self.params.first().copied().unwrap_or(u32::MAX))
    }
}

/// A KBoot device on a byte stream, usually a serial port.
pub struct UartBootloader<T: Read + Write> {
    port: T,
}

impl<T: Read + Write> UartBootloader<T> {
    pub fn new(port: T) -> Self {
        Self { port }
    }

    /// Check the bootloader answers and report its protocol version.
    pub fn ping(&mut self) -> Result<ProtocolVersion> {
        self.write_all(&[START_BYTE, PacketType::Ping as u8])?;

        let mut response = [0u8; 10];
        self.port.read_exact(&mut response)?;
        if response[0] != START_BYTE || response[1] != PacketType::PingResponse as u8 {
            return Err(Error::protocol(format!(
                "unexpected ping response {:02X} {:02X}",
                response[0], response[1]
            )));
        }
        let crc = u16::from_le_bytes([response[8], response[9]]);
        if CRC16.checksum(&response[..8]) != crc {
            return Err(Error::protocol("ping response CRC mismatch"));
        }

        let version = ProtocolVersion {
            name: char::from(response[5]),
            major: response[4],
            minor: response[3],
            bugfix: response[2],
        };
        tracing::debug!("ping response: {:?}", version);
        Ok(version)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn send_ack(&mut self) -> Result<()> {
        self.write_all(&[START_BYTE, PacketType::Ack as u8])
    }

    fn read_packet_type(&mut self) -> Result<PacketType> {
        let mut head = [0u8; 2];
        self.port.read_exact(&mut head)?;
        if head[0] != START_BYTE {
            return Err(Error::protocol(format!("bad start byte 0x{:02X}", head[0])));
        }
        PacketType::from_byte(head[1])
            .ok_or_else(|| Error::protocol(format!("unknown packet type 0x{:02X}", head[1])))
    }

    fn expect_ack(&mut self) -> Result<()> {
        match self.read_packet_type()? {
            PacketType::Ack => Ok(()),
            PacketType::Nak => Err(Error::protocol("packet rejected (NAK)")),
            PacketType::AckAbort => Err(Error::protocol("transfer aborted by the device")),
            other => Err(Error::protocol(format!("expected ACK, got {:?}", other))),
        }
    }

    fn read_framed(&mut self, expected: PacketType) -> Result<Vec<u8>> {
        let packet_type = self.read_packet_type()?;
        if packet_type != expected {
            return Err(Error::protocol(format!(
                "expected {:?} packet, got {:?}",
                expected, packet_type
            )));
        }

        let mut rest = [0u8; 4];
        self.port.read_exact(&mut rest)?;
        let len = u16::from_le_bytes([rest[0], rest[1]]);
        let crc = u16::from_le_bytes([rest[2], rest[3]]);
        let mut payload = vec![0u8; usize::from(len)];
        self.port.read_exact(&mut payload)?;

        let mut digest = CRC16.digest();
        digest.update(&[START_BYTE, packet_type as u8, rest[0], rest[1]]);
        digest.update(&payload);
        if digest.finalize() != crc {
            return Err(Error::protocol(format!("{:?} packet CRC mismatch", packet_type)));
        }
        Ok(payload)
    }

    fn send_framed(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<()> {
        self.write_all(&frame(packet_type as u8, payload))?;
        self.expect_ack()
    }

    fn read_response(&mut self) -> Result<Response> {
        let payload = self.read_framed(PacketType::Command)?;
        self.send_ack()?;
        if payload.len() < 4 {
            return Err(Error::protocol("response packet too short"));
        }
        let params = payload[4..]
            .chunks_exact(4)
            .take(usize::from(payload[3]))
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();
        Ok(Response {
            tag: payload[0],
            params,
        })
    }

    fn command(&mut self, tag: CommandTag, flags: u8, params: &[u32]) -> Result<Response> {
        tracing::debug!("command {:?} {:08X?}", tag, params);
        self.send_framed(PacketType::Command, &command_payload(tag as u8, flags, params))?;
        self.read_response()
    }

    fn generic_command(&mut self, tag: CommandTag, params: &[u32]) -> Result<Status> {
        let response = self.command(tag, 0, params)?;
        if response.tag != GENERIC_RESPONSE {
            return Err(Error::protocol(format!(
                "unexpected response tag 0x{:02X} to {:?}",
                response.tag, tag
            )));
        }
        Ok(response.status())
    }

    fn final_status(&mut self) -> Result<Status> {
        let response = self.read_response()?;
        if response.tag != GENERIC_RESPONSE {
            return Err(Error::protocol(format!(
                "unexpected final response tag 0x{:02X}",
                response.tag
            )));
        }
        Ok(response.status())
    }

    fn get_property(&mut self, tag: PropertyTag) -> Result<(Status, u32)> {
        let response = self.command(CommandTag::GetProperty, 0, &[tag as u32, 0])?;
        if response.tag != GET_PROPERTY_RESPONSE {
            return Err(Error::protocol(format!(
                "unexpected response tag 0x{:02X} to GetProperty",
                response.tag
            )));
        }
        let value = response.params.get(1).copied().unwrap_or(0);
        Ok((response.status(), value))
    }
}

impl<T: Read + Write> Bootloader for UartBootloader<T> {
    fn get_properties(&mut self) -> Result<Vec<Property>> {
        let mut properties = Vec::new();
        for tag in PropertyTag::iter() {
            let (status, value) = self.get_property(tag)?;
            if !status.is_success() {
                tracing::debug!("property {} not available: {}", tag, status);
                continue;
            }
            properties.push(Property {
                name: tag.to_string(),
                raw_value: value,
                decoded: tag.decode(value),
            });
        }
        Ok(properties)
    }

    fn read_memory(&mut self, address: u32, length: u32) -> Result<(Status, Vec<u8>)> {
        let response = self.command(CommandTag::ReadMemory, 0, &[address, length])?;
        if response.tag != READ_MEMORY_RESPONSE {
            return Err(Error::protocol(format!(
                "unexpected response tag 0x{:02X} to ReadMemory",
                response.tag
            )));
        }
        let status = response.status();
        if !status.is_success() {
            return Ok((status, Vec::new()));
        }

        let count = response.params.get(1).copied().unwrap_or(length) as usize;
        let mut data = Vec::with_capacity(count);
        while data.len() < count {
            let chunk = self.read_framed(PacketType::Data)?;
            self.send_ack()?;
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
        }
        data.truncate(count);

        Ok((self.final_status()?, data))
    }

    fn write_memory(&mut self, address: u32, data: &[u8]) -> Result<Status> {
        let length = u32::try_from(data.len())
            .map_err(|_| Error::invalid_argument("write larger than 4 GiB"))?;
        let response = self.command(
            CommandTag::WriteMemory,
            FLAG_HAS_DATA_PHASE,
            &[address, length],
        )?;
        let status = response.status();
        if !status.is_success() {
            return Ok(status);
        }

        for chunk in data.chunks(MAX_DATA_PACKET) {
            self.send_framed(PacketType::Data, chunk)?;
        }
        self.final_status()
    }

    fn flash_erase_all(&mut self) -> Result<Status> {
        self.generic_command(CommandTag::FlashEraseAll, &[])
    }

    fn flash_erase_all_unsecure(&mut self) -> Result<Status> {
        self.generic_command(CommandTag::FlashEraseAllUnsecure, &[])
    }

    fn flash_erase_region(&mut self, address: u32, length: u32) -> Result<Status> {
        self.generic_command(CommandTag::FlashEraseRegion, &[address, length])
    }

    fn flash_security_disable(&mut self, key: &BackdoorKey) -> Result<Status> {
        self.generic_command(CommandTag::FlashSecurityDisable, &key.words())
    }

    fn fill_memory(&mut self, address: u32, length: u32, pattern: u32) -> Result<Status> {
        self.generic_command(CommandTag::FillMemory, &[address, length, pattern])
    }

    fn reset(&mut self) -> Result<Status> {
        self.generic_command(CommandTag::Reset, &[])
    }

    fn disconnect(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted device bytes and records what the host sent.
    #[derive(Default)]
    struct Script {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl Script {
        fn device_sends(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes);
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.rx.read(buf)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    const ACK: [u8; 2] = [START_BYTE, 0xA1];

    fn response(tag: u8, params: &[u32]) -> Vec<u8> {
        frame(PacketType::Command as u8, &command_payload(tag, 0, params))
    }

    #[test]
    fn crc_matches_xmodem_check_value() {
        assert_eq!(CRC16.checksum(b"123456789"), 0x31C3);
    }

    #[test]
    fn frame_layout() {
        let packet = frame(0xA4, &command_payload(0x0B, 0, &[]));
        assert_eq!(&packet[..4], &[0x5A, 0xA4, 0x04, 0x00]);
        assert_eq!(&packet[6..], &[0x0B, 0x00, 0x00, 0x00]);

        let mut crc_input = packet[..4].to_vec();
        crc_input.extend_from_slice(&packet[6..]);
        let crc = CRC16.checksum(&crc_input).to_le_bytes();
        assert_eq!(&packet[4..6], &crc);
    }

    #[test]
    fn ping_reports_version() {
        let mut port = Script::default();
        let mut reply = vec![START_BYTE, 0xA7, 0x00, 0x02, 0x01, b'P', 0x00, 0x00];
        reply.extend_from_slice(&CRC16.checksum(&reply).to_le_bytes());
        port.device_sends(&reply);

        let mut device = UartBootloader::new(port);
        let version = device.ping().unwrap();
        assert_eq!(
            version,
            ProtocolVersion {
                name: 'P',
                major: 1,
                minor: 2,
                bugfix: 0,
            }
        );
        assert_eq!(device.port.tx, [0x5A, 0xA6]);
    }

    #[test]
    fn reset_exchange() {
        let mut port = Script::default();
        port.device_sends(&ACK);
        port.device_sends(&response(GENERIC_RESPONSE, &[0, CommandTag::Reset as u32]));

        let mut device = UartBootloader::new(port);
        assert_eq!(device.reset().unwrap(), Status::Success);

        let mut expected = frame(0xA4, &command_payload(0x0B, 0, &[]));
        expected.extend_from_slice(&ACK);
        assert_eq!(device.port.tx, expected);
    }

    #[test]
    fn failing_status_is_reported() {
        let mut port = Script::default();
        port.device_sends(&ACK);
        port.device_sends(&response(GENERIC_RESPONSE, &[10001, 0x0D]));

        let mut device = UartBootloader::new(port);
        assert_eq!(
            device.flash_erase_all_unsecure().unwrap(),
            Status::SecurityViolation
        );
    }

    #[test]
    fn nak_is_a_link_error() {
        let mut port = Script::default();
        port.device_sends(&[START_BYTE, 0xA2]);

        let mut device = UartBootloader::new(port);
        assert!(matches!(device.flash_erase_all(), Err(Error::Protocol(_))));
    }

    #[test]
    fn read_memory_collects_data_phase() {
        let mut port = Script::default();
        port.device_sends(&ACK);
        port.device_sends(&response(READ_MEMORY_RESPONSE, &[0, 3]));
        port.device_sends(&frame(PacketType::Data as u8, &[0xDE, 0xAD, 0xBE]));
        port.device_sends(&response(GENERIC_RESPONSE, &[0, 0x03]));

        let mut device = UartBootloader::new(port);
        let (status, data) = device.read_memory(0x1000, 3).unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(data, [0xDE, 0xAD, 0xBE]);
    }

    #[test]
    fn write_memory_splits_data_packets() {
        let data: Vec<u8> = (0..40).collect();
        let mut port = Script::default();
        port.device_sends(&ACK);
        port.device_sends(&response(GENERIC_RESPONSE, &[0, 0x04]));
        port.device_sends(&ACK);
        port.device_sends(&ACK);
        port.device_sends(&response(GENERIC_RESPONSE, &[0, 0x04]));

        let mut device = UartBootloader::new(port);
        assert_eq!(device.write_memory(0x2000, &data).unwrap(), Status::Success);

        let tx = &device.port.tx;
        let first = frame(0xA5, &data[..32]);
        let second = frame(0xA5, &data[32..]);
        let find = |needle: &[u8]| tx.windows(needle.len()).position(|w| w == needle);
        assert!(find(&first).unwrap() < find(&second).unwrap());
    }

    #[test]
    fn decodes_properties() {
        assert_eq!(PropertyTag::CurrentVersion.decode(0x4B01_0400), "K1.4.0");
        assert_eq!(PropertyTag::FlashSizeInBytes.decode(0x0010_0000), "1 MiB");
        assert_eq!(PropertyTag::FlashSectorSize.decode(0x800), "2 KiB");
        assert_eq!(PropertyTag::AvailablePeripherals.decode(0b10_0001), "UART, USB-CDC");
        assert_eq!(PropertyTag::FlashSecurityState.decode(0), "Unlocked");
        assert_eq!(PropertyTag::RAMStartAddress.decode(0x1FFF_0000), "0x1FFF0000");
    }
}
