use std::time::Duration;

use kboot_lib::{Bootloader, DeviceCandidate, Error, Result, Transport};
use serialport::{SerialPortInfo, SerialPortType};

use crate::uart::UartBootloader;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Finds KBoot devices among the USB serial ports and connects over UART.
pub struct SerialTransport {
    baud: u32,
}

impl SerialTransport {
    pub fn new(baud: u32) -> Self {
        Self { baud }
    }
}

/// On macOS, /dev/tty.* ports should be avoided in favor of /dev/cu.* ports
fn usable_port(port: &SerialPortInfo) -> bool {
    #[cfg(target_os = "macos")]
    {
        !port.port_name.starts_with("/dev/tty.")
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = port;
        true
    }
}

fn matching_candidate(port: &SerialPortInfo, vid: u16, pid: u16) -> Option<DeviceCandidate> {
    let SerialPortType::UsbPort(usb) = &port.port_type else {
        return None;
    };
    if usb.vid != vid || usb.pid != pid || !usable_port(port) {
        return None;
    }

    let product = usb.product.as_deref().unwrap_or("KBoot device");
    let description = match &usb.serial_number {
        Some(serial) => format!("{} [{}] on {}", product, serial, port.port_name),
        None => format!("{} on {}", product, port.port_name),
    };
    Some(DeviceCandidate {
        path: port.port_name.clone(),
        description,
    })
}

impl Transport for SerialTransport {
    fn discover(&mut self, vid: u16, pid: u16) -> Result<Vec<DeviceCandidate>> {
        let ports = serialport::available_ports()
            .map_err(|e| Error::protocol(format!("failed to list serial ports: {}", e)))?;
        Ok(ports
            .iter()
            .filter_map(|port| matching_candidate(port, vid, pid))
            .collect())
    }

    fn connect(&mut self, candidate: &DeviceCandidate) -> Result<Box<dyn Bootloader>> {
        let port = serialport::new(&candidate.path, self.baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| Error::connect_failed(&candidate.path, e.to_string()))?;
        tracing::info!("opened {} at {} baud", candidate.path, self.baud);

        let mut device = UartBootloader::new(port);
        let version = device
            .ping()
            .map_err(|e| Error::connect_failed(&candidate.path, e.to_string()))?;
        tracing::info!(
            "bootloader protocol {}{}.{}.{}",
            version.name,
            version.major,
            version.minor,
            version.bugfix
        );
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_port(name: &str, vid: u16, pid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number: Some("0001".to_string()),
                manufacturer: None,
                product: Some("FRDM-K64F".to_string()),
            }),
        }
    }

    #[test]
    fn only_matching_usb_ports_are_candidates() {
        let port = usb_port("/dev/ttyACM0", 0x15A2, 0x0073);
        let candidate = matching_candidate(&port, 0x15A2, 0x0073).unwrap();
        assert_eq!(candidate.path, "/dev/ttyACM0");
        assert_eq!(candidate.description, "FRDM-K64F [0001] on /dev/ttyACM0");

        assert!(matching_candidate(&port, 0x15A2, 0x0074).is_none());

        let plain = SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        };
        assert!(matching_candidate(&plain, 0x15A2, 0x0073).is_none());
    }
}
