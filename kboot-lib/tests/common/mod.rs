#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kboot_lib::progress::no_op_progress_callback;
use kboot_lib::{
    BackdoorKey, Bootloader, DeviceCandidate, DeviceSelector, DeviceSession, Error, FixedSelector,
    KBootTool, Property, Result, Status, Transport,
};

/// Everything the fake bootloader was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Discover { vid: u16, pid: u16 },
    Connect(String),
    GetProperties,
    ReadMemory { address: u32, length: u32 },
    WriteMemory { address: u32, data: Vec<u8> },
    EraseAll,
    EraseAllUnsecure,
    EraseRegion { address: u32, length: u32 },
    SecurityDisable([u8; 16]),
    FillMemory { address: u32, length: u32, pattern: u32 },
    Reset,
    Disconnect,
}

pub type Log = Rc<RefCell<Vec<Call>>>;

/// Behaviour of the fake transport and device.
#[derive(Debug, Clone)]
pub struct Script {
    /// Number of devices found by discovery.
    pub devices: usize,
    pub fail_connect: bool,
    pub fail_disconnect: bool,
    /// Status returned by a named command instead of success.
    pub statuses: HashMap<&'static str, Status>,
    /// Command that fails with a link error.
    pub link_error: Option<&'static str>,
    /// Bytes short of the requested length returned by read_memory.
    pub short_read: u32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            devices: 1,
            fail_connect: false,
            fail_disconnect: false,
            statuses: HashMap::new(),
            link_error: None,
            short_read: 0,
        }
    }
}

impl Script {
    pub fn with_status(mut self, command: &'static str, status: Status) -> Self {
        self.statuses.insert(command, status);
        self
    }

    pub fn with_link_error(mut self, command: &'static str) -> Self {
        self.link_error = Some(command);
        self
    }
}

pub struct MockTransport {
    log: Log,
    script: Rc<Script>,
}

impl MockTransport {
    pub fn new(script: Script) -> (Self, Log) {
        let log = Log::default();
        let transport = Self {
            log: Rc::clone(&log),
            script: Rc::new(script),
        };
        (transport, log)
    }
}

impl Transport for MockTransport {
    fn discover(&mut self, vid: u16, pid: u16) -> Result<Vec<DeviceCandidate>> {
        self.log.borrow_mut().push(Call::Discover { vid, pid });
        Ok((0..self.script.devices)
            .map(|i| DeviceCandidate {
                path: format!("/dev/ttyACM{}", i),
                description: format!("FRDM-K64F #{}", i),
            })
            .collect())
    }

    fn connect(&mut self, candidate: &DeviceCandidate) -> Result<Box<dyn Bootloader>> {
        self.log.borrow_mut().push(Call::Connect(candidate.path.clone()));
        if self.script.fail_connect {
            return Err(Error::connect_failed(&candidate.path, "port busy"));
        }
        Ok(Box::new(MockDevice {
            log: Rc::clone(&self.log),
            script: Rc::clone(&self.script),
        }))
    }
}

pub struct MockDevice {
    log: Log,
    script: Rc<Script>,
}

impl MockDevice {
    fn command(&self, name: &'static str, call: Call) -> Result<Status> {
        self.log.borrow_mut().push(call);
        if self.script.link_error == Some(name) {
            return Err(Error::protocol(format!("link lost during {}", name)));
        }
        Ok(self
            .script
            .statuses
            .get(name)
            .copied()
            .unwrap_or(Status::Success))
    }
}

impl Bootloader for MockDevice {
    fn get_properties(&mut self) -> Result<Vec<Property>> {
        self.command("get_properties", Call::GetProperties)?;
        Ok(vec![
            Property {
                name: "CurrentVersion".to_string(),
                raw_value: 0x4B01_0400,
                decoded: "K1.4.0".to_string(),
            },
            Property {
                name: "FlashSize".to_string(),
                raw_value: 0x0010_0000,
                decoded: "1.0 MiB".to_string(),
            },
        ])
    }

    fn read_memory(&mut self, address: u32, length: u32) -> Result<(Status, Vec<u8>)> {
        let status = self.command("read_memory", Call::ReadMemory { address, length })?;
        let returned = length.saturating_sub(self.script.short_read);
        let data = (0..returned).map(|i| address.wrapping_add(i) as u8).collect();
        Ok((status, data))
    }

    fn write_memory(&mut self, address: u32, data: &[u8]) -> Result<Status> {
        self.command(
            "write_memory",
            Call::WriteMemory {
                address,
                data: data.to_vec(),
            },
        )
    }

    fn flash_erase_all(&mut self) -> Result<Status> {
        self.command("flash_erase_all", Call::EraseAll)
    }

    fn flash_erase_all_unsecure(&mut self) -> Result<Status> {
        self.command("flash_erase_all_unsecure", Call::EraseAllUnsecure)
    }

    fn flash_erase_region(&mut self, address: u32, length: u32) -> Result<Status> {
        self.command("flash_erase_region", Call::EraseRegion { address, length })
    }

    fn flash_security_disable(&mut self, key: &BackdoorKey) -> Result<Status> {
        self.command(
            "flash_security_disable",
            Call::SecurityDisable(*key.as_bytes()),
        )
    }

    fn fill_memory(&mut self, address: u32, length: u32, pattern: u32) -> Result<Status> {
        self.command(
            "fill_memory",
            Call::FillMemory {
                address,
                length,
                pattern,
            },
        )
    }

    fn reset(&mut self) -> Result<Status> {
        self.command("reset", Call::Reset)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Call::Disconnect);
        if self.script.fail_disconnect {
            return Err(Error::protocol("port vanished"));
        }
        Ok(())
    }
}

/// Selector that records how often it was asked.
pub struct CountingSelector {
    pub choice: usize,
    pub asked: Rc<RefCell<usize>>,
}

impl DeviceSelector for CountingSelector {
    fn choose(&mut self, _candidates: &[DeviceCandidate]) -> Result<usize> {
        *self.asked.borrow_mut() += 1;
        Ok(self.choice)
    }
}

pub fn session(script: Script) -> (DeviceSession, Log) {
    let (transport, log) = MockTransport::new(script);
    let session = DeviceSession::new(
        Box::new(transport),
        Box::new(FixedSelector(0)),
        kboot_lib::DEFAULT_VID,
        kboot_lib::DEFAULT_PID,
    );
    (session, log)
}

pub fn tool(script: Script) -> (KBootTool, Log) {
    let (session, log) = session(script);
    (KBootTool::new(session, no_op_progress_callback()), log)
}

/// Calls made once the device was connected, without discovery and connect.
pub fn device_calls(log: &Log) -> Vec<Call> {
    log.borrow()
        .iter()
        .filter(|call| !matches!(call, Call::Discover { .. } | Call::Connect(_)))
        .cloned()
        .collect()
}

pub fn disconnects(log: &Log) -> usize {
    log.borrow()
        .iter()
        .filter(|call| **call == Call::Disconnect)
        .count()
}
