//! Connection lifecycle for a single device.
//!
//! A [`DeviceSession`] moves through `Unconnected -> Selecting -> Connected`
//! and back. Memory commands are only reachable while connected, and
//! [`DeviceSession::scoped`] guarantees the connection is released on every
//! exit path of a workflow.

use crate::bootloader::{Bootloader, DeviceCandidate, Transport};
use crate::{Error, Result};

/// Picks one device when discovery finds several.
pub trait DeviceSelector {
    /// Return the zero-based index of the chosen candidate.
    fn choose(&mut self, candidates: &[DeviceCandidate]) -> Result<usize>;
}

/// Always picks the same index; for scripted and test runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSelector(pub usize);

impl DeviceSelector for FixedSelector {
    fn choose(&mut self, _candidates: &[DeviceCandidate]) -> Result<usize> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Selecting,
    Connected,
}

pub struct DeviceSession {
    transport: Box<dyn Transport>,
    selector: Box<dyn DeviceSelector>,
    vid: u16,
    pid: u16,
    selecting: bool,
    device: Option<Box<dyn Bootloader>>,
}

impl DeviceSession {
    pub fn new(
        transport: Box<dyn Transport>,
        selector: Box<dyn DeviceSelector>,
        vid: u16,
        pid: u16,
    ) -> Self {
        Self {
            transport,
            selector,
            vid,
            pid,
            selecting: false,
            device: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.device.is_some() {
            SessionState::Connected
        } else if self.selecting {
            SessionState::Selecting
        } else {
            SessionState::Unconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    /// List candidate devices matching the session's VID/PID.
    pub fn discover(&mut self) -> Result<Vec<DeviceCandidate>> {
        let candidates = self.transport.discover(self.vid, self.pid)?;
        tracing::debug!(
            "found {} device(s) with VID 0x{:04X} PID 0x{:04X}",
            candidates.len(),
            self.vid,
            self.pid
        );
        Ok(candidates)
    }

    /// Choose one candidate; a single candidate is picked without asking.
    pub fn select(&mut self, mut candidates: Vec<DeviceCandidate>) -> Result<DeviceCandidate> {
        if candidates.is_empty() {
            return Err(Error::NoDeviceFound {
                vid: self.vid,
                pid: self.pid,
            });
        }
        if candidates.len() == 1 {
            return Ok(candidates.remove(0));
        }

        self.selecting = true;
        let choice = self.selector.choose(&candidates);
        self.selecting = false;

        let index = choice?;
        if index >= candidates.len() {
            return Err(Error::SelectionOutOfRange {
                selection: index.to_string(),
                count: candidates.len(),
            });
        }
        Ok(candidates.swap_remove(index))
    }

    pub fn connect(&mut self, candidate: &DeviceCandidate) -> Result<()> {
        if self.device.is_some() {
            return Err(Error::protocol("a device is already connected"));
        }
        tracing::info!("connecting to {}", candidate.description);
        let device = self.transport.connect(candidate)?;
        self.device = Some(device);
        Ok(())
    }

    /// Discover, select and connect in one go.
    pub fn open(&mut self) -> Result<()> {
        let candidates = self.discover()?;
        let candidate = self.select(candidates)?;
        self.connect(&candidate)
    }

    /// Release the connection. Does nothing when not connected.
    pub fn disconnect(&mut self) -> Result<()> {
        match self.device.take() {
            Some(mut device) => {
                tracing::debug!("disconnecting");
                device.disconnect()
            }
            None => Ok(()),
        }
    }

    /// The connected device, or [`Error::NotConnected`].
    pub fn device(&mut self) -> Result<&mut dyn Bootloader> {
        let device: &mut dyn Bootloader =
            self.device.as_deref_mut().ok_or(Error::NotConnected)?;
        Ok(device)
    }

    /// Connect, run `f` against the device and always disconnect afterwards.
    ///
    /// An error from `f` wins over a failure to disconnect.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut dyn Bootloader) -> Result<T>) -> Result<T> {
        self.open()?;
        let result = self.device().and_then(f);
        let closed = self.disconnect();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Like [`scoped`](Self::scoped) but a failed disconnect is only logged,
    /// for commands after which the device may no longer answer.
    pub fn scoped_best_effort<T>(
        &mut self,
        f: impl FnOnce(&mut dyn Bootloader) -> Result<T>,
    ) -> Result<T> {
        self.open()?;
        let result = self.device().and_then(f);
        if let Err(e) = self.disconnect() {
            tracing::warn!("disconnect after command failed: {}", e);
        }
        result
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::warn!("disconnect on drop failed: {}", e);
        }
    }
}
