//! Linux SMBus adapter
//!
//! Talks to `/dev/i2c-N` through the kernel's i2c-dev interface. The device
//! node is opened on first use and bound to one slave address; a read for a
//! different address rebinds it. [`RegisterBus::reopen`] drops the handle and
//! opens it again, which clears a wedged adapter on the Raspberry Pi.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::{debug, info};

use crate::sensor::RegisterBus;

/// SMBus access through an i2c-dev character device
pub struct LinuxSmbus {
    path: PathBuf,
    device: Option<(u8, LinuxI2CDevice)>,
}

impl fmt::Debug for LinuxSmbus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinuxSmbus")
            .field("path", &self.path)
            .field("address", &self.device.as_ref().map(|(address, _)| *address))
            .finish()
    }
}

fn bus_error(err: impl fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

impl LinuxSmbus {
    /// Adapter for the device node at `path`; nothing is opened yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), device: None }
    }

    /// Device node
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn device(&mut self, address: u8) -> io::Result<&mut LinuxI2CDevice> {
        let bound = matches!(&self.device, Some((current, _)) if *current == address);
        if !bound {
            debug!("Opening {} for address {:#04x}", self.path.display(), address);
            let device = LinuxI2CDevice::new(&self.path, u16::from(address)).map_err(bus_error)?;
            self.device = Some((address, device));
        }
        match self.device.as_mut() {
            Some((_, device)) => Ok(device),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "bus not open")),
        }
    }
}

impl RegisterBus for LinuxSmbus {
    fn read_block(&mut self, address: u8, register: u8, buf: &mut [u8]) -> io::Result<()> {
        let len = u8::try_from(buf.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "block read longer than 255 bytes"))?;
        let data = self
            .device(address)?
            .smbus_read_i2c_block_data(register, len)
            .map_err(bus_error)?;

        if data.len() < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short block read: {} of {} bytes", data.len(), buf.len()),
            ));
        }
        buf.copy_from_slice(&data[..buf.len()]);
        Ok(())
    }

    fn reopen(&mut self) -> io::Result<()> {
        let Some((address, _)) = self.device.take() else {
            return Ok(());
        };
        info!("Reopening {}", self.path.display());
        self.device(address).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_node_is_an_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bus = LinuxSmbus::new(dir.path().join("i2c-9"));
        let mut buf = [0u8; 3];

        assert!(bus.read_block(0x5A, 0x06, &mut buf).is_err());
        assert!(format!("{bus:?}").contains("i2c-9"));
        // nothing was bound, so there is nothing to reopen
        assert!(bus.reopen().is_ok());
    }
}
