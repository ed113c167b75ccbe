//! Temperature sources
//!
//! The station reads an MLX90614 infrared thermometer over SMBus. The driver
//! here owns its bus handle outright; there is no process-wide connection.
//! When the bus wedges, [`TemperatureSource::reconnect`] reopens it.
//!
//! ## Conversion
//!
//! Each register read returns three bytes: LSB, MSB and a PEC byte (ignored).
//! The 16-bit word converts to Celsius as `raw * 0.02 - 273.15`. Some bus
//! adapters deliver the bytes swapped; a result outside the sensor range is
//! therefore retried once with the bytes exchanged before it is rejected.
//!
//! A reading averages two ambient/object pairs taken 50 ms apart and rounds
//! both to 0.01 °C.
//!
//! [`FixedReading`] wraps values acquired elsewhere, such as the command line.

use std::io;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::constants::sensor::{KELVIN_OFFSET, RAW_KELVIN_PER_LSB, SETTLE_DELAY_MS};
use crate::constants::{
    AMBIENT_CONNECTED_MAX_C, AMBIENT_CONNECTED_MIN_C, MLX90614_DEFAULT_ADDRESS, PLAUSIBLE_MAX_C,
    PLAUSIBLE_MIN_C, REG_AMBIENT, REG_OBJECT_1,
};
use crate::errors::{SkyGuardError, SkyGuardResult};
use crate::validation::{round_to, validate_reading};

/// One ambient/object temperature pair (°C)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Sensor die temperature
    pub ambient: f64,
    /// IR object temperature
    pub object: f64,
}

impl Reading {
    /// Reading from two temperatures
    pub const fn new(ambient: f64, object: f64) -> Self {
        Self { ambient, object }
    }

    /// `object - ambient`, rounded to 0.01
    pub fn delta(&self) -> f64 {
        round_to(self.object - self.ambient, 2)
    }
}

/// Anything that yields validated readings
pub trait TemperatureSource {
    /// Acquire one validated reading
    fn read_temperatures(&mut self) -> SkyGuardResult<Reading>;

    /// Re-establish the connection to the device
    fn reconnect(&mut self) -> SkyGuardResult<()> {
        Ok(())
    }
}

/// Raw SMBus access
pub trait RegisterBus {
    /// Block read of `buf.len()` bytes from `register` of device `address`
    fn read_block(&mut self, address: u8, register: u8, buf: &mut [u8]) -> io::Result<()>;

    /// Close and reopen the underlying device
    fn reopen(&mut self) -> io::Result<()>;
}

/// Convert a raw register word to Celsius
pub fn raw_to_celsius(raw: u16) -> f64 {
    f64::from(raw) * RAW_KELVIN_PER_LSB - KELVIN_OFFSET
}

/// Convert a raw word, retrying swapped bytes when out of range, rounded to 0.01
pub fn decode_temperature(raw: u16) -> f64 {
    let plausible = |t: f64| (PLAUSIBLE_MIN_C..=PLAUSIBLE_MAX_C).contains(&t);

    let mut celsius = raw_to_celsius(raw);
    if !plausible(celsius) {
        let swapped = raw_to_celsius(raw.swap_bytes());
        if plausible(swapped) {
            debug!("MLX90614: byte-swapped word {raw:#06x} gives {swapped:.2} °C");
            celsius = swapped;
        }
    }
    round_to(celsius, 2)
}

/// MLX90614 driver over an owned bus
#[derive(Debug)]
pub struct Mlx90614<B> {
    bus: B,
    address: u8,
    settle: Duration,
}

impl<B: RegisterBus> Mlx90614<B> {
    /// Driver at the factory address `0x5A`
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            address: MLX90614_DEFAULT_ADDRESS,
            settle: Duration::from_millis(SETTLE_DELAY_MS),
        }
    }

    /// Use a non-default SMBus address
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Pause between the two sample pairs
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Configured address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give back the bus
    pub fn into_inner(self) -> B {
        self.bus
    }

    fn unavailable(&self, err: io::Error) -> SkyGuardError {
        SkyGuardError::SensorUnavailable {
            reason: format!("MLX90614 at {:#04x}: {err}", self.address),
        }
    }

    /// Read one register as Celsius
    pub fn read_celsius(&mut self, register: u8) -> SkyGuardResult<f64> {
        let mut buf = [0u8; 3];
        if let Err(err) = self.bus.read_block(self.address, register, &mut buf) {
            return Err(self.unavailable(err));
        }
        Ok(decode_temperature(u16::from_le_bytes([buf[0], buf[1]])))
    }

    /// Whether the ambient channel answers with a plausible value
    pub fn is_connected(&mut self) -> bool {
        self.read_celsius(REG_AMBIENT)
            .map(|t| (AMBIENT_CONNECTED_MIN_C..=AMBIENT_CONNECTED_MAX_C).contains(&t))
            .unwrap_or(false)
    }

    fn read_pair(&mut self) -> SkyGuardResult<Reading> {
        let ambient = self.read_celsius(REG_AMBIENT)?;
        let object = self.read_celsius(REG_OBJECT_1)?;
        Ok(Reading::new(ambient, object))
    }
}

impl<B: RegisterBus> TemperatureSource for Mlx90614<B> {
    fn read_temperatures(&mut self) -> SkyGuardResult<Reading> {
        if !self.is_connected() {
            return Err(SkyGuardError::SensorUnavailable {
                reason: format!("MLX90614 at {:#04x} not reachable or implausible", self.address),
            });
        }

        let first = self.read_pair()?;
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        let second = self.read_pair()?;

        let reading = Reading::new(
            round_to((first.ambient + second.ambient) / 2.0, 2),
            round_to((first.object + second.object) / 2.0, 2),
        );
        validate_reading(&reading)?;
        Ok(reading)
    }

    fn reconnect(&mut self) -> SkyGuardResult<()> {
        self.bus.reopen().map_err(|err| self.unavailable(err))
    }
}

/// Reading supplied from outside, validated on every read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedReading(pub Reading);

impl FixedReading {
    /// Source returning `ambient`/`object`
    pub const fn new(ambient: f64, object: f64) -> Self {
        Self(Reading::new(ambient, object))
    }
}

impl TemperatureSource for FixedReading {
    fn read_temperatures(&mut self) -> SkyGuardResult<Reading> {
        validate_reading(&self.0)?;
        Ok(self.0)
    }
}
