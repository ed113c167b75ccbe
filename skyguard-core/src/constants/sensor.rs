//! MLX90614 sensor constants
//!
//! Register map and conversion constants for the Melexis MLX90614 infrared
//! thermometer as wired on the camera station (SMBus, bus 1).
//!
//! Source: MLX90614 datasheet, section 8.3 (RAM access)

// ===== BUS =====

/// Factory SMBus slave address of the MLX90614.
pub const MLX90614_DEFAULT_ADDRESS: u8 = 0x5A;

/// i2c-dev node of bus 1, the header pins 3/5 on a Raspberry Pi.
pub const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";

/// RAM register holding the die (ambient) temperature.
pub const REG_AMBIENT: u8 = 0x06;

/// RAM register holding the first object (sky) temperature channel.
pub const REG_OBJECT_1: u8 = 0x07;

// ===== RAW CONVERSION =====

/// Kelvin per raw LSB.
///
/// `T[K] = raw * 0.02`
pub const RAW_KELVIN_PER_LSB: f64 = 0.02;

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

// ===== PLAUSIBILITY =====

/// Lowest temperature the sensor can report (°C).
///
/// Object channel range of the MLX90614 is -70°C to +380°C. A value outside
/// this window usually means the two data bytes arrived swapped.
pub const PLAUSIBLE_MIN_C: f64 = -70.0;

/// Highest temperature the sensor can report (°C).
pub const PLAUSIBLE_MAX_C: f64 = 380.0;

/// Lowest ambient reading accepted by the connection check (°C).
///
/// Operating range of the sensor package.
pub const AMBIENT_CONNECTED_MIN_C: f64 = -40.0;

/// Highest ambient reading accepted by the connection check (°C).
pub const AMBIENT_CONNECTED_MAX_C: f64 = 125.0;

// ===== TIMING =====

/// Delay between the two averaged read pairs (milliseconds).
///
/// Long enough for one fresh conversion at the default IIR setting.
pub const SETTLE_DELAY_MS: u64 = 50;
