//! Plausibility checks for raw readings
//!
//! The station runs unattended; a loose connector or a dying sensor produces
//! values that look like temperatures but are not. Every reading passes two
//! checks before it may reach the model:
//!
//! 1. **Finite**: NaN and infinities are rejected outright
//! 2. **Physical range**: the MLX90614 measures `-70..=380 °C` on the object
//!    channel; anything outside is a bus or conversion error
//!
//! A failed check aborts the cycle before any file is written.
//!
//! ```rust
//! use skyguard_core::validation::{check_range, Validatable};
//!
//! assert!(check_range(21.5, -70.0, 380.0).is_ok());
//! assert!(!f64::NAN.is_valid());
//! ```

use crate::constants::{PLAUSIBLE_MAX_C, PLAUSIBLE_MIN_C};
use crate::errors::{SkyGuardError, SkyGuardResult};
use crate::sensor::Reading;

/// Finite-number check
pub trait Validatable {
    /// Whether the value is usable at all
    fn is_valid(&self) -> bool;
}

impl Validatable for f64 {
    fn is_valid(&self) -> bool {
        self.is_finite()
    }
}

impl Validatable for Reading {
    fn is_valid(&self) -> bool {
        self.ambient.is_valid() && self.object.is_valid()
    }
}

/// Check that `value` lies within `[min, max]`
pub fn check_range(value: f64, min: f64, max: f64) -> SkyGuardResult<()> {
    if value < min || value > max {
        Err(SkyGuardError::ImplausibleReading { value, min, max })
    } else {
        Ok(())
    }
}

/// Reject non-finite or physically impossible readings
pub fn validate_reading(reading: &Reading) -> SkyGuardResult<()> {
    if !reading.is_valid() {
        return Err(SkyGuardError::InvalidValue);
    }
    check_range(reading.ambient, PLAUSIBLE_MIN_C, PLAUSIBLE_MAX_C)?;
    check_range(reading.object, PLAUSIBLE_MIN_C, PLAUSIBLE_MAX_C)
}

/// Round half away from zero to `digits` decimals
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = libm::pow(10.0, f64::from(digits));
    libm::round(value * scale) / scale
}
