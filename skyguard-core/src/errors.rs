//! Error Types for Calibration Cycles
//!
//! ## Design Philosophy
//!
//! A calibration cycle is an independent unit of work. Every failure aborts the
//! cycle and is reported to the operator; nothing is retried. The error enum
//! therefore only needs to answer one question: *did the cycle touch any file
//! before it failed?*
//!
//! ### Before persistence (no state touched)
//! - `SensorUnavailable`: bus error or sensor not answering
//! - `ImplausibleReading`: reading outside the physical range of the sensor
//! - `InvalidValue`: NaN or infinite reading
//!
//! ### Configuration
//! - `UnsupportedSchema`: coefficient document written by a newer release
//! - `MalformedDocument`: coefficient file is not a JSON object
//! - `InvalidClass`, `InvalidLabel`: class index outside `0..=3`
//!
//! ### Persistence (cycle is fatal, stores may be mutually inconsistent)
//! - `Io`, `Json`
//!
//! ```rust
//! use skyguard_core::{SkyGuardError, validation::check_range};
//!
//! match check_range(412.0, -70.0, 380.0) {
//!     Err(SkyGuardError::ImplausibleReading { value, .. }) => assert_eq!(value, 412.0),
//!     _ => unreachable!(),
//! }
//! ```

use thiserror::Error;

/// Result type for calibration operations
pub type SkyGuardResult<T> = Result<T, SkyGuardError>;

/// Errors raised while reading, learning or persisting
#[derive(Error, Debug)]
pub enum SkyGuardError {
    /// Sensor did not answer on the bus
    #[error("Sensor unavailable: {reason}")]
    SensorUnavailable {
        /// What went wrong, e.g. the underlying bus error
        reason: String,
    },

    /// Reading outside the physical limits of the sensor
    #[error("Implausible reading {value} outside [{min}, {max}]")]
    ImplausibleReading {
        /// The converted reading in degrees Celsius
        value: f64,
        /// Lowest plausible value
        min: f64,
        /// Highest plausible value
        max: f64,
    },

    /// Value makes no physical sense (NaN, infinity)
    #[error("Invalid value: not a finite number")]
    InvalidValue,

    /// Cloud class index outside 0..=3
    #[error("Invalid cloud class {0}, expected 0-3")]
    InvalidClass(i64),

    /// Operator answer that is not a class index
    #[error("Invalid label {0:?}, expected 0-3")]
    InvalidLabel(String),

    /// Coefficient document written by a newer schema
    #[error("Unsupported coefficient schema version {found} (supported up to {supported})")]
    UnsupportedSchema {
        /// Version stored in the document
        found: u64,
        /// Newest version this build understands
        supported: u32,
    },

    /// Coefficient document has an unusable shape
    #[error("Malformed coefficient document: {0}")]
    MalformedDocument(&'static str),

    /// Filesystem failure while loading or persisting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SkyGuardError {
    /// True when the error happened before any store was written
    pub fn is_pre_persistence(&self) -> bool {
        matches!(
            self,
            Self::SensorUnavailable { .. } | Self::ImplausibleReading { .. } | Self::InvalidValue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_errors_are_pre_persistence() {
        let err = SkyGuardError::SensorUnavailable { reason: "nack".into() };
        assert!(err.is_pre_persistence());
        assert!(SkyGuardError::InvalidValue.is_pre_persistence());

        let io = SkyGuardError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(!io.is_pre_persistence());
    }

    #[test]
    fn messages_carry_context() {
        let err = SkyGuardError::ImplausibleReading { value: 400.0, min: -70.0, max: 380.0 };
        assert_eq!(err.to_string(), "Implausible reading 400 outside [-70, 380]");
    }
}
