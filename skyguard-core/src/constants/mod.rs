//! Constants for SkyGuard Core
//!
//! Centralized, documented constants used throughout the calibration engine.
//!
//! ## Organization
//!
//! - **Sensor**: MLX90614 register map, raw conversion and plausibility limits
//! - **Defaults**: factory values of the coefficient document
//! - **Learning**: fixed parameters of the learning phases that are not
//!   exposed in the coefficient document
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Include units in the name where a unit applies
//! 3. Tunable values belong in the coefficient document, with their factory
//!    value here

/// MLX90614 register map and physical limits.
pub mod sensor;

/// Factory defaults of the coefficient document.
pub mod defaults;

/// Fixed learning parameters (finite-difference steps, accuracy windows).
pub mod learning;

pub use sensor::{
    DEFAULT_I2C_BUS, MLX90614_DEFAULT_ADDRESS, REG_AMBIENT, REG_OBJECT_1,
    AMBIENT_CONNECTED_MIN_C, AMBIENT_CONNECTED_MAX_C,
    PLAUSIBLE_MIN_C, PLAUSIBLE_MAX_C,
};

pub use learning::{
    PRIMARY_EPSILONS, SECONDARY_EPSILONS,
    SHORT_ACCURACY_WINDOW, LONG_ACCURACY_WINDOW,
};
