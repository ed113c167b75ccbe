//! Virtual sky temperature model
//!
//! The IR thermometer does not see the sky alone: the window, the housing and
//! the air column between sensor and cloud base all add an offset that grows
//! with ambient temperature. The model removes that offset from the raw object
//! temperature with seven coefficients, following the AAG CloudWatcher
//! correction:
//!
//! ```text
//! T0    = K2 / 10
//! d     = |T0 - Ta|
//! T67   = 0                                          if K6 == 0
//!       = sgn(K6) * sgn(Ta - T0) * d                 if d < 1
//!       = K6/10 * sgn(Ta - T0) * (log10(d) + K7/100) otherwise
//! Td    = K1/100 * (Ta - T0) + K3/100 * (exp(K4/1000 * Ta))^(K5/100) + T67
//! Tsky  = Ts - Td
//! ```
//!
//! The `T67` term jumps at `d = 1` when switching from the linear to the
//! logarithmic branch. The jump is kept exactly as is.
//!
//! ## Special cases
//!
//! - `K1 = 100`, `K2..K7 = 0` gives `Tsky = Ts - Ta`
//! - all coefficients zero gives `Tsky = Ts`

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Number of model coefficients
pub const COEFFICIENT_COUNT: usize = 7;

/// The seven model coefficients K1..K7
///
/// Serialized with the upper-case key names used by the coefficient document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCoefficients {
    /// Ambient scale factor in percent
    #[serde(rename = "K1")]
    pub k1: f64,
    /// Reference temperature, tenths of a degree
    #[serde(rename = "K2")]
    pub k2: f64,
    /// Amplitude of the exponential term, percent
    #[serde(rename = "K3")]
    pub k3: f64,
    /// Exponential rate, per mille per degree
    #[serde(rename = "K4")]
    pub k4: f64,
    /// Exponent applied to the exponential term, percent
    #[serde(rename = "K5")]
    pub k5: f64,
    /// Cross-term amplitude, tenths
    #[serde(rename = "K6")]
    pub k6: f64,
    /// Cross-term log offset, percent
    #[serde(rename = "K7")]
    pub k7: f64,
}

impl Default for ModelCoefficients {
    fn default() -> Self {
        Self::from_array(defaults::MODEL_COEFFICIENTS)
    }
}

impl ModelCoefficients {
    /// Build from `[K1, .., K7]`
    pub const fn from_array(k: [f64; COEFFICIENT_COUNT]) -> Self {
        Self {
            k1: k[0],
            k2: k[1],
            k3: k[2],
            k4: k[3],
            k5: k[4],
            k6: k[5],
            k7: k[6],
        }
    }

    /// Coefficients as `[K1, .., K7]`
    pub const fn to_array(&self) -> [f64; COEFFICIENT_COUNT] {
        [self.k1, self.k2, self.k3, self.k4, self.k5, self.k6, self.k7]
    }

    /// Identity correction: `Tsky = Ts - Ta`
    pub const fn ambient_difference() -> Self {
        Self::from_array([100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    /// No correction at all: `Tsky = Ts`
    pub const fn raw_object() -> Self {
        Self::from_array([0.0; COEFFICIENT_COUNT])
    }

    /// Compute the virtual sky temperature for one reading
    pub fn sky_temperature(&self, ambient: f64, object: f64) -> f64 {
        object - self.offset(ambient)
    }

    /// Modelled offset `Td` between raw object and virtual sky temperature
    pub fn offset(&self, ambient: f64) -> f64 {
        let t0 = self.k2 / 10.0;
        let d = libm::fabs(t0 - ambient);

        let t67 = if self.k6 == 0.0 {
            0.0
        } else if d < 1.0 {
            sign(self.k6) * sign(ambient - t0) * d
        } else {
            (self.k6 / 10.0) * sign(ambient - t0) * (libm::log10(d) + self.k7 / 100.0)
        };

        let term1 = (self.k1 / 100.0) * (ambient - t0);
        let term2 = (self.k3 / 100.0)
            * libm::pow(libm::exp((self.k4 / 1000.0) * ambient), self.k5 / 100.0);

        term1 + term2 + t67
    }
}

/// Three-valued sign: -1, 0 or +1
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_difference_special_case() {
        let k = ModelCoefficients::ambient_difference();
        assert_eq!(k.sky_temperature(10.0, -15.0), -25.0);
        assert_eq!(k.sky_temperature(-3.5, -20.25), -16.75);
    }

    #[test]
    fn zero_coefficients_return_object_temperature() {
        let k = ModelCoefficients::raw_object();
        assert_eq!(k.sky_temperature(5.0, 5.0), 5.0);
        assert_eq!(k.sky_temperature(30.0, -12.5), -12.5);
    }

    #[test]
    fn default_matches_ambient_difference() {
        assert_eq!(ModelCoefficients::default(), ModelCoefficients::ambient_difference());
    }

    #[test]
    fn sign_is_three_valued() {
        assert_eq!(sign(3.2), 1.0);
        assert_eq!(sign(-0.001), -1.0);
        assert_eq!(sign(0.0), 0.0);
    }

    #[test]
    fn exponential_term() {
        // K3 = 100, K4 = 1000, K5 = 100 -> term2 = exp(Ta)
        let k = ModelCoefficients::from_array([0.0, 0.0, 100.0, 1000.0, 100.0, 0.0, 0.0]);
        let expected = 2.0 - 1.0f64.exp();
        assert!((k.sky_temperature(1.0, 2.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn cross_term_linear_branch() {
        // K2 = 0 -> T0 = 0; Ta = 0.5 -> d = 0.5 < 1
        let k = ModelCoefficients::from_array([0.0, 0.0, 0.0, 0.0, 0.0, -30.0, 0.0]);
        // T67 = sgn(-30) * sgn(0.5) * 0.5 = -0.5
        assert!((k.offset(0.5) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn cross_term_log_branch() {
        // Ta = 10, T0 = 0 -> d = 10, log10(d) = 1
        let k = ModelCoefficients::from_array([0.0, 0.0, 0.0, 0.0, 0.0, 20.0, 50.0]);
        // T67 = 2 * 1 * (1 + 0.5) = 3
        assert!((k.offset(10.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn cross_term_jumps_at_unit_distance() {
        let k = ModelCoefficients::from_array([0.0, 0.0, 0.0, 0.0, 0.0, 10.0, 0.0]);
        let below = k.offset(0.999_999);
        let at = k.offset(1.0);
        // linear branch approaches 1, log branch starts at 0
        assert!((below - 1.0).abs() < 1e-5);
        assert_eq!(at, 0.0);
    }

    #[test]
    fn model_is_deterministic() {
        let k = ModelCoefficients::from_array([93.0, 12.0, 4.0, 110.0, 90.0, -7.0, 33.0]);
        let a = k.sky_temperature(7.25, -11.5);
        let b = ModelCoefficients::from_array(k.to_array()).sky_temperature(7.25, -11.5);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn serde_uses_upper_case_keys() {
        let json = serde_json::to_value(ModelCoefficients::default()).unwrap();
        assert_eq!(json["K1"], 100.0);
        assert_eq!(json["K7"], 0.0);
    }
}
