//! Ordinal cloud-cover classifier
//!
//! Three ascending thresholds split the virtual sky temperature axis into four
//! classes. A colder sky means fewer clouds:
//!
//! ```text
//!   clear  | light clouds | heavy clouds | overcast
//! ---------+--------------+--------------+--------->  Tsky
//!      thr_clear      thr_light      thr_heavy
//! ```
//!
//! Each threshold is inclusive on its upper side, so `Tsky == thr_clear` is
//! still clear.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::errors::{SkyGuardError, SkyGuardResult};

/// Ordinal cloud-cover class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CloudClass {
    /// Cloudless sky
    Clear = 0,
    /// Scattered or thin clouds
    LightClouds = 1,
    /// Mostly cloudy
    HeavyClouds = 2,
    /// Fully covered
    Overcast = 3,
}

impl CloudClass {
    /// All classes in ascending order
    pub const ALL: [CloudClass; 4] = [
        CloudClass::Clear,
        CloudClass::LightClouds,
        CloudClass::HeavyClouds,
        CloudClass::Overcast,
    ];

    /// Numeric index 0..=3
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Class for a numeric index
    pub fn from_index(index: i64) -> SkyGuardResult<Self> {
        match index {
            0 => Ok(Self::Clear),
            1 => Ok(Self::LightClouds),
            2 => Ok(Self::HeavyClouds),
            3 => Ok(Self::Overcast),
            other => Err(SkyGuardError::InvalidClass(other)),
        }
    }

    /// Human-readable name shown to the operator
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::LightClouds => "light clouds",
            Self::HeavyClouds => "heavy clouds",
            Self::Overcast => "overcast",
        }
    }

    /// Absolute distance between two classes on the ordinal scale
    pub fn distance(self, other: Self) -> u8 {
        self.index().abs_diff(other.index())
    }
}

impl fmt::Display for CloudClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.name())
    }
}

impl From<CloudClass> for u8 {
    fn from(class: CloudClass) -> u8 {
        class.index()
    }
}

impl TryFrom<u8> for CloudClass {
    type Error = SkyGuardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(i64::from(value))
    }
}

/// Decision thresholds over the virtual sky temperature
///
/// Serialized as `thr_clear`, `thr_light` and `thr_heavy`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Upper bound of the clear class
    #[serde(rename = "thr_clear")]
    pub clear: f64,
    /// Upper bound of the light-clouds class
    #[serde(rename = "thr_light")]
    pub light: f64,
    /// Upper bound of the heavy-clouds class
    #[serde(rename = "thr_heavy")]
    pub heavy: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            clear: defaults::THR_CLEAR,
            light: defaults::THR_LIGHT,
            heavy: defaults::THR_HEAVY,
        }
    }
}

impl Thresholds {
    /// Create thresholds, restoring ascending order
    pub fn new(clear: f64, light: f64, heavy: f64) -> Self {
        let mut thresholds = Self { clear, light, heavy };
        thresholds.normalize();
        thresholds
    }

    /// Thresholds as `[clear, light, heavy]`
    pub const fn to_array(&self) -> [f64; 3] {
        [self.clear, self.light, self.heavy]
    }

    /// Re-sort ascending so that `clear <= light <= heavy`
    ///
    /// The values move between names when they were out of order.
    pub fn normalize(&mut self) {
        let mut values = self.to_array();
        values.sort_by(f64::total_cmp);
        self.clear = values[0];
        self.light = values[1];
        self.heavy = values[2];
    }

    /// Whether the ordering invariant holds
    pub fn is_ordered(&self) -> bool {
        self.clear <= self.light && self.light <= self.heavy
    }

    /// Classify a virtual sky temperature
    pub fn classify(&self, sky_temperature: f64) -> CloudClass {
        if sky_temperature <= self.clear {
            CloudClass::Clear
        } else if sky_temperature <= self.light {
            CloudClass::LightClouds
        } else if sky_temperature <= self.heavy {
            CloudClass::HeavyClouds
        } else {
            CloudClass::Overcast
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_classify() {
        let thr = Thresholds::default();
        assert_eq!(thr.classify(-25.0), CloudClass::Clear);
        assert_eq!(thr.classify(-24.99), CloudClass::LightClouds);
        assert_eq!(thr.classify(-18.0), CloudClass::LightClouds);
        assert_eq!(thr.classify(-12.0), CloudClass::HeavyClouds);
        assert_eq!(thr.classify(5.0), CloudClass::Overcast);
    }

    #[test]
    fn normalize_sorts_and_reassigns() {
        let mut thr = Thresholds { clear: -10.0, light: -30.0, heavy: -20.0 };
        assert!(!thr.is_ordered());
        thr.normalize();
        assert_eq!(thr.to_array(), [-30.0, -20.0, -10.0]);
        assert!(thr.is_ordered());
    }

    #[test]
    fn class_index_round_trip() {
        for class in CloudClass::ALL {
            assert_eq!(CloudClass::from_index(i64::from(class.index())).unwrap(), class);
        }
        assert!(matches!(CloudClass::from_index(4), Err(SkyGuardError::InvalidClass(4))));
        assert!(CloudClass::from_index(-1).is_err());
    }

    #[test]
    fn class_distance() {
        assert_eq!(CloudClass::Clear.distance(CloudClass::Overcast), 3);
        assert_eq!(CloudClass::HeavyClouds.distance(CloudClass::LightClouds), 1);
        assert_eq!(CloudClass::Clear.distance(CloudClass::Clear), 0);
    }

    #[test]
    fn class_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&CloudClass::HeavyClouds).unwrap(), "2");
        let parsed: CloudClass = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, CloudClass::Overcast);
        assert!(serde_json::from_str::<CloudClass>("7").is_err());
    }

    #[test]
    fn display_shows_index_and_name() {
        assert_eq!(CloudClass::LightClouds.to_string(), "1 (light clouds)");
    }
}
