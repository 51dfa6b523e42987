//! Orientation record reported by the IMU.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// One orientation sample: vector part (`i`, `j`, `k`) and scalar part
/// (`real`).
///
/// Values pass through unmodified. No normalization is applied, so a
/// record need not be a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub i: f64,
    pub j: f64,
    pub k: f64,
    pub real: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        i: 0.0,
        j: 0.0,
        k: 0.0,
        real: 1.0,
    };

    pub fn new(i: f64, j: f64, k: f64, real: f64) -> Self {
        Self { i, j, k, real }
    }

    /// True when every field is a finite number, i.e. representable in JSON.
    pub fn is_finite(&self) -> bool {
        [self.i, self.j, self.k, self.real]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Field positions of a record on the wire, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Component {
    I,
    J,
    K,
    Real,
}
