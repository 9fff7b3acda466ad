use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy;

/// How far apart two files are, on a strictly ordered scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    Identical,
    Negligible,
    Slight,
    Moderate,
    High,
    Extreme,
}

impl Similarity {
    /// All categories in scale order.
    pub const ALL: [Similarity; 6] = [
        Similarity::Identical,
        Similarity::Negligible,
        Similarity::Slight,
        Similarity::Moderate,
        Similarity::High,
        Similarity::Extreme,
    ];

    /// Position on the scale, 0 for `Identical`.
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Similarity::Identical => "identical",
            Similarity::Negligible => "negligible",
            Similarity::Slight => "slight",
            Similarity::Moderate => "moderate",
            Similarity::High => "high",
            Similarity::Extreme => "extreme",
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a pair of deltas by `max(|delta_a|, |delta_b|)`.
///
/// Each band is half-open: `lower <= d < upper`. A NaN distance falls
/// through every comparison and lands in `Extreme`.
pub fn classify(delta_a: f64, delta_b: f64) -> Similarity {
    distance_category(max_abs(delta_a, delta_b))
}

/// `max(|a|, |b|)`, NaN if either side is NaN. `f64::max` would drop the NaN.
pub fn max_abs(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.abs().max(b.abs())
    }
}

/// Category of an already-computed absolute distance.
pub fn distance_category(d: f64) -> Similarity {
    policy::BANDS
        .iter()
        .position(|&upper| d < upper)
        .map(|i| Similarity::ALL[i])
        .unwrap_or(Similarity::Extreme)
}
