//! Fixed decision thresholds shared by the classifier and the report builder.
//!
//! None of these are configurable. Tests assert on this table directly.

/// Upper bounds (exclusive, dB) of the similarity bands, in scale order.
/// Anything at or above the last bound is `Extreme`.
pub const IDENTICAL_BELOW: f64 = 0.10;
pub const NEGLIGIBLE_BELOW: f64 = 0.50;
pub const SLIGHT_BELOW: f64 = 1.50;
pub const MODERATE_BELOW: f64 = 3.00;
pub const HIGH_BELOW: f64 = 6.00;

/// Band table used by the classifier, scanned top to bottom.
pub const BANDS: [f64; 5] = [
    IDENTICAL_BELOW,
    NEGLIGIBLE_BELOW,
    SLIGHT_BELOW,
    MODERATE_BELOW,
    HIGH_BELOW,
];

/// Largest worst-pair delta (dB, inclusive) still compatible with "same level".
pub const GLOBAL_MAX_DELTA: f64 = 1.5;

/// Minimum share of pairs at or below `Slight` (inclusive) for "same level".
pub const GLOBAL_MIN_RATIO: f64 = 0.80;

/// Standard deviations at or below this are treated as zero for z-scores.
pub const STD_FLOOR: f64 = 1e-9;
