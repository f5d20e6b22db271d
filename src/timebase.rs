//! Timebase arithmetic
//!
//! Timestamps are integer tick counts in a stream-specific rational unit.
//! Moving a packet between containers means converting its ticks from the
//! input stream's timebase to the output stream's one.

use ffmpeg_next as ffmpeg;
use serde::{Deserialize, Serialize};
use std::fmt;

/// "No timestamp" marker (FFmpeg's `AV_NOPTS_VALUE`).
pub const NOPTS_VALUE: i64 = i64::MIN;

/// Byte position value meaning "unknown".
pub const UNKNOWN_POSITION: i64 = -1;

/// A rational time unit: one tick lasts `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timebase {
    pub num: i32,
    pub den: i32,
}

impl Timebase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// A timebase with a zero or negative term cannot be used for rescaling.
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Seconds represented by `ticks` in this timebase.
    pub fn to_secs(&self, ticks: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ticks as f64 * self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<ffmpeg::Rational> for Timebase {
    fn from(r: ffmpeg::Rational) -> Self {
        Self::new(r.numerator(), r.denominator())
    }
}

impl From<Timebase> for ffmpeg::Rational {
    fn from(tb: Timebase) -> Self {
        ffmpeg::Rational::new(tb.num, tb.den)
    }
}

/// Rounding applied when a rescaled value falls between two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero.
    Zero,
    /// Away from zero.
    Inf,
    /// Toward negative infinity.
    Down,
    /// Toward positive infinity.
    Up,
    /// To nearest, halfway cases away from zero.
    NearInf,
}

impl Rounding {
    /// The mode that gives symmetric results when applied to `-a`.
    fn mirrored(self) -> Self {
        match self {
            Rounding::Down => Rounding::Up,
            Rounding::Up => Rounding::Down,
            other => other,
        }
    }
}

/// Rescale `value` from timebase `from` to timebase `to`.
///
/// With `pass_minmax`, `i64::MIN` and `i64::MAX` are returned unchanged so
/// "unknown timestamp" sentinels survive. Invalid timebases and results that
/// do not fit in an `i64` yield `i64::MIN`, matching `av_rescale_q_rnd`.
pub fn rescale_rnd(
    value: i64,
    from: Timebase,
    to: Timebase,
    rounding: Rounding,
    pass_minmax: bool,
) -> i64 {
    let b = from.num as i64 * to.den as i64;
    let c = to.num as i64 * from.den as i64;
    rescale_ratio(value, b, c, rounding, pass_minmax)
}

/// Rescale with `NearInf` rounding and no sentinel pass-through.
pub fn rescale(value: i64, from: Timebase, to: Timebase) -> i64 {
    rescale_rnd(value, from, to, Rounding::NearInf, false)
}

/// Timestamp rescaling: `NearInf` with sentinel pass-through.
pub fn rescale_ts(value: i64, from: Timebase, to: Timebase) -> i64 {
    rescale_rnd(value, from, to, Rounding::NearInf, true)
}

/// Compute `a * b / c` with the requested rounding.
fn rescale_ratio(a: i64, b: i64, c: i64, rounding: Rounding, pass_minmax: bool) -> i64 {
    if c <= 0 || b < 0 {
        return i64::MIN;
    }
    if pass_minmax && (a == i64::MIN || a == i64::MAX) {
        return a;
    }
    if a < 0 {
        let magnitude = -(a.max(-i64::MAX));
        return match rescale_ratio(magnitude, b, c, rounding.mirrored(), false) {
            i64::MIN => i64::MIN,
            r => -r,
        };
    }

    let (a, b, c) = (a as i128, b as i128, c as i128);
    let r = match rounding {
        Rounding::NearInf => c / 2,
        Rounding::Inf | Rounding::Up => c - 1,
        Rounding::Zero | Rounding::Down => 0,
    };
    let result = (a * b + r) / c;
    if result > i64::MAX as i128 {
        return i64::MIN;
    }
    result as i64
}
