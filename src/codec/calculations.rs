//! Pure calculation functions shared by pipelines and codecs.
//!
//! No I/O and no images; everything here is unit testable.

use crate::params::PngParameters;
use std::num::NonZeroU8;

/// PNG inputs of at least this many bytes use
/// [`PngParameters::iterations_large`].
pub const LARGE_PNG_THRESHOLD: usize = 200_000;

/// Target dimensions for a resize by `factor`.
///
/// Each edge is rounded to the nearest pixel, so a 3x3 image at 0.5 gives
/// 2x2 and a 1x1 image at 0.4 gives 0x0 (which the resizer rejects).
///
/// ```
/// # use pinch::codec::calculations::scaled_dimensions;
/// assert_eq!(scaled_dimensions(100, 100, 0.5), (50, 50));
/// assert_eq!(scaled_dimensions(2000, 1500, 0.25), (500, 375));
/// ```
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |edge: u32| (edge as f64 * factor).round() as u32;
    (scale(width), scale(height))
}

/// Whether `factor` is an acceptable downscale multiplier: `(0, 1]`.
///
/// NaN is rejected.
pub fn is_valid_scale_factor(factor: f64) -> bool {
    factor > 0.0 && factor <= 1.0
}

/// Zopfli iteration count for an input of `input_len` bytes.
///
/// Zero counts are lifted to one; callers reject them before getting here.
pub fn select_iterations(input_len: usize, params: &PngParameters) -> NonZeroU8 {
    let count = if input_len < LARGE_PNG_THRESHOLD {
        params.iterations
    } else {
        params.iterations_large
    };
    NonZeroU8::new(count).unwrap_or(NonZeroU8::MIN)
}

/// Largest PNG downscale step tried by a size search; a step `s` is the
/// factor `s / PNG_SCALE_STEPS`.
pub const PNG_SCALE_STEPS: u32 = 256;

/// Highest `x` in `lo..=hi` for which `attempt` yields a value, assuming the
/// accepted values form a prefix of the range.
///
/// Each tried point costs one `attempt`, so a range of 100 is settled in at
/// most seven calls.
///
/// ```
/// # use pinch::codec::calculations::bisect_highest;
/// let found = bisect_highest(1, 100, |q| Ok::<_, ()>((q * 10 <= 425).then_some(q * 10)));
/// assert_eq!(found, Ok(Some((42, 420))));
/// ```
pub fn bisect_highest<T, E>(
    mut lo: u32,
    mut hi: u32,
    mut attempt: impl FnMut(u32) -> Result<Option<T>, E>,
) -> Result<Option<(u32, T)>, E> {
    let mut best = None;
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        match attempt(mid)? {
            Some(value) => {
                best = Some((mid, value));
                lo = mid + 1;
            }
            None if mid == 0 => break,
            None => hi = mid - 1,
        }
    }
    Ok(best)
}
