//! Volume stepping shared by every surface that interprets [`Script::AdjustVolume`]
//!
//! [`Script::AdjustVolume`]: crate::surface::Script::AdjustVolume

use crate::mapping::action::VolumeSign;

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Next volume for one step in `sign` direction
///
/// A non-finite reading counts as full volume, as an element that never
/// reported a volume plays at 1.0.
pub fn next_volume(current: f64, sign: VolumeSign, step: f64) -> f64 {
    let current = if current.is_finite() { current } else { 1.0 };
    clamp01(current + sign.delta() as f64 * step)
}
