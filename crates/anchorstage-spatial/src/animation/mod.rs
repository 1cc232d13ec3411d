//! Timing curves and tweens for node actions

mod easing;
mod tween;

pub use easing::Easing;
pub use tween::Tween;
