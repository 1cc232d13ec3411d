//! Easing curves matching the timing modes of scene actions

use serde::{Deserialize, Serialize};

/// Timing curve applied to an action's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInEaseOut,
}

impl Easing {
    /// Apply the curve to a progress value (clamped to 0-1)
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t * t,
            Easing::EaseOut => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            Easing::EaseInEaseOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let t = 2.0 * t - 2.0;
                    0.5 * t * t * t + 1.0
                }
            }
        }
    }
}
