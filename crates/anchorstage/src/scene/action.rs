//! Timed node actions: waits, fades, moves, scales and self-removal

use std::collections::VecDeque;
use std::time::Duration;

use anchorstage_spatial::{Easing, Point3D, Tween, Vector3D};

use super::Node;

/// A declarative action run against a single node
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Wait(Duration),
    FadeOpacity {
        to: f32,
        duration: Duration,
    },
    MoveBy {
        delta: Vector3D,
        duration: Duration,
    },
    ScaleTo {
        scale: f32,
        duration: Duration,
        easing: Easing,
    },
    RemoveFromParent,
    Sequence(Vec<Action>),
}

impl Action {
    pub fn wait(secs: f32) -> Self {
        Action::Wait(Duration::from_secs_f32(secs))
    }

    pub fn fade_opacity(to: f32, secs: f32) -> Self {
        Action::FadeOpacity {
            to,
            duration: Duration::from_secs_f32(secs),
        }
    }

    pub fn fade_out(secs: f32) -> Self {
        Self::fade_opacity(0.0, secs)
    }

    pub fn move_by(x: f32, y: f32, z: f32, secs: f32) -> Self {
        Action::MoveBy {
            delta: Vector3D::new(x, y, z),
            duration: Duration::from_secs_f32(secs),
        }
    }

    pub fn scale_to(scale: f32, secs: f32, easing: Easing) -> Self {
        Action::ScaleTo {
            scale,
            duration: Duration::from_secs_f32(secs),
            easing,
        }
    }

    pub fn sequence(actions: impl IntoIterator<Item = Action>) -> Self {
        Action::Sequence(actions.into_iter().collect())
    }

    /// Total running time, ignoring instantaneous steps
    pub fn duration(&self) -> Duration {
        match self {
            Action::Wait(d) => *d,
            Action::FadeOpacity { duration, .. }
            | Action::MoveBy { duration, .. }
            | Action::ScaleTo { duration, .. } => *duration,
            Action::RemoveFromParent => Duration::ZERO,
            Action::Sequence(steps) => steps.iter().map(Action::duration).sum(),
        }
    }

    fn flatten_into(self, out: &mut VecDeque<Action>) {
        match self {
            Action::Sequence(steps) => steps.into_iter().for_each(|s| s.flatten_into(out)),
            step => out.push_back(step),
        }
    }
}

/// What the scene should do with the node after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Running,
    Finished,
    RemoveNode,
}

#[derive(Debug, Clone)]
enum ActiveStep {
    Wait(Tween),
    Fade(Tween),
    Move {
        from: Point3D,
        delta: Vector3D,
        tween: Tween,
    },
    Scale(Tween),
}

/// An action in progress on a node
#[derive(Debug, Clone)]
pub struct RunningAction {
    pending: VecDeque<Action>,
    active: Option<ActiveStep>,
}

impl RunningAction {
    pub fn new(action: Action) -> Self {
        let mut pending = VecDeque::new();
        action.flatten_into(&mut pending);
        Self {
            pending,
            active: None,
        }
    }

    /// Advance by `dt`, applying the effect to `node`. Time left over by a
    /// finished step rolls into the next one.
    pub(crate) fn advance(&mut self, node: &mut Node, dt: Duration) -> ActionOutcome {
        let mut dt = dt;

        loop {
            if self.active.is_none() {
                let Some(next) = self.pending.pop_front() else {
                    return ActionOutcome::Finished;
                };
                match next {
                    Action::RemoveFromParent => return ActionOutcome::RemoveNode,
                    step => self.active = Some(Self::start(step, node)),
                }
            }

            let Some(active) = self.active.as_mut() else {
                return ActionOutcome::Finished;
            };
            let (leftover, done) = match active {
                ActiveStep::Wait(tween) => {
                    let left = tween.advance(dt);
                    (left, tween.is_complete())
                }
                ActiveStep::Fade(tween) => {
                    let left = tween.advance(dt);
                    node.opacity = tween.value().clamp(0.0, 1.0);
                    (left, tween.is_complete())
                }
                ActiveStep::Move { from, delta, tween } => {
                    let left = tween.advance(dt);
                    node.transform.position = *from + *delta * tween.value();
                    (left, tween.is_complete())
                }
                ActiveStep::Scale(tween) => {
                    let left = tween.advance(dt);
                    node.transform.scale = Vector3D::splat(tween.value());
                    (left, tween.is_complete())
                }
            };

            if !done {
                return ActionOutcome::Running;
            }
            self.active = None;
            dt = leftover;
        }
    }

    fn start(step: Action, node: &Node) -> ActiveStep {
        match step {
            Action::Wait(d) => ActiveStep::Wait(Tween::new(0.0, 1.0, d)),
            Action::FadeOpacity { to, duration } => {
                ActiveStep::Fade(Tween::new(node.opacity, to, duration))
            }
            Action::MoveBy { delta, duration } => ActiveStep::Move {
                from: node.transform.position,
                delta,
                tween: Tween::new(0.0, 1.0, duration),
            },
            Action::ScaleTo {
                scale,
                duration,
                easing,
            } => ActiveStep::Scale(
                Tween::new(node.transform.scale.x, scale, duration).with_easing(easing),
            ),
            // Flattened and handled by the caller
            Action::RemoveFromParent | Action::Sequence(_) => {
                ActiveStep::Wait(Tween::new(0.0, 1.0, Duration::ZERO))
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }
}
