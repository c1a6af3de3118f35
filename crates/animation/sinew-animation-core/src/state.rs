//! Finite states of the animation machine.
//!
//! A layer's machine is an arena of `StateNode`s: steady states (stable,
//! self-contained, playing one blend tree) and transition states (movement
//! between steady states, gated by a cyclic time window). The layer in
//! `layer.rs` owns the arena and drives the contracts defined here.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use sinew_api_core::SourceDataMap;

use crate::blendtree::BlendTreeSource;
use crate::ids::StateId;

/// Anything that can hold a finite state and atomically swap it for
/// another: the layer itself, or a blending transition that owns the state
/// as one of its two endpoints.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StateOwner {
    Layer,
    Transition(StateId),
}

/// Curve used to remap a transition's raw progress into a blend weight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendType {
    /// Straight linear blend.
    #[default]
    Linear,
    /// Cubic smoothstep: `3p^2 - 2p^3`.
    SCurve3,
    /// Quintic smoothstep: `6p^5 - 15p^4 + 10p^3`.
    SCurve5,
}

impl BlendType {
    /// Remap a raw progress percentage in [0,1] through this curve.
    pub fn apply(self, percent: f64) -> f64 {
        match self {
            BlendType::Linear => percent,
            BlendType::SCurve3 => (3.0 - 2.0 * percent) * percent * percent,
            BlendType::SCurve5 => {
                let p3 = percent * percent * percent;
                ((6.0 * percent - 15.0) * percent + 10.0) * p3
            }
        }
    }
}

/// The local-time window in which a transition may fire. Values <= 0
/// leave that end unbounded. When both ends are set and start > end, the
/// window wraps around the clip cycle, forming two disjoint intervals;
/// this is a deliberate cyclic-window policy.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionWindow {
    pub start: f64,
    pub end: f64,
}

impl Default for TransitionWindow {
    fn default() -> Self {
        Self {
            start: -1.0,
            end: -1.0,
        }
    }
}

impl TransitionWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether the given local time falls inside this window.
    pub fn contains(&self, local_time: f64) -> bool {
        if self.start <= 0.0 && self.end <= 0.0 {
            true
        } else if self.start <= 0.0 {
            local_time <= self.end
        } else if self.end <= 0.0 {
            local_time >= self.start
        } else if self.start <= self.end {
            self.start <= local_time && local_time <= self.end
        } else {
            // Wraparound: eligible before the end or after the start.
            local_time >= self.start || local_time <= self.end
        }
    }
}

/// Blend bookkeeping shared by the fading transition policies.
pub(crate) struct TwoStateLerp {
    pub(crate) state_a: Option<StateId>,
    pub(crate) state_b: Option<StateId>,
    pub(crate) fade_time: f64,
    pub(crate) start: f64,
    pub(crate) percent: f64,
    pub(crate) blend_type: BlendType,
    /// Blended samples, reused across ticks. Cleared whenever state A or B
    /// changes identity.
    pub(crate) source_data: SourceDataMap,
}

impl TwoStateLerp {
    fn new(fade_time: f64, blend_type: BlendType) -> Self {
        Self {
            state_a: None,
            state_b: None,
            fade_time,
            start: 0.0,
            percent: 0.0,
            blend_type,
            source_data: HashMap::new(),
        }
    }
}

/// How a transition initializes and drives its endpoints.
pub(crate) enum TransitionPolicy {
    /// Crossfade; both endpoints keep animating.
    Fade(TwoStateLerp),
    /// Crossfade, but endpoint A is frozen at the pose it had when the
    /// transition began.
    Frozen(TwoStateLerp),
    /// Crossfade with endpoint B rewound to A's start time, keeping the
    /// two clips phase-synchronized.
    SyncFade(TwoStateLerp),
    /// No blending: jump straight to the target state.
    Immediate,
    /// Swallow the request and stay on the calling state.
    Ignore,
}

/// Copyable discriminant of `TransitionPolicy`, used where the layer needs
/// to branch without borrowing the node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum PolicyKind {
    Fade,
    Frozen,
    SyncFade,
    Immediate,
    Ignore,
}

impl TransitionPolicy {
    pub(crate) fn kind(&self) -> PolicyKind {
        match self {
            TransitionPolicy::Fade(_) => PolicyKind::Fade,
            TransitionPolicy::Frozen(_) => PolicyKind::Frozen,
            TransitionPolicy::SyncFade(_) => PolicyKind::SyncFade,
            TransitionPolicy::Immediate => PolicyKind::Immediate,
            TransitionPolicy::Ignore => PolicyKind::Ignore,
        }
    }

    pub(crate) fn lerp(&self) -> Option<&TwoStateLerp> {
        match self {
            TransitionPolicy::Fade(l)
            | TransitionPolicy::Frozen(l)
            | TransitionPolicy::SyncFade(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn lerp_mut(&mut self) -> Option<&mut TwoStateLerp> {
        match self {
            TransitionPolicy::Fade(l)
            | TransitionPolicy::Frozen(l)
            | TransitionPolicy::SyncFade(l) => Some(l),
            _ => None,
        }
    }
}

/// A state representing movement between steady states.
pub struct TransitionState {
    pub(crate) target: Option<String>,
    pub(crate) window: TransitionWindow,
    pub(crate) policy: TransitionPolicy,
}

impl TransitionState {
    /// Crossfade to `target` over `fade_time`, both states animating.
    pub fn fade(target: impl Into<String>, fade_time: f64, blend_type: BlendType) -> Self {
        Self {
            target: Some(target.into()),
            window: TransitionWindow::default(),
            policy: TransitionPolicy::Fade(TwoStateLerp::new(fade_time, blend_type)),
        }
    }

    /// Crossfade to `target`, freezing the outgoing state's pose.
    pub fn frozen(target: impl Into<String>, fade_time: f64, blend_type: BlendType) -> Self {
        Self {
            target: Some(target.into()),
            window: TransitionWindow::default(),
            policy: TransitionPolicy::Frozen(TwoStateLerp::new(fade_time, blend_type)),
        }
    }

    /// Crossfade to `target`, phase-synchronizing it with the outgoing
    /// state.
    pub fn sync_fade(target: impl Into<String>, fade_time: f64, blend_type: BlendType) -> Self {
        Self {
            target: Some(target.into()),
            window: TransitionWindow::default(),
            policy: TransitionPolicy::SyncFade(TwoStateLerp::new(fade_time, blend_type)),
        }
    }

    /// Jump to `target` with no blending.
    pub fn immediate(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            window: TransitionWindow::default(),
            policy: TransitionPolicy::Immediate,
        }
    }

    /// A no-op transition: always leaves the calling state in place. Has
    /// no target, so nothing is ever looked up.
    pub fn ignore() -> Self {
        Self {
            target: None,
            window: TransitionWindow::default(),
            policy: TransitionPolicy::Ignore,
        }
    }

    /// Restrict when this transition may fire, in the current state's
    /// local time. Values <= 0 leave that end unbounded.
    pub fn with_window(mut self, start: f64, end: f64) -> Self {
        self.window = TransitionWindow::new(start, end);
        self
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn window(&self) -> TransitionWindow {
        self.window
    }

    /// Current blend weight, if this transition blends at all.
    pub fn percent(&self) -> Option<f64> {
        self.policy.lerp().map(|l| l.percent)
    }

    /// The two blended endpoints, if this transition blends at all.
    pub fn endpoints(&self) -> Option<(Option<StateId>, Option<StateId>)> {
        self.policy.lerp().map(|l| (l.state_a, l.state_b))
    }

    /// The blended-sample cache, if this transition blends at all. Cleared
    /// whenever an endpoint changes; repopulated by the next source-data
    /// refresh.
    pub fn cached_source_data(&self) -> Option<&SourceDataMap> {
        self.policy.lerp().map(|l| &l.source_data)
    }
}

/// A concrete, stand-alone animation state wrapping one blend tree.
pub struct SteadyState {
    pub(crate) name: String,
    pub(crate) transitions: HashMap<String, StateId>,
    pub(crate) end_transition: Option<StateId>,
    pub(crate) source_tree: Box<dyn BlendTreeSource>,
}

impl SteadyState {
    pub fn new(name: impl Into<String>, source_tree: Box<dyn BlendTreeSource>) -> Self {
        Self {
            name: name.into(),
            transitions: HashMap::new(),
            end_transition: None,
            source_tree,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn end_transition(&self) -> Option<StateId> {
        self.end_transition
    }

    /// The transition state keywords registered on this steady state.
    pub fn transition_keywords(&self) -> impl Iterator<Item = &str> {
        self.transitions.keys().map(String::as_str)
    }

    pub fn source_tree(&self) -> &dyn BlendTreeSource {
        self.source_tree.as_ref()
    }

    pub fn source_tree_mut(&mut self) -> &mut dyn BlendTreeSource {
        self.source_tree.as_mut()
    }
}

/// A node in the state arena.
pub(crate) struct StateNode {
    /// Time origin for this state's local clock.
    pub(crate) global_start_time: f64,
    /// Whoever currently holds this state; used only to request a swap,
    /// never to imply ownership.
    pub(crate) owner: Option<StateOwner>,
    pub(crate) kind: StateKind,
}

pub(crate) enum StateKind {
    Steady(SteadyState),
    Transition(TransitionState),
}

impl StateNode {
    pub(crate) fn steady(state: SteadyState) -> Self {
        Self {
            global_start_time: 0.0,
            owner: None,
            kind: StateKind::Steady(state),
        }
    }

    pub(crate) fn transition(state: TransitionState) -> Self {
        Self {
            global_start_time: 0.0,
            owner: None,
            kind: StateKind::Transition(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// it should treat non-positive windows as always eligible
    #[test]
    fn window_unbounded() {
        let w = TransitionWindow::default();
        assert!(w.contains(-10.0));
        assert!(w.contains(0.0));
        assert!(w.contains(1e9));
    }

    /// it should bound with only one end set
    #[test]
    fn window_single_bound() {
        let only_end = TransitionWindow::new(-1.0, 2.0);
        assert!(only_end.contains(1.0));
        assert!(!only_end.contains(3.0));

        let only_start = TransitionWindow::new(2.0, -1.0);
        assert!(!only_start.contains(1.0));
        assert!(only_start.contains(3.0));
    }

    /// it should use an inclusive interval when start <= end
    #[test]
    fn window_ordered() {
        let w = TransitionWindow::new(2.0, 5.0);
        assert!(!w.contains(1.0));
        assert!(w.contains(2.0));
        assert!(w.contains(3.0));
        assert!(w.contains(5.0));
        assert!(!w.contains(6.0));
    }

    /// it should wrap around when start > end
    #[test]
    fn window_wraparound() {
        let w = TransitionWindow::new(5.0, 2.0);
        assert!(w.contains(1.0));
        assert!(!w.contains(3.0));
        assert!(w.contains(6.0));
        assert!(w.contains(5.0));
        assert!(w.contains(2.0));
    }

    /// it should agree with linear at the curve boundaries and midpoint
    #[test]
    fn blend_curves_boundaries() {
        for curve in [BlendType::Linear, BlendType::SCurve3, BlendType::SCurve5] {
            assert_eq!(curve.apply(0.0), 0.0);
            assert!((curve.apply(1.0) - 1.0).abs() < 1e-12);
            assert!((curve.apply(0.5) - 0.5).abs() < 1e-12, "{curve:?}");
        }
    }

    /// it should ease in and out on the s-curves
    #[test]
    fn blend_curves_easing() {
        assert!(BlendType::SCurve3.apply(0.25) < 0.25);
        assert!(BlendType::SCurve3.apply(0.75) > 0.75);
        assert!(BlendType::SCurve5.apply(0.25) < BlendType::SCurve3.apply(0.25));
        assert!(BlendType::SCurve5.apply(0.75) > BlendType::SCurve3.apply(0.75));
    }
}
