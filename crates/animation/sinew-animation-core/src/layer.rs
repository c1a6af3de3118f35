//! Animation layers.
//!
//! A layer is an independent state machine: it owns an arena of finite
//! states, is in at most one of them at a time, and may move between
//! steady states along registered transitions. The layer is also the
//! top-level `StateOwner`: states ask it (or a parent transition) to swap
//! them out via `replace_state_via`, which is safe to invoke from within
//! a state's own update.

use hashbrown::HashMap;
use log::warn;
use sinew_api_core::SourceDataMap;

use crate::blendtree::combine_source_data;
use crate::error::AnimError;
use crate::ids::StateId;
use crate::state::{
    PolicyKind, StateKind, StateNode, StateOwner, SteadyState, TransitionState,
};

/// The layer name of the default base layer.
pub const BASE_LAYER_NAME: &str = "-BASE_LAYER-";

#[derive(Copy, Clone)]
enum EndpointSlot {
    A,
    B,
}

pub struct AnimationLayer {
    /// Name of this layer, used for identification, so best if unique.
    name: String,
    /// Every state this machine can be in, steady and transitional.
    states: Vec<StateNode>,
    /// Steady states by name.
    steady_states: HashMap<String, StateId>,
    /// General transitions for moving from the current state to another,
    /// consulted when the current steady state has no match for a keyword.
    transitions: HashMap<String, StateId>,
    /// Current state, if any.
    current: Option<StateId>,
    /// Weight used when this layer's output is blended over the layers
    /// below it. `None` overrides fully (and is the norm for a base layer).
    blend_weight: Option<f64>,
}

impl AnimationLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            steady_states: HashMap::new(),
            transitions: HashMap::new(),
            current: None,
            blend_weight: None,
        }
    }

    pub fn with_blend_weight(mut self, weight: f64) -> Self {
        self.blend_weight = Some(weight);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blend_weight(&self) -> Option<f64> {
        self.blend_weight
    }

    pub fn set_blend_weight(&mut self, weight: Option<f64>) {
        self.blend_weight = weight;
    }

    // ------------------------------------------------------------------
    // Arena population & lookup

    /// Add a steady state, registering it under its name (last write wins
    /// for duplicate names).
    pub fn add_steady_state(&mut self, state: SteadyState) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.steady_states.insert(state.name.clone(), id);
        self.states.push(StateNode::steady(state));
        id
    }

    /// Add a transition state to the arena. It does nothing until wired to
    /// a steady state's keyword table, an end transition slot, or the
    /// layer's general table.
    pub fn add_transition_state(&mut self, state: TransitionState) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(StateNode::transition(state));
        id
    }

    /// Look up a steady state by name.
    pub fn steady_state(&self, name: &str) -> Option<StateId> {
        self.steady_states.get(name).copied()
    }

    /// Deregister a steady state from the name map so it can no longer be
    /// looked up or targeted. Its arena slot stays, so transitions already
    /// holding it keep working. Returns whether the name mapped to `state`.
    pub fn remove_steady_state(&mut self, state: StateId) -> bool {
        let Some(name) = self.steady(state).map(|s| s.name().to_string()) else {
            return false;
        };
        if self.steady_states.get(&name) == Some(&state) {
            self.steady_states.remove(&name);
            true
        } else {
            false
        }
    }

    pub fn steady_state_names(&self) -> impl Iterator<Item = &str> {
        self.steady_states.keys().map(String::as_str)
    }

    pub fn current_state(&self) -> Option<StateId> {
        self.current
    }

    /// Name of the current state, when it is a steady state.
    pub fn current_state_name(&self) -> Option<&str> {
        match &self.states[self.current?.index()].kind {
            StateKind::Steady(s) => Some(s.name()),
            StateKind::Transition(_) => None,
        }
    }

    pub fn steady(&self, id: StateId) -> Option<&SteadyState> {
        match &self.states.get(id.index())?.kind {
            StateKind::Steady(s) => Some(s),
            _ => None,
        }
    }

    pub fn steady_mut(&mut self, id: StateId) -> Option<&mut SteadyState> {
        match &mut self.states.get_mut(id.index())?.kind {
            StateKind::Steady(s) => Some(s),
            _ => None,
        }
    }

    pub fn transition(&self, id: StateId) -> Option<&TransitionState> {
        match &self.states.get(id.index())?.kind {
            StateKind::Transition(t) => Some(t),
            _ => None,
        }
    }

    /// Time origin of a state's local clock.
    pub fn global_start_time(&self, id: StateId) -> Option<f64> {
        self.states.get(id.index()).map(|n| n.global_start_time)
    }

    // ------------------------------------------------------------------
    // Transition wiring

    /// Register `transition` under `keyword` on steady state `state`.
    /// Overwrites any existing entry for that keyword.
    pub fn add_transition(
        &mut self,
        state: StateId,
        keyword: &str,
        transition: StateId,
    ) -> Result<(), AnimError> {
        if keyword.is_empty() {
            return Err(AnimError::EmptyKeyword);
        }
        self.require_transition(transition)?;
        let steady = self
            .steady_mut(state)
            .ok_or(AnimError::NotASteadyState(state))?;
        steady.transitions.insert(keyword.to_string(), transition);
        Ok(())
    }

    /// The transition registered under `keyword` on `state`, if any.
    pub fn transition_for(&self, state: StateId, keyword: &str) -> Option<StateId> {
        self.steady(state)?.transitions.get(keyword).copied()
    }

    /// Remove a steady state's transition by keyword, returning it.
    pub fn remove_transition(&mut self, state: StateId, keyword: &str) -> Option<StateId> {
        self.steady_mut(state)?.transitions.remove(keyword)
    }

    /// Remove the first keyword entry mapped to `transition` (compared by
    /// id) from `state`. Returns whether a match was found.
    pub fn remove_transition_state(&mut self, state: StateId, transition: StateId) -> bool {
        let Some(steady) = self.steady_mut(state) else {
            return false;
        };
        let keyword = steady
            .transitions
            .iter()
            .find(|(_, &tid)| tid == transition)
            .map(|(k, _)| k.clone());
        match keyword {
            Some(k) => {
                steady.transitions.remove(&k);
                true
            }
            None => false,
        }
    }

    /// Set the transition fired when `state`'s blend tree plays out.
    pub fn set_end_transition(
        &mut self,
        state: StateId,
        transition: Option<StateId>,
    ) -> Result<(), AnimError> {
        if let Some(tid) = transition {
            self.require_transition(tid)?;
        }
        let steady = self
            .steady_mut(state)
            .ok_or(AnimError::NotASteadyState(state))?;
        steady.end_transition = transition;
        Ok(())
    }

    /// Register a layer-wide transition under `keyword`, used when the
    /// current steady state has no match. The `"*"` keyword acts as a
    /// wildcard at this level.
    pub fn add_general_transition(
        &mut self,
        keyword: &str,
        transition: StateId,
    ) -> Result<(), AnimError> {
        if keyword.is_empty() {
            return Err(AnimError::EmptyKeyword);
        }
        self.require_transition(transition)?;
        self.transitions.insert(keyword.to_string(), transition);
        Ok(())
    }

    pub fn general_transition(&self, keyword: &str) -> Option<StateId> {
        self.transitions.get(keyword).copied()
    }

    pub fn remove_general_transition(&mut self, keyword: &str) -> Option<StateId> {
        self.transitions.remove(keyword)
    }

    /// Remove the first general-table entry mapped to `transition` (compared
    /// by id). Returns whether a match was found.
    pub fn remove_general_transition_state(&mut self, transition: StateId) -> bool {
        let keyword = self
            .transitions
            .iter()
            .find(|(_, &tid)| tid == transition)
            .map(|(k, _)| k.clone());
        match keyword {
            Some(k) => {
                self.transitions.remove(&k);
                true
            }
            None => false,
        }
    }

    fn require_transition(&self, id: StateId) -> Result<(), AnimError> {
        match &self.states.get(id.index()).ok_or(AnimError::UnknownState(id))?.kind {
            StateKind::Transition(_) => Ok(()),
            _ => Err(AnimError::NotATransitionState(id)),
        }
    }

    // ------------------------------------------------------------------
    // Blend endpoints

    /// Set the outgoing endpoint of a blending transition. Rejects
    /// self-reference; always installs the transition as the state's owner,
    /// and drops the blended-sample cache when the endpoint changes.
    pub fn set_transition_state_a(
        &mut self,
        transition: StateId,
        state: StateId,
    ) -> Result<(), AnimError> {
        self.set_transition_endpoint(transition, state, EndpointSlot::A)
    }

    /// Set the incoming endpoint of a blending transition. Same rules as
    /// `set_transition_state_a`.
    pub fn set_transition_state_b(
        &mut self,
        transition: StateId,
        state: StateId,
    ) -> Result<(), AnimError> {
        self.set_transition_endpoint(transition, state, EndpointSlot::B)
    }

    fn set_transition_endpoint(
        &mut self,
        transition: StateId,
        state: StateId,
        slot: EndpointSlot,
    ) -> Result<(), AnimError> {
        if transition == state {
            return Err(AnimError::SelfReferentialEndpoint);
        }
        if state.index() >= self.states.len() {
            return Err(AnimError::UnknownState(state));
        }
        let node = self
            .states
            .get_mut(transition.index())
            .ok_or(AnimError::UnknownState(transition))?;
        let StateKind::Transition(t) = &mut node.kind else {
            return Err(AnimError::NotATransitionState(transition));
        };
        let lerp = t
            .policy
            .lerp_mut()
            .ok_or(AnimError::NotABlendingTransition(transition))?;
        let target = match slot {
            EndpointSlot::A => &mut lerp.state_a,
            EndpointSlot::B => &mut lerp.state_b,
        };
        if *target != Some(state) {
            *target = Some(state);
            // The blended source changed identity; the cache is stale.
            lerp.source_data.clear();
        }
        // Ownership is installed even when the endpoint is unchanged: the
        // state may have been re-entered through the layer since the last
        // set, and a later swap request must still reach this transition.
        self.states[state.index()].owner = Some(StateOwner::Transition(transition));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Current-state management

    /// Force the machine into the steady state with the given name. Used
    /// to set the initial state. `rewind_at` re-anchors the state's clips
    /// to the given global time.
    pub fn set_current_state(&mut self, name: &str, rewind_at: Option<f64>) -> bool {
        match self.steady_state(name) {
            Some(id) => {
                self.set_current(Some(id), rewind_at);
                true
            }
            None => {
                warn!("unable to find steady state named: {name}");
                false
            }
        }
    }

    /// Install the given state as current. Generally for transitional
    /// state use; `None` leaves the layer with no state.
    pub fn set_current(&mut self, state: Option<StateId>, rewind_at: Option<f64>) {
        self.current = state;
        if let Some(id) = state {
            self.states[id.index()].owner = Some(StateOwner::Layer);
            if let Some(t) = rewind_at {
                self.reset_clips(id, t);
            }
        }
    }

    pub fn clear_current_state(&mut self) {
        self.set_current(None, None);
    }

    /// Re-anchor a state's local time origin; steady states forward to
    /// their blend tree. Must be called whenever a state comes back into
    /// active use, before its first update.
    pub fn reset_clips(&mut self, id: StateId, global_start_time: f64) {
        let node = &mut self.states[id.index()];
        node.global_start_time = global_start_time;
        if let StateKind::Steady(s) = &mut node.kind {
            s.source_tree.reset_clips(global_start_time);
        }
    }

    // ------------------------------------------------------------------
    // Transition execution

    /// Attempt to perform a transition. The current steady state's keyword
    /// table is consulted first, then the layer's general table (with its
    /// `"*"` wildcard). Returns true if a transition actually moved the
    /// machine.
    pub fn do_transition(&mut self, key: &str, global_time: f64) -> bool {
        let state = self.current;
        match state {
            Some(sid) if self.steady(sid).is_some() => {
                let mut next = self.do_steady_transition(sid, key, global_time);
                if next.is_none() {
                    if let Some(tid) = self.general_lookup(key) {
                        next = self.run_transition(tid, Some(sid), global_time);
                    }
                }
                match next {
                    Some(ns) if Some(ns) != state => {
                        self.set_current(Some(ns), None);
                        true
                    }
                    _ => false,
                }
            }
            None => {
                if let Some(tid) = self.general_lookup(key) {
                    let next = self.run_transition(tid, None, global_time);
                    self.set_current(next, Some(global_time));
                    true
                } else {
                    false
                }
            }
            // Mid-transition: keyed requests are not honored.
            Some(_) => false,
        }
    }

    fn general_lookup(&self, key: &str) -> Option<StateId> {
        self.transitions
            .get(key)
            .or_else(|| self.transitions.get("*"))
            .copied()
    }

    /// Ask steady state `state` to transition along `key`. Returns the new
    /// state to become active, or `None` when no keyed transition exists
    /// or the found transition is not currently eligible.
    pub fn do_steady_transition(
        &mut self,
        state: StateId,
        key: &str,
        global_time: f64,
    ) -> Option<StateId> {
        let tid = {
            let steady = self.steady(state)?;
            match steady.transitions.get(key) {
                Some(&tid) => tid,
                None => {
                    // TODO: this fetches the state-local "*" entry and then
                    // drops it, so state-local wildcards never fire; only
                    // the layer-wide table honors "*". Decide whether the
                    // state-local wildcard should be invoked here too.
                    let _wildcard = steady.transitions.get("*");
                    return None;
                }
            }
        };
        self.run_transition(tid, Some(state), global_time)
    }

    /// Run a transition state against the calling state: check that the
    /// layer has a current state, compute the current state's local time,
    /// test window eligibility, then apply the transition's policy.
    /// Returns the state to become active, or `None` if the transition is
    /// not eligible right now or is intentionally ignored.
    pub fn run_transition(
        &mut self,
        transition: StateId,
        calling: Option<StateId>,
        global_time: f64,
    ) -> Option<StateId> {
        let current = self.current?;
        let local_time = global_time - self.states[current.index()].global_start_time;
        let window = self.transition(transition)?.window;
        if !window.contains(local_time) {
            return None;
        }
        self.apply_transition_policy(transition, calling, global_time)
    }

    fn apply_transition_policy(
        &mut self,
        transition: StateId,
        calling: Option<StateId>,
        global_time: f64,
    ) -> Option<StateId> {
        let (kind, target) = {
            let t = self.transition(transition)?;
            (t.policy.kind(), t.target.clone())
        };
        match kind {
            PolicyKind::Ignore => calling,
            PolicyKind::Immediate => {
                let target_id = self.steady_state(target?.as_str())?;
                self.reset_clips(target_id, global_time);
                Some(target_id)
            }
            PolicyKind::Fade | PolicyKind::Frozen | PolicyKind::SyncFade => {
                let target_id = self.steady_state(target?.as_str())?;
                let calling = calling?;
                // Endpoints are steady states, never the transition
                // itself, so these cannot fail on self-reference.
                self.set_transition_state_a(transition, calling).ok()?;
                self.set_transition_state_b(transition, target_id).ok()?;
                if kind == PolicyKind::SyncFade {
                    // Keep the incoming clip phase-locked to the outgoing
                    // one rather than starting it fresh.
                    let a_start = self.states[calling.index()].global_start_time;
                    self.reset_clips(target_id, a_start);
                } else {
                    self.reset_clips(target_id, global_time);
                }
                if let Some(lerp) = self.lerp_mut(transition) {
                    lerp.start = global_time;
                    lerp.percent = 0.0;
                }
                Some(transition)
            }
        }
    }

    // ------------------------------------------------------------------
    // Tick driving

    /// Advance the current state to the given global time.
    pub fn update(&mut self, global_time: f64) {
        if let Some(id) = self.current {
            self.update_state(id, global_time);
        }
    }

    /// Post-tick pass over the current state; detects completion and
    /// performs cleanup/replacement.
    pub fn post_update(&mut self) {
        if let Some(id) = self.current {
            self.post_update_state(id);
        }
    }

    fn update_state(&mut self, id: StateId, global_time: f64) {
        let is_steady = matches!(self.states[id.index()].kind, StateKind::Steady(_));
        if is_steady {
            self.update_steady(id, global_time);
        } else {
            self.update_transition(id, global_time);
        }
    }

    fn update_steady(&mut self, id: StateId, global_time: f64) {
        let still_playing = {
            let node = &mut self.states[id.index()];
            let StateKind::Steady(s) = &mut node.kind else {
                return;
            };
            s.source_tree.set_time(global_time)
        };
        if still_playing {
            return;
        }
        let (end_transition, owner) = {
            let node = &self.states[id.index()];
            let StateKind::Steady(s) = &node.kind else {
                return;
            };
            (s.end_transition, node.owner)
        };
        if let Some(tid) = end_transition {
            // Tree played out: time to move to the end transition.
            let new_state = self.run_transition(tid, Some(id), global_time);
            if let Some(ns) = new_state {
                self.reset_clips(ns, global_time);
                self.update_state(ns, global_time);
            }
            if new_state != Some(id) {
                self.replace_state_via(owner, id, new_state);
            }
        }
    }

    fn update_transition(&mut self, id: StateId, global_time: f64) {
        let kind = match self.transition(id) {
            Some(t) => t.policy.kind(),
            None => return,
        };
        if matches!(kind, PolicyKind::Immediate | PolicyKind::Ignore) {
            return;
        }
        // Capture everything before any replacement: issuing a swap may
        // supersede this node mid-tick, and the forwarded updates below
        // must still run against the endpoints we started with.
        let (start, fade_time, blend_type, state_a, state_b, owner) = {
            let node = &self.states[id.index()];
            let StateKind::Transition(t) = &node.kind else {
                return;
            };
            let Some(l) = t.policy.lerp() else {
                return;
            };
            (l.start, l.fade_time, l.blend_type, l.state_a, l.state_b, node.owner)
        };
        let current_time = global_time - start;
        if current_time > fade_time {
            // Fade complete: hand the machine over to the incoming state.
            self.replace_state_via(owner, id, state_b);
        } else {
            let raw = if fade_time > 0.0 {
                (current_time / fade_time).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let percent = blend_type.apply(raw);
            if let Some(lerp) = self.lerp_mut(id) {
                lerp.percent = percent;
            }
        }
        // Forward the tick to the endpoints. A frozen transition leaves
        // the outgoing state's pose where it was.
        if kind != PolicyKind::Frozen {
            if let Some(a) = state_a {
                self.update_state(a, global_time);
            }
        }
        if let Some(b) = state_b {
            self.update_state(b, global_time);
        }
    }

    fn post_update_state(&mut self, id: StateId) {
        enum Action {
            DropOut(Option<StateOwner>),
            Forward {
                frozen: bool,
                state_a: Option<StateId>,
                state_b: Option<StateId>,
            },
            Nothing,
        }
        let action = {
            let node = &self.states[id.index()];
            match &node.kind {
                StateKind::Steady(s) => {
                    if !s.source_tree.is_active() && s.end_transition.is_none() {
                        Action::DropOut(node.owner)
                    } else {
                        Action::Nothing
                    }
                }
                StateKind::Transition(t) => match t.policy.lerp() {
                    Some(l) => Action::Forward {
                        frozen: t.policy.kind() == PolicyKind::Frozen,
                        state_a: l.state_a,
                        state_b: l.state_b,
                    },
                    None => Action::Nothing,
                },
            }
        };
        match action {
            // Dead end: no end transition to move along, so drop out of
            // the machine entirely.
            Action::DropOut(owner) => self.replace_state_via(owner, id, None),
            Action::Forward {
                frozen,
                state_a,
                state_b,
            } => {
                if !frozen {
                    if let Some(a) = state_a {
                        self.post_update_state(a);
                    }
                }
                if let Some(b) = state_b {
                    self.post_update_state(b);
                }
            }
            Action::Nothing => {}
        }
    }

    // ------------------------------------------------------------------
    // State replacement (the StateOwner protocol)

    /// Swap `current` for `new` wherever `owner` holds it. Replacing
    /// through the layer clears/installs the current slot; replacing
    /// through a parent transition swaps whichever endpoint matches.
    pub(crate) fn replace_state_via(
        &mut self,
        owner: Option<StateOwner>,
        current: StateId,
        new: Option<StateId>,
    ) {
        match owner {
            None => {}
            Some(StateOwner::Layer) => {
                if self.current == Some(current) {
                    self.set_current(new, None);
                }
            }
            Some(StateOwner::Transition(tid)) => {
                // A nested transition only ever swaps in a real state.
                let Some(new) = new else {
                    return;
                };
                let slot = self
                    .transition(tid)
                    .and_then(|t| t.policy.lerp())
                    .and_then(|l| {
                        if l.state_a == Some(current) {
                            Some(EndpointSlot::A)
                        } else if l.state_b == Some(current) {
                            Some(EndpointSlot::B)
                        } else {
                            None
                        }
                    });
                if let Some(slot) = slot {
                    if let Err(err) = self.set_transition_endpoint(tid, new, slot) {
                        warn!("failed to swap transition endpoint: {err}");
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Source data

    /// The blended per-channel data for the current state, or `None` when
    /// the layer has no state (or the state produces nothing). The
    /// returned map is a cache mutated in place between calls.
    pub fn current_source_data(&mut self) -> Option<&SourceDataMap> {
        let id = self.current?;
        self.refresh_source_data(id);
        self.source_data_ref(id)
    }

    fn refresh_source_data(&mut self, id: StateId) {
        let kind = match &self.states[id.index()].kind {
            // A steady state's tree refreshes its own cache in set_time.
            StateKind::Steady(_) => return,
            StateKind::Transition(t) => t.policy.kind(),
        };
        if matches!(kind, PolicyKind::Immediate | PolicyKind::Ignore) {
            return;
        }
        let (state_a, state_b, percent) = {
            let Some(l) = self.transition(id).and_then(|t| t.policy.lerp()) else {
                return;
            };
            (l.state_a, l.state_b, l.percent)
        };
        if let Some(a) = state_a {
            self.refresh_source_data(a);
        }
        if let Some(b) = state_b {
            self.refresh_source_data(b);
        }
        // Take the cache out of the node so the endpoint maps can be
        // borrowed while we fill it; the map (and its capacity) is moved,
        // not reallocated.
        let mut store = match self.lerp_mut(id) {
            Some(l) => std::mem::take(&mut l.source_data),
            None => return,
        };
        {
            let data_a = state_a.and_then(|sid| self.source_data_ref(sid));
            let data_b = state_b.and_then(|sid| self.source_data_ref(sid));
            combine_source_data(data_a, data_b, percent, &mut store);
        }
        if let Some(l) = self.lerp_mut(id) {
            l.source_data = store;
        }
    }

    fn source_data_ref(&self, id: StateId) -> Option<&SourceDataMap> {
        match &self.states[id.index()].kind {
            StateKind::Steady(s) => Some(s.source_tree.source_data()),
            StateKind::Transition(t) => t.cached_source_data(),
        }
    }

    fn lerp_mut(&mut self, id: StateId) -> Option<&mut crate::state::TwoStateLerp> {
        match &mut self.states.get_mut(id.index())?.kind {
            StateKind::Transition(t) => t.policy.lerp_mut(),
            _ => None,
        }
    }
}
