use sinew_animation_core::{
    joint_channel_name, AnimError, AnimationClip, AnimationLayer, BlendType, ClipSource, StateId,
    SteadyState, TransformChannel, TransitionState, Value,
};

fn trs(x: f32) -> sinew_animation_core::Transform {
    sinew_animation_core::Transform {
        translation: [x, 0.0, 0.0],
        ..Default::default()
    }
}

/// A clip whose single joint channel holds a constant x translation.
fn const_clip(x: f32) -> AnimationClip {
    let mut clip = AnimationClip::new("const");
    clip.add_channel(
        TransformChannel::from_transforms(joint_channel_name(0), vec![0.0, 2.0], &[trs(x), trs(x)])
            .unwrap(),
    );
    clip
}

/// A clip whose x translation equals the local clip time (0..2).
fn ramp_clip() -> AnimationClip {
    let mut clip = AnimationClip::new("ramp");
    clip.add_channel(
        TransformChannel::from_transforms(
            joint_channel_name(0),
            vec![0.0, 2.0],
            &[trs(0.0), trs(2.0)],
        )
        .unwrap(),
    );
    clip
}

fn looping(clip: AnimationClip) -> Box<ClipSource> {
    Box::new(ClipSource::new(clip).with_loop_count(None))
}

fn joint_x(data: &sinew_animation_core::SourceDataMap) -> f32 {
    match data.get(&joint_channel_name(0)) {
        Some(Value::Transform(t)) => t.translation[0],
        other => panic!("expected a transform sample, got {other:?}"),
    }
}

/// A walk/run layer with one transition registered on walk under "go".
fn walk_run(transition: TransitionState) -> (AnimationLayer, StateId, StateId) {
    let mut layer = AnimationLayer::new("test");
    let walk = layer.add_steady_state(SteadyState::new("walk", looping(const_clip(0.0))));
    layer.add_steady_state(SteadyState::new("run", looping(const_clip(2.0))));
    let tid = layer.add_transition_state(transition);
    layer.add_transition(walk, "go", tid).unwrap();
    assert!(layer.set_current_state("walk", Some(0.0)));
    (layer, walk, tid)
}

/// it should refuse to enter a steady state it does not know
#[test]
fn unknown_steady_state_is_refused() {
    let mut layer = AnimationLayer::new("test");
    assert!(!layer.set_current_state("sprint", Some(0.0)));
    assert!(layer.current_state().is_none());
}

/// it should crossfade between two steady states and land on the target
#[test]
fn fade_transition_blends_then_completes() {
    let (mut layer, _, tid) =
        walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));

    layer.update(10.0);
    assert!(layer.do_transition("go", 10.0));
    assert_eq!(layer.current_state(), Some(tid));
    assert_eq!(layer.current_state_name(), None);

    // Halfway through the fade the output is halfway between the poses.
    layer.update(10.5);
    let data = layer.current_source_data().unwrap();
    assert!((joint_x(data) - 1.0).abs() < 1e-5);
    assert!((layer.transition(tid).unwrap().percent().unwrap() - 0.5).abs() < 1e-9);

    // Past the fade time the machine lands on the incoming state.
    layer.update(11.1);
    assert_eq!(layer.current_state_name(), Some("run"));
    let data = layer.current_source_data().unwrap();
    assert!((joint_x(data) - 2.0).abs() < 1e-5);
}

/// it should shape the fade percent through the configured curve
#[test]
fn fade_transition_applies_blend_curve() {
    let (mut layer, _, tid) =
        walk_run(TransitionState::fade("run", 1.0, BlendType::SCurve3));

    assert!(layer.do_transition("go", 0.0));
    layer.update(0.25);
    let percent = layer.transition(tid).unwrap().percent().unwrap();
    assert!((percent - BlendType::SCurve3.apply(0.25)).abs() < 1e-9);
    assert!(percent < 0.25);
}

/// it should not advance the outgoing state during a frozen transition
#[test]
fn frozen_transition_holds_outgoing_pose() {
    let mut layer = AnimationLayer::new("test");
    let walk = layer.add_steady_state(SteadyState::new("walk", looping(ramp_clip())));
    layer.add_steady_state(SteadyState::new("run", looping(const_clip(2.0))));
    let tid = layer.add_transition_state(TransitionState::frozen("run", 2.0, BlendType::Linear));
    layer.add_transition(walk, "go", tid).unwrap();
    layer.set_current_state("walk", Some(0.0));

    layer.update(0.5);
    assert!((joint_x(layer.steady(walk).unwrap().source_tree().source_data()) - 0.5).abs() < 1e-5);

    assert!(layer.do_transition("go", 0.5));
    layer.update(1.0);
    // Walk would read 1.0 by now if it were still being driven.
    assert!((joint_x(layer.steady(walk).unwrap().source_tree().source_data()) - 0.5).abs() < 1e-5);
}

/// it should phase-lock the incoming state to the outgoing one when syncing
#[test]
fn sync_fade_rewinds_target_to_callers_origin() {
    let mut layer = AnimationLayer::new("test");
    let walk = layer.add_steady_state(SteadyState::new("walk", looping(const_clip(0.0))));
    let run = layer.add_steady_state(SteadyState::new("run", looping(ramp_clip())));
    let tid = layer.add_transition_state(TransitionState::sync_fade("run", 2.0, BlendType::Linear));
    layer.add_transition(walk, "go", tid).unwrap();
    layer.set_current_state("walk", Some(0.0));

    layer.update(1.0);
    assert!(layer.do_transition("go", 1.0));
    assert_eq!(layer.global_start_time(run), Some(0.0));

    layer.update(1.5);
    // Run samples at local time 1.5, not 0.5 from the transition instant.
    assert!((joint_x(layer.steady(run).unwrap().source_tree().source_data()) - 1.5).abs() < 1e-5);
}

/// it should jump straight to the target with no blending state
#[test]
fn immediate_transition_skips_blending() {
    let (mut layer, _, _) = walk_run(TransitionState::immediate("run"));

    assert!(layer.do_transition("go", 3.0));
    assert_eq!(layer.current_state_name(), Some("run"));
    let run = layer.steady_state("run").unwrap();
    assert_eq!(layer.global_start_time(run), Some(3.0));
}

/// it should swallow the request and stay put on an ignore transition
#[test]
fn ignore_transition_keeps_current_state() {
    let (mut layer, walk, _) = walk_run(TransitionState::ignore());

    assert!(!layer.do_transition("go", 3.0));
    assert_eq!(layer.current_state(), Some(walk));
}

/// it should only fire inside the transition window
#[test]
fn window_gates_transition_eligibility() {
    let (mut layer, walk, _) = walk_run(
        TransitionState::fade("run", 1.0, BlendType::Linear).with_window(0.5, 1.0),
    );

    assert!(!layer.do_transition("go", 0.2));
    assert_eq!(layer.current_state(), Some(walk));
    assert!(!layer.do_transition("go", 1.4));
    assert!(layer.do_transition("go", 0.7));
}

/// it should treat a start after the end as a wraparound window
#[test]
fn window_wraps_when_start_exceeds_end() {
    for (local_time, eligible) in [(1.0, false), (1.7, true), (0.3, true)] {
        let (mut layer, _, _) = walk_run(
            TransitionState::fade("run", 1.0, BlendType::Linear).with_window(1.5, 0.5),
        );
        assert_eq!(
            layer.do_transition("go", local_time),
            eligible,
            "local time {local_time}"
        );
    }
}

/// it should ignore a state-local wildcard but honor the layer-wide one
#[test]
fn wildcard_only_fires_from_the_general_table() {
    let (mut layer, walk, tid) = walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));
    layer.add_transition(walk, "*", tid).unwrap();

    // The steady state's own "*" entry is never invoked.
    assert!(!layer.do_transition("anything", 1.0));
    assert_eq!(layer.current_state(), Some(walk));

    layer.add_general_transition("*", tid).unwrap();
    assert!(layer.do_transition("anything", 1.0));
    assert_eq!(layer.current_state(), Some(tid));
}

/// it should prefer a keyed general transition over the wildcard entry
#[test]
fn general_table_prefers_exact_keyword() {
    let (mut layer, _, fade_tid) = walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));
    let imm_tid = layer.add_transition_state(TransitionState::immediate("run"));
    layer.add_general_transition("*", fade_tid).unwrap();
    layer.add_general_transition("snap", imm_tid).unwrap();

    assert!(layer.do_transition("snap", 1.0));
    assert_eq!(layer.current_state_name(), Some("run"));
}

/// it should follow the end transition when the blend tree plays out
#[test]
fn end_transition_fires_on_exhaustion() {
    let mut layer = AnimationLayer::new("test");
    let walk = layer.add_steady_state(SteadyState::new(
        "walk",
        Box::new(ClipSource::new(const_clip(0.0))),
    ));
    layer.add_steady_state(SteadyState::new("run", looping(const_clip(2.0))));
    let tid = layer.add_transition_state(TransitionState::immediate("run"));
    layer.set_end_transition(walk, Some(tid)).unwrap();
    layer.set_current_state("walk", Some(0.0));

    layer.update(1.0);
    assert_eq!(layer.current_state(), Some(walk));
    // The single-play clip runs out past its two-second length.
    layer.update(2.5);
    assert_eq!(layer.current_state_name(), Some("run"));
}

/// it should drop out of the machine when a dead-end state plays out
#[test]
fn exhausted_state_without_end_transition_is_removed() {
    let mut layer = AnimationLayer::new("test");
    layer.add_steady_state(SteadyState::new(
        "walk",
        Box::new(ClipSource::new(const_clip(0.0))),
    ));
    layer.set_current_state("walk", Some(0.0));

    layer.update(1.0);
    layer.post_update();
    assert!(layer.current_state().is_some());

    layer.update(2.5);
    layer.post_update();
    assert!(layer.current_state().is_none());
    assert!(layer.current_source_data().is_none());
}

/// it should drop the blended cache when an endpoint changes identity
#[test]
fn endpoint_change_clears_blend_cache() {
    let (mut layer, _, tid) = walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));
    let idle = layer.add_steady_state(SteadyState::new("idle", looping(const_clip(5.0))));

    assert!(layer.do_transition("go", 0.0));
    layer.update(0.5);
    assert!(!layer
        .current_source_data()
        .unwrap()
        .is_empty());

    layer.set_transition_state_a(tid, idle).unwrap();
    assert!(layer
        .transition(tid)
        .unwrap()
        .cached_source_data()
        .unwrap()
        .is_empty());
}

/// it should reject invalid wiring with the matching error
#[test]
fn wiring_errors() {
    let (mut layer, walk, tid) = walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));
    let ignore_tid = layer.add_transition_state(TransitionState::ignore());

    assert_eq!(
        layer.add_transition(walk, "", tid),
        Err(AnimError::EmptyKeyword)
    );
    assert_eq!(
        layer.add_general_transition("", tid),
        Err(AnimError::EmptyKeyword)
    );
    assert_eq!(
        layer.add_transition(tid, "go", tid),
        Err(AnimError::NotASteadyState(tid))
    );
    assert_eq!(
        layer.add_transition(walk, "go", walk),
        Err(AnimError::NotATransitionState(walk))
    );
    assert_eq!(
        layer.set_transition_state_a(tid, tid),
        Err(AnimError::SelfReferentialEndpoint)
    );
    assert_eq!(
        layer.set_transition_state_b(tid, tid),
        Err(AnimError::SelfReferentialEndpoint)
    );
    assert_eq!(
        layer.set_transition_state_a(ignore_tid, walk),
        Err(AnimError::NotABlendingTransition(ignore_tid))
    );
    assert_eq!(
        layer.add_general_transition("go", StateId(99)),
        Err(AnimError::UnknownState(StateId(99)))
    );
}

/// it should keep owning a reused endpoint across fade re-entry
#[test]
fn reused_endpoint_is_reowned_by_the_transition() {
    let mut layer = AnimationLayer::new("test");
    // Walk plays once and then hands off to idle via its end transition.
    let walk = layer.add_steady_state(SteadyState::new(
        "walk",
        Box::new(ClipSource::new(const_clip(0.0))),
    ));
    layer.add_steady_state(SteadyState::new("run", looping(const_clip(2.0))));
    let idle = layer.add_steady_state(SteadyState::new("idle", looping(const_clip(5.0))));
    let tid = layer.add_transition_state(TransitionState::fade("run", 1.0, BlendType::Linear));
    layer.add_transition(walk, "go", tid).unwrap();
    let end_tid = layer.add_transition_state(TransitionState::immediate("idle"));
    layer.set_end_transition(walk, Some(end_tid)).unwrap();

    // First fade runs to completion before walk's two-second clip ends.
    layer.set_current_state("walk", Some(0.0));
    assert!(layer.do_transition("go", 0.0));
    layer.update(0.5);
    layer.update(1.5);
    assert_eq!(layer.current_state_name(), Some("run"));

    // Re-enter walk through the layer (no rewind, its clip keeps its
    // original origin) and re-fire the same fade with the same endpoints.
    assert!(layer.set_current_state("walk", None));
    assert!(layer.do_transition("go", 1.6));
    assert_eq!(layer.current_state(), Some(tid));

    // Mid-fade the one-shot clip exhausts; the end transition must swap
    // the fade's outgoing endpoint, not vanish into the layer slot.
    layer.update(2.5);
    assert_eq!(layer.current_state(), Some(tid));
    assert_eq!(
        layer.transition(tid).unwrap().endpoints().unwrap().0,
        Some(idle)
    );
}

/// it should deregister steady states and general transitions by id
#[test]
fn states_can_be_deregistered() {
    let (mut layer, walk, tid) = walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));
    layer.add_general_transition("panic", tid).unwrap();

    assert!(layer.remove_general_transition_state(tid));
    assert_eq!(layer.general_transition("panic"), None);
    assert!(!layer.remove_general_transition_state(tid));

    assert!(layer.remove_steady_state(walk));
    assert_eq!(layer.steady_state("walk"), None);
    assert!(!layer.remove_steady_state(walk));
    // The arena slot survives, so the machine keeps running in it.
    assert_eq!(layer.current_state(), Some(walk));
}

/// it should unregister transitions by keyword and by id
#[test]
fn transitions_can_be_removed() {
    let (mut layer, walk, tid) = walk_run(TransitionState::fade("run", 1.0, BlendType::Linear));

    assert_eq!(layer.transition_for(walk, "go"), Some(tid));
    assert!(layer.remove_transition_state(walk, tid));
    assert_eq!(layer.transition_for(walk, "go"), None);
    assert!(!layer.remove_transition_state(walk, tid));

    layer.add_transition(walk, "go", tid).unwrap();
    assert_eq!(layer.remove_transition(walk, "go"), Some(tid));
    assert!(!layer.do_transition("go", 1.0));
}
