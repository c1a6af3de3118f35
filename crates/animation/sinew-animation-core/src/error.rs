//! Configuration-time errors.
//!
//! Runtime lookup misses (unknown transition keyword, missing target state,
//! absent source data) are expected outcomes and stay `Option`/`bool`; the
//! variants here are raised eagerly at the mutating call that caused them.

use crate::ids::StateId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnimError {
    #[error("a transition may not use itself as one of its blend endpoints")]
    SelfReferentialEndpoint,

    #[error("transition keyword must not be empty")]
    EmptyKeyword,

    #[error("state {0:?} does not exist in this layer")]
    UnknownState(StateId),

    #[error("state {0:?} is not a steady state")]
    NotASteadyState(StateId),

    #[error("state {0:?} is not a transition state")]
    NotATransitionState(StateId),

    #[error("transition {0:?} does not blend two states")]
    NotABlendingTransition(StateId),

    #[error("channel '{0}': sample arrays must all match the times array length")]
    ChannelLengthMismatch(String),
}
