//! Sinew Animation Core (engine-agnostic)
//!
//! A layered skeletal animation state machine: steady states play blend
//! trees of clips, transition states move the machine between them with
//! time-windowed eligibility and curve-shaped crossfades. Rendering,
//! skinning and asset import live elsewhere; this crate ends at per-channel
//! transform maps.

pub mod blendtree;
pub mod clip;
pub mod error;
pub mod ids;
pub mod layer;
pub mod manager;
pub mod state;

// Re-exports for consumers (adapters)
pub use blendtree::{
    combine_source_data, BinaryLerpSource, BlendTreeSource, ClipSource, ManagedTransformSource,
};
pub use clip::{joint_channel_name, AnimationClip, TransformChannel, JOINT_CHANNEL_PREFIX};
pub use error::AnimError;
pub use ids::StateId;
pub use layer::{AnimationLayer, BASE_LAYER_NAME};
pub use manager::AnimationManager;
pub use state::{BlendType, StateOwner, SteadyState, TransitionState, TransitionWindow};
pub use sinew_api_core::{SourceDataMap, Transform, Value, ValueKind};
