//! sinew-api-core: transform & value types shared by the animation crates.

pub mod blend;
pub mod value;

pub use blend::{blend_value, lerp, lerp_vec3, slerp};
pub use value::{Transform, Value, ValueKind};

/// Map type used for per-channel source data throughout the workspace.
pub type SourceDataMap = hashbrown::HashMap<String, Value>;
