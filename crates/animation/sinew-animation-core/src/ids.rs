//! Identifiers for core entities.

use serde::{Deserialize, Serialize};

/// Index of a finite state inside its layer's state arena. Opaque to
/// callers; states are never deallocated before their layer, so ids stay
/// valid for the layer's lifetime.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StateId(pub u32);

impl StateId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
