//! Top-level animation manager.
//!
//! Owns the global clock and an ordered stack of layers (base layer at the
//! bottom), drives each layer's update/post-update passes, and folds the
//! layers' source data into a single blended output map.

use std::mem;

use hashbrown::HashMap;
use sinew_api_core::SourceDataMap;

use crate::blendtree::combine_source_data;
use crate::layer::{AnimationLayer, BASE_LAYER_NAME};

pub struct AnimationManager {
    global_time: f64,
    /// Layer stack, base first. Higher layers blend over lower ones.
    layers: Vec<AnimationLayer>,
    /// Folded output, reused across ticks.
    blended: SourceDataMap,
    scratch: SourceDataMap,
}

impl AnimationManager {
    /// Create a manager with an empty base layer at index 0.
    pub fn new() -> Self {
        Self {
            global_time: 0.0,
            layers: vec![AnimationLayer::new(BASE_LAYER_NAME)],
            blended: HashMap::new(),
            scratch: HashMap::new(),
        }
    }

    /// Push a layer on top of the stack, returning its index.
    pub fn add_layer(&mut self, layer: AnimationLayer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn base_layer(&self) -> &AnimationLayer {
        &self.layers[0]
    }

    pub fn base_layer_mut(&mut self) -> &mut AnimationLayer {
        &mut self.layers[0]
    }

    pub fn layer(&self, index: usize) -> Option<&AnimationLayer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut AnimationLayer> {
        self.layers.get_mut(index)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Find a layer's index by name.
    pub fn find_layer(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name() == name)
    }

    pub fn current_global_time(&self) -> f64 {
        self.global_time
    }

    /// Rewind or jump the global clock. Does not touch layer state; callers
    /// wanting a clean restart should also re-enter their initial states.
    pub fn set_global_time(&mut self, global_time: f64) {
        self.global_time = global_time;
    }

    /// Advance the clock by `dt` seconds and tick every layer: all layers
    /// update first, then all run their post-update pass, so completion
    /// cleanup sees the whole stack at the same instant.
    pub fn update(&mut self, dt: f64) {
        self.global_time += dt;
        let t = self.global_time;
        for layer in &mut self.layers {
            layer.update(t);
        }
        for layer in &mut self.layers {
            layer.post_update();
        }
    }

    /// Ask the layer at `index` to transition along `key` at the current
    /// global time. Returns false for an unknown layer or an ineligible
    /// transition.
    pub fn do_transition(&mut self, index: usize, key: &str) -> bool {
        let t = self.global_time;
        match self.layers.get_mut(index) {
            Some(layer) => layer.do_transition(key, t),
            None => false,
        }
    }

    /// Force the layer at `index` into the named steady state, rewinding
    /// its clips to the current global time.
    pub fn set_current_state(&mut self, index: usize, name: &str) -> bool {
        let t = self.global_time;
        match self.layers.get_mut(index) {
            Some(layer) => layer.set_current_state(name, Some(t)),
            None => false,
        }
    }

    /// Fold every layer's current output, bottom-up, into one data map. A
    /// layer with no blend weight overrides the result below it; a weighted
    /// layer crossfades over it. The returned map is reused across calls.
    pub fn current_source_data(&mut self) -> &SourceDataMap {
        self.blended.clear();
        let mut scratch = mem::take(&mut self.scratch);
        for i in 0..self.layers.len() {
            let weight = self.layers[i].blend_weight();
            let Some(data) = self.layers[i].current_source_data() else {
                continue;
            };
            match weight {
                None => {
                    // Full override of everything beneath.
                    scratch.clear();
                    scratch.extend(data.iter().map(|(k, v)| (k.clone(), *v)));
                    mem::swap(&mut self.blended, &mut scratch);
                }
                Some(w) => {
                    combine_source_data(Some(&self.blended), Some(data), w, &mut scratch);
                    mem::swap(&mut self.blended, &mut scratch);
                }
            }
        }
        self.scratch = scratch;
        &self.blended
    }
}

impl Default for AnimationManager {
    fn default() -> Self {
        Self::new()
    }
}
