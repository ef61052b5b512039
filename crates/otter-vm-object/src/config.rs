//! Object model configuration.
//!
//! Tuning knobs for storage-strategy decisions. Embedders usually take the
//! defaults, or deserialize a partial JSON/TOML table: every field falls back
//! to its default when missing.

use serde::Deserialize;

/// Storage-strategy and safety limits for the object model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectModelConfig {
    /// Allow ordinary objects to switch into dictionary mode
    pub dictionary_objects: bool,

    /// Property count at which a `[[Set]]`-driven add moves the object to a dictionary
    pub dictionary_threshold: usize,

    /// Width of the trigger window starting at `dictionary_threshold`
    pub dictionary_threshold_span: usize,

    /// First property of a prototype-less object being an index key also triggers dictionary mode
    pub index_key_dictionary: bool,

    /// Largest gap a write may open in a contiguous array before it goes sparse
    pub max_hole_gap: u64,

    /// Nesting limit for calls and proxy trap dispatch
    pub max_call_depth: usize,

    /// Upper bound on prototype chain walks (cycle guard)
    pub max_prototype_chain: usize,
}

impl Default for ObjectModelConfig {
    fn default() -> Self {
        Self {
            dictionary_objects: true,
            dictionary_threshold: 400,
            dictionary_threshold_span: 1,
            index_key_dictionary: true,
            max_hole_gap: 1024,
            max_call_depth: 10_000,
            max_prototype_chain: 100_000,
        }
    }
}

impl ObjectModelConfig {
    /// Whether adding a property to an object that currently has `count`
    /// properties falls inside the dictionary trigger window.
    #[inline]
    pub fn in_dictionary_window(&self, count: usize) -> bool {
        count >= self.dictionary_threshold
            && count < self.dictionary_threshold + self.dictionary_threshold_span
    }
}
