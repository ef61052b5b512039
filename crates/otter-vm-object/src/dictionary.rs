//! Dictionary-mode property storage.
//!
//! An ordinary object that accumulates many properties through plain
//! assignment stops growing its shape chain and keeps its ordinary
//! properties in an insertion-ordered map instead. Hidden properties stay in
//! the (now dictionary-flagged) shape.
//!
//! Going back is driven by definitions the map cannot express cheaply:
//! redefining an existing property or defining on a non-extensible object
//! replays the map into a fresh shape chain.

use crate::config::ObjectModelConfig;
use crate::object::{JsObject, SlotStorage, SlotValue};
use crate::property::{PropertyDescriptor, PropertyKey};
use crate::shape::{ObjectKind, Shape, SlotKind};
use rustc_hash::FxHashMap;

/// Entries below this count are never compacted
const MIN_COMPACT_ENTRIES: usize = 16;

/// Insertion-ordered property map of a dictionary-mode object.
///
/// Deletion leaves a tombstone in `entries` so removal stays O(1); the
/// entry list is compacted once tombstones outnumber live entries.
#[derive(Debug, Default)]
pub struct DictionaryMap {
    entries: Vec<Option<(PropertyKey, PropertyDescriptor)>>,
    index: FxHashMap<PropertyKey, usize>,
}

impl DictionaryMap {
    /// Number of live properties
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the map holds no live properties
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a live property
    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        let position = *self.index.get(key)?;
        self.entries[position].as_ref().map(|(_, desc)| desc)
    }

    /// Look up a live property for in-place update
    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut PropertyDescriptor> {
        let position = *self.index.get(key)?;
        self.entries[position].as_mut().map(|(_, desc)| desc)
    }

    /// Insert or replace. A replaced key keeps its position; a new key
    /// (including one deleted earlier) goes last.
    pub fn insert(&mut self, key: PropertyKey, desc: PropertyDescriptor) {
        if let Some(existing) = self.get_mut(&key) {
            *existing = desc;
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push(Some((key, desc)));
    }

    /// Remove a property, returning its descriptor
    pub fn remove(&mut self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        let position = self.index.remove(key)?;
        let removed = self.entries[position].take().map(|(_, desc)| desc);
        let tombstones = self.entries.len() - self.index.len();
        if self.entries.len() >= MIN_COMPACT_ENTRIES && tombstones > self.index.len() {
            self.compact();
        }
        removed
    }

    /// Live keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.iter().map(|(key, _)| key)
    }

    /// Live entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyDescriptor)> {
        self.entries.iter().flatten().map(|(key, desc)| (key, desc))
    }

    /// Number of slots held, tombstones included
    pub(crate) fn capacity_used(&self) -> usize {
        self.entries.len()
    }

    fn compact(&mut self) {
        self.entries.retain(Option::is_some);
        for (position, entry) in self.entries.iter().enumerate() {
            if let Some((key, _)) = entry
                && let Some(slot) = self.index.get_mut(key)
            {
                *slot = position;
            }
        }
    }
}

/// Whether adding `key` to `obj` through `[[Set]]` should first move `obj`
/// into dictionary mode.
pub(crate) fn should_enter_dictionary(obj: &JsObject, key: &PropertyKey, config: &ObjectModelConfig) -> bool {
    if !config.dictionary_objects || obj.kind() != ObjectKind::Ordinary {
        return false;
    }
    let state = obj.state();
    if state.dictionary.is_some() || key.is_hidden() {
        return false;
    }
    let count = state.shape.visible_property_count();
    if config.in_dictionary_window(count) {
        return true;
    }
    config.index_key_dictionary && count == 0 && key.is_index() && state.prototype.is_none()
}

/// Move `obj`'s ordinary properties into a dictionary map
pub(crate) fn make_dictionary(obj: &JsObject, reason: &str) {
    let mut state = obj.state_mut();
    if state.dictionary.is_some() {
        return;
    }
    let old_shape = state.shape.clone();

    let mut map = DictionaryMap::default();
    for (key, slot) in old_shape.properties() {
        if key.is_hidden() || slot.kind == SlotKind::ArrayLength {
            continue;
        }
        let value = state.slots.get(slot.location).cloned().unwrap_or_default();
        map.insert(key.clone(), value.to_descriptor(slot.attributes));
    }

    let new_shape = old_shape.to_dictionary();
    state.relayout(new_shape);
    old_shape.invalidate_assumptions();

    tracing::debug!(
        target: "otter::object",
        shape = old_shape.id(),
        properties = map.len(),
        reason,
        "object entered dictionary mode"
    );
    state.dictionary = Some(Box::new(map));
}

/// Rebuild a shape chain from `obj`'s dictionary map, in map order
pub(crate) fn make_ordinary(obj: &JsObject, reason: &str) {
    let mut state = obj.state_mut();
    let Some(map) = state.dictionary.take() else {
        return;
    };
    let dict_shape = state.shape.clone();

    let mut shape = Shape::root(dict_shape.kind());
    for (key, slot) in dict_shape.properties() {
        shape = shape.add_property(key.clone(), slot.attributes, slot.kind);
    }
    for (key, desc) in map.iter() {
        let kind = if desc.is_accessor() {
            SlotKind::Accessor
        } else {
            SlotKind::Data
        };
        shape = shape.add_property(key.clone(), desc.attributes(), kind);
    }
    if !dict_shape.is_extensible() {
        shape = shape.prevent_extensions();
    }

    let mut slots = SlotStorage::default();
    for (key, slot) in shape.properties() {
        let value = match map.get(key) {
            Some(desc) => SlotValue::from_descriptor(desc),
            None => dict_shape
                .lookup(key)
                .and_then(|old| state.slots.get(old.location))
                .cloned()
                .unwrap_or_default(),
        };
        slots.set(slot.location, value);
    }
    state.slots = slots;
    state.shape = shape;

    tracing::debug!(
        target: "otter::object",
        shape = state.shape.id(),
        properties = map.len(),
        reason,
        "object left dictionary mode"
    );
}
