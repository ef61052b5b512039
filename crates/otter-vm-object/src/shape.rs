//! Hidden Classes (Shapes) for property layout.
//!
//! A Shape describes the structure of an object: its kind, its
//! extensibility, and for every property the storage slot and attributes.
//! Shapes are immutable once built and shared between objects that reached
//! the same structure through the same transitions.
//!
//! Each shape caches its outgoing transitions. The cache is the only mutable
//! part of a shape and is safe to use from several threads at once: two
//! threads racing on the same transition end up with the same child, the
//! loser's candidate is dropped.

use crate::property::{PropertyAttributes, PropertyKey};
use bitflags::bitflags;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Weak};

/// Number of property slots stored inline in an object
pub const INLINE_SLOTS: usize = 4;

static NEXT_SHAPE_ID: AtomicU64 = AtomicU64::new(0);

/// Per-kind root shapes, shared process-wide
static ROOT_SHAPES: LazyLock<DashMap<ObjectKind, Arc<Shape>, FxBuildHasher>> =
    LazyLock::new(|| DashMap::with_hasher(FxBuildHasher));

/// Object kind tag carried by every shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array exotic object
    Array,
    /// Arguments object
    Arguments,
    /// Function object
    Function,
    /// ArrayBuffer
    ArrayBuffer,
    /// Integer-indexed exotic object
    TypedArray,
    /// Proxy exotic object
    Proxy,
}

bitflags! {
    /// Shape-level flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u8 {
        /// Properties may be added
        const EXTENSIBLE = 1 << 0;
        /// Ordinary properties live in the object's dictionary map
        const DICTIONARY = 1 << 1;
    }
}

/// Where a property's value lives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotLocation {
    /// One of the object's inline slots
    Inline(u8),
    /// Index into the overflow block
    Overflow(u32),
    /// Computed on read, no storage
    Virtual,
}

impl SlotLocation {
    fn for_slot(slot: usize) -> Self {
        if slot < INLINE_SLOTS {
            Self::Inline(slot as u8)
        } else {
            Self::Overflow((slot - INLINE_SLOTS) as u32)
        }
    }

    /// Position in the object's combined slot space
    pub fn slot_index(self) -> Option<usize> {
        match self {
            Self::Inline(i) => Some(i as usize),
            Self::Overflow(i) => Some(i as usize + INLINE_SLOTS),
            Self::Virtual => None,
        }
    }
}

/// What a slot holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Plain value
    Data,
    /// Getter/setter pair
    Accessor,
    /// Array `length`, computed from the element store
    ArrayLength,
}

/// Layout entry for one property
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertySlot {
    /// Storage location
    pub location: SlotLocation,
    /// Attributes
    pub attributes: PropertyAttributes,
    /// Slot kind
    pub kind: SlotKind,
}

/// An edge in the shape tree
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Append a property
    AddProperty {
        /// Key
        key: PropertyKey,
        /// Attributes
        attributes: PropertyAttributes,
        /// Slot kind
        kind: SlotKind,
    },
    /// Change attributes or kind of an existing property
    ChangeAttributes {
        /// Key
        key: PropertyKey,
        /// New attributes
        attributes: PropertyAttributes,
        /// New slot kind
        kind: SlotKind,
    },
    /// Remove a property
    RemoveProperty(PropertyKey),
    /// Clear the extensible flag
    PreventExtensions,
    /// Make every property non-configurable and clear extensible
    Seal,
    /// Seal and make every data property read-only
    Freeze,
    /// Move ordinary properties out to a dictionary map
    Dictionary,
}

/// A Shape defines the layout of properties in an object.
pub struct Shape {
    parent: Option<Arc<Shape>>,
    transition: Option<Transition>,
    kind: ObjectKind,
    flags: ShapeFlags,
    properties: IndexMap<PropertyKey, PropertySlot, FxBuildHasher>,
    slot_count: usize,
    transitions: DashMap<Transition, Weak<Shape>, FxBuildHasher>,
    stable: AtomicBool,
    id: u64,
}

impl Shape {
    fn new_shape(
        parent: Option<Arc<Shape>>,
        transition: Option<Transition>,
        kind: ObjectKind,
        flags: ShapeFlags,
        properties: IndexMap<PropertyKey, PropertySlot, FxBuildHasher>,
        slot_count: usize,
    ) -> Self {
        Self {
            parent,
            transition,
            kind,
            flags,
            properties,
            slot_count,
            transitions: DashMap::with_hasher(FxBuildHasher),
            stable: AtomicBool::new(true),
            id: NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The shared empty, extensible shape for `kind`
    pub fn root(kind: ObjectKind) -> Arc<Self> {
        if let Some(root) = ROOT_SHAPES.get(&kind) {
            return root.clone();
        }
        ROOT_SHAPES
            .entry(kind)
            .or_insert_with(|| {
                Arc::new(Self::new_shape(
                    None,
                    None,
                    kind,
                    ShapeFlags::EXTENSIBLE,
                    IndexMap::default(),
                    0,
                ))
            })
            .clone()
    }

    /// Object kind
    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Shape flags
    #[inline]
    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }

    /// Whether properties may be added
    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.flags.contains(ShapeFlags::EXTENSIBLE)
    }

    /// Whether ordinary properties live in a dictionary map
    #[inline]
    pub fn is_dictionary(&self) -> bool {
        self.flags.contains(ShapeFlags::DICTIONARY)
    }

    /// Parent shape
    pub fn parent(&self) -> Option<&Arc<Shape>> {
        self.parent.as_ref()
    }

    /// The transition that produced this shape
    pub fn creating_transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// Unique id, for diagnostics
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Layout entry for `key`
    #[inline]
    pub fn lookup(&self, key: &PropertyKey) -> Option<PropertySlot> {
        self.properties.get(key).copied()
    }

    /// All properties in insertion order
    pub fn properties(&self) -> impl Iterator<Item = (&PropertyKey, &PropertySlot)> {
        self.properties.iter()
    }

    /// Keys in insertion order, hidden keys excluded
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.properties
            .keys()
            .filter(|k| !k.is_hidden())
            .cloned()
            .collect()
    }

    /// Number of properties, hidden ones included
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Number of script-visible properties
    pub fn visible_property_count(&self) -> usize {
        self.properties.keys().filter(|k| !k.is_hidden()).count()
    }

    /// Number of storage slots objects of this shape need
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Whether property-presence assumptions keyed on this shape still hold
    pub fn is_stable(&self) -> bool {
        self.stable.load(Ordering::Acquire)
    }

    /// Drop property-presence assumptions keyed on this shape
    pub fn invalidate_assumptions(&self) {
        self.stable.store(false, Ordering::Release);
    }

    /// Number of live cached transitions
    pub fn cached_transition_count(&self) -> usize {
        self.transitions
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Append a property
    pub fn add_property(
        self: &Arc<Self>,
        key: PropertyKey,
        attributes: PropertyAttributes,
        kind: SlotKind,
    ) -> Arc<Self> {
        self.transition(Transition::AddProperty {
            key,
            attributes,
            kind,
        })
    }

    /// Change the attributes or kind of an existing property
    pub fn change_attributes(
        self: &Arc<Self>,
        key: PropertyKey,
        attributes: PropertyAttributes,
        kind: SlotKind,
    ) -> Arc<Self> {
        match self.lookup(&key) {
            Some(slot) if slot.attributes == attributes && slot.kind == kind => self.clone(),
            _ => self.transition(Transition::ChangeAttributes {
                key,
                attributes,
                kind,
            }),
        }
    }

    /// Remove a property
    pub fn remove_property(self: &Arc<Self>, key: &PropertyKey) -> Arc<Self> {
        if self.lookup(key).is_none() {
            return self.clone();
        }
        self.transition(Transition::RemoveProperty(key.clone()))
    }

    /// Clear the extensible flag
    pub fn prevent_extensions(self: &Arc<Self>) -> Arc<Self> {
        if !self.is_extensible() {
            return self.clone();
        }
        self.transition(Transition::PreventExtensions)
    }

    /// Seal: every property non-configurable, not extensible
    pub fn seal(self: &Arc<Self>) -> Arc<Self> {
        self.transition(Transition::Seal)
    }

    /// Freeze: sealed and every data property read-only
    pub fn freeze(self: &Arc<Self>) -> Arc<Self> {
        self.transition(Transition::Freeze)
    }

    /// The dictionary-mode counterpart of this shape.
    ///
    /// Only hidden properties stay in the resulting shape; the caller moves
    /// the rest into the object's dictionary map.
    pub fn to_dictionary(self: &Arc<Self>) -> Arc<Self> {
        if self.is_dictionary() {
            return self.clone();
        }
        self.transition(Transition::Dictionary)
    }

    /// Follow (or create and cache) the transition `t`
    pub fn transition(self: &Arc<Self>, t: Transition) -> Arc<Self> {
        if let Some(existing) = self.transitions.get(&t).and_then(|w| w.upgrade()) {
            return existing;
        }

        tracing::trace!(
            target: "otter::object",
            shape = self.id,
            transition = ?t,
            "shape transition cache miss"
        );
        let candidate = self.derive(&t);

        match self.transitions.entry(t) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(winner) => winner,
                None => {
                    entry.insert(Arc::downgrade(&candidate));
                    candidate
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(&candidate));
                candidate
            }
        }
    }

    fn child(
        self: &Arc<Self>,
        t: &Transition,
        flags: ShapeFlags,
        properties: IndexMap<PropertyKey, PropertySlot, FxBuildHasher>,
        slot_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self::new_shape(
            Some(self.clone()),
            Some(t.clone()),
            self.kind,
            flags,
            properties,
            slot_count,
        ))
    }

    fn derive(self: &Arc<Self>, t: &Transition) -> Arc<Self> {
        match t {
            Transition::AddProperty {
                key,
                attributes,
                kind,
            } => {
                let mut properties = self.properties.clone();
                let (location, slot_count) = match kind {
                    SlotKind::ArrayLength => (SlotLocation::Virtual, self.slot_count),
                    _ => (SlotLocation::for_slot(self.slot_count), self.slot_count + 1),
                };
                properties.insert(
                    key.clone(),
                    PropertySlot {
                        location,
                        attributes: *attributes,
                        kind: *kind,
                    },
                );
                self.child(t, self.flags, properties, slot_count)
            }
            Transition::ChangeAttributes {
                key,
                attributes,
                kind,
            } => {
                let mut properties = self.properties.clone();
                if let Some(slot) = properties.get_mut(key) {
                    slot.attributes = *attributes;
                    slot.kind = *kind;
                }
                self.child(t, self.flags, properties, self.slot_count)
            }
            Transition::RemoveProperty(key) => self.replay_without(key),
            Transition::PreventExtensions => self.child(
                t,
                self.flags - ShapeFlags::EXTENSIBLE,
                self.properties.clone(),
                self.slot_count,
            ),
            Transition::Seal | Transition::Freeze => {
                let freeze = matches!(t, Transition::Freeze);
                let mut properties = self.properties.clone();
                for slot in properties.values_mut() {
                    slot.attributes.remove(PropertyAttributes::CONFIGURABLE);
                    if freeze && slot.kind != SlotKind::Accessor {
                        slot.attributes.remove(PropertyAttributes::WRITABLE);
                    }
                }
                self.child(
                    t,
                    self.flags - ShapeFlags::EXTENSIBLE,
                    properties,
                    self.slot_count,
                )
            }
            Transition::Dictionary => {
                if self.parent.is_none() {
                    return self.child(
                        t,
                        self.flags | ShapeFlags::DICTIONARY,
                        IndexMap::default(),
                        0,
                    );
                }
                let mut shape = Shape::root(self.kind).to_dictionary();
                for (key, slot) in self.properties.iter().filter(|(k, _)| k.is_hidden()) {
                    shape = shape.add_property(key.clone(), slot.attributes, slot.kind);
                }
                if !self.is_extensible() {
                    shape = shape.prevent_extensions();
                }
                shape
            }
        }
    }

    /// Rebuild this shape's transition path from the root, skipping every
    /// step that touched `removed`. Slots of later properties shift down.
    fn replay_without(self: &Arc<Self>, removed: &PropertyKey) -> Arc<Self> {
        let mut steps = Vec::new();
        let mut cursor = self.clone();
        while let (Some(parent), Some(t)) = (cursor.parent.clone(), cursor.transition.clone()) {
            steps.push(t);
            cursor = parent;
        }

        let mut shape = cursor;
        for step in steps.into_iter().rev() {
            match &step {
                Transition::AddProperty { key, .. } | Transition::ChangeAttributes { key, .. }
                    if key == removed =>
                {
                    continue;
                }
                _ => shape = shape.transition(step),
            }
        }
        shape
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("property_count", &self.property_count())
            .finish()
    }
}
