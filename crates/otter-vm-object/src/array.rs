//! Array element storage.
//!
//! Elements live in one of several representations, picked by what has been
//! written so far:
//!
//! - `Empty`: nothing stored yet
//! - `PackedInt` / `PackedDouble` / `PackedObject`: a contiguous run with no
//!   holes, specialized by element type
//! - `Holes`: a contiguous run that may contain holes
//! - `Sparse`: an ordered map, used for far-apart indices and for elements
//!   with non-default attributes or accessors
//! - `Lazy`: elements produced on demand from a regex match result
//!
//! Contiguous stores describe a window: `used_length` physical slots starting
//! at `array_offset` hold logical indices `index_offset ..
//! index_offset + used_length`. Removing the first element only moves the
//! window, so `shift` does not copy.
//!
//! Transitions are one-way towards generality: int → double → object,
//! packed → holes → sparse. Nothing ever converts back.

use crate::config::ObjectModelConfig;
use crate::error::{VmResult, reject};
use crate::object::SlotValue;
use crate::property::{PropertyAttributes, PropertyDescriptor};
use crate::value::Value;
use bitflags::bitflags;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Highest index a contiguous store accepts (2^32 - 2)
pub const MAX_DENSE_INDEX: u64 = u32::MAX as u64 - 1;

/// Largest length the element API accepts (2^53 - 1)
pub const MAX_SAFE_LENGTH: u64 = (1 << 53) - 1;

/// Dead slots at the front of a window are compacted away past this count
const COMPACT_THRESHOLD: usize = 32;

/// Capture groups of a regex match, read on demand
pub trait MatchResult: Send + Sync + fmt::Debug {
    /// Number of elements (match plus groups)
    fn group_count(&self) -> usize;

    /// Element `index`, `None` for an unmatched group
    fn group(&self, index: usize) -> Option<Value>;
}

/// Storage strategy tag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayStoreKind {
    /// No elements stored
    Empty,
    /// Contiguous `i32` elements
    PackedInt,
    /// Contiguous `f64` elements
    PackedDouble,
    /// Contiguous arbitrary values
    PackedObject,
    /// Contiguous values with holes
    Holes,
    /// Ordered map
    Sparse,
    /// Lazily materialized match result
    Lazy,
}

/// A sparse element with its own attributes
#[derive(Clone, Debug, PartialEq)]
pub struct SparseElement {
    /// Value or accessor pair
    pub value: SlotValue,
    /// Attributes
    pub attributes: PropertyAttributes,
}

#[derive(Debug)]
enum ArrayStore {
    Empty,
    PackedInt(Vec<i32>),
    PackedDouble(Vec<f64>),
    PackedObject(Vec<Value>),
    Holes(Vec<Option<Value>>),
    Sparse(BTreeMap<u64, SparseElement>),
    Lazy(Arc<dyn MatchResult>),
}

impl ArrayStore {
    fn kind(&self) -> ArrayStoreKind {
        match self {
            Self::Empty => ArrayStoreKind::Empty,
            Self::PackedInt(_) => ArrayStoreKind::PackedInt,
            Self::PackedDouble(_) => ArrayStoreKind::PackedDouble,
            Self::PackedObject(_) => ArrayStoreKind::PackedObject,
            Self::Holes(_) => ArrayStoreKind::Holes,
            Self::Sparse(_) => ArrayStoreKind::Sparse,
            Self::Lazy(_) => ArrayStoreKind::Lazy,
        }
    }

    fn is_contiguous(&self) -> bool {
        matches!(
            self,
            Self::PackedInt(_) | Self::PackedDouble(_) | Self::PackedObject(_) | Self::Holes(_)
        )
    }
}

bitflags! {
    /// Integrity state of an array's elements
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ArrayFlags: u8 {
        /// No new elements
        const NOT_EXTENSIBLE = 1 << 0;
        /// Elements are non-configurable
        const SEALED = 1 << 1;
        /// Elements are read-only
        const FROZEN = 1 << 2;
        /// `length` is read-only
        const LENGTH_NOT_WRITABLE = 1 << 3;
    }
}

/// Element storage and length of one array
#[derive(Debug)]
pub struct ArrayElements {
    store: ArrayStore,
    length: u64,
    used_length: u64,
    hole_count: u64,
    index_offset: u64,
    array_offset: usize,
    flags: ArrayFlags,
    max_hole_gap: u64,
}

fn classify(values: &[Value]) -> ArrayStoreKind {
    if values.is_empty() {
        ArrayStoreKind::Empty
    } else if values.iter().all(|v| matches!(v, Value::Int32(_))) {
        ArrayStoreKind::PackedInt
    } else if values.iter().all(Value::is_number) {
        ArrayStoreKind::PackedDouble
    } else {
        ArrayStoreKind::PackedObject
    }
}

fn packed_store(values: Vec<Value>) -> ArrayStore {
    match classify(&values) {
        ArrayStoreKind::Empty => ArrayStore::Empty,
        ArrayStoreKind::PackedInt => ArrayStore::PackedInt(
            values.iter().filter_map(Value::as_int32).collect(),
        ),
        ArrayStoreKind::PackedDouble => ArrayStore::PackedDouble(
            values.iter().filter_map(Value::as_number).collect(),
        ),
        _ => ArrayStore::PackedObject(values),
    }
}

impl Default for ArrayElements {
    fn default() -> Self {
        Self::with_length(0)
    }
}

impl ArrayElements {
    /// Empty storage with the given length (all holes), tuned from
    /// `ObjectModelConfig::default()`. Array objects re-apply their context's
    /// config before every write; standalone storage should use
    /// [`ArrayElements::with_config`] or call [`ArrayElements::configure`].
    pub fn with_length(length: u64) -> Self {
        Self {
            store: ArrayStore::Empty,
            length,
            used_length: 0,
            hole_count: 0,
            index_offset: 0,
            array_offset: 0,
            flags: ArrayFlags::empty(),
            max_hole_gap: ObjectModelConfig::default().max_hole_gap,
        }
    }

    /// Empty storage with the given length, tuned from `config`
    pub fn with_config(length: u64, config: &ObjectModelConfig) -> Self {
        let mut elements = Self::with_length(length);
        elements.configure(config);
        elements
    }

    /// Storage for an array literal without elisions
    pub fn from_values(values: Vec<Value>) -> Self {
        let length = values.len() as u64;
        let mut elements = Self::with_length(length);
        elements.used_length = length;
        elements.store = packed_store(values);
        elements
    }

    /// Storage for an array literal with elisions (`None` is a hole)
    pub fn from_holes(values: Vec<Option<Value>>) -> Self {
        let length = values.len() as u64;
        let Some(first) = values.iter().position(Option::is_some) else {
            return Self::with_length(length);
        };
        let last = values.iter().rposition(Option::is_some).unwrap_or(first);
        let window: Vec<Option<Value>> = values[first..=last].to_vec();
        let holes = window.iter().filter(|v| v.is_none()).count() as u64;

        let mut elements = Self::with_length(length);
        elements.index_offset = first as u64;
        elements.used_length = window.len() as u64;
        if holes == 0 {
            elements.store = packed_store(window.into_iter().flatten().collect());
        } else {
            elements.hole_count = holes;
            elements.store = ArrayStore::Holes(window);
        }
        elements
    }

    /// Storage backed by a regex match result
    pub fn lazy(result: Arc<dyn MatchResult>) -> Self {
        let count = result.group_count() as u64;
        let mut elements = Self::with_length(count);
        elements.used_length = count;
        elements.store = ArrayStore::Lazy(result);
        elements
    }

    /// Apply tuning knobs from the configuration
    pub fn configure(&mut self, config: &ObjectModelConfig) {
        self.max_hole_gap = config.max_hole_gap;
    }

    /// Current strategy
    pub fn store_kind(&self) -> ArrayStoreKind {
        self.store.kind()
    }

    /// `length`
    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Physical slots in use (contiguous and lazy stores)
    pub fn used_length(&self) -> u64 {
        self.used_length
    }

    /// Holes inside the used window
    pub fn hole_count(&self) -> u64 {
        self.hole_count
    }

    /// Logical index of the first used slot
    pub fn index_offset(&self) -> u64 {
        self.index_offset
    }

    /// Physical position of the first used slot
    pub fn array_offset(&self) -> usize {
        self.array_offset
    }

    /// Integrity flags
    pub fn flags(&self) -> ArrayFlags {
        self.flags
    }

    /// New elements may be added
    pub fn is_extensible(&self) -> bool {
        !self.flags.intersects(ArrayFlags::NOT_EXTENSIBLE | ArrayFlags::SEALED | ArrayFlags::FROZEN)
    }

    /// `length` may change
    pub fn is_length_writable(&self) -> bool {
        !self.flags.contains(ArrayFlags::LENGTH_NOT_WRITABLE)
    }

    /// Attributes of elements in dense stores
    pub fn default_attributes(&self) -> PropertyAttributes {
        let mut attributes = PropertyAttributes::data();
        if self.flags.contains(ArrayFlags::SEALED) {
            attributes.remove(PropertyAttributes::CONFIGURABLE);
        }
        if self.flags.contains(ArrayFlags::FROZEN) {
            attributes.remove(PropertyAttributes::WRITABLE);
        }
        attributes
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    fn window_pos(&self, index: u64) -> Option<usize> {
        let end = self.index_offset + self.used_length;
        (index >= self.index_offset && index < end)
            .then(|| self.array_offset + (index - self.index_offset) as usize)
    }

    fn read_at(&self, pos: usize) -> Option<Value> {
        match &self.store {
            ArrayStore::PackedInt(v) => v.get(pos).map(|n| Value::int32(*n)),
            ArrayStore::PackedDouble(v) => v.get(pos).map(|n| Value::number(*n)),
            ArrayStore::PackedObject(v) => v.get(pos).cloned(),
            ArrayStore::Holes(v) => v.get(pos).cloned().flatten(),
            _ => None,
        }
    }

    /// Element slot and attributes at `index`
    pub fn element_slot(&self, index: u64) -> Option<(SlotValue, PropertyAttributes)> {
        match &self.store {
            ArrayStore::Empty => None,
            ArrayStore::Sparse(map) => map
                .get(&index)
                .map(|e| (e.value.clone(), e.attributes)),
            ArrayStore::Lazy(result) => (index < result.group_count() as u64).then(|| {
                let value = result.group(index as usize).unwrap_or_default();
                (SlotValue::Data(value), self.default_attributes())
            }),
            _ => {
                let pos = self.window_pos(index)?;
                self.read_at(pos)
                    .map(|v| (SlotValue::Data(v), self.default_attributes()))
            }
        }
    }

    /// Data value at `index`. Accessor elements read as absent here; go
    /// through [`Self::element_slot`] for them.
    pub fn get_element(&self, index: u64) -> Option<Value> {
        match self.element_slot(index)? {
            (SlotValue::Data(value), _) => Some(value),
            (SlotValue::Accessor { .. }, _) => None,
        }
    }

    /// Property descriptor for the element at `index`
    pub fn element_descriptor(&self, index: u64) -> Option<PropertyDescriptor> {
        self.element_slot(index)
            .map(|(slot, attributes)| slot.to_descriptor(attributes))
    }

    /// Whether an element exists at `index`
    pub fn has_element(&self, index: u64) -> bool {
        match &self.store {
            ArrayStore::Empty => false,
            ArrayStore::Sparse(map) => map.contains_key(&index),
            ArrayStore::Lazy(result) => index < result.group_count() as u64,
            ArrayStore::Holes(v) => self
                .window_pos(index)
                .is_some_and(|pos| v.get(pos).is_some_and(Option::is_some)),
            _ => self.window_pos(index).is_some(),
        }
    }

    // ------------------------------------------------------------------
    // Iteration cursors
    // ------------------------------------------------------------------

    /// Lowest present index
    pub fn first_element_index(&self) -> Option<u64> {
        match &self.store {
            ArrayStore::Empty => None,
            ArrayStore::Sparse(map) => map.keys().next().copied(),
            ArrayStore::Lazy(_) => (self.used_length > 0).then_some(0),
            _ => (self.used_length > 0).then_some(self.index_offset),
        }
    }

    /// Highest present index
    pub fn last_element_index(&self) -> Option<u64> {
        match &self.store {
            ArrayStore::Empty => None,
            ArrayStore::Sparse(map) => map.keys().next_back().copied(),
            _ => (self.used_length > 0).then(|| self.index_offset + self.used_length - 1),
        }
    }

    /// Lowest present index greater than `index`
    pub fn next_element_index(&self, index: u64) -> Option<u64> {
        let from = index.checked_add(1)?;
        match &self.store {
            ArrayStore::Empty => None,
            ArrayStore::Sparse(map) => map.range(from..).next().map(|(k, _)| *k),
            ArrayStore::Holes(_) => {
                let last = self.last_element_index()?;
                (from.max(self.index_offset)..=last).find(|i| self.has_element(*i))
            }
            _ => {
                let last = self.last_element_index()?;
                let candidate = from.max(self.index_offset);
                (candidate <= last).then_some(candidate)
            }
        }
    }

    /// Highest present index lower than `index`
    pub fn previous_element_index(&self, index: u64) -> Option<u64> {
        let before = index.checked_sub(1)?;
        match &self.store {
            ArrayStore::Empty => None,
            ArrayStore::Sparse(map) => map.range(..index).next_back().map(|(k, _)| *k),
            ArrayStore::Holes(_) => {
                let last = self.last_element_index()?;
                let first = self.first_element_index()?;
                if before < first {
                    return None;
                }
                (first..=before.min(last)).rev().find(|i| self.has_element(*i))
            }
            _ => {
                let first = self.first_element_index()?;
                let last = self.last_element_index()?;
                (before >= first).then(|| before.min(last))
            }
        }
    }

    /// Present indices in ascending order
    pub fn element_indices(&self) -> Vec<u64> {
        let mut indices = Vec::new();
        let mut cursor = self.first_element_index();
        while let Some(index) = cursor {
            indices.push(index);
            cursor = self.next_element_index(index);
        }
        indices
    }

    // ------------------------------------------------------------------
    // Strategy transitions
    // ------------------------------------------------------------------

    fn replace_store(&mut self, store: ArrayStore) {
        let from = self.store.kind();
        let to = store.kind();
        if from != to {
            tracing::debug!(
                target: "otter::object",
                from = ?from,
                to = ?to,
                length = self.length,
                "array storage transition"
            );
        }
        self.store = store;
    }

    /// Present values of the used window, holes as `None`
    fn window_values(&self) -> Vec<Option<Value>> {
        let start = self.array_offset;
        let end = start + self.used_length as usize;
        match &self.store {
            ArrayStore::PackedInt(v) => v[start..end].iter().map(|n| Some(Value::int32(*n))).collect(),
            ArrayStore::PackedDouble(v) => v[start..end].iter().map(|n| Some(Value::number(*n))).collect(),
            ArrayStore::PackedObject(v) => v[start..end].iter().cloned().map(Some).collect(),
            ArrayStore::Holes(v) => v[start..end].to_vec(),
            ArrayStore::Lazy(result) => (0..result.group_count())
                .map(|i| Some(result.group(i).unwrap_or_default()))
                .collect(),
            ArrayStore::Empty | ArrayStore::Sparse(_) => Vec::new(),
        }
    }

    fn materialize(&mut self) {
        if let ArrayStore::Lazy(_) = self.store {
            let values: Vec<Value> = self.window_values().into_iter().flatten().collect();
            self.index_offset = 0;
            self.array_offset = 0;
            self.used_length = values.len() as u64;
            let store = if values.is_empty() {
                ArrayStore::Empty
            } else {
                ArrayStore::PackedObject(values)
            };
            self.replace_store(store);
        }
    }

    fn to_double(&mut self) {
        if let ArrayStore::PackedInt(v) = &self.store {
            let doubles = v.iter().map(|n| *n as f64).collect();
            self.replace_store(ArrayStore::PackedDouble(doubles));
        }
    }

    fn to_object(&mut self) {
        if matches!(self.store, ArrayStore::PackedInt(_) | ArrayStore::PackedDouble(_)) {
            let values = self.window_values().into_iter().flatten().collect();
            self.array_offset = 0;
            self.replace_store(ArrayStore::PackedObject(values));
        }
    }

    fn to_holes(&mut self) {
        if matches!(
            self.store,
            ArrayStore::PackedInt(_) | ArrayStore::PackedDouble(_) | ArrayStore::PackedObject(_)
        ) {
            let values = self.window_values();
            self.array_offset = 0;
            self.replace_store(ArrayStore::Holes(values));
        }
    }

    fn to_sparse(&mut self) {
        if let ArrayStore::Sparse(_) = self.store {
            return;
        }
        let attributes = self.default_attributes();
        let mut map = BTreeMap::new();
        for (i, value) in self.window_values().into_iter().enumerate() {
            if let Some(value) = value {
                map.insert(
                    self.index_offset + i as u64,
                    SparseElement {
                        value: SlotValue::Data(value),
                        attributes,
                    },
                );
            }
        }
        self.used_length = 0;
        self.hole_count = 0;
        self.index_offset = 0;
        self.array_offset = 0;
        self.replace_store(ArrayStore::Sparse(map));
    }

    /// Widen the element type so `value` fits
    fn generalize_for(&mut self, value: &Value) {
        match &self.store {
            ArrayStore::PackedInt(_) if !matches!(value, Value::Int32(_)) => {
                if value.is_number() {
                    self.to_double();
                } else {
                    self.to_object();
                }
            }
            ArrayStore::PackedDouble(_) if !value.is_number() => self.to_object(),
            _ => {}
        }
    }

    fn reset_to_empty(&mut self) {
        self.used_length = 0;
        self.hole_count = 0;
        self.index_offset = 0;
        self.array_offset = 0;
        self.replace_store(ArrayStore::Empty);
    }

    fn compact_front(&mut self) {
        let dead = self.array_offset;
        if dead == 0 {
            return;
        }
        match &mut self.store {
            ArrayStore::PackedInt(v) => drop(v.drain(..dead)),
            ArrayStore::PackedDouble(v) => drop(v.drain(..dead)),
            ArrayStore::PackedObject(v) => drop(v.drain(..dead)),
            ArrayStore::Holes(v) => drop(v.drain(..dead)),
            _ => {}
        }
        self.array_offset = 0;
    }

    // ------------------------------------------------------------------
    // Raw writes (checks already done)
    // ------------------------------------------------------------------

    fn put_at(&mut self, pos: usize, value: Value) {
        match &mut self.store {
            ArrayStore::PackedInt(v) => {
                if let Some(n) = value.as_int32() {
                    v[pos] = n;
                }
            }
            ArrayStore::PackedDouble(v) => {
                if let Some(n) = value.as_number() {
                    v[pos] = n;
                }
            }
            ArrayStore::PackedObject(v) => v[pos] = value,
            ArrayStore::Holes(v) => {
                if v[pos].is_none() {
                    self.hole_count -= 1;
                }
                v[pos] = Some(value);
            }
            _ => {}
        }
    }

    fn push_back(&mut self, value: Value) {
        match &mut self.store {
            ArrayStore::PackedInt(v) => v.push(value.as_int32().unwrap_or_default()),
            ArrayStore::PackedDouble(v) => v.push(value.as_number().unwrap_or(f64::NAN)),
            ArrayStore::PackedObject(v) => v.push(value),
            ArrayStore::Holes(v) => v.push(Some(value)),
            _ => {}
        }
    }

    fn push_holes(&mut self, count: u64) {
        if let ArrayStore::Holes(v) = &mut self.store {
            v.extend(std::iter::repeat_n(None, count as usize));
            self.hole_count += count;
        }
    }

    fn store_data(&mut self, index: u64, value: Value) {
        let attributes = self.default_attributes();
        match &mut self.store {
            ArrayStore::Sparse(map) => {
                map.entry(index)
                    .and_modify(|e| e.value = SlotValue::Data(value.clone()))
                    .or_insert(SparseElement {
                        value: SlotValue::Data(value),
                        attributes,
                    });
            }
            ArrayStore::Lazy(_) => {
                self.materialize();
                self.store_data(index, value);
            }
            ArrayStore::Empty => {
                if index > MAX_DENSE_INDEX {
                    self.to_sparse();
                    self.store_data(index, value);
                    return;
                }
                self.index_offset = index;
                self.array_offset = 0;
                self.used_length = 1;
                self.hole_count = 0;
                self.replace_store(packed_store(vec![value]));
            }
            _ => self.store_contiguous(index, value),
        }
    }

    fn store_contiguous(&mut self, index: u64, value: Value) {
        if index > MAX_DENSE_INDEX {
            self.to_sparse();
            self.store_data(index, value);
            return;
        }
        let start = self.index_offset;
        let end = start + self.used_length;

        if self.window_pos(index).is_some() {
            self.generalize_for(&value);
            if let Some(pos) = self.window_pos(index) {
                self.put_at(pos, value);
            }
            return;
        }

        if index >= end {
            let gap = index - end;
            if gap > self.max_hole_gap && gap > self.used_length {
                self.to_sparse();
                self.store_data(index, value);
                return;
            }
            if gap > 0 {
                self.to_holes();
            }
            self.generalize_for(&value);
            self.push_holes(gap);
            self.push_back(value);
            self.used_length += gap + 1;
            return;
        }

        // index < start
        let gap = start - index - 1;
        if gap > self.max_hole_gap && gap > self.used_length {
            self.to_sparse();
            self.store_data(index, value);
            return;
        }
        if gap == 0 && self.array_offset > 0 {
            self.generalize_for(&value);
            if self.array_offset > 0 {
                self.array_offset -= 1;
                let pos = self.array_offset;
                if let ArrayStore::Holes(v) = &mut self.store {
                    v[pos] = None;
                    self.hole_count += 1;
                }
                self.put_at(pos, value);
                self.index_offset -= 1;
                self.used_length += 1;
                return;
            }
        }
        if gap > 0 {
            self.to_holes();
        }
        self.generalize_for(&value);
        self.compact_front();
        let prefix = gap as usize + 1;
        match &mut self.store {
            ArrayStore::PackedInt(v) => {
                v.insert(0, value.as_int32().unwrap_or_default());
            }
            ArrayStore::PackedDouble(v) => {
                v.insert(0, value.as_number().unwrap_or(f64::NAN));
            }
            ArrayStore::PackedObject(v) => v.insert(0, value),
            ArrayStore::Holes(v) => {
                let mut front = Vec::with_capacity(prefix + v.len());
                front.push(Some(value));
                front.extend(std::iter::repeat_n(None, gap as usize));
                front.append(v);
                *v = front;
                self.hole_count += gap;
            }
            _ => {}
        }
        self.index_offset = index;
        self.used_length += gap + 1;
    }

    fn trim_trailing_holes(&mut self) {
        if let ArrayStore::Holes(v) = &mut self.store {
            while self.used_length > 0 && v.last().is_some_and(Option::is_none) {
                v.pop();
                self.used_length -= 1;
                self.hole_count -= 1;
            }
        }
    }

    fn trim_leading_holes(&mut self) {
        if let ArrayStore::Holes(v) = &self.store {
            while self.used_length > 0 && v.get(self.array_offset).is_some_and(Option::is_none) {
                self.array_offset += 1;
                self.index_offset += 1;
                self.used_length -= 1;
                self.hole_count -= 1;
            }
        }
    }

    fn after_front_removal(&mut self) {
        self.trim_leading_holes();
        if self.used_length == 0 {
            self.reset_to_empty();
        } else if self.array_offset > COMPACT_THRESHOLD && self.array_offset > self.used_length as usize {
            self.compact_front();
        }
    }

    fn remove_element(&mut self, index: u64) {
        match &mut self.store {
            ArrayStore::Empty => {}
            ArrayStore::Sparse(map) => {
                map.remove(&index);
            }
            ArrayStore::Lazy(_) => {
                self.materialize();
                self.remove_element(index);
            }
            _ => {
                if !self.has_element(index) {
                    return;
                }
                let Some(pos) = self.window_pos(index) else {
                    return;
                };
                let last = self.index_offset + self.used_length - 1;
                if index == last {
                    match &mut self.store {
                        ArrayStore::PackedInt(v) => v.truncate(pos),
                        ArrayStore::PackedDouble(v) => v.truncate(pos),
                        ArrayStore::PackedObject(v) => v.truncate(pos),
                        ArrayStore::Holes(v) => v.truncate(pos),
                        _ => {}
                    }
                    self.used_length -= 1;
                    self.trim_trailing_holes();
                    if self.used_length == 0 {
                        self.reset_to_empty();
                    }
                } else if index == self.index_offset {
                    self.array_offset += 1;
                    self.index_offset += 1;
                    self.used_length -= 1;
                    self.after_front_removal();
                } else {
                    self.to_holes();
                    let pos = self.window_pos(index).unwrap_or(pos);
                    if let ArrayStore::Holes(v) = &mut self.store {
                        v[pos] = None;
                        self.hole_count += 1;
                    }
                }
            }
        }
    }

    fn truncate(&mut self, new_length: u64) {
        match &mut self.store {
            ArrayStore::Empty => {}
            ArrayStore::Sparse(map) => {
                map.split_off(&new_length);
            }
            ArrayStore::Lazy(_) => {
                if new_length < self.used_length {
                    self.materialize();
                    self.truncate(new_length);
                }
            }
            _ => {
                if new_length <= self.index_offset {
                    self.reset_to_empty();
                    return;
                }
                let keep = new_length - self.index_offset;
                if keep >= self.used_length {
                    return;
                }
                let cut = self.array_offset + keep as usize;
                match &mut self.store {
                    ArrayStore::PackedInt(v) => v.truncate(cut),
                    ArrayStore::PackedDouble(v) => v.truncate(cut),
                    ArrayStore::PackedObject(v) => v.truncate(cut),
                    ArrayStore::Holes(v) => {
                        let removed_holes = v[cut..].iter().filter(|e| e.is_none()).count() as u64;
                        v.truncate(cut);
                        self.hole_count -= removed_holes;
                    }
                    _ => {}
                }
                self.used_length = keep;
                self.trim_trailing_holes();
                if self.used_length == 0 {
                    self.reset_to_empty();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Checked element operations
    // ------------------------------------------------------------------

    /// `array[index] = value`.
    ///
    /// Fails on read-only elements, on new elements of a non-extensible
    /// array and past a read-only `length`; `strict` turns failure into a
    /// `TypeError`.
    pub fn set_element(&mut self, index: u64, value: Value, strict: bool) -> VmResult<bool> {
        match self.element_slot(index) {
            Some((SlotValue::Accessor { .. }, _)) => {
                return reject(strict, || format!("Cannot assign to accessor element '{index}' without a context"));
            }
            Some((_, attributes)) if !attributes.writable() => {
                return reject(strict, || format!("Cannot assign to read only property '{index}' of object '[object Array]'"));
            }
            Some(_) => {}
            None => {
                if !self.is_extensible() {
                    return reject(strict, || format!("Cannot add property {index}, object is not extensible"));
                }
                if index >= self.length && !self.is_length_writable() {
                    return reject(strict, || format!("Cannot add property {index}, array length is read-only"));
                }
                if index >= MAX_SAFE_LENGTH {
                    return Err(crate::error::VmError::range_error("Invalid array index"));
                }
            }
        }
        self.store_data(index, value);
        if index >= self.length {
            self.length = index + 1;
        }
        Ok(true)
    }

    /// Store an already-validated element with explicit attributes.
    ///
    /// Anything but a plain data element with the array's default
    /// attributes moves the array to sparse storage.
    pub fn define_element(&mut self, index: u64, value: SlotValue, attributes: PropertyAttributes) {
        let plain = matches!(value, SlotValue::Data(_)) && attributes == self.default_attributes();
        match value {
            SlotValue::Data(data) if plain && !matches!(self.store, ArrayStore::Sparse(_)) => {
                self.store_data(index, data);
            }
            value => {
                self.materialize();
                self.to_sparse();
                if let ArrayStore::Sparse(map) = &mut self.store {
                    map.insert(index, SparseElement { value, attributes });
                }
            }
        }
        if index >= self.length {
            self.length = index + 1;
        }
    }

    /// `delete array[index]`; non-configurable elements fail
    pub fn delete_element(&mut self, index: u64, strict: bool) -> VmResult<bool> {
        match self.element_slot(index) {
            None => Ok(true),
            Some((_, attributes)) if !attributes.configurable() => {
                reject(strict, || format!("Cannot delete property '{index}' of [object Array]"))
            }
            Some(_) => {
                self.remove_element(index);
                Ok(true)
            }
        }
    }

    /// `array.length = new_length`.
    ///
    /// Shrinking deletes elements from the top down and stops at the first
    /// non-configurable one, leaving `length` just above it and reporting
    /// failure.
    pub fn set_length(&mut self, new_length: u64, strict: bool) -> VmResult<bool> {
        if new_length == self.length {
            return Ok(true);
        }
        if !self.is_length_writable() {
            return reject(strict, || "Cannot assign to read only property 'length' of object '[object Array]'".to_string());
        }
        if new_length > self.length {
            self.length = new_length;
            return Ok(true);
        }

        let may_pin = self.flags.contains(ArrayFlags::SEALED) || matches!(self.store, ArrayStore::Sparse(_));
        if may_pin {
            while let Some(index) = self.last_element_index() {
                if index < new_length {
                    break;
                }
                let configurable = self
                    .element_slot(index)
                    .is_some_and(|(_, attributes)| attributes.configurable());
                if !configurable {
                    self.length = index + 1;
                    return reject(strict, || format!("Cannot delete property '{index}' of [object Array]"));
                }
                self.remove_element(index);
            }
        } else {
            self.truncate(new_length);
        }
        self.length = new_length;
        Ok(true)
    }

    /// Append at `length`
    pub fn push(&mut self, value: Value) -> VmResult<u64> {
        self.set_element(self.length, value, true)?;
        Ok(self.length)
    }

    /// Remove index 0 and move every element down by one, without copying
    /// contiguous storage. Returns the removed element (`undefined` for a
    /// hole or an empty array).
    ///
    /// Only valid on extensible arrays with a writable `length`; callers
    /// fall back to the generic algorithm otherwise.
    pub fn shift(&mut self) -> Value {
        if self.length == 0 {
            return Value::undefined();
        }
        self.materialize();
        let mut removed = Value::undefined();
        match &mut self.store {
            ArrayStore::Empty => {}
            ArrayStore::Sparse(map) => {
                let old = std::mem::take(map);
                for (index, element) in old {
                    if index == 0 {
                        if let SlotValue::Data(value) = element.value {
                            removed = value;
                        }
                    } else {
                        map.insert(index - 1, element);
                    }
                }
            }
            _ => {
                if self.index_offset > 0 {
                    self.index_offset -= 1;
                } else {
                    removed = self.read_at(self.array_offset).unwrap_or_default();
                    self.array_offset += 1;
                    self.used_length -= 1;
                    self.after_front_removal();
                }
            }
        }
        self.length -= 1;
        removed
    }

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// No new elements
    pub fn prevent_extensions(&mut self) {
        self.flags |= ArrayFlags::NOT_EXTENSIBLE;
    }

    /// Make `length` read-only
    pub fn set_length_not_writable(&mut self) {
        self.flags |= ArrayFlags::LENGTH_NOT_WRITABLE;
    }

    /// Seal every element
    pub fn seal(&mut self) {
        self.flags |= ArrayFlags::NOT_EXTENSIBLE | ArrayFlags::SEALED;
        if let ArrayStore::Sparse(map) = &mut self.store {
            for element in map.values_mut() {
                element.attributes.remove(PropertyAttributes::CONFIGURABLE);
            }
        }
    }

    /// Freeze every element and `length`
    pub fn freeze(&mut self) {
        self.flags |= ArrayFlags::NOT_EXTENSIBLE
            | ArrayFlags::SEALED
            | ArrayFlags::FROZEN
            | ArrayFlags::LENGTH_NOT_WRITABLE;
        if let ArrayStore::Sparse(map) = &mut self.store {
            for element in map.values_mut() {
                element.attributes.remove(PropertyAttributes::CONFIGURABLE);
                if matches!(element.value, SlotValue::Data(_)) {
                    element.attributes.remove(PropertyAttributes::WRITABLE);
                }
            }
        }
    }

    /// Check the structural invariants; used by tests
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.store.is_contiguous() {
            let end = self.index_offset + self.used_length;
            if end > self.length {
                return Err(format!("window end {end} past length {}", self.length));
            }
            if self.used_length == 0 {
                return Err("contiguous store with no used slots".into());
            }
            let window = self.window_values();
            let holes = window.iter().filter(|v| v.is_none()).count() as u64;
            if holes != self.hole_count {
                return Err(format!("hole count {} but {} holes", self.hole_count, holes));
            }
            if window.first().is_some_and(Option::is_none) || window.last().is_some_and(Option::is_none) {
                return Err("window edges must hold elements".into());
            }
        }
        if let ArrayStore::Sparse(map) = &self.store
            && let Some(last) = map.keys().next_back()
            && *last >= self.length
        {
            return Err(format!("sparse index {last} past length {}", self.length));
        }
        if !self.store.is_contiguous() && self.hole_count != 0 {
            return Err("holes counted outside a hole store".into());
        }
        Ok(())
    }
}
