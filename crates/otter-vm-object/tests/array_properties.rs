//! Property tests for array element storage.
//!
//! Random write/delete/setLength sequences are applied both to
//! `ArrayElements` and to a `BTreeMap` model; after every step the storage
//! must agree with the model and pass its own invariant check.

use otter_vm_object::{ArrayElements, ArrayStoreKind, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Set(u64, i32),
    SetDouble(u64),
    Delete(u64),
    SetLength(u64),
    Push(i32),
    Shift,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..64, any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
        1 => (0u64..5000).prop_map(|i| Op::Set(i, 1)),
        1 => (0u64..64).prop_map(Op::SetDouble),
        2 => (0u64..64).prop_map(Op::Delete),
        1 => (0u64..80).prop_map(Op::SetLength),
        1 => any::<i32>().prop_map(Op::Push),
        1 => Just(Op::Shift),
    ]
}

#[derive(Default)]
struct Model {
    elements: BTreeMap<u64, Value>,
    length: u64,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::Set(i, v) => self.write(*i, Value::int32(*v)),
            Op::SetDouble(i) => self.write(*i, Value::number(*i as f64 + 0.5)),
            Op::Delete(i) => {
                self.elements.remove(i);
            }
            Op::SetLength(n) => {
                self.elements.retain(|k, _| k < n);
                self.length = *n;
            }
            Op::Push(v) => {
                let at = self.length;
                self.write(at, Value::int32(*v));
            }
            Op::Shift => {
                if self.length == 0 {
                    return;
                }
                let shifted: BTreeMap<u64, Value> = std::mem::take(&mut self.elements)
                    .into_iter()
                    .filter(|(k, _)| *k > 0)
                    .map(|(k, v)| (k - 1, v))
                    .collect();
                self.elements = shifted;
                self.length -= 1;
            }
        }
    }

    fn write(&mut self, index: u64, value: Value) {
        self.elements.insert(index, value);
        self.length = self.length.max(index + 1);
    }
}

fn apply(elements: &mut ArrayElements, op: &Op) {
    match op {
        Op::Set(i, v) => {
            assert!(elements.set_element(*i, Value::int32(*v), true).unwrap());
        }
        Op::SetDouble(i) => {
            assert!(elements.set_element(*i, Value::number(*i as f64 + 0.5), true).unwrap());
        }
        Op::Delete(i) => {
            assert!(elements.delete_element(*i, true).unwrap());
        }
        Op::SetLength(n) => {
            assert!(elements.set_length(*n, true).unwrap());
        }
        Op::Push(v) => {
            elements.push(Value::int32(*v)).unwrap();
        }
        Op::Shift => {
            elements.shift();
        }
    }
}

proptest! {
    #[test]
    fn prop_elements_match_model(ops in prop::collection::vec(op(), 1..60)) {
        let mut elements = ArrayElements::with_length(0);
        let mut model = Model::default();
        for op in &ops {
            apply(&mut elements, op);
            model.apply(op);

            prop_assert!(elements.check_invariants().is_ok(), "{:?}", elements.check_invariants());
            prop_assert_eq!(elements.length(), model.length);
            let indices: Vec<u64> = model.elements.keys().copied().collect();
            prop_assert_eq!(elements.element_indices(), indices);
            for (index, value) in &model.elements {
                prop_assert_eq!(elements.get_element(*index), Some(value.clone()));
            }
            if let Some(last) = elements.last_element_index() {
                prop_assert!(elements.length() >= last + 1);
            }
        }
    }

    #[test]
    fn prop_cursors_agree_with_indices(ops in prop::collection::vec(op(), 1..40)) {
        let mut elements = ArrayElements::with_length(0);
        for op in &ops {
            apply(&mut elements, op);
        }
        let mut forward = Vec::new();
        let mut cursor = elements.first_element_index();
        while let Some(index) = cursor {
            forward.push(index);
            cursor = elements.next_element_index(index);
        }
        prop_assert_eq!(&forward, &elements.element_indices());

        let mut backward = Vec::new();
        let mut cursor = elements.last_element_index();
        while let Some(index) = cursor {
            backward.push(index);
            cursor = elements.previous_element_index(index);
        }
        backward.reverse();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn prop_dense_int_writes_stay_packed(values in prop::collection::vec(any::<i32>(), 1..100)) {
        let mut elements = ArrayElements::with_length(0);
        for value in &values {
            elements.push(Value::int32(*value)).unwrap();
        }
        prop_assert_eq!(elements.store_kind(), ArrayStoreKind::PackedInt);
        prop_assert_eq!(elements.hole_count(), 0);
        prop_assert_eq!(elements.length(), values.len() as u64);
    }
}
