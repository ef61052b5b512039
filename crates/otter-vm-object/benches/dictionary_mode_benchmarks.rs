//! Dictionary Mode Performance Benchmarks
//!
//! Compares property access performance between shape-based storage and dictionary mode.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use otter_vm_object::{JsObject, NativeContext, ObjectModelConfig, PropertyKey, Value};
use std::hint::black_box;
use std::sync::Arc;

/// Context whose dictionary threshold is low enough for small benchmarks
fn context_with_threshold(threshold: usize) -> NativeContext {
    NativeContext::with_config(Arc::new(ObjectModelConfig {
        dictionary_threshold: threshold,
        ..Default::default()
    }))
}

fn keys(prefix: &str, count: usize) -> Vec<PropertyKey> {
    (0..count)
        .map(|i| PropertyKey::string(&format!("{prefix}{i}")))
        .collect()
}

fn populate(ncx: &mut NativeContext, keys: &[PropertyKey]) -> Arc<JsObject> {
    let obj = JsObject::ordinary(None);
    for (i, key) in keys.iter().enumerate() {
        let _ = obj.put(ncx, key, Value::int32(i as i32), false);
    }
    obj
}

fn sum_properties(ncx: &mut NativeContext, obj: &Arc<JsObject>, keys: &[PropertyKey]) -> i32 {
    let mut sum = 0i32;
    for key in keys {
        if let Ok(v) = obj.get_value(ncx, key) {
            sum += v.as_int32().unwrap_or(0);
        }
    }
    sum
}

/// Benchmark: Shape-based storage property access
fn bench_shape_based_access(c: &mut Criterion) {
    let mut ncx = NativeContext::new();
    let props = keys("prop", 20);

    c.bench_function("shape_based_set_20_props", |b| {
        b.iter(|| black_box(populate(&mut ncx, &props)));
    });

    c.bench_function("shape_based_get_20_props", |b| {
        let obj = populate(&mut ncx, &props);
        assert!(!obj.is_dictionary_mode());
        b.iter(|| black_box(sum_properties(&mut ncx, &obj, &props)));
    });
}

/// Benchmark: Dictionary mode property access
fn bench_dictionary_mode_access(c: &mut Criterion) {
    let mut ncx = context_with_threshold(32);
    let props = keys("prop", 50);

    c.bench_function("dictionary_set_50_props", |b| {
        b.iter(|| black_box(populate(&mut ncx, &props)));
    });

    c.bench_function("dictionary_get_50_props", |b| {
        let obj = populate(&mut ncx, &props);
        assert!(obj.is_dictionary_mode(), "Object should be in dictionary mode");
        b.iter(|| black_box(sum_properties(&mut ncx, &obj, &props)));
    });
}

/// Benchmark: Objects keyed by integers from the first property
fn bench_index_keyed_dictionary(c: &mut Criterion) {
    let mut ncx = NativeContext::new();
    let props: Vec<PropertyKey> = (0..64).map(PropertyKey::index).collect();

    c.bench_function("index_keyed_get_64_props", |b| {
        let obj = populate(&mut ncx, &props);
        assert!(obj.is_dictionary_mode(), "Index-keyed object should be in dictionary mode");
        b.iter(|| black_box(sum_properties(&mut ncx, &obj, &props)));
    });
}

/// Benchmark: Deleting every property of a dictionary-mode object, oldest first
fn bench_dictionary_bulk_delete(c: &mut Criterion) {
    let mut setup_ncx = context_with_threshold(32);
    let mut ncx = context_with_threshold(32);
    let props = keys("prop", 10_000);

    c.bench_function("dictionary_delete_10000_props", |b| {
        b.iter_batched(
            || populate(&mut setup_ncx, &props),
            |obj| {
                for key in &props {
                    let _ = obj.delete(&mut ncx, key);
                }
                black_box(obj)
            },
            BatchSize::LargeInput,
        );
    });
}

/// Benchmark: Compare same number of properties, shape vs dictionary
fn bench_compare_storage_modes(c: &mut Criterion) {
    let props = keys("p", 25);

    c.bench_function("compare_shape_25_get", |b| {
        let mut ncx = NativeContext::new();
        let obj = populate(&mut ncx, &props);
        assert!(!obj.is_dictionary_mode());
        b.iter(|| black_box(sum_properties(&mut ncx, &obj, &props)));
    });

    c.bench_function("compare_dict_25_get", |b| {
        let mut ncx = context_with_threshold(8);
        let obj = populate(&mut ncx, &props);
        assert!(obj.is_dictionary_mode());
        b.iter(|| black_box(sum_properties(&mut ncx, &obj, &props)));
    });
}

criterion_group!(
    benches,
    bench_shape_based_access,
    bench_dictionary_mode_access,
    bench_index_keyed_dictionary,
    bench_dictionary_bulk_delete,
    bench_compare_storage_modes
);
criterion_main!(benches);
