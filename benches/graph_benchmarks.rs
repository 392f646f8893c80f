use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use graphvault::config::{GraphConfig, LatchConfig};
use graphvault::graph::{EdgeTypeId, Element, ElementLatch, GraphStore, PropertyId};
use graphvault::index::PropertyIndexFactory;
use tempfile::TempDir;

fn build_store(vertices: usize, config: GraphConfig) -> GraphStore {
    let mut store = GraphStore::with_config(config);
    let mut ids = Vec::with_capacity(vertices);
    for i in 0..vertices {
        let id = store.create_vertex().unwrap();
        let vertex = store.vertex(id).unwrap();
        vertex.set_property(PropertyId::new(1), format!("Person{}", i)).unwrap();
        vertex.set_property(PropertyId::new(2), (i % 100) as i64).unwrap();
        ids.push(id);
    }
    // Ring plus chords
    for i in 0..vertices {
        store
            .create_edge(ids[i], ids[(i + 1) % vertices], EdgeTypeId::new(1))
            .unwrap();
        store
            .create_edge(ids[i], ids[(i * 7 + 3) % vertices], EdgeTypeId::new(2))
            .unwrap();
    }
    store
}

/// Uncontended latch acquire/release
fn bench_latch(c: &mut Criterion) {
    let latch = ElementLatch::with_config(LatchConfig::default());
    c.bench_function("latch_read_acquire_release", |b| {
        b.iter(|| {
            assert!(latch.acquire_read());
            latch.release_read();
        })
    });
    c.bench_function("latch_write_acquire_release", |b| {
        b.iter(|| {
            assert!(latch.acquire_write());
            latch.release_write();
        })
    });
}

/// Vertex and edge creation throughput
fn bench_element_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("element_creation");

    for size in [100, 1000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| build_store(size, GraphConfig::default()));
        });
    }
    group.finish();
}

/// Snapshot save and load
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    group.sample_size(10);

    for size in [1000, 10_000].iter() {
        let mut config = GraphConfig::default();
        config.persistence.partition_size = 1024;
        config.persistence.sync_files = false;
        let store = build_store(*size, config.clone());

        group.bench_with_input(BenchmarkId::new("save", size), size, |b, _| {
            b.iter_with_setup(TempDir::new, |dir| {
                let dir = dir.unwrap();
                store.save(dir.path().join("graph")).unwrap();
            });
        });

        let dir = TempDir::new().unwrap();
        let report = store.save(dir.path().join("graph")).unwrap();
        group.bench_with_input(BenchmarkId::new("load", size), size, |b, _| {
            b.iter(|| {
                GraphStore::restore(&report.manifest_path, &PropertyIndexFactory, config.clone()).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_latch, bench_element_creation, bench_snapshot);
criterion_main!(benches);
