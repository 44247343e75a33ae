//! Benchmarks for scanning object graphs with `footprint`.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use footprint::{MemSize, RootSet, TypeInfoCache, impl_mem_size};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const GRAPH_NODES: usize = 10_000;
const EDGES_PER_NODE: usize = 4;

struct GraphNode {
    label: String,
    children: Vec<Arc<GraphNode>>,
}

impl_mem_size!(GraphNode { label, children });

/// Nodes that each point to a few random earlier nodes, so most nodes are reachable many times.
fn shared_graph(rng: &mut SmallRng) -> Vec<Arc<GraphNode>> {
    let mut nodes: Vec<Arc<GraphNode>> = Vec::with_capacity(GRAPH_NODES);

    for index in 0..GRAPH_NODES {
        let children = if nodes.is_empty() {
            Vec::new()
        } else {
            (0..EDGES_PER_NODE)
                .filter_map(|_| nodes.get(rng.random_range(0..nodes.len())))
                .map(Arc::clone)
                .collect()
        };

        nodes.push(Arc::new(GraphNode {
            label: format!("node {index}"),
            children,
        }));
    }

    nodes
}

fn entrypoint(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(1234);

    let bytes = vec![0_u8; 16 * 1024 * 1024];
    let numbers: Vec<u64> = (0..100_000).collect();
    let strings: Vec<String> = (0..10_000).map(|i| format!("string {i}")).collect();
    let map: HashMap<u32, String> = (0..10_000).map(|i| (i, format!("value {i}"))).collect();
    let graph = shared_graph(&mut rng);

    let mut group = c.benchmark_group("footprint_scan");

    group.bench_function("bytes_16mb", |b| {
        b.iter(|| footprint::scan(black_box(&bytes)).unwrap());
    });

    group.bench_function("numbers_100k", |b| {
        b.iter(|| footprint::scan(black_box(&numbers)).unwrap());
    });

    group.bench_function("strings_10k", |b| {
        b.iter(|| footprint::scan(black_box(&strings)).unwrap());
    });

    group.bench_function("map_10k", |b| {
        b.iter(|| footprint::scan(black_box(&map)).unwrap());
    });

    group.bench_function("shared_graph_10k", |b| {
        b.iter(|| footprint::scan(black_box(&graph)).unwrap());
    });

    group.finish();

    let mut roots_group = c.benchmark_group("footprint_roots");

    roots_group.bench_function("all_roots", |b| {
        let mut roots = RootSet::new();
        roots.add("bytes", &bytes);
        roots.add("graph", &graph);
        roots.add("map", &map);
        roots.add("numbers", &numbers);
        roots.add("strings", &strings);

        b.iter(|| black_box(&roots).scan().unwrap());
    });

    roots_group.bench_function("shared_type_cache", |b| {
        let types = Arc::new(TypeInfoCache::new());

        b.iter(|| {
            let mut roots: RootSet<'_, dyn MemSize> =
                RootSet::builder().type_cache(Arc::clone(&types)).build();
            roots.add("graph", &graph);
            roots.scan().unwrap()
        });
    });

    roots_group.finish();
}
