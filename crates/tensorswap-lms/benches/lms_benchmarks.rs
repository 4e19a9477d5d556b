//! Performance benchmarks for the TensorSwap LMS rewrite
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tensorswap_ir::{DataflowGraph, TensorShape};
use tensorswap_lms::{group_consumers, rewrite_graph, LmsConfig, TopoOrder};

/// Forward/backward style graph: `depth` forward layers of `width` nodes,
/// then a mirrored backward pass where each layer also reads the
/// activations of its forward counterpart.
fn layered_graph(depth: usize, width: usize) -> DataflowGraph {
    let shape = TensorShape::known(&[128, 256]);
    let mut graph = DataflowGraph::with_capacity(2 * depth * width, 2 * depth * width);
    let mut forward: Vec<Vec<usize>> = Vec::with_capacity(depth);

    let mut prev: Vec<usize> = Vec::new();
    for layer in 0..depth {
        let mut outs = Vec::with_capacity(width);
        for w in 0..width {
            let inputs = prev.get(w).copied().into_iter().collect();
            let n = graph
                .add_op(format!("fw/l{}/n{}", layer, w), "MatMul", inputs, vec![shape.clone()])
                .unwrap();
            outs.push(graph.node(n).unwrap().outputs[0]);
        }
        forward.push(outs.clone());
        prev = outs;
    }

    for layer in (0..depth).rev() {
        let mut outs = Vec::with_capacity(width);
        for w in 0..width {
            let inputs = vec![prev[w], forward[layer][w]];
            let n = graph
                .add_op(format!("bw/l{}/n{}", layer, w), "MatMulGrad", inputs, vec![shape.clone()])
                .unwrap();
            outs.push(graph.node(n).unwrap().outputs[0]);
        }
        prev = outs;
    }
    graph
}

// ===== Topological Order Benchmarks =====

fn bench_topo_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("topo_order");

    for depth in [16, 64, 256] {
        let graph = layered_graph(depth, 4);
        group.throughput(Throughput::Elements(graph.num_nodes() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &graph, |b, graph| {
            b.iter(|| TopoOrder::build(black_box(graph)).unwrap());
        });
    }

    group.finish();
}

// ===== Grouping Benchmarks =====

fn bench_grouping(c: &mut Criterion) {
    let consumers: Vec<(usize, usize)> = (0..1000).map(|i| (i, (i * 7) % 500)).collect();
    c.bench_function("group_consumers_1000", |b| {
        b.iter(|| group_consumers(black_box(&consumers), 5));
    });
}

// ===== Full Rewrite Benchmarks =====

fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");

    for depth in [16, 64, 256] {
        let graph = layered_graph(depth, 4);
        group.throughput(Throughput::Elements(graph.num_nodes() as u64));

        group.bench_with_input(BenchmarkId::new("async_auto", depth), &graph, |b, graph| {
            b.iter(|| {
                let mut g = graph.clone();
                rewrite_graph(black_box(&mut g), &LmsConfig::default()).unwrap()
            });
        });

        let sync = LmsConfig::new().with_sync_mode(3);
        group.bench_with_input(BenchmarkId::new("sync_both", depth), &graph, |b, graph| {
            b.iter(|| {
                let mut g = graph.clone();
                rewrite_graph(black_box(&mut g), &sync).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_topo_order, bench_grouping, bench_rewrite);
criterion_main!(benches);
