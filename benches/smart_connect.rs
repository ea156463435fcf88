use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use smart_connect::affinity::NoAffinity;
use smart_connect::collision::CollisionDetector;
use smart_connect::config::{Config, ConnectConfig, LayoutConfig, PipelineConfig};
use smart_connect::connect::AutoConnector;
use smart_connect::ir::{Edge, Node, Port};
use smart_connect::layout::optimize_layout;
use smart_connect::orchestrator::SmartConnect;
use smart_connect::store::{MemoryWorkspace, WorkspaceStore};
use std::hint::black_box;

const DIMENSIONS: [&str; 4] = ["power", "comms", "fluid", "control"];

fn scattered_nodes(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            let x = ((i * 37) % 11) as f32 * 95.0;
            let y = ((i * 53) % 7) as f32 * 100.0;
            Node::new(
                format!("n{i}"),
                format!("template-{}", i % 5),
                DIMENSIONS[i % DIMENSIONS.len()],
                x,
                y,
            )
        })
        .collect()
}

/// A chain plus `extra_edges` longer hops, so tiers and crossings both show up.
fn dense_graph(nodes: usize, extra_edges: usize) -> (Vec<Node>, Vec<Edge>) {
    let ns = scattered_nodes(nodes);
    let mut edges = Vec::new();
    let mut push = |from: usize, to: usize| {
        edges.push(Edge {
            id: format!("e{}", edges.len()),
            from_node: format!("n{from}"),
            from_port: Port::Right,
            to_node: format!("n{to}"),
            to_port: Port::Left,
        });
    };
    for i in 0..nodes.saturating_sub(1) {
        push(i, i + 1);
    }
    let mut count = 0usize;
    'outer: for i in 0..nodes {
        for j in (i + 3)..nodes {
            if count >= extra_edges {
                break 'outer;
            }
            push(i, j);
            count += 1;
        }
    }
    (ns, edges)
}

fn workspace(nodes: &[Node]) -> MemoryWorkspace {
    let mut ws = MemoryWorkspace::new();
    for node in nodes {
        ws.insert_node(node.clone());
    }
    ws
}

const SIZES: [(&str, usize, usize); 4] = [
    ("tiny", 6, 2),
    ("small", 16, 8),
    ("medium", 32, 24),
    ("large", 64, 64),
];

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for (name, nodes, extra) in SIZES {
        let graph = dense_graph(nodes, extra);
        group.bench_with_input(BenchmarkId::from_parameter(name), &graph, |b, (ns, es)| {
            b.iter(|| {
                let placements = optimize_layout(black_box(ns), black_box(es), None, &config);
                black_box(placements.len());
            });
        });
    }
    group.finish();
}

fn bench_crossings(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_crossings");
    let detector = CollisionDetector::default();
    for (name, nodes, extra) in SIZES {
        let graph = dense_graph(nodes, extra);
        group.bench_with_input(BenchmarkId::from_parameter(name), &graph, |b, (ns, es)| {
            b.iter(|| black_box(detector.count_crossings(black_box(es), black_box(ns))));
        });
    }
    group.finish();
}

fn bench_auto_connect(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_connect");
    let detector = CollisionDetector::default();
    let config = ConnectConfig::default();
    for (name, nodes, _) in SIZES {
        let ns = scattered_nodes(nodes);
        group.bench_with_input(BenchmarkId::from_parameter(name), &ns, |b, data| {
            b.iter(|| {
                let mut ws = workspace(data);
                let outcome =
                    AutoConnector::new(&NoAffinity, &detector, &config).connect_isolated_modules(&mut ws);
                black_box(outcome.edges_added());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime build failed");
    let config = Config {
        pipeline: PipelineConfig::instant(),
        ..Config::default()
    };
    for (name, nodes, _) in SIZES {
        let ns = scattered_nodes(nodes);
        group.bench_with_input(BenchmarkId::from_parameter(name), &ns, |b, data| {
            b.iter(|| {
                let engine = SmartConnect::new(workspace(data), config.clone());
                let report = runtime.block_on(engine.optimize());
                black_box(report.edges_added);
                black_box(engine.into_store().edges().len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_crossings, bench_auto_connect, bench_end_to_end
);
criterion_main!(benches);
