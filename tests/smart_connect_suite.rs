use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use smart_connect::config::PipelineConfig;
use smart_connect::{
    AffinityTable, CollisionDetector, Config, Edge, EdgeKey, FixedCanvas, MemoryWorkspace,
    RunStatus, SmartConnect, WorkspaceStore,
};

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> MemoryWorkspace {
    let path = fixtures_root().join(name);
    assert!(path.exists(), "fixture missing: {name}");
    MemoryWorkspace::load(&path).expect("fixture parse failed")
}

fn affinity() -> AffinityTable {
    AffinityTable::load(&fixtures_root().join("affinity.json5")).expect("affinity parse failed")
}

fn config() -> Config {
    Config {
        pipeline: PipelineConfig::instant(),
        ..Config::default()
    }
}

type State = (Vec<(String, f32, f32)>, BTreeSet<EdgeKey>);

fn state(store: &MemoryWorkspace) -> State {
    let mut nodes: Vec<(String, f32, f32)> = store
        .nodes()
        .into_iter()
        .map(|node| (node.id, node.x, node.y))
        .collect();
    nodes.sort_by(|a, b| a.0.cmp(&b.0));
    (nodes, store.edges().iter().map(Edge::key).collect())
}

// Keep this list explicit so new fixtures must be added intentionally.
const FIXTURES: [&str; 5] = [
    "components.json",
    "crossed_pair.json",
    "empty.json",
    "isolated_trio.json",
    "star.json",
];

#[tokio::test]
async fn every_fixture_ends_connected_and_in_bounds() {
    let config = config();
    for name in FIXTURES {
        let engine = SmartConnect::with_collaborators(
            load_fixture(name),
            FixedCanvas::new(1200.0, 800.0),
            affinity(),
            config.clone(),
        );
        let report = engine.optimize().await;
        assert_ne!(report.status, RunStatus::Failed, "{name}: {:?}", report.error);

        let store = engine.store().lock().await;
        let nodes = store.nodes();
        let edges = store.edges();
        if nodes.len() >= 2 {
            let connected: HashSet<&str> = edges
                .iter()
                .flat_map(|edge| [edge.from_node.as_str(), edge.to_node.as_str()])
                .collect();
            for node in &nodes {
                assert!(connected.contains(node.id.as_str()), "{name}: {} left isolated", node.id);
            }
        }
        let layout = &config.layout;
        for node in &nodes {
            assert!(
                node.x >= layout.padding && node.x <= 1200.0 - layout.node_width - layout.padding,
                "{name}: {} x out of bounds: {}",
                node.id,
                node.x
            );
            assert!(
                node.y >= layout.padding && node.y <= 800.0 - layout.node_height - layout.padding,
                "{name}: {} y out of bounds: {}",
                node.id,
                node.y
            );
        }
        assert_eq!(
            report.crossings_after,
            CollisionDetector::default().count_crossings(&edges, &nodes),
            "{name}: reported crossings disagree with the workspace"
        );
    }
}

#[tokio::test]
async fn undo_returns_every_fixture_to_its_loaded_state() {
    for name in FIXTURES {
        let original = state(&load_fixture(name));
        let engine = SmartConnect::new(load_fixture(name), config());
        let report = engine.optimize().await;
        if report.status == RunStatus::NoChanges {
            continue;
        }
        assert!(engine.undo().await, "{name}: undo failed");
        assert_eq!(state(&*engine.store().lock().await), original, "{name}");
        assert!(engine.redo().await, "{name}: redo failed");
        assert!(!engine.redo().await, "{name}: redo past the end");
    }
}

#[tokio::test]
async fn runs_are_deterministic() {
    for name in FIXTURES {
        let first = SmartConnect::new(load_fixture(name), config());
        let second = SmartConnect::new(load_fixture(name), config());
        let a = first.optimize().await;
        let b = second.optimize().await;
        assert_eq!(a, b, "{name}");
        assert_eq!(
            state(&*first.store().lock().await),
            state(&*second.store().lock().await),
            "{name}"
        );
    }
}

#[tokio::test]
async fn isolated_trio_gets_two_edges() {
    let engine = SmartConnect::new(load_fixture("isolated_trio.json"), config());
    let report = engine.optimize().await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.edges_added, 2);
    assert_eq!(report.crossings_after, 0);
}

#[tokio::test]
async fn star_reports_no_crossings() {
    let engine = SmartConnect::new(load_fixture("star.json"), config());
    let report = engine.optimize().await;
    assert_eq!(report.crossings_before, 0);
    assert_eq!(report.crossings_after, 0);
    assert_eq!(report.edges_added, 0);
}

#[tokio::test]
async fn spare_module_joins_its_strongest_partner() {
    let engine = SmartConnect::with_collaborators(
        load_fixture("components.json"),
        FixedCanvas::new(1200.0, 800.0),
        affinity(),
        config(),
    );
    let report = engine.optimize().await;
    assert_eq!(report.edges_added, 2);
    let store = engine.store().lock().await;
    // The dangling "ghost" edge in the fixture is never loaded.
    assert!(store.edges().iter().all(|edge| edge.from_node != "ghost"));
    let edges = store.edges();
    // relay/antenna share a dimension and sit side by side after the first pass
    assert!(edges.iter().any(|edge| edge.touches("spare") && edge.touches("ant")));
    assert!(edges.iter().any(|edge| edge.touches("probe") && edge.touches("inv")));
}
