//! Bounded snapshot history with undo/redo.
//!
//! The cursor points at the active snapshot. Taking a snapshot drops any redo
//! tail first; overflowing the capacity evicts the oldest entry and shifts
//! the cursor with it. Restoring recreates edges through the store, so edges
//! are compared by [`EdgeKey`] rather than by id.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::{AnimationOptions, HistoryConfig};
use crate::error::{ComposerError, Result};
use crate::ir::{Edge, EdgeKey, Node};
use crate::layout::{NodePlacement, apply_layout};
use crate::store::WorkspaceStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn capture<S>(store: &S, label: impl Into<String>) -> Self
    where
        S: WorkspaceStore + ?Sized,
    {
        Self {
            label: label.into(),
            timestamp: Utc::now(),
            nodes: store.nodes(),
            edges: store.edges(),
        }
    }

    pub fn edge_keys(&self) -> BTreeSet<EdgeKey> {
        self.edges.iter().map(Edge::key).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub moved_nodes: usize,
    pub added_edges: usize,
    pub removed_edges: usize,
    pub added_nodes: usize,
    pub removed_nodes: usize,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Diff of the live store against `snapshot`.
pub fn compare_with_current<S>(snapshot: &Snapshot, store: &S, move_tolerance: f32) -> SnapshotDiff
where
    S: WorkspaceStore + ?Sized,
{
    diff_state(snapshot, &store.nodes(), &store.edges(), move_tolerance)
}

fn diff_state(snapshot: &Snapshot, nodes: &[Node], edges: &[Edge], move_tolerance: f32) -> SnapshotDiff {
    let saved: HashMap<&str, &Node> = snapshot
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect();

    let mut diff = SnapshotDiff::default();
    let mut seen = 0;
    for node in nodes {
        match saved.get(node.id.as_str()) {
            Some(old) => {
                seen += 1;
                if (old.x - node.x).abs() > move_tolerance || (old.y - node.y).abs() > move_tolerance {
                    diff.moved_nodes += 1;
                }
            }
            None => diff.added_nodes += 1,
        }
    }
    diff.removed_nodes = saved.len() - seen;

    let before = snapshot.edge_keys();
    let after: BTreeSet<EdgeKey> = edges.iter().map(Edge::key).collect();
    diff.added_edges = after.difference(&before).count();
    diff.removed_edges = before.difference(&after).count();
    diff
}

#[derive(Debug, Clone)]
pub struct History {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
    cursor: Option<usize>,
    move_tolerance: f32,
}

impl Default for History {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl History {
    pub fn new(config: &HistoryConfig) -> Self {
        let capacity = config.max_snapshots.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity + 1),
            capacity,
            cursor: None,
            move_tolerance: config.move_tolerance,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Index of the active snapshot; `None` before the first snapshot.
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|idx| self.snapshots.get(idx))
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|idx| idx > 0)
    }

    pub fn can_redo(&self) -> bool {
        match self.cursor {
            Some(idx) => idx + 1 < self.snapshots.len(),
            None => !self.snapshots.is_empty(),
        }
    }

    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }

    /// Records the store's current state and returns the new cursor.
    pub fn take_snapshot<S>(&mut self, store: &S, label: impl Into<String>) -> usize
    where
        S: WorkspaceStore + ?Sized,
    {
        self.push(Snapshot::capture(store, label))
    }

    fn push(&mut self, snapshot: Snapshot) -> usize {
        let keep = self.cursor.map_or(0, |idx| idx + 1);
        self.snapshots.truncate(keep);
        debug!(
            label = %snapshot.label,
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "snapshot taken"
        );
        self.snapshots.push_back(snapshot);
        let mut cursor = self.snapshots.len() - 1;
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
            cursor -= 1;
        }
        self.cursor = Some(cursor);
        cursor
    }

    /// Pushes an already captured snapshot unless the active entry holds the
    /// same state, in which case the cursor stays put. Returns the cursor.
    pub fn record(&mut self, snapshot: Snapshot) -> usize {
        if let Some(idx) = self.cursor {
            let unchanged = self.snapshots.get(idx).is_some_and(|current| {
                diff_state(current, &snapshot.nodes, &snapshot.edges, self.move_tolerance).is_empty()
            });
            if unchanged {
                debug!(label = %snapshot.label, "state matches the active snapshot");
                return idx;
            }
        }
        self.push(snapshot)
    }

    /// Brings the store back to the snapshot at `index`.
    ///
    /// All live edges are dropped, nodes missing from the snapshot are
    /// removed, absent ones recreated, and every node is moved (optionally
    /// animated) to its saved position before the saved edges are re-added.
    /// Returns `Ok(false)` when `index` is out of range.
    pub async fn restore_snapshot<S>(
        &mut self,
        store: &mut S,
        index: usize,
        animation: AnimationOptions,
        cancel: &mut CancelToken,
    ) -> Result<bool>
    where
        S: WorkspaceStore + ?Sized,
    {
        let Some(snapshot) = self.snapshots.get(index).cloned() else {
            return Ok(false);
        };

        for edge in store.edges() {
            store.remove_edge(&edge.id);
        }

        let keep: HashMap<&str, &Node> = snapshot
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect();
        let live = store.nodes();
        for node in &live {
            if !keep.contains_key(node.id.as_str()) {
                store.remove_node(&node.id);
            }
        }
        for node in &snapshot.nodes {
            if !live.iter().any(|existing| existing.id == node.id) {
                store.restore_node(node.clone());
            }
        }

        let placements: Vec<NodePlacement> = snapshot
            .nodes
            .iter()
            .map(|node| NodePlacement {
                node_id: node.id.clone(),
                x: node.x,
                y: node.y,
                tier: 0,
            })
            .collect();
        apply_layout(store, &placements, animation, cancel).await?;

        let mut recreated = 0;
        for edge in &snapshot.edges {
            match recreate_edge(store, edge) {
                Ok(_) => recreated += 1,
                Err(err) => warn!(edge = %edge.id, error = %err, "edge skipped on restore"),
            }
        }
        store.redraw_edges();

        self.cursor = Some(index);
        debug!(
            index,
            label = %snapshot.label,
            nodes = snapshot.nodes.len(),
            edges = recreated,
            "snapshot restored"
        );
        Ok(true)
    }

    pub async fn undo<S>(
        &mut self,
        store: &mut S,
        animation: AnimationOptions,
        cancel: &mut CancelToken,
    ) -> Result<bool>
    where
        S: WorkspaceStore + ?Sized,
    {
        match self.cursor {
            Some(idx) if idx > 0 => self.restore_snapshot(store, idx - 1, animation, cancel).await,
            _ => Ok(false),
        }
    }

    pub async fn redo<S>(
        &mut self,
        store: &mut S,
        animation: AnimationOptions,
        cancel: &mut CancelToken,
    ) -> Result<bool>
    where
        S: WorkspaceStore + ?Sized,
    {
        let next = self.cursor.map_or(0, |idx| idx + 1);
        if next >= self.snapshots.len() {
            return Ok(false);
        }
        self.restore_snapshot(store, next, animation, cancel).await
    }

    pub fn compare_with_current<S>(&self, snapshot: &Snapshot, store: &S) -> SnapshotDiff
    where
        S: WorkspaceStore + ?Sized,
    {
        compare_with_current(snapshot, store, self.move_tolerance)
    }
}

fn recreate_edge<S>(store: &mut S, edge: &Edge) -> Result<Edge>
where
    S: WorkspaceStore + ?Sized,
{
    store
        .add_edge(&edge.from_node, edge.from_port, &edge.to_node, edge.to_port)
        .ok_or_else(|| {
            ComposerError::MissingTarget(format!("{} -> {}", edge.from_node, edge.to_node))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Port;
    use crate::store::MemoryWorkspace;

    fn workspace() -> MemoryWorkspace {
        let mut ws = MemoryWorkspace::new();
        ws.insert_node(Node::new("a", "pump", "fluid", 100.0, 100.0));
        ws.insert_node(Node::new("b", "valve", "fluid", 400.0, 100.0));
        ws.insert_node(Node::new("c", "sensor", "control", 250.0, 300.0));
        ws
    }

    fn state(ws: &MemoryWorkspace) -> (Vec<(String, f32, f32)>, BTreeSet<EdgeKey>) {
        let mut nodes: Vec<(String, f32, f32)> =
            ws.nodes().into_iter().map(|n| (n.id, n.x, n.y)).collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        (nodes, ws.edges().iter().map(Edge::key).collect())
    }

    async fn undo(history: &mut History, ws: &mut MemoryWorkspace) -> bool {
        history
            .undo(ws, AnimationOptions::immediate(), &mut CancelToken::never())
            .await
            .unwrap()
    }

    async fn redo(history: &mut History, ws: &mut MemoryWorkspace) -> bool {
        history
            .redo(ws, AnimationOptions::immediate(), &mut CancelToken::never())
            .await
            .unwrap()
    }

    #[test]
    fn overflow_keeps_most_recent_snapshots() {
        let ws = workspace();
        let mut history = History::default();
        for i in 0..15 {
            history.take_snapshot(&ws, format!("s{i}"));
        }
        assert_eq!(history.len(), 10);
        assert_eq!(history.current_index(), Some(9));
        assert_eq!(history.get(0).unwrap().label, "s5");
        assert_eq!(history.current().unwrap().label, "s14");
    }

    #[tokio::test]
    async fn fifteen_snapshots_leave_ten_recoverable() {
        let mut ws = workspace();
        let mut history = History::default();
        for i in 0..15 {
            ws.update_node_position("a", 100.0 + i as f32 * 10.0, 100.0);
            history.take_snapshot(&ws, format!("s{i}"));
        }
        let mut undos = 0;
        while undo(&mut history, &mut ws).await {
            undos += 1;
        }
        assert_eq!(undos, 9);
        assert_eq!(history.current_index(), Some(0));
        assert_eq!(ws.node("a").unwrap().x, 150.0);
    }

    #[tokio::test]
    async fn new_snapshot_after_undo_discards_redo() {
        let mut ws = workspace();
        let mut history = History::default();
        history.take_snapshot(&ws, "one");
        ws.update_node_position("a", 500.0, 500.0);
        history.take_snapshot(&ws, "two");
        assert!(undo(&mut history, &mut ws).await);
        assert!(history.can_redo());

        history.take_snapshot(&ws, "three");
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert!(!redo(&mut history, &mut ws).await);
        let labels: Vec<&str> = history.snapshots().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn undo_and_redo_round_trip() {
        let mut ws = workspace();
        let mut history = History::default();
        for cycle in 0..3 {
            let before = state(&ws);
            history.take_snapshot(&ws, format!("before {cycle}"));

            let shift = 40.0 * (cycle + 1) as f32;
            ws.update_node_position("c", 250.0 + shift, 300.0);
            ws.add_edge("a", Port::Right, "b", Port::Left);
            let after = state(&ws);
            history.take_snapshot(&ws, format!("after {cycle}"));

            assert!(undo(&mut history, &mut ws).await);
            assert_eq!(state(&ws), before);
            assert!(redo(&mut history, &mut ws).await);
            assert_eq!(state(&ws), after);
            assert!(undo(&mut history, &mut ws).await);
            assert_eq!(state(&ws), before);

            for edge in ws.edges() {
                ws.remove_edge(&edge.id);
            }
        }
    }

    #[tokio::test]
    async fn restore_is_idempotent() {
        let mut ws = workspace();
        ws.add_edge("a", Port::Right, "b", Port::Left);
        let mut history = History::default();
        history.take_snapshot(&ws, "base");
        ws.update_node_position("b", 700.0, 50.0);
        ws.add_edge("b", Port::Bottom, "c", Port::Top);

        let mut cancel = CancelToken::never();
        let animation = AnimationOptions::immediate();
        assert!(history.restore_snapshot(&mut ws, 0, animation, &mut cancel).await.unwrap());
        let first = state(&ws);
        assert!(history.restore_snapshot(&mut ws, 0, animation, &mut cancel).await.unwrap());
        assert_eq!(state(&ws), first);
        assert_eq!(ws.edges().len(), 1);
    }

    #[tokio::test]
    async fn restore_recreates_removed_nodes_and_drops_new_ones() {
        let mut ws = workspace();
        ws.add_edge("a", Port::Right, "c", Port::Top);
        let mut history = History::default();
        history.take_snapshot(&ws, "base");

        ws.remove_node("c");
        ws.insert_node(Node::new("d", "relay", "comms", 600.0, 400.0));
        let diff = history.compare_with_current(history.current().unwrap(), &ws);
        assert_eq!(diff.added_nodes, 1);
        assert_eq!(diff.removed_nodes, 1);
        assert_eq!(diff.removed_edges, 1);

        let mut cancel = CancelToken::never();
        history
            .restore_snapshot(&mut ws, 0, AnimationOptions::immediate(), &mut cancel)
            .await
            .unwrap();
        assert!(ws.node("d").is_none());
        assert_eq!(ws.node("c").unwrap().x, 250.0);
        assert!(history.compare_with_current(history.current().unwrap(), &ws).is_empty());
    }

    #[tokio::test]
    async fn out_of_range_operations_report_false() {
        let mut ws = workspace();
        let mut history = History::default();
        assert!(!undo(&mut history, &mut ws).await);
        assert!(!redo(&mut history, &mut ws).await);
        history.take_snapshot(&ws, "only");
        assert!(!history.can_undo());
        assert!(!undo(&mut history, &mut ws).await);
        let mut cancel = CancelToken::never();
        assert!(
            !history
                .restore_snapshot(&mut ws, 3, AnimationOptions::immediate(), &mut cancel)
                .await
                .unwrap()
        );
        assert_eq!(history.current_index(), Some(0));
        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.current_index(), None);
    }

    #[test]
    fn diff_counts_moves_beyond_tolerance() {
        let mut ws = workspace();
        let snapshot = Snapshot::capture(&ws, "base");
        ws.update_node_position("a", 100.2, 100.0);
        ws.update_node_position("b", 460.0, 100.0);
        ws.add_edge("a", Port::Right, "b", Port::Left);
        let diff = compare_with_current(&snapshot, &ws, 0.5);
        assert_eq!(diff.moved_nodes, 1);
        assert_eq!(diff.added_edges, 1);
        assert_eq!(diff.removed_edges, 0);
    }

    #[test]
    fn record_skips_state_already_at_the_cursor() {
        let mut ws = workspace();
        let mut history = History::default();
        history.take_snapshot(&ws, "after run");

        assert_eq!(history.record(Snapshot::capture(&ws, "before run")), 0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().unwrap().label, "after run");

        ws.update_node_position("a", 300.0, 100.0);
        assert_eq!(history.record(Snapshot::capture(&ws, "moved")), 1);
        assert!(history.can_undo());
    }

    #[test]
    fn recreating_an_edge_to_a_vanished_node_is_a_missing_target() {
        let mut ws = workspace();
        let edge = ws.add_edge("a", Port::Right, "c", Port::Top).unwrap();
        ws.remove_node("c");
        let err = recreate_edge(&mut ws, &edge).unwrap_err();
        assert!(matches!(err, ComposerError::MissingTarget(ref what) if what == "a -> c"));
        assert!(ws.edges().is_empty());
    }
}
