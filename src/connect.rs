//! Greedy wiring of isolated modules.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::affinity::AffinitySource;
use crate::collision::CollisionDetector;
use crate::config::ConnectConfig;
use crate::ir::{Edge, Node, Port};
use crate::store::WorkspaceStore;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOutcome {
    pub created: Vec<Edge>,
    /// Isolated nodes left over because no target could be wired.
    pub unresolved: Vec<String>,
}

impl ConnectOutcome {
    pub fn edges_added(&self) -> usize {
        self.created.len()
    }
}

fn distance(a: &Node, b: &Node) -> f32 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt()
}

fn connected_ids(edges: &[Edge]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for edge in edges {
        ids.insert(edge.from_node.clone());
        ids.insert(edge.to_node.clone());
    }
    ids
}

pub struct AutoConnector<'a, A: ?Sized> {
    affinity: &'a A,
    detector: &'a CollisionDetector,
    config: &'a ConnectConfig,
}

impl<'a, A> AutoConnector<'a, A>
where
    A: AffinitySource + ?Sized,
{
    pub fn new(affinity: &'a A, detector: &'a CollisionDetector, config: &'a ConnectConfig) -> Self {
        Self {
            affinity,
            detector,
            config,
        }
    }

    /// Score of wiring `source` to `candidate` given the current edges.
    pub fn target_score(&self, source: &Node, candidate: &Node, edges: &[Edge], nodes: &[Node]) -> f32 {
        let affinity = if source.template_id.is_empty() || candidate.template_id.is_empty() {
            self.config.default_affinity
        } else {
            f32::from(
                self.affinity
                    .module_affinity(&source.template_id, &candidate.template_id)
                    .affinity,
            )
        };
        let mut score = affinity;
        if source.dimension == candidate.dimension {
            score += self.config.same_dimension_bonus;
        }
        score += (self.config.proximity_base - distance(source, candidate) / self.config.proximity_divisor)
            .max(0.0);
        let naive = self
            .detector
            .would_collide(source, candidate, Port::Right, Port::Left, edges, nodes);
        if naive.is_collision() {
            score -= self.config.naive_collision_penalty;
        }
        score
    }

    /// Best partner for `source` among connected nodes, or among every other
    /// node when nothing is connected yet. Ties keep the earliest candidate.
    pub fn find_best_target<'n>(
        &self,
        source: &Node,
        nodes: &'n [Node],
        edges: &[Edge],
        connected: &HashSet<String>,
    ) -> Option<&'n Node> {
        let pool: Vec<&Node> = if connected.is_empty() {
            nodes.iter().filter(|node| node.id != source.id).collect()
        } else {
            nodes
                .iter()
                .filter(|node| node.id != source.id && connected.contains(&node.id))
                .collect()
        };

        let mut best: Option<(&Node, f32)> = None;
        for candidate in pool {
            let score = self.target_score(source, candidate, edges, nodes);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }
        best.map(|(node, _)| node)
    }

    fn connect_pair<S>(&self, store: &mut S, from: &Node, to: &Node) -> Option<Edge>
    where
        S: WorkspaceStore + ?Sized,
    {
        let edges = store.edges();
        let nodes = store.nodes();
        let ports = self.detector.find_best_ports(from, to, &edges, &nodes);
        let created = store.add_edge(&from.id, ports.from, &to.id, ports.to);
        match &created {
            Some(edge) => debug!(
                edge = %edge.id,
                from = %from.id,
                to = %to.id,
                from_port = %ports.from,
                to_port = %ports.to,
                "auto-connected modules"
            ),
            None => debug!(from = %from.id, to = %to.id, "store rejected auto-connection"),
        }
        created
    }

    /// Wires every isolated node into the graph. Each iteration re-reads the
    /// store, and the loop is bounded by the node count.
    pub fn connect_isolated_modules<S>(&self, store: &mut S) -> ConnectOutcome
    where
        S: WorkspaceStore + ?Sized,
    {
        let mut outcome = ConnectOutcome::default();
        let nodes = store.nodes();
        if nodes.len() < 2 {
            return outcome;
        }

        let mut gave_up: HashSet<String> = HashSet::new();

        if store.edges().is_empty() {
            if let Some(edge) = self.connect_pair(store, &nodes[0], &nodes[1]) {
                outcome.created.push(edge);
            }
        }

        for _ in 0..nodes.len() {
            let nodes = store.nodes();
            let edges = store.edges();
            let connected = connected_ids(&edges);
            let Some(source) = nodes
                .iter()
                .find(|node| !connected.contains(&node.id) && !gave_up.contains(&node.id))
            else {
                break;
            };

            let target = self.find_best_target(source, &nodes, &edges, &connected);
            let created = target.and_then(|target| self.connect_pair(store, source, target));
            match created {
                Some(edge) => outcome.created.push(edge),
                None => {
                    gave_up.insert(source.id.clone());
                }
            }
        }

        let connected = connected_ids(&store.edges());
        outcome.unresolved = store
            .nodes()
            .into_iter()
            .filter(|node| !connected.contains(&node.id))
            .map(|node| node.id)
            .collect();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::{AffinityTable, NoAffinity};
    use crate::store::MemoryWorkspace;

    fn workspace(nodes: &[(&str, &str, &str, f32, f32)]) -> MemoryWorkspace {
        let mut ws = MemoryWorkspace::new();
        for &(id, template, dimension, x, y) in nodes {
            ws.insert_node(Node::new(id, template, dimension, x, y));
        }
        ws
    }

    #[test]
    fn three_isolated_nodes_end_with_two_clear_edges() {
        let mut ws = workspace(&[
            ("a", "pump", "fluid", 100.0, 100.0),
            ("b", "valve", "fluid", 500.0, 100.0),
            ("c", "sensor", "control", 300.0, 400.0),
        ]);
        let detector = CollisionDetector::default();
        let config = ConnectConfig::default();
        let connector = AutoConnector::new(&NoAffinity, &detector, &config);
        let outcome = connector.connect_isolated_modules(&mut ws);

        assert_eq!(outcome.edges_added(), 2);
        assert!(outcome.unresolved.is_empty());
        let edges = ws.edges();
        assert_eq!(edges.len(), 2);
        assert!(edges[0].touches("a") && edges[0].touches("b"));
        assert!(edges[1].touches("c"));

        let nodes = ws.nodes();
        for (idx, edge) in edges.iter().enumerate() {
            let others: Vec<Edge> = edges
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, e)| e.clone())
                .collect();
            let from = ws.node(&edge.from_node).unwrap();
            let to = ws.node(&edge.to_node).unwrap();
            let check = detector.would_collide(&from, &to, edge.from_port, edge.to_port, &others, &nodes);
            assert!(!check.is_collision(), "{edge:?} collides: {check:?}");
        }
    }

    #[test]
    fn isolated_node_prefers_high_affinity_partner() {
        let affinity = AffinityTable::from_json5(
            r#"{ pairs: [
                { from: "battery", to: "radio", affinity: 95 },
                { from: "battery", to: "pump", affinity: 5 },
            ] }"#,
        )
        .unwrap();
        let mut ws = workspace(&[
            ("pump", "pump", "fluid", 100.0, 100.0),
            ("radio", "radio", "comms", 500.0, 100.0),
            ("battery", "battery", "power", 300.0, 400.0),
        ]);
        ws.add_edge("pump", Port::Right, "radio", Port::Left).unwrap();

        let detector = CollisionDetector::default();
        let config = ConnectConfig::default();
        let connector = AutoConnector::new(&affinity, &detector, &config);
        let outcome = connector.connect_isolated_modules(&mut ws);
        assert_eq!(outcome.edges_added(), 1);
        assert!(outcome.created[0].touches("battery"));
        assert!(outcome.created[0].touches("radio"));
    }

    #[test]
    fn same_dimension_and_proximity_break_even_affinity() {
        let ws = workspace(&[
            ("a", "x", "fluid", 0.0, 0.0),
            ("near", "x", "fluid", 300.0, 0.0),
            ("far", "x", "power", 900.0, 600.0),
        ]);
        let nodes = ws.nodes();
        let detector = CollisionDetector::default();
        let config = ConnectConfig::default();
        let connector = AutoConnector::new(&NoAffinity, &detector, &config);
        let connected: HashSet<String> = HashSet::new();
        let target = connector
            .find_best_target(&nodes[0], &nodes, &[], &connected)
            .unwrap();
        assert_eq!(target.id, "near");
    }

    #[test]
    fn fewer_than_two_nodes_is_a_no_op() {
        let mut ws = workspace(&[("solo", "x", "d", 0.0, 0.0)]);
        let detector = CollisionDetector::default();
        let config = ConnectConfig::default();
        let outcome =
            AutoConnector::new(&NoAffinity, &detector, &config).connect_isolated_modules(&mut ws);
        assert_eq!(outcome.edges_added(), 0);
        assert!(ws.edges().is_empty());
    }

    #[test]
    fn already_connected_graph_is_left_alone() {
        let mut ws = workspace(&[("a", "x", "d", 0.0, 0.0), ("b", "x", "d", 400.0, 0.0)]);
        ws.add_edge("a", Port::Right, "b", Port::Left).unwrap();
        let detector = CollisionDetector::default();
        let config = ConnectConfig::default();
        let outcome =
            AutoConnector::new(&NoAffinity, &detector, &config).connect_isolated_modules(&mut ws);
        assert_eq!(outcome.edges_added(), 0);
        assert_eq!(ws.edges().len(), 1);
    }

    #[test]
    fn every_isolated_node_gets_wired() {
        let mut ws = MemoryWorkspace::new();
        for i in 0..8 {
            let x = (i % 4) as f32 * 280.0;
            let y = (i / 4) as f32 * 200.0;
            ws.insert_node(Node::new(format!("n{i}"), "x", "d", x, y));
        }
        let detector = CollisionDetector::default();
        let config = ConnectConfig::default();
        let outcome =
            AutoConnector::new(&NoAffinity, &detector, &config).connect_isolated_modules(&mut ws);
        assert_eq!(outcome.edges_added(), 7);
        assert!(outcome.unresolved.is_empty());
    }
}
