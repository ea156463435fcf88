//! Straight-line connection geometry: collision checks for a candidate
//! connection, port selection, and the crossing metric used in run reports.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::CollisionConfig;
use crate::ir::{Edge, MODULE_HEIGHT, MODULE_WIDTH, Node, Port, PortPair};

pub type Point = (f32, f32);
pub type Segment = (Point, Point);

/// Denominators below this are treated as parallel segments.
const PARALLEL_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn of_node(node: &Node) -> Self {
        Self {
            x: node.x,
            y: node.y,
            width: MODULE_WIDTH,
            height: MODULE_HEIGHT,
        }
    }

    pub fn padded(self, pad: f32) -> Self {
        Self {
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + pad * 2.0,
            height: self.height + pad * 2.0,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.0 >= self.x && p.0 <= self.x + self.width && p.1 >= self.y && p.1 <= self.y + self.height
    }

    fn sides(&self) -> [Segment; 4] {
        let corners = [
            (self.x, self.y),
            (self.x + self.width, self.y),
            (self.x + self.width, self.y + self.height),
            (self.x, self.y + self.height),
        ];
        [
            (corners[0], corners[1]),
            (corners[1], corners[2]),
            (corners[2], corners[3]),
            (corners[3], corners[0]),
        ]
    }
}

/// Outcome of [`CollisionDetector::would_collide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collision {
    Clear,
    /// The candidate crosses an existing connection.
    Edge { edge_id: String },
    /// The candidate passes through (or starts inside) an unrelated module.
    Node { node_id: String },
}

impl Collision {
    pub fn is_collision(&self) -> bool {
        !matches!(self, Collision::Clear)
    }

    pub fn report(&self) -> CollisionReport {
        match self {
            Collision::Clear => CollisionReport {
                collision: false,
                kind: None,
                with: None,
            },
            Collision::Edge { edge_id } => CollisionReport {
                collision: true,
                kind: Some("edge"),
                with: Some(edge_id.clone()),
            },
            Collision::Node { node_id } => CollisionReport {
                collision: true,
                kind: Some("node"),
                with: Some(node_id.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollisionReport {
    pub collision: bool,
    #[serde(rename = "type")]
    pub kind: Option<&'static str>,
    pub with: Option<String>,
}

/// Solves `a + t(b - a) = c + u(d - c)`. `None` for parallel segments.
pub fn intersection_params(a: Point, b: Point, c: Point, d: Point) -> Option<(f32, f32)> {
    let denom = (a.0 - b.0) * (c.1 - d.1) - (a.1 - b.1) * (c.0 - d.0);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = ((a.0 - c.0) * (c.1 - d.1) - (a.1 - c.1) * (c.0 - d.0)) / denom;
    let u = -((a.0 - b.0) * (a.1 - c.1) - (a.1 - b.1) * (a.0 - c.0)) / denom;
    Some((t, u))
}

/// True when both parameters fall strictly inside `(lo, hi)`, so segments that
/// only meet near a shared port are not reported.
pub fn segments_cross_interior(a: Point, b: Point, c: Point, d: Point, lo: f32, hi: f32) -> bool {
    match intersection_params(a, b, c, d) {
        Some((t, u)) => t > lo && t < hi && u > lo && u < hi,
        None => false,
    }
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    match intersection_params(a, b, c, d) {
        Some((t, u)) => (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u),
        None => false,
    }
}

pub fn segment_intersects_rect(a: Point, b: Point, rect: &Rect) -> bool {
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    rect.sides()
        .iter()
        .any(|&(c, d)| segments_intersect(a, b, c, d))
}

fn segment_length(segment: Segment) -> f32 {
    let ((x1, y1), (x2, y2)) = segment;
    ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
}

fn node_index(nodes: &[Node]) -> HashMap<&str, &Node> {
    nodes.iter().map(|node| (node.id.as_str(), node)).collect()
}

/// Segment of a live edge; `None` when either endpoint is gone.
pub fn edge_segment(edge: &Edge, nodes: &HashMap<&str, &Node>) -> Option<Segment> {
    let from = nodes.get(edge.from_node.as_str())?;
    let to = nodes.get(edge.to_node.as_str())?;
    Some((from.port_point(edge.from_port), to.port_point(edge.to_port)))
}

/// Port pairing favoured by the relative position of the two modules.
pub fn dominant_direction(from: &Node, to: &Node) -> PortPair {
    let (fx, fy) = from.center();
    let (tx, ty) = to.center();
    let dx = tx - fx;
    let dy = ty - fy;
    if dy.abs() > dx.abs() {
        if dy > 0.0 {
            PortPair {
                from: Port::Bottom,
                to: Port::Top,
            }
        } else {
            PortPair {
                from: Port::Top,
                to: Port::Bottom,
            }
        }
    } else if dx >= 0.0 {
        PortPair {
            from: Port::Right,
            to: Port::Left,
        }
    } else {
        PortPair {
            from: Port::Left,
            to: Port::Right,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollisionDetector {
    config: CollisionConfig,
}

impl CollisionDetector {
    pub fn new(config: CollisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn would_collide(
        &self,
        from: &Node,
        to: &Node,
        from_port: Port,
        to_port: Port,
        existing_edges: &[Edge],
        all_nodes: &[Node],
    ) -> Collision {
        let index = node_index(all_nodes);
        self.check_segment(
            from,
            to,
            (from.port_point(from_port), to.port_point(to_port)),
            existing_edges,
            all_nodes,
            &index,
        )
    }

    fn check_segment(
        &self,
        from: &Node,
        to: &Node,
        candidate: Segment,
        existing_edges: &[Edge],
        all_nodes: &[Node],
        index: &HashMap<&str, &Node>,
    ) -> Collision {
        let (a, b) = candidate;
        let lo = self.config.edge_interior_min;
        let hi = self.config.edge_interior_max;

        for edge in existing_edges {
            let Some((c, d)) = edge_segment(edge, index) else {
                continue;
            };
            if segments_cross_interior(a, b, c, d, lo, hi) {
                return Collision::Edge {
                    edge_id: edge.id.clone(),
                };
            }
        }

        for node in all_nodes {
            if node.id == from.id || node.id == to.id {
                continue;
            }
            let rect = Rect::of_node(node).padded(self.config.node_padding);
            if segment_intersects_rect(a, b, &rect) {
                return Collision::Node {
                    node_id: node.id.clone(),
                };
            }
        }

        Collision::Clear
    }

    /// Scores the twelve port pairings with distinct sides and returns the best.
    pub fn find_best_ports(
        &self,
        from: &Node,
        to: &Node,
        existing_edges: &[Edge],
        all_nodes: &[Node],
    ) -> PortPair {
        let index = node_index(all_nodes);
        let preferred = dominant_direction(from, to);
        let mut best: Option<(PortPair, f32)> = None;

        for from_port in Port::ALL {
            for to_port in Port::ALL {
                if from_port == to_port {
                    continue;
                }
                let pair = PortPair {
                    from: from_port,
                    to: to_port,
                };
                let segment = (from.port_point(from_port), to.port_point(to_port));
                let mut score = 0.0;
                if self
                    .check_segment(from, to, segment, existing_edges, all_nodes, &index)
                    .is_collision()
                {
                    score -= self.config.collision_penalty;
                }
                if pair == preferred {
                    score += self.config.direction_bonus;
                }
                score -= segment_length(segment) / self.config.length_divisor;

                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((pair, score));
                }
            }
        }

        best.map(|(pair, _)| pair).unwrap_or_default()
    }

    /// Pairwise crossings between non-adjacent edges across the whole graph.
    pub fn count_crossings(&self, edges: &[Edge], nodes: &[Node]) -> usize {
        let index = node_index(nodes);
        let lo = self.config.edge_interior_min;
        let hi = self.config.edge_interior_max;
        let segments: Vec<(&Edge, Segment)> = edges
            .iter()
            .filter_map(|edge| edge_segment(edge, &index).map(|segment| (edge, segment)))
            .collect();

        let mut crossings = 0;
        for (i, (edge_a, (a, b))) in segments.iter().enumerate() {
            for (edge_b, (c, d)) in &segments[i + 1..] {
                if edge_a.shares_node_with(edge_b) {
                    continue;
                }
                if segments_cross_interior(*a, *b, *c, *d, lo, hi) {
                    crossings += 1;
                }
            }
        }
        crossings
    }
}
