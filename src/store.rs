//! Collaborator seams: the workspace store that owns nodes and edges, and the
//! canvas geometry provider.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ir::{Edge, Node, Port};

pub const DEFAULT_CANVAS_WIDTH: f32 = 1200.0;
pub const DEFAULT_CANVAS_HEIGHT: f32 = 800.0;

/// The live node/edge state of a composer canvas.
///
/// The engine reads and requests mutation through this trait and never
/// allocates node ids itself. Mutations addressing ids that are not live
/// report `false`/`None` instead of failing.
pub trait WorkspaceStore {
    fn nodes(&self) -> Vec<Node>;
    fn edges(&self) -> Vec<Edge>;

    /// Creates a connection. Returns `None` for unknown ids or a self-loop.
    fn add_edge(&mut self, from: &str, from_port: Port, to: &str, to_port: Port) -> Option<Edge>;
    fn remove_edge(&mut self, id: &str) -> bool;
    /// Removes a node together with every edge that touches it.
    fn remove_node(&mut self, id: &str) -> bool;
    fn update_node_position(&mut self, id: &str, x: f32, y: f32) -> bool;
    /// Reinstates a node captured in a snapshot, keeping its original id.
    fn restore_node(&mut self, node: Node) -> bool;
    fn redraw_edges(&mut self);

    fn node(&self, id: &str) -> Option<Node> {
        self.nodes().into_iter().find(|node| node.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

pub trait CanvasGeometry {
    /// Current rendering surface size, if one is mounted.
    fn size(&self) -> Option<CanvasSize>;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedCanvas(pub CanvasSize);

impl FixedCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self(CanvasSize { width, height })
    }
}

impl CanvasGeometry for FixedCanvas {
    fn size(&self) -> Option<CanvasSize> {
        Some(self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCanvas;

impl CanvasGeometry for NoCanvas {
    fn size(&self) -> Option<CanvasSize> {
        None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceFile {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// An edge as written in a workspace file; ids are optional because the
/// store assigns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub from_node: String,
    pub from_port: Port,
    pub to_node: String,
    pub to_port: Port,
}

/// In-memory store backing the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkspace {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    next_edge: u64,
    redraws: u64,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file: WorkspaceFile) -> Self {
        let mut workspace = Self::new();
        for node in file.nodes {
            workspace.insert_node(node);
        }
        for spec in file.edges {
            let created =
                workspace.add_edge(&spec.from_node, spec.from_port, &spec.to_node, spec.to_port);
            if created.is_none() {
                debug!(from = %spec.from_node, to = %spec.to_node, "skipping invalid edge in workspace file");
            }
        }
        workspace
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        let file: WorkspaceFile = serde_json::from_str(contents)?;
        Ok(Self::from_file(file))
    }

    /// Places a node; a node with an existing id replaces the old one.
    pub fn insert_node(&mut self, node: Node) {
        match self.nodes.iter_mut().find(|existing| existing.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }
}

impl WorkspaceStore for MemoryWorkspace {
    fn nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    fn edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    fn add_edge(&mut self, from: &str, from_port: Port, to: &str, to_port: Port) -> Option<Edge> {
        if from == to || !self.has_node(from) || !self.has_node(to) {
            return None;
        }
        self.next_edge += 1;
        let edge = Edge {
            id: format!("edge-{}", self.next_edge),
            from_node: from.to_string(),
            from_port,
            to_node: to.to_string(),
            to_port,
        };
        self.edges.push(edge.clone());
        Some(edge)
    }

    fn remove_edge(&mut self, id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.id != id);
        self.edges.len() != before
    }

    fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != id);
        if self.nodes.len() == before {
            return false;
        }
        self.edges.retain(|edge| !edge.touches(id));
        true
    }

    fn update_node_position(&mut self, id: &str, x: f32, y: f32) -> bool {
        match self.nodes.iter_mut().find(|node| node.id == id) {
            Some(node) => {
                node.x = x;
                node.y = y;
                true
            }
            None => false,
        }
    }

    fn restore_node(&mut self, node: Node) -> bool {
        if self.has_node(&node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    fn redraw_edges(&mut self) {
        self.redraws += 1;
    }
}
