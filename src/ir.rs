use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ComposerError;

/// Every module on the canvas has the same logical footprint.
pub const MODULE_WIDTH: f32 = 200.0;
pub const MODULE_HEIGHT: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    Top,
    Right,
    Bottom,
    Left,
}

impl Port {
    pub const ALL: [Port; 4] = [Port::Top, Port::Right, Port::Bottom, Port::Left];

    pub fn as_str(self) -> &'static str {
        match self {
            Port::Top => "top",
            Port::Right => "right",
            Port::Bottom => "bottom",
            Port::Left => "left",
        }
    }
}

impl FromStr for Port {
    type Err = ComposerError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "top" => Ok(Port::Top),
            "right" => Ok(Port::Right),
            "bottom" => Ok(Port::Bottom),
            "left" => Ok(Port::Left),
            other => Err(ComposerError::InvalidPort(other.to_string())),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub dimension: String,
    pub x: f32,
    pub y: f32,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        template_id: impl Into<String>,
        dimension: impl Into<String>,
        x: f32,
        y: f32,
    ) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            dimension: dimension.into(),
            x,
            y,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + MODULE_WIDTH / 2.0, self.y + MODULE_HEIGHT / 2.0)
    }

    /// Boundary midpoint of the given side.
    pub fn port_point(&self, port: Port) -> (f32, f32) {
        match port {
            Port::Top => (self.x + MODULE_WIDTH / 2.0, self.y),
            Port::Bottom => (self.x + MODULE_WIDTH / 2.0, self.y + MODULE_HEIGHT),
            Port::Left => (self.x, self.y + MODULE_HEIGHT / 2.0),
            Port::Right => (self.x + MODULE_WIDTH, self.y + MODULE_HEIGHT / 2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub from_node: String,
    pub from_port: Port,
    pub to_node: String,
    pub to_port: Port,
}

impl Edge {
    pub fn touches(&self, node_id: &str) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    pub fn shares_node_with(&self, other: &Edge) -> bool {
        self.touches(&other.from_node) || self.touches(&other.to_node)
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from_node: self.from_node.clone(),
            from_port: self.from_port,
            to_node: self.to_node.clone(),
            to_port: self.to_port,
        }
    }
}

/// Identity of a connection independent of the id the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub from_node: String,
    pub from_port: Port,
    pub to_node: String,
    pub to_port: Port,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub from: Port,
    pub to: Port,
}

impl Default for PortPair {
    fn default() -> Self {
        Self {
            from: Port::Right,
            to: Port::Left,
        }
    }
}
