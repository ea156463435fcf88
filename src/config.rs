use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ComposerError;
use crate::ir::{MODULE_HEIGHT, MODULE_WIDTH};
use crate::store::{CanvasSize, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub padding: f32,
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    pub start_y: f32,
    pub order_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: MODULE_WIDTH,
            node_height: MODULE_HEIGHT,
            padding: 50.0,
            horizontal_gap: 80.0,
            vertical_gap: 160.0,
            start_y: 100.0,
            order_passes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    /// Intersections whose edge parameter falls outside
    /// `(edge_interior_min, edge_interior_max)` are ignored.
    pub edge_interior_min: f32,
    pub edge_interior_max: f32,
    pub node_padding: f32,
    pub collision_penalty: f32,
    pub direction_bonus: f32,
    pub length_divisor: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            edge_interior_min: 0.05,
            edge_interior_max: 0.95,
            node_padding: 10.0,
            collision_penalty: 1000.0,
            direction_bonus: 50.0,
            length_divisor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectConfig {
    pub default_affinity: f32,
    pub same_dimension_bonus: f32,
    pub proximity_base: f32,
    pub proximity_divisor: f32,
    pub naive_collision_penalty: f32,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            default_affinity: 50.0,
            same_dimension_bonus: 20.0,
            proximity_base: 100.0,
            proximity_divisor: 5.0,
            naive_collision_penalty: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub max_snapshots: usize,
    /// Nodes closer than this to their snapshot position count as unmoved.
    pub move_tolerance: f32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_snapshots: 10,
            move_tolerance: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub animate: bool,
    pub animation_ms: u64,
    pub frame_ms: u64,
    pub phase_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            animate: true,
            animation_ms: 500,
            frame_ms: 16,
            phase_delay_ms: 300,
        }
    }
}

impl PipelineConfig {
    pub fn animation(&self) -> AnimationOptions {
        AnimationOptions {
            animate: self.animate,
            duration: Duration::from_millis(self.animation_ms),
            frame: Duration::from_millis(self.frame_ms.max(1)),
        }
    }

    pub fn phase_delay(&self) -> Duration {
        Duration::from_millis(self.phase_delay_ms)
    }

    /// No animation and no staggering, for headless runs.
    pub fn instant() -> Self {
        Self {
            animate: false,
            animation_ms: 0,
            frame_ms: 16,
            phase_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationOptions {
    pub animate: bool,
    pub duration: Duration,
    pub frame: Duration,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        PipelineConfig::default().animation()
    }
}

impl AnimationOptions {
    pub fn immediate() -> Self {
        Self {
            animate: false,
            duration: Duration::ZERO,
            frame: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub default_width: f32,
    pub default_height: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            default_width: DEFAULT_CANVAS_WIDTH,
            default_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl CanvasConfig {
    pub fn fallback(&self) -> CanvasSize {
        CanvasSize {
            width: self.default_width,
            height: self.default_height,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub layout: LayoutConfig,
    pub collision: CollisionConfig,
    pub connect: ConnectConfig,
    pub history: HistoryConfig,
    pub pipeline: PipelineConfig,
    pub canvas: CanvasConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    collision: Option<CollisionConfigFile>,
    connect: Option<ConnectConfigFile>,
    history: Option<HistoryConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    canvas: Option<CanvasConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    padding: Option<f32>,
    horizontal_gap: Option<f32>,
    vertical_gap: Option<f32>,
    start_y: Option<f32>,
    order_passes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollisionConfigFile {
    edge_interior_min: Option<f32>,
    edge_interior_max: Option<f32>,
    node_padding: Option<f32>,
    collision_penalty: Option<f32>,
    direction_bonus: Option<f32>,
    length_divisor: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectConfigFile {
    default_affinity: Option<f32>,
    same_dimension_bonus: Option<f32>,
    proximity_base: Option<f32>,
    proximity_divisor: Option<f32>,
    naive_collision_penalty: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryConfigFile {
    max_snapshots: Option<usize>,
    move_tolerance: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineConfigFile {
    animate: Option<bool>,
    animation_ms: Option<u64>,
    frame_ms: Option<u64>,
    phase_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasConfigFile {
    default_width: Option<f32>,
    default_height: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.padding {
            config.layout.padding = v;
        }
        if let Some(v) = layout.horizontal_gap {
            config.layout.horizontal_gap = v;
        }
        if let Some(v) = layout.vertical_gap {
            config.layout.vertical_gap = v;
        }
        if let Some(v) = layout.start_y {
            config.layout.start_y = v;
        }
        if let Some(v) = layout.order_passes {
            config.layout.order_passes = v;
        }
    }

    if let Some(collision) = parsed.collision {
        if let Some(v) = collision.edge_interior_min {
            config.collision.edge_interior_min = v;
        }
        if let Some(v) = collision.edge_interior_max {
            config.collision.edge_interior_max = v;
        }
        if let Some(v) = collision.node_padding {
            config.collision.node_padding = v;
        }
        if let Some(v) = collision.collision_penalty {
            config.collision.collision_penalty = v;
        }
        if let Some(v) = collision.direction_bonus {
            config.collision.direction_bonus = v;
        }
        if let Some(v) = collision.length_divisor {
            config.collision.length_divisor = v;
        }
    }
    if config.collision.edge_interior_min >= config.collision.edge_interior_max {
        return Err(ComposerError::Config(format!(
            "collision.edgeInteriorMin ({}) must be below edgeInteriorMax ({})",
            config.collision.edge_interior_min, config.collision.edge_interior_max
        ))
        .into());
    }

    if let Some(connect) = parsed.connect {
        if let Some(v) = connect.default_affinity {
            config.connect.default_affinity = v;
        }
        if let Some(v) = connect.same_dimension_bonus {
            config.connect.same_dimension_bonus = v;
        }
        if let Some(v) = connect.proximity_base {
            config.connect.proximity_base = v;
        }
        if let Some(v) = connect.proximity_divisor {
            config.connect.proximity_divisor = v;
        }
        if let Some(v) = connect.naive_collision_penalty {
            config.connect.naive_collision_penalty = v;
        }
    }

    if let Some(history) = parsed.history {
        if let Some(v) = history.max_snapshots {
            config.history.max_snapshots = v.max(1);
        }
        if let Some(v) = history.move_tolerance {
            config.history.move_tolerance = v;
        }
    }

    if let Some(pipeline) = parsed.pipeline {
        if let Some(v) = pipeline.animate {
            config.pipeline.animate = v;
        }
        if let Some(v) = pipeline.animation_ms {
            config.pipeline.animation_ms = v;
        }
        if let Some(v) = pipeline.frame_ms {
            config.pipeline.frame_ms = v;
        }
        if let Some(v) = pipeline.phase_delay_ms {
            config.pipeline.phase_delay_ms = v;
        }
    }

    if let Some(canvas) = parsed.canvas {
        if let Some(v) = canvas.default_width {
            config.canvas.default_width = v;
        }
        if let Some(v) = canvas.default_height {
            config.canvas.default_height = v;
        }
    }

    Ok(config)
}
