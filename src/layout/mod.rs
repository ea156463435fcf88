mod ranking;

use ranking::*;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::{AnimationOptions, LayoutConfig};
use crate::error::Result;
use crate::ir::{Edge, Node};
use crate::store::{CanvasSize, WorkspaceStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    pub node_id: String,
    pub x: f32,
    pub y: f32,
    pub tier: usize,
}

fn clamp_axis(value: f32, padding: f32, extent: f32, size: f32) -> f32 {
    let lo = padding;
    let hi = (extent - size - padding).max(lo);
    value.clamp(lo, hi)
}

/// Computes layered target coordinates for every node.
///
/// Pure and deterministic for a given input order. `canvas` falls back to the
/// default 1200x800 surface when no geometry is available.
pub fn optimize_layout(
    nodes: &[Node],
    edges: &[Edge],
    canvas: Option<CanvasSize>,
    config: &LayoutConfig,
) -> Vec<NodePlacement> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let canvas = canvas.unwrap_or_default();

    let adjacency = build_adjacency(nodes, edges);
    let tiers = assign_tiers(&adjacency);
    let mut tier_nodes = group_tiers(&tiers);
    order_tiers(&mut tier_nodes, &adjacency, config.order_passes);
    group_ties_by_dimension(&mut tier_nodes, &adjacency, nodes);

    let center_x = canvas.width / 2.0;
    let step_x = config.node_width + config.horizontal_gap;
    let mut placements = Vec::with_capacity(nodes.len());
    for bucket in &tier_nodes {
        let count = bucket.len() as f32;
        let row_width = count * config.node_width + (count - 1.0) * config.horizontal_gap;
        let start_x = center_x - row_width / 2.0;
        for (slot, &idx) in bucket.iter().enumerate() {
            let tier = tiers[idx];
            let x = start_x + slot as f32 * step_x;
            let y = config.start_y + tier as f32 * config.vertical_gap;
            placements.push(NodePlacement {
                node_id: nodes[idx].id.clone(),
                x: clamp_axis(x, config.padding, canvas.width, config.node_width),
                y: clamp_axis(y, config.padding, canvas.height, config.node_height),
                tier,
            });
        }
    }
    placements
}

fn ease_in_out(progress: f32) -> f32 {
    if progress < 0.5 {
        4.0 * progress * progress * progress
    } else {
        1.0 - (-2.0 * progress + 2.0).powi(3) / 2.0
    }
}

/// Writes placements into the store, optionally interpolating over
/// `animation.duration`, then requests an edge redraw.
///
/// Placements naming nodes that are no longer live are skipped. Returns the
/// number of nodes positioned. On cancellation the nodes keep the positions
/// of the last rendered frame.
pub async fn apply_layout<S>(
    store: &mut S,
    placements: &[NodePlacement],
    animation: AnimationOptions,
    cancel: &mut CancelToken,
) -> Result<usize>
where
    S: WorkspaceStore + ?Sized,
{
    let starts: HashMap<String, (f32, f32)> = store
        .nodes()
        .into_iter()
        .map(|node| (node.id, (node.x, node.y)))
        .collect();
    let moves: Vec<(&NodePlacement, (f32, f32))> = placements
        .iter()
        .filter_map(|placement| {
            starts
                .get(&placement.node_id)
                .map(|&start| (placement, start))
        })
        .collect();

    if animation.animate && !animation.duration.is_zero() {
        let frames = (animation.duration.as_millis() / animation.frame.as_millis().max(1)).max(1) as u32;
        for frame in 1..frames {
            let t = ease_in_out(frame as f32 / frames as f32);
            for (placement, (sx, sy)) in &moves {
                store.update_node_position(
                    &placement.node_id,
                    sx + (placement.x - sx) * t,
                    sy + (placement.y - sy) * t,
                );
            }
            cancel.pause(animation.frame).await?;
        }
    }
    cancel.check()?;

    for (placement, _) in &moves {
        store.update_node_position(&placement.node_id, placement.x, placement.y);
    }
    store.redraw_edges();
    debug!(nodes = moves.len(), animated = animation.animate, "layout applied");
    Ok(moves.len())
}
