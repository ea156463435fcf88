use std::collections::{HashMap, VecDeque};

use crate::ir::{Edge, Node};

/// Barycenters closer than this are treated as a tie.
const TIE_EPSILON: f32 = 1e-4;

/// Undirected neighbor lists indexed by node position in the input slice.
/// Self-loops and edges naming unknown nodes are dropped; duplicate node ids
/// resolve to their first occurrence.
pub(super) fn build_adjacency(nodes: &[Node], edges: &[Edge]) -> Vec<Vec<usize>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(idx);
    }
    let mut adjacency = vec![Vec::new(); nodes.len()];
    for edge in edges {
        let (Some(&from), Some(&to)) = (
            index.get(edge.from_node.as_str()),
            index.get(edge.to_node.as_str()),
        ) else {
            continue;
        };
        if from == to {
            continue;
        }
        adjacency[from].push(to);
        adjacency[to].push(from);
    }
    adjacency
}

/// BFS tiering from the highest-degree node. Nodes the BFS never reaches
/// share the tier just below the deepest reached one.
pub(super) fn assign_tiers(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let count = adjacency.len();
    if count == 0 {
        return Vec::new();
    }
    if adjacency.iter().all(|neighbors| neighbors.is_empty()) {
        return vec![0; count];
    }

    let mut root = 0;
    for (idx, neighbors) in adjacency.iter().enumerate() {
        if neighbors.len() > adjacency[root].len() {
            root = idx;
        }
    }

    let mut tiers: Vec<Option<usize>> = vec![None; count];
    tiers[root] = Some(0);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        let tier = tiers[current].unwrap_or(0);
        for &next in &adjacency[current] {
            if tiers[next].is_none() {
                tiers[next] = Some(tier + 1);
                queue.push_back(next);
            }
        }
    }

    let deepest = tiers.iter().flatten().copied().max().unwrap_or(0);
    tiers
        .into_iter()
        .map(|tier| tier.unwrap_or(deepest + 1))
        .collect()
}

/// Buckets node indices by tier, keeping input order inside a tier.
pub(super) fn group_tiers(tiers: &[usize]) -> Vec<Vec<usize>> {
    let depth = tiers.iter().copied().max().map_or(0, |max| max + 1);
    let mut buckets = vec![Vec::new(); depth];
    for (idx, &tier) in tiers.iter().enumerate() {
        buckets[tier].push(idx);
    }
    buckets.retain(|bucket| !bucket.is_empty());
    buckets
}

fn update_positions(tier_nodes: &[Vec<usize>], positions: &mut [usize], tier_of: &mut [usize]) {
    for (rank, bucket) in tier_nodes.iter().enumerate() {
        for (pos, &node) in bucket.iter().enumerate() {
            positions[node] = pos;
            tier_of[node] = rank;
        }
    }
}

/// Mean position of the node's neighbors in `reference`, if it has any there.
pub(super) fn barycenter(
    node: usize,
    reference: usize,
    adjacency: &[Vec<usize>],
    positions: &[usize],
    tier_of: &[usize],
) -> Option<f32> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &neighbor in &adjacency[node] {
        if tier_of[neighbor] == reference {
            sum += positions[neighbor] as f32;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f32)
}

/// Alternating forward/backward barycenter sweeps over the tiers.
pub(super) fn order_tiers(tier_nodes: &mut [Vec<usize>], adjacency: &[Vec<usize>], passes: usize) {
    if tier_nodes.len() <= 1 {
        return;
    }
    let mut positions = vec![0usize; adjacency.len()];
    let mut tier_of = vec![0usize; adjacency.len()];
    update_positions(tier_nodes, &mut positions, &mut tier_of);

    let sort_bucket = |bucket: &mut Vec<usize>, reference: usize, positions: &[usize], tier_of: &[usize]| {
        let keys: HashMap<usize, f32> = bucket
            .iter()
            .map(|&node| {
                let key = barycenter(node, reference, adjacency, positions, tier_of)
                    .unwrap_or(positions[node] as f32);
                (node, key)
            })
            .collect();
        bucket.sort_by(|a, b| keys[a].total_cmp(&keys[b]));
    };

    for _ in 0..passes {
        for rank in 1..tier_nodes.len() {
            if tier_nodes[rank].len() > 1 {
                sort_bucket(&mut tier_nodes[rank], rank - 1, &positions, &tier_of);
                update_positions(tier_nodes, &mut positions, &mut tier_of);
            }
        }
        for rank in (0..tier_nodes.len() - 1).rev() {
            if tier_nodes[rank].len() > 1 {
                sort_bucket(&mut tier_nodes[rank], rank + 1, &positions, &tier_of);
                update_positions(tier_nodes, &mut positions, &mut tier_of);
            }
        }
    }
}

fn same_key(a: Option<f32>, b: Option<f32>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() < TIE_EPSILON,
        _ => false,
    }
}

/// Within each tier, runs of adjacent nodes whose barycenter ties (including
/// nodes with no neighbors in the reference tier) are regrouped by dimension.
pub(super) fn group_ties_by_dimension(
    tier_nodes: &mut [Vec<usize>],
    adjacency: &[Vec<usize>],
    nodes: &[Node],
) {
    let mut positions = vec![0usize; adjacency.len()];
    let mut tier_of = vec![0usize; adjacency.len()];
    update_positions(tier_nodes, &mut positions, &mut tier_of);
    let tier_count = tier_nodes.len();

    for rank in 0..tier_count {
        let reference = if rank > 0 {
            Some(rank - 1)
        } else if tier_count > 1 {
            Some(1)
        } else {
            None
        };
        let bucket = &mut tier_nodes[rank];
        let keys: Vec<Option<f32>> = bucket
            .iter()
            .map(|&node| {
                reference.and_then(|reference| {
                    barycenter(node, reference, adjacency, &positions, &tier_of)
                })
            })
            .collect();

        let mut start = 0;
        while start < bucket.len() {
            let mut end = start + 1;
            while end < bucket.len() && same_key(keys[start], keys[end]) {
                end += 1;
            }
            bucket[start..end].sort_by(|a, b| nodes[*a].dimension.cmp(&nodes[*b].dimension));
            start = end;
        }
        update_positions(tier_nodes, &mut positions, &mut tier_of);
    }
}
