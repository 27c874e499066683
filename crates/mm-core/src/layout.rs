//! Tree layout solver.
//!
//! Converts the tree structure into absolute node positions for one of five
//! directions. The four tiered directions place depth on the primary axis
//! and sibling order on the secondary axis, centering every parent over the
//! span of its children. The radial direction places depth on concentric
//! rings and divides each subtree's angular span among its children by
//! visible leaf count.
//!
//! Layout only sees the *visible* tree: a collapsed node's descendants take
//! no space and receive no position. The result is a pure function of the
//! tree and the direction.

use crate::id::NodeId;
use crate::model::{Edge, LayoutDirection, Position, TreeModel};
use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;

/// The canvas (viewport) dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Node box size and spacing used by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Gap between consecutive depth tiers.
    pub level_gap: f32,
    /// Gap between neighbouring leaves on the secondary axis.
    pub sibling_gap: f32,
    /// Radius step between depth rings in radial mode.
    pub ring_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            node_height: 48.0,
            level_gap: 80.0,
            sibling_gap: 24.0,
            ring_gap: 220.0,
        }
    }
}

/// Absolute box of a laid-out node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NodeBounds {
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Squared distance from a point to the box center.
    pub fn distance_sq_to_center(&self, px: f32, py: f32) -> f32 {
        let (cx, cy) = self.center();
        (px - cx).powi(2) + (py - cy).powi(2)
    }

    fn union(&self, other: &NodeBounds) -> NodeBounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        NodeBounds {
            x,
            y,
            width: (self.x + self.width).max(other.x + other.width) - x,
            height: (self.y + self.height).max(other.y + other.height) - y,
        }
    }
}

/// Box of a node placed at `position`.
pub fn node_bounds(position: Position, config: &LayoutConfig) -> NodeBounds {
    NodeBounds {
        x: position.x,
        y: position.y,
        width: config.node_width,
        height: config.node_height,
    }
}

// ─── Visibility ──────────────────────────────────────────────────────────

/// Children that take part in layout: none below a collapsed node.
fn visible_children(tree: &TreeModel, id: NodeId) -> Vec<NodeId> {
    match tree.get(id) {
        Some(node) if !node.collapsed => tree.children(id),
        _ => Vec::new(),
    }
}

/// Nodes with no collapsed strict ancestor, in pre-order.
pub fn visible_nodes(tree: &TreeModel) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(tree.len());
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        out.push(id);
        stack.extend(visible_children(tree, id).into_iter().rev());
    }
    out
}

/// Edges whose endpoints are both visible.
pub fn visible_edges(tree: &TreeModel) -> Vec<Edge> {
    let visible: HashSet<NodeId> = visible_nodes(tree).into_iter().collect();
    tree.edges()
        .into_iter()
        .filter(|e| visible.contains(&e.source) && visible.contains(&e.target))
        .collect()
}

/// Bounds of every visible node at its current position.
pub fn visible_bounds(tree: &TreeModel, config: &LayoutConfig) -> Vec<(NodeId, NodeBounds)> {
    visible_nodes(tree)
        .into_iter()
        .filter_map(|id| tree.get(id).map(|n| (id, node_bounds(n.position, config))))
        .collect()
}

// ─── Solver ──────────────────────────────────────────────────────────────

/// Compute positions for every visible node.
pub fn compute_layout(
    tree: &TreeModel,
    direction: LayoutDirection,
    config: &LayoutConfig,
) -> HashMap<NodeId, Position> {
    let centers = match direction {
        LayoutDirection::Radial => radial_centers(tree, config),
        tiered => tiered_centers(tree, tiered, config),
    };

    centers
        .into_iter()
        .map(|(id, (cx, cy))| {
            let pos = Position::new(cx - config.node_width / 2.0, cy - config.node_height / 2.0);
            (id, pos)
        })
        .collect()
}

fn tiered_centers(
    tree: &TreeModel,
    direction: LayoutDirection,
    config: &LayoutConfig,
) -> HashMap<NodeId, (f32, f32)> {
    let horizontal = matches!(
        direction,
        LayoutDirection::LeftRight | LayoutDirection::RightLeft
    );
    let (extent, breadth) = if horizontal {
        (config.node_width, config.node_height)
    } else {
        (config.node_height, config.node_width)
    };
    let mirrored = matches!(
        direction,
        LayoutDirection::RightLeft | LayoutDirection::BottomTop
    );

    let secondary = secondary_centers(tree, breadth + config.sibling_gap);
    let root_center = secondary.get(&tree.root()).map_or(0.0, |&(_, c)| c);

    let step = extent + config.level_gap;
    secondary
        .into_iter()
        .map(|(id, (depth, secondary))| {
            let mut primary = depth as f32 * step;
            if mirrored {
                primary = -primary;
            }
            let secondary = secondary - root_center;
            let center = if horizontal {
                (primary, secondary)
            } else {
                (secondary, primary)
            };
            (id, center)
        })
        .collect()
}

/// Visible nodes in pre-order, each with its depth and visible children.
fn visible_walk(tree: &TreeModel) -> Vec<(NodeId, u32, Vec<NodeId>)> {
    let mut out = Vec::with_capacity(tree.len());
    let mut stack = vec![(tree.root(), 0)];
    while let Some((id, depth)) = stack.pop() {
        let children = visible_children(tree, id);
        stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
        out.push((id, depth, children));
    }
    out
}

/// Secondary-axis centers: each leaf takes the next slot in pre-order,
/// each parent sits midway between its first and last child.
fn secondary_centers(tree: &TreeModel, slot: f32) -> HashMap<NodeId, (u32, f32)> {
    let walk = visible_walk(tree);
    let mut centers: HashMap<NodeId, (u32, f32)> = HashMap::with_capacity(walk.len());

    let mut cursor = 0.0;
    for (id, depth, children) in &walk {
        if children.is_empty() {
            centers.insert(*id, (*depth, cursor + slot / 2.0));
            cursor += slot;
        }
    }

    // Reverse pre-order visits every child before its parent.
    for (id, depth, children) in walk.iter().rev() {
        let (Some(first), Some(last)) = (children.first(), children.last()) else {
            continue;
        };
        let edge = |child: &NodeId| centers.get(child).map_or(0.0, |&(_, c)| c);
        let center = (edge(first) + edge(last)) / 2.0;
        centers.insert(*id, (*depth, center));
    }
    centers
}

fn radial_centers(tree: &TreeModel, config: &LayoutConfig) -> HashMap<NodeId, (f32, f32)> {
    let walk = visible_walk(tree);

    let mut leaves: HashMap<NodeId, usize> = HashMap::with_capacity(walk.len());
    for (id, _, children) in walk.iter().rev() {
        let count = if children.is_empty() {
            1
        } else {
            children.iter().map(|c| leaves.get(c).copied().unwrap_or(1)).sum()
        };
        leaves.insert(*id, count);
    }

    // Each parent's `[start, start + span)` is split among its children by
    // leaf count; pre-order guarantees the parent's span is known first.
    let mut spans: HashMap<NodeId, (f32, f32)> = HashMap::with_capacity(walk.len());
    spans.insert(tree.root(), (0.0, TAU));
    let mut out = HashMap::with_capacity(walk.len());
    out.insert(tree.root(), (0.0, 0.0));

    for (id, depth, children) in &walk {
        let Some(&(start, span)) = spans.get(id) else {
            continue;
        };
        let total = leaves.get(id).copied().unwrap_or(1).max(1) as f32;
        let radius = (depth + 1) as f32 * config.ring_gap;

        let mut angle = start;
        for &child in children {
            let share = leaves.get(&child).copied().unwrap_or(1) as f32 / total;
            let child_span = span * share;
            let mid = angle + child_span / 2.0;
            out.insert(child, (radius * mid.cos(), radius * mid.sin()));
            spans.insert(child, (angle, child_span));
            angle += child_span;
        }
    }
    out
}

// ─── View fitting ────────────────────────────────────────────────────────

/// Camera transform that shows a set of bounds inside a viewport:
/// screen = world * zoom + (x, y).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFit {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 2.0;

/// Center `bounds` in `viewport`, scaling to fit with `padding` on each side.
pub fn fit_view(bounds: &[NodeBounds], viewport: Viewport, padding: f32) -> ViewFit {
    let Some(first) = bounds.first() else {
        return ViewFit {
            x: viewport.width / 2.0,
            y: viewport.height / 2.0,
            zoom: 1.0,
        };
    };
    let total = bounds.iter().skip(1).fold(*first, |acc, b| acc.union(b));

    let avail_w = (viewport.width - 2.0 * padding).max(1.0);
    let avail_h = (viewport.height - 2.0 * padding).max(1.0);
    let zoom = (avail_w / total.width.max(1.0))
        .min(avail_h / total.height.max(1.0))
        .clamp(MIN_ZOOM, MAX_ZOOM);

    let (cx, cy) = total.center();
    ViewFit {
        x: viewport.width / 2.0 - cx * zoom,
        y: viewport.height / 2.0 - cy * zoom,
        zoom,
    }
}
