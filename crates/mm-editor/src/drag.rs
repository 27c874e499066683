//! Drag-to-reparent controller.
//!
//! Translates a pointer drag over the canvas into a candidate tree move.
//! On every move tick the visible node whose box center is nearest the
//! pointer becomes the drop target, and the pointer's height inside that box
//! picks the drop position:
//!
//! | Band of target height | Drop position | Resulting move                       |
//! |-----------------------|---------------|--------------------------------------|
//! | top third             | `Above`       | sibling inserted before the target   |
//! | middle third          | `Over`        | last child of the target             |
//! | bottom third          | `Below`       | sibling inserted after the target    |
//!
//! Band boundaries belong to the middle band. A root target is always `Over`.
//! The dragged node and its descendants are never candidates.

use kurbo::{Point, Rect};
use mm_core::layout::{LayoutConfig, NodeBounds, node_bounds, visible_nodes};
use mm_core::{NodeId, Position, TreeModel};
use std::collections::HashSet;

/// Minimum pointer travel (px) before a drag may commit a move.
pub const DRAG_THRESHOLD: f32 = 5.0;

/// Where a dragged node lands relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropPosition {
    Above,
    Below,
    Over,
}

/// The current drop candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub node: NodeId,
    pub position: DropPosition,
}

/// Feedback for one pointer-move tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragUpdate {
    pub target: Option<DropTarget>,
    /// Where the dragged node should be drawn.
    pub preview: Position,
}

/// A validated move, ready for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveProposal {
    pub node: NodeId,
    pub new_parent: NodeId,
    /// Index in the new parent's child list with `node` detached.
    pub index: Option<usize>,
}

#[derive(Debug)]
struct DragState {
    node: NodeId,
    start_pointer: Point,
    last_pointer: Point,
    start_position: Position,
    /// The dragged subtree; never a valid target.
    excluded: HashSet<NodeId>,
    target: Option<DropTarget>,
}

#[derive(Debug)]
pub struct DragController {
    state: Option<DragState>,
    threshold: f32,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self::with_threshold(DRAG_THRESHOLD)
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            state: None,
            threshold,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    pub fn dragged(&self) -> Option<NodeId> {
        self.state.as_ref().map(|s| s.node)
    }

    pub fn current_target(&self) -> Option<DropTarget> {
        self.state.as_ref().and_then(|s| s.target)
    }

    /// Begin dragging `node_id` from pointer position `(x, y)`.
    /// The root cannot be dragged.
    pub fn on_drag_start(&mut self, node_id: NodeId, x: f32, y: f32, tree: &TreeModel) -> bool {
        let Some(node) = tree.get(node_id) else {
            return false;
        };
        if node.is_root {
            return false;
        }
        let pointer = Point::new(f64::from(x), f64::from(y));
        self.state = Some(DragState {
            node: node_id,
            start_pointer: pointer,
            last_pointer: pointer,
            start_position: node.position,
            excluded: tree.subtree(node_id).into_iter().collect(),
            target: None,
        });
        log::trace!("drag start {node_id} at ({x}, {y})");
        true
    }

    /// Pointer moved while dragging. Returns `None` if `node_id` is not the
    /// node being dragged.
    pub fn on_drag(
        &mut self,
        node_id: NodeId,
        x: f32,
        y: f32,
        tree: &TreeModel,
        config: &LayoutConfig,
    ) -> Option<DragUpdate> {
        let state = self.state.as_mut().filter(|s| s.node == node_id)?;
        let pointer = Point::new(f64::from(x), f64::from(y));
        state.last_pointer = pointer;

        let delta = pointer - state.start_pointer;
        let preview = Position::new(
            state.start_position.x + delta.x as f32,
            state.start_position.y + delta.y as f32,
        );

        state.target = nearest_target(tree, config, pointer, &state.excluded).map(
            |(node, bounds)| DropTarget {
                node,
                position: if tree.root() == node {
                    DropPosition::Over
                } else {
                    classify(&bounds, y)
                },
            },
        );

        Some(DragUpdate {
            target: state.target,
            preview,
        })
    }

    /// Finish the drag. Returns a move only if the pointer travelled past
    /// the threshold and the drop target yields a valid, acyclic move.
    pub fn on_drag_stop(&mut self, node_id: NodeId, tree: &TreeModel) -> Option<MoveProposal> {
        let state = self.state.take_if(|s| s.node == node_id)?;
        let travelled = (state.last_pointer - state.start_pointer).hypot();
        if travelled <= f64::from(self.threshold) {
            log::trace!("drag of {node_id} below threshold ({travelled:.1}px)");
            return None;
        }
        let target = state.target?;
        let proposal = resolve_drop(tree, node_id, target);
        if proposal.is_none() {
            log::debug!("drop of {node_id} on {target:?} rejected");
        }
        proposal
    }

    /// Abandon the current drag without proposing anything.
    pub fn cancel(&mut self) {
        self.state = None;
    }
}

/// Drop band for a pointer at height `py` over `bounds`.
pub fn classify(bounds: &NodeBounds, py: f32) -> DropPosition {
    let third = bounds.height / 3.0;
    if py < bounds.y + third {
        DropPosition::Above
    } else if py > bounds.y + 2.0 * third {
        DropPosition::Below
    } else {
        DropPosition::Over
    }
}

/// Visible, non-excluded node whose box center is nearest `pointer`.
/// Ties keep the earlier node in pre-order.
fn nearest_target(
    tree: &TreeModel,
    config: &LayoutConfig,
    pointer: Point,
    excluded: &HashSet<NodeId>,
) -> Option<(NodeId, NodeBounds)> {
    let mut best: Option<(NodeId, NodeBounds, f64)> = None;
    for id in visible_nodes(tree) {
        if excluded.contains(&id) {
            continue;
        }
        let Some(node) = tree.get(id) else {
            continue;
        };
        let bounds = node_bounds(node.position, config);
        let rect = Rect::new(
            f64::from(bounds.x),
            f64::from(bounds.y),
            f64::from(bounds.x + bounds.width),
            f64::from(bounds.y + bounds.height),
        );
        let distance = rect.center().distance(pointer);
        if best.as_ref().is_none_or(|(_, _, d)| distance < *d) {
            best = Some((id, bounds, distance));
        }
    }
    best.map(|(id, bounds, _)| (id, bounds))
}

/// Turn a classified drop into `(new_parent, index)`, rejecting moves onto
/// the dragged subtree.
pub fn resolve_drop(tree: &TreeModel, dragged: NodeId, target: DropTarget) -> Option<MoveProposal> {
    if target.node == dragged || tree.is_descendant(target.node, dragged) {
        return None;
    }
    match target.position {
        DropPosition::Over => Some(MoveProposal {
            node: dragged,
            new_parent: target.node,
            index: None,
        }),
        DropPosition::Above | DropPosition::Below => {
            let parent = tree.parent_of(target.node)?;
            let siblings: Vec<NodeId> = tree
                .children(parent)
                .into_iter()
                .filter(|&s| s != dragged)
                .collect();
            let at = siblings.iter().position(|&s| s == target.node)?;
            let index = match target.position {
                DropPosition::Below => at + 1,
                _ => at,
            };
            Some(MoveProposal {
                node: dragged,
                new_parent: parent,
                index: Some(index),
            })
        }
    }
}
