//! Single-node selection with keyboard-style sibling navigation.
//!
//! Navigation walks the *full* tree (collapsed subtrees included) in
//! depth-first pre-order. Siblings are visited top to bottom, then left to
//! right: children are bucketed into rows of y values no more than
//! `ALIGN_EPSILON` apart, rows are ordered by y, and nodes within a row by
//! x. Nodes that tie on both keep their child order.

use mm_core::{NodeId, TreeModel};
use std::cmp::Ordering;

/// Vertical tolerance (canvas units) for treating siblings as one row.
pub const ALIGN_EPSILON: f32 = 10.0;

#[derive(Debug, Default)]
pub struct SelectionController {
    selected: Option<NodeId>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, node: Option<NodeId>) {
        self.selected = node;
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Drop the selection if it points at one of `removed`. Returns true if
    /// the selection was cleared.
    pub fn forget(&mut self, removed: &[NodeId]) -> bool {
        match self.selected {
            Some(id) if removed.contains(&id) => {
                self.selected = None;
                true
            }
            _ => false,
        }
    }

    /// Advance to the next node in traversal order, wrapping at the end.
    pub fn next(&mut self, tree: &TreeModel) -> Option<NodeId> {
        self.step(tree, true)
    }

    /// Step back to the previous node in traversal order, wrapping at the start.
    pub fn previous(&mut self, tree: &TreeModel) -> Option<NodeId> {
        self.step(tree, false)
    }

    fn step(&mut self, tree: &TreeModel, forward: bool) -> Option<NodeId> {
        let order = traversal_order(tree);
        let len = order.len();
        if len == 0 {
            return None;
        }
        let current = self
            .selected
            .and_then(|id| order.iter().position(|&n| n == id));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
            (None, true) => 0,
            (None, false) => len - 1,
        };
        self.selected = Some(order[next]);
        self.selected
    }
}

/// Deterministic pre-order of every node in the tree.
pub fn traversal_order(tree: &TreeModel) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(tree.len());
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        out.push(id);
        let children = spatial_order(tree, tree.children(id));
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Sort siblings by row (y within `ALIGN_EPSILON`), then by x.
fn spatial_order(tree: &TreeModel, mut children: Vec<NodeId>) -> Vec<NodeId> {
    let pos = |id: &NodeId| tree.get(*id).map(|n| n.position).unwrap_or_default();
    children.sort_by(|a, b| pos(a).y.partial_cmp(&pos(b).y).unwrap_or(Ordering::Equal));

    let mut rows: Vec<Vec<NodeId>> = Vec::new();
    let mut row_start = f32::NEG_INFINITY;
    for id in children {
        let y = pos(&id).y;
        if rows.is_empty() || y - row_start > ALIGN_EPSILON {
            row_start = y;
            rows.push(vec![id]);
        } else if let Some(row) = rows.last_mut() {
            row.push(id);
        }
    }

    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by(|a, b| pos(a).x.partial_cmp(&pos(b).x).unwrap_or(Ordering::Equal));
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_core::Position;
    use std::collections::HashMap;

    fn place(tree: &mut TreeModel, at: &[(NodeId, f32, f32)]) {
        let positions: HashMap<NodeId, Position> = at
            .iter()
            .map(|&(id, x, y)| (id, Position::new(x, y)))
            .collect();
        tree.apply_positions(&positions);
    }

    #[test]
    fn siblings_ordered_by_y_then_x() {
        let mut tree = TreeModel::new("R");
        let r = tree.root();
        let a = tree.add_node(r, "A").unwrap();
        let b = tree.add_node(r, "B").unwrap();
        let c = tree.add_node(r, "C").unwrap();
        // B is highest; A and C share a row (within epsilon), C further left.
        place(&mut tree, &[(a, 100.0, 50.0), (b, 0.0, 0.0), (c, 20.0, 56.0)]);
        assert_eq!(traversal_order(&tree), vec![r, b, c, a]);
    }

    #[test]
    fn children_follow_their_parent() {
        let mut tree = TreeModel::new("R");
        let r = tree.root();
        let a = tree.add_node(r, "A").unwrap();
        let a1 = tree.add_node(a, "A1").unwrap();
        let b = tree.add_node(r, "B").unwrap();
        place(&mut tree, &[(a, 0.0, 0.0), (a1, 0.0, 500.0), (b, 0.0, 100.0)]);
        assert_eq!(traversal_order(&tree), vec![r, a, a1, b]);
    }

    #[test]
    fn next_and_previous_wrap() {
        let mut tree = TreeModel::new("R");
        let r = tree.root();
        let a = tree.add_node(r, "A").unwrap();
        let mut sel = SelectionController::new();

        assert_eq!(sel.next(&tree), Some(r));
        assert_eq!(sel.next(&tree), Some(a));
        assert_eq!(sel.next(&tree), Some(r));
        assert_eq!(sel.previous(&tree), Some(a));

        sel.select(None);
        assert_eq!(sel.previous(&tree), Some(a));
    }

    #[test]
    fn forget_clears_removed_selection() {
        let mut sel = SelectionController::new();
        let x = NodeId::intern("sel-x");
        sel.select(Some(x));
        assert!(!sel.forget(&[NodeId::intern("sel-y")]));
        assert!(sel.forget(&[x]));
        assert_eq!(sel.selected(), None);
    }
}
