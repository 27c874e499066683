//! Core tree data model for mind maps.
//!
//! A mind map is a rooted tree of labeled nodes. The tree is stored in a
//! `StableDiGraph` whose edges go parent → child, with an explicit ordered
//! child list per node (sibling order is meaningful: it drives layout and
//! drag reordering). Every node also carries its `parent_id`, so the
//! serialized form can be read back without the edge list.
//!
//! All mutation goes through `TreeModel`; the structural invariants
//! (single root, acyclic, consistent levels and edges) hold after every
//! successful call, and failed calls leave the tree untouched.

use crate::error::TreeError;
use crate::id::NodeId;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};

// ─── Node attributes ─────────────────────────────────────────────────────

/// Top-left corner of a node on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// User-chosen node colors, stored as CSS color strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeColors {
    pub background: String,
    pub foreground: String,
}

/// A reference attached to a node (search hit, document excerpt, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Names of the editable node attributes, used in change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeField {
    Label,
    Notes,
    Sources,
    Chat,
    Colors,
    Collapsed,
    Editing,
}

/// A single mind-map node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub is_root: bool,
    /// Depth from the root. Derived; recomputed on every structural change.
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub collapsed: bool,
    /// Written by the layout engine and the drag preview only.
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub custom_colors: Option<NodeColors>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
    #[serde(default)]
    pub chat_id: Option<String>,
    /// UI-only transient flag; never persisted.
    #[serde(default, skip_serializing)]
    pub is_editing: bool,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            parent_id: None,
            is_root: false,
            level: 0,
            collapsed: false,
            position: Position::default(),
            custom_colors: None,
            notes: None,
            sources: None,
            chat_id: None,
            is_editing: false,
        }
    }

    /// Editable attributes that differ between two versions of a node.
    /// Structure and position are not attributes.
    pub fn diff_fields(&self, other: &Node) -> SmallVec<[NodeField; 4]> {
        let mut fields = SmallVec::new();
        if self.label != other.label {
            fields.push(NodeField::Label);
        }
        if self.notes != other.notes {
            fields.push(NodeField::Notes);
        }
        if self.sources != other.sources {
            fields.push(NodeField::Sources);
        }
        if self.chat_id != other.chat_id {
            fields.push(NodeField::Chat);
        }
        if self.custom_colors != other.custom_colors {
            fields.push(NodeField::Colors);
        }
        if self.collapsed != other.collapsed {
            fields.push(NodeField::Collapsed);
        }
        if self.is_editing != other.is_editing {
            fields.push(NodeField::Editing);
        }
        fields
    }
}

/// A partial update of a node's editable attributes.
///
/// `None` leaves a field alone. The nested options (`Some(None)`) clear an
/// attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub label: Option<String>,
    pub notes: Option<Option<String>>,
    pub sources: Option<Option<Vec<Source>>>,
    pub chat_id: Option<Option<String>>,
    pub custom_colors: Option<Option<NodeColors>>,
    pub collapsed: Option<bool>,
    pub is_editing: Option<bool>,
}

impl NodePatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn collapsed(collapsed: bool) -> Self {
        Self {
            collapsed: Some(collapsed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// The attributes this patch touches.
    pub fn changed_fields(&self) -> SmallVec<[NodeField; 4]> {
        let mut fields = SmallVec::new();
        if self.label.is_some() {
            fields.push(NodeField::Label);
        }
        if self.notes.is_some() {
            fields.push(NodeField::Notes);
        }
        if self.sources.is_some() {
            fields.push(NodeField::Sources);
        }
        if self.chat_id.is_some() {
            fields.push(NodeField::Chat);
        }
        if self.custom_colors.is_some() {
            fields.push(NodeField::Colors);
        }
        if self.collapsed.is_some() {
            fields.push(NodeField::Collapsed);
        }
        if self.is_editing.is_some() {
            fields.push(NodeField::Editing);
        }
        fields
    }

    fn apply_to(self, node: &mut Node) {
        if let Some(label) = self.label {
            node.label = label;
        }
        if let Some(notes) = self.notes {
            node.notes = notes;
        }
        if let Some(sources) = self.sources {
            node.sources = sources;
        }
        if let Some(chat_id) = self.chat_id {
            node.chat_id = chat_id;
        }
        if let Some(colors) = self.custom_colors {
            node.custom_colors = colors;
        }
        if let Some(collapsed) = self.collapsed {
            node.collapsed = collapsed;
        }
        if let Some(editing) = self.is_editing {
            node.is_editing = editing;
        }
    }
}

// ─── Edges & documents ───────────────────────────────────────────────────

/// A parent → child connection, carried for the renderer's convenience.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn between(source: NodeId, target: NodeId) -> Self {
        Self {
            id: format!("e-{source}-{target}"),
            source,
            target,
        }
    }
}

/// Direction the tree grows in when laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutDirection {
    #[default]
    LeftRight,
    RightLeft,
    TopBottom,
    BottomTop,
    Radial,
}

impl LayoutDirection {
    pub const ALL: [LayoutDirection; 5] = [
        LayoutDirection::LeftRight,
        LayoutDirection::RightLeft,
        LayoutDirection::TopBottom,
        LayoutDirection::BottomTop,
        LayoutDirection::Radial,
    ];
}

/// The persisted / snapshotted form of a mind map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapDocument {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub direction: LayoutDirection,
}

impl MindMapDocument {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ─── Tree model ──────────────────────────────────────────────────────────

/// The canonical mind-map tree.
#[derive(Debug, Clone)]
pub struct TreeModel {
    /// Parent → child edges. Each non-root node has exactly one incoming edge.
    graph: StableDiGraph<Node, ()>,

    /// The root node index.
    root: NodeIndex,

    /// Index from NodeId → NodeIndex for fast lookup.
    id_index: HashMap<NodeId, NodeIndex>,

    /// Ordered children per node; kept in lock-step with `graph` edges.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl TreeModel {
    /// Create a tree containing only a root node.
    #[must_use]
    pub fn new(root_label: &str) -> Self {
        Self::with_root(Node::new(NodeId::generate(), root_label))
    }

    /// Create a tree from a pre-built root node.
    #[must_use]
    pub fn with_root(mut root_node: Node) -> Self {
        root_node.parent_id = None;
        root_node.is_root = true;
        root_node.level = 0;
        let id = root_node.id;

        let mut graph = StableDiGraph::new();
        let root = graph.add_node(root_node);
        let mut id_index = HashMap::new();
        id_index.insert(id, root);

        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
        }
    }

    /// Rebuild a tree from a document, validating every structural invariant.
    ///
    /// Stored levels and root flags are recomputed. Children keep the
    /// relative order in which they appear in `doc.nodes`.
    pub fn from_document(doc: &MindMapDocument) -> Result<Self, TreeError> {
        let mut roots = doc
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent_id.is_none());
        let (root_pos, root_node) = roots.next().ok_or(TreeError::NoRoot)?;
        if let Some((_, second)) = roots.next() {
            return Err(TreeError::MultipleRoots {
                first: root_node.id,
                second: second.id,
            });
        }

        let mut tree = Self::with_root(root_node.clone());
        for (pos, node) in doc.nodes.iter().enumerate() {
            if pos == root_pos {
                continue;
            }
            if tree.id_index.contains_key(&node.id) {
                return Err(TreeError::DuplicateId(node.id));
            }
            let mut node = node.clone();
            node.is_root = false;
            let id = node.id;
            let idx = tree.graph.add_node(node);
            tree.id_index.insert(id, idx);
        }

        for node in &doc.nodes {
            let Some(parent) = node.parent_id else {
                continue;
            };
            let parent_idx = tree.index_of(parent).ok_or(TreeError::MissingParent {
                child: node.id,
                parent,
            })?;
            let child_idx = tree.id_index[&node.id];
            tree.graph.add_edge(parent_idx, child_idx, ());
            tree.child_order
                .entry(parent_idx)
                .or_default()
                .push(child_idx);
        }

        // Nodes caught in a parent cycle are unreachable from the root.
        let reachable: HashSet<NodeIndex> = tree.subtree_indices(tree.root).into_iter().collect();
        if let Some(stray) = doc
            .nodes
            .iter()
            .find(|n| !reachable.contains(&tree.id_index[&n.id]))
        {
            return Err(TreeError::Cycle {
                node: stray.id,
                target: stray.parent_id.unwrap_or(stray.id),
            });
        }

        for edge in &doc.edges {
            let matches = tree
                .get(edge.target)
                .is_some_and(|n| n.parent_id == Some(edge.source));
            if !matches {
                return Err(TreeError::EdgeMismatch {
                    source_id: edge.source,
                    target: edge.target,
                });
            }
        }

        tree.refresh_levels(tree.root);
        Ok(tree)
    }

    /// Snapshot the tree into its serializable form (pre-order).
    pub fn to_document(&self, direction: LayoutDirection) -> MindMapDocument {
        let order = self.pre_order_indices();
        MindMapDocument {
            nodes: order.iter().map(|&idx| self.graph[idx].clone()).collect(),
            edges: self.edges(),
            direction,
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn root(&self) -> NodeId {
        self.graph[self.root].id
    }

    pub fn root_node(&self) -> &Node {
        &self.graph[self.root]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Look up a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Incoming).next()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent_id)
    }

    fn child_indices(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order
            .get(&idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Children of a node in sibling order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.index_of(id)
            .map(|idx| {
                self.child_indices(idx)
                    .iter()
                    .map(|&c| self.graph[c].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Position of a node within its parent's child list.
    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        let idx = self.index_of(id)?;
        let parent = self.parent_index(idx)?;
        self.child_indices(parent).iter().position(|&c| c == idx)
    }

    /// Ancestors of a node, nearest first, ending with the root.
    ///
    /// The walk is bounded by the node count, so a corrupted parent chain
    /// cannot loop forever.
    pub fn ancestors(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut out = SmallVec::new();
        let Some(mut idx) = self.index_of(id) else {
            return out;
        };
        for _ in 0..self.len() {
            match self.parent_index(idx) {
                Some(parent) => {
                    out.push(self.graph[parent].id);
                    idx = parent;
                }
                None => break,
            }
        }
        out
    }

    /// True if `candidate` lies strictly below `ancestor`.
    pub fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// The node and all its descendants, breadth-first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        self.index_of(id)
            .map(|idx| {
                self.subtree_indices(idx)
                    .into_iter()
                    .map(|i| self.graph[i].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Strict descendants of `id`, breadth-first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut all = self.subtree(id);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    fn subtree_indices(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            out.push(idx);
            queue.extend(self.child_indices(idx).iter().copied());
        }
        out
    }

    /// All node ids in depth-first pre-order (parent before children).
    pub fn pre_order(&self) -> Vec<NodeId> {
        self.pre_order_indices()
            .into_iter()
            .map(|idx| self.graph[idx].id)
            .collect()
    }

    fn pre_order_indices(&self) -> Vec<NodeIndex> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.child_indices(idx).iter().rev().copied());
        }
        out
    }

    /// Iterate over all nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.pre_order_indices()
            .into_iter()
            .map(move |idx| &self.graph[idx])
    }

    /// The edge set, derived from parent links (pre-order by target).
    pub fn edges(&self) -> Vec<Edge> {
        self.pre_order_indices()
            .into_iter()
            .filter_map(|idx| {
                let node = &self.graph[idx];
                node.parent_id.map(|p| Edge::between(p, node.id))
            })
            .collect()
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Append a new child with a generated id.
    pub fn add_node(&mut self, parent: NodeId, label: &str) -> Result<NodeId, TreeError> {
        self.insert_node(parent, Node::new(NodeId::generate(), label), None)
    }

    /// Insert a pre-built node under `parent` at `index` (append if `None`).
    ///
    /// The node's structural fields are overwritten; its attributes are kept.
    pub fn insert_node(
        &mut self,
        parent: NodeId,
        mut node: Node,
        index: Option<usize>,
    ) -> Result<NodeId, TreeError> {
        let parent_idx = self.index_of(parent).ok_or(TreeError::MissingParent {
            child: node.id,
            parent,
        })?;
        if self.id_index.contains_key(&node.id) {
            return Err(TreeError::DuplicateId(node.id));
        }

        let id = node.id;
        node.parent_id = Some(parent);
        node.is_root = false;
        node.level = self.graph[parent_idx].level + 1;
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.link(parent_idx, idx, index);
        Ok(id)
    }

    /// Merge the fields present in `patch` into a node.
    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) -> Result<(), TreeError> {
        let idx = self.index_of(id).ok_or(TreeError::MissingNode(id))?;
        patch.apply_to(&mut self.graph[idx]);
        Ok(())
    }

    /// Remove a node and its entire subtree. Returns the removed ids,
    /// breadth-first starting with `id`.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let idx = self.index_of(id).ok_or(TreeError::MissingNode(id))?;
        if idx == self.root {
            return Err(TreeError::RootImmutable(id));
        }

        let doomed = self.subtree_indices(idx);
        self.unlink(idx);

        let mut removed = Vec::with_capacity(doomed.len());
        for i in doomed {
            self.child_order.remove(&i);
            if let Some(node) = self.graph.remove_node(i) {
                self.id_index.remove(&node.id);
                removed.push(node.id);
            }
        }
        log::debug!("deleted subtree {id} ({} nodes)", removed.len());
        Ok(removed)
    }

    /// Move `id` (with its subtree) under `new_parent`.
    ///
    /// `insert_index` addresses the new parent's child list with `id` already
    /// detached; it is clamped, and `None` appends. Returns false without
    /// mutating anything when the move would create a cycle, targets the
    /// node itself, moves the root, or names an unknown node.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId, insert_index: Option<usize>) -> bool {
        let (Some(idx), Some(parent_idx)) = (self.index_of(id), self.index_of(new_parent)) else {
            log::debug!("reparent {id} -> {new_parent}: unknown node");
            return false;
        };
        if idx == self.root {
            log::debug!("reparent {id}: root cannot move");
            return false;
        }
        if id == new_parent || self.ancestors(new_parent).contains(&id) {
            log::debug!("reparent {id} -> {new_parent}: would create a cycle");
            return false;
        }

        self.unlink(idx);
        self.link(parent_idx, idx, insert_index);
        self.graph[idx].parent_id = Some(new_parent);
        self.refresh_levels(idx);
        true
    }

    /// Write layout output into the nodes. Unknown ids are ignored.
    pub fn apply_positions(&mut self, positions: &HashMap<NodeId, Position>) {
        for (id, pos) in positions {
            if let Some(&idx) = self.id_index.get(id) {
                self.graph[idx].position = *pos;
            }
        }
    }

    /// Transient position written while a node is being dragged.
    pub fn set_preview_position(&mut self, id: NodeId, position: Position) -> bool {
        match self.index_of(id) {
            Some(idx) => {
                self.graph[idx].position = position;
                true
            }
            None => false,
        }
    }

    /// Clear every node's `is_editing` flag. Returns true if any was set.
    pub fn clear_editing(&mut self) -> bool {
        let mut any = false;
        for idx in self.graph.node_indices().collect::<Vec<_>>() {
            let node = &mut self.graph[idx];
            any |= node.is_editing;
            node.is_editing = false;
        }
        any
    }

    fn link(&mut self, parent: NodeIndex, child: NodeIndex, index: Option<usize>) {
        self.graph.add_edge(parent, child, ());
        let siblings = self.child_order.entry(parent).or_default();
        let at = index.map_or(siblings.len(), |i| i.min(siblings.len()));
        siblings.insert(at, child);
    }

    fn unlink(&mut self, child: NodeIndex) {
        if let Some(parent) = self.parent_index(child) {
            if let Some(edge) = self.graph.find_edge(parent, child) {
                self.graph.remove_edge(edge);
            }
            if let Some(siblings) = self.child_order.get_mut(&parent) {
                siblings.retain(|&c| c != child);
            }
        }
    }

    /// Recompute `level` for `start` and everything below it.
    fn refresh_levels(&mut self, start: NodeIndex) {
        let base = self
            .parent_index(start)
            .map_or(0, |p| self.graph[p].level + 1);
        let mut queue = VecDeque::from([(start, base)]);
        while let Some((idx, level)) = queue.pop_front() {
            self.graph[idx].level = level;
            for &child in self.child_indices(idx) {
                queue.push_back((child, level + 1));
            }
        }
    }

    // ─── Invariants ──────────────────────────────────────────────────────

    /// Verify every structural invariant, reporting the first violation.
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        let root = &self.graph[self.root];
        if root.parent_id.is_some() || !root.is_root {
            return Err(TreeError::NoRoot);
        }

        let n = self.len();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            if idx == self.root {
                continue;
            }
            if node.is_root {
                return Err(TreeError::MultipleRoots {
                    first: root.id,
                    second: node.id,
                });
            }
            let parent = node.parent_id.ok_or(TreeError::MultipleRoots {
                first: root.id,
                second: node.id,
            })?;
            let parent_idx = self.index_of(parent).ok_or(TreeError::MissingParent {
                child: node.id,
                parent,
            })?;
            if self.parent_index(idx) != Some(parent_idx)
                || !self.child_indices(parent_idx).contains(&idx)
            {
                return Err(TreeError::EdgeMismatch {
                    source_id: parent,
                    target: node.id,
                });
            }
            let expected = self.graph[parent_idx].level + 1;
            if node.level != expected {
                return Err(TreeError::LevelMismatch {
                    node: node.id,
                    expected,
                    found: node.level,
                });
            }

            // Must reach the root within N steps.
            let mut cursor = idx;
            let mut steps = 0;
            while cursor != self.root {
                cursor = self.parent_index(cursor).ok_or(TreeError::MissingParent {
                    child: self.graph[cursor].id,
                    parent,
                })?;
                steps += 1;
                if steps > n {
                    return Err(TreeError::Cycle {
                        node: node.id,
                        target: parent,
                    });
                }
            }
        }

        for (&parent, children) in &self.child_order {
            let edge_count = self
                .graph
                .neighbors_directed(parent, Direction::Outgoing)
                .count();
            if edge_count != children.len() {
                let source_id = self.graph[parent].id;
                let target = children
                    .first()
                    .map_or(source_id, |&c| self.graph[c].id);
                return Err(TreeError::EdgeMismatch { source_id, target });
            }
        }
        Ok(())
    }
}

impl PartialEq for TreeModel {
    fn eq(&self, other: &Self) -> bool {
        self.to_document(LayoutDirection::default()) == other.to_document(LayoutDirection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// R → A → B, R → C
    fn sample() -> (TreeModel, NodeId, NodeId, NodeId) {
        let mut tree = TreeModel::new("Root");
        let r = tree.root();
        let a = tree.add_node(r, "A").unwrap();
        let b = tree.add_node(a, "B").unwrap();
        let c = tree.add_node(r, "C").unwrap();
        (tree, a, b, c)
    }

    #[test]
    fn new_tree_has_single_root() {
        let tree = TreeModel::new("Root");
        assert_eq!(tree.len(), 1);
        assert!(tree.root_node().is_root);
        assert_eq!(tree.root_node().parent_id, None);
        assert_eq!(tree.root_node().level, 0);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn add_node_sets_parent_and_level() {
        let (tree, a, b, _) = sample();
        let node = tree.get(b).unwrap();
        assert_eq!(node.parent_id, Some(a));
        assert_eq!(node.level, 2);
        assert!(!node.is_root);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn add_node_to_missing_parent_fails() {
        let mut tree = TreeModel::new("Root");
        let ghost = NodeId::intern("ghost-parent");
        let err = tree.add_node(ghost, "x").unwrap_err();
        assert!(matches!(err, TreeError::MissingParent { parent, .. } if parent == ghost));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn insert_node_rejects_duplicate_id() {
        let (mut tree, a, _, _) = sample();
        let r = tree.root();
        let err = tree.insert_node(r, Node::new(a, "dup"), None).unwrap_err();
        assert_eq!(err, TreeError::DuplicateId(a));
    }

    #[test]
    fn insert_node_at_index() {
        let (mut tree, a, _, c) = sample();
        let r = tree.root();
        let x = tree
            .insert_node(r, Node::new(NodeId::intern("inserted-x"), "X"), Some(1))
            .unwrap();
        assert_eq!(tree.children(r), vec![a, x, c]);
    }

    #[test]
    fn reparent_onto_self_or_descendant_fails() {
        let (mut tree, a, b, _) = sample();
        let before = tree.to_document(LayoutDirection::LeftRight);

        assert!(!tree.reparent(a, a, None));
        assert!(!tree.reparent(a, b, None));

        assert_eq!(tree.to_document(LayoutDirection::LeftRight), before);
    }

    #[test]
    fn reparent_root_fails() {
        let (mut tree, a, _, _) = sample();
        let r = tree.root();
        assert!(!tree.reparent(r, a, None));
    }

    #[test]
    fn reparent_moves_subtree_and_levels() {
        let (mut tree, a, b, c) = sample();
        assert!(tree.reparent(a, c, None));
        assert_eq!(tree.parent_of(a), Some(c));
        assert_eq!(tree.get(a).unwrap().level, 2);
        assert_eq!(tree.get(b).unwrap().level, 3);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn reparent_within_same_parent_reorders() {
        let (mut tree, a, _, c) = sample();
        let r = tree.root();
        assert!(tree.reparent(c, r, Some(0)));
        assert_eq!(tree.children(r), vec![c, a]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn reparent_index_is_clamped() {
        let (mut tree, a, b, c) = sample();
        assert!(tree.reparent(c, a, Some(99)));
        assert_eq!(tree.children(a), vec![b, c]);
    }

    #[test]
    fn delete_subtree_removes_descendants() {
        let (mut tree, a, b, c) = sample();
        let removed = tree.delete_subtree(a).unwrap();
        assert_eq!(removed, vec![a, b]);
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(tree.contains(c));
        assert_eq!(tree.edges().len(), 1);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn delete_root_is_rejected() {
        let (mut tree, ..) = sample();
        let r = tree.root();
        assert_eq!(tree.delete_subtree(r), Err(TreeError::RootImmutable(r)));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn update_node_merges_only_present_fields() {
        let (mut tree, a, _, _) = sample();
        tree.update_node(
            a,
            NodePatch {
                notes: Some(Some("remember".into())),
                ..NodePatch::default()
            },
        )
        .unwrap();
        tree.update_node(a, NodePatch::label("A2")).unwrap();
        let node = tree.get(a).unwrap();
        assert_eq!(node.label, "A2");
        assert_eq!(node.notes.as_deref(), Some("remember"));
    }

    #[test]
    fn edges_follow_parent_links() {
        let (tree, a, b, c) = sample();
        let r = tree.root();
        let pairs: Vec<(NodeId, NodeId)> =
            tree.edges().iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(pairs, vec![(r, a), (a, b), (r, c)]);
        assert_eq!(tree.edges()[0].id, format!("e-{r}-{a}"));
    }

    #[test]
    fn document_roundtrip_preserves_order() {
        let (tree, ..) = sample();
        let doc = tree.to_document(LayoutDirection::Radial);
        let rebuilt = TreeModel::from_document(&doc).unwrap();
        assert_eq!(rebuilt.to_document(LayoutDirection::Radial), doc);
    }

    #[test]
    fn from_document_rejects_two_roots() {
        let doc = MindMapDocument {
            nodes: vec![
                Node::new(NodeId::intern("r1"), "one"),
                Node::new(NodeId::intern("r2"), "two"),
            ],
            ..MindMapDocument::default()
        };
        assert!(matches!(
            TreeModel::from_document(&doc),
            Err(TreeError::MultipleRoots { .. })
        ));
    }

    #[test]
    fn from_document_rejects_cycles() {
        let r = Node::new(NodeId::intern("cyc-root"), "root");
        let mut x = Node::new(NodeId::intern("cyc-x"), "x");
        let mut y = Node::new(NodeId::intern("cyc-y"), "y");
        x.parent_id = Some(y.id);
        y.parent_id = Some(x.id);
        let doc = MindMapDocument {
            nodes: vec![r, x, y],
            ..MindMapDocument::default()
        };
        assert!(matches!(
            TreeModel::from_document(&doc),
            Err(TreeError::Cycle { .. })
        ));
    }

    #[test]
    fn from_document_rejects_duplicate_root_id() {
        let r = Node::new(NodeId::intern("dup-root"), "root");
        let mut a = Node::new(NodeId::intern("dup-a"), "a");
        a.parent_id = Some(r.id);
        let mut again = Node::new(r.id, "shadow");
        again.parent_id = Some(a.id);
        let doc = MindMapDocument {
            nodes: vec![r.clone(), a, again],
            ..MindMapDocument::default()
        };
        assert_eq!(
            TreeModel::from_document(&doc).unwrap_err(),
            TreeError::DuplicateId(r.id)
        );
    }

    #[test]
    fn from_document_rejects_mismatched_edges() {
        let (tree, a, b, _) = sample();
        let mut doc = tree.to_document(LayoutDirection::LeftRight);
        doc.edges.push(Edge::between(b, a));
        assert!(matches!(
            TreeModel::from_document(&doc),
            Err(TreeError::EdgeMismatch { .. })
        ));
    }

    #[test]
    fn from_document_recomputes_levels() {
        let (tree, _, b, _) = sample();
        let mut doc = tree.to_document(LayoutDirection::LeftRight);
        for node in &mut doc.nodes {
            node.level = 7;
        }
        let rebuilt = TreeModel::from_document(&doc).unwrap();
        assert_eq!(rebuilt.get(b).unwrap().level, 2);
        rebuilt.check_invariants().unwrap();
    }

    #[test]
    fn ancestors_end_at_root() {
        let (tree, a, b, _) = sample();
        let r = tree.root();
        assert_eq!(tree.ancestors(b).as_slice(), &[a, r]);
        assert_eq!(tree.descendants(a), vec![b]);
        assert!(tree.descendants(b).is_empty());
        assert!(tree.is_descendant(b, r));
        assert!(!tree.is_descendant(r, b));
    }

    #[test]
    fn diff_fields_ignores_position_and_structure() {
        let (tree, a, _, _) = sample();
        let old = tree.get(a).unwrap().clone();
        let mut new = old.clone();
        new.position = Position::new(10.0, 10.0);
        new.level = 5;
        assert!(old.diff_fields(&new).is_empty());

        new.label = "A2".into();
        new.collapsed = true;
        assert_eq!(
            old.diff_fields(&new).as_slice(),
            &[NodeField::Label, NodeField::Collapsed]
        );
    }
}
