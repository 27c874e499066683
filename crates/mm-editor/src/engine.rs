//! The mind-map engine: single entry point for every mutation.
//!
//! `MindMapEngine` owns the tree and everything that reacts to it. User
//! actions and task batches both go through `&mut self`, so mutations are
//! serialized in arrival order. Each committed change runs the same tail:
//!
//! 1. push the pre-mutation document onto the undo stack,
//! 2. recompute the layout and schedule a view re-fit,
//! 3. mark the map dirty and try to save it,
//! 4. notify subscribers.
//!
//! Rejected operations change nothing and return `false` / `None`.

use crate::changes::{
    ApplyReport, ChangeApplicator, ChangeError, ChangeRecord, DEFAULT_MAX_BATCH_RECORDS,
    TaskLedger,
};
use crate::drag::{DRAG_THRESHOLD, DragController, DragUpdate};
use crate::events::{EngineEvent, EventBus, SubscriptionId};
use crate::history::{DEFAULT_HISTORY_DEPTH, HistoryManager};
use crate::input::InputEvent;
use crate::persistence::{Persistence, PersistenceError};
use crate::selection::SelectionController;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::viewport::{DEFAULT_FIT_DEBOUNCE, FitScheduler};
use mm_core::layout::visible_bounds;
use mm_core::{
    Edge, LayoutConfig, LayoutDirection, MindMapDocument, Node, NodeColors, NodeId, NodePatch,
    Source, TreeModel, ViewFit, Viewport, compute_layout, fit_view, visible_edges, visible_nodes,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Label given to nodes created by add-child / add-sibling.
pub const DEFAULT_NODE_LABEL: &str = "New idea";

/// Label of the root of a map that did not exist yet.
pub const DEFAULT_ROOT_LABEL: &str = "Central topic";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub history_depth: usize,
    pub layout: LayoutConfig,
    pub viewport: Viewport,
    /// Margin kept around the tree when fitting the view.
    pub fit_padding: f32,
    pub fit_debounce: Duration,
    pub drag_threshold: f32,
    /// Task batches with more records than this are rejected.
    pub max_batch_records: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            layout: LayoutConfig::default(),
            viewport: Viewport::default(),
            fit_padding: 40.0,
            fit_debounce: DEFAULT_FIT_DEBOUNCE,
            drag_threshold: DRAG_THRESHOLD,
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
        }
    }
}

pub struct MindMapEngine {
    map_id: String,
    tree: TreeModel,
    direction: LayoutDirection,
    config: EngineConfig,
    history: HistoryManager,
    drag: DragController,
    selection: SelectionController,
    tasks: TaskLedger,
    events: EventBus,
    persistence: Box<dyn Persistence>,
    fit: FitScheduler,
    /// Set by every commit, cleared by a successful save.
    dirty: bool,
}

impl MindMapEngine {
    /// Load `map_id` once and build an engine around it. A map that does
    /// not exist yet starts as a single root.
    pub fn mount(
        mut persistence: Box<dyn Persistence>,
        map_id: &str,
        config: EngineConfig,
    ) -> Result<Self, PersistenceError> {
        let (tree, direction) = match persistence.load(map_id)? {
            Some(doc) => {
                let tree = TreeModel::from_document(&doc)
                    .map_err(|e| PersistenceError::Decode(e.into()))?;
                log::info!("mounted map {map_id} ({} nodes)", tree.len());
                (tree, doc.direction)
            }
            None => {
                log::info!("map {map_id} not found, starting a new one");
                (TreeModel::new(DEFAULT_ROOT_LABEL), LayoutDirection::default())
            }
        };
        Ok(Self::with_tree(tree, direction, persistence, map_id, config))
    }

    /// Build an engine around an existing tree without loading anything.
    pub fn with_tree(
        mut tree: TreeModel,
        direction: LayoutDirection,
        persistence: Box<dyn Persistence>,
        map_id: &str,
        config: EngineConfig,
    ) -> Self {
        tree.clear_editing();
        let mut engine = Self {
            map_id: map_id.to_string(),
            tree,
            direction,
            config,
            history: HistoryManager::new(config.history_depth),
            drag: DragController::with_threshold(config.drag_threshold),
            selection: SelectionController::new(),
            tasks: TaskLedger::new(),
            events: EventBus::new(),
            persistence,
            fit: FitScheduler::new(config.fit_debounce),
            dirty: false,
        };
        engine.relayout();
        engine.fit.force(Instant::now());
        engine
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    pub fn direction(&self) -> LayoutDirection {
        self.direction
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current state in its persisted form.
    pub fn document(&self) -> MindMapDocument {
        self.tree.to_document(self.direction)
    }

    /// Nodes to render, in pre-order.
    pub fn visible_nodes(&self) -> Vec<&Node> {
        visible_nodes(&self.tree)
            .into_iter()
            .filter_map(|id| self.tree.get(id))
            .collect()
    }

    pub fn visible_edges(&self) -> Vec<Edge> {
        visible_edges(&self.tree)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.selected()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_batching() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.is_batching() && self.history.can_redo()
    }

    /// True while changes have not reached the store.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // ─── Structural actions ──────────────────────────────────────────────

    /// Append a new child under `parent`, expanding it if collapsed. The new
    /// node is selected and put in editing mode.
    pub fn add_child(&mut self, parent: NodeId) -> Option<NodeId> {
        let collapsed = self.tree.get(parent)?.collapsed;
        let before = self.document();
        let id = self.insert_new(parent, None)?;
        if collapsed && let Err(e) = self.tree.update_node(parent, NodePatch::collapsed(false)) {
            log::warn!("expanding {parent} failed: {e}");
        }
        self.commit(before, "add child");
        Some(id)
    }

    /// Insert a new node right after `node` among its siblings. The root has
    /// no siblings.
    pub fn add_sibling(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.tree.parent_of(node)?;
        let index = self.tree.sibling_index(node)? + 1;
        let before = self.document();
        let id = self.insert_new(parent, Some(index))?;
        self.commit(before, "add sibling");
        Some(id)
    }

    fn insert_new(&mut self, parent: NodeId, index: Option<usize>) -> Option<NodeId> {
        let mut node = Node::new(NodeId::generate(), DEFAULT_NODE_LABEL);
        node.is_editing = true;
        self.tree.clear_editing();
        match self.tree.insert_node(parent, node, index) {
            Ok(id) => {
                self.selection.select(Some(id));
                Some(id)
            }
            Err(e) => {
                log::debug!("insert under {parent} rejected: {e}");
                None
            }
        }
    }

    /// Remove `id` and its subtree. Returns the removed ids (empty if
    /// nothing was removed).
    pub fn delete_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let parent = self.tree.parent_of(id);
        let before = self.document();
        let removed = match self.tree.delete_subtree(id) {
            Ok(removed) => removed,
            Err(e) => {
                log::debug!("delete of {id} rejected: {e}");
                return Vec::new();
            }
        };
        self.forget_removed(&removed);
        self.commit(before, "delete node");
        self.events.emit(&EngineEvent::NodesRemoved {
            root: id,
            parent,
            removed: removed.clone(),
        });
        removed
    }

    /// Move `id` with its subtree under `new_parent` at `index`. A rejected
    /// move relayouts so any drag preview snaps back.
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: Option<usize>) -> bool {
        let before = self.document();
        if !self.tree.reparent(id, new_parent, index) {
            self.relayout();
            return false;
        }
        if self.document() == before {
            self.relayout();
            return true;
        }
        self.commit(before, "move node");
        true
    }

    pub fn set_direction(&mut self, direction: LayoutDirection) {
        if direction == self.direction {
            return;
        }
        let before = self.document();
        self.direction = direction;
        self.commit(before, "change layout");
        self.events.emit(&EngineEvent::LayoutChanged { direction });
    }

    // ─── Attribute actions ───────────────────────────────────────────────

    pub fn update_label(&mut self, id: NodeId, label: &str) -> bool {
        self.edit(id, NodePatch::label(label), "edit label")
    }

    pub fn update_notes(&mut self, id: NodeId, notes: Option<String>) -> bool {
        let patch = NodePatch {
            notes: Some(notes),
            ..NodePatch::default()
        };
        self.edit(id, patch, "edit notes")
    }

    pub fn update_sources(&mut self, id: NodeId, sources: Option<Vec<Source>>) -> bool {
        let patch = NodePatch {
            sources: Some(sources),
            ..NodePatch::default()
        };
        self.edit(id, patch, "edit sources")
    }

    /// Associate (or detach) a chat session.
    pub fn set_chat(&mut self, id: NodeId, chat_id: Option<String>) -> bool {
        let patch = NodePatch {
            chat_id: Some(chat_id),
            ..NodePatch::default()
        };
        self.edit(id, patch, "link chat")
    }

    pub fn set_colors(&mut self, id: NodeId, colors: Option<NodeColors>) -> bool {
        let patch = NodePatch {
            custom_colors: Some(colors),
            ..NodePatch::default()
        };
        self.edit(id, patch, "change colors")
    }

    pub fn set_collapsed(&mut self, id: NodeId, collapsed: bool) -> bool {
        let toggled = self.edit(id, NodePatch::collapsed(collapsed), "toggle collapse");
        if toggled && collapsed {
            self.forget_hidden_drag();
        }
        toggled
    }

    pub fn toggle_collapse(&mut self, id: NodeId) -> bool {
        match self.tree.get(id) {
            Some(node) => {
                let collapsed = !node.collapsed;
                self.set_collapsed(id, collapsed)
            }
            None => false,
        }
    }

    /// Enter or leave label editing. Transient: no history, no save. At
    /// most one node edits at a time.
    pub fn set_editing(&mut self, id: NodeId, editing: bool) -> bool {
        let Some(node) = self.tree.get(id) else {
            return false;
        };
        if node.is_editing == editing {
            return false;
        }
        if editing {
            self.tree.clear_editing();
        }
        let patch = NodePatch {
            is_editing: Some(editing),
            ..NodePatch::default()
        };
        let fields = patch.changed_fields();
        if self.tree.update_node(id, patch).is_err() {
            return false;
        }
        self.events.emit(&EngineEvent::NodeChanged { id, fields });
        true
    }

    /// Apply `patch` as one user action. Returns false for unknown nodes and
    /// for patches that change nothing.
    fn edit(&mut self, id: NodeId, patch: NodePatch, description: &str) -> bool {
        let Some(old) = self.tree.get(id).cloned() else {
            log::debug!("{description}: unknown node {id}");
            return false;
        };
        let before = self.document();
        if let Err(e) = self.tree.update_node(id, patch) {
            log::debug!("{description} on {id} rejected: {e}");
            return false;
        }
        let fields = match self.tree.get(id) {
            Some(new) => old.diff_fields(new),
            None => return false,
        };
        if fields.is_empty() {
            return false;
        }
        self.commit(before, description);
        self.events.emit(&EngineEvent::NodeChanged { id, fields });
        true
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Revert the last user action or applied batch. Refused mid-gesture.
    pub fn undo(&mut self) -> bool {
        if self.history.is_batching() {
            return false;
        }
        let current = self.document();
        match self.history.undo(current) {
            Some(snapshot) => self.restore(&snapshot.state),
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.history.is_batching() {
            return false;
        }
        let current = self.document();
        match self.history.redo(current) {
            Some(snapshot) => self.restore(&snapshot.state),
            None => false,
        }
    }

    /// Swap `doc` in as the current state and tell subscribers what changed.
    fn restore(&mut self, doc: &MindMapDocument) -> bool {
        let mut tree = match TreeModel::from_document(doc) {
            Ok(tree) => tree,
            Err(e) => {
                log::error!("history snapshot is invalid: {e}");
                return false;
            }
        };
        tree.clear_editing();
        let old = std::mem::replace(&mut self.tree, tree);
        let old_direction = std::mem::replace(&mut self.direction, doc.direction);
        self.drag.cancel();

        let removed: Vec<NodeId> = old
            .pre_order()
            .into_iter()
            .filter(|id| !self.tree.contains(*id))
            .collect();
        self.forget_removed(&removed);
        self.after_commit();

        if let Some(&root) = removed.first() {
            self.events.emit(&EngineEvent::NodesRemoved {
                root,
                parent: old.parent_of(root),
                removed,
            });
        }
        let changed: Vec<_> = self
            .tree
            .iter()
            .filter_map(|new| {
                let fields = old.get(new.id)?.diff_fields(new);
                (!fields.is_empty()).then_some((new.id, fields))
            })
            .collect();
        for (id, fields) in changed {
            self.events.emit(&EngineEvent::NodeChanged { id, fields });
        }
        if old_direction != self.direction {
            self.events.emit(&EngineEvent::LayoutChanged {
                direction: self.direction,
            });
        }
        true
    }

    // ─── Task batches ────────────────────────────────────────────────────

    /// Apply a change batch from a background task as one undo step.
    /// On error the tree is untouched.
    pub fn apply_mindmap_changes(
        &mut self,
        records: &[ChangeRecord],
    ) -> Result<ApplyReport, ChangeError> {
        let before = self.document();
        self.history.begin_batch(before, "apply changes");
        let result =
            ChangeApplicator::new(self.config.max_batch_records).apply(&mut self.tree, records);
        if matches!(&result, Ok(report) if report.mutated()) {
            self.history.mark_dirty();
        }
        let current = self.document();
        self.history.end_batch(&current);

        let report = result?;
        if !report.mutated() {
            return Ok(report);
        }
        self.forget_removed(&report.removed);
        self.after_commit();

        for deletion in &report.deletions {
            self.events.emit(&EngineEvent::NodesRemoved {
                root: deletion.root,
                parent: deletion.parent,
                removed: deletion.removed.clone(),
            });
        }
        for (id, fields) in &report.updated {
            if self.tree.contains(*id) {
                self.events.emit(&EngineEvent::NodeChanged {
                    id: *id,
                    fields: fields.clone(),
                });
            }
        }
        Ok(report)
    }

    /// Apply the result of `task_id` exactly once. A failed batch releases
    /// the task so a redelivery can try again.
    pub fn on_task_completed(
        &mut self,
        task_id: &str,
        records: &[ChangeRecord],
    ) -> Result<ApplyReport, ChangeError> {
        self.tasks.begin(task_id)?;
        self.apply_mindmap_changes(records).inspect_err(|e| {
            log::warn!("task {task_id} failed to apply: {e}");
            self.tasks.retry(task_id);
        })
    }

    /// Ignore any further batches of `task_id`.
    pub fn cancel_task(&mut self, task_id: &str) {
        log::debug!("task {task_id} cancelled");
        self.tasks.cancel(task_id);
    }

    /// The workflow session ended; forget processed and cancelled tasks.
    pub fn end_session(&mut self) {
        self.tasks.clear();
    }

    // ─── Drag ────────────────────────────────────────────────────────────

    /// Start dragging `id` from pointer `(x, y)`. The whole gesture becomes
    /// at most one undo step.
    pub fn begin_drag(&mut self, id: NodeId, x: f32, y: f32) -> bool {
        if self.drag.is_dragging() || !self.drag.on_drag_start(id, x, y, &self.tree) {
            return false;
        }
        let start = self.document();
        self.history.begin_batch(start, "move node");
        true
    }

    /// Pointer moved during a drag: update the preview and drop target.
    pub fn drag_to(&mut self, x: f32, y: f32) -> Option<DragUpdate> {
        let id = self.drag.dragged()?;
        let update = self.drag.on_drag(id, x, y, &self.tree, &self.config.layout)?;
        self.tree.set_preview_position(id, update.preview);
        Some(update)
    }

    /// Drop. Commits the move if the drop is valid; otherwise the node
    /// snaps back to its laid-out position.
    pub fn end_drag(&mut self) -> bool {
        let Some(id) = self.drag.dragged() else {
            return false;
        };
        let moved = match self.drag.on_drag_stop(id, &self.tree) {
            Some(proposal) => self.move_node(proposal.node, proposal.new_parent, proposal.index),
            None => {
                self.relayout();
                false
            }
        };
        let current = self.document();
        self.history.end_batch(&current);
        moved
    }

    pub fn cancel_drag(&mut self) {
        if !self.drag.is_dragging() {
            return;
        }
        self.drag.cancel();
        self.relayout();
        let current = self.document();
        self.history.end_batch(&current);
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Select `id`, or clear the selection. Unknown ids clear it.
    pub fn select(&mut self, id: Option<NodeId>) {
        self.selection
            .select(id.filter(|id| self.tree.contains(*id)));
    }

    pub fn select_next(&mut self) -> Option<NodeId> {
        self.selection.next(&self.tree)
    }

    pub fn select_previous(&mut self) -> Option<NodeId> {
        self.selection.previous(&self.tree)
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Route a host event. Returns true if it was consumed.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::PointerDown { x, y, target } => {
                self.select(*target);
                match target {
                    Some(id) => {
                        self.begin_drag(*id, *x, *y);
                        true
                    }
                    None => false,
                }
            }
            InputEvent::PointerMove { x, y } => self.drag_to(*x, *y).is_some(),
            InputEvent::PointerUp { x, y } => {
                if !self.drag.is_dragging() {
                    return false;
                }
                self.drag_to(*x, *y);
                self.end_drag();
                true
            }
            InputEvent::Key { key, modifiers } => match ShortcutMap::resolve(key, *modifiers) {
                Some(action) => self.run_shortcut(action),
                None => false,
            },
        }
    }

    /// Run a shortcut against the current selection.
    pub fn run_shortcut(&mut self, action: ShortcutAction) -> bool {
        let selected = self.selection.selected();
        match action {
            ShortcutAction::AddChild => selected.and_then(|id| self.add_child(id)).is_some(),
            ShortcutAction::AddSibling => selected.and_then(|id| self.add_sibling(id)).is_some(),
            ShortcutAction::Delete => {
                selected.is_some_and(|id| !self.delete_node(id).is_empty())
            }
            ShortcutAction::ToggleCollapse => selected.is_some_and(|id| self.toggle_collapse(id)),
            ShortcutAction::StartEditing => selected.is_some_and(|id| self.set_editing(id, true)),
            ShortcutAction::Undo => self.undo(),
            ShortcutAction::Redo => self.redo(),
            ShortcutAction::SelectNext => self.select_next().is_some(),
            ShortcutAction::SelectPrevious => self.select_previous().is_some(),
            ShortcutAction::Deselect => {
                self.tree.clear_editing();
                self.selection.select(None);
                true
            }
            ShortcutAction::FitView => {
                self.fit.force(Instant::now());
                true
            }
        }
    }

    // ─── Layout & persistence ────────────────────────────────────────────

    /// The view transform to apply, once the debounce window after the last
    /// layout change has passed.
    pub fn poll_fit(&mut self, now: Instant) -> Option<ViewFit> {
        if !self.fit.poll(now) {
            return None;
        }
        let bounds: Vec<_> = visible_bounds(&self.tree, &self.config.layout)
            .into_iter()
            .map(|(_, b)| b)
            .collect();
        Some(fit_view(&bounds, self.config.viewport, self.config.fit_padding))
    }

    /// Write the current document to the store. On failure the map stays
    /// dirty and the next commit tries again.
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let doc = self.document();
        match self.persistence.save(&self.map_id, &doc) {
            Ok(()) => {
                self.dirty = false;
                self.events.emit(&EngineEvent::Saved);
                Ok(())
            }
            Err(e) => {
                log::warn!("saving map {} failed: {e}", self.map_id);
                self.events.emit(&EngineEvent::PersistenceFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn commit(&mut self, before: MindMapDocument, description: &str) {
        log::debug!("{description}");
        self.history.push_snapshot(before, description);
        self.after_commit();
    }

    fn after_commit(&mut self) {
        self.relayout();
        self.dirty = true;
        // `save` already emitted `PersistenceFailed`; the next commit retries.
        if let Err(e) = self.save() {
            log::debug!("map {} stays dirty: {e}", self.map_id);
        }
    }

    fn relayout(&mut self) {
        let positions: HashMap<NodeId, _> =
            compute_layout(&self.tree, self.direction, &self.config.layout);
        self.tree.apply_positions(&positions);
        self.fit.request(Instant::now());
    }

    fn forget_removed(&mut self, removed: &[NodeId]) {
        self.selection.forget(removed);
        if self.drag.dragged().is_some_and(|id| removed.contains(&id)) {
            self.cancel_drag();
        }
    }

    /// A drag whose node just became hidden cannot continue.
    fn forget_hidden_drag(&mut self) {
        if let Some(id) = self.drag.dragged()
            && !visible_nodes(&self.tree).contains(&id)
        {
            self.cancel_drag();
        }
    }
}
