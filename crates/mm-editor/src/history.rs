//! Undo/Redo history.
//!
//! History is snapshot-based: every user mutation pushes the document as it
//! was *before* the mutation, so undo simply swaps a whole document back in.
//! Snapshots are immutable and shared (`Arc`), which keeps undo → redo →
//! undo cycles allocation-free.
//!
//! Multi-step gestures use **batching**: the document is captured once at
//! `begin_batch` and the whole gesture becomes a single undo step at
//! `end_batch` (no step at all if nothing changed).

use mm_core::MindMapDocument;
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// One restorable state plus the label of the action it undoes.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: Arc<MindMapDocument>,
    pub description: String,
}

impl Snapshot {
    fn new(state: MindMapDocument, description: &str) -> Self {
        Self {
            state: Arc::new(state),
            description: description.to_string(),
        }
    }
}

/// Bounded undo/redo stacks of document snapshots.
#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    /// Maximum undo depth; the oldest entries are evicted beyond it.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// State captured at the start of the outermost batch.
    batch_snapshot: Option<Snapshot>,
    /// Whether any mutation was recorded during the current batch.
    batch_dirty: bool,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            batch_depth: 0,
            batch_snapshot: None,
            batch_dirty: false,
        }
    }

    /// Record the pre-mutation `state` of a user action and clear redo.
    ///
    /// Inside a batch the call only marks the batch dirty; the state
    /// captured by `begin_batch` is what gets pushed.
    pub fn push_snapshot(&mut self, state: MindMapDocument, description: &str) {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            return;
        }
        self.push_undo(Snapshot::new(state, description));
        self.redo_stack.clear();
    }

    /// Start a batch group, capturing `state` as its undo point.
    pub fn begin_batch(&mut self, state: MindMapDocument, description: &str) {
        if self.batch_depth == 0 {
            self.batch_snapshot = Some(Snapshot::new(state, description));
            self.batch_dirty = false;
        }
        self.batch_depth += 1;
    }

    /// End a batch group. When the outermost batch closes and the document
    /// actually changed, one snapshot is pushed.
    pub fn end_batch(&mut self, current: &MindMapDocument) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }
        if let Some(before) = self.batch_snapshot.take()
            && self.batch_dirty
            && *before.state != *current
        {
            self.push_undo(before);
            self.redo_stack.clear();
        }
        self.batch_dirty = false;
    }

    /// Note that the open batch mutated the document.
    pub fn mark_dirty(&mut self) {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Pop the last undo point. `current` moves to the redo stack.
    pub fn undo(&mut self, current: MindMapDocument) -> Option<Snapshot> {
        let snapshot = self.undo_stack.pop_back()?;
        self.redo_stack
            .push(Snapshot::new(current, &snapshot.description));
        Some(snapshot)
    }

    /// Pop the last redo point. `current` moves back to the undo stack.
    pub fn redo(&mut self, current: MindMapDocument) -> Option<Snapshot> {
        let snapshot = self.redo_stack.pop()?;
        self.push_undo(Snapshot::new(current, &snapshot.description));
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Label of the action the next undo would revert.
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|s| s.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.batch_snapshot = None;
        self.batch_dirty = false;
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_core::{LayoutDirection, TreeModel};

    fn doc_with(labels: &[&str]) -> MindMapDocument {
        let mut tree = TreeModel::new("Root");
        let r = tree.root();
        for label in labels {
            tree.add_node(r, label).unwrap();
        }
        tree.to_document(LayoutDirection::LeftRight)
    }

    #[test]
    fn undo_returns_pushed_state() {
        let mut history = HistoryManager::new(10);
        let before = doc_with(&[]);
        let after = doc_with(&["a"]);
        history.push_snapshot(before.clone(), "add");

        let snap = history.undo(after.clone()).unwrap();
        assert_eq!(*snap.state, before);
        assert_eq!(snap.description, "add");

        let redo = history.redo(before).unwrap();
        assert_eq!(*redo.state, after);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn redo_clears_on_new_action() {
        let mut history = HistoryManager::new(10);
        history.push_snapshot(doc_with(&[]), "one");
        history.undo(doc_with(&["x"]));
        assert!(history.can_redo());

        history.push_snapshot(doc_with(&[]), "two");
        assert!(!history.can_redo());
    }

    #[test]
    fn max_depth_trims_oldest() {
        let mut history = HistoryManager::new(3);
        for i in 0..5 {
            history.push_snapshot(doc_with(&[]), &format!("step {i}"));
        }
        assert_eq!(history.undo_len(), 3);
        assert_eq!(history.undo_description(), Some("step 4"));

        let mut undo_count = 0;
        while history.undo(doc_with(&[])).is_some() {
            undo_count += 1;
        }
        assert_eq!(undo_count, 3);
    }

    #[test]
    fn batch_undo_is_single_step() {
        let mut history = HistoryManager::new(10);
        let start = doc_with(&[]);
        history.begin_batch(start.clone(), "apply batch");
        for _ in 0..4 {
            history.push_snapshot(doc_with(&["ignored"]), "inner");
        }
        history.end_batch(&doc_with(&["a", "b"]));

        assert_eq!(history.undo_len(), 1);
        let snap = history.undo(doc_with(&["a", "b"])).unwrap();
        assert_eq!(*snap.state, start);
        assert_eq!(snap.description, "apply batch");
    }

    #[test]
    fn empty_batch_no_undo_entry() {
        let mut history = HistoryManager::new(10);
        let doc = doc_with(&[]);
        history.begin_batch(doc.clone(), "noop");
        history.end_batch(&doc);
        assert!(!history.can_undo());
    }

    #[test]
    fn nested_batches_flush_once() {
        let mut history = HistoryManager::new(10);
        history.begin_batch(doc_with(&[]), "outer");
        history.begin_batch(doc_with(&["a"]), "inner");
        history.push_snapshot(doc_with(&["a"]), "m");
        history.end_batch(&doc_with(&["a"]));
        assert!(history.is_batching());
        assert!(!history.can_undo());
        history.end_batch(&doc_with(&["a", "b"]));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo_description(), Some("outer"));
    }
}
