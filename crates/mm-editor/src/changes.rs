//! Application of task-generated change batches.
//!
//! Background generation tasks deliver ordered lists of `ChangeRecord`s.
//! A batch is applied to a staged copy of the tree, record by record in
//! array order, and only committed if the result still satisfies every tree
//! invariant. Records that cannot apply (missing parent, unknown node,
//! duplicate id) are skipped and logged; the rest of the batch proceeds.
//!
//! `TaskLedger` remembers which task ids were already applied so a replayed
//! completion notification is ignored, and lets a failed batch be retried.

use mm_core::{Node, NodeField, NodeId, NodePatch, Source, TreeError, TreeModel};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// One create / update / delete instruction from a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub action: ChangeAction,
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl ChangeRecord {
    pub fn create(node_id: NodeId, parent_id: NodeId, text: &str) -> Self {
        Self {
            action: ChangeAction::Create,
            node_id,
            parent_id: Some(parent_id),
            text: Some(text.to_string()),
            notes: None,
            sources: None,
        }
    }

    pub fn update(node_id: NodeId) -> Self {
        Self {
            action: ChangeAction::Update,
            node_id,
            parent_id: None,
            text: None,
            notes: None,
            sources: None,
        }
    }

    pub fn delete(node_id: NodeId) -> Self {
        Self {
            action: ChangeAction::Delete,
            ..Self::update(node_id)
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = Some(sources);
        self
    }

    fn patch(&self) -> NodePatch {
        NodePatch {
            label: self.text.clone(),
            notes: self.notes.clone().map(Some),
            sources: self.sources.clone().map(Some),
            ..NodePatch::default()
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Records that applied (including deletes of already-absent nodes).
    pub applied: Vec<NodeId>,
    /// Records that were skipped.
    pub skipped: Vec<NodeId>,
    /// Every node removed by delete records, subtrees included.
    pub removed: Vec<NodeId>,
    /// Nodes whose attributes were merged, with the touched fields.
    pub updated: Vec<(NodeId, SmallVec<[NodeField; 4]>)>,
    /// Nodes created by the batch.
    pub created: Vec<NodeId>,
    /// One entry per delete record that removed a subtree.
    pub deletions: Vec<RemovedSubtree>,
}

/// A subtree removed by a single delete record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedSubtree {
    pub root: NodeId,
    /// Parent of `root` at the time of deletion.
    pub parent: Option<NodeId>,
    /// `root` and every descendant it took with it.
    pub removed: Vec<NodeId>,
}

impl ApplyReport {
    /// True if the batch changed the tree at all.
    pub fn mutated(&self) -> bool {
        !(self.created.is_empty() && self.removed.is_empty() && self.updated.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
    #[error("batch left the tree invalid: {0}")]
    Invariant(#[from] TreeError),
    #[error("task {0} was cancelled")]
    Cancelled(String),
    #[error("task {0} was already applied")]
    AlreadyApplied(String),
    #[error("batch of {records} records exceeds the limit of {limit}")]
    TooLarge { records: usize, limit: usize },
}

/// Upper bound on records per batch unless configured otherwise.
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeApplicator {
    max_records: usize,
}

impl Default for ChangeApplicator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_RECORDS)
    }
}

impl ChangeApplicator {
    pub fn new(max_records: usize) -> Self {
        Self { max_records }
    }

    /// Apply `records` in order. The tree is only replaced if the whole
    /// batch is accepted and leaves it valid; on error it is untouched.
    pub fn apply(
        &self,
        tree: &mut TreeModel,
        records: &[ChangeRecord],
    ) -> Result<ApplyReport, ChangeError> {
        if records.len() > self.max_records {
            return Err(ChangeError::TooLarge {
                records: records.len(),
                limit: self.max_records,
            });
        }
        let mut staged = tree.clone();
        let mut report = ApplyReport::default();

        for record in records {
            let id = record.node_id;
            let outcome = match record.action {
                ChangeAction::Create => Self::create(&mut staged, record).map(|()| {
                    report.created.push(id);
                }),
                ChangeAction::Update => {
                    let old = staged.get(id).cloned();
                    staged.update_node(id, record.patch()).map(|()| {
                        let fields = match (old, staged.get(id)) {
                            (Some(old), Some(new)) => old.diff_fields(new),
                            _ => SmallVec::new(),
                        };
                        if !fields.is_empty() {
                            report.updated.push((id, fields));
                        }
                    })
                }
                ChangeAction::Delete => {
                    let parent = staged.parent_of(id);
                    match staged.delete_subtree(id) {
                        Ok(removed) => {
                            report.removed.extend(removed.iter().copied());
                            report.deletions.push(RemovedSubtree {
                                root: id,
                                parent,
                                removed,
                            });
                            Ok(())
                        }
                        Err(TreeError::MissingNode(_)) => Ok(()),
                        Err(e) => Err(e),
                    }
                }
            };

            match outcome {
                Ok(()) => report.applied.push(id),
                Err(e) => {
                    log::warn!("skipping {:?} of {id}: {e}", record.action);
                    report.skipped.push(id);
                }
            }
        }

        staged.check_invariants()?;
        *tree = staged;
        log::debug!(
            "applied change batch: {} applied, {} skipped",
            report.applied.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn create(tree: &mut TreeModel, record: &ChangeRecord) -> Result<(), TreeError> {
        let parent = record.parent_id.ok_or(TreeError::MissingParent {
            child: record.node_id,
            parent: record.node_id,
        })?;
        let mut node = Node::new(record.node_id, record.text.clone().unwrap_or_default());
        node.notes = record.notes.clone();
        node.sources = record.sources.clone();
        tree.insert_node(parent, node, None).map(|_| ())
    }
}

/// Engine-scoped record of processed and cancelled task ids.
#[derive(Debug, Default)]
pub struct TaskLedger {
    processed: HashSet<String>,
    cancelled: HashSet<String>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `task_id` for application.
    pub fn begin(&mut self, task_id: &str) -> Result<(), ChangeError> {
        if self.cancelled.contains(task_id) {
            return Err(ChangeError::Cancelled(task_id.to_string()));
        }
        if !self.processed.insert(task_id.to_string()) {
            return Err(ChangeError::AlreadyApplied(task_id.to_string()));
        }
        Ok(())
    }

    /// Release a claim after a failed application so the batch can be
    /// delivered again.
    pub fn retry(&mut self, task_id: &str) {
        self.processed.remove(task_id);
    }

    /// Stop applying further batches of `task_id`. Already-applied batches
    /// stay applied.
    pub fn cancel(&mut self, task_id: &str) {
        self.cancelled.insert(task_id.to_string());
    }

    pub fn is_processed(&self, task_id: &str) -> bool {
        self.processed.contains(task_id)
    }

    pub fn is_cancelled(&self, task_id: &str) -> bool {
        self.cancelled.contains(task_id)
    }

    /// Forget everything; called when the workflow session ends.
    pub fn clear(&mut self) {
        self.processed.clear();
        self.cancelled.clear();
    }
}
