//! Structural errors raised by the tree model and the document codec.

use crate::id::NodeId;
use thiserror::Error;

/// A rejected structural operation or a violated tree invariant.
///
/// Mutations that return this error leave the tree untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not exist")]
    MissingNode(NodeId),
    #[error("parent {parent} of node {child} does not exist")]
    MissingParent { child: NodeId, parent: NodeId },
    #[error("node id {0} is already in use")]
    DuplicateId(NodeId),
    #[error("moving {node} under {target} would create a cycle")]
    Cycle { node: NodeId, target: NodeId },
    #[error("the root node {0} cannot be deleted or moved")]
    RootImmutable(NodeId),
    #[error("document has more than one root ({first} and {second})")]
    MultipleRoots { first: NodeId, second: NodeId },
    #[error("document has no root node")]
    NoRoot,
    #[error("node {node} has level {found}, expected {expected}")]
    LevelMismatch {
        node: NodeId,
        expected: u32,
        found: u32,
    },
    #[error("edge {source_id} -> {target} does not match the parent links")]
    EdgeMismatch { source_id: NodeId, target: NodeId },
}

/// Failure to encode or decode a `MindMapDocument`.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
    #[error(transparent)]
    Structure(#[from] TreeError),
}
