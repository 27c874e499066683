//! Document encoding: JSON for interchange, MessagePack for compact storage.
//!
//! Decoding only checks the wire shape. Use [`decode_tree_json`] (or
//! `TreeModel::from_document`) to also validate the tree structure.

use crate::error::CodecError;
use crate::model::{MindMapDocument, TreeModel};

pub fn to_json(doc: &MindMapDocument) -> Result<String, CodecError> {
    Ok(serde_json::to_string(doc)?)
}

pub fn to_json_pretty(doc: &MindMapDocument) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

pub fn from_json(text: &str) -> Result<MindMapDocument, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode and validate in one step.
pub fn decode_tree_json(text: &str) -> Result<(TreeModel, MindMapDocument), CodecError> {
    let doc = from_json(text)?;
    let tree = TreeModel::from_document(&doc)?;
    Ok((tree, doc))
}

/// Encode with field names so optional and skipped fields stay decodable.
pub fn to_msgpack(doc: &MindMapDocument) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(doc)?)
}

pub fn from_msgpack(bytes: &[u8]) -> Result<MindMapDocument, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::model::{LayoutDirection, NodePatch};
    use pretty_assertions::assert_eq;

    fn sample_doc() -> MindMapDocument {
        let mut tree = TreeModel::new("Trip");
        let r = tree.root();
        let a = tree.add_node(r, "Flights").unwrap();
        tree.update_node(
            a,
            NodePatch {
                notes: Some(Some("window seat".into())),
                is_editing: Some(true),
                ..NodePatch::default()
            },
        )
        .unwrap();
        tree.to_document(LayoutDirection::BottomTop)
    }

    #[test]
    fn json_uses_camel_case_and_kebab_direction() {
        let json = to_json(&sample_doc()).unwrap();
        assert!(json.contains("\"parentId\""));
        assert!(json.contains("\"isRoot\":true"));
        assert!(json.contains("\"direction\":\"bottom-top\""));
        assert!(!json.contains("isEditing"));
    }

    #[test]
    fn json_decode_fills_defaults() {
        let text = r#"{"nodes":[{"id":"root-1","label":"Root","parentId":null}]}"#;
        let doc = from_json(text).unwrap();
        assert_eq!(doc.direction, LayoutDirection::LeftRight);
        assert!(doc.edges.is_empty());
        assert_eq!(doc.nodes[0].id, NodeId::intern("root-1"));
    }

    #[test]
    fn msgpack_drops_only_transient_state() {
        let doc = sample_doc();
        let decoded = from_msgpack(&to_msgpack(&doc).unwrap()).unwrap();
        let mut expected = doc;
        for node in &mut expected.nodes {
            node.is_editing = false;
        }
        assert_eq!(decoded, expected);
    }

    #[test]
    fn decode_tree_rejects_orphans() {
        let text = r#"{"nodes":[
            {"id":"orph-root","label":"Root","parentId":null},
            {"id":"orph-child","label":"Lost","parentId":"nowhere"}
        ]}"#;
        assert!(matches!(
            decode_tree_json(text),
            Err(CodecError::Structure(_))
        ));
    }
}
