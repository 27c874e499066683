pub mod codec;
pub mod error;
pub mod id;
pub mod layout;
pub mod model;

pub use error::{CodecError, TreeError};
pub use id::NodeId;
pub use layout::{
    LayoutConfig, NodeBounds, ViewFit, Viewport, compute_layout, fit_view, visible_edges,
    visible_nodes,
};
pub use model::*;
