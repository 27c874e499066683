//! Load/save collaborator for mind-map documents.
//!
//! The engine talks to storage only through `Persistence`. Transport is the
//! host's business; `MemoryStore` keeps encoded documents in memory for
//! embedding and tests.

use mm_core::codec;
use mm_core::{CodecError, MindMapDocument};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode: {0}")]
    Encode(#[source] CodecError),
    #[error("decode: {0}")]
    Decode(#[source] CodecError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait Persistence {
    /// Fetch a stored map. `Ok(None)` means the map does not exist yet.
    fn load(&mut self, map_id: &str) -> Result<Option<MindMapDocument>, PersistenceError>;

    fn save(&mut self, map_id: &str, doc: &MindMapDocument) -> Result<(), PersistenceError>;
}

/// In-memory store of MessagePack-encoded documents.
///
/// Clones share the same storage, so a test can keep a handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    maps: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    failing: Rc<Cell<bool>>,
    saves: Rc<Cell<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following load and save fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// Decode the stored copy of `map_id`.
    pub fn stored(&self, map_id: &str) -> Result<Option<MindMapDocument>, PersistenceError> {
        self.maps
            .borrow()
            .get(map_id)
            .map(|bytes| codec::from_msgpack(bytes).map_err(PersistenceError::Decode))
            .transpose()
    }

    /// Store `doc` directly, bypassing the failure switch.
    pub fn insert(&self, map_id: &str, doc: &MindMapDocument) -> Result<(), PersistenceError> {
        let bytes = codec::to_msgpack(doc).map_err(PersistenceError::Encode)?;
        self.maps.borrow_mut().insert(map_id.to_string(), bytes);
        Ok(())
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.failing.get() {
            return Err(PersistenceError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn load(&mut self, map_id: &str) -> Result<Option<MindMapDocument>, PersistenceError> {
        self.check_available()?;
        self.stored(map_id)
    }

    fn save(&mut self, map_id: &str, doc: &MindMapDocument) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.insert(map_id, doc)?;
        self.saves.set(self.saves.get() + 1);
        log::debug!("saved map {map_id} ({} nodes)", doc.nodes.len());
        Ok(())
    }
}
