pub mod changes;
pub mod drag;
pub mod engine;
pub mod events;
pub mod history;
pub mod input;
pub mod persistence;
pub mod selection;
pub mod shortcuts;
pub mod viewport;

pub use changes::{
    ApplyReport, ChangeAction, ChangeApplicator, ChangeError, ChangeRecord,
    DEFAULT_MAX_BATCH_RECORDS, RemovedSubtree, TaskLedger,
};
pub use drag::{DRAG_THRESHOLD, DragController, DropPosition, DropTarget, MoveProposal};
pub use engine::{EngineConfig, MindMapEngine};
pub use events::{EngineEvent, EventBus, SubscriptionId};
pub use history::{HistoryManager, Snapshot};
pub use input::{InputEvent, Modifiers};
pub use persistence::{MemoryStore, Persistence, PersistenceError};
pub use selection::SelectionController;
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use viewport::FitScheduler;
