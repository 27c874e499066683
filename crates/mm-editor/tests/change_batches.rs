//! Integration tests: task change batches through the engine (mm-editor).
//!
//! Batches apply in record order, exactly once per task id, and form a
//! single undo step.

use mm_core::{LayoutDirection, NodeId, Source};
use mm_editor::{
    ChangeError, ChangeRecord, EngineConfig, EngineEvent, MemoryStore, MindMapEngine,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mount() -> MindMapEngine {
    mount_with(EngineConfig::default())
}

fn mount_with(config: EngineConfig) -> MindMapEngine {
    init_logging();
    MindMapEngine::mount(Box::new(MemoryStore::new()), "batch-map", config)
        .expect("memory store mounts")
}

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn research_batch(root: NodeId) -> Vec<ChangeRecord> {
    vec![
        ChangeRecord::create(id("batch-topic"), root, "Topic"),
        ChangeRecord::create(id("batch-detail"), id("batch-topic"), "Detail").with_sources(vec![
            Source {
                title: Some("Paper".into()),
                url: Some("https://example.org/paper".into()),
                snippet: None,
            },
        ]),
        ChangeRecord::update(id("batch-topic")).with_notes("summary"),
    ]
}

#[test]
fn task_batch_applies_exactly_once() {
    let mut engine = mount();
    let r = engine.tree().root();
    let batch = research_batch(r);

    let report = engine.on_task_completed("task-1", &batch).unwrap();
    assert_eq!(report.skipped, Vec::<NodeId>::new());
    assert_eq!(engine.tree().len(), 3);
    let before = engine.document();

    assert_eq!(
        engine.on_task_completed("task-1", &batch).unwrap_err(),
        ChangeError::AlreadyApplied("task-1".into())
    );
    assert_eq!(engine.document(), before);
}

#[test]
fn replayed_batch_is_idempotent() {
    let mut engine = mount();
    let r = engine.tree().root();
    let batch = research_batch(r);

    engine.apply_mindmap_changes(&batch).unwrap();
    let once = engine.document();
    let report = engine.apply_mindmap_changes(&batch).unwrap();
    assert_eq!(report.skipped, vec![id("batch-topic"), id("batch-detail")]);
    assert_eq!(engine.document(), once);
}

#[test]
fn whole_batch_is_one_undo_step() {
    let mut engine = mount();
    let r = engine.tree().root();
    engine.update_label(r, "Research");

    engine.on_task_completed("task-2", &research_batch(r)).unwrap();
    assert_eq!(engine.tree().len(), 3);

    assert!(engine.undo());
    assert_eq!(engine.tree().len(), 1);
    assert_eq!(engine.tree().root_node().label, "Research");

    assert!(engine.redo());
    let topic = engine.tree().get(id("batch-topic")).unwrap();
    assert_eq!(topic.notes.as_deref(), Some("summary"));
}

#[test]
fn batch_without_effect_adds_no_history() {
    let mut engine = mount();
    let batch = [
        ChangeRecord::update(id("batch-missing")).with_text("x"),
        ChangeRecord::delete(id("batch-missing")),
    ];
    let report = engine.apply_mindmap_changes(&batch).unwrap();
    assert_eq!(report.skipped, vec![id("batch-missing")]);
    assert_eq!(report.applied, vec![id("batch-missing")]);
    assert!(!engine.can_undo());
}

#[test]
fn cancelled_task_is_not_applied() {
    let mut engine = mount();
    let r = engine.tree().root();
    engine.cancel_task("task-3");
    assert_eq!(
        engine.on_task_completed("task-3", &research_batch(r)).unwrap_err(),
        ChangeError::Cancelled("task-3".into())
    );
    assert_eq!(engine.tree().len(), 1);

    engine.end_session();
    assert!(engine.on_task_completed("task-3", &research_batch(r)).is_ok());
}

#[test]
fn failed_batch_releases_task_for_redelivery() {
    let mut engine = mount_with(EngineConfig {
        max_batch_records: 2,
        ..EngineConfig::default()
    });
    let r = engine.tree().root();
    let batch = research_batch(r);

    assert_eq!(
        engine.on_task_completed("task-4", &batch).unwrap_err(),
        ChangeError::TooLarge {
            records: 3,
            limit: 2
        }
    );
    assert_eq!(engine.tree().len(), 1);
    assert!(!engine.can_undo());

    // The worker resends the result in two smaller batches.
    let report = engine.on_task_completed("task-4", &batch[..2]).unwrap();
    assert_eq!(report.created, vec![id("batch-topic"), id("batch-detail")]);
    assert_eq!(
        engine.on_task_completed("task-4", &batch[2..]).unwrap_err(),
        ChangeError::AlreadyApplied("task-4".into())
    );
}

#[test]
fn each_deleted_subtree_gets_its_own_event() {
    let mut engine = mount();
    let r = engine.tree().root();
    engine.apply_mindmap_changes(&research_batch(r)).unwrap();
    let other = engine.add_child(r).unwrap();

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.subscribe(move |e| sink.borrow_mut().push(e.clone()));

    engine
        .apply_mindmap_changes(&[
            ChangeRecord::delete(id("batch-detail")),
            ChangeRecord::delete(other),
        ])
        .unwrap();
    let removals: Vec<_> = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, EngineEvent::NodesRemoved { .. }))
        .cloned()
        .collect();
    assert_eq!(
        removals,
        vec![
            EngineEvent::NodesRemoved {
                root: id("batch-detail"),
                parent: Some(id("batch-topic")),
                removed: vec![id("batch-detail")],
            },
            EngineEvent::NodesRemoved {
                root: other,
                parent: Some(r),
                removed: vec![other],
            },
        ]
    );
}

#[test]
fn batch_delete_notifies_panels_and_clears_selection() {
    let mut engine = mount();
    let r = engine.tree().root();
    engine.apply_mindmap_changes(&research_batch(r)).unwrap();
    engine.select(Some(id("batch-detail")));

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.subscribe(move |e| sink.borrow_mut().push(e.clone()));

    engine
        .apply_mindmap_changes(&[ChangeRecord::delete(id("batch-topic"))])
        .unwrap();
    assert_eq!(engine.selected(), None);
    assert!(events.borrow().iter().any(|e| e
        == &EngineEvent::NodesRemoved {
            root: id("batch-topic"),
            parent: Some(r),
            removed: vec![id("batch-topic"), id("batch-detail")],
        }));
}

#[test]
fn later_write_wins_on_same_field() {
    let mut engine = mount();
    let r = engine.tree().root();
    engine.apply_mindmap_changes(&research_batch(r)).unwrap();

    engine.update_label(id("batch-topic"), "User label");
    engine
        .apply_mindmap_changes(&[ChangeRecord::update(id("batch-topic")).with_text("Task label")])
        .unwrap();
    assert_eq!(engine.tree().get(id("batch-topic")).unwrap().label, "Task label");

    engine.update_label(id("batch-topic"), "User again");
    assert_eq!(engine.tree().get(id("batch-topic")).unwrap().label, "User again");
    assert_eq!(engine.direction(), LayoutDirection::LeftRight);
}
