//! Notice sequences emitted by stage mutations

use notice_stage::{ObjectsChangedEvent, ScenePath, Stage, StageError, StageNotice, StageNoticeKind};
use parking_lot::Mutex;
use std::sync::Arc;

fn path(s: &str) -> ScenePath {
    ScenePath::parse(s).unwrap()
}

fn record(stage: &Stage) -> Arc<Mutex<Vec<StageNotice>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    stage.register(move |notice| {
        sink.lock().push(notice.clone());
        Ok(())
    });
    seen
}

fn kinds(seen: &Mutex<Vec<StageNotice>>) -> Vec<StageNoticeKind> {
    seen.lock().iter().map(StageNotice::kind).collect()
}

#[test]
fn test_define_nested_prim_emits_one_pair_per_created_prim() {
    let stage = Stage::create_in_memory();
    let seen = record(&stage);

    stage.define_prim("/Foo/Bar").unwrap();

    assert_eq!(
        kinds(&seen),
        vec![
            StageNoticeKind::ObjectsChanged,
            StageNoticeKind::StageContentsChanged,
            StageNoticeKind::ObjectsChanged,
            StageNoticeKind::StageContentsChanged,
        ]
    );

    let seen = seen.lock();
    let expected = ObjectsChangedEvent::resync(path("/Foo")).with_field(path("/Foo"), "specifier");
    assert_eq!(seen[0], StageNotice::ObjectsChanged(expected));
    match &seen[2] {
        StageNotice::ObjectsChanged(event) => {
            assert_eq!(event.resynced_paths, vec![path("/Foo/Bar")]);
            assert!(event.changed_info_only_paths.is_empty());
        }
        other => panic!("unexpected notice {:?}", other),
    }
}

#[test]
fn test_metadata_and_property_edits_are_info_only() {
    let stage = Stage::create_in_memory();
    stage.define_prim("/Foo").unwrap();
    let seen = record(&stage);

    stage.set_metadata("/Foo", "comment", "hello").unwrap();
    stage.set_property("/Foo", "size", 2.0).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 4);
    assert_eq!(
        seen[0],
        StageNotice::ObjectsChanged(ObjectsChangedEvent::info_only(path("/Foo"), "comment"))
    );
    assert_eq!(
        seen[2],
        StageNotice::ObjectsChanged(ObjectsChangedEvent::info_only(path("/Foo.size"), "default"))
    );
}

#[test]
fn test_sublayer_resyncs_root() {
    let stage = Stage::create_in_memory();
    let seen = record(&stage);

    stage.add_sublayer("layer1.usda").unwrap();

    assert_eq!(stage.layer_stack().len(), 2);
    assert_eq!(
        seen.lock()[0],
        StageNotice::ObjectsChanged(ObjectsChangedEvent::resync(ScenePath::absolute_root()))
    );
}

#[test]
fn test_muting_reports_only_actual_changes() {
    let stage = Stage::create_in_memory();
    let seen = record(&stage);

    stage.mute_layer("a.usda").unwrap();
    stage.mute_layer("a.usda").unwrap();
    stage.mute_and_unmute_layers(&["b.usda"], &["a.usda", "c.usda"]).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 4);
    assert_eq!(
        seen[0],
        StageNotice::LayerMutingChanged {
            muted: vec!["a.usda".to_string()],
            unmuted: Vec::new(),
        }
    );
    assert_eq!(
        seen[2],
        StageNotice::LayerMutingChanged {
            muted: vec!["b.usda".to_string()],
            unmuted: vec!["a.usda".to_string()],
        }
    );
    assert_eq!(stage.muted_layers(), vec!["b.usda".to_string()]);
}

#[test]
fn test_edit_target_change_is_reported_once() {
    let stage = Stage::create_in_memory();
    stage.add_sublayer("layer1.usda").unwrap();
    let seen = record(&stage);

    stage.set_edit_target("layer1.usda").unwrap();
    stage.set_edit_target("layer1.usda").unwrap();

    assert_eq!(kinds(&seen), vec![StageNoticeKind::StageEditTargetChanged]);
}

#[test]
fn test_listener_error_aborts_the_sequence() {
    let stage = Stage::create_in_memory();
    let seen = record(&stage);
    stage.register(|notice| match notice {
        StageNotice::ObjectsChanged(_) => Err("listener refused".into()),
        _ => Ok(()),
    });

    let err = stage.define_prim("/Foo").unwrap_err();
    assert!(matches!(err, StageError::Listener(_)));
    // The change itself is applied before notices go out.
    assert!(stage.has_prim("/Foo"));
    assert_eq!(kinds(&seen), vec![StageNoticeKind::ObjectsChanged]);
}

#[test]
fn test_dropping_the_stage_announces_closing() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let stage = Stage::create_in_memory();
        let sink = Arc::clone(&seen);
        stage.register(move |notice: &StageNotice| {
            sink.lock().push(notice.kind());
            Ok(())
        });
    }
    assert_eq!(*seen.lock(), vec![StageNoticeKind::StageClosing]);
}
