use std::sync::Arc;

use vgpad_core::{
    playback::{DirFrameStore, FrameStore, MemoryFrameStore},
    snapshot::ChangeFlags,
    CoreView, Shape, ShapeDocument,
};

type State = (Arc<ShapeDocument>, Arc<Vec<Shape>>);

fn state_of(view: &CoreView) -> State {
    (view.front_doc().shared(), view.dynamic_shapes().shared())
}

/// A short session: a dot already present, two rectangles dragged out, one of them deleted.
fn record_session(store: Arc<dyn FrameStore>) -> State {
    let view = CoreView::default();
    view.set_view_size(400.0, 300.0);
    view.set_command("dot", "");
    view.touch_began(5.0, 5.0);
    view.touch_ended(5.0, 5.0);

    assert!(view.start_record(store));
    assert!(view.is_recording());
    view.set_command("rect", "");
    for at in [20.0, 100.0] {
        view.touch_began(at, at);
        view.touch_moved(at + 10.0, at + 15.0);
        view.touch_moved(at + 30.0, at + 40.0);
        view.touch_ended(at + 30.0, at + 40.0);
    }
    view.set_command("select", "");
    view.touch_began(21.0, 40.0);
    view.touch_ended(21.0, 40.0);
    assert_eq!(view.get_selected_shape_count(), 1);
    assert!(view.do_context_action(3));
    let frames = view.stop_record().unwrap();
    assert!(frames > 6);
    assert!(!view.is_recording());
    state_of(&view)
}

#[test]
fn frames_are_ordered() {
    let store = Arc::new(MemoryFrameStore::new());
    record_session(store.clone());
    let index = store.index().unwrap();
    assert_eq!(index[0].flags, ChangeFlags::DOC_CHANGED);
    for (expected, entry) in index.iter().enumerate() {
        assert_eq!(entry.index as usize, expected);
    }
    assert!(index.windows(2).all(|pair| pair[0].tick <= pair[1].tick));
    assert!(index.iter().any(|entry| entry.flags == ChangeFlags::SHAPE_APPENDED));
    assert!(index.iter().any(|entry| entry.flags == ChangeFlags::DYN_CHANGED));
}

#[test]
fn play_forward_then_step_back() {
    let store = Arc::new(MemoryFrameStore::new());
    let recorded = record_session(store.clone());
    let count = u32::try_from(store.len()).unwrap();

    let view = CoreView::default();
    assert!(view.start_play(store));
    assert!(!view.start_record(Arc::new(MemoryFrameStore::new())));
    // Gestures are ignored during playback.
    view.set_command("dot", "");
    assert!(!view.touch_began(1.0, 1.0));

    let mut states = Vec::new();
    assert!(!view.load_first_frame().is_empty());
    assert_eq!(view.apply_frame(ChangeFlags::all()), ChangeFlags::DOC_CHANGED);
    states.push(state_of(&view));
    for index in 1..count {
        let staged = view.load_next_frame(index);
        assert!(!staged.is_empty());
        // Not applied until asked for.
        assert_eq!(*view.front_doc(), *states.last().unwrap().0);
        assert_eq!(view.apply_frame(ChangeFlags::all()), staged);
        states.push(state_of(&view));
    }
    assert_eq!(view.get_frame_index(), count);
    assert_eq!(*view.front_doc(), *recorded.0);
    assert_eq!(*view.dynamic_shapes(), *recorded.1);

    for index in (1..count).rev() {
        let tick = view.get_play_tick();
        assert!(!view.load_prev_frame(index, tick).is_empty());
        assert!(!view.apply_frame(ChangeFlags::all()).is_empty());
        let (doc, dynamic) = &states[index as usize - 1];
        assert_eq!(*view.front_doc(), **doc);
        assert_eq!(*view.dynamic_shapes(), **dynamic);
        assert_eq!(view.get_frame_index(), index);
        assert!(view.get_play_tick() <= tick);
    }

    // Nothing staged, nothing applied.
    assert!(view.apply_frame(ChangeFlags::all()).is_empty());
    view.stop_play();
    assert!(!view.is_playing());
}

#[test]
fn flags_select_what_applies() {
    let store = Arc::new(MemoryFrameStore::new());
    record_session(store.clone());
    let dynamic_frame = store
        .index()
        .unwrap()
        .into_iter()
        .find(|entry| entry.flags == ChangeFlags::DYN_CHANGED)
        .unwrap();

    let view = CoreView::default();
    view.start_play(store);
    assert_eq!(view.load_next_frame(dynamic_frame.index), ChangeFlags::DYN_CHANGED);
    // A document-only pass leaves it staged.
    assert!(view.apply_frame(ChangeFlags::DOC_CHANGED).is_empty());
    assert_eq!(view.apply_frame(ChangeFlags::DYN_CHANGED), ChangeFlags::DYN_CHANGED);
    assert!(!view.dynamic_shapes().is_empty());
}

#[test]
fn corrupt_frame_leaves_document() {
    let dir = std::env::temp_dir().join(format!("vgpad-playback-{}", std::process::id()));
    let store = Arc::new(DirFrameStore::create(&dir, false).unwrap());
    record_session(store);

    let view = CoreView::default();
    let index = view.load_frame_index(&dir).unwrap();
    assert!(index.len() > 2);
    assert!(view.load_frame_index(dir.join("nowhere")).is_none());

    // Flip a bit of frame 2's checksum.
    let path = dir.join("2.json");
    let mut frame: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let checksum = frame["checksum"].as_u64().unwrap();
    frame["checksum"] = serde_json::json!(checksum ^ 1);
    std::fs::write(&path, frame.to_string()).unwrap();

    assert!(view.start_play(Arc::new(DirFrameStore::open(&dir).unwrap())));
    view.load_first_frame();
    view.apply_frame(ChangeFlags::all());
    view.load_next_frame(1);
    view.apply_frame(ChangeFlags::all());
    let before = state_of(&view);
    let changes = view.get_change_count();

    assert!(view.load_next_frame(2).is_empty());
    assert!(view.apply_frame(ChangeFlags::all()).is_empty());
    assert_eq!(*view.front_doc(), *before.0);
    assert_eq!(view.get_change_count(), changes);
    assert_eq!(view.get_frame_index(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_load_drops_the_staged_frame() {
    let store = Arc::new(MemoryFrameStore::new());
    record_session(store.clone());

    let view = CoreView::default();
    assert!(view.start_play(store));
    assert!(!view.load_first_frame().is_empty());
    assert!(view.load_next_frame(999).is_empty());
    assert!(view.apply_frame(ChangeFlags::all()).is_empty());
    assert_eq!(view.get_frame_index(), 0);
    assert_eq!(view.get_shape_count(), 0);
}

#[test]
fn reused_directory_plays_only_the_new_recording() {
    let dir = std::env::temp_dir().join(format!("vgpad-reused-{}", std::process::id()));
    record_session(Arc::new(DirFrameStore::create(&dir, false).unwrap()));

    // Record again into the same place, stopping right after the starting frame.
    let view = CoreView::default();
    assert!(view.start_record(Arc::new(DirFrameStore::create(&dir, false).unwrap())));
    assert_eq!(view.stop_record(), Some(1));

    let player = CoreView::default();
    assert!(player.start_play(Arc::new(DirFrameStore::open(&dir).unwrap())));
    assert_eq!(player.load_frame_index(&dir).map(|index| index.len()), Some(1));
    assert!(player.load_prev_frame(4, u32::MAX).is_empty());
    assert!(player.load_next_frame(3).is_empty());
    assert!(player.apply_frame(ChangeFlags::all()).is_empty());
    assert!(!player.load_first_frame().is_empty());
    assert_eq!(player.apply_frame(ChangeFlags::all()), ChangeFlags::DOC_CHANGED);

    std::fs::remove_dir_all(&dir).unwrap();
}
