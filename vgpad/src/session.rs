//! Recording a scripted session, and playing recordings back in real time.

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use vgpad_core::{
    playback::{DirFrameStore, FrameIndexEntry, FrameStore},
    snapshot::ChangeFlags,
    CoreView,
};

/// Pause between scripted pointer events.
const EVENT_INTERVAL: Duration = Duration::from_millis(16);

fn stroke(view: &CoreView, from: (f32, f32), to: (f32, f32)) {
    const STEPS: u8 = 8;
    view.touch_began(from.0, from.1);
    for step in 1..=STEPS {
        std::thread::sleep(EVENT_INTERVAL);
        let t = f32::from(step) / f32::from(STEPS);
        view.touch_moved(from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
    }
    view.touch_ended(to.0, to.1);
}

/// Record a short drawing session into `dir`. Returns the number of frames written.
pub fn record_demo(view: &CoreView, dir: &Path) -> anyhow::Result<u32> {
    let store = Arc::new(DirFrameStore::create(dir, view.settings().pretty_json)?);
    anyhow::ensure!(view.start_record(store), "view refused to record");
    view.set_view_size(800.0, 600.0);

    let strokes = [
        ("line", (40.0, 40.0), (300.0, 120.0)),
        ("rect", (320.0, 60.0), (520.0, 220.0)),
        ("dot", (600.0, 300.0), (600.0, 300.0)),
        ("line", (300.0, 120.0), (320.0, 400.0)),
    ];
    for (command, from, to) in strokes {
        anyhow::ensure!(view.set_command(command, ""), "no {command} command");
        stroke(view, from, to);
    }
    // Drag the rectangle somewhere else, then clone it.
    view.set_command("select", "");
    stroke(view, (420.0, 60.0), (420.0, 300.0));
    view.do_context_action(4);

    view.stop_record().ok_or_else(|| anyhow::anyhow!("recording stopped early"))
}

/// Play the recording in `dir` into `view`, keeping to its timing scaled by `speed`. Returns the number of
/// frames applied.
///
/// Frames are read on a loader thread, each one while the previous waits for its time to come.
pub fn play(view: &CoreView, dir: &Path, speed: f32) -> anyhow::Result<u32> {
    let store = Arc::new(DirFrameStore::open(dir)?);
    let entries = store.index()?;
    anyhow::ensure!(!entries.is_empty(), "{} holds no frames", dir.display());
    anyhow::ensure!(view.start_play(store), "view refused to play");

    let (staged_send, staged_recv) = crossbeam::channel::bounded::<(FrameIndexEntry, ChangeFlags)>(1);
    let (applied_send, applied_recv) = crossbeam::channel::bounded::<()>(1);

    let mut applied = 0;
    std::thread::scope(|scope| {
        scope.spawn(move || {
            for entry in entries {
                let flags = if entry.index == 0 {
                    view.load_first_frame()
                } else {
                    view.load_next_frame(entry.index)
                };
                if staged_send.send((entry, flags)).is_err() || applied_recv.recv().is_err() {
                    return;
                }
            }
        });

        let start = Instant::now();
        for (entry, flags) in staged_recv {
            if flags.is_empty() {
                log::warn!("frame {} couldn't be loaded, skipping", entry.index);
            } else {
                let due = Duration::from_secs_f64(f64::from(entry.tick) / 1000.0 / f64::from(speed));
                if let Some(wait) = due.checked_sub(start.elapsed()) {
                    std::thread::sleep(wait);
                }
                let changed = view.apply_frame(ChangeFlags::all());
                if !changed.is_empty() {
                    applied += 1;
                    // Stand-in for a render pass.
                    view.mark_drawn();
                }
                log::trace!("frame {} at {}ms: {changed:?}", entry.index, entry.tick);
            }
            if applied_send.send(()).is_err() {
                break;
            }
        }
    });
    view.stop_play();
    Ok(applied)
}
