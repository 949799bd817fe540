//! # Core view
//!
//! The controller tying a document to the active command, the undo history, and recording or playback.
//!
//! There is one edit thread and any number of readers. Readers check out immutable, reference-counted
//! versions of the front document and the dynamic shapes, which stay alive for as long as the checkout
//! does. All mutation goes through a [`DocumentWriter`], which holds the edit lock, works on private
//! copies, and publishes them on drop.
//!
//! Lock order is the edit lock first, then the brief front and dynamic locks. Readers never take the edit
//! lock, so a checkout waits at most for a pointer swap.
//!
//! Public methods keep to plain returns: `false`, `None`, id 0, or empty flags when something can't be
//! done. The reason is logged.

mod checkout;
pub mod transform;
mod writer;

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use az::{Az, SaturatingAs};
pub use checkout::Checkout;
use parking_lot::{Mutex, RwLock};
pub use transform::{TransformError, ViewTransform};
pub use writer::DocumentWriter;
use writer::History;

use crate::{
    commands::{self, Command, CommandContext, CommandName, ContextAction, Edit},
    context::{Context, ContextBits},
    document::ShapeDocument,
    factory::ShapeFactory,
    geom::{Point, Rect},
    handle::{Handle, HandleRegistry},
    playback::{DirFrameStore, FrameError, FrameIndexEntry, FrameStore, PlaybackPlayer, PlaybackRecorder},
    settings::CoreSettings,
    shape::{Dot, ImageRect, Line, RectShape, Shape, ShapeFlags, ShapeID, INVALID_SHAPE_ID},
    snapshot::{ChangeFlags, Snapshot},
    storage::{JsonStorage, LoadError, Storage},
    undo::UndoRecorder,
};

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Everything only the edit thread touches. Guarded by the edit lock.
pub(crate) struct EditState {
    command: Option<Box<dyn Command>>,
    undo: UndoRecorder,
    undo_recording: bool,
    undo_started: Option<Instant>,
    recorder: Option<PlaybackRecorder>,
    /// Style given to new shapes.
    context: Context,
    context_editing: bool,
    /// Style before a live edit through `set_context`, to restore on cancel.
    context_backup: Option<Context>,
    view: ViewTransform,
    view_size: (f32, f32),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Touch {
    Began,
    Moved,
    Ended,
}

/// Sets a flag for the duration of a scope.
struct FlagScope<'a>(&'a AtomicBool);
impl<'a> FlagScope<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}
impl Drop for FlagScope<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CoreView {
    factory: ShapeFactory,
    settings: RwLock<CoreSettings>,
    front: RwLock<Arc<ShapeDocument>>,
    dynamic: RwLock<Arc<Vec<Shape>>>,
    edit: Mutex<EditState>,
    player: RwLock<Option<Arc<PlaybackPlayer>>>,
    doc_checkouts: HandleRegistry<Arc<ShapeDocument>>,
    shape_checkouts: HandleRegistry<Arc<Vec<Shape>>>,
    /// Live scoped [`Checkout`]s.
    scoped_checkouts: AtomicUsize,
    /// Serialized front document, keyed by the change count and pretty flag it was made with.
    content: Mutex<Option<((u64, bool), Arc<str>)>>,
    loading: AtomicBool,
    stopping: AtomicBool,
}
impl Default for CoreView {
    fn default() -> Self {
        Self::new(ShapeFactory::default(), CoreSettings::default())
    }
}

// Construction and settings
impl CoreView {
    #[must_use]
    pub fn new(factory: ShapeFactory, settings: CoreSettings) -> Self {
        let doc = ShapeDocument::new();
        let undo = UndoRecorder::new(Snapshot::of_document(&doc), settings.undo_limit());
        Self {
            factory,
            settings: RwLock::new(settings),
            front: RwLock::new(Arc::new(doc)),
            dynamic: RwLock::new(Arc::new(Vec::new())),
            edit: Mutex::new(EditState {
                command: None,
                undo,
                undo_recording: false,
                undo_started: None,
                recorder: None,
                context: Context::default(),
                context_editing: false,
                context_backup: None,
                view: ViewTransform::default(),
                view_size: (0.0, 0.0),
            }),
            player: RwLock::new(None),
            doc_checkouts: HandleRegistry::new(),
            shape_checkouts: HandleRegistry::new(),
            scoped_checkouts: AtomicUsize::new(0),
            content: Mutex::new(None),
            loading: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        }
    }
    #[must_use]
    pub fn factory(&self) -> &ShapeFactory {
        &self.factory
    }
    #[must_use]
    pub fn settings(&self) -> CoreSettings {
        self.settings.read().clone()
    }
    /// Takes effect for tolerances immediately, for the undo limit at the next `start_undo_record`.
    pub fn set_settings(&self, settings: CoreSettings) {
        *self.settings.write() = settings;
    }
    fn writer(&self, history: History) -> DocumentWriter<'_> {
        DocumentWriter::new(self, history)
    }
    /// Run `f` with exclusive edit access. Changes publish when it returns.
    fn write_with<T>(&self, history: History, f: impl FnOnce(&mut DocumentWriter<'_>) -> T) -> T {
        let mut writer = self.writer(history);
        // Panic safe - the writer publishes nothing while unwinding.
        f(&mut writer)
    }
}

// Checkouts
impl CoreView {
    /// The front document, for the life of the returned checkout.
    #[must_use]
    pub fn front_doc(&self) -> Checkout<'_, ShapeDocument> {
        Checkout::new(self.front.read().clone(), &self.scoped_checkouts)
    }
    /// The dynamic shapes, for the life of the returned checkout.
    #[must_use]
    pub fn dynamic_shapes(&self) -> Checkout<'_, Vec<Shape>> {
        Checkout::new(self.dynamic.read().clone(), &self.scoped_checkouts)
    }
    /// Check out the front document by handle. Must be paired with [`Self::release_doc`].
    pub fn acquire_front_doc(&self) -> u64 {
        let doc = self.front.read().clone();
        self.doc_checkouts.insert(doc).raw()
    }
    pub fn release_doc(&self, handle: u64) {
        let released = Handle::from_raw(handle).and_then(|handle| self.doc_checkouts.remove(handle));
        if released.is_none() {
            log::error!("released document handle {handle} was never acquired");
        }
    }
    /// The document behind a live handle from [`Self::acquire_front_doc`].
    #[must_use]
    pub fn checked_out_doc(&self, handle: u64) -> Option<Arc<ShapeDocument>> {
        self.doc_checkouts.get(Handle::from_raw(handle)?)
    }
    /// Check out the dynamic shapes by handle. Must be paired with [`Self::release_shapes`].
    pub fn acquire_dynamic_shapes(&self) -> u64 {
        let shapes = self.dynamic.read().clone();
        self.shape_checkouts.insert(shapes).raw()
    }
    pub fn release_shapes(&self, handle: u64) {
        let released = Handle::from_raw(handle).and_then(|handle| self.shape_checkouts.remove(handle));
        if released.is_none() {
            log::error!("released shapes handle {handle} was never acquired");
        }
    }
    #[must_use]
    pub fn checked_out_shapes(&self, handle: u64) -> Option<Arc<Vec<Shape>>> {
        self.shape_checkouts.get(Handle::from_raw(handle)?)
    }
    /// Checkouts not yet released, scoped and by handle.
    #[must_use]
    pub fn outstanding_checkouts(&self) -> usize {
        self.scoped_checkouts.load(Ordering::Acquire) + self.doc_checkouts.len() + self.shape_checkouts.len()
    }
    /// Exclusive access to the document for edits made outside of commands, such as by a playback loader.
    /// Nothing is visible to readers until the writer drops.
    #[must_use]
    pub fn playing_doc_for_edit(&self) -> DocumentWriter<'_> {
        let history = if self.is_playing() { History::Skip } else { History::Record };
        self.writer(history)
    }
    /// Exclusive access to the dynamic shapes. The same writer as [`Self::playing_doc_for_edit`], as the two
    /// publish together.
    #[must_use]
    pub fn dynamic_shapes_for_edit(&self) -> DocumentWriter<'_> {
        self.playing_doc_for_edit()
    }
}

// Commands and gestures
impl CoreView {
    /// Make `name` the active command. False if the name is unknown, the parameters aren't understood, or
    /// the current command is mid-gesture.
    pub fn set_command(&self, name: &str, params: &str) -> bool {
        let mut writer = self.writer(History::Skip);
        if let Some(current) = &writer.state.command {
            if !current.can_interrupt() {
                log::debug!("{} is busy, not switching to {name:?}", current.name().as_str());
                return false;
            }
        }
        let Some(mut command) = commands::create(name) else {
            log::warn!("unknown command {name:?}");
            return false;
        };
        if !command.set_params(params) {
            return false;
        }
        if let Some(mut old) = writer.state.command.replace(command) {
            old.touch_cancelled();
        }
        if !writer.dynamic().is_empty() {
            writer.set_dynamic(Vec::new());
        }
        log::debug!("command is now {name}");
        true
    }
    /// Name of the active command.
    #[must_use]
    pub fn command(&self) -> Option<&'static str> {
        self.edit.lock().command.as_ref().map(|command| command.name().as_str())
    }
    /// Move on to the next drawing command.
    pub fn switch_command(&self) -> bool {
        let current = self.edit.lock().command.as_ref().map(|command| command.name());
        let next = current.unwrap_or(CommandName::Select).next_drawing();
        self.set_command(next.as_str(), "")
    }
    #[must_use]
    pub fn is_press_dragging(&self) -> bool {
        self.edit.lock().command.as_ref().is_some_and(|command| command.is_dragging())
    }
    /// Run `f` against the active command, then commit whatever edits it produced and publish its previews.
    /// `f` gets the point mapped to model space, if one was given.
    fn drive_command(
        &self,
        display: Option<Point>,
        f: impl FnOnce(&mut dyn Command, &mut CommandContext<'_>, Point) -> bool,
    ) -> bool {
        if self.is_playing() {
            return false;
        }
        let (hit_tolerance, snap_tolerance) = {
            let settings = self.settings.read();
            (settings.hit_tolerance, settings.snap_tolerance)
        };
        let mut writer = self.writer(History::Record);
        let base = writer.published_doc();
        let (edits, dynamic) = {
            let state = &mut *writer.state;
            let Some(command) = state.command.as_deref_mut() else {
                return false;
            };
            let pt = match display.map(|pt| state.view.unproject(pt)) {
                Some(Ok(pt)) => pt,
                None => Point::ORIGIN,
                Some(Err(e)) => {
                    log::warn!("touch ignored: {e}");
                    return false;
                }
            };
            let scale = state.view.scale();
            let mut cx = CommandContext::new(&base, &self.factory);
            cx.style = state.context;
            cx.hit_tolerance = hit_tolerance / scale;
            cx.snap_tolerance = snap_tolerance / scale;
            if !f(command, &mut cx, pt) {
                return false;
            }
            (cx.edits, command.dynamic_shapes().to_vec())
        };
        for edit in edits {
            match edit {
                Edit::Merge(shapes) => {
                    writer.merge(shapes);
                }
                Edit::Remove(ids) => {
                    writer.remove(&ids);
                }
            }
        }
        if writer.dynamic() != dynamic.as_slice() {
            writer.set_dynamic(dynamic);
        }
        true
    }
    fn touch(&self, x: f32, y: f32, phase: Touch) -> bool {
        self.drive_command(Some(Point::new(x, y)), |command, cx, pt| {
            log::trace!("{} {phase:?} at {pt:?}", command.name().as_str());
            match phase {
                Touch::Began => command.touch_began(cx, pt),
                Touch::Moved => command.touch_moved(cx, pt),
                Touch::Ended => command.touch_ended(cx, pt),
            }
        })
    }
    /// Pointer down, in display coordinates. True if anything changed.
    pub fn touch_began(&self, x: f32, y: f32) -> bool {
        self.touch(x, y, Touch::Began)
    }
    pub fn touch_moved(&self, x: f32, y: f32) -> bool {
        self.touch(x, y, Touch::Moved)
    }
    /// Pointer up. A drawing command commits its shape here.
    pub fn touch_ended(&self, x: f32, y: f32) -> bool {
        self.touch(x, y, Touch::Ended)
    }
    /// Abandon the gesture in progress. The document is untouched.
    pub fn touch_cancelled(&self) {
        let mut writer = self.writer(History::Skip);
        let Some(command) = writer.state.command.as_deref_mut() else {
            return;
        };
        command.touch_cancelled();
        let dynamic = command.dynamic_shapes().to_vec();
        if writer.dynamic() != dynamic.as_slice() {
            writer.set_dynamic(dynamic);
        }
    }
    /// Run one of the [`ContextAction`]s by its code. False if the code is unknown or the action doesn't
    /// apply.
    pub fn do_context_action(&self, code: i32) -> bool {
        let Some(action) = ContextAction::from_repr(code) else {
            log::warn!("unknown context action {code}");
            return false;
        };
        self.drive_command(None, |command, cx, _| {
            let done = command.context_action(cx, action);
            log::debug!("context action {action:?}: {done}");
            done
        })
    }
    fn cancel_gesture(writer: &mut DocumentWriter<'_>) {
        if let Some(command) = writer.state.command.as_deref_mut() {
            command.touch_cancelled();
        }
        if !writer.dynamic().is_empty() {
            writer.set_dynamic(Vec::new());
        }
    }
}

// Undo
impl CoreView {
    /// Begin keeping undo history, starting from the current document. False if already recording.
    pub fn start_undo_record(&self) -> bool {
        let limit = self.settings.read().undo_limit();
        let mut writer = self.writer(History::Skip);
        let base = Snapshot::of_document(writer.doc());
        let state = &mut *writer.state;
        if state.undo_recording {
            return false;
        }
        state.undo = UndoRecorder::new(base, limit);
        state.undo_recording = true;
        state.undo_started = Some(Instant::now());
        log::debug!("undo recording started");
        true
    }
    /// Stop keeping undo history, and drop what was kept.
    pub fn stop_undo_record(&self) {
        let mut writer = self.writer(History::Skip);
        let base = Snapshot::of_document(writer.doc());
        let state = &mut *writer.state;
        state.undo_recording = false;
        state.undo_started = None;
        state.undo.reset(base);
        log::debug!("undo recording stopped");
    }
    #[must_use]
    pub fn is_undo_recording(&self) -> bool {
        self.edit.lock().undo_recording
    }
    /// Whether an undo, redo, or load is replacing the document right now.
    #[must_use]
    pub fn is_undo_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.edit.lock().undo.can_undo()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.edit.lock().undo.can_redo()
    }
    /// Steps that can be undone.
    #[must_use]
    pub fn redo_index(&self) -> usize {
        self.edit.lock().undo.redo_index()
    }
    /// Steps recorded in total.
    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.edit.lock().undo.redo_count()
    }
    pub fn undo(&self) -> bool {
        self.step_history(true)
    }
    pub fn redo(&self) -> bool {
        self.step_history(false)
    }
    fn step_history(&self, back: bool) -> bool {
        let _loading = FlagScope::new(&self.loading);
        let mut writer = self.writer(History::Skip);
        Self::cancel_gesture(&mut writer);

        let factory = &self.factory;
        let mut restored = None;
        let restore = |snapshot: &Snapshot| -> Result<(), LoadError> {
            restored = Some(snapshot.document(factory)?);
            Ok(())
        };
        let undo = &mut writer.state.undo;
        let stepped = if back { undo.undo_with(restore) } else { undo.redo_with(restore) };
        match (stepped, restored) {
            (Ok(true), Some(doc)) => {
                writer.replace_document(doc);
                log::debug!("{} to step {}", if back { "undid" } else { "redid" }, writer.state.undo.redo_index());
                true
            }
            (Ok(_), _) => false,
            (Err(e), _) => {
                log::warn!("history step failed, document kept: {e}");
                false
            }
        }
    }
}

// Recording and playback
impl CoreView {
    /// Begin recording into `store`, starting from the current document. False if recording or playing.
    pub fn start_record(&self, store: Arc<dyn FrameStore>) -> bool {
        if self.is_playing() {
            log::warn!("can't record during playback");
            return false;
        }
        let mut writer = self.writer(History::Skip);
        if writer.state.recorder.is_some() {
            return false;
        }
        match PlaybackRecorder::start(store, writer.doc()) {
            Ok(recorder) => {
                writer.state.recorder = Some(recorder);
                log::debug!("recording started");
                true
            }
            Err(e) => {
                log::error!("failed to start recording: {e}");
                false
            }
        }
    }
    /// Stop recording. Returns how many frames were written.
    pub fn stop_record(&self) -> Option<u32> {
        let recorder = self.edit.lock().recorder.take()?;
        log::debug!("recording stopped after {} frames", recorder.frame_count());
        Some(recorder.frame_count())
    }
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.edit.lock().recorder.is_some()
    }
    /// Milliseconds since undo recording (`for_undo`) or frame recording began. Zero if not started.
    #[must_use]
    pub fn get_record_tick(&self, for_undo: bool) -> u32 {
        let state = self.edit.lock();
        if for_undo {
            state
                .undo_started
                .map_or(0, |start| start.elapsed().as_millis().saturating_as())
        } else {
            state.recorder.as_ref().map_or(0, PlaybackRecorder::tick)
        }
    }
    /// Enter playback of `store`. Gestures are ignored until [`Self::stop_play`]. False if recording or
    /// already playing.
    pub fn start_play(&self, store: Arc<dyn FrameStore>) -> bool {
        let mut writer = self.writer(History::Skip);
        if writer.state.recorder.is_some() || self.player.read().is_some() {
            return false;
        }
        let player = match PlaybackPlayer::new(store) {
            Ok(player) => player,
            Err(e) => {
                log::error!("failed to open recording: {e}");
                return false;
            }
        };
        Self::cancel_gesture(&mut writer);
        log::debug!("playback started, {} frames", player.entries().len());
        *self.player.write() = Some(Arc::new(player));
        true
    }
    /// Leave playback, keeping the document as last played.
    pub fn stop_play(&self) {
        let mut writer = self.writer(History::Skip);
        if self.player.write().take().is_some() {
            if !writer.dynamic().is_empty() {
                writer.set_dynamic(Vec::new());
            }
            log::debug!("playback stopped");
        }
    }
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.player.read().is_some()
    }
    /// The active player, for loader threads.
    #[must_use]
    pub fn player(&self) -> Option<Arc<PlaybackPlayer>> {
        self.player.read().clone()
    }
    fn stage(&self, what: &str, load: impl FnOnce(&PlaybackPlayer) -> Result<ChangeFlags, FrameError>) -> ChangeFlags {
        let Some(player) = self.player() else {
            return ChangeFlags::empty();
        };
        load(&player).unwrap_or_else(|e| {
            log::warn!("failed to load {what} frame: {e}");
            ChangeFlags::empty()
        })
    }
    /// Stage frame 0. Safe to call from a loader thread. Returns what applying it will change.
    pub fn load_first_frame(&self) -> ChangeFlags {
        self.stage("first", PlaybackPlayer::load_first_frame)
    }
    pub fn load_next_frame(&self, index: u32) -> ChangeFlags {
        self.stage("next", |player| player.load_next_frame(index))
    }
    /// Stage the reverse of frame `index`.
    pub fn load_prev_frame(&self, index: u32, current_tick: u32) -> ChangeFlags {
        self.stage("previous", |player| player.load_prev_frame(index, current_tick))
    }
    /// Apply the staged frame if it changes anything in `flags`. Returns what changed.
    pub fn apply_frame(&self, flags: ChangeFlags) -> ChangeFlags {
        let Some(player) = self.player() else {
            return ChangeFlags::empty();
        };
        let Some(staged) = player.take_staged(flags) else {
            return ChangeFlags::empty();
        };
        let mut writer = self.writer(History::Skip);
        let mut doc = writer.doc().clone();
        let mut dynamic = writer.dynamic().to_vec();
        match staged.apply(&self.factory, &mut doc, &mut dynamic) {
            Ok(applied) => {
                if applied.intersects(ChangeFlags::DOC_CHANGED | ChangeFlags::SHAPE_APPENDED) {
                    writer.install(doc);
                }
                if applied.contains(ChangeFlags::DYN_CHANGED) {
                    writer.set_dynamic(dynamic);
                }
                player.mark_applied(&staged);
                applied
            }
            Err(e) => {
                log::warn!("frame {} not applied: {e}", staged.frame.entry.index);
                ChangeFlags::empty()
            }
        }
    }
    /// Frames played so far.
    #[must_use]
    pub fn get_frame_index(&self) -> u32 {
        self.player().map_or(0, |player| player.frame_index())
    }
    /// The playback clock, in milliseconds.
    #[must_use]
    pub fn get_play_tick(&self) -> u32 {
        self.player().map_or(0, |player| player.tick())
    }
    /// Read the frame index of a recording directory.
    #[must_use]
    pub fn load_frame_index(&self, path: impl AsRef<Path>) -> Option<Vec<FrameIndexEntry>> {
        let path = path.as_ref();
        DirFrameStore::read_index(path)
            .map_err(|e| log::warn!("failed to read frame index of {}: {e}", path.display()))
            .ok()
    }
}

// Loading, saving, and content
impl CoreView {
    /// Remove every shape, locked ones included.
    pub fn clear(&self) {
        let mut writer = self.writer(History::Record);
        Self::cancel_gesture(&mut writer);
        writer.doc_mut().clear();
    }
    fn install_loaded(&self, mut doc: ShapeDocument, read_only: bool) {
        if read_only {
            let ids: Vec<ShapeID> = doc.iter().map(Shape::id).collect();
            for id in ids {
                doc.modify(id, |shape| shape.set_flags(shape.flags() | ShapeFlags::LOCKED));
            }
        }
        let _loading = FlagScope::new(&self.loading);
        let mut writer = self.writer(History::Reset);
        Self::cancel_gesture(&mut writer);
        writer.replace_document(doc);
    }
    /// Replace the document with the contents of `s`. On failure the document is unchanged. `read_only`
    /// locks every loaded shape.
    pub fn load_shapes(&self, s: &mut dyn Storage, read_only: bool) -> bool {
        match ShapeDocument::load(&self.factory, s) {
            Ok(doc) => {
                log::debug!("loaded {} shapes", doc.shape_count());
                self.install_loaded(doc, read_only);
                true
            }
            Err(e) => {
                log::warn!("rejected document: {e}");
                false
            }
        }
    }
    /// Write the front document into `s`.
    pub fn save_shapes(&self, s: &mut dyn Storage) -> bool {
        self.front_doc().save(s);
        true
    }
    /// Write a document checked out by [`Self::acquire_front_doc`]. False if the handle isn't live.
    pub fn save_shapes_of(&self, handle: u64, s: &mut dyn Storage) -> bool {
        let Some(doc) = self.checked_out_doc(handle) else {
            log::error!("save of unknown document handle {handle}");
            return false;
        };
        doc.save(s);
        true
    }
    fn read_file(&self, path: &Path) -> Result<ShapeDocument, ViewError> {
        let text = std::fs::read_to_string(path)?;
        let mut storage = JsonStorage::parse(&text)?;
        Ok(ShapeDocument::load(&self.factory, &mut storage)?)
    }
    pub fn load_from_file(&self, path: impl AsRef<Path>, read_only: bool) -> bool {
        let path = path.as_ref();
        match self.read_file(path) {
            Ok(doc) => {
                log::info!("loaded {} shapes from {}", doc.shape_count(), path.display());
                self.install_loaded(doc, read_only);
                true
            }
            Err(e) => {
                log::warn!("failed to load {}: {e}", path.display());
                false
            }
        }
    }
    fn write_file(doc: &ShapeDocument, path: &Path, pretty: bool) -> bool {
        let mut storage = JsonStorage::new();
        doc.save(&mut storage);
        match std::fs::write(path, storage.to_json_string(pretty)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to save {}: {e}", path.display());
                false
            }
        }
    }
    pub fn save_to_file(&self, path: impl AsRef<Path>, pretty: bool) -> bool {
        Self::write_file(&self.front_doc(), path.as_ref(), pretty)
    }
    /// Save a document checked out by [`Self::acquire_front_doc`].
    pub fn save_to_file_of(&self, handle: u64, path: impl AsRef<Path>, pretty: bool) -> bool {
        let Some(doc) = self.checked_out_doc(handle) else {
            log::error!("save of unknown document handle {handle}");
            return false;
        };
        Self::write_file(&doc, path.as_ref(), pretty)
    }
    fn content_of(&self, doc: &ShapeDocument) -> Arc<str> {
        let key = (doc.change_count(), self.settings.read().pretty_json);
        let mut cache = self.content.lock();
        if let Some((cached, text)) = cache.as_ref() {
            if *cached == key {
                return text.clone();
            }
        }
        let mut storage = JsonStorage::new();
        doc.save(&mut storage);
        let text: Arc<str> = storage.to_json_string(key.1).into();
        *cache = Some((key, text.clone()));
        text
    }
    /// The front document as JSON text. Kept until [`Self::free_content`] or the next change.
    #[must_use]
    pub fn get_content(&self) -> Arc<str> {
        self.content_of(&self.front_doc())
    }
    /// The JSON text of a document checked out by [`Self::acquire_front_doc`].
    #[must_use]
    pub fn get_content_of(&self, handle: u64) -> Option<Arc<str>> {
        Some(self.content_of(&*self.checked_out_doc(handle)?))
    }
    pub fn free_content(&self) {
        *self.content.lock() = None;
    }
    /// Replace the document with JSON text. Empty text clears it.
    pub fn set_content(&self, content: &str) -> bool {
        if content.trim().is_empty() {
            self.install_loaded(ShapeDocument::new(), false);
            return true;
        }
        match JsonStorage::parse(content) {
            Ok(mut storage) => self.load_shapes(&mut storage, false),
            Err(e) => {
                log::warn!("rejected content: {e}");
                false
            }
        }
    }
}

// View transform
impl CoreView {
    /// Size of the display, in pixels.
    pub fn set_view_size(&self, width: f32, height: f32) {
        self.edit.lock().view_size = (width, height);
    }
    #[must_use]
    pub fn view_transform(&self) -> ViewTransform {
        self.edit.lock().view.clone()
    }
    pub fn set_view_transform(&self, view: ViewTransform) {
        self.edit.lock().view = view;
    }
    fn zoom_to(&self, model: &Rect) -> bool {
        let mut state = self.edit.lock();
        let (width, height) = state.view_size;
        match state.view.fit(model, width, height) {
            Some(view) => {
                state.view = view;
                true
            }
            None => false,
        }
    }
    /// Fit every visible shape into the display. False if there's nothing to show or no room to show it.
    pub fn zoom_to_extent(&self) -> bool {
        let extent = self.front_doc().bounding_box();
        self.zoom_to(&extent)
    }
    /// Fit a model rectangle into the display.
    pub fn zoom_to_model(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        self.zoom_to(&Rect::from_ltrb([x, y, x + width, y + height]))
    }
    /// Map display coordinates to model coordinates: 2 values are a point, 4 are a `(left, top, right,
    /// bottom)` box. None for any other count.
    #[must_use]
    pub fn display_to_model(&self, values: &[f32]) -> Option<smallvec::SmallVec<[f32; 4]>> {
        let view = self.view_transform();
        let mapped = match *values {
            [x, y] => {
                let pt = view.unproject(Point::new(x, y)).ok()?;
                smallvec::smallvec![pt.x, pt.y]
            }
            [left, top, right, bottom] => {
                let rect = Rect::from_corners(Point::new(left, top), Point::new(right, bottom));
                smallvec::SmallVec::from_slice(&view.unproject_rect(&rect).ok()?.to_ltrb())
            }
            _ => return None,
        };
        Some(mapped)
    }
}

// Style
impl CoreView {
    /// The style for new shapes. Asking for anything but a change ends a live style edit.
    #[must_use]
    pub fn get_context(&self, for_change: bool) -> Context {
        let mut state = self.edit.lock();
        if !for_change {
            state.context_editing = false;
        }
        state.context
    }
    pub fn set_context_editing(&self, editing: bool) {
        self.edit.lock().context_editing = editing;
    }
    #[must_use]
    pub fn is_context_editing(&self) -> bool {
        self.edit.lock().context_editing
    }
    /// Apply the properties of `ctx` picked by `mask` to the style for new shapes and to the unlocked
    /// selected shapes.
    ///
    /// `apply` is 0 to preview on the selection without committing, 1 to commit, and -1 to end a preview
    /// and restore the style it started from.
    pub fn set_context(&self, ctx: &Context, mask: ContextBits, apply: i32) {
        let mut writer = self.writer(History::Record);
        let base = writer.published_doc();
        let state = &mut *writer.state;
        if apply < 0 {
            if let Some(backup) = state.context_backup.take() {
                state.context = backup;
            }
            state.context_editing = false;
            let dynamic = state.command.as_ref().map(|command| command.dynamic_shapes().to_vec());
            writer.set_dynamic(dynamic.unwrap_or_default());
            return;
        }
        if apply == 0 && state.context_backup.is_none() {
            state.context_backup = Some(state.context);
        }
        state.context.apply(ctx, mask);
        state.context_editing = apply == 0;

        let selection = state.command.as_ref().map(|command| command.selection().to_vec()).unwrap_or_default();
        let styled: Vec<Shape> = selection
            .iter()
            .filter_map(|&id| base.get(id))
            .filter(|shape| !shape.is_locked())
            .map(|shape| {
                let mut shape = shape.clone();
                let mut context = *shape.context();
                context.apply(ctx, mask);
                shape.set_context(context);
                shape
            })
            .collect();
        if apply == 0 {
            if !styled.is_empty() {
                writer.set_dynamic(styled);
            }
        } else {
            state.context_backup = None;
            let dynamic = state.command.as_ref().map(|command| command.dynamic_shapes().to_vec());
            if !styled.is_empty() {
                writer.merge(styled);
            }
            writer.set_dynamic(dynamic.unwrap_or_default());
        }
    }
}

// Shape helpers and queries
impl CoreView {
    /// Add an image box of `width` x `height` display pixels at the center of the display. Returns its id,
    /// or 0 on failure.
    pub fn add_image_shape(&self, name: &str, width: f32, height: f32) -> ShapeID {
        let (center, scale) = {
            let state = self.edit.lock();
            let (view_width, view_height) = state.view_size;
            let center = state.view.unproject(Point::new(view_width / 2.0, view_height / 2.0));
            (center, state.view.scale())
        };
        match center {
            Ok(center) => self.add_image_shape_at(name, center.x, center.y, width / scale, height / scale),
            Err(e) => {
                log::warn!("image not added: {e}");
                INVALID_SHAPE_ID
            }
        }
    }
    /// Add an image box centered at `(xc, yc)`, in model units. Returns its id, or 0 on failure.
    pub fn add_image_shape_at(&self, name: &str, xc: f32, yc: f32, width: f32, height: f32) -> ShapeID {
        if name.is_empty() || !(width > 0.0 && height > 0.0) {
            log::warn!("image {name:?} needs a name and a positive size, got {width}x{height}");
            return INVALID_SHAPE_ID;
        }
        self.write_with(History::Record, |writer| {
            let rect = Rect::from_center(Point::new(xc, yc), width, height);
            let shape = Shape::new(Box::new(ImageRect::new(name, rect))).with_context(writer.state.context);
            writer.merge(vec![shape]).first().copied().unwrap_or(INVALID_SHAPE_ID)
        })
    }
    /// Add a grid of assorted shapes as one change. Returns how many.
    pub fn add_shapes_for_test(&self) -> usize {
        const COLUMNS: usize = 10;
        const CELL: f32 = 50.0;
        let count = self.settings.read().test_shape_count;
        self.write_with(History::Record, |writer| {
            let style = writer.state.context;
            let shapes = (0..count)
                .map(|i| {
                    let left = (i % COLUMNS).az::<f32>() * CELL;
                    let top = (i / COLUMNS).az::<f32>() * CELL;
                    let inner = Rect::from_ltrb([left + 5.0, top + 5.0, left + CELL - 5.0, top + CELL - 5.0]);
                    let geometry: Box<dyn crate::shape::Geometry> = match i % 3 {
                        0 => {
                            let [left, top, right, bottom] = inner.to_ltrb();
                            Box::new(Line::new(Point::new(left, top), Point::new(right, bottom)))
                        }
                        1 => Box::new(RectShape::from_rect(inner)),
                        _ => Box::new(Dot::new(inner.center())),
                    };
                    Shape::new(geometry).with_context(style)
                })
                .collect();
            writer.merge(shapes);
        });
        log::debug!("added {count} test shapes");
        count
    }
    /// Extent of every visible shape, in display coordinates.
    #[must_use]
    pub fn get_display_extent(&self) -> Option<[f32; 4]> {
        let extent = self.front_doc().bounding_box();
        if extent.is_null() {
            return None;
        }
        Some(self.view_transform().project_rect(&extent).to_ltrb())
    }
    /// Extent of the selection, in model coordinates.
    #[must_use]
    pub fn get_bounding_box(&self) -> Option<[f32; 4]> {
        let selection = self.selection();
        let doc = self.front_doc();
        let extent = selection
            .iter()
            .filter_map(|&id| doc.bounding_box_of(id))
            .fold(Rect::NULL, |acc, rect| acc.union(rect));
        (!extent.is_null()).then(|| extent.to_ltrb())
    }
    #[must_use]
    pub fn get_bounding_box_of(&self, id: ShapeID) -> Option<[f32; 4]> {
        self.front_doc().bounding_box_of(id).map(|rect| rect.to_ltrb())
    }
    /// Selected ids, in selection order.
    #[must_use]
    pub fn selection(&self) -> Vec<ShapeID> {
        let state = self.edit.lock();
        state.command.as_ref().map(|command| command.selection().to_vec()).unwrap_or_default()
    }
    #[must_use]
    pub fn get_selected_shape_count(&self) -> usize {
        self.selection().len()
    }
    /// Type of the first selected shape.
    #[must_use]
    pub fn get_selected_shape_type(&self) -> Option<&'static str> {
        let id = self.get_selected_shape_id();
        self.front_doc().get(id).map(Shape::type_name)
    }
    /// First selected id, or 0.
    #[must_use]
    pub fn get_selected_shape_id(&self) -> ShapeID {
        self.selection().first().copied().unwrap_or(INVALID_SHAPE_ID)
    }
    #[must_use]
    pub fn get_shape_count(&self) -> usize {
        self.front.read().shape_count()
    }
    #[must_use]
    pub fn get_change_count(&self) -> u64 {
        self.front.read().change_count()
    }
    #[must_use]
    pub fn get_draw_count(&self) -> u64 {
        self.front.read().draw_count()
    }
}

// Drawing housekeeping
impl CoreView {
    /// Count a finished render pass of the front document.
    pub fn mark_drawn(&self) -> u64 {
        self.front.read().mark_drawn()
    }
    /// Ask draw passes in progress to finish early.
    pub fn stop_drawing(&self) {
        self.stopping.store(true, Ordering::Release);
    }
    pub fn resume_drawing(&self) {
        self.stopping.store(false, Ordering::Release);
    }
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
    /// Drop cached serializations.
    pub fn clear_cached_data(&self) {
        self.free_content();
        log::trace!("cached data cleared");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn view() -> CoreView {
        let view = CoreView::default();
        view.set_view_size(200.0, 100.0);
        view
    }
    fn drag(view: &CoreView, from: (f32, f32), to: (f32, f32)) {
        assert!(view.touch_began(from.0, from.1));
        view.touch_moved((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0);
        view.touch_moved(to.0, to.1);
        view.touch_ended(to.0, to.1);
    }

    #[test]
    fn commit_path() {
        let view = view();
        assert!(view.set_command("line", ""));
        assert_eq!(view.command(), Some("line"));
        let before = view.get_change_count();

        assert!(view.touch_began(0.0, 0.0));
        view.touch_moved(10.0, 0.0);
        assert!(view.is_press_dragging());
        assert_eq!(view.dynamic_shapes().len(), 1);
        // Previews aren't in the document.
        assert_eq!(view.get_shape_count(), 0);
        assert!(view.touch_ended(10.0, 0.0));

        assert_eq!(view.get_shape_count(), 1);
        assert_eq!(view.get_change_count(), before + 1);
        assert!(view.dynamic_shapes().is_empty());
        assert!(!view.is_press_dragging());
        // Still drawing lines.
        assert_eq!(view.command(), Some("line"));
    }
    #[test]
    fn cancel_path() {
        let view = view();
        view.start_undo_record();
        assert!(view.set_command("rect", ""));
        view.touch_began(0.0, 0.0);
        view.touch_moved(30.0, 30.0);
        view.touch_cancelled();
        assert!(view.dynamic_shapes().is_empty());
        assert_eq!(view.get_shape_count(), 0);
        assert_eq!(view.get_change_count(), 0);
        assert!(!view.can_undo());
    }
    #[test]
    fn busy_command_refuses_switch() {
        let view = view();
        assert!(!view.set_command("lasso", ""));
        assert!(view.set_command("rect", ""));
        view.touch_began(0.0, 0.0);
        view.touch_moved(30.0, 30.0);
        assert!(!view.set_command("line", ""));
        assert!(!view.switch_command());
        view.touch_ended(30.0, 30.0);
        assert!(view.switch_command());
        assert_eq!(view.command(), Some("dot"));
    }
    #[test]
    fn undo_redo_through_view() {
        let view = view();
        view.set_command("rect", "");
        assert!(view.start_undo_record());
        drag(&view, (0.0, 0.0), (20.0, 20.0));
        drag(&view, (40.0, 40.0), (60.0, 60.0));
        let drawn = view.get_content();

        assert!(view.undo());
        assert_eq!(view.get_shape_count(), 1);
        assert!(view.undo());
        assert_eq!(view.get_shape_count(), 0);
        assert!(!view.undo());
        assert!(view.redo());
        assert!(view.redo());
        assert_eq!(view.get_content(), drawn);
        assert!(!view.is_undo_loading());
    }
    #[test]
    fn context_actions_by_code() {
        let view = view();
        view.set_command("dot", "");
        drag(&view, (5.0, 5.0), (5.0, 5.0));
        view.set_command("select", "");
        assert!(view.do_context_action(ContextAction::SelectAll as i32));
        assert_eq!(view.get_selected_shape_count(), 1);
        assert_eq!(view.get_selected_shape_type(), Some("dot"));
        assert!(view.do_context_action(ContextAction::Clone as i32));
        assert_eq!(view.get_shape_count(), 2);
        assert!(!view.do_context_action(99));
    }
    #[test]
    fn styled_selection_previews_then_commits() {
        let view = view();
        view.set_command("dot", "");
        drag(&view, (5.0, 5.0), (5.0, 5.0));
        view.set_command("select", "");
        view.do_context_action(ContextAction::SelectAll as i32);
        let id = view.get_selected_shape_id();

        let red = Context {
            line_color: crate::context::Color([255, 0, 0, 255]),
            ..Context::default()
        };
        view.set_context(&red, ContextBits::LINE_COLOR, 0);
        assert_eq!(view.dynamic_shapes()[0].context().line_color, red.line_color);
        assert_ne!(view.front_doc().get(id).unwrap().context().line_color, red.line_color);

        view.set_context(&red, ContextBits::LINE_COLOR, -1);
        assert_eq!(view.get_context(false), Context::default());

        view.set_context(&red, ContextBits::LINE_COLOR, 1);
        assert_eq!(view.front_doc().get(id).unwrap().context().line_color, red.line_color);
        assert_eq!(view.get_context(false).line_color, red.line_color);
    }
    #[test]
    fn content_round_trip_and_read_only() {
        let view = view();
        assert_eq!(view.add_shapes_for_test(), 100);
        let content = view.get_content();
        // Formatting follows the settings, even without an edit in between.
        view.set_settings(CoreSettings {
            pretty_json: !view.settings().pretty_json,
            ..view.settings()
        });
        let reformatted = view.get_content();
        assert_ne!(content, reformatted);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&content).unwrap(),
            serde_json::from_str::<serde_json::Value>(&reformatted).unwrap()
        );

        let other = CoreView::default();
        assert!(other.set_content(&content));
        assert_eq!(other.get_shape_count(), 100);
        assert!(!other.set_content("{ not json"));
        assert!(!other.set_content(r#"{"count":2,"shapes":[{"type":"dot","id":1,"points":[0,0]},null]}"#));
        assert_eq!(other.get_shape_count(), 100);

        let mut storage = JsonStorage::parse(&content).unwrap();
        assert!(other.load_shapes(&mut storage, true));
        assert!(other.front_doc().iter().all(Shape::is_locked));
    }
    #[test]
    fn images_and_boxes() {
        let view = view();
        assert_eq!(view.add_image_shape_at("", 0.0, 0.0, 10.0, 10.0), INVALID_SHAPE_ID);
        assert_eq!(view.add_image_shape_at("a.png", 0.0, 0.0, -1.0, 10.0), INVALID_SHAPE_ID);
        let id = view.add_image_shape("a.png", 40.0, 20.0);
        assert_ne!(id, INVALID_SHAPE_ID);
        assert_eq!(view.get_bounding_box_of(id), Some([80.0, 40.0, 120.0, 60.0]));

        assert!(view.zoom_to_extent());
        let extent = view.get_display_extent().unwrap();
        // Fills the height less the margins.
        assert!((extent[3] - extent[1] - (100.0 - 2.0 * transform::MARGIN)).abs() < 1e-3);
        assert!(view.display_to_model(&[1.0, 2.0, 3.0]).is_none());
        assert_eq!(view.display_to_model(&[1.0, 2.0]).map(|v| v.len()), Some(2));
    }
    #[test]
    fn handles_balance() {
        let view = view();
        let doc = view.acquire_front_doc();
        let shapes = view.acquire_dynamic_shapes();
        {
            let _scoped = view.front_doc();
            assert_eq!(view.outstanding_checkouts(), 3);
        }
        view.add_shapes_for_test();
        // The old version is still there for whoever holds it.
        assert_eq!(view.checked_out_doc(doc).unwrap().shape_count(), 0);
        let old_content = view.get_content_of(doc).unwrap();
        assert!(!old_content.contains("shapes"));
        assert!(view.get_content().contains("shapes"));
        view.release_doc(doc);
        view.release_shapes(shapes);
        // Unbalanced release is logged and ignored.
        view.release_doc(doc);
        assert_eq!(view.outstanding_checkouts(), 0);
        assert!(view.get_content_of(doc).is_none());
    }
}
