//! Client-side autosave pipeline.
//!
//! A controller owns the editor session state for one open file and keeps the
//! remote record eventually consistent with local edits: trailing-edge
//! debounce on every change, a minimum interval between save round-trips, a
//! periodic sweep that retries backlogged writes, and a best-effort beacon on
//! teardown so navigation never silently drops an edit.

use crate::error::CoreError;
use crate::model::{FileId, MAX_CONTENT_LENGTH};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(1500);
pub const MIN_SAVE_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Saved,
    Saving,
    Unsaved,
}

#[derive(Clone, Copy, Debug)]
pub struct AutoSaveConfig {
    pub debounce: Duration,
    pub min_save_interval: Duration,
    pub max_content_length: usize,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: SAVE_DEBOUNCE,
            min_save_interval: MIN_SAVE_INTERVAL,
            max_content_length: MAX_CONTENT_LENGTH,
        }
    }
}

/// The save round-trip the controller drives. Implementations decide the
/// transport; [`crate::mutation::ServiceSaver`] goes straight to the
/// mutation service.
#[async_trait]
pub trait ContentSaver: Send + Sync {
    async fn save(
        &self,
        file_id: &FileId,
        content: &str,
        title: Option<&str>,
    ) -> Result<(), CoreError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnloadPayload {
    pub file_id: FileId,
    pub content: String,
    pub title: Option<String>,
}

/// Fire-and-forget transport used during teardown. `send` must not block and
/// must not depend on the session staying alive to complete.
pub trait BestEffortSender: Send + Sync {
    fn send(&self, payload: UnloadPayload);
}

struct SessionState {
    file_id: FileId,
    can_edit: bool,
    /// Bumped on every `reset`; in-flight save results from an older epoch
    /// are discarded.
    epoch: u64,
    pending_content: String,
    pending_title: String,
    last_saved_content: String,
    last_saved_title: String,
    status: SaveStatus,
    last_error: Option<String>,
    /// Whether this session ever saw a genuine user edit. Guards the unload
    /// beacon against writing back unmodified content after a
    /// re-initialization.
    edited: bool,
    in_flight: bool,
    last_save_started: Option<Instant>,
    last_saved_at: Option<Instant>,
    debounce: Option<JoinHandle<()>>,
}

impl SessionState {
    fn seeded(file_id: FileId, content: String, title: String, can_edit: bool, epoch: u64) -> Self {
        Self {
            file_id,
            can_edit,
            epoch,
            pending_content: content.clone(),
            pending_title: title.clone(),
            last_saved_content: content,
            last_saved_title: title,
            status: SaveStatus::Saved,
            last_error: None,
            edited: false,
            in_flight: false,
            last_save_started: None,
            last_saved_at: None,
            debounce: None,
        }
    }

    fn content_dirty(&self) -> bool {
        self.pending_content != self.last_saved_content
    }

    fn title_dirty(&self) -> bool {
        self.pending_title != self.last_saved_title
    }

    fn dirty(&self) -> bool {
        self.content_dirty() || self.title_dirty()
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

struct Inner {
    saver: Arc<dyn ContentSaver>,
    beacon: Arc<dyn BestEffortSender>,
    config: AutoSaveConfig,
    state: Mutex<SessionState>,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

/// Per-editor-session autosave state machine. Dropping the controller tears
/// the session down and fires the unload beacon when edits are outstanding.
pub struct AutoSaveController {
    inner: Arc<Inner>,
}

impl AutoSaveController {
    pub fn new(
        file_id: FileId,
        content: impl Into<String>,
        title: impl Into<String>,
        can_edit: bool,
        saver: Arc<dyn ContentSaver>,
        beacon: Arc<dyn BestEffortSender>,
    ) -> Self {
        Self::with_config(
            file_id,
            content,
            title,
            can_edit,
            saver,
            beacon,
            AutoSaveConfig::default(),
        )
    }

    pub fn with_config(
        file_id: FileId,
        content: impl Into<String>,
        title: impl Into<String>,
        can_edit: bool,
        saver: Arc<dyn ContentSaver>,
        beacon: Arc<dyn BestEffortSender>,
        config: AutoSaveConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            saver,
            beacon,
            config,
            state: Mutex::new(SessionState::seeded(
                file_id,
                content.into(),
                title.into(),
                can_edit,
                0,
            )),
            sweep: Mutex::new(None),
        });
        let weak = Arc::downgrade(&inner);
        *inner.sweep.lock() = Some(tokio::spawn(Inner::sweep_loop(
            weak,
            config.min_save_interval,
        )));
        Self { inner }
    }

    pub fn file_id(&self) -> FileId {
        self.inner.state.lock().file_id.clone()
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.state.lock().status
    }

    pub fn save_error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    pub fn content(&self) -> String {
        self.inner.state.lock().pending_content.clone()
    }

    pub fn title(&self) -> String {
        self.inner.state.lock().pending_title.clone()
    }

    pub fn last_saved_content(&self) -> String {
        self.inner.state.lock().last_saved_content.clone()
    }

    pub fn last_saved_title(&self) -> String {
        self.inner.state.lock().last_saved_title.clone()
    }

    pub fn last_saved_at(&self) -> Option<Instant> {
        self.inner.state.lock().last_saved_at
    }

    /// Navigation-guard predicate: true when leaving now would lose edits the
    /// user is allowed to persist.
    pub fn has_unsaved_changes(&self) -> bool {
        let state = self.inner.state.lock();
        state.can_edit && state.dirty()
    }

    pub fn on_content_change(&self, new_content: impl Into<String>) {
        self.inner.on_content_change(new_content.into());
    }

    pub fn on_title_change(&self, new_title: impl Into<String>) {
        self.inner.on_title_change(new_title.into());
    }

    /// Drives one save round-trip now. `immediate` bypasses the minimum
    /// inter-save interval (explicit "save now" actions); scheduled flushes
    /// leave throttled work to the periodic sweep.
    pub async fn flush(&self, immediate: bool) {
        Inner::flush(self.inner.clone(), immediate).await;
    }

    /// Switches the controller to a different file: cancels outstanding
    /// timers, discards in-flight results and re-seeds all session state.
    pub fn reset(
        &self,
        file_id: FileId,
        content: impl Into<String>,
        title: impl Into<String>,
        can_edit: bool,
    ) {
        let mut state = self.inner.state.lock();
        state.cancel_debounce();
        let epoch = state.epoch + 1;
        *state = SessionState::seeded(file_id, content.into(), title.into(), can_edit, epoch);
    }
}

impl Drop for AutoSaveController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl Inner {
    fn on_content_change(self: &Arc<Self>, new_content: String) {
        let mut state = self.state.lock();
        state.pending_content = new_content;
        if !state.can_edit {
            return;
        }
        if state.content_dirty() {
            state.edited = true;
        }
        if state.pending_content.len() > self.config.max_content_length {
            state.last_error = Some(format!(
                "Content exceeds maximum length ({}/{})",
                state.pending_content.len(),
                self.config.max_content_length
            ));
            state.status = SaveStatus::Unsaved;
            return;
        }
        if state.content_dirty() {
            state.status = SaveStatus::Unsaved;
            state.last_error = None;
            self.schedule_locked(&mut state);
        } else if !state.title_dirty() {
            state.status = SaveStatus::Saved;
        }
    }

    fn on_title_change(self: &Arc<Self>, new_title: String) {
        let mut state = self.state.lock();
        state.pending_title = new_title;
        if !state.can_edit {
            return;
        }
        if state.title_dirty() {
            state.edited = true;
            state.status = SaveStatus::Unsaved;
            self.schedule_locked(&mut state);
        } else if !state.content_dirty() {
            state.status = SaveStatus::Saved;
        }
    }

    /// Trailing-edge debounce: only the last edit within the window triggers
    /// a save. Tasks hold a weak handle so an abandoned controller stops
    /// scheduling.
    fn schedule_locked(self: &Arc<Self>, state: &mut SessionState) {
        state.cancel_debounce();
        let weak = Arc::downgrade(self);
        let delay = self.config.debounce;
        state.debounce = Some(tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                Inner::flush(inner, false).await;
            }
        }));
    }

    async fn flush(self: Arc<Self>, immediate: bool) {
        let (file_id, sent_content, sent_title, epoch) = {
            let mut state = self.state.lock();
            if state.in_flight || !state.can_edit {
                return;
            }
            if !state.dirty() {
                state.status = SaveStatus::Saved;
                return;
            }
            if state.pending_content.len() > self.config.max_content_length {
                state.last_error = Some(format!(
                    "Content exceeds maximum length ({}/{})",
                    state.pending_content.len(),
                    self.config.max_content_length
                ));
                state.status = SaveStatus::Unsaved;
                return;
            }
            if !immediate {
                if let Some(started) = state.last_save_started {
                    if started.elapsed() < self.config.min_save_interval {
                        // Too soon after the previous round-trip; the sweep
                        // retries once the interval has passed.
                        return;
                    }
                }
            }
            state.in_flight = true;
            state.status = SaveStatus::Saving;
            state.last_error = None;
            state.last_save_started = Some(Instant::now());
            (
                state.file_id.clone(),
                state.pending_content.clone(),
                state
                    .title_dirty()
                    .then(|| state.pending_title.clone()),
                state.epoch,
            )
        };

        let result = self
            .saver
            .save(&file_id, &sent_content, sent_title.as_deref())
            .await;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            // The session was reset mid-flight; the result belongs to the
            // previous file and is ignored.
            return;
        }
        state.in_flight = false;
        match result {
            Ok(()) => {
                state.last_saved_at = Some(Instant::now());
                state.last_saved_content = sent_content;
                if let Some(title) = sent_title {
                    state.last_saved_title = title;
                }
                if state.dirty() {
                    // A newer local edit superseded the payload while the
                    // request was in flight; stay unsaved and go again.
                    state.status = SaveStatus::Unsaved;
                    self.schedule_locked(&mut state);
                } else {
                    state.status = SaveStatus::Saved;
                }
            }
            Err(err) => {
                state.status = SaveStatus::Unsaved;
                state.last_error = Some(err.to_string());
                tracing::debug!(file = %state.file_id, error = %err, "autosave attempt failed");
            }
        }
    }

    /// Retries backlogged writes the debounce/throttle pair left behind.
    async fn sweep_loop(weak: Weak<Inner>, interval: Duration) {
        loop {
            sleep(interval).await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let outstanding = {
                let state = inner.state.lock();
                state.can_edit
                    && !state.in_flight
                    && state.dirty()
                    && state.pending_content.len() <= inner.config.max_content_length
            };
            if outstanding {
                Inner::flush(inner, false).await;
            }
        }
    }

    fn teardown(&self) {
        if let Some(handle) = self.sweep.lock().take() {
            handle.abort();
        }
        let mut state = self.state.lock();
        state.cancel_debounce();
        if !state.can_edit || !state.edited || !state.dirty() {
            return;
        }
        let payload = UnloadPayload {
            file_id: state.file_id.clone(),
            content: state.pending_content.clone(),
            title: state.title_dirty().then(|| state.pending_title.clone()),
        };
        drop(state);
        self.beacon.send(payload);
    }
}
