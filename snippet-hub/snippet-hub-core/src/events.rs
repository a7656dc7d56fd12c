use crate::model::FileId;
use serde::Serialize;
use tokio::sync::broadcast;

/// View-invalidation notifications. `Created`, `SettingsUpdated` and
/// `Deleted` affect the dashboard listing; `ContentUpdated` and
/// `SettingsUpdated` affect the file view.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    Created { id: FileId },
    ContentUpdated { id: FileId, title_changed: bool },
    SettingsUpdated { id: FileId, discoverability_changed: bool },
    Deleted { id: FileId },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
