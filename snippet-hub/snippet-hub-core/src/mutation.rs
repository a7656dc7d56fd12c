//! Authorized write operations. Every mutation passes the same gate:
//! session check, rate limit, validation, permission check, persistence,
//! then a view-invalidation event.

use crate::auth::Session;
use crate::autosave::{BestEffortSender, ContentSaver, UnloadPayload};
use crate::error::CoreError;
use crate::events::{Event, EventBus};
use crate::model::{FileId, FileRecord, FileSettingsUpdate, NewFile, MAX_FILES_PER_USER};
use crate::permissions;
use crate::ratelimit::{
    RateLimiter, ACTION_CREATE_FILE, ACTION_DELETE_FILE, ACTION_SAVE_ON_UNLOAD, ACTION_UPDATE_FILE,
};
use crate::storage::{FileChanges, FileStore};
use crate::validate;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of a best-effort unload write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnloadOutcome {
    Saved,
    /// Incoming content was empty while the stored content was not; the
    /// write was skipped to avoid erasing data on a flaky capture.
    Skipped,
}

pub struct MutationService {
    files: Arc<dyn FileStore>,
    limiter: Arc<RateLimiter>,
    events: EventBus,
}

fn store_failed(err: anyhow::Error) -> CoreError {
    CoreError::SaveFailed(err.to_string())
}

impl MutationService {
    pub fn new(files: Arc<dyn FileStore>, limiter: Arc<RateLimiter>, events: EventBus) -> Self {
        Self {
            files,
            limiter,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn authorize<'s>(
        &self,
        session: Option<&'s Session>,
        action: &str,
    ) -> Result<&'s Session, CoreError> {
        let Some(session) = session else {
            tracing::warn!(action, "unauthenticated mutation attempt");
            return Err(CoreError::Unauthorized);
        };
        let decision = self.limiter.check_and_increment(&session.user_id, action);
        if !decision.success {
            tracing::warn!(user = %session.user_id, action, "rate limited");
            return Err(CoreError::RateLimited {
                limit: decision.limit,
                remaining: decision.remaining,
                reset_in: decision.reset_in,
            });
        }
        Ok(session)
    }

    async fn load(&self, id: &FileId) -> Result<FileRecord, CoreError> {
        self.files
            .find_by_id(id)
            .await
            .map_err(store_failed)?
            .ok_or(CoreError::NotFound)
    }

    pub async fn create_file(
        &self,
        session: Option<&Session>,
        input: NewFile,
    ) -> Result<FileRecord, CoreError> {
        let session = self.authorize(session, ACTION_CREATE_FILE)?;
        let input = validate::validate_new_file(input)?;

        let owned = self
            .files
            .count_by_owner(&session.user_id)
            .await
            .map_err(store_failed)?;
        if !permissions::can_create(session.role, owned) {
            tracing::warn!(user = %session.user_id, owned, "file quota reached");
            return Err(CoreError::QuotaExceeded {
                limit: MAX_FILES_PER_USER,
            });
        }

        let record = FileRecord::new(input, session.user_id.clone());
        self.files
            .insert(record.clone())
            .await
            .map_err(store_failed)?;

        tracing::info!(user = %session.user_id, file = %record.id, "file created");
        self.events.send(Event::Created {
            id: record.id.clone(),
        });
        Ok(record)
    }

    pub async fn update_content(
        &self,
        session: Option<&Session>,
        id: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<FileRecord, CoreError> {
        let session = self.authorize(session, ACTION_UPDATE_FILE)?;
        let id = validate::parse_file_id(id)?;
        let content = validate::validate_content(content)?;
        let title = title.map(validate::validate_title).transpose()?;

        let file = self.load(&id).await?;
        if !permissions::can_edit(&session.user_id, &file) {
            tracing::warn!(user = %session.user_id, file = %id, "forbidden content update");
            return Err(CoreError::Forbidden);
        }

        let title_changed = title.is_some();
        let changes = FileChanges {
            content: Some(content),
            title,
            ..Default::default()
        };
        let updated = self
            .files
            .update_by_id(&id, changes)
            .await
            .map_err(store_failed)?
            .ok_or(CoreError::NotFound)?;

        tracing::debug!(user = %session.user_id, file = %id, "content updated");
        self.events.send(Event::ContentUpdated {
            id,
            title_changed,
        });
        Ok(updated)
    }

    pub async fn update_settings(
        &self,
        session: Option<&Session>,
        id: &str,
        update: FileSettingsUpdate,
    ) -> Result<FileRecord, CoreError> {
        let session = self.authorize(session, ACTION_UPDATE_FILE)?;
        let id = validate::parse_file_id(id)?;
        let update = validate::validate_settings(update)?;

        let file = self.load(&id).await?;
        if !permissions::can_edit(&session.user_id, &file) {
            tracing::warn!(user = %session.user_id, file = %id, "forbidden settings update");
            return Err(CoreError::Forbidden);
        }

        // visibility/edit-mode changes alter how other users can discover or
        // edit the file, so the file view must be invalidated too.
        let discoverability_changed = update.visibility.is_some_and(|v| v != file.visibility)
            || update.edit_mode.is_some_and(|m| m != file.edit_mode);

        let changes = FileChanges {
            title: update.title,
            language: update.language,
            visibility: update.visibility,
            edit_mode: update.edit_mode,
            ..Default::default()
        };
        let updated = self
            .files
            .update_by_id(&id, changes)
            .await
            .map_err(store_failed)?
            .ok_or(CoreError::NotFound)?;

        tracing::info!(user = %session.user_id, file = %id, "settings updated");
        self.events.send(Event::SettingsUpdated {
            id,
            discoverability_changed,
        });
        Ok(updated)
    }

    pub async fn delete_file(&self, session: Option<&Session>, id: &str) -> Result<(), CoreError> {
        let session = self.authorize(session, ACTION_DELETE_FILE)?;
        let id = validate::parse_file_id(id)?;

        let file = self.load(&id).await?;
        if !permissions::can_delete(&session.user_id, &file) {
            tracing::warn!(user = %session.user_id, file = %id, "forbidden delete");
            return Err(CoreError::Forbidden);
        }

        if !self.files.delete_by_id(&id).await.map_err(store_failed)? {
            return Err(CoreError::NotFound);
        }

        tracing::info!(user = %session.user_id, file = %id, "file deleted");
        self.events.send(Event::Deleted { id });
        Ok(())
    }

    /// Permission-checked variant of `update_content` for the unload beacon.
    /// Empty incoming content never overwrites non-empty stored content.
    pub async fn save_on_unload(
        &self,
        session: Option<&Session>,
        id: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<UnloadOutcome, CoreError> {
        let session = self.authorize(session, ACTION_SAVE_ON_UNLOAD)?;
        let id = validate::parse_file_id(id)?;
        let content = validate::validate_content(content)?;

        let file = self.load(&id).await?;
        if !permissions::can_edit(&session.user_id, &file) {
            tracing::warn!(user = %session.user_id, file = %id, "forbidden unload save");
            return Err(CoreError::Forbidden);
        }

        if content.trim().is_empty() && !file.content.trim().is_empty() {
            tracing::debug!(file = %id, "unload save skipped for empty capture");
            return Ok(UnloadOutcome::Skipped);
        }

        let title = match title {
            Some(t) if !t.trim().is_empty() => Some(validate::validate_title(t)?),
            _ => None,
        };
        let title_changed = title.is_some();
        let changes = FileChanges {
            content: Some(content),
            title,
            ..Default::default()
        };
        self.files
            .update_by_id(&id, changes)
            .await
            .map_err(store_failed)?
            .ok_or(CoreError::NotFound)?;

        self.events.send(Event::ContentUpdated {
            id,
            title_changed,
        });
        Ok(UnloadOutcome::Saved)
    }
}

/// [`ContentSaver`] over the in-process mutation service, wiring the autosave
/// controller to the same gate the HTTP boundary uses.
pub struct ServiceSaver {
    service: Arc<MutationService>,
    session: Session,
}

impl ServiceSaver {
    pub fn new(service: Arc<MutationService>, session: Session) -> Self {
        Self { service, session }
    }
}

#[async_trait]
impl ContentSaver for ServiceSaver {
    async fn save(
        &self,
        file_id: &FileId,
        content: &str,
        title: Option<&str>,
    ) -> Result<(), CoreError> {
        self.service
            .update_content(Some(&self.session), file_id.as_str(), content, title)
            .await
            .map(|_| ())
    }
}

/// Fire-and-forget unload transport: spawns the write on the runtime and
/// never awaits it, so teardown does not block on the round-trip.
pub struct ServiceBeacon {
    service: Arc<MutationService>,
    session: Session,
    handle: tokio::runtime::Handle,
}

impl ServiceBeacon {
    /// Must be constructed on a runtime thread.
    pub fn new(service: Arc<MutationService>, session: Session) -> Self {
        Self {
            service,
            session,
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl BestEffortSender for ServiceBeacon {
    fn send(&self, payload: UnloadPayload) {
        let service = self.service.clone();
        let session = self.session.clone();
        self.handle.spawn(async move {
            if let Err(err) = service
                .save_on_unload(
                    Some(&session),
                    payload.file_id.as_str(),
                    &payload.content,
                    payload.title.as_deref(),
                )
                .await
            {
                tracing::debug!(%err, file = %payload.file_id, "unload save dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests;
