use super::*;
use crate::model::{EditMode, Visibility, MAX_FILES_PER_USER};
use crate::ratelimit::{RateLimitConfig, ACTION_GLOBAL};
use crate::storage::memory::MemoryFileStore;
use std::time::Duration;

fn user(id: &str) -> Session {
    Session::new(id, crate::model::Role::User)
}

fn admin(id: &str) -> Session {
    Session::new(id, crate::model::Role::Admin)
}

fn input(title: &str) -> NewFile {
    NewFile {
        title: title.into(),
        language: "javascript".into(),
        content: String::new(),
        visibility: Visibility::Public,
        edit_mode: EditMode::Owner,
    }
}

/// Limiter that never trips, for tests that exercise other failure modes.
fn generous_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::with_limits([(
        ACTION_GLOBAL.to_string(),
        RateLimitConfig::new(Duration::from_secs(60), 100_000),
    )]))
}

fn service() -> (Arc<MutationService>, Arc<MemoryFileStore>) {
    let files = Arc::new(MemoryFileStore::new());
    let service = Arc::new(MutationService::new(
        files.clone(),
        generous_limiter(),
        EventBus::new(),
    ));
    (service, files)
}

#[tokio::test]
async fn mutations_require_a_session() {
    let (service, _) = service();
    let err = service.create_file(None, input("x")).await.unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);

    let err = service
        .update_content(None, "0123456789abcdef01234567", "c", None)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::Unauthorized);
}

#[tokio::test]
async fn create_returns_record_owned_by_caller() {
    let (service, files) = service();
    let session = user("alice");

    let record = service
        .create_file(Some(&session), input("Untitled"))
        .await
        .unwrap();

    assert_eq!(record.title, "Untitled");
    assert_eq!(record.language, "javascript");
    assert_eq!(record.content, "");
    assert_eq!(record.created_by, "alice");
    assert_eq!(record.id.as_str().len(), 24);
    assert!(record.id.as_str().chars().all(|c| c.is_ascii_hexdigit()));

    let stored = files.find_by_id(&record.id).await.unwrap().unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn create_reports_all_violations_in_one_message() {
    let (service, _) = service();
    let err = service
        .create_file(
            Some(&user("alice")),
            NewFile {
                title: String::new(),
                language: String::new(),
                content: String::new(),
                visibility: Visibility::Public,
                edit_mode: EditMode::Owner,
            },
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Validation failed: Title is required, Language is required"
    );
}

#[tokio::test]
async fn quota_blocks_the_sixth_file() {
    let (service, files) = service();
    let session = user("alice");

    for i in 0..MAX_FILES_PER_USER - 1 {
        files
            .insert(FileRecord::new(input(&format!("f{i}")), "alice".into()))
            .await
            .unwrap();
    }

    // exactly at the limit after this one
    service
        .create_file(Some(&session), input("last slot"))
        .await
        .unwrap();

    let err = service
        .create_file(Some(&session), input("over"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::QuotaExceeded {
            limit: MAX_FILES_PER_USER
        }
    );
}

#[tokio::test]
async fn admin_bypasses_quota() {
    let (service, files) = service();
    for i in 0..MAX_FILES_PER_USER {
        files
            .insert(FileRecord::new(input(&format!("f{i}")), "root".into()))
            .await
            .unwrap();
    }

    let record = service
        .create_file(Some(&admin("root")), input("one more"))
        .await
        .unwrap();
    assert_eq!(record.created_by, "root");
}

#[tokio::test]
async fn edit_permissions_follow_edit_mode() {
    let (service, _) = service();
    let owner = user("alice");
    let other = user("bob");

    let locked = service
        .create_file(Some(&owner), input("locked"))
        .await
        .unwrap();
    let err = service
        .update_content(Some(&other), locked.id.as_str(), "hijack", None)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::Forbidden);

    let mut open = input("open");
    open.edit_mode = EditMode::Collaborative;
    // private + collaborative: still editable by non-owners
    open.visibility = Visibility::Private;
    let open = service.create_file(Some(&owner), open).await.unwrap();

    let updated = service
        .update_content(Some(&other), open.id.as_str(), "shared edit", None)
        .await
        .unwrap();
    assert_eq!(updated.content, "shared edit");

    // owner can always edit
    let updated = service
        .update_content(Some(&owner), locked.id.as_str(), "mine", None)
        .await
        .unwrap();
    assert_eq!(updated.content, "mine");
}

#[tokio::test]
async fn update_rejects_bad_ids_and_missing_files() {
    let (service, _) = service();
    let session = user("alice");

    let err = service
        .update_content(Some(&session), "nope", "c", None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::ValidationFailed("Invalid file ID format".into())
    );

    let err = service
        .update_content(Some(&session), "0123456789abcdef01234567", "c", None)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::NotFound);
}

#[tokio::test]
async fn content_is_sanitized_on_update() {
    let (service, _) = service();
    let session = user("alice");
    let record = service
        .create_file(Some(&session), input("file"))
        .await
        .unwrap();

    let updated = service
        .update_content(Some(&session), record.id.as_str(), "a\0b", Some("  Renamed  "))
        .await
        .unwrap();
    assert_eq!(updated.content, "ab");
    assert_eq!(updated.title, "Renamed");
}

#[tokio::test]
async fn settings_updates_flag_discoverability_changes() {
    let (service, _) = service();
    let session = user("alice");
    let record = service
        .create_file(Some(&session), input("file"))
        .await
        .unwrap();
    let mut events = service.events().subscribe();

    service
        .update_settings(
            Some(&session),
            record.id.as_str(),
            FileSettingsUpdate {
                visibility: Some(Visibility::Private),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        Event::SettingsUpdated {
            discoverability_changed: true,
            ..
        }
    ));

    service
        .update_settings(
            Some(&session),
            record.id.as_str(),
            FileSettingsUpdate {
                title: Some("renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        Event::SettingsUpdated {
            discoverability_changed: false,
            ..
        }
    ));
}

#[tokio::test]
async fn delete_is_denied_to_collaborators() {
    let (service, files) = service();
    let owner = user("alice");
    let other = user("bob");

    let mut open = input("open");
    open.edit_mode = EditMode::Collaborative;
    let record = service.create_file(Some(&owner), open).await.unwrap();

    // bob may edit the file but never delete it
    service
        .update_content(Some(&other), record.id.as_str(), "fine", None)
        .await
        .unwrap();
    let err = service
        .delete_file(Some(&other), record.id.as_str())
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::Forbidden);

    service
        .delete_file(Some(&owner), record.id.as_str())
        .await
        .unwrap();
    assert!(files.find_by_id(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn default_limits_trip_on_autosave_bursts() {
    let files = Arc::new(MemoryFileStore::new());
    let service = Arc::new(MutationService::new(
        files.clone(),
        Arc::new(RateLimiter::new()),
        EventBus::new(),
    ));
    let session = user("alice");
    let record = FileRecord::new(input("burst"), "alice".into());
    files.insert(record.clone()).await.unwrap();

    for i in 0..5 {
        service
            .update_content(Some(&session), record.id.as_str(), &format!("v{i}"), None)
            .await
            .unwrap();
    }
    let err = service
        .update_content(Some(&session), record.id.as_str(), "v5", None)
        .await
        .unwrap_err();
    match err {
        CoreError::RateLimited {
            limit, remaining, ..
        } => {
            assert_eq!(limit, 5);
            assert_eq!(remaining, 0);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn unload_save_skips_empty_capture() {
    let (service, files) = service();
    let session = user("alice");
    let mut seeded = input("kept");
    seeded.content = "precious".into();
    let record = service.create_file(Some(&session), seeded).await.unwrap();

    let outcome = service
        .save_on_unload(Some(&session), record.id.as_str(), "  ", None)
        .await
        .unwrap();
    assert_eq!(outcome, UnloadOutcome::Skipped);
    let stored = files.find_by_id(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "precious");

    let outcome = service
        .save_on_unload(Some(&session), record.id.as_str(), "updated", None)
        .await
        .unwrap();
    assert_eq!(outcome, UnloadOutcome::Saved);
    let stored = files.find_by_id(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "updated");
}

#[tokio::test]
async fn unload_save_allows_empty_over_empty() {
    let (service, _) = service();
    let session = user("alice");
    let record = service
        .create_file(Some(&session), input("blank"))
        .await
        .unwrap();

    let outcome = service
        .save_on_unload(Some(&session), record.id.as_str(), "", None)
        .await
        .unwrap();
    assert_eq!(outcome, UnloadOutcome::Saved);
}
