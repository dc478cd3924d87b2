//! Durable snapshot behavior: write-on-commit, restore at construction, and
//! rejection of stale records.

mod common;

use std::sync::Arc;

use alkabir_auth::persist::{PersistedState, SnapshotFile};
use alkabir_auth::{AuthConfig, SessionStore};
use chrono::{Duration, Utc};
use common::MockProvider;
use tempfile::tempdir;

fn config_with_path(path: std::path::PathBuf) -> AuthConfig {
    AuthConfig {
        persist_path: Some(path),
        ..Default::default()
    }
}

#[tokio::test]
async fn committed_mutations_rewrite_the_snapshot_file() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("auth.json");
    let store =
        SessionStore::with_provider(config_with_path(path.clone()), Arc::new(MockProvider::new()));

    store.toggle_test_mode();

    let state = SnapshotFile::new(&path).load();
    assert!(state.test_mode);
    assert!(state.identity.is_some());
    assert_eq!(state.identity.unwrap().email, "test@alkabir.ae");
    Ok(())
}

#[tokio::test]
async fn restart_restores_a_valid_session() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("auth.json");
    let provider = Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    ));

    {
        let store = SessionStore::with_provider(config_with_path(path.clone()), provider.clone());
        store.sign_in("ahmed@alkabir.ae", "password123").await?;
        assert!(store.is_authenticated());
    }

    // New process: state is back before any provider lookup.
    let calls_before = provider.call_count();
    let store = SessionStore::with_provider(config_with_path(path), provider.clone());
    assert!(store.is_authenticated());
    assert_eq!(store.identity().unwrap().email, "ahmed@alkabir.ae");
    assert_eq!(provider.call_count(), calls_before);
    Ok(())
}

#[tokio::test]
async fn expired_persisted_session_starts_signed_out() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("auth.json");
    let provider = Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    ));

    let store = SessionStore::with_provider(config_with_path(path.clone()), provider.clone());
    store.sign_in("ahmed@alkabir.ae", "password123").await?;
    drop(store);

    // Age the record past its expiry.
    let file = SnapshotFile::new(&path);
    let mut state = file.load();
    if let Some(session) = state.session.as_mut() {
        session.expire = Utc::now() - Duration::hours(1);
    }
    file.save(&state)?;

    let store = SessionStore::with_provider(config_with_path(path), provider);
    assert!(!store.is_authenticated());
    assert!(store.identity().is_none() && store.session().is_none());
    Ok(())
}

#[tokio::test]
async fn partial_persisted_triple_is_discarded() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("auth.json");
    let provider = Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    ));

    let store = SessionStore::with_provider(config_with_path(path.clone()), provider.clone());
    store.sign_in("ahmed@alkabir.ae", "password123").await?;
    drop(store);

    // Corrupt the record into identity-without-session.
    let file = SnapshotFile::new(&path);
    let mut state = file.load();
    state.session = None;
    file.save(&state)?;

    let store = SessionStore::with_provider(config_with_path(path), provider);
    // Never exactly one of identity/session, even from a bad record.
    assert!(store.identity().is_none() && store.session().is_none());
    Ok(())
}

#[tokio::test]
async fn initialized_flag_survives_restart() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("auth.json");
    let provider = Arc::new(MockProvider::new());

    {
        let store = SessionStore::with_provider(config_with_path(path.clone()), provider.clone());
        store.initialize().await?;
    }

    let store = SessionStore::with_provider(config_with_path(path), provider.clone());
    assert!(store.is_initialized());
    let calls_before = provider.call_count();
    store.initialize().await?;
    assert_eq!(provider.call_count(), calls_before);
    Ok(())
}

#[tokio::test]
async fn non_mutating_actions_do_not_rewrite_the_snapshot_file() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("auth.json");
    let provider = Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    ));

    let store = SessionStore::with_provider(config_with_path(path.clone()), provider);
    store.sign_in("ahmed@alkabir.ae", "password123").await?;
    std::fs::remove_file(&path)?;

    // Read-only actions settle without touching the durable record.
    store.list_sessions().await?;
    store.create_jwt().await?;
    store
        .send_password_recovery("ahmed@alkabir.ae", "https://alkabir.ae/recover")
        .await?;
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn snapshot_persists_only_the_durable_subset() {
    let snap = alkabir_auth::Snapshot {
        loading: true,
        initialized: true,
        test_mode: true,
        ..Default::default()
    };
    let state = PersistedState::from_snapshot(&snap);
    let json = serde_json::to_value(&state).unwrap();
    assert!(json.get("loading").is_none());
    assert_eq!(json["initialized"], true);
    assert_eq!(json["test_mode"], true);
}
