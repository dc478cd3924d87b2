//! Context bridge: derived flags and the guarded-render gate.

mod common;

use std::sync::Arc;

use alkabir_auth::{AuthConfig, AuthContext, Gate, SessionStore};
use common::MockProvider;

fn context_with(provider: Arc<MockProvider>) -> AuthContext {
    AuthContext::new(Arc::new(SessionStore::with_provider(
        AuthConfig::default(),
        provider,
    )))
}

#[tokio::test]
async fn gate_loads_until_initialized_then_redirects() -> anyhow::Result<()> {
    let ctx = context_with(Arc::new(MockProvider::new()));
    assert_eq!(ctx.gate("/login"), Gate::Loading);

    ctx.ensure_initialized().await?;
    assert_eq!(ctx.gate("/login"), Gate::Redirect("/login".to_string()));
    Ok(())
}

#[tokio::test]
async fn gate_allows_once_authenticated() -> anyhow::Result<()> {
    let ctx = context_with(Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    )));
    ctx.ensure_initialized().await?;
    ctx.store().sign_in("ahmed@alkabir.ae", "password123").await?;
    assert_eq!(ctx.gate("/login"), Gate::Allow);
    Ok(())
}

#[tokio::test]
async fn derived_flags_follow_the_snapshot() -> anyhow::Result<()> {
    let ctx = context_with(Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    )));
    assert!(!ctx.is_authenticated());
    assert!(!ctx.is_email_verified());
    assert!(!ctx.is_professional());

    ctx.store().sign_in("ahmed@alkabir.ae", "password123").await?;
    assert!(ctx.is_authenticated());
    assert!(!ctx.is_email_verified());

    ctx.store()
        .confirm_email_verification("usr_mock_1", "secret")
        .await?;
    // Derived on read, never cached.
    assert!(ctx.is_email_verified());
    Ok(())
}

#[tokio::test]
async fn ensure_initialized_is_safe_to_repeat() -> anyhow::Result<()> {
    let provider = Arc::new(MockProvider::new());
    let ctx = context_with(provider.clone());
    ctx.ensure_initialized().await?;
    let calls = provider.call_count();
    ctx.ensure_initialized().await?;
    ctx.ensure_initialized().await?;
    assert_eq!(provider.call_count(), calls);
    Ok(())
}

#[tokio::test]
async fn subscription_sees_sign_in_and_sign_out() -> anyhow::Result<()> {
    let ctx = context_with(Arc::new(MockProvider::with_account(
        "ahmed@alkabir.ae",
        "password123",
        "Ahmed",
    )));
    let mut rx = ctx.subscribe();

    ctx.store().sign_in("ahmed@alkabir.ae", "password123").await?;
    assert!(rx.borrow_and_update().is_authenticated());

    ctx.store().sign_out().await?;
    assert!(!rx.borrow_and_update().is_authenticated());
    Ok(())
}
