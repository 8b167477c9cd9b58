//! Testing utilities for hai3-mfe
//!
//! This crate provides:
//! - Test doubles for the external collaborators (bundle loader, lifecycle,
//!   instance provider, container provider, action handlers)
//! - Fixture builders for domains, entries and extensions
//! - Tracing setup and polling helpers

pub mod doubles;
pub mod fixtures;

pub use doubles::{
    InMemoryBundleLoader, LifecycleCall, RecordingHandler, RecordingLifecycle,
    StaticContainerProvider, StaticInstanceProvider,
};

use std::time::Duration;

/// Install a test subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hai3_mfe=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .with_target(false)
        .compact()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> anyhow::Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Like [`eventually`], for conditions that need to await registry state.
pub async fn eventually_async<F, Fut>(timeout: Duration, mut condition: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
