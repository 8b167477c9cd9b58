//! Action handler seam.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::types::Action;

/// Receives actions delivered to a domain, an extension, or the host.
///
/// Returning `Err` is a rejection; the chain mediator treats it exactly like
/// a timeout.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &Action) -> Result<()>;
}

/// Shared handler.
pub type DynActionHandler = Arc<dyn ActionHandler>;

/// Adapter turning an async closure into an [`ActionHandler`].
pub struct FnActionHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ActionHandler for FnActionHandler<F>
where
    F: Fn(Action) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, action: &Action) -> Result<()> {
        (self.f)(action.clone()).await
    }
}

/// Build a [`DynActionHandler`] from an async closure.
pub fn action_handler<F, Fut>(f: F) -> DynActionHandler
where
    F: Fn(Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnActionHandler { f })
}
