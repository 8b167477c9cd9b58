//! Actions chain mediator.
//!
//! Walks an [`ActionsChain`] node by node. Each node resolves its target,
//! checks structural support on domains, validates the payload through the
//! type-system plugin and races delivery against the effective timeout.
//! Success continues with `next`, any failure (rejection or timeout) with
//! `fallback`. Execution never returns `Err`: every outcome is folded into a
//! [`ChainResult`].

mod handler;

pub use handler::{action_handler, ActionHandler, DynActionHandler, FnActionHandler};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::bridge::HostBridge;
use crate::error::{MfeError, Result};
use crate::type_system::TypeSystemPlugin;
use crate::types::{Action, ActionsChain, Domain, HAI3_ACTION_TYPE};

/// Caller options for one chain execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainOptions {
    /// Wall-clock bound for the whole chain. `None` means only per-action
    /// timeouts apply.
    pub chain_timeout: Option<Duration>,
}

impl ChainOptions {
    pub fn with_chain_timeout(timeout: Duration) -> Self {
        Self {
            chain_timeout: Some(timeout),
        }
    }
}

/// Outcome of a chain execution.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// Whether the last executed node succeeded.
    pub completed: bool,
    /// Action types that succeeded, in execution order.
    pub path: Vec<String>,
    /// Failure of the last executed node.
    pub error: Option<MfeError>,
    /// Set once any node timed out, or the chain deadline passed.
    pub timed_out: bool,
    pub execution_time: Option<Duration>,
    /// Type of the action whose failure ended the chain.
    pub failed_action: Option<String>,
}

impl ChainResult {
    /// `Ok(path)` on completion, otherwise a [`MfeError::ChainExecution`].
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.completed {
            return Ok(self.path);
        }
        let cause = self
            .error
            .unwrap_or_else(|| MfeError::action_failed("<unknown>", "chain did not complete"));
        Err(MfeError::ChainExecution {
            failed_action: self.failed_action.unwrap_or_default(),
            path: self.path,
            cause: Box::new(cause),
        })
    }
}

/// Where an action is delivered.
pub(crate) enum ActionTarget {
    Domain {
        domain: Domain,
        handler: DynActionHandler,
    },
    Extension {
        domain: Domain,
        bridge: HostBridge,
    },
}

impl ActionTarget {
    fn domain(&self) -> &Domain {
        match self {
            Self::Domain { domain, .. } | Self::Extension { domain, .. } => domain,
        }
    }
}

/// Turns an action's `target` id into something deliverable.
#[async_trait]
pub(crate) trait ActionTargetResolver: Send + Sync {
    async fn resolve(&self, target: &str) -> Result<ActionTarget>;
}

enum StepFailure {
    /// The chain deadline passed; no fallback is taken.
    ChainDeadline,
    Action(MfeError),
}

/// Executes actions chains for one runtime.
pub struct ActionsChainsMediator {
    resolver: Arc<dyn ActionTargetResolver>,
    type_system: Arc<dyn TypeSystemPlugin>,
    max_depth: usize,
}

impl ActionsChainsMediator {
    pub(crate) fn new(
        resolver: Arc<dyn ActionTargetResolver>,
        type_system: Arc<dyn TypeSystemPlugin>,
        max_depth: usize,
    ) -> Self {
        Self {
            resolver,
            type_system,
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub async fn execute_actions_chain(
        &self,
        chain: &ActionsChain,
        options: ChainOptions,
    ) -> ChainResult {
        let started = Instant::now();
        let deadline = options.chain_timeout.map(|t| started + t);

        let mut path = Vec::new();
        let mut timed_out = false;
        let mut depth = 0usize;
        let mut node = chain;

        let finish = |completed, path, error, timed_out, failed_action| ChainResult {
            completed,
            path,
            error,
            timed_out,
            execution_time: Some(started.elapsed()),
            failed_action,
        };

        loop {
            let action_type = node.action.action_type.clone();

            depth += 1;
            if depth > self.max_depth {
                warn!(max_depth = self.max_depth, "Actions chain too deep, aborting");
                let err = MfeError::ChainDepthExceeded {
                    max_depth: self.max_depth,
                };
                return finish(false, path, Some(err), timed_out, Some(action_type));
            }

            let outcome = match deadline {
                Some(d) if Instant::now() >= d => Err(StepFailure::ChainDeadline),
                _ => self.execute_action(&node.action, deadline).await,
            };

            match outcome {
                Ok(()) => {
                    debug!(action_type = %action_type, target = %node.action.target, "Action delivered");
                    path.push(action_type);
                    match node.next.as_deref() {
                        Some(next) => node = next,
                        None => return finish(true, path, None, timed_out, None),
                    }
                }
                Err(StepFailure::ChainDeadline) => {
                    let timeout_ms = options
                        .chain_timeout
                        .map_or(0, |t| t.as_millis() as u64);
                    warn!(
                        action_type = %action_type,
                        timeout_ms,
                        "Actions chain timed out"
                    );
                    let err = MfeError::ChainTimeout { timeout_ms };
                    return finish(false, path, Some(err), true, Some(action_type));
                }
                Err(StepFailure::Action(err)) => {
                    timed_out |= err.is_timeout();
                    match node.fallback.as_deref() {
                        Some(fallback) => {
                            debug!(
                                action_type = %action_type,
                                error = %err,
                                "Action failed, taking fallback"
                            );
                            node = fallback;
                        }
                        None => {
                            warn!(action_type = %action_type, error = %err, "Actions chain failed");
                            return finish(false, path, Some(err), timed_out, Some(action_type));
                        }
                    }
                }
            }
        }
    }

    async fn execute_action(
        &self,
        action: &Action,
        deadline: Option<Instant>,
    ) -> std::result::Result<(), StepFailure> {
        let target = self
            .resolver
            .resolve(&action.target)
            .await
            .map_err(StepFailure::Action)?;

        if let ActionTarget::Domain { domain, .. } = &target {
            if !domain.supports_action(&action.action_type) {
                return Err(StepFailure::Action(MfeError::UnsupportedDomainAction {
                    action_type: action.action_type.clone(),
                    domain_id: domain.id.clone(),
                }));
            }
        }

        self.validate_action(action).map_err(StepFailure::Action)?;

        let action_timeout = action.effective_timeout(target.domain().default_action_timeout);
        let (budget, chain_bound) = match deadline {
            Some(d) => {
                let remaining = d.saturating_duration_since(Instant::now());
                if remaining < action_timeout {
                    (remaining, true)
                } else {
                    (action_timeout, false)
                }
            }
            None => (action_timeout, false),
        };

        let delivery = async {
            match &target {
                ActionTarget::Domain { handler, .. } => handler.handle(action).await,
                ActionTarget::Extension { bridge, .. } => bridge.deliver_action(action).await,
            }
        };

        // Dropping the delivery future on timeout cancels it, so a late
        // completion can never be observed.
        match tokio::time::timeout(budget, delivery).await {
            Ok(result) => result.map_err(StepFailure::Action),
            Err(_) if chain_bound => Err(StepFailure::ChainDeadline),
            Err(_) => Err(StepFailure::Action(MfeError::ActionTimeout {
                action_type: action.action_type.clone(),
                timeout_ms: action_timeout.as_millis() as u64,
            })),
        }
    }

    fn validate_action(&self, action: &Action) -> Result<()> {
        if self.type_system.get_schema(HAI3_ACTION_TYPE).is_some() {
            let envelope = serde_json::to_value(action)?;
            let result = self.type_system.validate_instance(HAI3_ACTION_TYPE, &envelope);
            if !result.valid {
                return Err(MfeError::PayloadValidation {
                    action_type: action.action_type.clone(),
                    errors: result.errors,
                });
            }
        }

        if let Some(payload) = &action.payload {
            let result = self.type_system.validate_instance(&action.action_type, payload);
            if !result.valid {
                return Err(MfeError::PayloadValidation {
                    action_type: action.action_type.clone(),
                    errors: result.errors,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_system::InMemoryTypeSystem;
    use crate::types::HAI3_ACTION_LOAD_EXT;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    const REFRESH: &str = "gts.hai3.mfes.comm.action.v1~acme.dash.ui.refresh.v1~";
    const SLOW: &str = "gts.hai3.mfes.comm.action.v1~acme.dash.ui.slow.v1~";
    const FAIL: &str = "gts.hai3.mfes.comm.action.v1~acme.dash.ui.fail.v1~";
    const RECOVER: &str = "gts.hai3.mfes.comm.action.v1~acme.dash.ui.recover.v1~";

    struct Recorder {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ActionHandler for Recorder {
        async fn handle(&self, action: &Action) -> Result<()> {
            self.delivered.lock().push(action.action_type.clone());
            match action.action_type.as_str() {
                SLOW => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
                FAIL => Err(MfeError::action_failed(FAIL, "rejected")),
                _ => Ok(()),
            }
        }
    }

    struct Domains {
        domains: HashMap<String, Domain>,
        handler: Arc<Recorder>,
    }

    #[async_trait]
    impl ActionTargetResolver for Domains {
        async fn resolve(&self, target: &str) -> Result<ActionTarget> {
            let domain = self
                .domains
                .get(target)
                .cloned()
                .ok_or_else(|| MfeError::ActionTargetNotFound(target.to_string()))?;
            Ok(ActionTarget::Domain {
                domain,
                handler: self.handler.clone(),
            })
        }
    }

    fn mediator(max_depth: usize) -> (ActionsChainsMediator, Arc<Recorder>) {
        let handler = Arc::new(Recorder {
            delivered: Mutex::new(Vec::new()),
        });
        let domain = Domain::new("d", 30_000).with_actions([
            HAI3_ACTION_LOAD_EXT,
            SLOW,
            FAIL,
            RECOVER,
        ]);
        let resolver = Domains {
            domains: HashMap::from([("d".to_string(), domain)]),
            handler: handler.clone(),
        };
        let mediator = ActionsChainsMediator::new(
            Arc::new(resolver),
            Arc::new(InMemoryTypeSystem::new()),
            max_depth,
        );
        (mediator, handler)
    }

    fn node(action_type: &str) -> ActionsChain {
        ActionsChain::new(Action::new(action_type, "d"))
    }

    #[tokio::test]
    async fn test_next_branch_records_path() {
        let (mediator, handler) = mediator(8);
        let chain = node(RECOVER).with_next(node(RECOVER));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(result.completed);
        assert_eq!(result.path, vec![RECOVER, RECOVER]);
        assert!(!result.timed_out);
        assert!(result.execution_time.is_some());
        assert_eq!(handler.delivered.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_takes_fallback() {
        let (mediator, _) = mediator(8);
        let chain = node(FAIL).with_fallback(node(RECOVER));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(result.completed);
        assert_eq!(result.path, vec![RECOVER]);
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_timeout_takes_fallback_and_sticks() {
        let (mediator, _) = mediator(8);
        let slow = ActionsChain::new(Action::new(SLOW, "d").with_timeout(100));
        let chain = slow.with_fallback(node(RECOVER));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(result.completed);
        assert!(result.timed_out);
        assert_eq!(result.path, vec![RECOVER]);
    }

    #[tokio::test]
    async fn test_terminal_failure_keeps_path() {
        let (mediator, _) = mediator(8);
        let chain = node(RECOVER).with_next(node(FAIL));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(!result.completed);
        assert_eq!(result.path, vec![RECOVER]);
        assert_eq!(result.failed_action.as_deref(), Some(FAIL));

        let err = result.into_result().unwrap_err();
        match err {
            MfeError::ChainExecution { failed_action, path, .. } => {
                assert_eq!(failed_action, FAIL);
                assert_eq!(path, vec![RECOVER]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_domain_action_is_not_delivered() {
        let (mediator, handler) = mediator(8);

        let result = mediator
            .execute_actions_chain(&node(REFRESH), ChainOptions::default())
            .await;

        assert!(!result.completed);
        assert!(matches!(
            result.error,
            Some(MfeError::UnsupportedDomainAction { .. })
        ));
        assert!(handler.delivered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_fails() {
        let (mediator, _) = mediator(8);
        let chain = ActionsChain::new(Action::new(RECOVER, "nowhere"));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(matches!(result.error, Some(MfeError::ActionTargetNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_payload_takes_fallback() {
        let (mediator, handler) = mediator(8);
        let load = ActionsChain::new(Action::new(HAI3_ACTION_LOAD_EXT, "d").with_payload(json!({})));
        let chain = load.with_fallback(node(RECOVER));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(result.completed);
        assert_eq!(result.path, vec![RECOVER]);
        assert_eq!(*handler.delivered.lock(), vec![RECOVER.to_string()]);
    }

    #[tokio::test]
    async fn test_chain_timeout_aborts_without_fallback() {
        let (mediator, handler) = mediator(8);
        let chain = node(SLOW).with_fallback(node(RECOVER));

        let result = mediator
            .execute_actions_chain(
                &chain,
                ChainOptions::with_chain_timeout(Duration::from_millis(50)),
            )
            .await;

        assert!(!result.completed);
        assert!(result.timed_out);
        assert!(matches!(result.error, Some(MfeError::ChainTimeout { timeout_ms: 50 })));
        assert_eq!(*handler.delivered.lock(), vec![SLOW.to_string()]);
    }

    #[tokio::test]
    async fn test_depth_guard() {
        let (mediator, _) = mediator(2);
        let chain = node(RECOVER).with_next(node(RECOVER).with_next(node(RECOVER)));

        let result = mediator.execute_actions_chain(&chain, ChainOptions::default()).await;

        assert!(!result.completed);
        assert_eq!(result.path.len(), 2);
        assert!(matches!(
            result.error,
            Some(MfeError::ChainDepthExceeded { max_depth: 2 })
        ));
    }
}
