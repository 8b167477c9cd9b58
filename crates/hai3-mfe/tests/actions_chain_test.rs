//! Actions Chain Tests
//!
//! Chains executed through a registry against real domains and mounted
//! extensions:
//! - Structural support checks on domain targets
//! - Timeout resolution, fallback on timeout, chain deadline
//! - Built-in load/unload handling

use std::sync::Arc;
use std::time::Duration;

use hai3_mfe::prelude::*;
use hai3_mfe_testing::fixtures::{self, action_id, domain_id, entry_id};
use hai3_mfe_testing::{
    eventually, eventually_async, init_tracing, InMemoryBundleLoader, RecordingHandler,
    RecordingLifecycle, StaticContainerProvider,
};
use serde_json::json;

struct Harness {
    registry: MfeRegistry,
    domain: Domain,
    slow: Extension,
    fast: Extension,
    slow_handler: Arc<RecordingHandler>,
    fast_handler: Arc<RecordingHandler>,
}

fn refresh() -> String {
    action_id("refresh")
}

/// Domain with two mounted extensions: one whose handler takes 500ms and one
/// that answers immediately.
async fn harness(default_timeout_ms: u64) -> Harness {
    init_tracing();
    let slow_lifecycle = RecordingLifecycle::new();
    let fast_lifecycle = RecordingLifecycle::new();
    let loader = InMemoryBundleLoader::new()
        .with_lifecycle(entry_id("slow"), slow_lifecycle.clone())
        .with_lifecycle(entry_id("fast"), fast_lifecycle.clone());
    let registry = MfeRegistry::builder().bundle_loader(Arc::new(loader)).build();

    let mut domain = fixtures::domain("main").with_domain_actions([refresh()]);
    domain.default_action_timeout = default_timeout_ms;
    registry.register_domain(domain.clone()).await.unwrap();

    let mut extensions = Vec::new();
    for name in ["slow", "fast"] {
        let entry = fixtures::entry(name).with_domain_actions([
            HAI3_ACTION_LOAD_EXT.to_string(),
            HAI3_ACTION_UNLOAD_EXT.to_string(),
            refresh(),
        ]);
        registry.register_entry(entry.clone()).await.unwrap();
        let extension = fixtures::extension(name, &domain, &entry);
        registry.register_extension(extension.clone()).await.unwrap();
        registry
            .mount_extension(&extension.id, ContainerHandle::new(name))
            .await
            .unwrap();
        extensions.push(extension);
    }

    let slow_handler = RecordingHandler::slow(Duration::from_millis(500));
    let fast_handler = RecordingHandler::new();
    slow_lifecycle
        .bridge()
        .unwrap()
        .register_action_handler(slow_handler.clone())
        .unwrap();
    fast_lifecycle
        .bridge()
        .unwrap()
        .register_action_handler(fast_handler.clone())
        .unwrap();

    let fast = extensions.pop().unwrap();
    let slow = extensions.pop().unwrap();
    Harness {
        registry,
        domain,
        slow,
        fast,
        slow_handler,
        fast_handler,
    }
}

#[tokio::test]
async fn test_undeclared_domain_action_is_unsupported() {
    init_tracing();
    let lifecycle = RecordingLifecycle::new();
    let registry = MfeRegistry::builder()
        .bundle_loader(Arc::new(InMemoryBundleLoader::serving(lifecycle)))
        .build();

    let domain = Domain::new(domain_id("load_only"), 30_000).with_actions([HAI3_ACTION_LOAD_EXT]);
    let entry = Entry::new(entry_id("refreshable"))
        .with_domain_actions([HAI3_ACTION_LOAD_EXT.to_string(), refresh()]);
    let extension = fixtures::extension("refreshable", &domain, &entry);
    registry.register_domain(domain.clone()).await.unwrap();
    registry.register_entry(entry).await.unwrap();
    registry.register_extension(extension.clone()).await.unwrap();
    registry
        .mount_extension(&extension.id, ContainerHandle::new("slot"))
        .await
        .unwrap();

    let chain = ActionsChain::new(Action::new(refresh(), domain.id.clone()));
    let result = registry.execute_actions_chain(&chain, ChainOptions::default()).await;

    assert!(!result.completed);
    assert!(matches!(
        result.error,
        Some(MfeError::UnsupportedDomainAction { ref domain_id, .. }) if *domain_id == domain.id
    ));

    let err = result.into_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChainExecution);
}

#[tokio::test]
async fn test_action_timeout_overrides_domain_default() {
    let action = Action::new(refresh(), domain_id("main")).with_timeout(120_000);
    assert_eq!(action.effective_timeout(30_000), Duration::from_millis(120_000));

    // Domain default (100ms) is shorter than the slow handler (500ms); the
    // action's own 1000ms override lets it complete.
    let h = harness(100).await;
    let without_override = ActionsChain::new(Action::new(refresh(), h.slow.id.clone()));
    let result = h
        .registry
        .execute_actions_chain(&without_override, ChainOptions::default())
        .await;
    assert!(result.timed_out);
    assert!(!result.completed);

    let with_override =
        ActionsChain::new(Action::new(refresh(), h.slow.id.clone()).with_timeout(1_000));
    let result = h
        .registry
        .execute_actions_chain(&with_override, ChainOptions::default())
        .await;
    assert!(result.completed);
    assert!(!result.timed_out);
}

#[tokio::test]
async fn test_timeout_takes_fallback() {
    let h = harness(30_000).await;
    let chain = ActionsChain::new(Action::new(refresh(), h.slow.id.clone()).with_timeout(100))
        .with_fallback(ActionsChain::new(Action::new(refresh(), h.fast.id.clone())));

    let result = h.registry.execute_actions_chain(&chain, ChainOptions::default()).await;

    assert!(result.completed);
    assert!(result.timed_out);
    assert_eq!(result.path, vec![refresh()]);
    assert!(result.error.is_none());
    assert!(result.execution_time.unwrap() < Duration::from_millis(500));
    assert_eq!(h.slow_handler.received().len(), 1);
    assert_eq!(h.fast_handler.received().len(), 1);
}

#[tokio::test]
async fn test_chain_timeout_aborts() {
    let h = harness(30_000).await;
    let chain = ActionsChain::new(Action::new(refresh(), h.slow.id.clone()))
        .with_fallback(ActionsChain::new(Action::new(refresh(), h.fast.id.clone())));

    let result = h
        .registry
        .execute_actions_chain(
            &chain,
            ChainOptions::with_chain_timeout(Duration::from_millis(80)),
        )
        .await;

    assert!(!result.completed);
    assert!(result.timed_out);
    assert!(matches!(result.error, Some(MfeError::ChainTimeout { .. })));
    assert!(h.fast_handler.received().is_empty());
}

#[tokio::test]
async fn test_next_runs_after_success() {
    let h = harness(30_000).await;
    let chain = ActionsChain::new(Action::new(refresh(), h.fast.id.clone()).with_payload(json!(1)))
        .with_fallback(ActionsChain::new(Action::new(refresh(), h.fast.id.clone())));

    // No schema for the payload: validation fails, fallback runs without one.
    let result = h.registry.execute_actions_chain(&chain, ChainOptions::default()).await;
    assert!(result.completed);
    assert_eq!(h.fast_handler.received().len(), 1);
    assert!(h.fast_handler.received()[0].payload.is_none());

    h.registry
        .type_system()
        .register_schema(&refresh(), json!({ "type": "integer" }))
        .unwrap();
    let chain = ActionsChain::new(Action::new(refresh(), h.fast.id.clone()).with_payload(json!(1)))
        .with_next(ActionsChain::new(Action::new(refresh(), h.fast.id.clone())));
    let result = h.registry.execute_actions_chain(&chain, ChainOptions::default()).await;

    assert!(result.completed);
    assert_eq!(result.path, vec![refresh(), refresh()]);
    assert_eq!(h.fast_handler.received().len(), 3);
}

#[tokio::test]
async fn test_extension_target_checks() {
    let h = harness(30_000).await;

    let undeclared = ActionsChain::new(Action::new(action_id("other"), h.fast.id.clone()));
    let result = h.registry.execute_actions_chain(&undeclared, ChainOptions::default()).await;
    assert!(matches!(result.error, Some(MfeError::UndeclaredAction { .. })));

    h.registry.unmount_extension(&h.fast.id).await.unwrap();
    let unmounted = ActionsChain::new(Action::new(refresh(), h.fast.id.clone()));
    let result = h.registry.execute_actions_chain(&unmounted, ChainOptions::default()).await;
    assert!(matches!(result.error, Some(MfeError::ActionTargetNotFound(_))));

    let unknown = ActionsChain::new(Action::new(refresh(), "nowhere"));
    let result = h.registry.execute_actions_chain(&unknown, ChainOptions::default()).await;
    assert!(matches!(result.error, Some(MfeError::ActionTargetNotFound(_))));
}

#[tokio::test]
async fn test_host_bridge_sends_chains() {
    let h = harness(30_000).await;
    let host = h.registry.host_bridge(&h.slow.id).await.unwrap();

    let chain = ActionsChain::new(Action::new(refresh(), h.fast.id.clone()));
    let result = host.send_actions_chain(&chain, ChainOptions::default()).await;

    assert!(result.completed);
    assert_eq!(h.fast_handler.received_types(), vec![refresh()]);
    assert_eq!(h.domain.id, host.domain_id());
}

#[tokio::test]
async fn test_load_and_unload_through_domain() {
    init_tracing();
    let lifecycle = RecordingLifecycle::new();
    let containers = StaticContainerProvider::new();
    let registry = MfeRegistry::builder()
        .bundle_loader(Arc::new(InMemoryBundleLoader::serving(lifecycle.clone())))
        .build();

    let domain = fixtures::domain("main");
    let entry = fixtures::entry("widget");
    let extension = fixtures::extension("widget", &domain, &entry);
    registry
        .register_domain_with(
            domain.clone(),
            DomainOptions::new().with_container_provider(containers.clone()),
        )
        .await
        .unwrap();
    registry.register_entry(entry).await.unwrap();
    registry.register_extension(extension.clone()).await.unwrap();

    let payload = json!({ "extensionId": extension.id });
    let load = ActionsChain::new(
        Action::new(HAI3_ACTION_LOAD_EXT, domain.id.clone()).with_payload(payload.clone()),
    );

    let result = registry.execute_actions_chain(&load, ChainOptions::default()).await;
    assert!(result.completed, "{:?}", result.error);
    assert!(registry.is_mounted(&extension.id).await);

    // Already mounted: no second container is requested.
    let result = registry.execute_actions_chain(&load, ChainOptions::default()).await;
    assert!(result.completed);
    let issued = containers.issued();
    assert_eq!(issued.len(), 1);
    assert_eq!(registry.bridge_for_container(&issued[0].1).unwrap().extension_id(), extension.id);

    let unload = ActionsChain::new(
        Action::new(HAI3_ACTION_UNLOAD_EXT, domain.id.clone()).with_payload(payload),
    );
    let result = registry.execute_actions_chain(&unload, ChainOptions::default()).await;
    assert!(result.completed);
    assert!(!registry.is_mounted(&extension.id).await);
    assert!(containers.is_released(&issued[0].1));
    assert_eq!(lifecycle.unmount_count(), 1);
}

#[tokio::test]
async fn test_load_payload_is_validated() {
    let h = harness(30_000).await;
    let chain = ActionsChain::new(
        Action::new(HAI3_ACTION_LOAD_EXT, h.domain.id.clone()).with_payload(json!({ "id": "x" })),
    );

    let result = h.registry.execute_actions_chain(&chain, ChainOptions::default()).await;

    assert!(matches!(result.error, Some(MfeError::PayloadValidation { .. })));
}

#[tokio::test]
async fn test_custom_domain_action_handler() {
    init_tracing();
    let sync = action_id("sync");
    let handler = RecordingHandler::new();
    let registry = MfeRegistry::new();

    let domain = fixtures::domain("main").with_actions([HAI3_ACTION_LOAD_EXT.to_string(), sync.clone()]);
    registry
        .register_domain_with(domain.clone(), DomainOptions::new().with_action_handler(handler.clone()))
        .await
        .unwrap();
    let bare = fixtures::domain("bare").with_actions([HAI3_ACTION_LOAD_EXT.to_string(), sync.clone()]);
    registry.register_domain(bare.clone()).await.unwrap();

    let chain = ActionsChain::new(Action::new(sync.clone(), domain.id.clone()));
    let result = registry.execute_actions_chain(&chain, ChainOptions::default()).await;
    assert!(result.completed);
    assert_eq!(handler.received_types(), vec![sync.clone()]);

    let chain = ActionsChain::new(Action::new(sync, bare.id.clone()));
    let result = registry.execute_actions_chain(&chain, ChainOptions::default()).await;
    assert!(matches!(result.error, Some(MfeError::NoActionHandler(_))));
}

struct LoadableDomain {
    registry: MfeRegistry,
    domain: Domain,
    extension: Extension,
    containers: Arc<StaticContainerProvider>,
}

impl LoadableDomain {
    async fn new(lifecycle: Arc<RecordingLifecycle>) -> Self {
        init_tracing();
        let containers = StaticContainerProvider::new();
        let registry = MfeRegistry::builder()
            .bundle_loader(Arc::new(InMemoryBundleLoader::serving(lifecycle)))
            .build();

        let domain = fixtures::domain("main");
        let entry = fixtures::entry("widget");
        let extension = fixtures::extension("widget", &domain, &entry);
        registry
            .register_domain_with(
                domain.clone(),
                DomainOptions::new().with_container_provider(containers.clone()),
            )
            .await
            .unwrap();
        registry.register_entry(entry).await.unwrap();
        registry.register_extension(extension.clone()).await.unwrap();

        Self {
            registry,
            domain,
            extension,
            containers,
        }
    }

    fn lifecycle_chain(&self, action_type: &str, timeout_ms: Option<u64>) -> ActionsChain {
        let mut action = Action::new(action_type, self.domain.id.clone())
            .with_payload(json!({ "extensionId": self.extension.id }));
        if let Some(ms) = timeout_ms {
            action = action.with_timeout(ms);
        }
        ActionsChain::new(action)
    }
}

#[tokio::test]
async fn test_timed_out_unload_still_tears_down() {
    let lifecycle = RecordingLifecycle::slow_unmount(Duration::from_millis(300));
    let d = LoadableDomain::new(lifecycle.clone()).await;
    let result = d
        .registry
        .execute_actions_chain(&d.lifecycle_chain(HAI3_ACTION_LOAD_EXT, None), ChainOptions::default())
        .await;
    assert!(result.completed);
    let host = d.registry.host_bridge(&d.extension.id).await.unwrap();
    let container = d.containers.issued()[0].1.clone();

    let result = d
        .registry
        .execute_actions_chain(
            &d.lifecycle_chain(HAI3_ACTION_UNLOAD_EXT, Some(50)),
            ChainOptions::default(),
        )
        .await;

    assert!(!result.completed);
    assert!(result.timed_out);
    assert!(!d.registry.is_mounted(&d.extension.id).await);
    assert!(host.is_disposed());
    assert!(d.registry.bridge_for_container(&container).is_none());
    assert!(d.registry.coordinator().is_empty());

    eventually(Duration::from_secs(2), || d.containers.is_released(&container))
        .await
        .unwrap();
    assert_eq!(lifecycle.unmount_count(), 1);
}

#[tokio::test]
async fn test_timed_out_load_finishes_mounting() {
    let lifecycle = RecordingLifecycle::slow(Duration::from_millis(200));
    let d = LoadableDomain::new(lifecycle.clone()).await;

    let result = d
        .registry
        .execute_actions_chain(
            &d.lifecycle_chain(HAI3_ACTION_LOAD_EXT, Some(50)),
            ChainOptions::default(),
        )
        .await;
    assert!(result.timed_out);

    eventually_async(Duration::from_secs(2), || async {
        d.registry.is_mounted(&d.extension.id).await
    })
    .await
    .unwrap();
    let container = d.containers.issued()[0].1.clone();
    assert!(d.registry.bridge_for_container(&container).is_some());
    assert!(!d.containers.is_released(&container));
    assert_eq!(lifecycle.mount_count(), 1);
}

#[tokio::test]
async fn test_timed_out_failed_load_releases_container() {
    let lifecycle = RecordingLifecycle::failing_after(Duration::from_millis(200));
    let d = LoadableDomain::new(lifecycle).await;

    let result = d
        .registry
        .execute_actions_chain(
            &d.lifecycle_chain(HAI3_ACTION_LOAD_EXT, Some(50)),
            ChainOptions::default(),
        )
        .await;
    assert!(result.timed_out);

    let containers = d.containers.clone();
    eventually(Duration::from_secs(2), move || {
        containers
            .issued()
            .first()
            .is_some_and(|(_, container)| containers.is_released(container))
    })
    .await
    .unwrap();
    assert!(!d.registry.is_mounted(&d.extension.id).await);
    assert!(d.registry.coordinator().is_empty());
}
