//! Registry Tests
//!
//! Domain and extension lifecycle through `MfeRegistry`:
//! - Registration checks and their order
//! - Idempotent unregistration and cascading
//! - Mount/unmount orchestration and serialization
//! - Shared property seeding and fan-out

use std::sync::Arc;
use std::time::Duration;

use hai3_mfe::prelude::*;
use hai3_mfe::MfeEvent;
use hai3_mfe_testing::fixtures::{self, domain_id, entry_id, extension_id, property_id};
use hai3_mfe_testing::{init_tracing, InMemoryBundleLoader, RecordingLifecycle, StaticInstanceProvider};
use serde_json::json;

fn registry_with(lifecycle: Arc<RecordingLifecycle>) -> MfeRegistry {
    init_tracing();
    MfeRegistry::builder()
        .bundle_loader(Arc::new(InMemoryBundleLoader::serving(lifecycle)))
        .build()
}

/// Registry with one domain, one entry and one registered extension.
async fn populated(lifecycle: Arc<RecordingLifecycle>) -> (MfeRegistry, Domain, Extension) {
    let registry = registry_with(lifecycle);
    let domain = fixtures::domain("main");
    let entry = fixtures::entry("widget");
    let extension = fixtures::extension("widget", &domain, &entry);

    registry.register_domain(domain.clone()).await.unwrap();
    registry.register_entry(entry).await.unwrap();
    registry.register_extension(extension.clone()).await.unwrap();
    (registry, domain, extension)
}

#[tokio::test]
async fn test_domain_round_trip() {
    let registry = registry_with(RecordingLifecycle::new());
    let domain = fixtures::domain("main");

    registry.register_domain(domain.clone()).await.unwrap();
    assert_eq!(registry.domain(&domain.id).await, Some(domain.clone()));

    registry.unregister_domain(&domain.id).await.unwrap();
    assert!(registry.domain_ids().await.is_empty());
    assert!(!registry.type_system().get_attribute(&domain.id, "id").resolved);
}

#[tokio::test]
async fn test_duplicate_domain_is_rejected() {
    let registry = registry_with(RecordingLifecycle::new());
    registry.register_domain(fixtures::domain("main")).await.unwrap();

    let err = registry
        .register_domain(fixtures::domain("main").with_domain_actions(["x"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRegistered);
    assert!(registry.domain(&domain_id("main")).await.unwrap().domain_actions.is_empty());
}

#[tokio::test]
async fn test_domain_schema_violations() {
    let registry = registry_with(RecordingLifecycle::new());

    let no_load = fixtures::domain("a").with_actions([HAI3_ACTION_UNLOAD_EXT]);
    let err = registry.register_domain(no_load).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaValidation);

    let zero_timeout = Domain::new(domain_id("b"), 0).with_actions([HAI3_ACTION_LOAD_EXT]);
    let err = registry.register_domain(zero_timeout).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaValidation);
    assert!(err.to_string().contains("defaultActionTimeout"));

    let wrong_base = Domain::new(entry_id("c"), 1_000).with_actions([HAI3_ACTION_LOAD_EXT]);
    let err = registry.register_domain(wrong_base).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeConformance);

    assert!(registry.domain_ids().await.is_empty());
}

#[tokio::test]
async fn test_unregistered_domain_fails_before_entry_work() {
    let registry = registry_with(RecordingLifecycle::new());

    // Invalid id and an entry nobody knows: only the domain check may fire.
    let extension = Extension::new("not a type id", domain_id("missing"), entry_id("missing"));
    let err = registry.register_extension(extension).await.unwrap_err();

    match err {
        MfeError::DomainNotRegistered(id) => assert_eq!(id, domain_id("missing")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_entry_is_not_found() {
    let registry = registry_with(RecordingLifecycle::new());
    let domain = fixtures::domain("main");
    registry.register_domain(domain.clone()).await.unwrap();

    let extension = Extension::new(extension_id("x"), domain.id.clone(), entry_id("ghost"));
    let err = registry.register_extension(extension).await.unwrap_err();
    assert!(matches!(err, MfeError::EntryNotFound(_)));
}

#[tokio::test]
async fn test_entry_resolved_through_instance_provider() {
    init_tracing();
    let provider = Arc::new(StaticInstanceProvider::new());
    let entry = fixtures::entry("remote");
    provider.add_entry(&entry);

    let registry = MfeRegistry::builder().instance_provider(provider).build();
    let domain = fixtures::domain("main");
    registry.register_domain(domain.clone()).await.unwrap();

    let extension = fixtures::extension("remote", &domain, &entry);
    registry.register_extension(extension).await.unwrap();

    assert_eq!(registry.entry(&entry.id).await, Some(entry));
}

#[tokio::test]
async fn test_contract_mismatch_carries_violations() {
    let registry = registry_with(RecordingLifecycle::new());
    let domain = fixtures::domain("main");
    let entry = fixtures::entry("greedy").with_required_properties([property_id("clock")]);
    registry.register_domain(domain.clone()).await.unwrap();
    registry.register_entry(entry.clone()).await.unwrap();

    let err = registry
        .register_extension(fixtures::extension("greedy", &domain, &entry))
        .await
        .unwrap_err();

    match err {
        MfeError::ContractMismatch {
            entry_id, errors, ..
        } => {
            assert_eq!(entry_id, entry.id);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].type_id, property_id("clock"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_ui_meta_missing_field_yields_one_error() {
    let registry = registry_with(RecordingLifecycle::new());
    let domain = fixtures::domain("panel")
        .with_extensions_ui_meta(json!({ "required": ["title", "size"] }));
    let entry = fixtures::entry("card");
    registry.register_domain(domain.clone()).await.unwrap();
    registry.register_entry(entry.clone()).await.unwrap();

    let extension = fixtures::extension("card", &domain, &entry).with_ui_meta(json!({ "title": "x" }));
    let err = registry.register_extension(extension).await.unwrap_err();

    match err {
        MfeError::UiMetaValidation { errors, .. } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].to_string().contains("size"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_mount_and_unmount() {
    let lifecycle = RecordingLifecycle::new();
    let (registry, _, extension) = populated(lifecycle.clone()).await;
    let container = ContainerHandle::new("main-slot");

    registry
        .mount_extension(&extension.id, container.clone())
        .await
        .unwrap();

    assert_eq!(registry.extension_state(&extension.id).await, Some(ExtensionStatus::Mounted));
    let host = registry.bridge_for_container(&container).unwrap();
    assert_eq!(host.extension_id(), extension.id);
    assert_eq!(lifecycle.bridge().unwrap().instance_id(), host.instance_id());
    assert_eq!(registry.mounted_container(&extension.id).await, Some(container.clone()));

    let err = registry
        .mount_extension(&extension.id, ContainerHandle::new("other"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyMounted);

    registry.unmount_extension(&extension.id).await.unwrap();
    registry.unmount_extension(&extension.id).await.unwrap();

    assert!(host.is_disposed());
    assert_eq!(registry.coordinator().len(), 0);
    assert_eq!(lifecycle.unmount_count(), 1);
    assert_eq!(registry.extension_state(&extension.id).await, Some(ExtensionStatus::Registered));
}

#[tokio::test]
async fn test_occupied_container_is_rejected() {
    let lifecycle = RecordingLifecycle::new();
    let (registry, domain, first) = populated(lifecycle.clone()).await;
    let entry = fixtures::entry("widget");
    let second = fixtures::extension("second", &domain, &entry);
    registry.register_extension(second.clone()).await.unwrap();

    let container = ContainerHandle::new("shared");
    registry.mount_extension(&first.id, container.clone()).await.unwrap();

    let err = registry.mount_extension(&second.id, container).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
    assert!(!registry.is_mounted(&second.id).await);
}

#[tokio::test]
async fn test_failed_mount_leaves_extension_registered() {
    let (registry, _, extension) = populated(RecordingLifecycle::failing()).await;
    let container = ContainerHandle::new("slot");

    let err = registry
        .mount_extension(&extension.id, container.clone())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Load);
    assert_eq!(registry.extension_state(&extension.id).await, Some(ExtensionStatus::Registered));
    assert!(registry.bridge_for_container(&container).is_none());
}

#[tokio::test]
async fn test_concurrent_mounts_create_one_bridge() {
    let lifecycle = RecordingLifecycle::slow(Duration::from_millis(50));
    let (registry, _, extension) = populated(lifecycle.clone()).await;

    let (a, b) = tokio::join!(
        registry.mount_extension(&extension.id, ContainerHandle::new("a")),
        registry.mount_extension(&extension.id, ContainerHandle::new("b")),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(MfeError::ExtensionAlreadyMounted(_)))));
    assert_eq!(lifecycle.mount_count(), 1);
    assert_eq!(registry.coordinator().len(), 1);
}

#[tokio::test]
async fn test_unregister_extension_is_idempotent() {
    let lifecycle = RecordingLifecycle::new();
    let (registry, domain, extension) = populated(lifecycle.clone()).await;
    registry
        .mount_extension(&extension.id, ContainerHandle::new("slot"))
        .await
        .unwrap();

    registry.unregister_extension(&extension.id).await.unwrap();
    assert_eq!(lifecycle.unmount_count(), 1);
    assert!(registry.extension(&extension.id).await.is_none());
    assert!(registry.extensions_for_domain(&domain.id).await.is_empty());

    let mut events = registry.subscribe_events();
    registry.unregister_extension(&extension.id).await.unwrap();

    assert!(events.try_recv().is_none());
    assert_eq!(lifecycle.unmount_count(), 1);
    assert_eq!(registry.extension_state(&extension.id).await, None);
}

#[tokio::test]
async fn test_unregister_domain_cascades() {
    let lifecycle = RecordingLifecycle::new();
    let (registry, domain, extension) = populated(lifecycle.clone()).await;
    registry
        .mount_extension(&extension.id, ContainerHandle::new("slot"))
        .await
        .unwrap();

    let mut events = registry.subscribe_events();
    registry.unregister_domain(&domain.id).await.unwrap();

    assert!(registry.extension(&extension.id).await.is_none());
    assert!(registry.domain(&domain.id).await.is_none());
    assert_eq!(lifecycle.unmount_count(), 1);

    let mut names = Vec::new();
    while let Some((event, _)) = events.try_recv() {
        names.push(event.type_name());
    }
    assert_eq!(
        names,
        vec!["extensionUnmounted", "extensionUnregistered", "domainUnregistered"]
    );

    registry.unregister_domain(&domain.id).await.unwrap();
}

#[tokio::test]
async fn test_registration_events() {
    let registry = registry_with(RecordingLifecycle::new());
    let mut events = registry.subscribe_events();
    let domain = fixtures::domain("main");

    registry.register_domain(domain.clone()).await.unwrap();

    let (event, meta) = events.recv().await.unwrap();
    assert_eq!(event, MfeEvent::DomainRegistered { domain_id: domain.id });
    assert_eq!(meta.source, "registry");
}

#[tokio::test]
async fn test_property_seeding_and_fan_out() {
    let lifecycle = RecordingLifecycle::new();
    let (registry, domain, extension) = populated(lifecycle.clone()).await;

    registry
        .update_domain_property(&domain.id, HAI3_SHARED_PROPERTY_THEME, json!("dark"))
        .await
        .unwrap();
    registry
        .mount_extension(&extension.id, ContainerHandle::new("slot"))
        .await
        .unwrap();

    let bridge = lifecycle.bridge().unwrap();
    assert_eq!(bridge.get_property(HAI3_SHARED_PROPERTY_THEME), Some(json!("dark")));

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = bridge
        .subscribe_to_all_properties(move |p| sink.lock().push(p.value.clone()))
        .unwrap();

    registry
        .update_domain_property(&domain.id, HAI3_SHARED_PROPERTY_THEME, json!("light"))
        .await
        .unwrap();
    // The entry does not declare language, so it is not forwarded.
    registry
        .update_domain_property(&domain.id, HAI3_SHARED_PROPERTY_LANGUAGE, json!("fr"))
        .await
        .unwrap();

    assert_eq!(*seen.lock(), vec![json!("light")]);
    assert_eq!(bridge.get_property(HAI3_SHARED_PROPERTY_LANGUAGE), None);
    assert_eq!(
        registry
            .domain_property(&domain.id, HAI3_SHARED_PROPERTY_LANGUAGE)
            .await,
        Some(json!("fr"))
    );
}

#[tokio::test]
async fn test_property_update_checks() {
    let (registry, domain, _) = populated(RecordingLifecycle::new()).await;

    let err = registry
        .update_domain_property(&domain.id, &property_id("clock"), json!(1))
        .await
        .unwrap_err();
    assert!(matches!(err, MfeError::UnknownSharedProperty { .. }));

    let err = registry
        .update_domain_property(&domain.id, HAI3_SHARED_PROPERTY_THEME, json!(""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaValidation);
    assert_eq!(registry.domain_property(&domain.id, HAI3_SHARED_PROPERTY_THEME).await, None);
}

#[tokio::test]
async fn test_reregister_replaces_binding() {
    let lifecycle = RecordingLifecycle::new();
    let (registry, _, extension) = populated(lifecycle.clone()).await;
    registry
        .mount_extension(&extension.id, ContainerHandle::new("slot"))
        .await
        .unwrap();

    let replacement = extension.clone().with_ui_meta(json!({ "title": "v2" }));
    registry.reregister_extension(replacement.clone()).await.unwrap();

    assert_eq!(registry.extension(&extension.id).await, Some(replacement));
    assert_eq!(registry.extension_state(&extension.id).await, Some(ExtensionStatus::Registered));
    assert_eq!(lifecycle.unmount_count(), 1);
}

#[tokio::test]
async fn test_preload_delegates_to_loader() {
    init_tracing();
    let loader = Arc::new(InMemoryBundleLoader::serving(RecordingLifecycle::new()));
    let registry = MfeRegistry::builder().bundle_loader(loader.clone()).build();

    registry.preload(&[fixtures::entry("a")]).await.unwrap();
    assert_eq!(loader.preloaded(), vec![entry_id("a")]);
}
