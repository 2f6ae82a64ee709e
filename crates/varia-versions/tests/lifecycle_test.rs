//! Lifecycle integration tests: cache, store, remove, retrieve, recreate.
//!
//! Run with: `cargo test -p varia-versions --test lifecycle_test`

mod helpers;

use std::sync::Arc;

use bytes::Bytes;
use helpers::host::TestHost;
use helpers::stages::{Counter, Journal, TagStage};
use helpers::{memory_storage, photo, stored_key, uploader, uploader_with_config, BASE_URL};
use varia_core::{Artifact, VariaConfig};
use varia_versions::{
    Condition, DefinitionRegistry, NodeId, VariantOptions, VariantState, VersionError,
};

/// avatar (+root)
///   thumb (+thumb)
///     small (+small)
///   preview (+preview), only when `show_preview`
struct Fixture {
    registry: Arc<DefinitionRegistry>,
    root_runs: Counter,
    thumb_runs: Counter,
    small_runs: Counter,
    preview_runs: Counter,
}

fn fixture() -> Fixture {
    let root_runs = Counter::default();
    let thumb_runs = Counter::default();
    let small_runs = Counter::default();
    let preview_runs = Counter::default();

    let mut registry = DefinitionRegistry::new("avatar");
    registry.process(TagStage::new("root").counted(&root_runs));
    registry
        .declare_variant("thumb", VariantOptions::new(), |thumb| {
            thumb.process(TagStage::new("thumb").counted(&thumb_runs));
            thumb.declare_variant("small", VariantOptions::new(), |small| {
                small.process(TagStage::new("small").counted(&small_runs));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    registry
        .declare_variant(
            "preview",
            VariantOptions::new().condition(Condition::named("show_preview")),
            |preview| {
                preview.process(TagStage::new("preview").counted(&preview_runs));
                Ok(())
            },
        )
        .unwrap();

    Fixture {
        registry: registry.freeze(),
        root_runs,
        thumb_runs,
        small_runs,
        preview_runs,
    }
}

#[tokio::test]
async fn test_cache_derives_versions_from_processed_parent() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut uploader = uploader(&fixture.registry, &storage, &host);

    uploader.cache(photo()).await.unwrap();

    let thumb = uploader.find("thumb").unwrap();
    let small = uploader.find("thumb.small").unwrap();
    assert_eq!(uploader.read(NodeId::ROOT).await.unwrap(), Bytes::from_static(b"img+root"));
    assert_eq!(uploader.read(thumb).await.unwrap(), Bytes::from_static(b"img+root+thumb"));
    assert_eq!(
        uploader.read(small).await.unwrap(),
        Bytes::from_static(b"img+root+thumb+small")
    );

    let cache_id = uploader.root().cache_id().unwrap();
    assert_eq!(uploader.node(thumb).cache_id(), Some(cache_id));
    assert_eq!(uploader.node(small).cache_id(), Some(cache_id));
    assert_eq!(
        storage.keys().await,
        vec![
            format!("uploads/tmp/{}/photo.png", cache_id),
            format!("uploads/tmp/{}/thumb_photo.png", cache_id),
            format!("uploads/tmp/{}/thumb_small_photo.png", cache_id),
        ]
    );
    assert_eq!(
        uploader.root().cache_name(),
        Some(format!("{}/photo.png", cache_id))
    );
}

#[tokio::test]
async fn test_inactive_versions_are_skipped_until_condition_holds() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut uploader = uploader(&fixture.registry, &storage, &host);

    uploader.cache(photo()).await.unwrap();
    let preview = uploader.find("preview").unwrap();
    assert_eq!(uploader.node(preview).state(), VariantState::Empty);
    assert_eq!(fixture.preview_runs.get(), 0);

    host.set("show_preview", true);
    let active: Vec<String> = uploader
        .active_variants(NodeId::ROOT)
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(active, vec!["thumb", "preview"]);

    uploader.cache(photo()).await.unwrap();
    assert_eq!(uploader.node(preview).state(), VariantState::Cached);
    assert_eq!(fixture.preview_runs.get(), 1);
}

#[tokio::test]
async fn test_depends_on_caches_dependency_first() {
    let journal = Journal::default();
    let mut registry = DefinitionRegistry::new("avatar");
    // Declared before its dependency on purpose
    registry
        .declare_variant("small", VariantOptions::new().depends_on("large"), |small| {
            small.process(TagStage::new("small").recorded(&journal));
            Ok(())
        })
        .unwrap();
    registry
        .declare_variant("large", VariantOptions::new(), |large| {
            large.process(TagStage::new("large").recorded(&journal));
            Ok(())
        })
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let mut uploader = uploader(&registry, &storage, &TestHost::new());
    uploader.cache(photo()).await.unwrap();

    assert_eq!(journal.order(), vec!["large", "small"]);
    assert_eq!(journal.input_of("large"), Some(Bytes::from_static(b"img")));
    assert_eq!(journal.input_of("small"), Some(Bytes::from_static(b"img+large")));

    let small = uploader.find("small").unwrap();
    assert_eq!(
        uploader.read(small).await.unwrap(),
        Bytes::from_static(b"img+large+small")
    );
}

#[tokio::test]
async fn test_caching_is_idempotent_per_session() {
    let large_runs = Counter::default();
    let mut registry = DefinitionRegistry::new("avatar");
    for name in ["small", "medium"] {
        registry
            .declare_variant(name, VariantOptions::new().depends_on("large"), |_| Ok(()))
            .unwrap();
    }
    registry
        .declare_variant("large", VariantOptions::new(), |large| {
            large.process(TagStage::new("large").counted(&large_runs));
            Ok(())
        })
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let mut uploader = uploader(&registry, &storage, &TestHost::new());
    uploader.cache(photo()).await.unwrap();
    assert_eq!(large_runs.get(), 1);

    // Same session again: every version is already cached
    uploader.after_cache(NodeId::ROOT).await.unwrap();
    assert_eq!(large_runs.get(), 1);

    // A new session processes again
    uploader.cache(photo()).await.unwrap();
    assert_eq!(large_runs.get(), 2);
}

#[tokio::test]
async fn test_missing_dependency_fails() {
    let mut registry = DefinitionRegistry::new("avatar");
    registry
        .declare_variant("small", VariantOptions::new().depends_on("huge"), |_| Ok(()))
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let mut uploader = uploader(&registry, &storage, &TestHost::new());
    let err = uploader.cache(photo()).await.unwrap_err();

    assert!(matches!(
        err,
        VersionError::MissingDependency { ref variant, ref depends_on }
            if variant == "small" && depends_on == "huge"
    ));
}

#[tokio::test]
async fn test_dependency_cycle_fails() {
    let mut registry = DefinitionRegistry::new("avatar");
    registry
        .declare_variant("a", VariantOptions::new().depends_on("b"), |_| Ok(()))
        .unwrap();
    registry
        .declare_variant("b", VariantOptions::new().depends_on("a"), |_| Ok(()))
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let mut uploader = uploader(&registry, &storage, &TestHost::new());
    let err = uploader.cache(photo()).await.unwrap_err();

    assert!(matches!(err, VersionError::DependencyCycle(_)));
}

#[tokio::test]
async fn test_unless_excludes_version() {
    let mut registry = DefinitionRegistry::new("avatar");
    registry
        .declare_variant(
            "public",
            VariantOptions::new().unless(Condition::named("is_private")),
            |_| Ok(()),
        )
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let host = TestHost::new();
    host.set("is_private", true);
    let mut uploader = uploader(&registry, &storage, &host);

    assert!(uploader.active_variants(NodeId::ROOT).unwrap().is_empty());
    host.set("is_private", false);
    assert_eq!(uploader.active_variants(NodeId::ROOT).unwrap().len(), 1);
}

#[tokio::test]
async fn test_disabled_processing_is_inherited() {
    let mut registry = DefinitionRegistry::new("avatar");
    registry
        .declare_variant("thumb", VariantOptions::new(), |thumb| {
            thumb.enable_processing(false).process(TagStage::new("thumb"));
            thumb.declare_variant("small", VariantOptions::new(), |small| {
                small.process(TagStage::new("small"));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let mut uploader = uploader(&registry, &storage, &TestHost::new());
    uploader.cache(photo()).await.unwrap();

    let small = uploader.find("thumb.small").unwrap();
    assert_eq!(uploader.read(small).await.unwrap(), Bytes::from_static(b"img"));
}

#[tokio::test]
async fn test_dynamic_version_is_cached() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut uploader = uploader(&fixture.registry, &storage, &host);

    let square = uploader
        .add_dynamic_variant(NodeId::ROOT, "square", VariantOptions::new(), |square| {
            square.process(TagStage::new("square"));
            Ok(())
        })
        .unwrap();
    uploader.cache(photo()).await.unwrap();

    assert_eq!(uploader.read(square).await.unwrap(), Bytes::from_static(b"img+root+square"));
    let key = &uploader.node(square).file().unwrap().key;
    assert!(key.ends_with("/square_photo.png"), "{key}");
}

#[tokio::test]
async fn test_store_moves_cached_files() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut uploader = uploader(&fixture.registry, &storage, &host);

    uploader.cache(photo()).await.unwrap();
    uploader.store(None).await.unwrap();

    assert_eq!(
        storage.keys().await,
        vec![
            stored_key("photo.png"),
            stored_key("thumb_photo.png"),
            stored_key("thumb_small_photo.png"),
        ]
    );
    let small = uploader.find("thumb.small").unwrap();
    assert_eq!(uploader.node(small).state(), VariantState::Stored);
    assert_eq!(uploader.node(small).cache_id(), None);
    assert_eq!(uploader.root().state(), VariantState::Stored);
    assert!(uploader.root().cache_name().is_none());
}

#[tokio::test]
async fn test_store_keeps_cache_when_configured() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let config = VariaConfig {
        delete_cache_after_store: false,
        ..VariaConfig::default()
    };
    let mut uploader = uploader_with_config(&fixture.registry, &storage, &host, config);

    uploader.cache(photo()).await.unwrap();
    uploader.store(None).await.unwrap();

    assert_eq!(storage.len().await, 6);
}

#[tokio::test]
async fn test_store_new_file_caches_first() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", true);
    let mut uploader = uploader(&fixture.registry, &storage, &host);

    uploader.store(Some(photo())).await.unwrap();

    assert_eq!(fixture.root_runs.get(), 1);
    assert_eq!(fixture.preview_runs.get(), 1);
    assert_eq!(storage.len().await, 4);
    let preview = uploader.find("preview").unwrap();
    assert_eq!(uploader.read(preview).await.unwrap(), Bytes::from_static(b"img+root+preview"));
}

fn upload(data: &'static [u8]) -> Artifact {
    Artifact::new(data, "photo.png").with_content_type("image/png")
}

#[tokio::test]
async fn test_store_new_file_replaces_held_file() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut writer = uploader(&fixture.registry, &storage, &host);

    writer.store(Some(upload(b"first"))).await.unwrap();
    writer.store(Some(upload(b"second"))).await.unwrap();

    let thumb = writer.find("thumb").unwrap();
    assert_eq!(writer.read(NodeId::ROOT).await.unwrap(), Bytes::from_static(b"second+root"));
    assert_eq!(writer.read(thumb).await.unwrap(), Bytes::from_static(b"second+root+thumb"));
    assert_eq!(fixture.root_runs.get(), 2);
    assert_eq!(fixture.small_runs.get(), 2);
    assert_eq!(storage.len().await, 3);

    // A retrieved uploader takes the new file the same way
    let mut reader = uploader(&fixture.registry, &storage, &host);
    reader.retrieve_from_store("photo.png").unwrap();
    reader.store(Some(upload(b"third"))).await.unwrap();

    let small = reader.find("thumb.small").unwrap();
    assert_eq!(reader.root().state(), VariantState::Stored);
    assert_eq!(
        reader.read(small).await.unwrap(),
        Bytes::from_static(b"third+root+thumb+small")
    );
    assert_eq!(storage.len().await, 3);
}

#[tokio::test]
async fn test_renamed_version_is_retrieved_by_original_name() {
    let mut registry = DefinitionRegistry::new("avatar");
    registry
        .declare_variant("thumb", VariantOptions::new(), |thumb| {
            thumb.process(varia_processing::FnStage::new("to_webp", |mut artifact: Artifact| {
                artifact.filename = artifact.filename.replace(".png", ".webp");
                artifact.content_type = Some("image/webp".to_string());
                Ok(artifact)
            }));
            Ok(())
        })
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let host = TestHost::new();
    let mut writer = uploader(&registry, &storage, &host);
    writer.store(Some(photo())).await.unwrap();

    assert_eq!(
        storage.keys().await,
        vec![stored_key("photo.png"), stored_key("thumb_photo.png")]
    );
    let thumb = writer.find("thumb").unwrap();
    let file = writer.node(thumb).file().unwrap();
    assert_eq!(file.filename, "photo.webp");
    assert_eq!(file.original_filename, "photo.png");

    let mut reader = uploader(&registry, &storage, &host);
    reader.retrieve_from_store("photo.png").unwrap();
    let thumb = reader.find("thumb").unwrap();
    assert_eq!(reader.read(thumb).await.unwrap(), Bytes::from_static(b"img"));
}

#[tokio::test]
async fn test_store_selected_validates_names_first() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut uploader = uploader(&fixture.registry, &storage, &host);
    uploader.cache(photo()).await.unwrap();

    // preview exists but is inactive
    let err = uploader
        .after_store(NodeId::ROOT, None, Some(&["thumb", "preview"][..]))
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::UnknownVariant(ref name) if name == "preview"));

    let thumb = uploader.find("thumb").unwrap();
    assert_eq!(uploader.node(thumb).state(), VariantState::Cached);

    uploader
        .after_store(NodeId::ROOT, None, Some(&["thumb"][..]))
        .await
        .unwrap();
    assert_eq!(uploader.node(thumb).state(), VariantState::Stored);
    assert_eq!(uploader.root().state(), VariantState::Cached);
}

#[tokio::test]
async fn test_remove_reaches_inactive_versions() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", true);
    let mut uploader = uploader(&fixture.registry, &storage, &host);
    uploader.store(Some(photo())).await.unwrap();
    assert_eq!(storage.len().await, 4);

    host.set("show_preview", false);
    uploader.remove().await.unwrap();

    assert!(storage.is_empty().await);
    let preview = uploader.find("preview").unwrap();
    assert_eq!(uploader.node(preview).state(), VariantState::Removed);
    assert!(uploader.node(preview).file().is_none());
    assert_eq!(uploader.root().state(), VariantState::Removed);
}

#[tokio::test]
async fn test_retrieve_from_store_loads_lazily() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut writer = uploader(&fixture.registry, &storage, &host);
    writer.store(Some(photo())).await.unwrap();

    let mut reader = uploader(&fixture.registry, &storage, &host);
    reader.retrieve_from_store("photo.png").unwrap();

    let small = reader.find("thumb.small").unwrap();
    assert_eq!(reader.node(small).state(), VariantState::Retrieved);
    assert!(!reader.node(small).file().unwrap().is_loaded());
    assert_eq!(
        reader.read(small).await.unwrap(),
        Bytes::from_static(b"img+root+thumb+small")
    );
    assert!(reader.node(small).file().unwrap().is_loaded());

    // Retrieval reaches inactive versions too
    let preview = reader.find("preview").unwrap();
    assert_eq!(reader.node(preview).state(), VariantState::Retrieved);
}

#[tokio::test]
async fn test_retrieve_from_cache_then_store() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut first = uploader(&fixture.registry, &storage, &host);
    first.cache(photo()).await.unwrap();
    let cache_name = first.root().cache_name().unwrap();

    let mut second = uploader(&fixture.registry, &storage, &host);
    second.retrieve_from_cache(&cache_name).unwrap();
    assert_eq!(second.root().state(), VariantState::Cached);
    assert_eq!(second.root().cache_name(), Some(cache_name));

    second.store(None).await.unwrap();
    assert_eq!(
        storage.keys().await,
        vec![
            stored_key("photo.png"),
            stored_key("thumb_photo.png"),
            stored_key("thumb_small_photo.png"),
        ]
    );
    // Nothing was processed a second time
    assert_eq!(fixture.thumb_runs.get(), 1);
}

#[tokio::test]
async fn test_retrieve_from_cache_rejects_malformed_name() {
    let fixture = fixture();
    let storage = memory_storage();
    let mut uploader = uploader(&fixture.registry, &storage, &TestHost::new());

    let err = uploader.retrieve_from_cache("photo.png").unwrap_err();
    assert!(matches!(err, VersionError::InvalidCacheName(_)));
    assert_eq!(uploader.root().state(), VariantState::Empty);
}

#[tokio::test]
async fn test_recreate_named_version_on_retrieved_root() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", true);
    let mut writer = uploader(&fixture.registry, &storage, &host);
    writer.store(Some(photo())).await.unwrap();
    assert_eq!(fixture.thumb_runs.get(), 1);

    let mut uploader = uploader(&fixture.registry, &storage, &host);
    uploader.retrieve_from_store("photo.png").unwrap();
    uploader.recreate(&["thumb"]).await.unwrap();

    assert_eq!(fixture.root_runs.get(), 1);
    assert_eq!(fixture.thumb_runs.get(), 2);
    assert_eq!(fixture.small_runs.get(), 2);
    assert_eq!(fixture.preview_runs.get(), 1);

    let thumb = uploader.find("thumb").unwrap();
    let small = uploader.find("thumb.small").unwrap();
    let preview = uploader.find("preview").unwrap();
    assert_eq!(uploader.root().state(), VariantState::Retrieved);
    assert_eq!(
        uploader.root().file().unwrap().location,
        format!("{}/{}", BASE_URL, stored_key("photo.png"))
    );
    assert_eq!(uploader.node(thumb).state(), VariantState::Stored);
    assert_eq!(uploader.node(small).state(), VariantState::Stored);
    assert_eq!(uploader.node(preview).state(), VariantState::Retrieved);
    assert_eq!(
        uploader.read(thumb).await.unwrap(),
        Bytes::from_static(b"img+root+thumb")
    );
    // Only stored files remain, no cache copies
    assert_eq!(
        storage.keys().await,
        vec![
            stored_key("photo.png"),
            stored_key("preview_photo.png"),
            stored_key("thumb_photo.png"),
            stored_key("thumb_small_photo.png"),
        ]
    );
}

#[tokio::test]
async fn test_recreate_all_versions() {
    let fixture = fixture();
    let storage = memory_storage();
    let host = TestHost::new();
    host.set("show_preview", false);
    let mut uploader = uploader(&fixture.registry, &storage, &host);
    uploader.store(Some(photo())).await.unwrap();

    uploader.recreate(&[]).await.unwrap();

    assert_eq!(fixture.root_runs.get(), 1);
    assert_eq!(fixture.thumb_runs.get(), 2);
    assert_eq!(fixture.small_runs.get(), 2);
    assert_eq!(uploader.root().state(), VariantState::Stored);
    assert_eq!(storage.len().await, 3);
    assert_eq!(
        uploader.read(NodeId::ROOT).await.unwrap(),
        Bytes::from_static(b"img+root")
    );
}

#[tokio::test]
async fn test_recreate_without_file_fails() {
    let fixture = fixture();
    let storage = memory_storage();
    let mut uploader = uploader(&fixture.registry, &storage, &TestHost::new());

    let err = uploader.recreate(&["thumb"]).await.unwrap_err();
    assert!(matches!(err, VersionError::NoFile(ref name) if name == "avatar"));
}

#[tokio::test]
async fn test_pipeline_failure_aborts_cache() {
    let mut registry = DefinitionRegistry::new("avatar");
    registry
        .declare_variant("broken", VariantOptions::new(), |broken| {
            broken.process(varia_processing::FnStage::new("explode", |_| {
                Err(anyhow::anyhow!("cannot decode"))
            }));
            Ok(())
        })
        .unwrap();
    let registry = registry.freeze();

    let storage = memory_storage();
    let mut uploader = uploader(&registry, &storage, &TestHost::new());
    let err = uploader.cache(photo()).await.unwrap_err();

    assert!(matches!(err, VersionError::Processing(_)));
    // The uploader's own file was cached before the failure
    assert_eq!(uploader.root().state(), VariantState::Cached);
}
