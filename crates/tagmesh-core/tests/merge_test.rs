mod common;

use common::*;
use tagmesh_core::*;
use uuid::Uuid;

// ── Merge ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_merge_redirects_aliases_and_videos() {
    let embedder = TableEmbedder::new(&[("tiền", at_angle(0.0)), ("money", at_angle(90.0))]);
    let (service, _temp) = open_service(Some(embedder), None);

    let source = service.resolve("tiền").await.unwrap().canonical;
    let target = service.resolve("money").await.unwrap().canonical;
    assert_ne!(source.id, target.id);

    let shared = Uuid::now_v7();
    let source_only = Uuid::now_v7();
    service.add_tag_to_video(shared, TagRef::Id(source.id)).await.unwrap();
    service.add_tag_to_video(shared, TagRef::Id(target.id)).await.unwrap();
    service.add_tag_to_video(source_only, TagRef::Id(source.id)).await.unwrap();

    let outcome = service.merge(source.id, target.id).unwrap();
    assert_eq!(outcome.merged_alias_count, 1);
    assert!(outcome.source_deleted);
    assert_eq!(outcome.target.id, target.id);

    // Source is gone, every former alias resolves to the target
    assert!(service.get_canonical(source.id).unwrap_err().is_not_found());
    let resolved = service.resolve("tiền").await.unwrap();
    assert_eq!(resolved.canonical.id, target.id);
    assert_eq!(resolved.layer, ResolutionLayer::ExactAlias);

    // Videos: no loss, no duplicates
    assert_eq!(service.video_tags(shared).unwrap(), vec![target.clone()]);
    assert_eq!(service.video_tags(source_only).unwrap(), vec![target.clone()]);
    assert_eq!(service.stats().unwrap().store.video_link_count, 2);

    let full = service.get_canonical(target.id).unwrap();
    assert_eq!(full.aliases.len(), 2);
    assert!(full.aliases.iter().all(|a| a.canonical_tag_id == target.id));
}

#[tokio::test]
async fn test_merge_moves_semantic_neighbourhood() {
    let embedder = TableEmbedder::new(&[
        ("tiền", at_angle(0.0)),
        ("money", at_angle(90.0)),
        ("tiền mặt", at_angle(4.0)),
    ]);
    let (service, _temp) = open_service(Some(embedder), None);

    let source = service.resolve("tiền").await.unwrap().canonical;
    let target = service.resolve("money").await.unwrap().canonical;
    service.merge(source.id, target.id).unwrap();

    // The nearest alias now belongs to the target
    let cash = service.resolve("tiền mặt").await.unwrap();
    assert_eq!(cash.canonical.id, target.id);
    assert_eq!(cash.layer, ResolutionLayer::SemanticMatch);
}

#[tokio::test]
async fn test_merge_error_kinds() {
    let (service, _temp) = open_service(None, None);
    let tag = service.resolve("money").await.unwrap().canonical;

    let same = service.merge(tag.id, tag.id).unwrap_err();
    assert_eq!(same.kind(), ErrorKind::InvalidInput);

    let missing_source = service.merge(Uuid::now_v7(), tag.id).unwrap_err();
    assert_eq!(missing_source.kind(), ErrorKind::NotFound);

    let missing_target = service.merge(tag.id, Uuid::now_v7()).unwrap_err();
    assert_eq!(missing_target.kind(), ErrorKind::NotFound);

    assert!(service.get_canonical(tag.id).is_ok());
}

#[tokio::test]
async fn test_merge_chain() {
    let (service, _temp) = open_service(None, None);
    let a = service.resolve("a tag").await.unwrap().canonical;
    let b = service.resolve("b tag").await.unwrap().canonical;
    let c = service.resolve("c tag").await.unwrap().canonical;

    assert_eq!(service.merge(a.id, b.id).unwrap().merged_alias_count, 1);
    assert_eq!(service.merge(b.id, c.id).unwrap().merged_alias_count, 2);

    for text in ["a tag", "b tag", "c tag"] {
        assert_eq!(service.resolve(text).await.unwrap().canonical.id, c.id);
    }
    let stats = service.stats().unwrap().store;
    assert_eq!(stats.canonical_count, 1);
    assert_eq!(stats.alias_count, 3);
}

// ── Approval ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_approval_survives_merge_into_approved_target() {
    let (service, _temp) = open_service(None, None);
    let source = service.resolve("ml").await.unwrap().canonical;
    let target = service.resolve("machine learning").await.unwrap().canonical;

    let approved = service.set_approval(target.id, true).unwrap();
    assert!(approved.is_approved);
    service.merge(source.id, target.id).unwrap();

    let hits = service.search("ml", 10, true).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, target.id);
    assert!(service.set_approval(source.id, true).unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_rename_updates_slug_uniquely() {
    let (service, _temp) = open_service(None, None);
    let finance = service.resolve("finance").await.unwrap().canonical;
    let money = service.resolve("money").await.unwrap().canonical;

    let renamed = service.rename(money.id, "Finance").unwrap();
    assert_eq!(renamed.display_name, "Finance");
    assert_eq!(renamed.slug, "finance-2");
    assert_eq!(service.get_canonical(finance.id).unwrap().tag.slug, "finance");

    // Old name still resolves through its alias
    assert_eq!(service.resolve("money").await.unwrap().canonical.id, money.id);
}
