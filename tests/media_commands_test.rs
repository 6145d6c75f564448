mod common;

use std::sync::Arc;
use tokio::sync::mpsc;

use common::{climb_tag, ids, media, page, RecordingApi, RecordingStorage, RecordingTransport};
use crag_gallery::commands::{CommandError, MediaCommands};
use crag_gallery::gallery::GalleryStore;
use crag_gallery::invalidate::{CacheInvalidationFanout, CacheKey};
use crag_gallery::model::{MediaFormat, NewEmbeddedEntityTag, NewMediaObject, TagTargetKind};
use crag_gallery::notice::{ChannelNotifier, Notice, NoticeLevel};

struct Harness {
    commands: MediaCommands,
    api: RecordingApi,
    storage: RecordingStorage,
    transport: RecordingTransport,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl Harness {
    fn new(storage: RecordingStorage) -> Self {
        let api = RecordingApi::default();
        let transport = RecordingTransport::default();
        let (notifier, notices) = ChannelNotifier::new();
        let store = GalleryStore::new();
        store.reset(page(&[("m1", "c1"), ("m2", "c2")], true, 10));
        let commands = MediaCommands::new(
            Arc::new(api.clone()),
            Arc::new(storage.clone()),
            CacheInvalidationFanout::new(Arc::new(transport.clone())),
            store,
            Arc::new(notifier),
        );
        Self { commands, api, storage, transport, notices }
    }

    fn notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(n) = self.notices.try_recv() {
            out.push(n);
        }
        out
    }
}

#[tokio::test]
async fn add_tag_refreshes_photo_and_revalidates_pages() {
    let mut h = Harness::new(RecordingStorage::default());
    let tag = climb_tag("climb-1", "root,crag");
    let mut tagged = media("m2");
    tagged.entity_tags.push(tag.clone());
    h.api.put_media(tagged.clone()).await;
    h.api.respond_tag(Ok(tag.clone())).await;

    let change = h.commands.add_entity_tag("m2", "climb-1", TagTargetKind::Climb).await.unwrap();

    assert_eq!(change.tag, Some(tag));
    assert_eq!(change.media, Some(tagged.clone()));
    assert!(change.invalidation.all_succeeded());

    let snap = h.commands.store().snapshot();
    assert_eq!(ids(&snap), vec!["m1", "m2"]);
    assert_eq!(snap.edges[1].node, tagged);
    assert_eq!(snap.edges[1].cursor, "c2");

    let calls = h.transport.calls().await;
    assert_eq!(calls.len(), 5);
    assert!(calls.contains(&CacheKey::Area("crag".into())));
    assert!(calls.contains(&CacheKey::LegacyClimb("climb-1".into())));

    let notices = h.notices();
    assert_eq!(notices, vec![Notice::success("Tag added")]);
}

#[tokio::test]
async fn failed_add_tag_leaves_everything_alone() {
    let mut h = Harness::new(RecordingStorage::default());
    h.api.respond_tag(Err("tag already exists".into())).await;
    let before = h.commands.store().snapshot();

    let err = h
        .commands
        .add_entity_tag("m1", "climb-1", TagTargetKind::Climb)
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Api(_)));
    assert_eq!(h.commands.store().snapshot(), before);
    assert!(h.transport.calls().await.is_empty());
    let notices = h.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn tagging_photo_outside_gallery_still_revalidates() {
    let h = Harness::new(RecordingStorage::default());
    h.api.put_media(media("elsewhere")).await;

    let change = h
        .commands
        .add_entity_tag("elsewhere", "area-3", TagTargetKind::Area)
        .await
        .unwrap();

    assert!(change.media.is_some());
    assert_eq!(h.commands.store().len(), 2);
    assert_eq!(h.transport.calls().await, vec![CacheKey::HomeFeed]);
}

#[tokio::test]
async fn remove_tag_revalidates_with_given_ancestors() {
    let mut h = Harness::new(RecordingStorage::default());
    h.api.put_media(media("m1")).await;

    let change = h
        .commands
        .remove_entity_tag("m1", "tag-1", "climb-1", TagTargetKind::Climb, &["root".to_string()])
        .await
        .unwrap();

    assert_eq!(change.tag, None);
    assert_eq!(h.transport.calls().await.len(), 4);
    assert_eq!(h.notices(), vec![Notice::success("Tag removed.")]);
}

#[tokio::test]
async fn rejected_tag_removal_is_an_error() {
    let mut h = Harness::new(RecordingStorage::default());
    h.api.respond_remove(Ok(false)).await;

    let err = h
        .commands
        .remove_entity_tag("m1", "tag-1", "climb-1", TagTargetKind::Climb, &[])
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Rejected(_)));
    assert!(h.transport.calls().await.is_empty());
    assert_eq!(h.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn delete_removes_metadata_bytes_then_edge() {
    let mut h = Harness::new(RecordingStorage::default());

    h.commands
        .delete_one_media_object("m1", "/u/user-1/m1.jpg")
        .await
        .unwrap();

    assert_eq!(h.storage.deletes().await, vec!["/u/user-1/m1.jpg"]);
    let snap = h.commands.store().snapshot();
    assert_eq!(ids(&snap), vec!["m2"]);
    assert_eq!(snap.page_info.total_items, 9);
    assert_eq!(h.notices(), vec![Notice::success("Photo deleted.")]);
}

#[tokio::test]
async fn rejected_delete_keeps_bytes_and_edge() {
    let mut h = Harness::new(RecordingStorage::default());
    h.api.respond_delete(Ok(false)).await;

    let err = h
        .commands
        .delete_one_media_object("m1", "/u/user-1/m1.jpg")
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Rejected(_)));
    assert!(h.storage.deletes().await.is_empty());
    assert_eq!(h.commands.store().len(), 2);
    assert_eq!(h.notices(), vec![Notice::error("Cannot delete media. Please try again.")]);
}

#[tokio::test]
async fn storage_failure_on_delete_keeps_edge() {
    let h = Harness::new(RecordingStorage::failing_delete());

    let err = h
        .commands
        .delete_one_media_object("m2", "/u/user-1/m2.jpg")
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::Storage(_)));
    assert_eq!(ids(&h.commands.store().snapshot()), vec!["m1", "m2"]);
}

#[tokio::test]
async fn fetch_failure_returns_none_with_notice() {
    let mut h = Harness::new(RecordingStorage::default());
    let api = RecordingApi::with_pages(vec![Err("bad cursor".into())]);
    let (notifier, notices) = ChannelNotifier::new();
    h.notices = notices;
    let commands = MediaCommands::new(
        Arc::new(api),
        Arc::new(h.storage.clone()),
        CacheInvalidationFanout::new(Arc::new(h.transport.clone())),
        GalleryStore::new(),
        Arc::new(notifier),
    );

    assert!(commands.fetch_more_media_forward("user-1", 6, Some("c2")).await.is_none());
    assert_eq!(h.notices()[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn new_media_is_reread_before_prepending() {
    let h = Harness::new(RecordingStorage::default());
    let mut server_copy = media("new-0");
    server_copy.entity_tags.push(climb_tag("climb-1", "root"));
    h.api.put_media(server_copy.clone()).await;
    let input = NewMediaObject {
        user_uuid: "user-1".into(),
        media_url: "/u/user-1/new-0.jpg".into(),
        format: MediaFormat::Jpg,
        width: 1024,
        height: 768,
        size: 2048,
        entity_tag: Some(NewEmbeddedEntityTag { entity_id: "climb-1".into(), entity_type: TagTargetKind::Climb }),
    };

    let created = h.commands.add_media_objects(&[input]).await.unwrap();

    assert_eq!(created, vec![server_copy.clone()]);
    let snap = h.commands.store().snapshot();
    assert_eq!(ids(&snap), vec!["new-0", "m1", "m2"]);
    assert_eq!(snap.edges[0].node.entity_tags.len(), 1);
    assert_eq!(snap.page_info.total_items, 11);
}
