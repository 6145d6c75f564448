//! Media commands: remote mutations followed by the matching gallery update
//! and page-cache fan-out.
//!
//! Every failure is classified here, before the store is touched. The store
//! only ever sees data from calls that succeeded.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiError, MediaApi};
use crate::gallery::GalleryStore;
use crate::invalidate::{CacheInvalidationFanout, InvalidationReport};
use crate::model::{Edge, EntityTag, GalleryConnection, MediaRecord, NewMediaObject, PageInfo, TagTargetKind};
use crate::notice::{Notice, Notifier};
use crate::storage::{MediaStorage, StorageError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0} was rejected by the API")]
    Rejected(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChange {
    /// The created tag; `None` for removals.
    pub tag: Option<EntityTag>,
    /// Fresh copy of the media after the change, if it could be re-read.
    pub media: Option<MediaRecord>,
    pub invalidation: InvalidationReport,
}

#[derive(Clone)]
pub struct MediaCommands {
    api: Arc<dyn MediaApi>,
    storage: Arc<dyn MediaStorage>,
    fanout: CacheInvalidationFanout,
    store: GalleryStore,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for MediaCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCommands").finish_non_exhaustive()
    }
}

impl MediaCommands {
    pub fn new(
        api: Arc<dyn MediaApi>,
        storage: Arc<dyn MediaStorage>,
        fanout: CacheInvalidationFanout,
        store: GalleryStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { api, storage, fanout, store, notifier }
    }

    pub fn store(&self) -> &GalleryStore {
        &self.store
    }

    pub fn storage(&self) -> &Arc<dyn MediaStorage> {
        &self.storage
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub async fn fetch_more_media_forward(
        &self,
        user_uuid: &str,
        first: u32,
        after: Option<&str>,
    ) -> Option<GalleryConnection> {
        match self.api.fetch_media_page(user_uuid, first, after).await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(?err, user_uuid, "media page fetch failed");
                self.notifier.notify(Notice::error(err.to_string()));
                None
            }
        }
    }

    pub async fn get_media_by_id(&self, id: &str) -> Option<MediaRecord> {
        match self.api.get_media_by_id(id).await {
            Ok(media) => media,
            Err(err) => {
                warn!(?err, media_id = id, "media lookup failed");
                self.notifier.notify(Notice::error("Unexpected error. Please try again."));
                None
            }
        }
    }

    /// Revalidate every page that may show media tagged with `entity_id`.
    pub async fn invalidate_entity_pages(
        &self,
        entity_id: &str,
        kind: TagTargetKind,
        ancestor_ids: &[String],
    ) -> InvalidationReport {
        self.fanout.invalidate(entity_id, kind, ancestor_ids).await
    }

    async fn refresh_media(&self, media_id: &str) -> Option<MediaRecord> {
        let media = self.get_media_by_id(media_id).await?;
        // Not being held is fine: the photo may not be in this gallery.
        self.store.update_one(media.clone());
        Some(media)
    }

    #[instrument(skip(self))]
    pub async fn add_entity_tag(
        &self,
        media_id: &str,
        entity_id: &str,
        kind: TagTargetKind,
    ) -> Result<TagChange, CommandError> {
        let tag = match self.api.add_entity_tag(media_id, entity_id, kind).await {
            Ok(tag) => tag,
            Err(err) => {
                warn!(?err, "add entity tag failed");
                self.notifier.notify(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };
        self.notifier.notify(Notice::success("Tag added"));

        let media = self.refresh_media(media_id).await;
        let invalidation = self
            .invalidate_entity_pages(entity_id, kind, &tag.ancestor_ids())
            .await;
        Ok(TagChange { tag: Some(tag), media, invalidation })
    }

    #[instrument(skip(self, ancestor_ids))]
    pub async fn remove_entity_tag(
        &self,
        media_id: &str,
        tag_id: &str,
        entity_id: &str,
        kind: TagTargetKind,
        ancestor_ids: &[String],
    ) -> Result<TagChange, CommandError> {
        const FAILED: &str = "Error deleting tag. Refresh the page and try again.";
        match self.api.remove_entity_tag(media_id, tag_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.notifier.notify(Notice::error(FAILED));
                return Err(CommandError::Rejected("removeEntityTag"));
            }
            Err(err) => {
                warn!(?err, "remove entity tag failed");
                self.notifier.notify(Notice::error(FAILED));
                return Err(err.into());
            }
        }
        self.notifier.notify(Notice::success("Tag removed."));

        let media = self.refresh_media(media_id).await;
        let invalidation = self.invalidate_entity_pages(entity_id, kind, ancestor_ids).await;
        Ok(TagChange { tag: None, media, invalidation })
    }

    /// Register uploaded bytes; each new record goes to the front of the gallery.
    /// Records are re-read so tags filled in by the server show up.
    #[instrument(skip(self, list), fields(count = list.len()))]
    pub async fn add_media_objects(&self, list: &[NewMediaObject]) -> Result<Vec<MediaRecord>, CommandError> {
        let returned = self.api.add_media_objects(list).await.map_err(|err| {
            warn!(?err, "add media objects failed");
            CommandError::from(err)
        })?;
        let mut created = Vec::with_capacity(returned.len());
        for media in returned {
            created.push(self.reread(media).await);
        }
        for media in &created {
            self.store.add_to_front(GalleryConnection {
                // New uploads are prepended, so their cursor is never used for paging.
                edges: vec![Edge { node: media.clone(), cursor: String::new() }],
                page_info: PageInfo { has_next_page: true, total_items: 0 },
            });
        }
        Ok(created)
    }

    /// Fresh server copy of `media`; the given record if it cannot be read.
    async fn reread(&self, media: MediaRecord) -> MediaRecord {
        match self.api.get_media_by_id(&media.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => media,
            Err(err) => {
                warn!(?err, media_id = %media.id, "re-reading new media failed");
                media
            }
        }
    }

    /// Delete metadata, then bytes, then drop the photo from the gallery.
    #[instrument(skip(self))]
    pub async fn delete_one_media_object(&self, media_id: &str, media_url: &str) -> Result<(), CommandError> {
        let res = self.delete_remote(media_id, media_url).await;
        match &res {
            Ok(()) => {
                self.store.delete_one(media_id);
                info!("media deleted");
                self.notifier.notify(Notice::success("Photo deleted."));
            }
            Err(err) => {
                warn!(?err, "media delete failed");
                self.notifier.notify(Notice::error("Cannot delete media. Please try again."));
            }
        }
        res
    }

    async fn delete_remote(&self, media_id: &str, media_url: &str) -> Result<(), CommandError> {
        if !self.api.delete_media_object(media_id).await? {
            return Err(CommandError::Rejected("deleteMediaObject"));
        }
        self.storage.delete(media_url).await?;
        Ok(())
    }
}
