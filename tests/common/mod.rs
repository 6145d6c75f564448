#![allow(dead_code)]

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use crag_gallery::api::{ApiError, MediaApi};
use crag_gallery::invalidate::{CacheKey, InvalidationTransport};
use crag_gallery::model::{
    Edge, EntityTag, GalleryConnection, MediaRecord, NewMediaObject, PageInfo, TagTargetKind,
};
use crag_gallery::storage::{MediaStorage, StorageError};

pub fn media(id: &str) -> MediaRecord {
    MediaRecord {
        id: id.into(),
        media_url: format!("/u/user-1/{id}.jpg"),
        width: 1024,
        height: 768,
        format: None,
        size: None,
        upload_time: Utc.with_ymd_and_hms(2023, 6, 1, 8, 30, 0).unwrap(),
        user_uuid: "user-1".into(),
        entity_tags: vec![],
    }
}

pub fn page(ids: &[(&str, &str)], has_next_page: bool, total_items: u64) -> GalleryConnection {
    GalleryConnection {
        edges: ids
            .iter()
            .map(|(id, cursor)| Edge { node: media(id), cursor: cursor.to_string() })
            .collect(),
        page_info: PageInfo { has_next_page, total_items },
    }
}

pub fn ids(conn: &GalleryConnection) -> Vec<String> {
    conn.edges.iter().map(|e| e.node.id.clone()).collect()
}

pub fn climb_tag(target: &str, ancestors: &str) -> EntityTag {
    EntityTag {
        id: format!("tag-{target}"),
        target_id: target.into(),
        kind: TagTargetKind::Climb,
        climb_name: Some("Moonlight Buttress".into()),
        area_name: None,
        ancestors: ancestors.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub user_uuid: String,
    pub first: u32,
    pub after: Option<String>,
}

#[derive(Clone, Default)]
pub struct RecordingApi {
    pages: Arc<Mutex<VecDeque<std::result::Result<GalleryConnection, String>>>>,
    fetch_calls: Arc<Mutex<Vec<FetchCall>>>,
    media: Arc<Mutex<HashMap<String, MediaRecord>>>,
    tag_response: Arc<Mutex<Option<std::result::Result<EntityTag, String>>>>,
    remove_response: Arc<Mutex<Option<std::result::Result<bool, String>>>>,
    add_media_response: Arc<Mutex<Option<std::result::Result<Vec<MediaRecord>, String>>>>,
    delete_response: Arc<Mutex<Option<std::result::Result<bool, String>>>>,
    added_media: Arc<Mutex<Vec<NewMediaObject>>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl RecordingApi {
    pub fn with_pages(pages: Vec<std::result::Result<GalleryConnection, String>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(VecDeque::from(pages))),
            ..Default::default()
        }
    }

    /// Page fetches wait on `gate` before answering.
    pub async fn hold_fetches(&self, gate: Arc<Notify>) {
        *self.gate.lock().await = Some(gate);
    }

    pub async fn put_media(&self, record: MediaRecord) {
        self.media.lock().await.insert(record.id.clone(), record);
    }

    pub async fn respond_tag(&self, res: std::result::Result<EntityTag, String>) {
        *self.tag_response.lock().await = Some(res);
    }

    pub async fn respond_remove(&self, res: std::result::Result<bool, String>) {
        *self.remove_response.lock().await = Some(res);
    }

    pub async fn respond_add_media(&self, res: std::result::Result<Vec<MediaRecord>, String>) {
        *self.add_media_response.lock().await = Some(res);
    }

    pub async fn respond_delete(&self, res: std::result::Result<bool, String>) {
        *self.delete_response.lock().await = Some(res);
    }

    pub async fn fetch_calls(&self) -> Vec<FetchCall> {
        self.fetch_calls.lock().await.clone()
    }

    pub async fn added_media(&self) -> Vec<NewMediaObject> {
        self.added_media.lock().await.clone()
    }
}

fn api_err(msg: String) -> ApiError {
    ApiError::Graphql(msg)
}

#[async_trait::async_trait]
impl MediaApi for RecordingApi {
    async fn fetch_media_page(
        &self,
        user_uuid: &str,
        first: u32,
        after: Option<&str>,
    ) -> std::result::Result<GalleryConnection, ApiError> {
        self.fetch_calls.lock().await.push(FetchCall {
            user_uuid: user_uuid.into(),
            first,
            after: after.map(str::to_string),
        });
        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.pages.lock().await.pop_front();
        match next {
            Some(Ok(conn)) => Ok(conn),
            Some(Err(msg)) => Err(api_err(msg)),
            None => Ok(GalleryConnection::default()),
        }
    }

    async fn get_media_by_id(&self, id: &str) -> std::result::Result<Option<MediaRecord>, ApiError> {
        Ok(self.media.lock().await.get(id).cloned())
    }

    async fn add_entity_tag(
        &self,
        _media_id: &str,
        entity_id: &str,
        kind: TagTargetKind,
    ) -> std::result::Result<EntityTag, ApiError> {
        match self.tag_response.lock().await.clone() {
            Some(res) => res.map_err(api_err),
            None => Ok(EntityTag {
                id: "tag-new".into(),
                target_id: entity_id.into(),
                kind,
                climb_name: None,
                area_name: None,
                ancestors: String::new(),
            }),
        }
    }

    async fn remove_entity_tag(&self, _media_id: &str, _tag_id: &str) -> std::result::Result<bool, ApiError> {
        self.remove_response.lock().await.clone().unwrap_or(Ok(true)).map_err(api_err)
    }

    async fn add_media_objects(&self, list: &[NewMediaObject]) -> std::result::Result<Vec<MediaRecord>, ApiError> {
        self.added_media.lock().await.extend(list.iter().cloned());
        if let Some(res) = self.add_media_response.lock().await.clone() {
            return res.map_err(api_err);
        }
        Ok(list
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let mut record = media(&format!("new-{i}"));
                record.media_url = m.media_url.clone();
                record.width = m.width;
                record.height = m.height;
                record
            })
            .collect())
    }

    async fn delete_media_object(&self, _media_id: &str) -> std::result::Result<bool, ApiError> {
        self.delete_response.lock().await.clone().unwrap_or(Ok(true)).map_err(api_err)
    }
}

#[derive(Clone, Default)]
pub struct RecordingStorage {
    uploads: Arc<Mutex<Vec<String>>>,
    deletes: Arc<Mutex<Vec<String>>>,
    fail_upload: bool,
    fail_delete: bool,
}

impl RecordingStorage {
    pub fn failing_delete() -> Self {
        Self { fail_delete: true, ..Default::default() }
    }

    pub fn failing_upload() -> Self {
        Self { fail_upload: true, ..Default::default() }
    }

    pub async fn uploads(&self) -> Vec<String> {
        self.uploads.lock().await.clone()
    }

    pub async fn deletes(&self) -> Vec<String> {
        self.deletes.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl MediaStorage for RecordingStorage {
    async fn upload(
        &self,
        filename: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> std::result::Result<String, StorageError> {
        if self.fail_upload {
            return Err(StorageError::MissingFilename);
        }
        let url = format!("/u/user-1/{filename}");
        self.uploads.lock().await.push(url.clone());
        Ok(url)
    }

    async fn delete(&self, media_url: &str) -> std::result::Result<(), StorageError> {
        self.deletes.lock().await.push(media_url.to_string());
        if self.fail_delete {
            return Err(StorageError::Unauthenticated);
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<CacheKey>>>,
    fail_on: Option<CacheKey>,
}

impl RecordingTransport {
    pub fn failing_on(key: CacheKey) -> Self {
        Self { fail_on: Some(key), ..Default::default() }
    }

    pub async fn calls(&self) -> Vec<CacheKey> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl InvalidationTransport for RecordingTransport {
    async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.calls.lock().await.push(key.clone());
        if self.fail_on.as_ref() == Some(key) {
            return Err(anyhow!("revalidation of {} failed 500", key));
        }
        Ok(())
    }
}
