use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::api::model::{
    AddEntityTagData, AddMediaObjectsData, DeleteMediaObjectData, GraphqlResponse, MediaByIdData,
    RemoveEntityTagData, UserMediaData,
};
use crate::model::{EntityTag, GalleryConnection, MediaRecord, NewMediaObject, TagTargetKind};

pub mod model;
pub mod queries;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to reach media API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("GraphQL error: {0}")]
    Graphql(String),
    #[error("media API response missing data for {0}")]
    MissingData(&'static str),
    #[error("auth token required for {0}")]
    Unauthenticated(&'static str),
    #[error("invalid media API response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote operations on user media.
#[async_trait]
pub trait MediaApi: Send + Sync {
    async fn fetch_media_page(
        &self,
        user_uuid: &str,
        first: u32,
        after: Option<&str>,
    ) -> Result<GalleryConnection, ApiError>;

    async fn get_media_by_id(&self, id: &str) -> Result<Option<MediaRecord>, ApiError>;

    async fn add_entity_tag(
        &self,
        media_id: &str,
        entity_id: &str,
        kind: TagTargetKind,
    ) -> Result<EntityTag, ApiError>;

    async fn remove_entity_tag(&self, media_id: &str, tag_id: &str) -> Result<bool, ApiError>;

    async fn add_media_objects(&self, list: &[NewMediaObject]) -> Result<Vec<MediaRecord>, ApiError>;

    async fn delete_media_object(&self, media_id: &str) -> Result<bool, ApiError>;
}

#[derive(Clone)]
pub struct GraphqlClient {
    http: Client,
    endpoint: Url,
    token: Option<String>,
}

impl fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl GraphqlClient {
    pub fn new(http: Client, endpoint: Url, token: Option<String>) -> Self {
        Self { http, endpoint, token }
    }

    pub fn build_request(&self, query: &str, variables: Value, auth: bool) -> Result<reqwest::Request, ApiError> {
        let mut req = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&json!({ "query": query, "variables": variables }));
        if auth {
            if let Some(token) = &self.token {
                req = req.header("Authorization", format!("Bearer {}", token));
            }
        }
        Ok(req.build()?)
    }

    fn require_token(&self, op: &'static str) -> Result<(), ApiError> {
        match &self.token {
            Some(_) => Ok(()),
            None => Err(ApiError::Unauthenticated(op)),
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        op: &'static str,
        query: &str,
        variables: Value,
        auth: bool,
    ) -> Result<T, ApiError> {
        let request = self.build_request(query, variables, auth)?;
        debug!(url = %request.url(), op, "sending graphql request");
        let res = self.http.execute(request).await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(op, %status, "media API returned error status");
            return Err(ApiError::Status { status, body });
        }

        let body = res.text().await?;
        parse_response(op, &body)
    }
}

/// Unwrap a GraphQL envelope; any `errors` entry fails the whole call.
pub fn parse_response<T: DeserializeOwned>(op: &'static str, body: &str) -> Result<T, ApiError> {
    let envelope: GraphqlResponse<T> = serde_json::from_str(body)?;
    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(ApiError::Graphql(messages.join("; ")));
    }
    envelope.data.ok_or(ApiError::MissingData(op))
}

#[async_trait]
impl MediaApi for GraphqlClient {
    #[instrument(skip(self))]
    async fn fetch_media_page(
        &self,
        user_uuid: &str,
        first: u32,
        after: Option<&str>,
    ) -> Result<GalleryConnection, ApiError> {
        let variables = json!({ "userUuid": user_uuid, "first": first, "after": after });
        let data: UserMediaData = self
            .execute("getUserMediaPagination", &queries::user_media(), variables, false)
            .await?;
        Ok(data.get_user_media_pagination.media_connection)
    }

    #[instrument(skip(self))]
    async fn get_media_by_id(&self, id: &str) -> Result<Option<MediaRecord>, ApiError> {
        let data: MediaByIdData = self
            .execute("media", &queries::media_by_id(), json!({ "id": id }), false)
            .await?;
        Ok(data.media)
    }

    #[instrument(skip(self))]
    async fn add_entity_tag(
        &self,
        media_id: &str,
        entity_id: &str,
        kind: TagTargetKind,
    ) -> Result<EntityTag, ApiError> {
        self.require_token("addEntityTag")?;
        let variables = json!({ "mediaId": media_id, "entityId": entity_id, "entityType": kind });
        let data: AddEntityTagData = self
            .execute("addEntityTag", queries::ADD_ENTITY_TAG, variables, true)
            .await?;
        Ok(data.add_entity_tag)
    }

    #[instrument(skip(self))]
    async fn remove_entity_tag(&self, media_id: &str, tag_id: &str) -> Result<bool, ApiError> {
        self.require_token("removeEntityTag")?;
        let variables = json!({ "mediaId": media_id, "tagId": tag_id });
        let data: RemoveEntityTagData = self
            .execute("removeEntityTag", queries::REMOVE_ENTITY_TAG, variables, true)
            .await?;
        Ok(data.remove_entity_tag)
    }

    #[instrument(skip(self, list), fields(count = list.len()))]
    async fn add_media_objects(&self, list: &[NewMediaObject]) -> Result<Vec<MediaRecord>, ApiError> {
        self.require_token("addMediaObjects")?;
        let variables = json!({ "mediaList": list });
        let data: AddMediaObjectsData = self
            .execute("addMediaObjects", &queries::add_media_objects(), variables, true)
            .await?;
        Ok(data.add_media_objects)
    }

    #[instrument(skip(self))]
    async fn delete_media_object(&self, media_id: &str) -> Result<bool, ApiError> {
        self.require_token("deleteMediaObject")?;
        let data: DeleteMediaObjectData = self
            .execute(
                "deleteMediaObject",
                queries::DELETE_ONE_MEDIA_OBJECT,
                json!({ "mediaId": media_id }),
                true,
            )
            .await?;
        Ok(data.delete_media_object)
    }
}
