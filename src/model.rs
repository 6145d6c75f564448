use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TagTargetKind {
    Area,
    Climb,
}

impl TagTargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagTargetKind::Area => "area",
            TagTargetKind::Climb => "climb",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "area" => Some(TagTargetKind::Area),
            "climb" => Some(TagTargetKind::Climb),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported media type: {0}")]
pub struct UnsupportedMediaType(pub String);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Jpg,
    Png,
    Webp,
    Avif,
}

impl MediaFormat {
    pub fn from_mime_type(mime: &str) -> Result<Self, UnsupportedMediaType> {
        match mime {
            "image/jpeg" | "image/jpg" => Ok(MediaFormat::Jpg),
            "image/png" => Ok(MediaFormat::Png),
            "image/webp" => Ok(MediaFormat::Webp),
            "image/avif" => Ok(MediaFormat::Avif),
            other => Err(UnsupportedMediaType(other.to_string())),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Jpg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Webp => "image/webp",
            MediaFormat::Avif => "image/avif",
        }
    }
}

/// Link from a photo to a climb or an area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityTag {
    pub id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: TagTargetKind,
    #[serde(default)]
    pub climb_name: Option<String>,
    #[serde(default)]
    pub area_name: Option<String>,
    /// Comma-joined ancestor area ids, root first.
    #[serde(default)]
    pub ancestors: String,
}

impl EntityTag {
    pub fn ancestor_ids(&self) -> Vec<String> {
        split_ancestors(&self.ancestors)
    }

    pub fn display_name(&self) -> &str {
        self.climb_name
            .as_deref()
            .or(self.area_name.as_deref())
            .unwrap_or("Untitled")
    }
}

pub fn split_ancestors(ancestors: &str) -> Vec<String> {
    ancestors
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One uploaded photo. Immutable except for its tag list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: String,
    pub media_url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: Option<MediaFormat>,
    #[serde(default)]
    pub size: Option<u64>,
    pub upload_time: DateTime<Utc>,
    pub user_uuid: String,
    #[serde(default)]
    pub entity_tags: Vec<EntityTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub node: MediaRecord,
    pub cursor: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub total_items: u64,
}

/// Ordered page of media edges in server fetch order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryConnection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
}

/// Input for registering freshly uploaded bytes with the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaObject {
    pub user_uuid: String,
    pub media_url: String,
    pub format: MediaFormat,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_tag: Option<NewEmbeddedEntityTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewEmbeddedEntityTag {
    pub entity_id: String,
    pub entity_type: TagTargetKind,
}
