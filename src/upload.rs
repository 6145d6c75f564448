//! Photo upload: bytes to storage, then metadata to the API.
//!
//! If storage accepts the bytes but the metadata mutation fails, the bytes
//! are deleted again. A failure of that cleanup is logged and otherwise
//! ignored.

use std::path::Path;

use futures::future::join_all;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::commands::MediaCommands;
use crate::config::App;
use crate::model::{MediaFormat, MediaRecord, NewEmbeddedEntityTag, NewMediaObject, UnsupportedMediaType};
use crate::notice::Notice;
use crate::storage::StorageError;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{name} is too large ({size} bytes); please reduce it to {limit} bytes or under")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedMediaType),
    #[error("failed to re-encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read image dimensions: {0}")]
    Dimensions(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("media metadata was not saved: {0}")]
    Metadata(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub compress_threshold: u64,
    pub max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self { compress_threshold: 11 * 1024 * 1024, max_bytes: 30 * 1024 * 1024 }
    }
}

impl From<&App> for UploadLimits {
    fn from(app: &App) -> Self {
        Self { compress_threshold: app.compress_threshold_bytes, max_bytes: app.max_upload_bytes }
    }
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Set when uploading from a climb or area page.
    pub entity_tag: Option<NewEmbeddedEntityTag>,
    pub is_profile_photo: bool,
}

#[derive(Debug, Default)]
pub struct UploadSummary {
    pub uploaded: Vec<MediaRecord>,
    pub failed: Vec<(String, UploadError)>,
}

impl UploadSummary {
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Re-encode any supported image as JPEG.
pub fn compress_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    image::DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    Ok(out)
}

/// MIME type guessed from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "avif" => "image/avif",
        Some(ext) if ext == "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), UploadError> {
    let size = imagesize::blob_size(bytes).map_err(|e| UploadError::Dimensions(e.to_string()))?;
    let width = u32::try_from(size.width).map_err(|e| UploadError::Dimensions(e.to_string()))?;
    let height = u32::try_from(size.height).map_err(|e| UploadError::Dimensions(e.to_string()))?;
    Ok((width, height))
}

#[derive(Debug, Clone)]
pub struct PhotoUploader {
    commands: MediaCommands,
    user_uuid: String,
    limits: UploadLimits,
}

impl PhotoUploader {
    pub fn new(commands: MediaCommands, user_uuid: impl Into<String>, limits: UploadLimits) -> Self {
        Self { commands, user_uuid: user_uuid.into(), limits }
    }

    /// Apply size limits, re-encoding large files. Returns name, type and bytes to send.
    pub fn prepare(&self, file: UploadFile) -> Result<UploadFile, UploadError> {
        let size = file.bytes.len() as u64;
        if size >= self.limits.max_bytes {
            return Err(UploadError::TooLarge { name: file.name, size, limit: self.limits.max_bytes });
        }
        if size < self.limits.compress_threshold {
            return Ok(file);
        }
        let bytes = compress_jpeg(&file.bytes, JPEG_QUALITY)?;
        info!(name = %file.name, before = size, after = bytes.len(), "compressed upload");
        let name = Path::new(&file.name)
            .with_extension("jpg")
            .to_string_lossy()
            .into_owned();
        Ok(UploadFile { name, content_type: "image/jpeg".into(), bytes })
    }

    #[instrument(skip(self, file, opts), fields(name = %file.name))]
    pub async fn upload_one(&self, file: UploadFile, opts: &UploadOptions) -> Result<MediaRecord, UploadError> {
        let file = self.prepare(file)?;
        let format = MediaFormat::from_mime_type(&file.content_type)?;
        let (width, height) = image_dimensions(&file.bytes)?;
        let size = file.bytes.len() as u64;

        let media_url = self
            .commands
            .storage()
            .upload(&file.name, file.bytes, format.mime_type())
            .await?;

        let new_media = NewMediaObject {
            user_uuid: self.user_uuid.clone(),
            media_url: media_url.clone(),
            format,
            width,
            height,
            size,
            entity_tag: opts.entity_tag.clone(),
        };

        let record = match self.commands.add_media_objects(&[new_media]).await {
            Ok(mut created) if created.len() == 1 => created.remove(0),
            Ok(created) => {
                self.discard_orphan(&media_url).await;
                return Err(UploadError::Metadata(format!("expected 1 record, got {}", created.len())));
            }
            Err(err) => {
                self.discard_orphan(&media_url).await;
                return Err(UploadError::Metadata(err.to_string()));
            }
        };

        if opts.is_profile_photo {
            self.commands.store().set_avatar_url(media_url);
        }

        // A photo uploaded from a climb or area page carries exactly one tag.
        if !opts.is_profile_photo && record.entity_tags.len() == 1 {
            let tag = &record.entity_tags[0];
            self.commands
                .invalidate_entity_pages(&tag.target_id, tag.kind, &tag.ancestor_ids())
                .await;
        }
        Ok(record)
    }

    async fn discard_orphan(&self, media_url: &str) {
        warn!(media_url, "metadata not saved; deleting uploaded bytes");
        if let Err(err) = self.commands.storage().delete(media_url).await {
            error!(?err, media_url, "failed to delete orphaned upload");
        }
    }

    /// Upload a batch concurrently, holding the store's `uploading` flag.
    pub async fn upload_all(&self, files: Vec<UploadFile>, opts: &UploadOptions) -> UploadSummary {
        let store = self.commands.store();
        store.set_uploading(true);

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let results = join_all(files.into_iter().map(|f| self.upload_one(f, opts))).await;
        store.set_uploading(false);

        let mut summary = UploadSummary::default();
        for (name, res) in names.into_iter().zip(results) {
            match res {
                Ok(record) => summary.uploaded.push(record),
                Err(err) => {
                    if let UploadError::TooLarge { .. } = err {
                        self.commands.notifier().notify(Notice::warning(err.to_string()));
                    }
                    warn!(name = %name, err = %err, "upload failed");
                    summary.failed.push((name, err));
                }
            }
        }

        let notice = if summary.has_errors() {
            Notice::error("Error uploading photos. Please try again.")
        } else {
            Notice::success("Uploaded!")
        };
        self.commands.notifier().notify(notice);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn compress_produces_jpeg_with_same_dimensions() {
        let out = compress_jpeg(&png(8, 5), JPEG_QUALITY).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(image_dimensions(&out).unwrap(), (8, 5));
    }

    #[test]
    fn dimensions_of_garbage_fail() {
        assert!(matches!(image_dimensions(b"not an image"), Err(UploadError::Dimensions(_))));
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("x.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn default_limits() {
        let limits = UploadLimits::default();
        assert_eq!(limits.compress_threshold, 11 * 1024 * 1024);
        assert_eq!(limits.max_bytes, 30 * 1024 * 1024);
    }
}
