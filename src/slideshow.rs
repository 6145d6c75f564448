//! Keeps the browser location in sync with the photo open in the slideshow.
//!
//! The gallery lives at `/u/{uid}`; an open photo at `/u/{uid}/{media file}`
//! with `gallery=true` in the query. Opening from the closed state pushes a
//! history entry so "back" closes the viewer; moving between photos replaces it.

use reqwest::Url;

use crate::model::MediaRecord;
use crate::storage::basename;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Push,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryUpdate {
    pub kind: HistoryKind,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SlideshowNav {
    base: String,
    selected: Option<usize>,
}

impl SlideshowNav {
    pub fn new(uid: &str) -> Self {
        Self { base: format!("/u/{}", uid), selected: None }
    }

    pub fn base_path(&self) -> &str {
        &self.base
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_base(&self, path: &str) -> bool {
        path.trim_end_matches('/') == self.base
    }

    pub fn media_path(&self, record: &MediaRecord) -> Option<String> {
        basename(&record.media_url).map(|name| format!("{}/{}", self.base, name))
    }

    /// Select `index` and describe the history change the view should make.
    pub fn navigate(&mut self, index: usize, media: &[MediaRecord], query: &str) -> Option<HistoryUpdate> {
        let path = self.media_path(media.get(index)?)?;
        let kind = match self.selected {
            None => HistoryKind::Push,
            Some(_) => HistoryKind::Replace,
        };
        self.selected = Some(index);
        Some(HistoryUpdate { kind, url: format!("{}?{}", path, gallery_query(query)) })
    }

    pub fn locate(post_id: &str, media: &[MediaRecord]) -> Option<usize> {
        media
            .iter()
            .position(|m| basename(&m.media_url) == Some(post_id))
    }

    /// Deep link: the page was loaded with a post id already in the route.
    pub fn open_post(&mut self, post_id: &str, media: &[MediaRecord]) -> Option<usize> {
        let found = Self::locate(post_id, media)?;
        self.selected = Some(found);
        Some(found)
    }

    /// Browser forward/back landed on a photo path while the viewer is closed.
    pub fn open_from_path(&mut self, path: &str, media: &[MediaRecord]) -> Option<usize> {
        if self.selected.is_some() || path.len() <= self.base.len() || !path.starts_with(&self.base) {
            return None;
        }
        let post_id = basename(path)?;
        self.open_post(post_id, media)
    }

    /// Close the viewer; returns the location to navigate to.
    pub fn close(&mut self) -> String {
        self.selected = None;
        self.base.clone()
    }

    pub fn on_pop_state(&mut self, path: &str) -> bool {
        if self.is_base(path) {
            self.selected = None;
            return true;
        }
        false
    }
}

fn gallery_query(query: &str) -> String {
    let mut url = match Url::parse("http://localhost/") {
        Ok(url) => url,
        Err(_) => return "gallery=true".to_string(),
    };
    url.set_query(Some(query.trim_start_matches('?')).filter(|q| !q.is_empty()));
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "gallery")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("gallery", "true");
    url.query().unwrap_or("gallery=true").to_string()
}
