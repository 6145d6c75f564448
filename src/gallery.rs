//! In-memory, cursor-paginated photo gallery.
//!
//! `GalleryConnection` carries the pure mutators. `GalleryStore` is the handle
//! the view layer is given; it serializes every mutation behind one lock so
//! read-then-write operations such as `append` and `update_one` never
//! interleave.
//!
//! Cursor chaining is a caller contract: `append` expects a page fetched with
//! the current `end_cursor()`. The store never fabricates or checks cursors.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::model::{Edge, GalleryConnection, MediaRecord, PageInfo};

impl GalleryConnection {
    pub fn new(edges: Vec<Edge>, page_info: PageInfo) -> Self {
        Self { edges, page_info }
    }

    pub fn end_cursor(&self) -> Option<&str> {
        self.edges.last().map(|e| e.cursor.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.edges.iter().position(|e| e.node.id == id)
    }

    pub fn media_list(&self) -> Vec<MediaRecord> {
        self.edges.iter().map(|e| e.node.clone()).collect()
    }

    /// Concatenate `next` after the held edges and adopt its page info.
    /// Returns the number of edges appended.
    pub fn append(&mut self, next: GalleryConnection) -> usize {
        let mut held: HashSet<String> = self.edges.iter().map(|e| e.node.id.clone()).collect();
        let before = self.edges.len();
        for edge in next.edges {
            if !held.insert(edge.node.id.clone()) {
                warn!(media_id = %edge.node.id, cursor = %edge.cursor, "skipping duplicate media on append");
                continue;
            }
            self.edges.push(edge);
        }
        self.page_info = next.page_info;
        self.edges.len() - before
    }

    /// Prepend new uploads, newest first. Edges already held are ignored.
    pub fn add_to_front(&mut self, fresh: GalleryConnection) -> usize {
        let mut seen: HashSet<String> = self.edges.iter().map(|e| e.node.id.clone()).collect();
        let front: Vec<Edge> = fresh
            .edges
            .into_iter()
            .filter(|e| seen.insert(e.node.id.clone()))
            .collect();
        let added = front.len();
        if added > 0 {
            self.edges.splice(0..0, front);
            self.page_info.total_items += added as u64;
        }
        added
    }

    /// Replace the node with `record.id` in place. Cursor and position are kept.
    pub fn update_one(&mut self, record: MediaRecord) -> bool {
        match self.edges.iter_mut().find(|e| e.node.id == record.id) {
            Some(edge) => {
                edge.node = record;
                true
            }
            None => false,
        }
    }

    pub fn delete_one(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.edges.remove(idx);
                self.page_info.total_items = self.page_info.total_items.saturating_sub(1);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryState {
    pub connection: GalleryConnection,
    pub uploading: bool,
    pub avatar_url: Option<String>,
    /// Bumped on every `reset`; lets in-flight fetches detect a changed data set.
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GalleryStore {
    inner: Arc<Mutex<GalleryState>>,
}

impl GalleryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GalleryState> {
        // Mutators cannot panic midway, so a poisoned state is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self, connection: GalleryConnection) {
        let mut state = self.lock();
        debug!(
            edges = connection.edges.len(),
            total = connection.page_info.total_items,
            "gallery reset"
        );
        state.connection = connection;
        state.generation += 1;
    }

    pub fn append(&self, connection: GalleryConnection) -> usize {
        self.lock().connection.append(connection)
    }

    /// Like `append`, but only applies when the store is still at `generation`.
    pub fn append_if_current(&self, generation: u64, connection: GalleryConnection) -> Option<usize> {
        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }
        Some(state.connection.append(connection))
    }

    pub fn add_to_front(&self, connection: GalleryConnection) -> usize {
        self.lock().connection.add_to_front(connection)
    }

    pub fn update_one(&self, record: MediaRecord) -> bool {
        self.lock().connection.update_one(record)
    }

    pub fn delete_one(&self, id: &str) -> bool {
        self.lock().connection.delete_one(id)
    }

    pub fn set_uploading(&self, flag: bool) {
        self.lock().uploading = flag;
    }

    pub fn set_avatar_url(&self, url: impl Into<String>) {
        self.lock().avatar_url = Some(url.into());
    }

    pub fn snapshot(&self) -> GalleryConnection {
        self.lock().connection.clone()
    }

    pub fn state(&self) -> GalleryState {
        self.lock().clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn end_cursor(&self) -> Option<String> {
        self.lock().connection.end_cursor().map(str::to_string)
    }

    pub fn has_next_page(&self) -> bool {
        self.lock().connection.page_info.has_next_page
    }

    pub fn total_items(&self) -> u64 {
        self.lock().connection.page_info.total_items
    }

    pub fn len(&self) -> usize {
        self.lock().connection.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn media_list(&self) -> Vec<MediaRecord> {
        self.lock().connection.media_list()
    }

    pub fn is_uploading(&self) -> bool {
        self.lock().uploading
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.lock().avatar_url.clone()
    }
}
