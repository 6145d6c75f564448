//! Feeds one viewer's gallery from the media API.
//!
//! Only one page fetch runs at a time per session; extra scroll triggers are
//! dropped. Fetches that resolve after `close()` or after the data set was
//! reset are discarded instead of written into the store. In-flight requests
//! are never aborted; discarding on arrival is the only cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::api::MediaApi;
use crate::gallery::GalleryStore;
use crate::model::GalleryConnection;
use crate::notice::{Notice, Notifier};

pub const DEFAULT_PAGE_SIZE: u32 = 6;
/// Upload slots shown to the owner until the profile holds this many photos.
pub const MIN_PROFILE_PHOTOS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Appended(usize),
    /// Another fetch is already in flight.
    Busy,
    /// `has_next_page` is false; nothing requested.
    Exhausted,
    /// Result arrived for a closed session or a replaced data set.
    Discarded,
    Failed,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GallerySession {
    store: GalleryStore,
    api: Arc<dyn MediaApi>,
    notifier: Arc<dyn Notifier>,
    user_uuid: String,
    page_size: u32,
    busy: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for GallerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GallerySession")
            .field("user_uuid", &self.user_uuid)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl GallerySession {
    pub fn new(
        store: GalleryStore,
        api: Arc<dyn MediaApi>,
        notifier: Arc<dyn Notifier>,
        user_uuid: impl Into<String>,
    ) -> Self {
        Self {
            store,
            api,
            notifier,
            user_uuid: user_uuid.into(),
            page_size: DEFAULT_PAGE_SIZE,
            busy: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn store(&self) -> &GalleryStore {
        &self.store
    }

    pub fn user_uuid(&self) -> &str {
        &self.user_uuid
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Seed the store. Visitors get the server-rendered first page; the
    /// owner gets a fresh fetch so private edits show up immediately.
    #[instrument(skip(self, initial), fields(user = %self.user_uuid))]
    pub async fn initialize(&self, initial: GalleryConnection, authorized: bool) -> bool {
        if !authorized {
            self.store.reset(initial);
            return true;
        }
        let generation = self.store.generation();
        match self.api.fetch_media_page(&self.user_uuid, self.page_size, None).await {
            Ok(conn) => {
                if self.is_closed() || self.store.generation() != generation {
                    debug!("initial gallery fetch discarded");
                    return false;
                }
                info!(edges = conn.edges.len(), "gallery initialized");
                self.store.reset(conn);
                true
            }
            Err(err) => {
                warn!(?err, "initial gallery fetch failed");
                self.notifier.notify(Notice::error(err.to_string()));
                false
            }
        }
    }

    /// Load the page after the store's last cursor.
    #[instrument(skip(self), fields(user = %self.user_uuid))]
    pub async fn fetch_more(&self) -> FetchOutcome {
        if self.is_closed() {
            return FetchOutcome::Discarded;
        }
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("fetch already in flight");
            return FetchOutcome::Busy;
        };
        if !self.store.has_next_page() {
            return FetchOutcome::Exhausted;
        }

        let generation = self.store.generation();
        let after = self.store.end_cursor();
        let res = self
            .api
            .fetch_media_page(&self.user_uuid, self.page_size, after.as_deref())
            .await;

        match res {
            Ok(page) => {
                if self.is_closed() {
                    debug!("session closed; dropping fetched page");
                    return FetchOutcome::Discarded;
                }
                match self.store.append_if_current(generation, page) {
                    Some(added) => FetchOutcome::Appended(added),
                    None => {
                        debug!("gallery reset during fetch; dropping page");
                        FetchOutcome::Discarded
                    }
                }
            }
            Err(err) => {
                warn!(?err, after = ?after, "next gallery page failed");
                self.notifier.notify(Notice::error(err.to_string()));
                FetchOutcome::Failed
            }
        }
    }

    /// View switched to another profile. The previous user's edges and
    /// cursor chain are dropped before anything is fetched.
    pub async fn switch_user(
        &mut self,
        user_uuid: impl Into<String>,
        initial: GalleryConnection,
        authorized: bool,
    ) -> bool {
        self.user_uuid = user_uuid.into();
        self.store.reset(GalleryConnection::default());
        self.closed.store(false, Ordering::Release);
        self.initialize(initial, authorized).await
    }

    /// The view unmounted. Late results are dropped from now on.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Empty upload slots to render for the owner.
    pub fn upload_placeholders(&self, authorized: bool) -> usize {
        if !authorized {
            return 0;
        }
        MIN_PROFILE_PHOTOS.saturating_sub(self.store.len())
    }
}
