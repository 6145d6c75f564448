//! Page-cache invalidation fan-out.
//!
//! After a tag is added or removed, or a tagged photo is uploaded, every page
//! that may now show stale media is revalidated: the climb page (plus its
//! legacy URL), each ancestor area page, and the home feed. Calls are
//! best-effort and dispatched concurrently; one failure never stops the rest.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Url};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::model::TagTargetKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Climb(String),
    /// Pages-router climb route; still indexed and bookmarked.
    LegacyClimb(String),
    Area(String),
    HomeFeed,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Climb(id) => write!(f, "climbId={}", id),
            CacheKey::LegacyClimb(id) => write!(f, "/climb/{}", id),
            CacheKey::Area(id) => write!(f, "areaId={}", id),
            CacheKey::HomeFeed => f.write_str("home-feed"),
        }
    }
}

#[async_trait]
pub trait InvalidationTransport: Send + Sync {
    async fn invalidate(&self, key: &CacheKey) -> Result<()>;
}

/// Calls the site's revalidation endpoints.
#[derive(Clone)]
pub struct HttpInvalidator {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for HttpInvalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpInvalidator")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpInvalidator {
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn endpoint(&self, key: &CacheKey) -> Result<Url> {
        let (path, query) = match key {
            CacheKey::Climb(id) => ("api/invalidateClimbPageCache", Some(("uuid", id.as_str()))),
            CacheKey::LegacyClimb(id) => ("api/legacyInvalidateClimbCache", Some(("c", id.as_str()))),
            CacheKey::Area(id) => ("api/invalidateAreaPageCache", Some(("uuid", id.as_str()))),
            CacheKey::HomeFeed => ("api/invalidateHomePageCache", None),
        };
        let mut url = self
            .base_url
            .join(path)
            .context("invalid site base URL")?;
        if let Some((name, value)) = query {
            url.query_pairs_mut().append_pair(name, value);
        }
        Ok(url)
    }
}

#[async_trait]
impl InvalidationTransport for HttpInvalidator {
    async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let url = self.endpoint(key)?;
        debug!(%url, %key, "revalidating page cache");
        let res = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to reach revalidation endpoint for {}", key))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("revalidation of {} failed {}: {}", key, status, body));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub attempted: Vec<CacheKey>,
    pub failed: Vec<CacheKey>,
}

impl InvalidationReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct CacheInvalidationFanout {
    transport: Arc<dyn InvalidationTransport>,
}

impl fmt::Debug for CacheInvalidationFanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheInvalidationFanout").finish_non_exhaustive()
    }
}

impl CacheInvalidationFanout {
    pub fn new(transport: Arc<dyn InvalidationTransport>) -> Self {
        Self { transport }
    }

    /// Every page key made stale by a media change on `entity_id`.
    pub fn keys_for(entity_id: &str, kind: TagTargetKind, ancestor_ids: &[String]) -> Vec<CacheKey> {
        let mut keys = Vec::with_capacity(ancestor_ids.len() + 3);
        if kind == TagTargetKind::Climb {
            keys.push(CacheKey::Climb(entity_id.to_string()));
            keys.push(CacheKey::LegacyClimb(entity_id.to_string()));
        }
        keys.extend(ancestor_ids.iter().cloned().map(CacheKey::Area));
        keys.push(CacheKey::HomeFeed);
        keys
    }

    #[instrument(skip(self, ancestor_ids), fields(ancestors = ancestor_ids.len()))]
    pub async fn invalidate(
        &self,
        entity_id: &str,
        kind: TagTargetKind,
        ancestor_ids: &[String],
    ) -> InvalidationReport {
        let keys = Self::keys_for(entity_id, kind, ancestor_ids);
        let results = join_all(keys.iter().map(|key| self.transport.invalidate(key))).await;

        let mut report = InvalidationReport::default();
        for (key, res) in keys.into_iter().zip(results) {
            if let Err(err) = res {
                warn!(?err, %key, "page cache invalidation failed");
                report.failed.push(key.clone());
            }
            report.attempted.push(key);
        }
        debug!(
            attempted = report.attempted.len(),
            failed = report.failed.len(),
            "page cache fan-out done"
        );
        report
    }
}
