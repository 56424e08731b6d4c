use super::filter::PostFilter;
use crate::feed::types::Post;
use crate::feed::FeedSource;
use crate::notify::Notifier;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("feed unavailable: {0:#}")]
    FeedUnavailable(#[source] anyhow::Error),
    /// `delivered` posts from the same call went out before this one failed.
    #[error("notification failed for {title:?} after {delivered} delivered: {source:#}")]
    NotificationFailed {
        title: String,
        delivered: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// Watermark bookkeeping. The watermark only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerState {
    watermark: DateTime<Utc>,
    initialized: bool,
}

impl Default for ScannerState {
    fn default() -> Self {
        Self {
            watermark: DateTime::<Utc>::UNIX_EPOCH,
            initialized: false,
        }
    }
}

impl ScannerState {
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn advance(&mut self, to: DateTime<Utc>) {
        self.watermark = self.watermark.max(to);
        self.initialized = true;
    }
}

/// Incremental new-post scanner for a single source.
///
/// Each [`Scanner::scan`] reads the feed newest-first, picks the posts that are
/// both newer than the watermark and accepted by the filter, and notifies them
/// oldest-first. The very first successful scan only notifies the most recent
/// matching post and uses it to seed the watermark.
///
/// Delivery is fail-stop per post: a notifier error ends the call, and the
/// watermark reflects exactly the posts that were delivered before it. The
/// failed post stays above the watermark and is retried on the next call.
pub struct Scanner {
    source: String,
    filter: PostFilter,
    feed: Box<dyn FeedSource>,
    notifier: Box<dyn Notifier>,
    state: ScannerState,
}

impl Scanner {
    pub fn new(
        source: impl Into<String>,
        filter: PostFilter,
        feed: Box<dyn FeedSource>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            source: source.into(),
            filter,
            feed,
            notifier,
            state: ScannerState::default(),
        }
    }

    /// Start already initialized at `watermark`, skipping the seeding scan.
    /// Test seam for driving the initialized path directly; the binary never calls it.
    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.state.advance(watermark);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.state.watermark()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub async fn scan(&mut self) -> Result<Vec<Post>, ScanError> {
        let pending = if self.state.initialized {
            self.collect_since_watermark().await?
        } else {
            self.find_seed().await?.into_iter().collect()
        };

        if pending.is_empty() && !self.state.initialized {
            tracing::warn!(source = %self.source, "no matching post found to seed the watermark");
        }

        let mut delivered = Vec::with_capacity(pending.len());
        for post in pending {
            if let Err(source) = self.notifier.send(&post.title, &post.url).await {
                return Err(ScanError::NotificationFailed {
                    title: post.title,
                    delivered: delivered.len(),
                    source,
                });
            }
            let seeding = !self.state.initialized;
            self.state.advance(post.created_at);
            if seeding {
                tracing::info!(source = %self.source, watermark = %self.state.watermark, "watermark initialized");
            }
            tracing::info!(title = %post.title, url = %post.url, "notified");
            delivered.push(post);
        }

        Ok(delivered)
    }

    /// Newest matching post on the feed, if any. Stops reading at the first hit.
    async fn find_seed(&self) -> Result<Option<Post>, ScanError> {
        let mut posts = self.feed.fetch_newest(&self.source);
        while let Some(post) = posts.try_next().await.map_err(ScanError::FeedUnavailable)? {
            if self.filter.matches(&post.title, post.flair.as_deref()) {
                return Ok(Some(post));
            }
        }
        Ok(None)
    }

    /// Matching posts strictly newer than the watermark, oldest first.
    /// Relies on the feed being newest-first and stops at the first post at or
    /// below the watermark.
    async fn collect_since_watermark(&self) -> Result<Vec<Post>, ScanError> {
        let watermark = self.state.watermark;
        let mut fresh = Vec::new();
        let mut posts = self.feed.fetch_newest(&self.source);
        while let Some(post) = posts.try_next().await.map_err(ScanError::FeedUnavailable)? {
            if post.created_at <= watermark {
                break;
            }
            if self.filter.matches(&post.title, post.flair.as_deref()) {
                fresh.push(post);
            }
        }
        fresh.reverse();
        Ok(fresh)
    }
}
