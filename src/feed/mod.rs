pub mod auth;
pub mod reddit;
pub mod types;

use anyhow::Result;
use futures_util::stream::BoxStream;
use types::Post;

/// Lazy, newest-first sequence of posts. Dropping it stops any further page fetches.
pub type PostStream<'a> = BoxStream<'a, Result<Post>>;

pub trait FeedSource: Send + Sync {
    /// Start a fresh newest-first read of `source`. No cursor survives between calls.
    fn fetch_newest<'a>(&'a self, source: &'a str) -> PostStream<'a>;
}
