use super::auth::RedditAuth;
use super::types::*;
use super::{FeedSource, PostStream};
use crate::config::RedditConfig;
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;

/// Pagination position within one `fetch_newest` call.
enum Cursor {
    First,
    After(String),
    Exhausted,
}

/// Reads `/r/{subreddit}/new` through the OAuth API, one listing page at a time.
pub struct RedditFeed {
    client: Client,
    auth: RedditAuth,
    api_base: String,
    page_size: u32,
    max_pages: u32,
}

impl RedditFeed {
    pub fn new(auth: RedditAuth, config: &RedditConfig, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build reddit HTTP client")?;
        Ok(Self {
            client,
            auth,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            max_pages: config.max_pages,
        })
    }

    /// Fetch a single listing page. `after` is the fullname cursor from the previous page.
    async fn fetch_page(&self, subreddit: &str, after: Option<&str>) -> Result<RedditListingData> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .with_context(|| format!("invalid reddit api_base: {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("reddit api_base cannot carry a path: {}", self.api_base))?
            .pop_if_empty()
            .extend(["r", subreddit, "new"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &self.page_size.to_string())
                .append_pair("raw_json", "1");
            if let Some(a) = after {
                query.append_pair("after", a);
            }
        }

        let token = self.auth.bearer(&self.client).await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET r/{}/new failed", subreddit))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET r/{}/new failed ({}): {}", subreddit, status, body);
        }

        let listing: RedditListing = resp
            .json()
            .await
            .context("failed to parse reddit listing")?;
        tracing::debug!(
            subreddit,
            count = listing.data.children.len(),
            after = listing.data.after.as_deref().unwrap_or(""),
            "fetched listing page"
        );
        Ok(listing.data)
    }
}

impl FeedSource for RedditFeed {
    fn fetch_newest<'a>(&'a self, subreddit: &'a str) -> PostStream<'a> {
        let pages = stream::try_unfold((Cursor::First, 0u32), move |(cursor, fetched)| async move {
            let after = match cursor {
                Cursor::Exhausted => return Ok(None),
                _ if fetched >= self.max_pages => return Ok(None),
                Cursor::First => None,
                Cursor::After(a) => Some(a),
            };

            let page = self.fetch_page(subreddit, after.as_deref()).await?;
            let next = match page.after {
                Some(a) if !a.is_empty() && !page.children.is_empty() => Cursor::After(a),
                _ => Cursor::Exhausted,
            };

            let posts = page
                .children
                .into_iter()
                .map(|thing| thing.data.into_post())
                .collect::<Vec<Result<Post>>>();
            Ok::<_, anyhow::Error>(Some((stream::iter(posts), (next, fetched + 1))))
        });

        pages.try_flatten().boxed()
    }
}
