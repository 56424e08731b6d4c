use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Normalized post handed to the scanner (provider-agnostic).
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub flair: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Reddit listing envelope: `{ kind: "Listing", data: { after, children } }`
#[derive(Debug, Deserialize)]
pub struct RedditListing {
    pub data: RedditListingData,
}

#[derive(Debug, Deserialize)]
pub struct RedditListingData {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub children: Vec<RedditThing>,
}

#[derive(Debug, Deserialize)]
pub struct RedditThing {
    pub data: RedditSubmission,
}

#[derive(Debug, Deserialize)]
pub struct RedditSubmission {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub link_flair_text: Option<String>,
    pub created_utc: f64,
}

/// OAuth2 token response from `/api/v1/access_token`.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Convert Reddit's float `created_utc` (seconds) to a UTC timestamp, millisecond precision.
pub fn timestamp_from_secs(created_utc: f64) -> Option<DateTime<Utc>> {
    if !created_utc.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((created_utc * 1000.0).round() as i64)
}

impl RedditSubmission {
    /// Self posts carry an empty `url` on some listings; fall back to the permalink.
    pub fn into_post(self) -> Result<Post> {
        let created_at = timestamp_from_secs(self.created_utc).ok_or_else(|| {
            anyhow::anyhow!("invalid created_utc {} on post {:?}", self.created_utc, self.title)
        })?;
        let url = if self.url.is_empty() && !self.permalink.is_empty() {
            format!("https://www.reddit.com{}", self.permalink)
        } else {
            self.url
        };
        Ok(Post {
            title: self.title,
            url,
            flair: self.link_flair_text,
            created_at,
        })
    }
}
