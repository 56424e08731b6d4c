use super::types::AccessTokenResponse;
use crate::config::RedditConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh this long before Reddit says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// App-only OAuth2 (client credentials grant) for the Reddit API.
pub struct RedditAuth {
    client_id: String,
    client_secret: String,
    auth_base: String,
    user_agent: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditAuth {
    pub fn new(client_id: String, client_secret: String, config: &RedditConfig) -> Self {
        Self {
            client_id,
            client_secret,
            auth_base: config.auth_base.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            token: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, exchanging credentials only when the cached one is stale.
    pub async fn bearer(&self, client: &Client) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(ref tok) = *cached {
            if Instant::now() < tok.expires_at {
                return Ok(tok.value.clone());
            }
        }

        let fresh = self.request_token(client).await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(expires_in = fresh.expires_in, "reddit access token refreshed");
        let value = fresh.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    /// Drop the cached token so the next call re-authenticates (e.g. after a 401).
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self, client: &Client) -> Result<AccessTokenResponse> {
        let url = format!("{}/api/v1/access_token", self.auth_base);
        let resp = client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("reddit token request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("reddit token exchange failed ({}): {}", status, body);
        }

        resp.json().await.context("failed to parse reddit token response")
    }
}
