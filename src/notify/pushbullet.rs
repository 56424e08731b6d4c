use super::Notifier;
use crate::config::PushbulletConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct NotePush<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'a str,
    body: &'a str,
}

/// Sends "note" pushes to every device on a Pushbullet account.
pub struct PushbulletNotifier {
    client: Client,
    access_token: String,
    base_url: String,
}

impl PushbulletNotifier {
    pub fn new(access_token: String, config: &PushbulletConfig, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build pushbullet HTTP client")?;
        Ok(Self {
            client,
            access_token,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Notifier for PushbulletNotifier {
    async fn send(&self, title: &str, url: &str) -> Result<()> {
        let endpoint = format!("{}/v2/pushes", self.base_url);
        let push = NotePush { kind: "note", title, body: url };

        let resp = self
            .client
            .post(&endpoint)
            .header("Access-Token", &self.access_token)
            .json(&push)
            .send()
            .await
            .context("pushbullet request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("pushbullet push failed ({}): {}", status, body);
        }
        Ok(())
    }
}
