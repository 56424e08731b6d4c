pub mod pushbullet;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert. Success means the backend accepted it; no read receipt.
    async fn send(&self, title: &str, url: &str) -> Result<()>;
}

/// Dry-run notifier: prints the alert instead of pushing it anywhere.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, title: &str, url: &str) -> Result<()> {
        tracing::info!(title, url, "dry-run notification");
        println!("title: {}\nurl: {}\n", title, url);
        Ok(())
    }
}
