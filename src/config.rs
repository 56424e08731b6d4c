use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub subreddit: String,
    pub filter: FilterConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub pushbullet: PushbulletConfig,
}

/// Matching criteria. `regex` and `flairs` are ignored when empty.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    pub terms: Vec<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub flairs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_interval_s() -> u64 { 600 }
fn default_request_timeout_ms() -> u64 { 10_000 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_s: default_interval_s(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedditConfig {
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Listing page size; Reddit caps this at 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_auth_base() -> String { "https://www.reddit.com".to_string() }
fn default_api_base() -> String { "https://oauth.reddit.com".to_string() }
fn default_user_agent() -> String {
    concat!("subreddit-alert/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_page_size() -> u32 { 100 }
fn default_max_pages() -> u32 { 10 }

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            auth_base: default_auth_base(),
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PushbulletConfig {
    #[serde(default = "default_pushbullet_base")]
    pub api_base: String,
}

fn default_pushbullet_base() -> String { "https://api.pushbullet.com".to_string() }

impl Default for PushbulletConfig {
    fn default() -> Self {
        Self { api_base: default_pushbullet_base() }
    }
}

/// API credentials, collected once at startup and handed to the clients that need them.
#[derive(Clone)]
pub struct Credentials {
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub pushbullet_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("reddit_client_id", &self.reddit_client_id)
            .field("reddit_client_secret", &"<redacted>")
            .field("pushbullet_token", &self.pushbullet_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subreddit.trim().is_empty() {
            anyhow::bail!("subreddit cannot be empty");
        }
        // Names are [A-Za-z0-9_]; '+' joins several into one multireddit listing.
        if !self
            .subreddit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+')
        {
            anyhow::bail!("subreddit {:?} contains characters Reddit does not allow", self.subreddit);
        }
        if self.poll.interval_s == 0 {
            anyhow::bail!("poll.interval_s must be greater than zero");
        }
        if !(1..=100).contains(&self.reddit.page_size) {
            anyhow::bail!("reddit.page_size must be between 1 and 100 (got {})", self.reddit.page_size);
        }
        if self.reddit.max_pages == 0 {
            anyhow::bail!("reddit.max_pages must be greater than zero");
        }
        Ok(())
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        for (key, value) in parse_env_lines(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }

    /// Credentials come from environment variables, or are prompted at startup.
    /// Prompted values are saved to .env for future runs. The Pushbullet token is
    /// skipped entirely in dry-run mode.
    pub fn credentials(need_pushbullet: bool) -> Result<Credentials> {
        let reddit_client_id = env_or_prompt("REDDIT_CLIENT_ID", "Reddit client id")?;
        let reddit_client_secret = env_or_prompt("REDDIT_CLIENT_SECRET", "Reddit client secret")?;
        let pushbullet_token = if need_pushbullet {
            Some(env_or_prompt("PUSHBULLET_ACCESS_TOKEN", "Pushbullet access token")?)
        } else {
            None
        };
        Ok(Credentials {
            reddit_client_id,
            reddit_client_secret,
            pushbullet_token,
        })
    }
}

fn env_or_prompt(var: &str, label: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !sanitize_key(&value).is_empty() => Ok(sanitize_key(&value)),
        _ => {
            let value = prompt(label)?;
            save_env_var(var, &value);
            Ok(value)
        }
    }
}

/// KEY=VALUE pairs from a dotenv file; comments, blanks and BOM are skipped.
fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    // Strip BOM if present (common on Windows-created files)
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .lines()
        .map(|line| line.trim().trim_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = sanitize_key(&input);
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Append a KEY=VALUE line to .env and set it in the current process.
fn save_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let path = Path::new(ENV_FILE);
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    if let Err(e) = std::fs::write(path, contents) {
        tracing::warn!(error = %e, "could not persist {} to .env", key);
    }
}
