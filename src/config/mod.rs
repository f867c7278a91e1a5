use anyhow::{anyhow, Result};
use std::str::FromStr;
use url::Url;

/// What the binary does once the post is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Show,
    Comment,
    Like,
    Dislike,
    Feed,
    Demo,
}

impl FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "show" => Ok(Self::Show),
            "comment" => Ok(Self::Comment),
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "feed" => Ok(Self::Feed),
            "demo" => Ok(Self::Demo),
            other => Err(anyhow!("unknown APP_MODE: {}", other)),
        }
    }
}

/// Limits applied by a `ThreadStore` before anything reaches the server.
#[derive(Debug, Clone)]
pub struct StoreLimits {
    pub max_content_chars: usize,
    /// Capacity of the change-notification channel.
    pub event_buffer: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_content_chars: 1000,
            event_buffer: 64,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub app_mode: AppMode,
    pub post_id: Option<String>,
    pub viewer_id: String,
    pub comment_author: Option<String>,
    pub comment_body: Option<String>,
    pub request_timeout_seconds: u64,
    pub limits: StoreLimits,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let api_base_url = env_or("API_BASE_URL", "http://localhost:5000");
        let api_base_url = Url::parse(&api_base_url)
            .map_err(|err| anyhow!("invalid API_BASE_URL: {}", err))?;
        let app_mode: AppMode = env_or("APP_MODE", "show").parse()?;

        let post_id = match app_mode {
            AppMode::Feed | AppMode::Demo => std::env::var("POST_ID").ok(),
            _ => Some(env_or_err("POST_ID")?),
        };
        let (comment_author, comment_body) = match app_mode {
            AppMode::Comment => (
                Some(env_or_err("COMMENT_AUTHOR")?),
                Some(env_or_err("COMMENT_BODY")?),
            ),
            _ => (
                std::env::var("COMMENT_AUTHOR").ok(),
                std::env::var("COMMENT_BODY").ok(),
            ),
        };

        Ok(Self {
            api_base_url,
            app_mode,
            post_id,
            viewer_id: env_or("VIEWER_ID", "anonymous"),
            comment_author,
            comment_body,
            request_timeout_seconds: env_or_parse("REQUEST_TIMEOUT_SECONDS", "10")?,
            limits: StoreLimits {
                max_content_chars: env_or_parse("MAX_CONTENT_CHARS", "1000")?,
                event_buffer: env_or_parse("EVENT_BUFFER", "64")?,
            },
        })
    }

    /// Author and body for `APP_MODE=comment`.
    pub fn comment(&self) -> Result<(String, String)> {
        match (&self.comment_author, &self.comment_body) {
            (Some(author), Some(body)) => Ok((author.clone(), body.clone())),
            _ => Err(anyhow!("comment mode needs COMMENT_AUTHOR and COMMENT_BODY")),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
