use std::{fmt::Display, sync::Arc, time::Duration};

use anyhow::anyhow;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};

pub mod playlist;
pub mod video;

pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{video_id}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YoutubeSnippet {
    pub title: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// The credential was missing, rejected or out of quota.
    Auth(Arc<str>),
    NotFound(Arc<str>),
    Transport(anyhow::Error),
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth(details) => write!(f, "youtube api rejected the credential: {details}"),
            Self::NotFound(details) => write!(f, "youtube api resource not found: {details}"),
            Self::Transport(err) => write!(f, "youtube api request failed: {err}"),
        }
    }
}

impl std::error::Error for ApiError {}

enum Attempt {
    Done(Result<String, ApiError>),
    Transient(anyhow::Error),
}

/// GETs `url` and returns the response body, retrying connection problems,
/// timeouts, `429` and `5xx` answers with a doubling backoff.
pub async fn get_api_data(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
    policy: RetryPolicy,
) -> Result<String, ApiError> {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        let err = match try_get(client, url, query).await {
            Attempt::Done(result) => return result,
            Attempt::Transient(err) => err,
        };

        if attempt >= policy.retries {
            return Err(ApiError::Transport(err));
        }

        attempt += 1;
        log::warn!(
            "request to {url} failed, retrying in {backoff:?} ({attempt}/{retries}), ERROR: {err}",
            retries = policy.retries
        );

        tokio::time::sleep(backoff).await;
        backoff *= 2;
    }
}

async fn try_get(client: &reqwest::Client, url: &str, query: &[(&str, &str)]) -> Attempt {
    let resp = match client.get(url).query(query).send().await {
        Ok(resp) => resp,
        Err(err) if err.is_timeout() || err.is_connect() => {
            return Attempt::Transient(err.into());
        }
        Err(err) => return Attempt::Done(Err(ApiError::Transport(err.into()))),
    };

    let status = resp.status();
    let text = match resp.text().await {
        Ok(text) => text,
        Err(err) => return Attempt::Transient(err.into()),
    };

    if status.is_success() {
        return Attempt::Done(Ok(text));
    }

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Attempt::Transient(anyhow!("HTTP {status}: {text}"));
    }

    Attempt::Done(Err(classify_failure(status, text)))
}

fn classify_failure(status: StatusCode, text: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth(text.into()),
        StatusCode::BAD_REQUEST if text.contains("API key") || text.contains("keyInvalid") => {
            ApiError::Auth(text.into())
        }
        StatusCode::NOT_FOUND => ApiError::NotFound(text.into()),
        _ => ApiError::Transport(anyhow!("HTTP {status}: {text}")),
    }
}

pub fn parse_api_data<T: DeserializeOwned>(text: &str, url: &str) -> anyhow::Result<T> {
    serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse response from {url}, ERROR: {err}"))
}
