use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use crate::{
    downloader::PlaylistDownloader,
    error::{AppError, AppErrorKind, IntoAppError},
    hosts::{
        youtube::{playlist::YoutubeDataApi, video::YtDlpResolver, RetryPolicy},
        MediaFetcher,
    },
};

const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<Arc<str>>,
    pub download_dir: PathBuf,
    pub address: String,
    pub port: u16,
    pub ytdlp_bin: Arc<str>,
    pub request_timeout: Duration,
    pub request_retries: u32,
}

impl Config {
    /// Reads the process environment, including a `.env` file if one was loaded.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("API_KEY")
            .or_else(|| var("YOUTUBE_API_KEY"))
            .map(Into::into);

        if api_key.is_none() {
            log::warn!("no API_KEY configured, every playlist lookup will be rejected");
        }

        Ok(Self {
            api_key,
            download_dir: var("DOWNLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_owned())
                .into(),
            address: var("API_ADDRESS").unwrap_or_else(|| DEFAULT_ADDRESS.to_owned()),
            port: parse_var("API_PORT", var("API_PORT"), DEFAULT_PORT)?,
            ytdlp_bin: var("YTDLP_BIN")
                .unwrap_or_else(|| DEFAULT_YTDLP_BIN.to_owned())
                .into(),
            request_timeout: Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECS",
                var("REQUEST_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )?),
            request_retries: parse_var("REQUEST_RETRIES", var("REQUEST_RETRIES"), DEFAULT_RETRIES)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.request_retries,
            ..Default::default()
        }
    }

    /// Client for metadata calls, each bounded by `request_timeout` as a whole.
    pub fn api_client(&self) -> Result<reqwest::Client, AppError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .into_app_err(
                "failed to build api client",
                AppErrorKind::Config,
                &[&format!("TIMEOUT: {:?}", self.request_timeout)],
            )
    }

    /// Stream transfers only time out on connecting or on a stall longer than
    /// `request_timeout`, never on total duration.
    pub fn media_fetcher(&self) -> Result<MediaFetcher, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.request_timeout)
            .build()
            .into_app_err(
                "failed to build media client",
                AppErrorKind::Config,
                &[&format!("TIMEOUT: {:?}", self.request_timeout)],
            )?;

        Ok(MediaFetcher::new(client, self.request_timeout))
    }

    /// Wires the YouTube Data API and yt-dlp into a downloader.
    pub fn downloader(&self) -> Result<PlaylistDownloader, AppError> {
        let provider =
            YoutubeDataApi::new(self.api_client()?, self.api_key.clone(), self.retry_policy());
        let resolver = YtDlpResolver::new(Arc::clone(&self.ytdlp_bin), self.request_timeout);

        Ok(PlaylistDownloader::new(Arc::new(provider), Arc::new(resolver)))
    }
}

fn parse_var<T>(key: &str, value: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = value else {
        return Ok(default);
    };

    value.trim().parse().into_app_err(
        "invalid configuration value",
        AppErrorKind::Config,
        &[&format!("VARIABLE: {key}"), &format!("VALUE: {value}")],
    )
}
