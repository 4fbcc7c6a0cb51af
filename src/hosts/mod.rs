use std::{fmt::Display, sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::downloader::identifier::PlaylistRef;

pub mod youtube;

/// Largest page the catalog API hands out per request.
pub const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMetadata {
    pub id: PlaylistRef,
    pub title: Arc<str>,
}

/// Outcome of looking a playlist up by id.
///
/// Callers that only care about "is this a usable playlist" go through
/// [`PlaylistLookup::title`], which treats both failure cases the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistLookup {
    Found(Arc<str>),
    NotFound,
    AuthFailure(Arc<str>),
}

impl PlaylistLookup {
    pub fn title(self) -> Option<Arc<str>> {
        match self {
            Self::Found(title) => Some(title),
            Self::NotFound | Self::AuthFailure(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub video_id: Arc<str>,
    pub title: Option<Arc<str>>,
}

impl PlaylistEntry {
    pub fn new(video_id: impl Into<Arc<str>>, title: Option<&str>) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.map(Into::into),
        }
    }

    pub fn watch_url(&self) -> String {
        youtube::watch_url(&self.video_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistEntry>,
    pub next_cursor: Option<Arc<str>>,
}

/// Where the bytes of a resolved stream come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    /// A direct media URL plus the request headers the host expects for it.
    Remote {
        url: Arc<str>,
        headers: Vec<(Arc<str>, Arc<str>)>,
    },
    Buffered(Bytes),
}

impl ByteSource {
    pub fn remote(url: impl Into<Arc<str>>) -> Self {
        Self::Remote {
            url: url.into(),
            headers: Vec::new(),
        }
    }
}

/// Transfers stream bytes.
///
/// There is no deadline for the whole transfer, only for connecting and for
/// the gap between two received chunks, so long videos on a slow link still
/// finish while a stalled one fails after `idle_timeout`.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    idle_timeout: Duration,
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_IDLE_TIMEOUT)
    }
}

impl MediaFetcher {
    pub fn new(client: reqwest::Client, idle_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
        }
    }

    pub async fn fetch(&self, source: &ByteSource) -> anyhow::Result<Bytes> {
        let (url, headers) = match source {
            ByteSource::Buffered(bytes) => return Ok(bytes.clone()),
            ByteSource::Remote { url, headers } => (url, headers),
        };

        let mut req = self.client.get(url.as_ref());
        for (name, value) in headers {
            req = req.header(name.as_ref(), value.as_ref());
        }

        let mut resp = tokio::time::timeout(self.idle_timeout, req.send())
            .await
            .map_err(|_| anyhow!("no response from {url} within {:?}", self.idle_timeout))??
            .error_for_status()?;

        let mut body = BytesMut::new();
        loop {
            let chunk = tokio::time::timeout(self.idle_timeout, resp.chunk())
                .await
                .map_err(|_| {
                    anyhow!(
                        "transfer from {url} stalled for {:?} after {} bytes",
                        self.idle_timeout,
                        body.len()
                    )
                })??;

            let Some(chunk) = chunk else {
                break;
            };
            body.extend_from_slice(&chunk);
        }

        Ok(body.freeze())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub title: Arc<str>,
    pub subtype: Arc<str>,
    pub source: ByteSource,
}

/// Per-video failure, the item is skipped and the rest of the playlist continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "details", rename_all = "camelCase")]
pub enum ResolveError {
    AgeRestricted,
    NoStream,
    Other(Arc<str>),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AgeRestricted => write!(f, "video is age restricted"),
            Self::NoStream => write!(f, "no downloadable stream found"),
            Self::Other(details) => write!(f, "{details}"),
        }
    }
}

impl std::error::Error for ResolveError {}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn lookup_name(&self, id: &PlaylistRef) -> anyhow::Result<PlaylistLookup>;

    async fn fetch_page(
        &self,
        id: &PlaylistRef,
        cursor: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<PlaylistPage>;
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Picks the highest resolution progressive stream of the video at `video_url`.
    async fn resolve(&self, video_url: &str) -> Result<ResolvedStream, ResolveError>;
}
