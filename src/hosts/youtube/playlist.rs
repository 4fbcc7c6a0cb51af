use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    downloader::identifier::PlaylistRef,
    hosts::{MetadataProvider, PlaylistEntry, PlaylistLookup, PlaylistPage},
};

use super::{get_api_data, parse_api_data, ApiError, RetryPolicy, YoutubeSnippet, API_BASE_URL};

/// Playlist metadata from the YouTube Data API v3.
pub struct YoutubeDataApi {
    client: reqwest::Client,
    api_key: Option<Arc<str>>,
    base_url: Arc<str>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubePlaylists {
    #[serde(default)]
    items: Vec<YoutubePlaylist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubePlaylist {
    snippet: YoutubeSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubePlaylistItems {
    #[serde(default)]
    items: Vec<YoutubePlaylistItem>,
    next_page_token: Option<Arc<str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubePlaylistItem {
    snippet: Option<YoutubePlaylistItemSnippet>,
    content_details: YoutubePlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubePlaylistItemSnippet {
    title: Option<Arc<str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubePlaylistItemContentDetails {
    video_id: Arc<str>,
}

impl YoutubeDataApi {
    pub fn new(client: reqwest::Client, api_key: Option<Arc<str>>, retry: RetryPolicy) -> Self {
        Self {
            client,
            api_key,
            base_url: API_BASE_URL.into(),
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<Arc<str>>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl MetadataProvider for YoutubeDataApi {
    async fn lookup_name(&self, id: &PlaylistRef) -> anyhow::Result<PlaylistLookup> {
        let Some(api_key) = self.api_key.as_deref() else {
            log::warn!("no youtube api key configured, cannot look up playlist {id}");
            return Ok(PlaylistLookup::AuthFailure("no api key configured".into()));
        };

        let api_url = format!("{base}/playlists", base = self.base_url);
        let query = [("part", "snippet"), ("id", id.as_str()), ("key", api_key)];

        match get_api_data(&self.client, &api_url, &query, self.retry).await {
            Ok(text) => parse_playlist_lookup(&text, &api_url),
            Err(ApiError::Auth(details)) => {
                log::warn!("youtube api credential rejected while looking up {id}: {details}");
                Ok(PlaylistLookup::AuthFailure(details))
            }
            Err(ApiError::NotFound(_)) => Ok(PlaylistLookup::NotFound),
            Err(err @ ApiError::Transport(_)) => Err(err.into()),
        }
    }

    async fn fetch_page(
        &self,
        id: &PlaylistRef,
        cursor: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<PlaylistPage> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no youtube api key configured"))?;

        let api_url = format!("{base}/playlistItems", base = self.base_url);
        let page_size = page_size.to_string();

        let mut query = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", id.as_str()),
            ("maxResults", page_size.as_str()),
            ("key", api_key),
        ];
        if let Some(cursor) = cursor {
            query.push(("pageToken", cursor));
        }

        let text = get_api_data(&self.client, &api_url, &query, self.retry).await?;
        parse_playlist_page(&text, &api_url)
    }
}

fn parse_playlist_lookup(text: &str, api_url: &str) -> anyhow::Result<PlaylistLookup> {
    let playlists: YoutubePlaylists = parse_api_data(text, api_url)?;

    Ok(match playlists.items.into_iter().next() {
        Some(playlist) => PlaylistLookup::Found(playlist.snippet.title),
        None => PlaylistLookup::NotFound,
    })
}

fn parse_playlist_page(text: &str, api_url: &str) -> anyhow::Result<PlaylistPage> {
    let page: YoutubePlaylistItems = parse_api_data(text, api_url)?;

    Ok(PlaylistPage {
        items: page
            .items
            .into_iter()
            .map(|item| PlaylistEntry {
                video_id: item.content_details.video_id,
                title: item.snippet.and_then(|snippet| snippet.title),
            })
            .collect(),
        // an empty token means the same thing as a missing one
        next_cursor: page.next_page_token.filter(|token| !token.is_empty()),
    })
}
