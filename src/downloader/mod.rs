use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::{AppError, AppErrorKind, IntoAppError},
    hosts::{
        MediaResolver, MetadataProvider, PlaylistEntry, PlaylistLookup, PlaylistMetadata,
        ResolveError,
    },
    sink::{Sink, SinkError},
};

use self::identifier::PlaylistRef;

pub mod identifier;
pub mod pagination;

const INVALID_PLAYLIST_MSG: &str = "Invalid URL";

/// Drives one playlist from lookup to a finished sink artifact.
///
/// Items are resolved and handed to the sink strictly one after another, in
/// the order the provider enumerated them.
pub struct PlaylistDownloader {
    provider: Arc<dyn MetadataProvider>,
    resolver: Arc<dyn MediaResolver>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    pub url: Arc<str>,
    pub reason: ResolveError,
}

#[derive(Debug)]
pub struct DownloadReport<A> {
    pub playlist: PlaylistMetadata,
    pub artifact: A,
    /// Items whose stream resolved and reached the sink, including ones the
    /// sink already had.
    pub resolved: usize,
    pub skipped: Vec<SkippedItem>,
}

impl<A> DownloadReport<A> {
    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPreview {
    pub playlist: PlaylistMetadata,
    pub entries: Vec<PlaylistEntry>,
}

impl PlaylistDownloader {
    pub fn new(provider: Arc<dyn MetadataProvider>, resolver: Arc<dyn MediaResolver>) -> Self {
        Self { provider, resolver }
    }

    /// Fails with [`AppErrorKind::InvalidPlaylist`] when the playlist does not
    /// exist or the provider credential is unusable.
    pub async fn playlist_metadata(&self, id: &PlaylistRef) -> Result<PlaylistMetadata, AppError> {
        let lookup = self.provider.lookup_name(id).await.into_app_err(
            "failed to look up playlist",
            AppErrorKind::Api,
            &[&format!("PLAYLIST: {id}")],
        )?;

        match lookup {
            PlaylistLookup::Found(title) => Ok(PlaylistMetadata {
                id: id.clone(),
                title,
            }),
            PlaylistLookup::NotFound => Err(AppError::new(
                AppErrorKind::InvalidPlaylist,
                INVALID_PLAYLIST_MSG,
                &[&format!("PLAYLIST: {id}"), "CAUSE: provider has no such playlist"],
            )),
            PlaylistLookup::AuthFailure(details) => Err(AppError::new(
                AppErrorKind::InvalidPlaylist,
                INVALID_PLAYLIST_MSG,
                &[
                    &format!("PLAYLIST: {id}"),
                    "CAUSE: provider credential rejected",
                    &details,
                ],
            )),
        }
    }

    pub async fn entries(&self, id: &PlaylistRef) -> Result<Vec<PlaylistEntry>, AppError> {
        pagination::enumerate(self.provider.as_ref(), id)
            .await
            .into_app_err(
                "failed to list playlist videos",
                AppErrorKind::Api,
                &[&format!("PLAYLIST: {id}")],
            )
    }

    pub async fn preview(&self, id: &PlaylistRef) -> Result<PlaylistPreview, AppError> {
        let playlist = self.playlist_metadata(id).await?;
        let entries = self.entries(id).await?;

        Ok(PlaylistPreview { playlist, entries })
    }

    pub async fn run<S: Sink>(
        &self,
        id: &PlaylistRef,
        mut sink: S,
    ) -> Result<DownloadReport<S::Artifact>, AppError> {
        let playlist = self.playlist_metadata(id).await?;
        let entries = self.entries(id).await?;

        log::info!(
            "downloading {} videos of playlist '{}' ({id})",
            entries.len(),
            playlist.title
        );

        sink.open(&playlist).await?;

        let mut resolved = 0;
        let mut skipped = Vec::new();

        for entry in &entries {
            let url = entry.watch_url();

            let stream = match self.resolver.resolve(&url).await {
                Ok(stream) => stream,
                Err(reason) => {
                    log::warn!("skipping {url}, REASON: {reason}");
                    skipped.push(SkippedItem {
                        url: url.into(),
                        reason,
                    });
                    continue;
                }
            };

            match sink.accept(stream).await {
                Ok(_) => resolved += 1,
                Err(SinkError::Transfer(err)) => {
                    let reason = ResolveError::Other(format!("failed to transfer stream: {err}").into());
                    log::warn!("skipping {url}, REASON: {reason}");
                    skipped.push(SkippedItem {
                        url: url.into(),
                        reason,
                    });
                }
                Err(SinkError::Io(err)) => return Err(err),
            }
        }

        if resolved == 0 {
            return Err(AppError::new(
                AppErrorKind::NoVideosDownloaded,
                "No videos could be downloaded",
                &[
                    &format!("PLAYLIST: {id}"),
                    &format!("ENTRIES: {}", entries.len()),
                    &format!("SKIPPED: {}", skipped.len()),
                ],
            ));
        }

        let artifact = sink.finalize().await?;

        log::info!(
            "finished playlist '{}' ({id}): {resolved} resolved, {} skipped",
            playlist.title,
            skipped.len()
        );

        Ok(DownloadReport {
            playlist,
            artifact,
            resolved,
            skipped,
        })
    }
}
