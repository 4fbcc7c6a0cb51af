use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    error::{AppError, AppErrorKind, IntoAppError},
    hosts::{MediaFetcher, PlaylistMetadata, ResolvedStream},
    path::playlist_dir,
};

use super::{file_name, Accepted, Sink, SinkError};

const PARTIAL_SUFFIX: &str = "part";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLayout {
    /// `<root>/<file>`
    Flat,
    /// `<root>/<sanitized playlist name>/<file>`
    PerPlaylist,
}

/// Writes every stream to `<dir>/<sanitized title>.<subtype>`.
///
/// Files that already exist are left alone and the item is not reported again,
/// so re-running a playlist only fetches what is missing.
pub struct FilesystemSink {
    root: PathBuf,
    layout: DirLayout,
    dir: PathBuf,
    fetcher: MediaFetcher,
    written: Vec<PathBuf>,
}

impl FilesystemSink {
    pub fn new(root: impl Into<PathBuf>, layout: DirLayout, fetcher: MediaFetcher) -> Self {
        let root = root.into();

        Self {
            dir: root.clone(),
            root,
            layout,
            fetcher,
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Sink for FilesystemSink {
    type Artifact = Vec<PathBuf>;

    async fn open(&mut self, playlist: &PlaylistMetadata) -> Result<(), AppError> {
        self.dir = match self.layout {
            DirLayout::Flat => self.root.clone(),
            DirLayout::PerPlaylist => playlist_dir(&self.root, playlist),
        };

        tokio::fs::create_dir_all(&self.dir).await.into_app_err(
            "failed to create download directory",
            AppErrorKind::SinkIo,
            &[&format!("PATH: {}", self.dir.display())],
        )
    }

    async fn accept(&mut self, stream: ResolvedStream) -> Result<Accepted, SinkError> {
        let path = self.dir.join(file_name(&stream.title, &stream.subtype));
        let path_detail = format!("PATH: {}", path.display());

        let exists = tokio::fs::try_exists(&path).await.into_app_err(
            "failed to check for existing download",
            AppErrorKind::SinkIo,
            &[&path_detail],
        )?;

        if exists {
            log::info!("'{}' already downloaded, skipping", path.display());
            return Ok(Accepted::AlreadyPresent);
        }

        let bytes = self
            .fetcher
            .fetch(&stream.source)
            .await
            .map_err(SinkError::Transfer)?;

        // a crash mid-write must not leave something that looks like a finished download
        let partial = path.with_file_name(format!(
            "{}.{PARTIAL_SUFFIX}",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));

        tokio::fs::write(&partial, &bytes).await.into_app_err(
            "failed to write video",
            AppErrorKind::SinkIo,
            &[&path_detail],
        )?;

        tokio::fs::rename(&partial, &path).await.into_app_err(
            "failed to move finished video into place",
            AppErrorKind::SinkIo,
            &[&path_detail],
        )?;

        log::info!("downloaded '{}' ({} bytes)", path.display(), bytes.len());
        self.written.push(path);

        Ok(Accepted::Written)
    }

    async fn finalize(self) -> Result<Self::Artifact, AppError> {
        Ok(self.written)
    }
}
