use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use actix_web::{
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    HttpResponse,
};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, Stream};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::{
    downloader::{identifier::PlaylistRef, PlaylistDownloader, SkippedItem},
    error::{AppError, AppErrorKind, IntoAppError},
    hosts::MediaFetcher,
    path::{new_scratch_dir, scratch_archive_path},
    sink::{
        archive::{archive_name, pack_files, ArchiveSink},
        filesystem::{DirLayout, FilesystemSink},
    },
};

const CHUNK_SIZE: usize = 64 * 1024;
const ZIP_CONTENT_TYPE: &str = "application/zip";

/// How the downloaded playlist reaches the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Kept on the server under the shared download root.
    #[default]
    Library,
    /// Zipped in memory and sent back.
    Archive,
    /// Written to a scratch directory, sent back, then removed.
    Bundle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LibraryResponse {
    status: &'static str,
    files: Vec<PathBuf>,
    skipped: Vec<SkippedItem>,
}

/// Removes everything a bundle request put on disk when dropped.
#[derive(Debug)]
pub struct ScratchGuard {
    dir: PathBuf,
    files: Vec<PathBuf>,
    archive: Option<PathBuf>,
}

impl ScratchGuard {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Vec::new(),
            archive: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        for file in self.files.iter().chain(self.archive.iter()) {
            remove_quietly(file, std::fs::remove_file(file));
        }

        remove_quietly(&self.dir, std::fs::remove_dir_all(&self.dir));
    }
}

fn remove_quietly(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => log::debug!("removed scratch path '{}'", path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => log::warn!("failed to remove scratch path '{}', ERROR: {err}", path.display()),
    }
}

fn attachment(file_name: String) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file_name)],
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("3gp") => "video/3gpp",
        Some("zip") => ZIP_CONTENT_TYPE,
        _ => "application/octet-stream",
    }
}

/// Streams `path` in chunks, the guard is dropped once the stream ends or is
/// dropped itself.
pub async fn guarded_file_body(
    path: PathBuf,
    guard: ScratchGuard,
) -> Result<impl Stream<Item = std::io::Result<Bytes>>, AppError> {
    let file = tokio::fs::File::open(&path).await.into_app_err(
        "failed to open download for sending",
        AppErrorKind::SinkIo,
        &[&format!("PATH: {}", path.display())],
    )?;

    Ok(stream::unfold(Some((file, guard)), |state| async move {
        let (mut file, guard) = state?;
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);

        match file.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), Some((file, guard)))),
            Err(err) => Some((Err(err), None)),
        }
    }))
}

pub async fn deliver_library(
    downloader: &PlaylistDownloader,
    id: &PlaylistRef,
    download_dir: &Path,
    fetcher: MediaFetcher,
) -> Result<HttpResponse, AppError> {
    let sink = FilesystemSink::new(download_dir, DirLayout::PerPlaylist, fetcher);
    let report = downloader.run(id, sink).await?;

    Ok(HttpResponse::Ok().json(LibraryResponse {
        status: "success",
        files: report.artifact,
        skipped: report.skipped,
    }))
}

pub async fn deliver_archive(
    downloader: &PlaylistDownloader,
    id: &PlaylistRef,
    fetcher: MediaFetcher,
) -> Result<HttpResponse, AppError> {
    let report = downloader.run(id, ArchiveSink::new(fetcher)).await?;
    let archive = report.artifact;

    Ok(HttpResponse::Ok()
        .content_type(ZIP_CONTENT_TYPE)
        .insert_header(attachment(archive.file_name))
        .body(archive.bytes))
}

pub async fn deliver_bundle(
    downloader: &PlaylistDownloader,
    id: &PlaylistRef,
    download_dir: &Path,
    fetcher: MediaFetcher,
) -> Result<HttpResponse, AppError> {
    let mut guard = ScratchGuard::new(new_scratch_dir(download_dir));

    let sink = FilesystemSink::new(guard.dir(), DirLayout::Flat, fetcher);
    let report = downloader.run(id, sink).await?;
    guard.files = report.artifact.clone();

    let (path, file_name) = match report.artifact.as_slice() {
        [single] => (
            single.clone(),
            single
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| archive_name(&report.playlist.title)),
        ),
        files => {
            let archive = scratch_archive_path(guard.dir());
            guard.archive = Some(archive.clone());
            pack_files(&archive, files).await?;

            (archive, archive_name(&report.playlist.title))
        }
    };

    let content_type = content_type_for(&path);
    let body = guarded_file_body(path, guard).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(attachment(file_name))
        .streaming(body))
}
