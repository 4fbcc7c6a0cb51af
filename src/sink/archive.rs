use std::{
    fs::File,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::{
    error::{AppError, AppErrorKind, IntoAppError},
    hosts::{MediaFetcher, PlaylistMetadata, ResolvedStream},
};

use super::{file_name, sanitize, Accepted, Sink, SinkError};

/// Packs every stream into one in-memory zip, one flat entry per item.
///
/// There is no existence check here: two items that sanitize to the same name
/// produce two entries with that name.
pub struct ArchiveSink {
    file_name: String,
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: Vec<String>,
    fetcher: MediaFetcher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub file_name: String,
    pub entries: Vec<String>,
    pub bytes: Vec<u8>,
}

const UNNAMED_PLAYLIST: &str = "playlist";

fn entry_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true)
}

impl ArchiveSink {
    pub fn new(fetcher: MediaFetcher) -> Self {
        Self {
            file_name: archive_name(UNNAMED_PLAYLIST),
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: Vec::new(),
            fetcher,
        }
    }
}

pub fn archive_name(playlist_name: &str) -> String {
    format!("{name}.zip", name = sanitize(playlist_name))
}

#[async_trait]
impl Sink for ArchiveSink {
    type Artifact = ArchiveArtifact;

    async fn open(&mut self, playlist: &PlaylistMetadata) -> Result<(), AppError> {
        self.file_name = archive_name(&playlist.title);
        Ok(())
    }

    async fn accept(&mut self, stream: ResolvedStream) -> Result<Accepted, SinkError> {
        let entry = file_name(&stream.title, &stream.subtype);

        let bytes = self
            .fetcher
            .fetch(&stream.source)
            .await
            .map_err(SinkError::Transfer)?;

        self.writer
            .start_file(entry.as_str(), entry_options())
            .into_app_err(
                "failed to start archive entry",
                AppErrorKind::SinkIo,
                &[&format!("ENTRY: {entry}")],
            )?;

        self.writer.write_all(&bytes).into_app_err(
            "failed to write archive entry",
            AppErrorKind::SinkIo,
            &[&format!("ENTRY: {entry}")],
        )?;

        log::info!("packed '{entry}' ({} bytes) into '{}'", bytes.len(), self.file_name);
        self.entries.push(entry);

        Ok(Accepted::Written)
    }

    async fn finalize(mut self) -> Result<Self::Artifact, AppError> {
        let cursor = self.writer.finish().into_app_err(
            "failed to finish archive",
            AppErrorKind::SinkIo,
            &[&format!("ARCHIVE: {}", self.file_name)],
        )?;

        Ok(ArchiveArtifact {
            file_name: self.file_name,
            entries: self.entries,
            bytes: cursor.into_inner(),
        })
    }
}

/// Packs files that are already on disk into a zip at `dest`, entries named
/// after the files and kept in the given order.
pub async fn pack_files(dest: &Path, files: &[PathBuf]) -> Result<(), AppError> {
    let dest = dest.to_owned();
    let files = files.to_vec();
    let detail = format!("ARCHIVE: {}", dest.display());

    tokio::task::spawn_blocking(move || pack_files_blocking(&dest, &files))
        .await
        .into_app_err("archive task panicked", AppErrorKind::SinkIo, &[&detail])?
        .into_app_err("failed to pack files", AppErrorKind::SinkIo, &[&detail])
}

fn pack_files_blocking(dest: &Path, files: &[PathBuf]) -> anyhow::Result<()> {
    let mut writer = ZipWriter::new(File::create(dest)?);

    for path in files {
        let entry = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        writer.start_file(entry, entry_options())?;
        std::io::copy(&mut File::open(path)?, &mut writer)?;
    }

    writer.finish()?;
    Ok(())
}
