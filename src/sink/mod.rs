use async_trait::async_trait;

use crate::{
    error::AppError,
    hosts::{PlaylistMetadata, ResolvedStream},
};

pub mod archive;
pub mod filesystem;

/// Characters that are not allowed in file names on at least one major platform.
pub const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub fn sanitize(title: &str) -> String {
    title
        .chars()
        .filter(|c| !RESERVED_CHARS.contains(c))
        .collect()
}

pub fn file_name(title: &str, subtype: &str) -> String {
    format!("{title}.{subtype}", title = sanitize(title))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Written,
    /// A file with the same name already exists, nothing was transferred.
    AlreadyPresent,
}

#[derive(Debug)]
pub enum SinkError {
    /// The stream bytes could not be fetched, only this item is affected.
    Transfer(anyhow::Error),
    Io(AppError),
}

impl From<AppError> for SinkError {
    fn from(value: AppError) -> Self {
        Self::Io(value)
    }
}

/// Consumes resolved streams one at a time, in playlist order.
#[async_trait]
pub trait Sink: Send {
    type Artifact: Send;

    /// Called once the playlist is known to exist, before the first item.
    async fn open(&mut self, playlist: &PlaylistMetadata) -> Result<(), AppError>;

    async fn accept(&mut self, stream: ResolvedStream) -> Result<Accepted, SinkError>;

    async fn finalize(self) -> Result<Self::Artifact, AppError>;
}
