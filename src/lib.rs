use std::path::{Path, PathBuf};

use downloader::PlaylistDownloader;
use hosts::MediaFetcher;

pub mod config;
pub mod downloader;
pub mod error;
pub mod hosts;
pub mod path;
pub mod rest_api;
pub mod sink;

#[cfg(test)]
pub mod tests_utils;

pub struct AppData {
    downloader: PlaylistDownloader,
    fetcher: MediaFetcher,
    download_dir: PathBuf,
}

impl AppData {
    pub fn new(downloader: PlaylistDownloader, fetcher: MediaFetcher, download_dir: PathBuf) -> Self {
        Self {
            downloader,
            fetcher,
            download_dir,
        }
    }

    pub fn downloader(&self) -> &PlaylistDownloader {
        &self.downloader
    }

    pub fn fetcher(&self) -> &MediaFetcher {
        &self.fetcher
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}
