use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use playlist_downloader::{
    config::Config,
    downloader::{identifier::extract_playlist_ref, DownloadReport, PlaylistDownloader},
    error::{AppError, AppErrorKind, IntoAppError},
    hosts::MediaFetcher,
    rest_api,
    sink::{
        archive::ArchiveSink,
        filesystem::{DirLayout, FilesystemSink},
    },
    AppData,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub action: Option<Action>,
    #[arg(short, long)]
    /// IP address to bind to, overrides API_ADDRESS
    pub addr: Option<String>,
    #[arg(short, long)]
    /// Port to bind to, overrides API_PORT
    pub port: Option<u16>,
    #[arg(short, long)]
    /// Root directory for downloads, overrides DOWNLOAD_DIR
    pub download_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    #[command(about = "Run the HTTP server (default)")]
    Serve,
    #[command(about = "Download a playlist once and exit")]
    Fetch {
        /// Any URL carrying a `list=` parameter
        url: String,
        #[arg(long)]
        /// Write a zip file here instead of into the download directory
        archive: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    if cfg!(not(debug_assertions)) {
        simple_logging::log_to_file("info.log", LevelFilter::Info)?;
    } else {
        simple_logging::log_to_stderr(LevelFilter::Info);
    }

    let args = CliArgs::parse();

    let mut config = Config::from_env()?;
    if let Some(addr) = args.addr {
        config.address = addr;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.download_dir {
        config.download_dir = dir;
    }

    let downloader = config.downloader()?;
    let fetcher = config.media_fetcher()?;

    match args.action.unwrap_or(Action::Serve) {
        Action::Serve => serve(config, downloader, fetcher).await?,
        Action::Fetch { url, archive } => fetch(&config, &downloader, fetcher, &url, archive).await?,
    }

    Ok(())
}

async fn serve(
    config: Config,
    downloader: PlaylistDownloader,
    fetcher: MediaFetcher,
) -> std::io::Result<()> {
    let data = Data::new(AppData::new(downloader, fetcher, config.download_dir));

    log::info!("listening on {}:{}", config.address, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(data.clone())
            .wrap(cors)
            .configure(rest_api::configure)
    })
    .bind((config.address, config.port))?
    .run()
    .await
}

async fn fetch(
    config: &Config,
    downloader: &PlaylistDownloader,
    fetcher: MediaFetcher,
    url: &str,
    archive: Option<PathBuf>,
) -> Result<(), AppError> {
    let Some(id) = extract_playlist_ref(url) else {
        return Err(AppError::new(
            AppErrorKind::InvalidPlaylistUrl,
            "Invalid URL",
            &[&format!("URL: {url}")],
        ));
    };

    match archive {
        Some(dest) => {
            let report = downloader.run(&id, ArchiveSink::new(fetcher)).await?;

            tokio::fs::write(&dest, &report.artifact.bytes)
                .await
                .into_app_err(
                    "failed to write archive",
                    AppErrorKind::SinkIo,
                    &[&format!("PATH: {}", dest.display())],
                )?;

            println!(
                "packed {} videos of '{}' into {}",
                report.artifact.entries.len(),
                report.playlist.title,
                dest.display()
            );
            print_skipped(&report);
        }
        None => {
            let sink = FilesystemSink::new(&config.download_dir, DirLayout::PerPlaylist, fetcher);
            let report = downloader.run(&id, sink).await?;

            for path in &report.artifact {
                println!("{}", path.display());
            }
            println!(
                "downloaded {} new videos of '{}', {} already present",
                report.artifact.len(),
                report.playlist.title,
                report.resolved - report.artifact.len()
            );
            print_skipped(&report);
        }
    }

    Ok(())
}

fn print_skipped<A>(report: &DownloadReport<A>) {
    if report.skip_count() == 0 {
        return;
    }

    println!("skipped {} videos:", report.skip_count());
    for item in &report.skipped {
        println!("  {} ({})", item.url, item.reason);
    }
}
