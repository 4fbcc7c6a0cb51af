use std::sync::Arc;

use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    downloader::identifier::{extract_playlist_ref, PlaylistRef},
    error::{AppError, AppErrorKind},
    AppData,
};

use self::delivery::Delivery;

pub mod delivery;

const INVALID_URL_MSG: &str = "Invalid URL";

#[derive(Debug, Deserialize)]
struct PlaylistUrlForm {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DownloadForm {
    playlist_id: String,
    #[serde(default)]
    delivery: Delivery,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPreviewResponse {
    playlist_id: PlaylistRef,
    playlist_name: Arc<str>,
    items: Vec<PlaylistPreviewItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPreviewItem {
    video_id: Arc<str>,
    title: Option<Arc<str>>,
    url: String,
}

#[derive(Debug, Serialize)]
struct Usage {
    endpoints: &'static [EndpointUsage],
}

#[derive(Debug, Serialize)]
struct EndpointUsage {
    method: &'static str,
    path: &'static str,
    form: &'static [&'static str],
    description: &'static str,
}

const USAGE: Usage = Usage {
    endpoints: &[
        EndpointUsage {
            method: "POST",
            path: "/",
            form: &["url"],
            description: "list the videos of the playlist referenced by 'url'",
        },
        EndpointUsage {
            method: "POST",
            path: "/download",
            form: &["playlist_id", "delivery=library|archive|bundle"],
            description: "download every video of a playlist",
        },
    ],
};

fn error_response(err: &AppError) -> HttpResponse {
    HttpResponse::build(err.kind().status_code()).json(err)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_usage)
        .service(preview_playlist)
        .service(download_playlist);
}

#[get("/")]
async fn get_usage() -> HttpResponse {
    HttpResponse::Ok().json(&USAGE)
}

#[post("/")]
async fn preview_playlist(data: Data<AppData>, form: web::Form<PlaylistUrlForm>) -> HttpResponse {
    let Some(id) = extract_playlist_ref(&form.url) else {
        log::info!("rejected playlist url '{}'", form.url);
        return error_response(&AppError::new(
            AppErrorKind::InvalidPlaylistUrl,
            INVALID_URL_MSG,
            &[&format!("URL: {}", form.url)],
        ));
    };

    let preview = match data.downloader().preview(&id).await {
        Ok(preview) => preview,
        Err(err) => return error_response(&err),
    };

    HttpResponse::Ok().json(PlaylistPreviewResponse {
        playlist_id: preview.playlist.id,
        playlist_name: preview.playlist.title,
        items: preview
            .entries
            .into_iter()
            .map(|entry| PlaylistPreviewItem {
                url: entry.watch_url(),
                video_id: entry.video_id,
                title: entry.title,
            })
            .collect(),
    })
}

#[post("/download")]
async fn download_playlist(data: Data<AppData>, form: web::Form<DownloadForm>) -> HttpResponse {
    let DownloadForm {
        playlist_id,
        delivery: mode,
    } = form.into_inner();

    let playlist_id = playlist_id.trim();
    if playlist_id.is_empty() {
        return error_response(&AppError::new(
            AppErrorKind::InvalidPlaylistUrl,
            INVALID_URL_MSG,
            &["CAUSE: empty playlist id"],
        ));
    }

    let id = PlaylistRef::from(playlist_id);
    log::info!("download of playlist {id} requested, DELIVERY: {mode:?}");

    let downloader = data.downloader();
    let fetcher = data.fetcher().clone();

    let result = match mode {
        Delivery::Library => {
            delivery::deliver_library(downloader, &id, data.download_dir(), fetcher).await
        }
        Delivery::Archive => delivery::deliver_archive(downloader, &id, fetcher).await,
        Delivery::Bundle => {
            delivery::deliver_bundle(downloader, &id, data.download_dir(), fetcher).await
        }
    };

    match result {
        Ok(res) => res,
        Err(err) => error_response(&err),
    }
}
