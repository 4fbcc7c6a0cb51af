use std::{fmt::Display, sync::Arc};

use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};

pub trait IntoAppError<R> {
    fn into_app_err<'a>(
        self,
        info: impl Into<Arc<str>>,
        kind: AppErrorKind,
        extra_details: &'a [&'a str],
    ) -> R;
}

#[derive(Debug)]
pub struct AppError {
    kind: AppErrorKind,
    info: Arc<str>,
    detailed_info: Arc<str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppErrorKind {
    InvalidPlaylistUrl,
    InvalidPlaylist,
    NoVideosDownloaded,
    SinkIo,
    Api,
    Config,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserError {
    kind: AppErrorKind,
    info: Arc<str>,
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            info: Arc::clone(&self.info),
            detailed_info: Arc::clone(&self.detailed_info),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width: usize = 80;

        let kind = self.kind.to_string();
        let header = format!(
            "\n--{kind}{sep}",
            sep = "-".repeat(width.saturating_sub(kind.len() + 2))
        );
        let body = format!(
            "\nINFO: {info}\n\n{details}",
            info = self.info,
            details = self.detailed_info
        );
        let footer = "-".repeat(width);

        write!(f, "{header}{body}\n{footer}")
    }
}

impl std::error::Error for AppError {}

impl Display for AppErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            Self::InvalidPlaylistUrl => "INVALID PLAYLIST URL",
            Self::InvalidPlaylist => "INVALID PLAYLIST",
            Self::NoVideosDownloaded => "NO VIDEOS DOWNLOADED",
            Self::SinkIo => "SINK IO ERROR",
            Self::Api => "API ERROR",
            Self::Config => "CONFIG ERROR",
        };

        write!(f, "{str}")
    }
}

impl AppErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPlaylistUrl => StatusCode::BAD_REQUEST,
            Self::InvalidPlaylist | Self::NoVideosDownloaded => StatusCode::NOT_FOUND,
            Self::Api => StatusCode::BAD_GATEWAY,
            Self::SinkIo | Self::Config => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E: Display> IntoAppError<AppError> for E {
    fn into_app_err<'a>(
        self,
        info: impl Into<Arc<str>>,
        kind: AppErrorKind,
        extra_details: &'a [&'a str],
    ) -> AppError {
        let app_err = AppError {
            kind,
            info: info.into(),
            detailed_info: AppError::format_detailed_info(self, extra_details),
        };

        log::error!("{app_err}");
        app_err
    }
}

impl<T, E> IntoAppError<Result<T, AppError>> for Result<T, E>
where
    E: IntoAppError<AppError>,
{
    fn into_app_err<'a>(
        self,
        info: impl Into<Arc<str>>,
        kind: AppErrorKind,
        extra_details: &'a [&'a str],
    ) -> Result<T, AppError> {
        self.map_err(|err| err.into_app_err(info, kind, extra_details))
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.user_err().serialize(serializer)
    }
}

impl AppError {
    pub fn new(kind: AppErrorKind, info: impl Into<Arc<str>>, extra_details: &[&str]) -> Self {
        let app_err = Self {
            kind,
            info: info.into(),
            detailed_info: AppError::format_detailed_info("", extra_details),
        };

        log::error!("{app_err}");
        app_err
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    fn format_detailed_info<D: Display>(err: D, extra_details: &[&str]) -> Arc<str> {
        format!(
            "DETAILS:\n{extra}{err}",
            err = if err.to_string().is_empty() {
                "".to_owned()
            } else {
                format!("\n\nERROR: {err}")
            },
            extra = extra_details.join("\n")
        )
        .into()
    }

    fn user_err(&self) -> UserError {
        UserError {
            kind: self.kind,
            info: Arc::clone(&self.info),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialized_error_hides_details() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into_app_err(
            "failed to write video",
            AppErrorKind::SinkIo,
            &["PATH: downloads/a.mp4"],
        );

        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"kind":"SinkIo","info":"failed to write video"}"#
        );
        assert!(err.to_string().contains("disk on fire"));
        assert!(err.to_string().contains("PATH: downloads/a.mp4"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppErrorKind::InvalidPlaylistUrl.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppErrorKind::NoVideosDownloaded.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppErrorKind::Api.status_code(), StatusCode::BAD_GATEWAY);
    }
}
