use std::{cmp::Ordering, collections::BTreeMap, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::hosts::{ByteSource, MediaResolver, ResolveError, ResolvedStream};

const DEFAULT_SUBTYPE: &str = "mp4";

const AGE_RESTRICTION_MARKERS: &[&str] = &[
    "confirm your age",
    "age-restricted",
    "age restricted",
    "inappropriate for some users",
];

/// Resolves watch URLs by asking `yt-dlp` for the video's format list.
pub struct YtDlpResolver {
    binary: Arc<str>,
    timeout: Duration,
}

/// Subset of `yt-dlp --dump-single-json`.
#[derive(Debug, Deserialize)]
struct YtDlpVideoInfo {
    id: Option<Arc<str>>,
    title: Option<Arc<str>>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    url: Option<Arc<str>>,
    ext: Option<Arc<str>>,
    vcodec: Option<String>,
    acodec: Option<String>,
    protocol: Option<String>,
    height: Option<u32>,
    tbr: Option<f64>,
    /// Headers yt-dlp expects to be sent along with `url`.
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

impl YtDlpFormat {
    fn is_progressive(&self) -> bool {
        let has_codec = |codec: &Option<String>| codec.as_deref().is_some_and(|c| c != "none");
        let direct = self
            .protocol
            .as_deref()
            .map_or(true, |protocol| protocol == "https" || protocol == "http");

        self.url.is_some() && direct && has_codec(&self.vcodec) && has_codec(&self.acodec)
    }
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<Arc<str>>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn dump_video_info(&self, video_url: &str) -> Result<String, ResolveError> {
        let child = Command::new(&*self.binary)
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                video_url,
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let out = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(out)) => out,
            Ok(Err(err)) => {
                return Err(ResolveError::Other(
                    format!("failed to run '{}': {err}", self.binary).into(),
                ))
            }
            Err(_) => {
                return Err(ResolveError::Other(
                    format!("'{}' timed out after {:?}", self.binary, self.timeout).into(),
                ))
            }
        };

        if !out.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&out.stderr)));
        }

        String::from_utf8(out.stdout).map_err(|err| {
            ResolveError::Other(format!("output of '{}' is not UTF-8: {err}", self.binary).into())
        })
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, video_url: &str) -> Result<ResolvedStream, ResolveError> {
        let json = self.dump_video_info(video_url).await?;
        select_stream(&json)
    }
}

fn classify_stderr(stderr: &str) -> ResolveError {
    let lowered = stderr.to_lowercase();

    if AGE_RESTRICTION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return ResolveError::AgeRestricted;
    }

    let details = stderr.trim();
    if details.is_empty() {
        ResolveError::Other("yt-dlp exited without a message".into())
    } else {
        ResolveError::Other(details.into())
    }
}

fn select_stream(json: &str) -> Result<ResolvedStream, ResolveError> {
    let info: YtDlpVideoInfo = serde_json::from_str(json)
        .map_err(|err| ResolveError::Other(format!("unreadable yt-dlp output: {err}").into()))?;

    let best = info
        .formats
        .iter()
        .filter(|format| format.is_progressive())
        .max_by(|a, b| {
            a.height
                .cmp(&b.height)
                .then(a.tbr.partial_cmp(&b.tbr).unwrap_or(Ordering::Equal))
        })
        .ok_or(ResolveError::NoStream)?;

    let Some(url) = best.url.clone() else {
        return Err(ResolveError::NoStream);
    };

    Ok(ResolvedStream {
        title: info.title.or(info.id).unwrap_or_else(|| "untitled".into()),
        subtype: best.ext.clone().unwrap_or_else(|| DEFAULT_SUBTYPE.into()),
        source: ByteSource::Remote {
            url,
            headers: best
                .http_headers
                .iter()
                .map(|(name, value)| (name.as_str().into(), value.as_str().into()))
                .collect(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VIDEO_INFO: &str = r#"{
        "id": "1",
        "title": "Song: A",
        "formats": [
            {"format_id": "140", "url": "https://cdn/audio", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "protocol": "https", "tbr": 129.5},
            {"format_id": "18", "url": "https://cdn/360", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "protocol": "https", "height": 360, "tbr": 500.0},
            {"format_id": "22", "url": "https://cdn/720", "ext": "mp4", "vcodec": "avc1.64001F", "acodec": "mp4a.40.2", "protocol": "https", "height": 720, "tbr": 1200.0,
             "http_headers": {"User-Agent": "Mozilla/5.0", "Accept-Language": "en-us,en;q=0.5"}},
            {"format_id": "137", "url": "https://cdn/1080", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "protocol": "https", "height": 1080},
            {"format_id": "95", "url": "https://cdn/hls", "ext": "mp4", "vcodec": "avc1.4d401f", "acodec": "mp4a.40.2", "protocol": "m3u8_native", "height": 1080}
        ]
    }"#;

    #[test]
    fn test_select_highest_progressive_stream() {
        let stream = select_stream(VIDEO_INFO).unwrap();

        assert_eq!(
            stream,
            ResolvedStream {
                title: "Song: A".into(),
                subtype: "mp4".into(),
                source: ByteSource::Remote {
                    url: "https://cdn/720".into(),
                    headers: vec![
                        ("Accept-Language".into(), "en-us,en;q=0.5".into()),
                        ("User-Agent".into(), "Mozilla/5.0".into()),
                    ],
                },
            }
        );
    }

    #[test]
    fn test_no_progressive_stream() {
        let json = r#"{
            "id": "2",
            "title": "only audio",
            "formats": [{"url": "https://cdn/audio", "ext": "m4a", "vcodec": "none", "acodec": "opus"}]
        }"#;

        assert_eq!(select_stream(json), Err(ResolveError::NoStream));
        assert_eq!(
            select_stream(r#"{"id": "3", "title": "no formats"}"#),
            Err(ResolveError::NoStream)
        );
    }

    #[test]
    fn test_classify_stderr() {
        assert_eq!(
            classify_stderr("ERROR: [youtube] 2: Sign in to confirm your age. This video may be inappropriate for some users."),
            ResolveError::AgeRestricted
        );

        assert_eq!(
            classify_stderr("ERROR: [youtube] 3: Video unavailable\n"),
            ResolveError::Other("ERROR: [youtube] 3: Video unavailable".into())
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_item_failure() {
        let resolver = YtDlpResolver::new("definitely-not-a-real-yt-dlp-binary", Duration::from_secs(5));
        let result = resolver.resolve("https://www.youtube.com/watch?v=1").await;

        assert!(matches!(result, Err(ResolveError::Other(_))));
    }
}
