use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};

const LIST_MARKER: &str = "list=";

/// Opaque playlist identifier as assigned by the hosting platform.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistRef(pub Arc<str>);

impl PlaylistRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PlaylistRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PlaylistRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlaylistRef {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// Pulls the value of the first non-empty `list=` parameter out of `url`.
///
/// The marker is matched case-insensitively anywhere in the string and the value
/// runs until the next `&` or the end of the input. Nothing else about the URL
/// is validated.
pub fn extract_playlist_ref(url: &str) -> Option<PlaylistRef> {
    // ascii lowercasing keeps byte offsets aligned with `url`
    let lowered = url.to_ascii_lowercase();

    lowered
        .match_indices(LIST_MARKER)
        .map(|(start, _)| {
            let rest = &url[start + LIST_MARKER.len()..];
            rest.split('&').next().unwrap_or_default()
        })
        .find(|id| !id.is_empty())
        .map(PlaylistRef::from)
}
