use std::{collections::HashSet, sync::Arc};

use anyhow::anyhow;

use crate::hosts::{MetadataProvider, PlaylistEntry, PAGE_SIZE};

use super::identifier::PlaylistRef;

/// Upper bound on pages fetched for one playlist.
const MAX_PAGES: usize = 10_000;

/// Collects every entry of a playlist in provider order.
///
/// Starts without a cursor and threads each page's cursor into the next
/// request until the provider stops returning one. A cursor seen twice, or more
/// than [`MAX_PAGES`] pages, aborts the enumeration instead of looping forever.
pub async fn enumerate<P: MetadataProvider + ?Sized>(
    provider: &P,
    id: &PlaylistRef,
) -> anyhow::Result<Vec<PlaylistEntry>> {
    let mut entries = Vec::new();
    let mut seen_cursors: HashSet<Arc<str>> = HashSet::new();
    let mut cursor: Option<Arc<str>> = None;

    for page_number in 1..=MAX_PAGES {
        let page = provider
            .fetch_page(id, cursor.as_deref(), PAGE_SIZE)
            .await?;

        log::debug!(
            "received {} entries on page {page_number} of playlist {id}",
            page.items.len()
        );
        entries.extend(page.items);

        let Some(next) = page.next_cursor else {
            log::info!(
                "enumerated {} entries of playlist {id} over {page_number} pages",
                entries.len()
            );
            return Ok(entries);
        };

        if !seen_cursors.insert(Arc::clone(&next)) {
            return Err(anyhow!(
                "provider repeated page cursor '{next}' for playlist {id} after {page_number} pages"
            ));
        }

        cursor = Some(next);
    }

    Err(anyhow!(
        "playlist {id} still had more pages after {MAX_PAGES} requests"
    ))
}
