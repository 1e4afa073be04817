//! Paginated note retrieval for one author/edition.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};
use url::Url;

use vinaya_notes_shared::{FetchConfig, NoteRecord, NotesPayload, Result, VinayaError};

use crate::client::RetryingClient;

/// Upper bound on the page count a notes API may announce.
pub const MAX_PAGES: u32 = 10_000;

// ---------------------------------------------------------------------------
// NoteStream
// ---------------------------------------------------------------------------

/// Finite, consuming sequence of notes sorted by segment identifier.
///
/// Not restartable: once drained, a fresh fetch is needed.
#[derive(Debug)]
pub struct NoteStream {
    inner: std::vec::IntoIter<NoteRecord>,
}

impl NoteStream {
    /// Sort `notes` by scid (stable) and wrap them.
    pub fn from_notes(mut notes: Vec<NoteRecord>) -> Self {
        notes.sort_by(|a, b| a.scid.cmp(&b.scid));
        Self {
            inner: notes.into_iter(),
        }
    }
}

impl Iterator for NoteStream {
    type Item = NoteRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for NoteStream {}

// ---------------------------------------------------------------------------
// NoteFetcher
// ---------------------------------------------------------------------------

/// Fetches every note for an edition from `{api_base}/notes/{edition}?page=N`.
pub struct NoteFetcher {
    client: Arc<RetryingClient>,
    api_base: String,
    concurrency: usize,
}

impl NoteFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Url::parse(&config.api_base).map_err(|e| {
            VinayaError::config(format!("invalid api_base '{}': {e}", config.api_base))
        })?;

        Ok(Self {
            client: Arc::new(RetryingClient::new(config)?),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            concurrency: config.concurrency.max(1) as usize,
        })
    }

    /// The underlying retrying client (shared with scid map downloads).
    pub fn client(&self) -> &RetryingClient {
        &self.client
    }

    /// URL of one page of notes.
    pub fn page_url(&self, edition: &str, page: u32) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/notes/{edition}", self.api_base))
            .map_err(|e| VinayaError::config(format!("invalid notes URL for '{edition}': {e}")))?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    /// Fetch all notes for `edition`.
    ///
    /// Page 1 announces the page count; the remaining pages are requested
    /// concurrently. Any page failure fails the whole fetch.
    #[instrument(skip(self), fields(api_base = %self.api_base))]
    pub async fn fetch(&self, edition: &str) -> Result<NoteStream> {
        let first_url = self.page_url(edition, 1)?;
        let first = fetch_page(&self.client, first_url).await?;
        let total_pages = first.total_pages();
        if total_pages > MAX_PAGES {
            return Err(VinayaError::parse(format!(
                "notes for '{edition}' announce {total_pages} pages (limit {MAX_PAGES})"
            )));
        }

        info!(total_pages, concurrency = self.concurrency, "fetching notes");

        let mut notes = first.into_notes();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total_pages.saturating_sub(1) as usize);

        for page in 2..=total_pages {
            let url = self.page_url(edition, page)?;
            let client = Arc::clone(&self.client);
            // Taken before spawning so at most `concurrency` page tasks exist.
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| VinayaError::fetch(url.as_str(), None, e.to_string()))?;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                fetch_page(&client, url).await
            }));
        }

        for handle in handles {
            let payload = handle
                .await
                .map_err(|e| VinayaError::fetch(edition, None, format!("page task failed: {e}")))??;
            notes.extend(payload.into_notes());
        }

        info!(notes = notes.len(), "notes fetched");
        Ok(NoteStream::from_notes(notes))
    }
}

/// GET and decode a single notes page.
async fn fetch_page(client: &RetryingClient, url: Url) -> Result<NotesPayload> {
    let body = client.get_text(url.as_str()).await?;
    let payload: NotesPayload = serde_json::from_str(&body)
        .map_err(|e| VinayaError::parse(format!("{url}: invalid notes payload: {e}")))?;
    debug!(%url, total_pages = payload.total_pages(), "page decoded");
    Ok(payload)
}

/// Read notes from a local JSON file (same shapes as the API).
pub fn load_notes_file(path: &Path) -> Result<NoteStream> {
    let content = std::fs::read_to_string(path).map_err(|e| VinayaError::io(path, e))?;
    let payload: NotesPayload = serde_json::from_str(&content).map_err(|e| {
        VinayaError::parse(format!("{}: invalid notes file: {e}", path.display()))
    })?;
    Ok(NoteStream::from_notes(payload.into_notes()))
}
