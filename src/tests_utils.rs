use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::{
    downloader::identifier::PlaylistRef,
    hosts::{
        youtube::watch_url, ByteSource, MediaResolver, MetadataProvider, PlaylistEntry,
        PlaylistLookup, PlaylistPage, ResolveError, ResolvedStream,
    },
};

/// Serves a fixed name lookup and a scripted chain of pages linked by cursor.
pub struct MockProvider {
    lookup: PlaylistLookup,
    pages: Vec<PlaylistPage>,
    lookup_calls: AtomicUsize,
    requests: Mutex<Vec<(Option<String>, u32)>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self::with_lookup(PlaylistLookup::Found(name.into()))
    }

    pub fn with_lookup(lookup: PlaylistLookup) -> Self {
        Self {
            lookup,
            pages: Vec::new(),
            lookup_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page(mut self, video_ids: &[&str], next_cursor: Option<&str>) -> Self {
        self.pages.push(PlaylistPage {
            items: video_ids
                .iter()
                .map(|id| PlaylistEntry::new(*id, Some(&format!("entry {id}"))))
                .collect(),
            next_cursor: next_cursor.map(Into::into),
        });
        self
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn page_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested_cursors(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(cursor, _)| cursor.clone())
            .collect()
    }

    pub fn requested_page_sizes(&self) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, size)| *size)
            .collect()
    }
}

#[async_trait]
impl MetadataProvider for MockProvider {
    async fn lookup_name(&self, _id: &PlaylistRef) -> anyhow::Result<PlaylistLookup> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup.clone())
    }

    async fn fetch_page(
        &self,
        _id: &PlaylistRef,
        cursor: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<PlaylistPage> {
        self.requests
            .lock()
            .unwrap()
            .push((cursor.map(ToOwned::to_owned), page_size));

        // every enumeration starts over at the first page, a cursor selects
        // the page after the one that handed it out
        let index = match cursor {
            None => Some(0),
            Some(cursor) => self
                .pages
                .iter()
                .position(|page| page.next_cursor.as_deref() == Some(cursor))
                .map(|i| i + 1),
        };

        Ok(index
            .and_then(|i| self.pages.get(i))
            .cloned()
            .unwrap_or_default())
    }
}

/// Resolves watch URLs from a table, anything missing fails as `Other`.
#[derive(Default)]
pub struct MockResolver {
    outcomes: HashMap<String, Result<ResolvedStream, ResolveError>>,
    calls: Mutex<Vec<String>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, video_id: &str, title: &str, body: &'static [u8]) -> Self {
        self.outcomes.insert(
            watch_url(video_id),
            Ok(ResolvedStream {
                title: title.into(),
                subtype: "mp4".into(),
                source: ByteSource::Buffered(Bytes::from_static(body)),
            }),
        );
        self
    }

    pub fn with_source(mut self, video_id: &str, title: &str, source: ByteSource) -> Self {
        self.outcomes.insert(
            watch_url(video_id),
            Ok(ResolvedStream {
                title: title.into(),
                subtype: "mp4".into(),
                source,
            }),
        );
        self
    }

    pub fn with_failure(mut self, video_id: &str, err: ResolveError) -> Self {
        self.outcomes.insert(watch_url(video_id), Err(err));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaResolver for MockResolver {
    async fn resolve(&self, video_url: &str) -> Result<ResolvedStream, ResolveError> {
        self.calls.lock().unwrap().push(video_url.to_owned());

        self.outcomes
            .get(video_url)
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::Other("video unavailable".into())))
    }
}

/// One canned HTTP/1.1 response, optionally sent in delayed chunks.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    status: u16,
    content_type: &'static str,
    chunks: Vec<Vec<u8>>,
    gap: Duration,
}

impl ScriptedReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![body.as_bytes().to_vec()],
            gap: Duration::ZERO,
        }
    }

    /// A `200` whose body chunks are each preceded by `gap`.
    pub fn trickle<C: AsRef<[u8]>>(chunks: impl IntoIterator<Item = C>, gap: Duration) -> Self {
        Self {
            status: 200,
            content_type: "application/octet-stream",
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            gap,
        }
    }
}

/// Local HTTP server answering every request with the reply picked by its handler.
pub struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Raw request heads in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Request targets (path and query) in arrival order.
    pub fn targets(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|head| head.split_whitespace().nth(1).unwrap_or_default().to_owned())
            .collect()
    }
}

/// Starts a server on an ephemeral port. The handler receives the request target.
pub async fn spawn_http_server<F>(handler: F) -> TestServer
where
    F: Fn(&str) -> ScriptedReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let handler = Arc::new(handler);
    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move { answer(socket, handler.as_ref(), &seen).await });
        }
    });

    TestServer { base_url, requests }
}

async fn answer<F>(mut socket: TcpStream, handler: &F, seen: &Mutex<Vec<String>>)
where
    F: Fn(&str) -> ScriptedReply,
{
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&head).into_owned();
    let target = head.split_whitespace().nth(1).unwrap_or_default().to_owned();
    seen.lock().unwrap().push(head);

    let reply = handler(&target);
    let length: usize = reply.chunks.iter().map(Vec::len).sum();
    let status_line = format!(
        "HTTP/1.1 {} Scripted\r\ncontent-type: {}\r\ncontent-length: {length}\r\nconnection: close\r\n\r\n",
        reply.status, reply.content_type
    );

    if socket.write_all(status_line.as_bytes()).await.is_err() {
        return;
    }
    for chunk in &reply.chunks {
        tokio::time::sleep(reply.gap).await;
        if socket.write_all(chunk).await.is_err() || socket.flush().await.is_err() {
            return;
        }
    }
    let _ = socket.shutdown().await;
}

/// A local URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{addr}/video.mp4")
}
