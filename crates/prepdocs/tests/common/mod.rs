//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};
use tracing_subscriber::fmt::MakeWriter;

use prepdocs::providers::{
    BlobManager, ImageEmbeddings, ListFileStrategy, LlmProvider, SearchManager,
};
use prepdocs::{Error, File, Result, Section};

/// Ordered record of collaborator calls shared by every double
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// Content reader that counts how often it is dropped
pub struct TrackedReader {
    inner: io::Cursor<Vec<u8>>,
    drops: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A file whose content handle reports its releases to `drops`
pub fn tracked_file(path: &str, data: &[u8], drops: &Arc<AtomicUsize>) -> File {
    File::new(
        path,
        Box::new(TrackedReader {
            inner: io::Cursor::new(data.to_vec()),
            drops: Arc::clone(drops),
        }),
    )
}

/// Lister over a fixed set of files (consumed by the first `list`) and paths
#[derive(Default)]
pub struct StaticLister {
    files: Mutex<Vec<File>>,
    paths: Vec<String>,
}

impl StaticLister {
    pub fn with_files(files: Vec<File>) -> Self {
        Self {
            files: Mutex::new(files),
            paths: Vec::new(),
        }
    }

    pub fn with_paths(paths: &[&str]) -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ListFileStrategy for StaticLister {
    fn list(&self) -> BoxStream<'_, Result<File>> {
        let files = std::mem::take(&mut *self.files.lock());
        stream::iter(files.into_iter().map(Ok)).boxed()
    }

    fn list_paths(&self) -> BoxStream<'_, Result<String>> {
        stream::iter(self.paths.clone().into_iter().map(Ok)).boxed()
    }
}

pub struct RecordingBlobManager {
    log: CallLog,
    fail_upload: bool,
}

impl RecordingBlobManager {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_upload: false,
        }
    }

    pub fn failing(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_upload: true,
        }
    }
}

#[async_trait]
impl BlobManager for RecordingBlobManager {
    async fn upload_blob(&self, file: &File) -> Result<Vec<String>> {
        self.log.record(format!("upload:{}", file.filename()));
        if self.fail_upload {
            return Err(Error::storage("upload refused"));
        }
        Ok(vec![format!("https://blobs.example/{}", file.filename())])
    }

    async fn remove_blob(&self, path: Option<&str>) -> Result<()> {
        self.log.record(format!("remove_blob:{}", path.unwrap_or("*")));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
pub struct RecordingSearchManager {
    log: CallLog,
    pub sections: Mutex<Vec<Section>>,
    pub image_embeddings: Mutex<Option<Vec<Vec<f32>>>>,
    pub urls: Mutex<Vec<Option<String>>>,
}

impl RecordingSearchManager {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchManager for RecordingSearchManager {
    async fn create_index(&self) -> Result<()> {
        self.log.record("create_index");
        Ok(())
    }

    async fn update_content(
        &self,
        sections: &[Section],
        image_embeddings: Option<&[Vec<f32>]>,
        url: Option<&str>,
    ) -> Result<()> {
        let filename = sections
            .first()
            .map(|s| s.content.filename())
            .unwrap_or_default();
        self.log.record(format!("update:{}", filename));
        self.sections.lock().extend_from_slice(sections);
        *self.image_embeddings.lock() = image_embeddings.map(<[Vec<f32>]>::to_vec);
        self.urls.lock().push(url.map(str::to_string));
        Ok(())
    }

    async fn remove_content(&self, path: Option<&str>, only_oid: Option<&str>) -> Result<()> {
        match only_oid {
            Some(oid) => self
                .log
                .record(format!("remove_content:{}:{}", path.unwrap_or("*"), oid)),
            None => self.log.record(format!("remove_content:{}", path.unwrap_or("*"))),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub struct FakeImageEmbeddings {
    log: CallLog,
}

impl FakeImageEmbeddings {
    pub fn new(log: &CallLog) -> Self {
        Self { log: log.clone() }
    }
}

#[async_trait]
impl ImageEmbeddings for FakeImageEmbeddings {
    async fn create_embeddings(&self, blob_urls: &[String]) -> Result<Vec<Vec<f32>>> {
        self.log.record(format!("image_embeddings:{}", blob_urls.len()));
        Ok(blob_urls.iter().map(|_| vec![0.5, 0.25]).collect())
    }
}

/// Language model with a canned reply (or a failure when `None`)
pub struct FakeLlm {
    log: CallLog,
    reply: Option<String>,
}

impl FakeLlm {
    pub fn replying(log: &CallLog, reply: &str) -> Self {
        Self {
            log: log.clone(),
            reply: Some(reply.to_string()),
        }
    }

    pub fn failing(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            reply: None,
        }
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.log.record("llm");
        self.reply
            .clone()
            .ok_or_else(|| Error::llm("model unavailable"))
    }

    async fn health_check(&self) -> Result<bool> {
        self.log.record("health_check");
        Ok(self.reply.is_some())
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Log output captured from a scoped subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(Arc::clone(&self.0))
    }
}

/// Install a subscriber writing into the returned buffer for the current thread
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
