//! HTTP Download Manager
//!
//! Streams manifests and update artifacts to memory or disk with
//! coalesced progress reporting.

use futures_util::TryStreamExt;
use reqwest::header::CONTENT_LENGTH;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use super::error::{Result, UpdateError};

/// Size of each read from the response body
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Progress is reported once per this many chunks
pub const PROGRESS_EVERY_CHUNKS: u64 = 10;

/// Byte-level download progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    pub processed: u64,
    pub total: Option<u64>,
    pub percent: Option<f64>,
}

impl DownloadProgress {
    pub fn new(processed: u64, total: Option<u64>) -> Self {
        let percent = match total {
            Some(total) if total > 0 => Some(round2(processed as f64 / total as f64 * 100.0)),
            _ => None,
        };
        Self { processed, total, percent }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Download result with metadata
#[derive(Debug)]
pub struct DownloadResult {
    pub bytes_downloaded: u64,
    pub total: Option<u64>,
}

/// Transport settings for the HTTP client
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            user_agent: concat!("autoupdater/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Download manager for manifests and update files
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Create a downloader with the given transport settings
    ///
    /// Fails with [`UpdateError::Network`] if the HTTP client cannot be
    /// built (for example when no TLS backend initializes).
    pub fn with_options(options: &TransportOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(UpdateError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Fetch a small document fully into memory
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Open a streaming body
    ///
    /// Returns the byte stream and the advertised content length, if any.
    pub async fn fetch(&self, url: &str) -> Result<(impl AsyncRead + Unpin + Send, Option<u64>)> {
        let response = self.get(url).await?;

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .or_else(|| response.content_length());

        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        Ok((StreamReader::new(Box::pin(stream)), total))
    }

    /// Download `url` to `dest`, reporting progress
    pub async fn download<F>(&self, url: &str, dest: &Path, on_progress: F) -> Result<DownloadResult>
    where
        F: FnMut(DownloadProgress),
    {
        tracing::info!(url, dest = %dest.display(), "downloading update");
        let (stream, total) = self.fetch(url).await?;
        let bytes_downloaded = stream_to_file(stream, dest, total, on_progress).await?;
        tracing::info!(bytes = bytes_downloaded, "download finished");

        Ok(DownloadResult { bytes_downloaded, total })
    }
}

/// Copy a byte stream into `dest`
///
/// Any file already at `dest` is truncated. Reads are at most
/// [`CHUNK_SIZE`] bytes; progress fires every [`PROGRESS_EVERY_CHUNKS`]
/// chunks and once more at end of stream.
pub async fn stream_to_file<R, F>(
    mut stream: R,
    dest: &Path,
    total: Option<u64>,
    mut on_progress: F,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    F: FnMut(DownloadProgress),
{
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = File::create(dest).await?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut processed: u64 = 0;
    let mut chunks: u64 = 0;

    loop {
        let read = stream.read(&mut buffer).await.map_err(read_error)?;
        if read == 0 {
            break;
        }

        file.write_all(&buffer[..read]).await?;
        processed += read as u64;
        chunks += 1;

        if chunks % PROGRESS_EVERY_CHUNKS == 0 {
            on_progress(DownloadProgress::new(processed, total));
        }
    }

    file.flush().await?;
    on_progress(DownloadProgress::new(processed, total));

    Ok(processed)
}

/// Map a body read failure back to the transport error that caused it
fn read_error(e: io::Error) -> UpdateError {
    let from_transport = e
        .get_ref()
        .map(|inner| inner.is::<reqwest::Error>())
        .unwrap_or(false);
    if !from_transport {
        return UpdateError::Io(e);
    }

    match e.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(req)) => UpdateError::Network(*req),
        _ => UpdateError::Io(io::Error::new(io::ErrorKind::Other, "download stream failed")),
    }
}
