//! One reusable HTTP session
//!
//! A connection is configured with setters, then driven either as a
//! blocking one-shot request or as a multiplexed transfer whose body is
//! moved incrementally through the request/response buffers. `clear()`
//! returns it to a pristine state so the pool can hand it out again.

use std::io;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Client, Method, RequestBuilder};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use dvfs_core::{VfsError, VfsResult};

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::config::HostConfiguration;
use crate::errors::{http_error, transport_error};

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// The multiplexed loops sleep in 600 ms slices; a transfer that moves no
// bytes for a whole minute is declared dead (the 1 B/s low-speed floor).
pub(crate) const POLL_SLICE: Duration = Duration::from_millis(600);
pub(crate) const LOW_SPEED_WINDOW: Duration = Duration::from_secs(60);

const UPLOAD_CHUNK: usize = 64 * 1024;

/// Probe polled while a transfer is in flight; returning `false` aborts it.
pub type ProgressCheck = Arc<dyn Fn() -> bool + Send + Sync>;

struct UploadShared {
    buffer: WriteBuffer,
    concluded: bool,
    aborted: bool,
    waker: Option<Waker>,
}

// Staging area between the writer and the transport's body stream. The
// stream parks itself when the buffer runs dry (the pause protocol) and is
// woken by `wake_stream` once the writer has supplied more bytes; `drained`
// signals the writer side after each chunk leaves for the wire.
struct UploadChannel {
    shared: Mutex<UploadShared>,
    drained: Notify,
}

impl UploadChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(UploadShared {
                buffer: WriteBuffer::new(),
                concluded: false,
                aborted: false,
                waker: None,
            }),
            drained: Notify::new(),
        })
    }

    fn buffered(&self) -> usize {
        self.shared.lock().unwrap().buffer.size()
    }

    fn set_concluded(&self) {
        self.shared.lock().unwrap().concluded = true;
    }

    fn set_aborted(&self) {
        self.shared.lock().unwrap().aborted = true;
    }

    // Un-pauses the body stream; idempotent, and must happen before the
    // next poll of the transfer so freshly supplied bytes are picked up.
    fn wake_stream(&self) {
        let waker = self.shared.lock().unwrap().waker.take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

struct UploadBodyStream {
    channel: Arc<UploadChannel>,
}

impl Stream for UploadBodyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut shared = self.channel.shared.lock().unwrap();
        if shared.aborted {
            return Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "upload aborted",
            ))));
        }
        if !shared.buffer.is_empty() {
            let chunk = shared.buffer.take_chunk(UPLOAD_CHUNK);
            drop(shared);
            self.channel.drained.notify_waiters();
            return Poll::Ready(Some(Ok(chunk)));
        }
        if shared.concluded {
            return Poll::Ready(None);
        }
        shared.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Write access to the request staging buffer.
pub struct RequestBodyGuard<'a>(MutexGuard<'a, UploadShared>);

impl Deref for RequestBodyGuard<'_> {
    type Target = WriteBuffer;

    fn deref(&self) -> &WriteBuffer {
        &self.0.buffer
    }
}

impl DerefMut for RequestBodyGuard<'_> {
    fn deref_mut(&mut self) -> &mut WriteBuffer {
        &mut self.0.buffer
    }
}

struct Download {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    finished: bool,
}

struct Upload {
    channel: Arc<UploadChannel>,
    handle: JoinHandle<VfsResult<u16>>,
    outcome: Option<VfsResult<u16>>,
}

impl Upload {
    // The task result is memoized so callers can ask for it repeatedly.
    async fn outcome(&mut self) -> VfsResult<u16> {
        if self.outcome.is_none() {
            let result = match (&mut self.handle).await {
                Ok(inner) => inner,
                Err(join_error) => Err(VfsError::Io(format!("upload task failed: {join_error}"))),
            };
            self.outcome = Some(result);
        }
        self.outcome
            .clone()
            .unwrap_or_else(|| Err(VfsError::Io("upload outcome missing".to_string())))
    }
}

/// A single HTTP session, reusable across requests after [`Connection::clear`].
pub struct Connection {
    client: Client,
    config: HostConfiguration,
    verb: Option<String>,
    url: Option<String>,
    headers: Vec<(String, String)>,
    fixed_body: Option<Bytes>,
    upload_total: Option<u64>,
    multiplexed: bool,
    progress: Option<ProgressCheck>,
    request_body: Arc<UploadChannel>,
    download: Option<Download>,
    upload: Option<Upload>,
    response_status: Option<u16>,
    response_headers: HeaderMap,
    response_body: ReadBuffer,
}

impl Connection {
    pub(crate) fn new(client: Client, config: HostConfiguration) -> Self {
        Self {
            client,
            config,
            verb: None,
            url: None,
            headers: Vec::new(),
            fixed_body: None,
            upload_total: None,
            multiplexed: false,
            progress: None,
            request_body: UploadChannel::new(),
            download: None,
            upload: None,
            response_status: None,
            response_headers: HeaderMap::new(),
            response_body: ReadBuffer::new(),
        }
    }

    /// Sets the request verb; any WebDAV method string is accepted.
    pub fn set_custom_request(&mut self, verb: &str) {
        self.verb = Some(verb.to_string());
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = Some(url.to_string());
    }

    /// Replaces the current header list.
    pub fn set_header(&mut self, header: &[(&str, &str)]) {
        self.headers = header
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
    }

    /// Copies `body` in as a fixed-size upload body.
    pub fn set_body(&mut self, body: &[u8]) {
        self.fixed_body = Some(Bytes::copy_from_slice(body));
    }

    /// Declares a streaming upload of exactly `total` bytes which will be
    /// delivered through the request buffer over time.
    pub fn set_non_blocking_upload(&mut self, total: u64) {
        self.upload_total = Some(total);
    }

    /// Switches the session into multiplexed mode, enabling the
    /// incremental `read_body_up_to` / `write_body_up_to` calls.
    pub fn make_non_blocking(&mut self) {
        self.multiplexed = true;
    }

    /// Installs the probe consulted between transfer steps.
    pub fn set_progress_check(&mut self, check: ProgressCheck) {
        self.progress = Some(check);
    }

    pub fn request_body(&self) -> RequestBodyGuard<'_> {
        RequestBodyGuard(self.request_body.shared.lock().unwrap())
    }

    pub fn response_body(&mut self) -> &mut ReadBuffer {
        &mut self.response_body
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    /// Performs the configured request synchronously, draining the whole
    /// response body into the response buffer. Returns the HTTP status.
    pub async fn perform_blocking_request(&mut self) -> VfsResult<u16> {
        let request = self.build_request(None)?;
        let request = match &self.fixed_body {
            Some(body) => request.body(body.clone()),
            None => request,
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        self.response_status = Some(status);
        self.response_headers = response.headers().clone();

        let progress = self.progress.clone();
        let mut stream = response.bytes_stream();
        let mut stalled = Duration::ZERO;
        loop {
            match timeout(POLL_SLICE, stream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    self.response_body.append(&chunk);
                    stalled = Duration::ZERO;
                }
                Ok(Some(Err(e))) => return Err(transport_error(e)),
                Ok(None) => break,
                Err(_) => {
                    stalled += POLL_SLICE;
                    if stalled >= LOW_SPEED_WINDOW {
                        return Err(VfsError::Timeout("response body stalled".to_string()));
                    }
                    if let Some(check) = &progress {
                        if !check() {
                            return Err(VfsError::Cancelled);
                        }
                    }
                }
            }
        }

        Ok(status)
    }

    /// Blocks until the response buffer holds at least `target` bytes, the
    /// server closed the stream, or a transport error occurred.
    pub async fn read_body_up_to(&mut self, target: usize) -> VfsResult<()> {
        if !self.multiplexed {
            return Err(VfsError::InvalidArgument(
                "connection is not in multiplexed mode".to_string(),
            ));
        }
        self.ensure_download_started().await?;

        let progress = self.progress.clone();
        let Some(download) = self.download.as_mut() else {
            return Err(VfsError::Io("download state missing".to_string()));
        };

        let mut stalled = Duration::ZERO;
        while self.response_body.size() < target && !download.finished {
            match timeout(POLL_SLICE, download.stream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    self.response_body.append(&chunk);
                    stalled = Duration::ZERO;
                }
                Ok(Some(Err(e))) => {
                    download.finished = true;
                    return Err(transport_error(e));
                }
                Ok(None) => download.finished = true,
                Err(_) => {
                    stalled += POLL_SLICE;
                    if stalled >= LOW_SPEED_WINDOW {
                        return Err(VfsError::Timeout("download stalled".to_string()));
                    }
                    if let Some(check) = &progress {
                        if !check() {
                            return Err(VfsError::Cancelled);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Tears down a pending download as quickly as possible, discarding
    /// any bytes still in flight.
    pub fn abort_body_read(&mut self) {
        self.download = None;
        self.response_body.clear();
    }

    /// Blocks until `target` bytes of the request buffer have been pushed
    /// to the wire, or the server finished or aborted the transfer.
    pub async fn write_body_up_to(&mut self, target: usize) -> VfsResult<()> {
        if !self.multiplexed {
            return Err(VfsError::InvalidArgument(
                "connection is not in multiplexed mode".to_string(),
            ));
        }
        self.ensure_upload_started()?;

        let progress = self.progress.clone();
        let Some(upload) = self.upload.as_mut() else {
            return Err(VfsError::Io("upload state missing".to_string()));
        };
        let channel = upload.channel.clone();

        // bytes the transport drained before this call count toward the
        // target, hence the saturation
        let goal = channel.buffered().saturating_sub(target);

        channel.wake_stream();
        let mut stalled = Duration::ZERO;
        loop {
            if channel.buffered() <= goal {
                return Ok(());
            }
            if upload.handle.is_finished() {
                let status = upload.outcome().await?;
                return match http_error(status) {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            }
            if let Some(check) = &progress {
                if !check() {
                    return Err(VfsError::Cancelled);
                }
            }

            let drained = channel.drained.notified();
            if channel.buffered() <= goal {
                return Ok(());
            }
            match timeout(POLL_SLICE, drained).await {
                Ok(()) => stalled = Duration::ZERO,
                Err(_) => {
                    stalled += POLL_SLICE;
                    if stalled >= LOW_SPEED_WINDOW {
                        return Err(VfsError::Timeout("upload stalled".to_string()));
                    }
                }
            }
        }
    }

    /// Drains the remaining request buffer, closes the body and waits for
    /// the final status.
    pub async fn conclude_body_write(&mut self) -> VfsResult<()> {
        self.ensure_upload_started()?;

        let progress = self.progress.clone();
        let Some(upload) = self.upload.as_mut() else {
            return Err(VfsError::Io("upload state missing".to_string()));
        };
        let channel = upload.channel.clone();

        channel.set_concluded();
        channel.wake_stream();

        let mut stalled = Duration::ZERO;
        loop {
            if upload.handle.is_finished() {
                let status = upload.outcome().await?;
                return match http_error(status) {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            }
            if let Some(check) = &progress {
                if !check() {
                    return Err(VfsError::Cancelled);
                }
            }
            match timeout(POLL_SLICE, channel.drained.notified()).await {
                Ok(()) => stalled = Duration::ZERO,
                Err(_) => {
                    stalled += POLL_SLICE;
                    if stalled >= LOW_SPEED_WINDOW {
                        return Err(VfsError::Timeout("upload conclusion stalled".to_string()));
                    }
                }
            }
        }
    }

    /// Cancels a pending upload, eating the resulting cancellation error.
    pub async fn abort_body_write(&mut self) -> VfsResult<()> {
        let Some(mut upload) = self.upload.take() else {
            return Ok(());
        };
        upload.channel.set_aborted();
        upload.channel.wake_stream();
        if timeout(POLL_SLICE, upload.outcome()).await.is_err() {
            upload.handle.abort();
        }
        Ok(())
    }

    /// Resets the connection so the pool can reuse it.
    pub fn clear(&mut self) {
        self.verb = None;
        self.url = None;
        self.headers.clear();
        self.fixed_body = None;
        self.upload_total = None;
        self.multiplexed = false;
        self.progress = None;
        self.download = None;
        if let Some(upload) = self.upload.take() {
            upload.handle.abort();
        }
        self.request_body = UploadChannel::new();
        self.response_status = None;
        self.response_headers = HeaderMap::new();
        self.response_body.clear();
    }

    fn build_request(&self, default_verb: Option<&str>) -> VfsResult<RequestBuilder> {
        let verb = self
            .verb
            .as_deref()
            .or(default_verb)
            .ok_or_else(|| VfsError::InvalidArgument("no request verb set".to_string()))?;
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| VfsError::InvalidArgument("no request URL set".to_string()))?;
        let method = Method::from_bytes(verb.as_bytes())
            .map_err(|_| VfsError::InvalidArgument(format!("bad request verb: {verb}")))?;

        let mut request = self.client.request(method, url);
        if !self.config.user.is_empty() {
            request = request.basic_auth(&self.config.user, Some(&self.config.passwd));
        }
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        Ok(request)
    }

    async fn ensure_download_started(&mut self) -> VfsResult<()> {
        if self.download.is_some() {
            return Ok(());
        }

        let request = self.build_request(Some("GET"))?;
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        self.response_status = Some(status);
        self.response_headers = response.headers().clone();
        if let Some(err) = http_error(status) {
            return Err(err);
        }

        self.download = Some(Download {
            stream: Box::pin(response.bytes_stream()),
            finished: false,
        });
        Ok(())
    }

    fn ensure_upload_started(&mut self) -> VfsResult<()> {
        if self.upload.is_some() {
            return Ok(());
        }

        let total = self.upload_total.ok_or_else(|| {
            VfsError::InvalidArgument("upload size was not declared".to_string())
        })?;
        let channel = self.request_body.clone();
        let body = reqwest::Body::wrap_stream(UploadBodyStream {
            channel: channel.clone(),
        });
        let request = self
            .build_request(Some("PUT"))?
            .header(CONTENT_LENGTH, total)
            .body(body);

        let handle = tokio::spawn(async move {
            let response = request.send().await.map_err(transport_error)?;
            Ok(response.status().as_u16())
        });

        self.upload = Some(Upload {
            channel,
            handle,
            outcome: None,
        });
        Ok(())
    }
}
