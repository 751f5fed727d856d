//! Upload of compressed images to the detection endpoint.
//!
//! Each submission runs under one wall-clock budget. Within it, up to
//! `max_attempts` sends are made, each bounded by `attempt_timeout` (or
//! whatever is left of the budget, if less). Only `NetworkUnavailable` and
//! `Timeout` are retried, after a fixed `retry_delay`. Structured server
//! answers, success or failure, end the submission immediately. A failed
//! connectivity check before a send also ends it immediately.
//!
//! Each send runs on a worker thread while the caller polls the
//! `CancelHandle`. A cancel returns `Cancelled` at once; the abandoned request
//! is dropped when its per-attempt timeout closes the socket. A reply that
//! arrives after a cancel is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::compress::CompressedImage;
use crate::detect::DetectionResult;
use crate::error::{Error, Result};
use crate::transport::{
    parse_upload_response, Transport, TransportError, UploadRequest, UPLOAD_PATH,
};

/// How often a waiting submission re-checks its `CancelHandle`.
const CANCEL_POLL: Duration = Duration::from_millis(25);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    pub attempt_timeout: Duration,
    pub total_budget: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            total_budget: Duration::from_secs(60),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Shared flag that aborts a submission, including one waiting on a send.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

pub struct UploadClient {
    transport: Arc<dyn Transport>,
    policy: UploadPolicy,
}

impl UploadClient {
    pub fn new(transport: Arc<dyn Transport>, policy: UploadPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Submit one image and wait for the detection result.
    pub fn submit(
        &self,
        image: &CompressedImage,
        cancel: &CancelHandle,
    ) -> Result<DetectionResult> {
        let started = Instant::now();
        let deadline = started + self.policy.total_budget;
        let data_url = image.to_data_url();
        let body = serde_json::to_value(UploadRequest { image: &data_url })
            .map(Arc::new)
            .map_err(|e| Error::Encode(format!("upload body: {}", e)))?;
        let digest = image.digest_hex();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timeout_since(started));
            }
            let timeout = remaining.min(self.policy.attempt_timeout);

            // Offline fails fast: nothing is sent and no retry is scheduled.
            if !self.transport.is_online() {
                log::warn!("upload {}: no network connection", digest);
                return Err(Error::NetworkUnavailable(
                    "no network connection".to_string(),
                ));
            }

            log::info!(
                "upload {}: attempt {}/{} ({} bytes, timeout {}ms)",
                digest,
                attempt,
                max_attempts,
                image.estimated_size(),
                timeout.as_millis()
            );

            let err = match self.send_once(&body, timeout, started, cancel) {
                Ok(result) => {
                    log::info!(
                        "upload {}: {} class(es) detected",
                        digest,
                        result.detected_classes.len()
                    );
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= max_attempts {
                log::warn!(
                    "upload {}: giving up after attempt {}: {}",
                    digest,
                    attempt,
                    err
                );
                return Err(err);
            }
            log::warn!(
                "upload {}: attempt {} failed ({}); retrying in {}ms",
                digest,
                attempt,
                err,
                self.policy.retry_delay.as_millis()
            );
            self.wait_before_retry(deadline, cancel)?;
            if Instant::now() >= deadline {
                return Err(timeout_since(started));
            }
            attempt += 1;
        }
    }

    fn send_once(
        &self,
        body: &Arc<serde_json::Value>,
        timeout: Duration,
        started: Instant,
        cancel: &CancelHandle,
    ) -> Result<DetectionResult> {
        let (tx, rx) = mpsc::channel();
        let transport = Arc::clone(&self.transport);
        let payload = Arc::clone(body);
        thread::Builder::new()
            .name("upload-send".to_string())
            .spawn(move || {
                // The receiver is gone if the caller cancelled.
                let _ = tx.send(transport.post_json(UPLOAD_PATH, &payload, timeout));
            })
            .map_err(|e| Error::NetworkUnavailable(format!("spawn upload worker: {}", e)))?;

        let reply = loop {
            if cancel.is_cancelled() {
                log::info!("upload cancelled while waiting for the backend");
                return Err(Error::Cancelled);
            }
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(reply) => break reply,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::NetworkUnavailable(
                        "upload worker exited without a reply".to_string(),
                    ))
                }
            }
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match reply {
            Ok(response) => parse_upload_response(&response),
            Err(TransportError::Timeout) => Err(timeout_since(started)),
            Err(TransportError::Offline(detail)) | Err(TransportError::Connect(detail)) => {
                Err(Error::NetworkUnavailable(detail))
            }
        }
    }

    fn wait_before_retry(&self, deadline: Instant, cancel: &CancelHandle) -> Result<()> {
        let wake_at = (Instant::now() + self.policy.retry_delay).min(deadline);
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let now = Instant::now();
            if now >= wake_at {
                return Ok(());
            }
            thread::sleep((wake_at - now).min(CANCEL_POLL));
        }
    }
}

fn timeout_since(started: Instant) -> Error {
    Error::Timeout {
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
