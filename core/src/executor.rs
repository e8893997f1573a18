//! Blocking-looking request execution on a shared worker pool.
//!
//! # Design
//! `execute` validates and builds the request on the caller's thread, hands
//! the network exchange to a pool worker, then waits for the result with a
//! fixed ceiling. The caller is never blocked past the ceiling. On expiry the
//! job is flagged cancelled: a job that has not started yet returns without
//! touching the network, and one already in flight is cut off by the
//! transport's own deadline shortly after.
//!
//! `send` exposes the tagged result; `execute` collapses it to `bool` after
//! logging, so no failure ever reaches the caller as a panic or error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::{redact_key, RestClient};
use crate::config::ExecutorConfig;
use crate::context::{ContextHandle, ExecutionContext};
use crate::error::RequestError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::RequestDescriptor;

type Outcome = Result<HttpResponse, RequestError>;

pub struct RequestExecutor<T: Transport = UreqTransport> {
    context: ContextHandle,
    transport: Arc<T>,
    client: RestClient,
    config: ExecutorConfig,
}

impl<T: Transport> Clone for RequestExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            transport: Arc::clone(&self.transport),
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

impl RequestExecutor<UreqTransport> {
    pub fn new(context: &ExecutionContext, config: ExecutorConfig) -> Self {
        let transport = UreqTransport::new(&config);
        Self::with_transport(context, transport, config)
    }
}

impl<T: Transport> RequestExecutor<T> {
    pub fn with_transport(context: &ExecutionContext, transport: T, config: ExecutorConfig) -> Self {
        Self {
            context: context.handle(),
            transport: Arc::new(transport),
            client: RestClient::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Issue one request and report whether the server answered with a 2xx status.
    ///
    /// `json_body` of `None` or `""` sends no payload. Every failure,
    /// including timeout, transport errors and malformed input, yields `false`.
    pub fn execute(&self, url: &str, method: &str, json_body: Option<&str>, api_key: &str) -> bool {
        self.send(RequestDescriptor::new(url, method, json_body, api_key))
            .is_ok()
    }

    /// Like `execute`, but keeps the response or the categorized failure.
    pub fn send(&self, descriptor: RequestDescriptor) -> Result<HttpResponse, RequestError> {
        self.submit(descriptor)?.wait()
    }

    /// Schedule a request without waiting for it.
    ///
    /// The ceiling starts counting here, not at `wait`.
    pub fn submit(&self, descriptor: RequestDescriptor) -> Result<PendingRequest, RequestError> {
        let id = Uuid::new_v4();
        let request = self.client.build_request(&descriptor).inspect_err(|err| {
            error!(request_id = %id, url = %descriptor.url, "rejected request: {err}");
        })?;

        log_request(id, &request, &descriptor.api_key, &self.config);

        let (sender, receiver) = mpsc::sync_channel::<Outcome>(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        let job = {
            let transport = Arc::clone(&self.transport);
            let client = self.client.clone();
            let cancelled = Arc::clone(&cancelled);
            move || {
                if cancelled.load(Ordering::Acquire) {
                    debug!(request_id = %id, "caller gave up before dispatch, skipping");
                    return;
                }
                let outcome = dispatch(id, transport.as_ref(), &client, request);
                // The caller may have timed out and dropped the receiver.
                let _ = sender.send(outcome);
            }
        };

        let started = Instant::now();
        self.context.spawn(job).inspect_err(|err| {
            error!(request_id = %id, "could not schedule request: {err}");
        })?;

        Ok(PendingRequest {
            id,
            receiver,
            cancelled,
            started,
            deadline: started + self.config.call_timeout,
        })
    }
}

/// Handle to a scheduled request.
///
/// Dropping it without waiting cancels the request if it has not started.
pub struct PendingRequest {
    id: Uuid,
    receiver: Receiver<Outcome>,
    cancelled: Arc<AtomicBool>,
    started: Instant,
    deadline: Instant,
}

impl PendingRequest {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Block until the worker reports or the ceiling passes.
    pub fn wait(self) -> Result<HttpResponse, RequestError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.receiver.recv_timeout(remaining) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                self.cancel();
                let after = self.started.elapsed();
                error!(request_id = %self.id, ?after, "request timed out");
                Err(RequestError::Timeout { after })
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(request_id = %self.id, "worker exited without a result");
                Err(RequestError::WorkerLost)
            }
        }
    }

    /// Non-blocking check; `None` while the exchange is still running.
    pub fn try_result(&self) -> Option<Result<HttpResponse, RequestError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(RequestError::WorkerLost)),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs on the worker: one exchange, then classification and logging.
fn dispatch<T: Transport + ?Sized>(
    id: Uuid,
    transport: &T,
    client: &RestClient,
    request: HttpRequest,
) -> Outcome {
    let response = match transport.send(&request) {
        Ok(response) => response,
        Err(err) => {
            error!(request_id = %id, "exception in HTTP request: {err}");
            return Err(err);
        }
    };

    debug!(request_id = %id, status = response.status, "response code");
    debug!(request_id = %id, body = %response.body, "response body");

    match client.parse_response(response) {
        Ok(response) => {
            info!(request_id = %id, status = response.status, "request successful");
            Ok(response)
        }
        Err(err) => {
            if let RequestError::Status { status, body, diagnostic } = &err {
                warn!(request_id = %id, status, "request failed: {body}");
                if let Some(diagnostic) = diagnostic {
                    error!(request_id = %id, status, ?diagnostic, "gateway error: {diagnostic}");
                }
            }
            Err(err)
        }
    }
}

fn log_request(id: Uuid, request: &HttpRequest, api_key: &str, config: &ExecutorConfig) {
    debug!(request_id = %id, method = %request.method, url = %request.url, "making request");
    let redacted = redact_key(api_key, config.key_prefix_len);
    for (name, value) in &request.headers {
        let shown = if name.eq_ignore_ascii_case("authorization") {
            format!("Bearer {redacted}")
        } else if name.eq_ignore_ascii_case("apikey") {
            redacted.clone()
        } else {
            value.clone()
        };
        debug!(request_id = %id, "  {name}: {shown}");
    }
    if let Some(body) = &request.body {
        let preview: String = body.chars().take(config.body_preview_len).collect();
        debug!(request_id = %id, len = body.len(), "sending JSON data: {preview}...");
    }
}
