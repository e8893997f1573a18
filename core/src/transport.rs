use std::time::Duration;

use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder};

use crate::config::ExecutorConfig;
use crate::error::RequestError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Extra time the transport allows past the caller's ceiling before it abandons
/// the exchange itself. The caller always observes its own deadline first.
const CANCEL_GRACE: Duration = Duration::from_millis(250);

/// Blocking HTTP exchange, run on a worker thread.
///
/// Implementations perform exactly one request/response round-trip and must
/// return non-2xx responses as `Ok` data; status classification belongs to
/// `RestClient::parse_response`.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError>;
}

/// Production transport built on a ureq agent.
///
/// The agent keeps no idle connections, so each exchange opens its own
/// connection and closes it when the response is dropped.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &ExecutorConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.call_timeout + CANCEL_GRACE))
            .timeout_connect(Some(config.connect_timeout))
            .timeout_recv_response(Some(config.read_timeout))
            .timeout_recv_body(Some(config.read_timeout))
            .max_idle_connections(0)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Wrap an agent configured elsewhere. It must not treat HTTP statuses as errors.
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(&ExecutorConfig::default())
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        let url = request.url.as_str();
        let body = request.body.as_deref().map(str::as_bytes);

        let result = match request.method {
            HttpMethod::Get => send_bodyless(self.agent.get(url), request),
            HttpMethod::Head => send_bodyless(self.agent.head(url), request),
            HttpMethod::Delete => send_bodyless(self.agent.delete(url), request),
            HttpMethod::Options => send_bodyless(self.agent.options(url), request),
            HttpMethod::Post => send_body(with_headers(self.agent.post(url), request), body),
            HttpMethod::Put => send_body(with_headers(self.agent.put(url), request), body),
            HttpMethod::Patch => send_body(with_headers(self.agent.patch(url), request), body),
        };

        let mut response = result.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        // Drained in full regardless of size; invalid UTF-8 decodes lossily.
        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(transport_error)?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Verbs without conventional body semantics still carry a caller-supplied payload.
fn send_bodyless(
    builder: RequestBuilder<WithoutBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<Body>, ureq::Error> {
    let builder = with_headers(builder, request);
    match request.body.as_deref() {
        Some(body) => builder.force_send_body().send(body.as_bytes()),
        None => builder.call(),
    }
}

fn send_body(
    builder: RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes),
        None => builder.send_empty(),
    }
}

fn transport_error(err: ureq::Error) -> RequestError {
    match err {
        ureq::Error::BadUri(reason) => RequestError::Transport(format!("bad URI: {reason}")),
        ureq::Error::Timeout(which) => RequestError::Transport(format!("timed out ({which:?})")),
        ureq::Error::HostNotFound => RequestError::Transport("host not found".to_string()),
        ureq::Error::ConnectionFailed => RequestError::Transport("connection failed".to_string()),
        ureq::Error::Io(e) => RequestError::Transport(format!("I/O error: {e}")),
        other => RequestError::Transport(other.to_string()),
    }
}
