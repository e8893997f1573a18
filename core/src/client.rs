//! Stateless request builder and response classifier for Supabase-style REST gateways.
//!
//! # Design
//! `RestClient` carries only header policy (dual credential headers, the
//! `Prefer` value) and no per-call state. `build_request` turns a
//! `RequestDescriptor` into an `HttpRequest`; `parse_response` classifies an
//! `HttpResponse` by status. The `RequestExecutor` runs the network exchange
//! between the two, so everything in this module is deterministic.

use url::Url;

use crate::config::ExecutorConfig;
use crate::error::{Diagnostic, RequestError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::RequestDescriptor;

pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone)]
pub struct RestClient {
    dual_auth_header: bool,
    prefer: Option<String>,
}

impl RestClient {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            dual_auth_header: config.dual_auth_header,
            prefer: config.prefer.clone(),
        }
    }

    /// Validate the descriptor and attach the gateway headers.
    ///
    /// Header order is fixed: `Content-Type`, `Authorization`, `apikey` (dual
    /// mode only), `Prefer` (when configured).
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, RequestError> {
        let url = parse_url(&descriptor.url)?;
        let method: HttpMethod = descriptor.method.parse()?;

        let mut headers = vec![
            ("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string()),
            (
                "Authorization".to_string(),
                format!("Bearer {}", descriptor.api_key),
            ),
        ];
        if self.dual_auth_header {
            headers.push(("apikey".to_string(), descriptor.api_key.clone()));
        }
        if let Some(prefer) = &self.prefer {
            headers.push(("Prefer".to_string(), prefer.clone()));
        }

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body: descriptor.body.clone().filter(|b| !b.is_empty()),
        })
    }

    /// `Ok` for `[200, 300)`, otherwise `RequestError::Status` carrying the raw body.
    pub fn parse_response(&self, response: HttpResponse) -> Result<HttpResponse, RequestError> {
        if response.is_success() {
            return Ok(response);
        }
        let diagnostic = diagnose(response.status, &response.body);
        Err(RequestError::Status {
            status: response.status,
            body: response.body,
            diagnostic,
        })
    }
}

/// Recognise the common gateway failures from status and body text.
pub fn diagnose(status: u16, body: &str) -> Option<Diagnostic> {
    match status {
        401 if body.contains("No API key found") => Some(Diagnostic::MissingApiKey),
        401 if body.contains("Invalid API key") => Some(Diagnostic::InvalidApiKey),
        401 => Some(Diagnostic::Unauthorized),
        400 => Some(Diagnostic::MalformedBody),
        404 => Some(Diagnostic::NotFound),
        _ => None,
    }
}

/// `<base>/rest/v1/<table>`, tolerating a trailing slash on the base.
pub fn table_url(base_url: &str, table: &str) -> String {
    format!(
        "{}/rest/v1/{}",
        base_url.trim_end_matches('/'),
        table.trim_start_matches('/')
    )
}

/// Keep the first `keep` characters of a credential, mask the rest.
pub fn redact_key(key: &str, keep: usize) -> String {
    let prefix: String = key.chars().take(keep).collect();
    format!("{prefix}...")
}

fn parse_url(raw: &str) -> Result<Url, RequestError> {
    let invalid = |reason: String| RequestError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
