//! Request-scoped input values.

use std::fmt;

/// Everything needed to issue one call: target, verb, optional JSON text, credential.
///
/// Fields stay as raw strings; `RestClient::build_request` validates the URL
/// and method. The API key is opaque and never inspected.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    pub body: Option<String>,
    pub api_key: String,
}

impl RequestDescriptor {
    /// An empty body is the same as no body.
    pub fn new(url: &str, method: &str, body: Option<&str>, api_key: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            body: body.filter(|b| !b.is_empty()).map(str::to_string),
            api_key: api_key.to_string(),
        }
    }
}

// Manual impl keeps the credential out of debug output.
impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("body_len", &self.body.as_ref().map(String::len))
            .field("api_key", &crate::client::redact_key(&self.api_key, 4))
            .finish()
    }
}
