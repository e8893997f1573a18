//! Blocking REST request helper for Supabase-style gateways.
//!
//! # Overview
//! `RequestExecutor::execute(url, method, json_body, api_key) -> bool` sends
//! one authenticated JSON request and reports whether the server answered
//! with a 2xx status. The network exchange runs on a worker from a
//! host-owned `ExecutionContext`; the caller blocks for at most a fixed
//! ceiling (30 s by default) and never sees an error or panic.
//!
//! # Design
//! - `RestClient` builds requests and classifies responses without I/O.
//! - `Transport` performs one blocking exchange; `UreqTransport` is the
//!   production implementation, tests plug in fakes.
//! - `ExecutionContext` is constructed and shut down by the host, never
//!   global.
//! - `send` returns the tagged `RequestError` behind the boolean for callers
//!   that need to tell a rejected request from a network failure.
//!
//! ```no_run
//! use restbridge_core::{Config, ExecutionContext, RequestExecutor};
//!
//! let config = Config::from_env()?;
//! let context = ExecutionContext::new(&config.pool)?;
//! let executor = RequestExecutor::new(&context, config.executor);
//! let ok = executor.execute(
//!     "https://project.supabase.co/rest/v1/items",
//!     "POST",
//!     Some(r#"{"name":"a"}"#),
//!     "anon-key",
//! );
//! context.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{diagnose, table_url, RestClient};
pub use config::{Config, ConfigError, ExecutorConfig, PoolConfig};
pub use context::{ContextHandle, ExecutionContext};
pub use error::{ContextError, Diagnostic, FailureKind, RequestError};
pub use executor::{PendingRequest, RequestExecutor};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::RequestDescriptor;
