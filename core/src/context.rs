//! Host-owned worker pool.
//!
//! # Design
//! The pool is a tokio runtime used only for its blocking pool: threads are
//! spawned on demand up to `max_workers`, reused across jobs, and reaped
//! after `keep_alive` of idleness. The host constructs one context, hands
//! `ContextHandle`s to executors, and shuts it down explicitly. Once closed,
//! submissions fail with `RequestError::Shutdown` rather than racing the
//! teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use crate::config::PoolConfig;
use crate::error::{ContextError, RequestError};

pub struct ExecutionContext {
    runtime: Option<Runtime>,
    handle: Handle,
    closed: Arc<AtomicBool>,
    shutdown_grace: Duration,
}

impl ExecutionContext {
    pub fn new(config: &PoolConfig) -> Result<Self, ContextError> {
        if config.max_workers == 0 {
            return Err(ContextError::NoWorkers);
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.max_workers)
            .thread_keep_alive(config.keep_alive)
            .thread_name("restbridge-worker")
            .build()?;
        debug!(max_workers = config.max_workers, "execution context started");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            closed: Arc::new(AtomicBool::new(false)),
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            handle: self.handle.clone(),
            closed: Arc::clone(&self.closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the context, then wait up to the shutdown grace for in-flight jobs.
    pub fn shutdown(mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.shutdown_grace);
            info!("execution context shut down");
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Cheap, clonable capability to schedule jobs on an `ExecutionContext`.
#[derive(Clone)]
pub struct ContextHandle {
    handle: Handle,
    closed: Arc<AtomicBool>,
}

impl ContextHandle {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run a blocking job on a pool thread. Fails once the context is closed.
    pub(crate) fn spawn<F>(&self, job: F) -> Result<(), RequestError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(RequestError::Shutdown);
        }
        // The join handle is not needed; results travel over the job's own channel.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
