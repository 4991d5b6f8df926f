//! Result delivery contexts.
//!
//! Asynchronous page requests hand their completion to a [`Delivery`] once
//! the render finishes. The caller chooses where completions run:
//!
//! - [`Inline`]: on the worker thread that finished the render
//! - [`RuntimeDelivery`]: as a task on a tokio runtime
//! - [`DeliveryQueue`]: queued for an owner thread to drain, the analogue of
//!   handing results to a UI thread

use std::sync::{Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::RenderError;
use crate::raster::RasterImage;

/// A unit of delivery work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where completions are executed.
pub trait Delivery: Send + Sync + 'static {
    fn deliver(&self, job: Job);
}

/// Run completions directly on the thread that produced the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Delivery for Inline {
    fn deliver(&self, job: Job) {
        job();
    }
}

/// Run completions as tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeDelivery {
    handle: Handle,
}

impl RuntimeDelivery {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Deliver on the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Delivery for RuntimeDelivery {
    fn deliver(&self, job: Job) {
        self.handle.spawn(async move { job() });
    }
}

// =============================================================================
// Delivery Queue
// =============================================================================

/// Sending half of a [`DeliveryQueue`]; pass clones as the delivery context.
#[derive(Debug, Clone)]
pub struct QueueDelivery {
    tx: UnboundedSender<Job>,
}

impl Delivery for QueueDelivery {
    fn deliver(&self, job: Job) {
        // If the owner dropped the queue the job is dropped with the error,
        // which resolves any pending completion as cancelled.
        let _ = self.tx.send(job);
    }
}

/// Completion queue drained by a single owner thread.
///
/// Completions only run inside [`run_pending`](Self::run_pending) or
/// [`run_next`](Self::run_next), on whichever thread calls them.
pub struct DeliveryQueue {
    tx: UnboundedSender<Job>,
    rx: Mutex<UnboundedReceiver<Job>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Delivery context feeding this queue.
    pub fn sender(&self) -> QueueDelivery {
        QueueDelivery {
            tx: self.tx.clone(),
        }
    }

    /// Run every completion queued so far without waiting. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = {
                let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
                match rx.try_recv() {
                    Ok(job) => job,
                    Err(_) => break,
                }
            };
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next completion and run it.
    pub async fn run_next(&mut self) -> bool {
        let rx = self.rx.get_mut().unwrap_or_else(PoisonError::into_inner);
        match rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Completion Guard
// =============================================================================

type CompletionFn = Box<dyn FnOnce(Result<RasterImage, RenderError>) + Send + 'static>;

/// Owns a completion callback and guarantees it runs exactly once.
///
/// If the guard is dropped before [`complete`](Self::complete) (the task was
/// dropped by a shutting-down runtime, or a delivery job was discarded), the
/// callback receives [`RenderError::Cancelled`].
pub(crate) struct CompletionGuard {
    callback: Option<CompletionFn>,
}

impl CompletionGuard {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<RasterImage, RenderError>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub(crate) fn complete(mut self, result: Result<RasterImage, RenderError>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err(RenderError::Cancelled));
        }
    }
}
