//! Background cache warming.
//!
//! When a document opens, a [`Prefetcher`] walks every page in ascending
//! order through the synchronous render path so later requests hit the
//! cache. Pages already rendered (or being rendered) by a caller are shared
//! through the coordinator's de-duplication, never rendered twice.

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::source::PageIndex;

use super::cancel::CancellationToken;
use super::coordinator::RenderCoordinator;

/// Outcome of one prefetch walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    /// Pages now available from the cache.
    pub warmed: usize,
    /// Pages whose render failed.
    pub failed: usize,
    /// True if the walk stopped early because the document closed.
    pub cancelled: bool,
}

impl PrefetchReport {
    /// Pages the walk visited.
    pub fn visited(&self) -> usize {
        self.warmed + self.failed
    }
}

/// Walks a document's pages to warm its cache.
#[derive(Debug)]
pub struct Prefetcher {
    coordinator: Arc<RenderCoordinator>,
    cancel: CancellationToken,
}

impl Prefetcher {
    pub fn new(coordinator: Arc<RenderCoordinator>) -> Self {
        let cancel = coordinator.cancel_token();
        Self {
            coordinator,
            cancel,
        }
    }

    /// Walk all pages on the calling thread.
    ///
    /// The cancellation token is checked before each page; a page already
    /// rendering when the token fires finishes first.
    pub fn run(&self) -> PrefetchReport {
        let started = Instant::now();
        let page_count = self.coordinator.page_count();
        let mut report = PrefetchReport::default();

        for index in PageIndex::all(page_count) {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.coordinator.get_page(index) {
                Ok(_) => report.warmed += 1,
                Err(RenderError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(page = %index, error = %e, "Prefetch failed for page");
                    report.failed += 1;
                }
            }
        }

        if report.cancelled {
            debug!(
                warmed = report.warmed,
                remaining = page_count - report.visited(),
                "Prefetch cancelled"
            );
        } else {
            info!(
                pages = page_count,
                warmed = report.warmed,
                failed = report.failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Prefetch complete"
            );
        }
        report
    }

    /// Run the walk on the blocking pool of `workers`.
    pub fn spawn(self, workers: &Handle) -> JoinHandle<PrefetchReport> {
        workers.spawn_blocking(move || self.run())
    }
}
