//! Render coordinator.
//!
//! The coordinator is the entry point for page requests. It orchestrates:
//! - Index validation
//! - Cache lookups
//! - De-duplication of concurrent misses for the same page
//! - Rasterization on the calling thread or on the worker pool
//! - Result caching and delivery
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        RenderCoordinator                          │
//! │                                                                   │
//! │   get_page()  ────────────┐        get_page_async()               │
//! │   (calling thread)        │        (worker pool ─▶ Delivery)      │
//! │                           ▼                 │                     │
//! │                  ┌─────────────────┐        │                     │
//! │                  │  1. validate    │◀───────┘                     │
//! │                  │  2. cache       │                              │
//! │                  │  3. in-flight   │  leader renders,             │
//! │                  │  4. rasterize   │  followers wait and reuse    │
//! │                  └─────────────────┘                              │
//! │            │                │                    │                │
//! │            ▼                ▼                    ▼                │
//! │     ┌───────────┐   ┌──────────────┐    ┌──────────────┐          │
//! │     │ PageCache │   │  Rasterizer  │    │  PageSource  │          │
//! │     └───────────┘   └──────────────┘    └──────────────┘          │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace, warn};

use crate::cache::{CacheStats, PageCache};
use crate::error::RenderError;
use crate::raster::{RasterImage, Rasterizer};
use crate::source::{PageIndex, PageSource};

use super::cancel::CancellationToken;
use super::delivery::{CompletionGuard, Delivery};

type RenderResult = Result<RasterImage, RenderError>;

// =============================================================================
// In-flight State
// =============================================================================

/// A render that some thread is currently performing.
struct InFlightRender {
    result: Mutex<Option<RenderResult>>,
    ready: Condvar,
}

impl InFlightRender {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, result: RenderResult) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(result);
        self.ready.notify_all();
    }

    /// Block until the leader publishes its result.
    fn wait(&self) -> RenderResult {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(ref result) = *slot {
                return result.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Leadership of one in-flight render.
///
/// Dropping the leader without finishing (the page source panicked) still
/// releases the in-flight slot and wakes followers with a failure.
struct Leader<'a> {
    coordinator: &'a RenderCoordinator,
    index: PageIndex,
    state: Arc<InFlightRender>,
    finished: bool,
}

impl Leader<'_> {
    fn finish(mut self, result: RenderResult) -> RenderResult {
        if let Ok(ref image) = result {
            self.coordinator.cache.put(self.index, image.clone());
        }
        self.release(result.clone());
        self.finished = true;
        result
    }

    fn release(&self, result: RenderResult) {
        self.coordinator.in_flight().remove(&self.index);
        self.state.complete(result);
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release(Err(RenderError::RenderFailure {
                index: self.index,
                reason: "render aborted".to_string(),
            }));
        }
    }
}

// =============================================================================
// Render Coordinator
// =============================================================================

/// Serves page images from the cache, rendering and caching on miss.
///
/// Concurrent requests for the same missing page, through either access
/// path, share one physical render: the first requester renders and every
/// later requester waits for and reuses its result.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use page_raster::cache::PageCache;
/// use page_raster::raster::Rasterizer;
/// use page_raster::render::{Inline, RenderCoordinator};
/// use page_raster::source::{PageIndex, ShapeDocument, ShapePage};
///
/// # async fn example() {
/// let doc = ShapeDocument::new(vec![ShapePage::new(612.0, 792.0)]);
/// let coordinator = Arc::new(RenderCoordinator::new(
///     Arc::new(doc),
///     Rasterizer::default(),
///     PageCache::new(),
///     tokio::runtime::Handle::current(),
///     2,
/// ));
///
/// coordinator.get_page_async(PageIndex::FIRST, Inline, |result| {
///     if let Ok(image) = result {
///         println!("{}x{}", image.width(), image.height());
///     }
/// });
/// # }
/// ```
pub struct RenderCoordinator {
    source: Arc<dyn PageSource>,
    page_count: usize,
    rasterizer: Rasterizer,
    cache: PageCache,
    in_flight: Mutex<HashMap<PageIndex, Arc<InFlightRender>>>,
    workers: Handle,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    renders: AtomicU64,
}

impl RenderCoordinator {
    /// Create a coordinator.
    ///
    /// # Arguments
    ///
    /// * `source` - Page source to render from
    /// * `rasterizer` - Target box and device scale for rendered pages
    /// * `cache` - Cache owned by this coordinator for its whole lifetime
    /// * `workers` - Runtime whose blocking pool executes asynchronous renders
    /// * `render_workers` - Maximum asynchronous renders running at once
    pub fn new(
        source: Arc<dyn PageSource>,
        rasterizer: Rasterizer,
        cache: PageCache,
        workers: Handle,
        render_workers: usize,
    ) -> Self {
        let page_count = source.page_count();
        Self {
            source,
            page_count,
            rasterizer,
            cache,
            in_flight: Mutex::new(HashMap::new()),
            workers,
            permits: Arc::new(Semaphore::new(render_workers.max(1))),
            cancel: CancellationToken::new(),
            renders: AtomicU64::new(0),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Token cancelled when the coordinator shuts down.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop accepting work.
    ///
    /// Queued asynchronous renders complete with `Cancelled`; renders already
    /// rasterizing finish normally. Later requests fail with `Cancelled`.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            debug!(pages = self.page_count, "Render coordinator shutting down");
        }
        self.cancel.cancel();
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<PageIndex, Arc<InFlightRender>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_request(&self, index: PageIndex) -> Result<(), RenderError> {
        if !index.is_valid_for(self.page_count) {
            return Err(RenderError::PageOutOfRange {
                index,
                page_count: self.page_count,
            });
        }
        if self.cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        Ok(())
    }

    // =========================================================================
    // Synchronous Path
    // =========================================================================

    /// Get a page image, rendering it on the calling thread on a cache miss.
    ///
    /// Blocks for the duration of the render, or until a concurrent render of
    /// the same page finishes.
    ///
    /// # Errors
    ///
    /// - `PageOutOfRange` if `index` is outside `[1, page_count]`
    /// - `Cancelled` if the coordinator has shut down
    /// - `RenderFailure` / `SourceUnavailable` from the rasterizer
    pub fn get_page(&self, index: PageIndex) -> RenderResult {
        self.check_request(index)?;

        if let Some(image) = self.cache.get(index) {
            trace!(page = %index, "Page cache hit");
            return Ok(image);
        }

        self.render_deduplicated(index, None)
    }

    /// Render a missing page, or wait for the render already in progress.
    ///
    /// A worker `permit` is kept only by the leader; followers release it
    /// before waiting.
    fn render_deduplicated(
        &self,
        index: PageIndex,
        permit: Option<OwnedSemaphorePermit>,
    ) -> RenderResult {
        let leader = {
            let mut in_flight = self.in_flight();

            if let Some(state) = in_flight.get(&index) {
                // Another thread is rendering this page
                let state = Arc::clone(state);
                drop(in_flight);
                drop(permit);
                trace!(page = %index, "Waiting for in-flight render");
                return state.wait();
            }

            // A leader that finished between our cache miss and taking the
            // lock has already stored its result.
            if let Some(image) = self.cache.get(index) {
                return Ok(image);
            }

            let state = Arc::new(InFlightRender::new());
            in_flight.insert(index, Arc::clone(&state));
            Leader {
                coordinator: self,
                index,
                state,
                finished: false,
            }
        };

        let result = self.render_uncached(index);
        drop(permit);
        leader.finish(result)
    }

    /// Rasterize a page, bypassing cache and de-duplication.
    fn render_uncached(&self, index: PageIndex) -> RenderResult {
        self.renders.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let result = self.rasterizer.render(self.source.as_ref(), index);

        match result {
            Ok(ref image) => debug!(
                page = %index,
                width = image.width(),
                height = image.height(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Rendered page"
            ),
            Err(ref e) => warn!(page = %index, error = %e, "Page render failed"),
        }
        result
    }

    // =========================================================================
    // Asynchronous Path
    // =========================================================================

    /// Get a page image without blocking the caller.
    ///
    /// On a cache hit, or when the request is invalid, `completion` runs
    /// immediately on the calling thread. Otherwise one render task is queued
    /// on the worker pool and `completion` runs on `delivery` when it ends.
    ///
    /// `completion` is invoked exactly once per call. If the task is
    /// cancelled before it starts, or the worker pool shuts down, it receives
    /// `Cancelled`.
    pub fn get_page_async<D, F>(self: &Arc<Self>, index: PageIndex, delivery: D, completion: F)
    where
        D: Delivery,
        F: FnOnce(RenderResult) + Send + 'static,
    {
        if let Err(e) = self.check_request(index) {
            completion(Err(e));
            return;
        }

        if let Some(image) = self.cache.get(index) {
            trace!(page = %index, "Page cache hit");
            completion(Ok(image));
            return;
        }

        let completion = CompletionGuard::new(completion);
        let coordinator = Arc::clone(self);
        self.workers.spawn(async move {
            let result = coordinator.render_on_pool(index).await;
            delivery.deliver(Box::new(move || completion.complete(result)));
        });
    }

    /// Render on the blocking pool, holding a worker permit only while leading.
    ///
    /// A request for a page that is already rendering follows that render
    /// without taking a permit, so waiters never starve unrelated pages.
    async fn render_on_pool(self: Arc<Self>, index: PageIndex) -> RenderResult {
        let permit = if self.is_in_flight(index) {
            trace!(page = %index, "Following in-flight render");
            None
        } else {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
            };
            if permit.is_none() {
                debug!(page = %index, "Queued render cancelled");
                return Err(RenderError::Cancelled);
            }
            permit
        };

        let coordinator = Arc::clone(&self);
        let task = self.workers.spawn_blocking(move || {
            coordinator.check_request(index)?;
            if let Some(image) = coordinator.cache.get(index) {
                return Ok(image);
            }
            coordinator.render_deduplicated(index, permit)
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RenderError::Cancelled),
            Err(e) => Err(RenderError::RenderFailure {
                index,
                reason: format!("render task failed: {}", e),
            }),
        }
    }

    fn is_in_flight(&self, index: PageIndex) -> bool {
        self.in_flight().contains_key(&index)
    }

    // =========================================================================
    // Collect-all
    // =========================================================================

    /// Every page that renders successfully, in ascending index order.
    ///
    /// Pages are produced lazily through [`get_page`](Self::get_page), so
    /// iterating blocks the calling thread. Failed pages are skipped. Call
    /// again to restart; once the cache is warm, iteration is cheap.
    pub fn all_pages(&self) -> AllPages<'_> {
        AllPages {
            coordinator: self,
            remaining: 1..=self.page_count,
        }
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Number of physical renders performed so far.
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl std::fmt::Debug for RenderCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCoordinator")
            .field("page_count", &self.page_count)
            .field("rasterizer", &self.rasterizer)
            .field("cache", &self.cache)
            .field("renders", &self.render_count())
            .finish()
    }
}

// =============================================================================
// AllPages
// =============================================================================

/// Lazy iterator over the successfully rendered pages of a document.
pub struct AllPages<'a> {
    coordinator: &'a RenderCoordinator,
    remaining: RangeInclusive<usize>,
}

impl Iterator for AllPages<'_> {
    type Item = RasterImage;

    fn next(&mut self) -> Option<RasterImage> {
        while let Some(index) = self.remaining.next().map(PageIndex::new) {
            match self.coordinator.get_page(index) {
                Ok(image) => return Some(image),
                Err(RenderError::Cancelled) => {
                    self.remaining = 1..=0;
                    return None;
                }
                Err(e) => debug!(page = %index, error = %e, "Skipping page"),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.remaining.size_hint().1)
    }
}

// =============================================================================
// Tests
// =============================================================================
