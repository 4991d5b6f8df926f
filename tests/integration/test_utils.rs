//! Test utilities for integration tests.
//!
//! This module provides mock page sources that track draw calls, fail on
//! chosen pages, or block until released, plus helpers for writing
//! manifests to temporary directories.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use image::Rgba;
use tokio::runtime::Handle;

use page_raster::error::SourceError;
use page_raster::{
    Document, PageCache, PageIndex, PageSize, PageSource, Rasterizer, RenderConfig,
    RenderCoordinator, Surface, Transform,
};

// =============================================================================
// Gate
// =============================================================================

/// A latch that blocks drawing threads until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }
}

// =============================================================================
// Mock Page Source with Draw Tracking
// =============================================================================

/// A page source that counts draws and can fail or block on demand.
///
/// Each page is filled with a solid colour derived from its index so tests
/// can tell rendered pages apart.
pub struct MockPageSource {
    sizes: Vec<PageSize>,
    failing: HashSet<usize>,
    unavailable: HashSet<usize>,
    gate: Option<Arc<Gate>>,
    page_gates: HashMap<usize, Arc<Gate>>,
    delay: Duration,
    draws: AtomicUsize,
    draws_per_page: Mutex<Vec<usize>>,
}

impl MockPageSource {
    pub fn new(sizes: Vec<PageSize>) -> Self {
        let count = sizes.len();
        Self {
            sizes,
            failing: HashSet::new(),
            unavailable: HashSet::new(),
            gate: None,
            page_gates: HashMap::new(),
            delay: Duration::ZERO,
            draws: AtomicUsize::new(0),
            draws_per_page: Mutex::new(vec![0; count]),
        }
    }

    /// `count` letter-sized pages.
    pub fn letter(count: usize) -> Self {
        Self::new(vec![PageSize::new(612.0, 792.0); count])
    }

    /// Drawing this page reports a malformed page.
    pub fn failing_on(mut self, index: usize) -> Self {
        self.failing.insert(index);
        self
    }

    /// Drawing this page reports the backing file as unavailable.
    pub fn unavailable_on(mut self, index: usize) -> Self {
        self.unavailable.insert(index);
        self
    }

    /// Every draw blocks until `gate` opens.
    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Draws of this page block until `gate` opens.
    pub fn gated_on(mut self, index: usize, gate: Arc<Gate>) -> Self {
        self.page_gates.insert(index, gate);
        self
    }

    /// Every draw sleeps for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn draw_count(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }

    pub fn draws_of(&self, index: usize) -> usize {
        self.draws_per_page.lock().unwrap()[index - 1]
    }
}

pub fn page_color(index: PageIndex) -> Rgba<u8> {
    Rgba([(index.get() * 40 % 256) as u8, 0, 128, 255])
}

impl PageSource for MockPageSource {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, index: PageIndex) -> Result<PageSize, SourceError> {
        self.sizes
            .get(index.get().wrapping_sub(1))
            .copied()
            .ok_or(SourceError::MissingPage(index))
    }

    fn draw_page(
        &self,
        index: PageIndex,
        surface: &mut Surface,
        transform: &Transform,
    ) -> Result<(), SourceError> {
        self.draws.fetch_add(1, Ordering::SeqCst);
        self.draws_per_page.lock().unwrap()[index.get() - 1] += 1;

        if let Some(ref gate) = self.gate {
            gate.wait();
        }
        if let Some(gate) = self.page_gates.get(&index.get()) {
            gate.wait();
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if self.failing.contains(&index.get()) {
            return Err(SourceError::MalformedPage {
                index,
                reason: "corrupt content stream".to_string(),
            });
        }
        if self.unavailable.contains(&index.get()) {
            return Err(SourceError::Unavailable("file removed".to_string()));
        }

        let size = self.page_size(index)?;
        let (x0, y0) = transform.apply(0.0, 0.0);
        let (x1, y1) = transform.apply(size.width, size.height);
        surface.fill_rect(x0, y0, x1, y1, page_color(index));
        Ok(())
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn coordinator(source: Arc<MockPageSource>, workers: usize) -> Arc<RenderCoordinator> {
    Arc::new(RenderCoordinator::new(
        source,
        Rasterizer::default(),
        PageCache::new(),
        Handle::current(),
        workers,
    ))
}

pub fn document(source: Arc<MockPageSource>, config: RenderConfig) -> Document {
    Document::from_source("mock.pdf", source, config, Handle::current()).unwrap()
}

/// Run a blocking closure on the blocking pool and wait for it.
pub async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

// =============================================================================
// Manifests
// =============================================================================

pub fn write_manifest(dir: &tempfile::TempDir, name: &str, json: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, json).unwrap();
    path
}

/// Three pages: portrait letter, landscape 200x100, and a square with a red
/// block in its top half.
pub const THREE_PAGE_MANIFEST: &str = r#"{
    "pages": [
        { "width": 612, "height": 792 },
        { "width": 200, "height": 100 },
        {
            "width": 100,
            "height": 100,
            "shapes": [
                { "x": 0, "y": 50, "width": 100, "height": 50, "color": [255, 0, 0, 255] }
            ]
        }
    ]
}"#;

/// SHA-256 of "hunter2".
pub const HUNTER2_SHA256: &str =
    "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7";

pub fn protected_manifest(password_sha256: &str) -> String {
    format!(
        r#"{{ "password_sha256": "{}", "pages": [ {{ "width": 100, "height": 100 }} ] }}"#,
        password_sha256
    )
}
