//! Prefetch integration tests.
//!
//! Tests verify:
//! - Prefetch warms every page without blocking construction
//! - all_pages after prefetch performs no new renders
//! - Closing a document stops the walk and cancels queued work
//! - Cache trimming under memory pressure

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use page_raster::{Inline, PageIndex, RenderConfig, RenderError};

use super::test_utils::{blocking, document, Gate, MockPageSource};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_construction_does_not_wait_for_prefetch() {
    let gate = Gate::new();
    let source = Arc::new(MockPageSource::letter(5).gated(Arc::clone(&gate)));

    let started = Instant::now();
    let document = document(Arc::clone(&source), RenderConfig::default());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(document.page_count(), 5);

    gate.open();
    let report = document.wait_for_prefetch().await.unwrap();
    assert_eq!(report.warmed, 5);
    assert!(!report.cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_all_pages_after_prefetch_renders_nothing() {
    let source = Arc::new(MockPageSource::letter(6).failing_on(4));
    let document = Arc::new(document(Arc::clone(&source), RenderConfig::default()));

    let report = document.wait_for_prefetch().await.unwrap();
    assert_eq!(report.warmed, 5);
    assert_eq!(report.failed, 1);

    let renders_before = document.render_count();
    let hits_before = document.cache_stats().hits;

    let d = Arc::clone(&document);
    let pages = blocking(move || d.all_pages().count()).await;

    assert_eq!(pages, 5);
    // Only the failed page is attempted again
    assert_eq!(document.render_count(), renders_before + 1);
    assert_eq!(document.cache_stats().hits, hits_before + 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_during_prefetch_shares_render() {
    let gate = Gate::new();
    let source = Arc::new(MockPageSource::letter(1).gated(Arc::clone(&gate)));
    let document = Arc::new(document(Arc::clone(&source), RenderConfig::default()));

    // Prefetch is now blocked inside page 1
    while source.draw_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    document.get_page_async(PageIndex::FIRST, Inline, move |result| {
        let _ = tx.send(result);
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.open();

    assert!(rx.await.unwrap().is_ok());
    assert_eq!(document.wait_for_prefetch().await.unwrap().warmed, 1);
    assert_eq!(source.draws_of(1), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_stops_prefetch() {
    let source = Arc::new(MockPageSource::letter(50).with_delay(Duration::from_millis(10)));
    let document = document(Arc::clone(&source), RenderConfig::default());

    tokio::time::sleep(Duration::from_millis(35)).await;
    document.close();

    let report = document.wait_for_prefetch().await.unwrap();
    assert!(report.cancelled);
    assert!(report.warmed < 50);

    // At most the page in progress at close time finished afterwards
    let draws = source.draw_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.draw_count(), draws);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_cancels_queued_async_requests() {
    let gate = Gate::new();
    let source = Arc::new(MockPageSource::letter(4).gated(Arc::clone(&gate)));
    let config = RenderConfig::default()
        .with_prefetch(false)
        .with_render_workers(1);
    let document = document(Arc::clone(&source), config);

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for index in 1..=4 {
        let tx = tx.clone();
        let counter = Arc::clone(&calls);
        document.get_page_async(PageIndex::new(index), Inline, move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        });
    }
    drop(tx);

    // One render holds the only worker slot; the other three are queued
    while source.draw_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    document.close();
    gate.open();

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }

    assert_eq!(results.len(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(RenderError::Cancelled)))
            .count(),
        3
    );
    assert_eq!(source.draw_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_document_cancels_work() {
    let gate = Gate::new();
    let source = Arc::new(MockPageSource::letter(3).gated(Arc::clone(&gate)));
    let config = RenderConfig::default()
        .with_prefetch(false)
        .with_render_workers(1);
    let document = document(Arc::clone(&source), config);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for index in 1..=3 {
        let tx = tx.clone();
        document.get_page_async(PageIndex::new(index), Inline, move |result| {
            let _ = tx.send(result.is_ok());
        });
    }
    drop(tx);

    while source.draw_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drop(document);
    gate.open();

    let mut succeeded = 0;
    let mut total = 0;
    while let Some(ok) = rx.recv().await {
        total += 1;
        succeeded += ok as usize;
    }
    assert_eq!(total, 3);
    assert_eq!(succeeded, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trim_cache_then_rerender() {
    let source = Arc::new(MockPageSource::letter(3));
    let document = Arc::new(document(Arc::clone(&source), RenderConfig::default()));
    document.wait_for_prefetch().await.unwrap();

    let page_bytes = 185 * 240 * 4;
    assert_eq!(document.cache_stats().bytes, 3 * page_bytes);

    // Keep room for one page: the two least recently used go
    assert_eq!(document.trim_cache(page_bytes), 2);
    assert_eq!(document.cache_stats().entries, 1);

    let d = Arc::clone(&document);
    assert_eq!(blocking(move || d.all_pages().count()).await, 3);
    assert_eq!(source.draw_count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_prefetched_document_larger_than_byte_budget_stays_warm() {
    // 100 letter pages at device scale 2 are 371x480 RGBA each, about
    // 71MB in total: more than the default PageCache::new() budget.
    let source = Arc::new(MockPageSource::letter(100));
    let config = RenderConfig::default().with_device_scale(2.0);
    let document = Arc::new(document(Arc::clone(&source), config));

    let report = document.wait_for_prefetch().await.unwrap();
    assert_eq!(report.warmed, 100);
    assert!(document.cache_stats().bytes > page_raster::cache::DEFAULT_PAGE_CACHE_BYTES);

    let renders_before = document.render_count();
    let d = Arc::clone(&document);
    let pages = blocking(move || d.all_pages().count()).await;

    assert_eq!(pages, 100);
    assert_eq!(document.render_count(), renders_before);
    assert_eq!(source.draw_count(), 100);
    assert_eq!(document.cache_stats().evictions, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_explicit_byte_budget_still_evicts() {
    let page_bytes = 185 * 240 * 4;
    let source = Arc::new(MockPageSource::letter(4));
    let config = RenderConfig::default().with_cache_bytes(2 * page_bytes);
    let document = document(Arc::clone(&source), config);

    document.wait_for_prefetch().await.unwrap();

    let stats = document.cache_stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.evictions, 2);
}
