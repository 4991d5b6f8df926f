//! Page request coordination.
//!
//! This module ties the cache and rasterizer together:
//!
//! - [`RenderCoordinator`]: synchronous and asynchronous page access with
//!   de-duplication of concurrent misses
//! - [`Prefetcher`]: background walk that warms the cache on open
//! - [`Delivery`]: where asynchronous completions run
//! - [`CancellationToken`]: stops queued work when a document closes

mod cancel;
mod coordinator;
mod delivery;
mod prefetch;

pub use cancel::CancellationToken;
pub use coordinator::{AllPages, RenderCoordinator};
pub use delivery::{Delivery, DeliveryQueue, Inline, Job, QueueDelivery, RuntimeDelivery};
pub use prefetch::{PrefetchReport, Prefetcher};
