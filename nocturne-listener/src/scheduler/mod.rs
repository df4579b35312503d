//! Scheduler layer for the listener
//!
//! This layer owns the polling side: the generic feed watcher that detects
//! newly appended items, and the job feed that reads the registry for it.

pub mod feed;
pub mod watcher;

pub use feed::JobFeed;
pub use watcher::{FeedWatcher, WatcherConfig};
