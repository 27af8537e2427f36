//! On-disk snapshots of collections.

mod io_utils;
mod snapshot_manager;

pub use io_utils::{classify_io_error, RetryPolicy};
pub use snapshot_manager::{Manifest, SnapshotManager};
