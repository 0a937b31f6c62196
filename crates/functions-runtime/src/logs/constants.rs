//! Batching limits for the function log buffer.
//!
//! Once the buffer knows its transport completes asynchronously it batches
//! entries until one of these limits is reached:
//! - **Count**: [`MAX_BATCH_ENTRIES`] queued entries
//! - **Size**: [`MAX_BATCH_BYTES`] cumulative serialized bytes
//! - **Idle**: [`IDLE_FLUSH_INTERVAL`] after the first queued entry
//!
//! Error and fatal lines bypass all three and flush immediately.

use std::time::Duration;

/// Maximum number of queued entries before a flush is dispatched.
///
/// # Value: 8 entries
///
/// Function invocations are short; small batches keep log latency low while
/// still collapsing bursts of lines into a single transport call.
pub(crate) const MAX_BATCH_ENTRIES: usize = 8;

/// Maximum cumulative serialized size, in bytes, before a flush is dispatched.
///
/// # Value: 64,000 bytes
///
/// Kept under the 64KiB request limit common to log ingestion endpoints.
pub(crate) const MAX_BATCH_BYTES: usize = 64_000;

/// Delay after the first queued entry before the buffer flushes on its own.
///
/// # Value: 2 seconds
pub(crate) const IDLE_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
