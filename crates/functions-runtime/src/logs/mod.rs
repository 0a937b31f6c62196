//! Structured function logging.
//!
//! Every invocation gets its own log pipeline:
//!
//! ```text
//!                     ┌──────────────┐
//!                     │    Logger    │  (leveled methods, enrichment)
//!                     └──────┬───────┘
//!                            │ serialized entries
//!                            v
//!                  ┌─────────────────┐
//!                  │   Log Buffer    │  (probe, batch by level/count/size/idle)
//!                  │    Service      │
//!                  └─────────┬───────┘
//!                            │ ordered batches
//!                            v
//!                     ┌──────────────┐
//!                     │  Transport   │  (host supplied, stdout by default)
//!                     └──────────────┘
//! ```
//!
//! # Components
//!
//! - **[`logger`]**: Immutable logger facade handed down call chains
//! - **[`enrichment`]**: Copy-on-write chain of reserved and custom fields
//! - **[`serializer`]**: Renders one line to JSON and normalizes errors
//! - **[`buffer`]**: Single task owning queued entries and the transport mode
//! - **[`transport`]**: The delivery seam and the stdout transport
//! - **[`level`]** / **[`clock`]**: Severity ordering and line timestamps

pub mod buffer;
pub mod clock;
pub mod constants;
pub mod enrichment;
pub mod entry;
pub mod level;
pub mod logger;
pub mod serializer;
pub mod transport;
