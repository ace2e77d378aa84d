//! Bounded, blocking FIFO channel for coordinating producer and consumer threads.
//!
//! The core is [`BoundedChannel`], a monitor-style queue: one mutex guarding the buffer and two
//! condition variables, one for "not full" and one for "not empty". On top of it:
//!
//! - [`task::Producer`] drains a finite source into a channel.
//! - [`task::Consumer`] drains a channel into a collection until it receives a sentinel item or
//!   finds the channel closed.
//! - [`pipeline::Pipeline`] runs a whole set of producers and consumers and shuts them down.
//!
//! ```
//! use sluice::pipeline::{Pipeline, PipelineConfig, Shutdown};
//!
//! let output = Pipeline::new(PipelineConfig::new(10), Shutdown::Sentinel(u32::MAX))
//!     .with_source(0..100)
//!     .run()
//!     .unwrap();
//! assert_eq!(output.into_items(), (0..100).collect::<Vec<_>>());
//! ```

#[macro_use]
extern crate tracing;

mod channel;
pub mod task;
pub mod pipeline;

#[cfg(test)]
mod test_util;

pub use crate::channel::api::*;

/// Error types
pub mod error {
    pub use crate::channel::error::*;
}
