//! Producer and consumer tasks that run against a [`BoundedChannel`](crate::BoundedChannel).
//!
//! Each task is configured up front, then either [run](Producer::run) on the current thread or
//! [spawned](Producer::spawn) onto a named thread of its own. Neither task enqueues a stop signal by
//! itself: ending the stream is the job of whoever joins the producers, which is what
//! [`Pipeline`](crate::pipeline::Pipeline) does.

mod producer;
mod consumer;

pub use self::{
    producer::{Producer, ProducerReport},
    consumer::{Consumer, ConsumerReport, StopReason},
};

use std::{
    thread,
    time::Duration,
};


// sleep for the pacing delay, if there is one.
fn pace(pacing: Option<Duration>) {
    if let Some(delay) = pacing.filter(|delay| !delay.is_zero()) {
        thread::sleep(delay);
    }
}
