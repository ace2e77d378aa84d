// producer task: drains a finite source into a channel.

use super::pace;
use crate::{
    BoundedChannel,
    error::{PutError, PutErrorCause},
};
use std::{
    io,
    thread::{self, JoinHandle},
    time::Duration,
};


/// Task that puts every item of a finite source into a channel, in source order
///
/// The producer never puts a sentinel and never closes the channel. It stops early only if the
/// channel is closed or cancelled under it, in which case the rejected item is returned in the
/// error.
pub struct Producer<I: IntoIterator> {
    source: I,
    channel: BoundedChannel<I::Item>,
    pacing: Option<Duration>,
    name: String,
}

/// Summary of a producer that ran to completion
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProducerReport {
    /// The producer's name
    pub name: String,
    /// Number of items put
    pub put: usize,
}

impl<I: IntoIterator> Producer<I> {
    /// Construct a producer that drains `source` into `channel`
    pub fn new(source: I, channel: BoundedChannel<I::Item>) -> Self {
        Producer {
            source,
            channel,
            pacing: None,
            name: String::from("producer"),
        }
    }

    /// Set a delay to sleep for after each put
    pub fn set_pacing(&mut self, pacing: Duration) -> &mut Self {
        self.pacing = Some(pacing);
        self
    }

    /// Ownership-chaining version of [`set_pacing`](Self::set_pacing)
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.set_pacing(pacing);
        self
    }

    /// Set the name used in log events and as the thread name when spawned
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Ownership-chaining version of [`set_name`](Self::set_name)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    /// Run the producer on the current thread until the source is exhausted
    pub fn run(self) -> Result<ProducerReport, PutError<I::Item, PutErrorCause>> {
        let Producer { source, channel, pacing, name } = self;
        debug!(producer = %name, "producer started");

        let mut put = 0;
        for item in source {
            trace!(producer = %name, put, len = channel.len(), "producer putting item");
            if let Err(e) = channel.put(item) {
                warn!(producer = %name, put, cause = %e.cause, "producer cut off");
                return Err(e);
            }
            put += 1;
            pace(pacing);
        }

        debug!(producer = %name, put, "producer finished");
        Ok(ProducerReport { name, put })
    }

    /// Spawn a thread, named after this producer, that runs it
    pub fn spawn(
        self,
    ) -> io::Result<JoinHandle<Result<ProducerReport, PutError<I::Item, PutErrorCause>>>>
    where
        I: Send + 'static,
        I::Item: Send + 'static,
    {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || self.run())
    }
}
