//! Orchestration of producers and consumers around one channel.
//!
//! A [`Pipeline`] owns the lifecycle of a single run:
//!
//! 1. Create a [`BoundedChannel`] with the configured capacity.
//! 2. Spawn one consumer thread per configured consumer, and one producer thread per source.
//! 3. Join every producer.
//! 4. End the stream according to the [`Shutdown`] policy: put exactly one sentinel per consumer,
//!    or close the channel.
//! 5. Join every consumer.
//!
//! If any task panics, the channel is cancelled so that every other task unblocks, and the run
//! fails once all threads have been joined.

use crate::{
    BoundedChannel,
    ChannelStats,
    task::{Consumer, ConsumerReport, Producer, ProducerReport},
};
use anyhow::{anyhow, bail, Context, Error, Result};
use std::{
    any::Any,
    fmt::Debug,
    thread::JoinHandle,
    time::Duration,
};


const DEFAULT_CAPACITY: usize = 10;
const DEFAULT_THREAD_NAME_PREFIX: &str = "sluice";


/// Settings for a [`Pipeline`] run
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PipelineConfig {
    /// Channel capacity. Must be non-zero.
    pub capacity: usize,
    /// Number of consumer threads. Must be non-zero.
    pub consumers: usize,
    /// Delay each producer sleeps for after each put
    pub producer_pacing: Option<Duration>,
    /// Delay each consumer sleeps for after each item received
    pub consumer_pacing: Option<Duration>,
    /// Prefix of spawned thread names
    pub thread_name_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            capacity: DEFAULT_CAPACITY,
            consumers: 1,
            producer_pacing: None,
            consumer_pacing: None,
            thread_name_prefix: String::from(DEFAULT_THREAD_NAME_PREFIX),
        }
    }
}

impl PipelineConfig {
    /// Default settings with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        PipelineConfig { capacity, ..Self::default() }
    }

    /// Ownership-chaining setter for [`capacity`](Self::capacity)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Ownership-chaining setter for [`consumers`](Self::consumers)
    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    /// Ownership-chaining setter for [`producer_pacing`](Self::producer_pacing)
    pub fn with_producer_pacing(mut self, pacing: Duration) -> Self {
        self.producer_pacing = Some(pacing);
        self
    }

    /// Ownership-chaining setter for [`consumer_pacing`](Self::consumer_pacing)
    pub fn with_consumer_pacing(mut self, pacing: Duration) -> Self {
        self.consumer_pacing = Some(pacing);
        self
    }

    /// Ownership-chaining setter for [`thread_name_prefix`](Self::thread_name_prefix)
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Check that the settings describe a runnable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            bail!("pipeline capacity must be greater than zero");
        }
        if self.consumers == 0 {
            bail!("pipeline needs at least one consumer");
        }
        Ok(())
    }
}


/// How a [`Pipeline`] tells its consumers that the producers are done
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Shutdown<T> {
    /// Put one clone of this item per consumer into the channel
    ///
    /// The item must never occur in any source, otherwise a consumer stops early.
    Sentinel(T),
    /// Close the channel
    Close,
}


/// Summary of a finished [`Pipeline`] run
#[derive(Debug, Clone)]
pub struct PipelineOutput<T> {
    /// One report per producer, in source order
    pub producers: Vec<ProducerReport>,
    /// One report per consumer, in spawn order
    pub consumers: Vec<ConsumerReport<Vec<T>>>,
    /// Channel counters after all threads were joined
    pub stats: ChannelStats,
}

impl<T> PipelineOutput<T> {
    /// Every received item, grouped by consumer in spawn order
    pub fn items(&self) -> impl Iterator<Item = &T> + '_ {
        self.consumers.iter().flat_map(|report| report.destination.iter())
    }

    /// Take every received item, grouped by consumer in spawn order
    pub fn into_items(self) -> Vec<T> {
        self.consumers.into_iter().flat_map(|report| report.destination).collect()
    }
}


// boxed source sequence.
type Source<T> = Box<dyn Iterator<Item = T> + Send>;

/// One-shot orchestration of producers and consumers around a bounded channel
///
/// See the [module docs](self).
pub struct Pipeline<T> {
    config: PipelineConfig,
    shutdown: Shutdown<T>,
    sources: Vec<Source<T>>,
}

impl<T> Pipeline<T>
where
    T: PartialEq + Clone + Debug + Send + 'static,
{
    /// Construct a pipeline with no sources
    pub fn new(config: PipelineConfig, shutdown: Shutdown<T>) -> Self {
        Pipeline { config, shutdown, sources: Vec::new() }
    }

    /// Add a source, which will be drained by its own producer thread
    pub fn add_source<I>(&mut self, source: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        self.sources.push(Box::new(source.into_iter()));
        self
    }

    /// Ownership-chaining version of [`add_source`](Self::add_source)
    pub fn with_source<I>(mut self, source: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        self.add_source(source);
        self
    }

    /// Run the pipeline to completion on the current thread
    pub fn run(self) -> Result<PipelineOutput<T>> {
        let Pipeline { config, shutdown, sources } = self;
        config.validate()?;
        let channel = BoundedChannel::new(config.capacity)?;
        let prefix = &config.thread_name_prefix;

        // spawn consumers
        let mut consumer_handles = Vec::with_capacity(config.consumers);
        for i in 0..config.consumers {
            let mut consumer = Consumer::new(channel.clone(), Vec::<T>::new())
                .with_name(format!("{}-consumer-{}", prefix, i));
            if let Shutdown::Sentinel(ref sentinel) = shutdown {
                consumer.set_sentinel(sentinel.clone());
            }
            if let Some(pacing) = config.consumer_pacing {
                consumer.set_pacing(pacing);
            }
            match consumer.spawn() {
                Ok(handle) => consumer_handles.push(handle),
                Err(e) => {
                    abandon(&channel, Vec::<JoinHandle<()>>::new(), consumer_handles);
                    return Err(Error::new(e).context("failed to spawn consumer thread"));
                }
            }
        }

        // spawn producers
        let mut producer_handles = Vec::with_capacity(sources.len());
        for (i, source) in sources.into_iter().enumerate() {
            let mut producer = Producer::new(source, channel.clone())
                .with_name(format!("{}-producer-{}", prefix, i));
            if let Some(pacing) = config.producer_pacing {
                producer.set_pacing(pacing);
            }
            match producer.spawn() {
                Ok(handle) => producer_handles.push(handle),
                Err(e) => {
                    abandon(&channel, producer_handles, consumer_handles);
                    return Err(Error::new(e).context("failed to spawn producer thread"));
                }
            }
        }
        debug!(
            producers = producer_handles.len(),
            consumers = consumer_handles.len(),
            capacity = config.capacity,
            "pipeline spawned"
        );

        // join producers. on failure, cancel so that nothing stays blocked, and keep joining.
        let mut failure: Option<Error> = None;
        let mut producers = Vec::with_capacity(producer_handles.len());
        for handle in producer_handles {
            match join(handle, "producer") {
                Ok(Ok(report)) => producers.push(report),
                Ok(Err(e)) => record_failure(
                    &channel,
                    &mut failure,
                    anyhow!("producer failed to put {:?}: {}", e.item, e.cause),
                ),
                Err(e) => record_failure(&channel, &mut failure, e),
            }
        }
        debug!(
            put = producers.iter().map(|report| report.put).sum::<usize>(),
            "pipeline producers joined"
        );

        // end the stream
        if failure.is_none() {
            match &shutdown {
                Shutdown::Sentinel(sentinel) => {
                    for _ in 0..consumer_handles.len() {
                        if let Err(e) = channel.put(sentinel.clone()) {
                            record_failure(
                                &channel,
                                &mut failure,
                                Error::new(e.into_cause()).context("failed to put sentinel"),
                            );
                            break;
                        }
                    }
                    debug!(sentinels = consumer_handles.len(), "pipeline sentinels injected");
                }
                Shutdown::Close => {
                    channel.close();
                }
            }
        }

        // join consumers
        let mut consumers = Vec::with_capacity(consumer_handles.len());
        for handle in consumer_handles {
            match join(handle, "consumer") {
                Ok(Ok(report)) => consumers.push(report),
                Ok(Err(e)) => record_failure(
                    &channel,
                    &mut failure,
                    Error::new(e).context("consumer stopped by cancelled channel"),
                ),
                Err(e) => record_failure(&channel, &mut failure, e),
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        let stats = channel.stats();
        debug!(
            received = consumers.iter().map(|report| report.received).sum::<usize>(),
            high_water = stats.high_water,
            "pipeline consumers joined"
        );
        Ok(PipelineOutput { producers, consumers, stats })
    }
}

// cancel the channel and join every already-spawned thread, ignoring their results.
fn abandon<T, P, C>(
    channel: &BoundedChannel<T>,
    producers: Vec<JoinHandle<P>>,
    consumers: Vec<JoinHandle<C>>,
) {
    warn!("pipeline abandoned, cancelling channel");
    channel.cancel();
    for handle in producers {
        let _ = handle.join();
    }
    for handle in consumers {
        let _ = handle.join();
    }
}

// keep the first failure, and make sure the channel is cancelled.
fn record_failure<T>(channel: &BoundedChannel<T>, failure: &mut Option<Error>, e: Error) {
    warn!("pipeline task failed: {:#}", e);
    channel.cancel();
    failure.get_or_insert(e);
}

// join a thread, converting a panic into an error.
fn join<R>(handle: JoinHandle<R>, role: &str) -> Result<R> {
    let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
    handle
        .join()
        .map_err(|payload| anyhow!("{} panicked: {}", role, panic_message(&*payload)))
        .with_context(|| format!("joining thread {}", name))
}

// best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
