// consumer task: drains a channel into a destination until told to stop.

use super::pace;
use crate::{
    BoundedChannel,
    error::CancelledError,
};
use std::{
    io,
    iter::once,
    thread::{self, JoinHandle},
    time::Duration,
};


/// Task that gets items from a channel and appends them to a destination collection
///
/// The consumer runs until it either receives its sentinel item, if it has one, or finds the
/// channel closed and drained. A received sentinel is swallowed: it is neither appended to the
/// destination nor put back, so each sentinel put into a channel stops exactly one consumer.
pub struct Consumer<T, D> {
    channel: BoundedChannel<T>,
    destination: D,
    sentinel: Option<T>,
    pacing: Option<Duration>,
    name: String,
}

/// Why a consumer stopped
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StopReason {
    /// The consumer received its sentinel item
    Sentinel,
    /// The channel was closed and every buffered item had been received
    Closed,
}

/// Summary of a consumer that stopped normally
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ConsumerReport<D> {
    /// The consumer's name
    pub name: String,
    /// The destination collection, with every received item appended
    pub destination: D,
    /// Number of items appended to the destination
    pub received: usize,
    /// Why the consumer stopped
    pub stop: StopReason,
}

impl<T, D> Consumer<T, D>
where
    T: PartialEq,
    D: Extend<T>,
{
    /// Construct a consumer that drains `channel` into `destination`
    ///
    /// Without a [sentinel](Self::with_sentinel), the consumer only stops once the channel is
    /// closed and drained.
    pub fn new(channel: BoundedChannel<T>, destination: D) -> Self {
        Consumer {
            channel,
            destination,
            sentinel: None,
            pacing: None,
            name: String::from("consumer"),
        }
    }

    /// Set the item which, when received, stops the consumer
    pub fn set_sentinel(&mut self, sentinel: T) -> &mut Self {
        self.sentinel = Some(sentinel);
        self
    }

    /// Ownership-chaining version of [`set_sentinel`](Self::set_sentinel)
    pub fn with_sentinel(mut self, sentinel: T) -> Self {
        self.set_sentinel(sentinel);
        self
    }

    /// Set a delay to sleep for after each item appended
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

    /// Run the consumer on the current thread until it stops
    ///
    /// Errors if the channel is cancelled, in which case the destination is dropped.
    pub fn run(self) -> Result<ConsumerReport<D>, CancelledError> {
        let Consumer { channel, mut destination, sentinel, pacing, name } = self;
        debug!(consumer = %name, "consumer started");

        let mut received = 0;
        let stop = loop {
            trace!(consumer = %name, len = channel.len(), "consumer waiting");
            let item = match channel.get() {
                Ok(Some(item)) => item,
                Ok(None) => break StopReason::Closed,
                Err(e) => {
                    warn!(consumer = %name, received, "consumer cut off by cancelled channel");
                    return Err(e);
                }
            };
            if sentinel.as_ref().is_some_and(|sentinel| *sentinel == item) {
                break StopReason::Sentinel;
            }

            destination.extend(once(item));
            received += 1;
            trace!(consumer = %name, received, "consumer appended item");
            pace(pacing);
        };

        debug!(consumer = %name, received, ?stop, "consumer stopped");
        Ok(ConsumerReport { name, destination, received, stop })
    }

    /// Spawn a thread, named after this consumer, that runs it
    pub fn spawn(self) -> io::Result<JoinHandle<Result<ConsumerReport<D>, CancelledError>>>
    where
        T: Send + 'static,
        D: Send + 'static,
    {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || self.run())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        task::Producer,
        test_util::{init_tracing, wait_until},
    };
    use std::collections::{BTreeSet, VecDeque};

    #[test]
    fn consumer_stops_on_sentinel_without_keeping_it() {
        let channel = BoundedChannel::new(4).unwrap();
        for item in ["x", "y", "STOP", "z"] {
            channel.put(item).unwrap();
        }
        let report = Consumer::new(channel.clone(), Vec::<&str>::new())
            .with_sentinel("STOP")
            .run()
            .unwrap();
        assert_eq!(report.destination, vec!["x", "y"]);
        assert_eq!(report.received, 2);
        assert_eq!(report.stop, StopReason::Sentinel);

        // the sentinel is consumed exactly once, and nothing after it is touched
        assert_eq!(channel.try_get(), Ok(Some("z")));
    }

    #[test]
    fn consumer_without_sentinel_stops_on_close() {
        let channel = BoundedChannel::new(4).unwrap();
        channel.put(1).unwrap();
        channel.put(2).unwrap();
        channel.close();
        let report = Consumer::new(channel, VecDeque::<i32>::new()).run().unwrap();
        assert_eq!(report.destination, VecDeque::from([1, 2]));
        assert_eq!(report.stop, StopReason::Closed);
    }

    #[test]
    fn consumer_fails_on_cancel() {
        init_tracing();
        let channel = BoundedChannel::<u64>::new(4).unwrap();
        let handle = Consumer::new(channel.clone(), Vec::<u64>::new())
            .with_sentinel(0)
            .with_name("doomed-consumer")
            .spawn()
            .unwrap();
        wait_until(|| channel.stats().blocked_getters == 1);
        channel.cancel();
        assert_eq!(handle.join().unwrap(), Err(CancelledError));
    }

    #[test]
    fn consumer_appends_into_any_extend() {
        let channel = BoundedChannel::new(8).unwrap();
        for item in [3, 1, 3, 2, -1] {
            channel.put(item).unwrap();
        }
        let report = Consumer::new(channel, BTreeSet::<i32>::new())
            .with_sentinel(-1)
            .run()
            .unwrap();
        assert_eq!(report.destination, BTreeSet::from([1, 2, 3]));
        assert_eq!(report.received, 4);
    }

    #[test]
    fn single_producer_consumer_preserves_order() {
        init_tracing();
        let source: Vec<i64> = (1..=10).collect();
        let channel = BoundedChannel::new(3).unwrap();
        let sentinel = i64::MIN;

        let producer = Producer::new(source.clone(), channel.clone()).spawn().unwrap();
        let consumer = Consumer::new(channel.clone(), Vec::<i64>::new())
            .with_sentinel(sentinel)
            .spawn()
            .unwrap();

        producer.join().unwrap().unwrap();
        channel.put(sentinel).unwrap();
        let report = consumer.join().unwrap().unwrap();

        assert_eq!(report.destination, source);
        assert!(!report.destination.contains(&sentinel));
        assert!(channel.stats().high_water <= 3);
    }

    #[test]
    fn paced_demo_run() {
        init_tracing();
        let source = vec![1, 2, 3, 4, 5];
        let channel = BoundedChannel::new(3).unwrap();

        let producer = Producer::new(source.clone(), channel.clone())
            .with_name("demo-producer")
            .with_pacing(Duration::from_millis(30))
            .spawn()
            .unwrap();
        let consumer = Consumer::new(channel.clone(), Vec::<i32>::new())
            .with_name("demo-consumer")
            .with_sentinel(0)
            .with_pacing(Duration::from_millis(50))
            .spawn()
            .unwrap();

        producer.join().unwrap().unwrap();
        channel.put(0).unwrap();
        let report = consumer.join().unwrap().unwrap();
        assert_eq!(report.destination, source);
        assert_eq!(report.stop, StopReason::Sentinel);
    }
}
