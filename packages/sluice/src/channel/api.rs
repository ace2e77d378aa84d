// exposed API of channels

use super::{
    core::{self, Failure},
    error::*,
    waiting::Timeout,
};
use std::{
    fmt::{self, Debug, Formatter},
    time::{Duration, Instant},
};


// ==== helper functions for adapting core API to exposed API ====


// convert a core put failure into a terminal cause, for timeouts that can't be reached.
fn put_terminal(failure: Failure) -> PutErrorCause {
    match failure {
        Failure::Closed => ClosedError.into(),
        Failure::Cancelled => CancelledError.into(),
        Failure::Timeout => unreachable!("put timed out with Timeout::Never"),
    }
}

// convert a core put failure into a cause, where the timeout means "would block".
fn try_put_cause(failure: Failure) -> TryPutErrorCause {
    match failure {
        Failure::Timeout => WouldBlockError.into(),
        terminal => put_terminal(terminal).into(),
    }
}

// convert a core put failure into a cause, where the timeout means "timed out".
fn put_timeout_cause(failure: Failure) -> PutTimeoutErrorCause {
    match failure {
        Failure::Timeout => TimedOutError.into(),
        terminal => put_terminal(terminal).into(),
    }
}

// timeout for blocking up to the given duration from now.
//
// a duration too large to be represented as an instant is as good as never timing out.
fn timeout_after(timeout: Duration) -> Timeout {
    Instant::now()
        .checked_add(timeout)
        .map(Timeout::At)
        .unwrap_or(Timeout::Never)
}

// adapt a core put result, converting the failure with f.
fn map_put_result<T, E>(
    result: Result<(), (Failure, T)>,
    f: impl FnOnce(Failure) -> E,
) -> Result<(), PutError<T, E>> {
    result.map_err(|(failure, item)| PutError { item, cause: f(failure) })
}

// convert a core get failure, for timeouts that can't be reached.
fn get_terminal(failure: Failure) -> CancelledError {
    match failure {
        Failure::Cancelled => CancelledError,
        Failure::Closed => unreachable!("get failed with closed"),
        Failure::Timeout => unreachable!("get timed out with Timeout::Never"),
    }
}

// convert a core get failure into a cause, where the timeout means "timed out".
fn get_timeout_cause(failure: Failure) -> GetTimeoutError {
    match failure {
        Failure::Timeout => TimedOutError.into(),
        terminal => get_terminal(terminal).into(),
    }
}


// ==== the exposed API ====


/// Bounded, blocking, multi-producer multi-consumer FIFO channel
///
/// A channel buffers at most [`capacity`](Self::capacity) items. [`put`](Self::put) blocks while
/// the buffer is full and [`get`](Self::get) blocks while it is empty. Items come out in the order
/// they went in. The order in which parked callers of the same kind are woken is unspecified.
///
/// The handle is cheap to clone, and all clones refer to the same channel. Dropping handles never
/// affects the channel's state. Streams are terminated either in-band, by agreeing on a sentinel
/// item, or out-of-band with [`close`](Self::close).
pub struct BoundedChannel<T>(core::Channel<T>);

impl<T> BoundedChannel<T> {
    /// Create an empty open channel that buffers at most `capacity` items
    ///
    /// Errors if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, InvalidCapacityError> {
        if capacity == 0 {
            return Err(InvalidCapacityError);
        }
        debug!(capacity, "channel created");
        Ok(BoundedChannel(core::Channel::new(capacity)))
    }

    /// Put an item into the channel, blocking while the channel is full
    ///
    /// Unless the channel is closed or cancelled, this always eventually returns `Ok`. If it is
    /// closed or cancelled, either before or while blocking, the item is returned in the error.
    pub fn put(&self, item: T) -> Result<(), PutError<T, PutErrorCause>> {
        map_put_result(self.0.put(item, Timeout::Never), put_terminal)
    }

    /// Try to put an item into the channel without blocking
    pub fn try_put(&self, item: T) -> Result<(), PutError<T, TryPutErrorCause>> {
        map_put_result(self.0.put(item, Timeout::NonBlocking), try_put_cause)
    }

    /// Put an item into the channel, blocking while the channel is full until a timeout elapses
    pub fn put_timeout(
        &self,
        item: T,
        timeout: Duration,
    ) -> Result<(), PutError<T, PutTimeoutErrorCause>> {
        map_put_result(self.0.put(item, timeout_after(timeout)), put_timeout_cause)
    }

    /// Put an item into the channel, blocking while the channel is full until the deadline
    pub fn put_deadline(
        &self,
        item: T,
        deadline: Instant,
    ) -> Result<(), PutError<T, PutTimeoutErrorCause>> {
        map_put_result(self.0.put(item, Timeout::At(deadline)), put_timeout_cause)
    }

    /// Get the oldest item from the channel, blocking while the channel is empty
    ///
    /// Returns `Ok(None)` once the channel is closed and every buffered item has been received.
    /// Until then, and unless cancelled, this always eventually returns `Ok(Some)`.
    pub fn get(&self) -> Result<Option<T>, CancelledError> {
        self.0.get(Timeout::Never).map_err(get_terminal)
    }

    /// Try to get the oldest item from the channel without blocking
    pub fn try_get(&self) -> Result<Option<T>, TryGetError> {
        self.0.get(Timeout::NonBlocking).map_err(|failure| match failure {
            Failure::Timeout => WouldBlockError.into(),
            terminal => get_terminal(terminal).into(),
        })
    }

    /// Get the oldest item from the channel, blocking while the channel is empty until a timeout
    /// elapses
    pub fn get_timeout(&self, timeout: Duration) -> Result<Option<T>, GetTimeoutError> {
        self.0.get(timeout_after(timeout)).map_err(get_timeout_cause)
    }

    /// Get the oldest item from the channel, blocking while the channel is empty until the
    /// deadline
    pub fn get_deadline(&self, deadline: Instant) -> Result<Option<T>, GetTimeoutError> {
        self.0.get(Timeout::At(deadline)).map_err(get_timeout_cause)
    }

    /// Close the channel
    ///
    /// All pending and future puts fail with [`ClosedError`]. Gets continue to receive the
    /// buffered items, and then return `Ok(None)` rather than blocking. Returns whether this call
    /// closed the channel, as opposed to it already being closed or cancelled.
    pub fn close(&self) -> bool {
        self.0.close()
    }

    /// Cancel the channel
    ///
    /// All buffered items are dropped, and all pending and future puts and gets fail with
    /// [`CancelledError`]. Returns whether this call cancelled the channel, as opposed to it
    /// already being cancelled.
    pub fn cancel(&self) -> bool {
        self.0.cancel()
    }

    /// Maximum number of items the channel buffers
    pub fn capacity(&self) -> usize {
        self.0.bound()
    }

    /// Number of items currently buffered
    ///
    /// This may be stale as soon as it returns if other threads are using the channel.
    pub fn len(&self) -> usize {
        self.stats().len
    }

    /// Whether no items are currently buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the buffer is currently at capacity
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Whether the channel has been closed (and not cancelled)
    pub fn is_closed(&self) -> bool {
        self.stats().closed
    }

    /// Whether the channel has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.stats().cancelled
    }

    /// Take a consistent snapshot of the channel's counters
    pub fn stats(&self) -> ChannelStats {
        let snapshot = self.0.snapshot();
        ChannelStats {
            len: snapshot.len,
            capacity: snapshot.bound,
            high_water: snapshot.high_water,
            blocked_putters: snapshot.blocked_putters,
            blocked_getters: snapshot.blocked_getters,
            total_put: snapshot.total_put,
            total_got: snapshot.total_got,
            closed: snapshot.state == core::State::Closed,
            cancelled: snapshot.state == core::State::Cancelled,
        }
    }

    /// Blocking iterator over items received from this channel
    ///
    /// Ends once the channel is closed and drained, or cancelled.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter(self)
    }
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        BoundedChannel(self.0.clone())
    }
}

impl<T> Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("BoundedChannel").field(&self.stats()).finish()
    }
}

impl<'a, T> IntoIterator for &'a BoundedChannel<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


/// Point-in-time counters of a [`BoundedChannel`]
///
/// All fields are read under the channel's lock at the same instant.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelStats {
    /// Number of buffered items
    pub len: usize,
    /// Maximum number of buffered items
    pub capacity: usize,
    /// Largest number of items that have ever been buffered at once
    pub high_water: usize,
    /// Number of put operations parked waiting for space
    pub blocked_putters: usize,
    /// Number of get operations parked waiting for an item
    pub blocked_getters: usize,
    /// Number of items ever put
    pub total_put: u64,
    /// Number of items ever received
    pub total_got: u64,
    /// Whether the channel is closed
    pub closed: bool,
    /// Whether the channel is cancelled
    pub cancelled: bool,
}


/// Blocking iterator over a [`BoundedChannel`]
///
/// See [`BoundedChannel::iter`].
pub struct Iter<'a, T>(&'a BoundedChannel<T>);

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.get().ok().flatten()
    }
}


// ==== tests ====


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{init_tracing, wait_until};
    use std::thread;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(BoundedChannel::<u8>::new(0).unwrap_err(), InvalidCapacityError);
        assert_eq!(BoundedChannel::<u8>::new(1).unwrap().capacity(), 1);
    }

    #[test]
    fn put_and_get_basic() {
        let channel = BoundedChannel::new(2).unwrap();
        channel.put(10).unwrap();
        channel.put(20).unwrap();
        assert!(channel.is_full());
        assert_eq!(channel.get(), Ok(Some(10)));
        assert_eq!(channel.get(), Ok(Some(20)));
        assert!(channel.is_empty());
    }

    #[test]
    fn try_operations_report_would_block() {
        let channel = BoundedChannel::new(1).unwrap();
        assert_eq!(channel.try_get(), Err(TryGetError::WouldBlock(WouldBlockError)));
        channel.try_put("a").unwrap();
        let e = channel.try_put("b").unwrap_err();
        assert_eq!(e.item, "b");
        assert_eq!(e.cause, TryPutErrorCause::WouldBlock(WouldBlockError));
        assert_eq!(channel.try_get(), Ok(Some("a")));
    }

    #[test]
    fn put_blocks_when_full() {
        init_tracing();
        let channel = BoundedChannel::new(1).unwrap();
        channel.put("A").unwrap();

        // once the put returns, record how many gets had already completed
        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                channel.put("B").unwrap();
                channel.stats().total_got
            })
        };

        // the producer must park on the full channel and stay parked
        wait_until(|| channel.stats().blocked_putters == 1);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(channel.stats().blocked_putters, 1);
        assert_eq!(channel.stats().total_got, 0);
        assert!(!producer.is_finished());

        // the put can only return after the get has returned the item it displaced
        assert_eq!(channel.get(), Ok(Some("A")));
        assert_eq!(producer.join().unwrap(), 1);
        assert_eq!(channel.get(), Ok(Some("B")));
        assert_eq!(channel.stats().high_water, 1);
    }

    #[test]
    fn get_blocks_when_empty() {
        init_tracing();
        let channel = BoundedChannel::new(2).unwrap();

        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || channel.get())
        };

        wait_until(|| channel.stats().blocked_getters == 1);
        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());

        channel.put("X").unwrap();
        assert_eq!(consumer.join().unwrap(), Ok(Some("X")));
        assert_eq!(channel.stats().blocked_getters, 0);
    }

    #[test]
    fn timeouts_leave_channel_consistent() {
        let channel = BoundedChannel::new(1).unwrap();

        let start = Instant::now();
        assert_eq!(
            channel.get_timeout(Duration::from_millis(20)),
            Err(GetTimeoutError::TimedOut(TimedOutError)),
        );
        assert!(start.elapsed() >= Duration::from_millis(20));

        channel.put(1).unwrap();
        let e = channel.put_timeout(2, Duration::from_millis(20)).unwrap_err();
        assert_eq!(e.item, 2);
        assert_eq!(e.cause, PutTimeoutErrorCause::TimedOut(TimedOutError));

        let stats = channel.stats();
        assert_eq!(stats.blocked_putters, 0);
        assert_eq!(stats.blocked_getters, 0);
        assert_eq!(stats.len, 1);

        // still fully usable afterwards
        assert_eq!(channel.get_timeout(Duration::from_millis(20)), Ok(Some(1)));
        channel.put_timeout(3, Duration::from_millis(20)).unwrap();
        assert_eq!(channel.get(), Ok(Some(3)));
    }

    #[test]
    fn unrepresentable_timeouts_never_expire() {
        let channel = BoundedChannel::new(1).unwrap();
        channel.put_timeout(1, Duration::MAX).unwrap();
        assert_eq!(channel.get_timeout(Duration::MAX), Ok(Some(1)));

        // still blocks, rather than timing out at once
        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || channel.get_timeout(Duration::MAX))
        };
        wait_until(|| channel.stats().blocked_getters == 1);
        channel.put_timeout(2, Duration::MAX).unwrap();
        assert_eq!(consumer.join().unwrap(), Ok(Some(2)));

        channel.put(3).unwrap();
        let e = channel.try_put(4).unwrap_err();
        assert_eq!(e.item, 4);
        channel.close();
        let e = channel.put_timeout(5, Duration::MAX).unwrap_err();
        assert_eq!(e.cause, PutTimeoutErrorCause::Terminal(PutErrorCause::Closed(ClosedError)));
    }

    #[test]
    fn close_wakes_blocked_getter_with_end_of_stream() {
        init_tracing();
        let channel = BoundedChannel::<u32>::new(3).unwrap();
        let consumer = {
            let channel = channel.clone();
            thread::spawn(move || channel.get())
        };
        wait_until(|| channel.stats().blocked_getters == 1);
        assert!(channel.close());
        assert_eq!(consumer.join().unwrap(), Ok(None));
        assert!(channel.is_closed());
    }

    #[test]
    fn close_fails_blocked_putter_and_returns_item() {
        let channel = BoundedChannel::new(1).unwrap();
        channel.put(String::from("kept")).unwrap();
        let producer = {
            let channel = channel.clone();
            thread::spawn(move || channel.put(String::from("rejected")))
        };
        wait_until(|| channel.stats().blocked_putters == 1);
        channel.close();

        let e = producer.join().unwrap().unwrap_err();
        assert_eq!(e.item, "rejected");
        assert_eq!(e.cause, PutErrorCause::Closed(ClosedError));

        // buffered items survive the close
        let rest: Vec<String> = channel.iter().collect();
        assert_eq!(rest, vec![String::from("kept")]);
    }

    #[test]
    fn cancel_fails_blocked_callers_of_both_kinds() {
        init_tracing();
        let full = BoundedChannel::new(1).unwrap();
        full.put(0).unwrap();
        let empty = BoundedChannel::<i32>::new(1).unwrap();

        let producer = {
            let full = full.clone();
            thread::spawn(move || full.put(1))
        };
        let consumer = {
            let empty = empty.clone();
            thread::spawn(move || empty.get())
        };
        wait_until(|| full.stats().blocked_putters == 1);
        wait_until(|| empty.stats().blocked_getters == 1);

        assert!(full.cancel());
        assert!(empty.cancel());
        assert_eq!(
            producer.join().unwrap().unwrap_err().cause,
            PutErrorCause::Cancelled(CancelledError),
        );
        assert_eq!(consumer.join().unwrap(), Err(CancelledError));
        assert!(full.is_empty());
        assert!(full.is_cancelled());
        assert!(!full.is_closed());
    }

    #[test]
    fn iter_ends_on_close() {
        let channel = BoundedChannel::new(4).unwrap();
        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    channel.put(i).unwrap();
                }
                channel.close();
            })
        };
        let received: Vec<i32> = (&channel).into_iter().collect();
        producer.join().unwrap();
        assert_eq!(received, (0..20).collect::<Vec<_>>());
        assert!(channel.stats().high_water <= 4);
    }
}
