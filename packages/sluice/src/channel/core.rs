// minimal internal API for the channel. the exposed API is a typed wrapper around this.

use super::waiting::{Timeout, wait};
use std::{
    cmp::max,
    collections::VecDeque,
    mem::take,
    sync::{
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};


// buffers are preallocated up to this many elements. larger bounds grow on demand.
const PREALLOC_LIMIT: usize = 1024;


// handle to a channel.
pub(crate) struct Channel<T>(Arc<Shared<T>>);

// channel shared state.
struct Shared<T> {
    // mutex around lockable state.
    lockable: Mutex<Lockable<T>>,
    // waited on by put operations. signalled when an element is removed, and broadcast when the
    // channel leaves the open state.
    not_full: Condvar,
    // waited on by get operations. signalled when an element is added, and broadcast when the
    // channel leaves the open state.
    not_empty: Condvar,
    // elems maximum length. never 0.
    bound: usize,
}

// channel lockable state.
struct Lockable<T> {
    // storage for elements. invariant: elems.len() <= bound.
    elems: VecDeque<T>,
    // begins as Open. may change to Closed and then to Cancelled, or directly to Cancelled, but
    // never back.
    state: State,
    // number of put operations currently parked on not_full.
    blocked_putters: usize,
    // number of get operations currently parked on not_empty.
    blocked_getters: usize,
    // largest elems.len() ever observed.
    high_water: usize,
    // lifetime count of elements pushed.
    total_put: u64,
    // lifetime count of elements popped.
    total_got: u64,
}

// possible values for Lockable.state
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum State {
    // putting and getting may still be possible.
    Open,
    // putting fails. getting succeeds until elems is drained, then reports the end of the stream.
    Closed,
    // elems have been dropped. putting and getting fail.
    Cancelled,
}

// reason a core operation did not complete.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Failure {
    // the channel is closed. only ever returned by put.
    Closed,
    // the channel is cancelled.
    Cancelled,
    // the timeout was reached before the operation could complete.
    Timeout,
}

// point-in-time copy of the channel's counters.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Snapshot {
    pub(crate) len: usize,
    pub(crate) bound: usize,
    pub(crate) high_water: usize,
    pub(crate) blocked_putters: usize,
    pub(crate) blocked_getters: usize,
    pub(crate) total_put: u64,
    pub(crate) total_got: u64,
    pub(crate) state: State,
}

impl<T> Lockable<T> {
    // the reason a put must fail immediately, if any.
    fn put_failure(&self) -> Option<Failure> {
        match self.state {
            State::Open => None,
            State::Closed => Some(Failure::Closed),
            State::Cancelled => Some(Failure::Cancelled),
        }
    }
}

impl<T> Channel<T> {
    // construct empty open channel. bound must be non-zero.
    pub(crate) fn new(bound: usize) -> Self {
        assert!(bound > 0, "channel bound of 0 (internal bug)");
        Channel(Arc::new(Shared {
            lockable: Mutex::new(Lockable {
                elems: VecDeque::with_capacity(bound.min(PREALLOC_LIMIT)),
                state: State::Open,
                blocked_putters: 0,
                blocked_getters: 0,
                high_water: 0,
                total_put: 0,
                total_got: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            bound,
        }))
    }

    // clone another handle to the channel.
    pub(crate) fn clone(&self) -> Self {
        Channel(Arc::clone(&self.0))
    }

    // maximum number of buffered elements.
    pub(crate) fn bound(&self) -> usize {
        self.0.bound
    }

    // lock the channel. the lock is never held across a partial mutation of lockable state, so a
    // poisoned lock is still consistent and is simply recovered.
    fn lock(&self) -> MutexGuard<'_, Lockable<T>> {
        self.0.lockable.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // push elem onto the back of the buffer, blocking while the buffer is full.
    //
    // - on failure, ownership of elem is returned alongside the reason.
    // - never returns Failure::Timeout if timeout is Timeout::Never.
    pub(crate) fn put(&self, elem: T, timeout: Timeout) -> Result<(), (Failure, T)> {
        let shared = &*self.0;
        let mut lock = self.lock();

        // a non-blocking operation is expired from the start: it gets exactly one check.
        let mut expired = matches!(timeout, Timeout::NonBlocking);
        loop {
            if let Some(failure) = lock.put_failure() {
                return Err((failure, elem));
            }
            if lock.elems.len() < shared.bound {
                break;
            }
            if expired {
                return Err((Failure::Timeout, elem));
            }

            // full. park on not_full, which releases the lock until we are signalled.
            trace!(len = lock.elems.len(), capacity = shared.bound, "put blocking on full channel");
            lock.blocked_putters += 1;
            let (relocked, timed_out) = wait(&shared.not_full, lock, &timeout);
            lock = relocked;
            lock.blocked_putters -= 1;
            expired = timed_out;
            trace!(len = lock.elems.len(), timed_out, "put woke");
        }
        // at this point, we know the channel is open and has a free slot

        lock.elems.push_back(elem);
        lock.total_put += 1;
        lock.high_water = max(lock.high_water, lock.elems.len());
        debug_assert!(lock.elems.len() <= shared.bound, "channel over bound (internal bug)");

        // hand the new element to at most one parked getter
        if lock.blocked_getters > 0 {
            shared.not_empty.notify_one();
        }
        Ok(())
    }

    // pop elem from the front of the buffer, blocking while the buffer is empty.
    //
    // - resolves to none once the channel is closed and the buffer is drained.
    // - never returns Failure::Closed, and never returns Failure::Timeout if timeout is
    //   Timeout::Never.
    pub(crate) fn get(&self, timeout: Timeout) -> Result<Option<T>, Failure> {
        let shared = &*self.0;
        let mut lock = self.lock();

        let mut expired = matches!(timeout, Timeout::NonBlocking);
        loop {
            if lock.state == State::Cancelled {
                return Err(Failure::Cancelled);
            }
            if let Some(elem) = lock.elems.pop_front() {
                lock.total_got += 1;

                // hand the freed slot to at most one parked putter
                if lock.blocked_putters > 0 {
                    shared.not_full.notify_one();
                }
                return Ok(Some(elem));
            }
            if lock.state == State::Closed {
                return Ok(None);
            }
            if expired {
                return Err(Failure::Timeout);
            }

            // empty. park on not_empty, which releases the lock until we are signalled.
            trace!(capacity = shared.bound, "get blocking on empty channel");
            lock.blocked_getters += 1;
            let (relocked, timed_out) = wait(&shared.not_empty, lock, &timeout);
            lock = relocked;
            lock.blocked_getters -= 1;
            expired = timed_out;
            trace!(len = lock.elems.len(), timed_out, "get woke");
        }
    }

    // transition from open to closed, waking all parked operations. returns whether this call
    // performed the transition.
    pub(crate) fn close(&self) -> bool {
        let shared = &*self.0;
        let mut lock = self.lock();
        if lock.state != State::Open {
            return false;
        }
        lock.state = State::Closed;
        debug!(
            buffered = lock.elems.len(),
            blocked_putters = lock.blocked_putters,
            blocked_getters = lock.blocked_getters,
            "channel closed"
        );
        shared.not_full.notify_all();
        shared.not_empty.notify_all();
        true
    }

    // transition to cancelled, dropping buffered elems and waking all parked operations. returns
    // whether this call performed the transition.
    pub(crate) fn cancel(&self) -> bool {
        let shared = &*self.0;
        let mut lock = self.lock();
        if lock.state == State::Cancelled {
            return false;
        }
        lock.state = State::Cancelled;
        let dropped = take(&mut lock.elems);
        debug!(
            dropped = dropped.len(),
            blocked_putters = lock.blocked_putters,
            blocked_getters = lock.blocked_getters,
            "channel cancelled"
        );
        shared.not_full.notify_all();
        shared.not_empty.notify_all();

        // run element destructors after releasing the lock
        drop(lock);
        drop(dropped);
        true
    }

    // copy out the current counters.
    pub(crate) fn snapshot(&self) -> Snapshot {
        let lock = self.lock();
        Snapshot {
            len: lock.elems.len(),
            bound: self.0.bound,
            high_water: lock.high_water,
            blocked_putters: lock.blocked_putters,
            blocked_getters: lock.blocked_getters,
            total_put: lock.total_put,
            total_got: lock.total_got,
            state: lock.state,
        }
    }
}
