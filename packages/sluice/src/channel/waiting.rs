// internal condvar waiting for the channel.
//
// a channel operation parks on one of the channel's two condvars while its condition is not
// satisfiable. this module factors out how long it is willing to park.

use std::{
    sync::{Condvar, MutexGuard, PoisonError},
    time::Instant,
};


// timeout for blocking on a channel operation.
#[derive(Debug, Copy, Clone)]
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
    // time out if the operation cannot be completed without blocking.
    NonBlocking,
}

// park on cond, releasing guard, until notified or the timeout is reached.
//
// returns the reacquired guard and whether the timeout was reached. being notified does not imply
// that the awaited condition holds, and reaching the timeout does not imply that it doesn't, so
// the caller must re-check its condition in either case.
pub(crate) fn wait<'a, L>(
    cond: &Condvar,
    guard: MutexGuard<'a, L>,
    timeout: &Timeout,
) -> (MutexGuard<'a, L>, bool) {
    match timeout {
        // block on condvar indefinitely
        &Timeout::Never => (cond.wait(guard).unwrap_or_else(PoisonError::into_inner), false),

        // block on condvar until deadline
        &Timeout::At(deadline) => {
            let Some(duration) =
                deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
                else { return (guard, true) };
            let (guard, wait_result) = cond
                .wait_timeout(guard, duration)
                .unwrap_or_else(PoisonError::into_inner);
            (guard, wait_result.timed_out())
        }

        // dont block on condvar
        &Timeout::NonBlocking => (guard, true),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::Mutex,
        time::Duration,
    };

    #[test]
    fn past_deadline_does_not_park() {
        let mutex = Mutex::new(0u8);
        let cond = Condvar::new();
        let (guard, timed_out) = wait(&cond, mutex.lock().unwrap(), &Timeout::At(Instant::now()));
        assert!(timed_out);
        drop(guard);
        let (_guard, timed_out) = wait(&cond, mutex.lock().unwrap(), &Timeout::NonBlocking);
        assert!(timed_out);
    }

    #[test]
    fn future_deadline_parks_until_reached() {
        let mutex = Mutex::new(());
        let cond = Condvar::new();
        let start = Instant::now();
        let deadline = start + Duration::from_millis(30);
        let mut guard = mutex.lock().unwrap();
        // spurious wakeups report not timed out, so loop the way channel operations do
        loop {
            let (relocked, timed_out) = wait(&cond, guard, &Timeout::At(deadline));
            guard = relocked;
            if timed_out {
                break;
            }
        }
        drop(guard);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
