// shared helpers for unit tests.

use std::{
    thread,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;


// how long wait_until polls before failing the test.
const WAIT_UNTIL_LIMIT: Duration = Duration::from_secs(10);


// install a test-writer subscriber, once per test binary. RUST_LOG overrides the default filter.
pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sluice=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// spin (with short sleeps) until cond holds, panicking if it takes unreasonably long.
pub(crate) fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_UNTIL_LIMIT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached within {:?}", WAIT_UNTIL_LIMIT);
        thread::sleep(Duration::from_millis(1));
    }
}
