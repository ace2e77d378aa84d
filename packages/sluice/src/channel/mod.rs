// implementation of the bounded channel.
//
// the architecture is the classic monitor. it is as such:
//
// channel handles wrap around Arc<shared state>
//                                  |
//          /-----------------------/
//          v
//       shared state
//          |
//          |------ it contains a Mutex<lockable state>. the lockable state holds a VecDeque<T> of
//          |       buffered elements, which never grows past the bound, plus the open / closed /
//          |       cancelled state and some counters.
//          |
//          |------ it contains a "not full" Condvar, on which put operations park while the buffer
//          |       is full. each get that removes an element signals it once.
//          |
//          \------ it contains a "not empty" Condvar, which is the same idea for get operations.
//
// parked operations always re-check their condition after waking, so a spurious wakeup or a wakeup
// that loses a race to another thread just parks again. closing or cancelling the channel
// broadcasts on both condvars.
//
// the organization of these modules is as such:
//
//      waiting<--------core: Owns the lock and the condvars. Presents an untyped abstraction
//                      ^     which reports failures as a plain enum.
//                      |
//                      api:  A wrapper around core that maps its results onto the typed error
//                            types. The crate re-exports this API publically.
//
// there is also the error module, which contains the relevant error types, which is also
// re-exported publically.

pub(crate) mod error;
pub(crate) mod api;

mod waiting;
mod core;
