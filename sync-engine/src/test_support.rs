//! Test utilities for the sync engine.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and when the `test-support` feature is enabled.

mod clock;
mod mirror_store;
mod remote;
mod session_store;

pub use clock::MutableClock;
pub use mirror_store::InMemoryMirrorStore;
pub use remote::{ScriptedRemoteRepository, issued_tokens};
pub use session_store::InMemorySessionStore;

fn lock<'a, T>(mutex: &'a std::sync::Mutex<T>, name: &str) -> std::sync::MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{name} mutex poisoned"),
    }
}
