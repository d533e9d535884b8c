use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-process entity store with closure-scoped access.
///
/// Every mutation runs inside a single `write` closure, which serializes
/// concurrent updates to the guarded state: a seat counter cannot overshoot
/// and a balance check cannot pass against a stale read, because check and
/// update share one critical section. Closures must not await; callers that
/// need to talk to another service do so between store calls and compensate
/// on failure.
#[derive(Debug, Default)]
pub struct Store<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Store<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard: RwLockReadGuard<'_, S> =
            self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard: RwLockWriteGuard<'_, S> =
            self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

/// Monotonic sequence for generating sequential entity codes.
///
/// Replaces count-then-write code generation, which hands two concurrent
/// creators the same number.
#[derive(Debug)]
pub struct Sequence {
    next: AtomicU64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}
