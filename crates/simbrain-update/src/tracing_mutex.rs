// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Mutex wrapper that reports slow acquisitions and long holds.
//!
//! Only the membership map is guarded with it: that lock is shared between
//! the threads mutating the network and the reconciliation collector, so it
//! is the one worth watching for contention. With the `lock-tracing` feature
//! disabled this is a plain `parking_lot::Mutex`.

use parking_lot::{Mutex, MutexGuard};

#[cfg(feature = "lock-tracing")]
use std::thread;
#[cfg(feature = "lock-tracing")]
use std::time::{Duration, Instant};
#[cfg(feature = "lock-tracing")]
use tracing::{debug, warn};

/// Waits or holds longer than this are logged at warn level
#[cfg(feature = "lock-tracing")]
const SLOW_LOCK_MS: u128 = 5;

pub struct TracingMutex<T> {
    inner: Mutex<T>,
    #[cfg(feature = "lock-tracing")]
    name: &'static str,
}

impl<T> TracingMutex<T> {
    /// `_name` labels log lines and is ignored without `lock-tracing`.
    pub fn new(value: T, _name: &'static str) -> Self {
        Self {
            inner: Mutex::new(value),
            #[cfg(feature = "lock-tracing")]
            name: _name,
        }
    }

    #[cfg(not(feature = "lock-tracing"))]
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    #[cfg(feature = "lock-tracing")]
    pub fn lock(&self) -> TracingMutexGuard<'_, T> {
        let thread_id = thread::current().id();
        let start = Instant::now();
        let guard = self.inner.lock();
        let acquired = Instant::now();
        let wait = acquired.duration_since(start);

        if wait.as_millis() > SLOW_LOCK_MS {
            warn!(
                "[LOCK-TRACE] {}: Thread {:?} acquired lock after {:.2}ms wait (SLOW)",
                self.name,
                thread_id,
                wait.as_secs_f64() * 1000.0
            );
        } else {
            debug!(
                "[LOCK-TRACE] {}: Thread {:?} acquired lock ({:.2}ms wait)",
                self.name,
                thread_id,
                wait.as_secs_f64() * 1000.0
            );
        }

        TracingMutexGuard {
            guard,
            name: self.name,
            thread_id,
            acquired,
            wait,
        }
    }
}

#[cfg(feature = "lock-tracing")]
pub struct TracingMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    name: &'static str,
    thread_id: thread::ThreadId,
    acquired: Instant,
    wait: Duration,
}

#[cfg(feature = "lock-tracing")]
impl<T> std::ops::Deref for TracingMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

#[cfg(feature = "lock-tracing")]
impl<T> std::ops::DerefMut for TracingMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(feature = "lock-tracing")]
impl<T> Drop for TracingMutexGuard<'_, T> {
    fn drop(&mut self) {
        let held = self.acquired.elapsed();
        if held.as_millis() > SLOW_LOCK_MS || self.wait.as_millis() > SLOW_LOCK_MS {
            warn!(
                "[LOCK-TRACE] {}: Thread {:?} released lock (held {:.2}ms, total {:.2}ms)",
                self.name,
                self.thread_id,
                held.as_secs_f64() * 1000.0,
                (held + self.wait).as_secs_f64() * 1000.0
            );
        } else {
            debug!(
                "[LOCK-TRACE] {}: Thread {:?} released lock (held {:.2}ms)",
                self.name,
                self.thread_id,
                held.as_secs_f64() * 1000.0
            );
        }
    }
}
