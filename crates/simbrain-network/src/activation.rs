// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Lock-free f64 cell used for the current/next activation buffers.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` stored as its bit pattern in an `AtomicU64`.
///
/// Each slot has exactly one writer per tick phase (the unit owning the
/// neuron), so plain acquire/release loads and stores are enough.
#[derive(Debug)]
pub struct AtomicActivation(AtomicU64);

impl AtomicActivation {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for AtomicActivation {
    fn default() -> Self {
        Self::new(0.0)
    }
}
