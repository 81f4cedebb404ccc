/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Random number sources used to jitter backoff delays and credential refresh times.
//!
//! Sources are shared between every request of a client, so implementations must be safe to
//! call concurrently. Tests substitute a [`StaticRandomSource`] to make delays deterministic.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A source of uniformly distributed fractions
pub trait RandomSource: Debug + Send + Sync {
    /// Returns a value in `[0, 1)`
    fn next_f64(&self) -> f64;
}

/// `fastrand` generator behind a mutex
#[derive(Debug)]
pub struct FastRandSource {
    rng: Mutex<fastrand::Rng>,
}

impl FastRandSource {
    pub fn new() -> Self {
        FastRandSource {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Seeded generator, repeatable across runs
    pub fn with_seed(seed: u64) -> Self {
        FastRandSource {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for FastRandSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for FastRandSource {
    fn next_f64(&self) -> f64 {
        match self.rng.lock() {
            Ok(rng) => rng.f64(),
            // a poisoned generator is still a usable generator
            Err(poisoned) => poisoned.into_inner().f64(),
        }
    }
}

/// Always returns the same fraction
#[derive(Debug, Clone, Copy)]
pub struct StaticRandomSource(f64);

impl StaticRandomSource {
    /// `value` is clamped into `[0, 1)`
    pub fn new(value: f64) -> Self {
        StaticRandomSource(value.max(0.0).min(ONE_MINUS_EPSILON))
    }
}

const ONE_MINUS_EPSILON: f64 = 1.0 - f64::EPSILON;

impl RandomSource for StaticRandomSource {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Wrapper type around a shareable [`RandomSource`]
#[derive(Debug, Clone)]
pub struct SharedRandomSource(Arc<dyn RandomSource>);

impl SharedRandomSource {
    pub fn new(source: impl RandomSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    /// Draws a duration uniformly from `[duration, 2 * duration)`.
    pub fn seed_duration(&self, duration: Duration) -> Duration {
        duration + duration.mul_f64(self.next_f64())
    }
}

impl Default for SharedRandomSource {
    fn default() -> Self {
        SharedRandomSource::new(FastRandSource::new())
    }
}

impl RandomSource for SharedRandomSource {
    fn next_f64(&self) -> f64 {
        self.0.next_f64()
    }
}
