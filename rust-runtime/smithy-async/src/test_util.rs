/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Test utilities for time and sleep

use crate::rt::sleep::{AsyncSleep, Sleep};
use crate::time::TimeSource;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Manually controlled time source
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    time: Arc<Mutex<SystemTime>>,
}

impl ManualTimeSource {
    /// Creates a time source that reports `time` until it is changed
    pub fn new(time: SystemTime) -> Self {
        ManualTimeSource {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Sets the current time
    pub fn set(&self, time: SystemTime) {
        *self.time.lock().unwrap() = time;
    }

    /// Moves the current time forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut time = self.time.lock().unwrap();
        *time += duration;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> SystemTime {
        *self.time.lock().unwrap()
    }
}

/// Sleep implementation that returns immediately and records every requested duration
#[derive(Debug, Clone, Default)]
pub struct InstantSleep {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl InstantSleep {
    /// Creates a new sleep with an empty log
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the durations requested so far, in order
    pub fn logs(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }

    /// Sum of every requested duration
    pub fn total_duration(&self) -> Duration {
        self.log.lock().unwrap().iter().sum()
    }
}

impl AsyncSleep for InstantSleep {
    fn sleep(&self, duration: Duration) -> Sleep {
        self.log.lock().unwrap().push(duration);
        Sleep::new(std::future::ready(()))
    }
}
