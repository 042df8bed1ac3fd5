// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-process device fleet for tests
//!
//! Serves scripted telemetry per address, records every settings write and
//! restart, and echoes applied settings back into later samples the way real
//! firmware does.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::device::client::{DeviceClient, DeviceResult, SettingsPatch};
use crate::device::Telemetry;
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct Fleet {
    /// Scripted samples; the last one repeats once the queue drains
    scripts: HashMap<String, VecDeque<Telemetry>>,
    /// Last written setting per address
    applied: HashMap<String, SettingsPatch>,
    writes: Vec<(String, SettingsPatch)>,
    restarts: Vec<String>,
    unreachable: Vec<String>,
}

/// A mock fleet implementing [`DeviceClient`]
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    fleet: Arc<Mutex<Fleet>>,
    fetch_count: Arc<AtomicUsize>,
    reject_writes: Arc<AtomicBool>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn fleet(&self) -> MutexGuard<'_, Fleet> {
        self.fleet.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue samples for an address
    pub fn with_telemetry(self, address: &str, samples: Vec<Telemetry>) -> Self {
        self.push_telemetry(address, samples);
        self
    }

    pub fn push_telemetry(&self, address: &str, samples: Vec<Telemetry>) {
        self.fleet()
            .scripts
            .entry(address.to_string())
            .or_default()
            .extend(samples);
    }

    /// Make every call for an address fail with a connection error
    pub fn set_unreachable(&self, address: &str) {
        self.fleet().unreachable.push(address.to_string());
    }

    /// Answer settings writes with HTTP 500
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Every write as `(address, patch)`, oldest first
    pub fn writes(&self) -> Vec<(String, SettingsPatch)> {
        self.fleet().writes.clone()
    }

    pub fn last_write(&self, address: &str) -> Option<SettingsPatch> {
        self.fleet()
            .writes
            .iter()
            .rev()
            .find(|(addr, _)| addr == address)
            .map(|(_, patch)| *patch)
    }

    pub fn restarts(&self) -> Vec<String> {
        self.fleet().restarts.clone()
    }

    fn check_reachable(fleet: &Fleet, address: &str) -> DeviceResult<()> {
        if fleet.unreachable.iter().any(|a| a == address) {
            return Err(DeviceError::Connection(format!("{} unreachable", address)));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceClient for MockDevice {
    async fn fetch_telemetry(&self, address: &str) -> DeviceResult<Telemetry> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let mut fleet = self.fleet();
        Self::check_reachable(&fleet, address)?;

        let applied = fleet.applied.get(address).copied();
        let queue = fleet
            .scripts
            .get_mut(address)
            .ok_or_else(|| DeviceError::Connection(format!("no telemetry for {}", address)))?;
        let mut sample = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
        .ok_or_else(|| DeviceError::Malformed("empty script".to_string()))?;

        if let Some(patch) = applied {
            sample.core_voltage = patch.core_voltage as f64;
            sample.frequency = patch.frequency as f64;
        }
        Ok(sample)
    }

    async fn apply_settings(&self, address: &str, patch: SettingsPatch) -> DeviceResult<()> {
        let mut fleet = self.fleet();
        Self::check_reachable(&fleet, address)?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::Status {
                status: 500,
                message: "write rejected".to_string(),
            });
        }
        fleet.writes.push((address.to_string(), patch));
        fleet.applied.insert(address.to_string(), patch);
        Ok(())
    }

    async fn restart(&self, address: &str) -> DeviceResult<()> {
        let mut fleet = self.fleet();
        Self::check_reachable(&fleet, address)?;
        fleet.restarts.push(address.to_string());
        Ok(())
    }
}
