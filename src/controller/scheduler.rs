// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Periodic scheduler
//!
//! Every tick spawns one task per tuned device. Tasks never block each other;
//! a device still busy from the previous tick is skipped by the controller's
//! single-flight guard.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::tuning::profile::Profile;
use crate::tuning::state::DeviceState;

use super::Controller;

/// Whether a device should be cycled at `now`
pub fn is_due(state: &DeviceState, profile: &Profile, now: DateTime<Utc>) -> bool {
    if !state.enabled {
        return false;
    }
    match state.last_adjustment {
        Some(last) => (now - last).num_seconds() >= profile.adjust_interval_secs as i64,
        None => true,
    }
}

pub struct Scheduler {
    controller: Arc<Controller>,
}

impl Scheduler {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    /// Start one cycle task per device and return their handles
    pub async fn tick(&self) -> Vec<JoinHandle<()>> {
        let addresses = self.controller.addresses().await;
        tracing::debug!("Tick: {} devices", addresses.len());

        addresses
            .into_iter()
            .map(|address| {
                let controller = Arc::clone(&self.controller);
                tokio::spawn(async move {
                    if let Err(e) = controller.run_device_cycle(&address).await {
                        tracing::warn!(device = %address, "Cycle failed: {}", e);
                    }
                })
            })
            .collect()
    }

    /// Tick until `shutdown` resolves, then wait for in-flight cycles and
    /// flush pending state
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.controller.config().tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        tracing::info!(
            "Controller running, tick every {}s",
            self.controller.config().tick_interval_secs
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    in_flight.retain(|handle| !handle.is_finished());
                    in_flight.extend(self.tick().await);
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down, waiting for {} cycles", in_flight.len());
                    break;
                }
            }
        }
        for result in futures::future::join_all(in_flight).await {
            if let Err(e) = result {
                tracing::warn!("Cycle task panicked: {}", e);
            }
        }
        self.controller.flush().await;
    }
}
