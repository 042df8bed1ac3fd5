// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tuning controller
//!
//! Owns the per-device state store and exposes the operator surface: enable,
//! disable, limit overrides and read-only views. The [`scheduler`] drives the
//! periodic control cycles against it.

pub mod applier;
pub mod cycle;
pub mod observer;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::config::{ControllerConfig, DeviceConfig};
use crate::device::DeviceClient;
use crate::error::{Result, TuneError};
use crate::persistence::PersistHandle;
use crate::tuning::limits;
use crate::tuning::profile::{Profile, ProfileName, ProfileTable};
use crate::tuning::state::{Ceiling, CostSettings, DeviceState};

pub use cycle::{run_cycle, CycleOutcome};
pub use observer::{DeviceDetail, DeviceLimits, LimitsSummary, Reduction};
pub use scheduler::Scheduler;

type SharedState = Arc<Mutex<DeviceState>>;

/// Request to put a device under tuning
#[derive(Debug, Clone, PartialEq)]
pub struct EnableRequest {
    pub address: String,
    pub name: Option<String>,
    pub profile: ProfileName,
    pub cost: Option<CostSettings>,
}

impl EnableRequest {
    pub fn new(address: impl Into<String>, profile: ProfileName) -> Self {
        Self {
            address: address.into(),
            name: None,
            profile,
            cost: None,
        }
    }

    /// Build from a configured device; `None` when its profile is "off"
    pub fn from_config(device: &DeviceConfig) -> Option<Self> {
        Some(Self {
            address: device.address.trim().to_string(),
            name: device.name.clone(),
            profile: device.profile_name()?,
            cost: device.cost_settings(),
        })
    }
}

/// The tuning controller
pub struct Controller {
    client: Arc<dyn DeviceClient>,
    profiles: ProfileTable,
    config: ControllerConfig,
    devices: RwLock<HashMap<String, SharedState>>,
    persist: Option<PersistHandle>,
}

impl Controller {
    pub fn new(client: Arc<dyn DeviceClient>, profiles: ProfileTable, config: ControllerConfig) -> Self {
        Self {
            client,
            profiles,
            config,
            devices: RwLock::new(HashMap::new()),
            persist: None,
        }
    }

    /// Send every state change to the background writer
    pub fn with_persistence(mut self, handle: PersistHandle) -> Self {
        self.persist = Some(handle);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn profile(&self, name: ProfileName) -> &Profile {
        self.profiles.get(name)
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    /// Adopt previously persisted states
    pub async fn restore(&self, states: Vec<DeviceState>) {
        let mut devices = self.devices.write().await;
        for state in states {
            devices.insert(state.address.clone(), Arc::new(Mutex::new(state)));
        }
    }

    /// Enable configured devices that are not tuned yet
    pub async fn seed(&self, configured: &[DeviceConfig]) {
        for device in configured {
            let Some(request) = EnableRequest::from_config(device) else {
                continue;
            };
            if self.entry(&request.address).await.is_none() {
                self.enable(request).await;
            }
        }
    }

    /// Put a device under tuning. An already tuned device keeps what it
    /// learned; only its profile, name and cost settings change.
    pub async fn enable(&self, request: EnableRequest) {
        let shared = {
            let mut devices = self.devices.write().await;
            devices
                .entry(request.address.clone())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(DeviceState::new(
                        request.address.clone(),
                        request.profile,
                    )))
                })
                .clone()
        };

        let mut state = shared.lock().await;
        state.enabled = true;
        state.profile = request.profile;
        if request.name.is_some() {
            state.name = request.name;
        }
        if request.cost.is_some() {
            state.cost = request.cost;
        }
        tracing::info!(
            device = %state.address,
            "Tuning enabled with profile {}",
            state.profile
        );
        self.persist(&state);
    }

    /// Stop tuning a device and discard its state
    pub async fn disable(&self, address: &str) -> Result<()> {
        let removed = self.devices.write().await.remove(address);
        if removed.is_none() {
            return Err(TuneError::UnknownDevice(address.to_string()));
        }
        if let Some(persist) = &self.persist {
            persist.remove(address);
        }
        tracing::info!(device = %address, "Tuning disabled");
        Ok(())
    }

    /// Addresses of every tuned device
    pub async fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.devices.read().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    async fn entry(&self, address: &str) -> Option<SharedState> {
        self.devices.read().await.get(address).cloned()
    }

    async fn require(&self, address: &str) -> Result<SharedState> {
        self.entry(address)
            .await
            .ok_or_else(|| TuneError::UnknownDevice(address.to_string()))
    }

    /// Copy of every device state
    pub async fn snapshot(&self) -> Vec<DeviceState> {
        let entries: Vec<SharedState> = self.devices.read().await.values().cloned().collect();
        let mut states = Vec::with_capacity(entries.len());
        for entry in entries {
            states.push(entry.lock().await.clone());
        }
        states
    }

    pub async fn summary(&self) -> LimitsSummary {
        observer::summarize(&self.snapshot().await, &self.profiles)
    }

    pub async fn detail(&self, address: &str) -> Result<DeviceDetail> {
        let shared = self.require(address).await?;
        let state = shared.lock().await;
        Ok(observer::detail(&state, &self.profiles))
    }

    pub async fn reset_adaptive_limits(&self, address: &str) -> Result<Ceiling> {
        let shared = self.require(address).await?;
        let mut state = shared.lock().await;
        let profile = self.profiles.get(state.profile);
        let ceiling = limits::reset(&mut state, profile);
        self.persist(&state);
        Ok(ceiling)
    }

    pub async fn set_adaptive_limits(
        &self,
        address: &str,
        max_voltage: f64,
        max_frequency: f64,
    ) -> Result<Ceiling> {
        let shared = self.require(address).await?;
        let mut state = shared.lock().await;
        let profile = self.profiles.get(state.profile);
        let ceiling = limits::set_manual(&mut state, profile, max_voltage, max_frequency)?;
        self.persist(&state);
        Ok(ceiling)
    }

    /// Run one control cycle for `address` if it is due.
    ///
    /// Returns `Ok(None)` when the device is disabled, inside its adjust
    /// interval, or already mid-cycle.
    pub async fn run_device_cycle(&self, address: &str) -> Result<Option<CycleOutcome>> {
        let shared = self.require(address).await?;
        let Ok(mut state) = shared.try_lock() else {
            tracing::debug!(device = %address, "Previous cycle still running, skipping");
            return Ok(None);
        };

        let now = Utc::now();
        let profile = self.profiles.get(state.profile);
        if !scheduler::is_due(&state, profile, now) {
            return Ok(None);
        }

        let stabilization = chrono::Duration::from_std(self.config.stabilization_window())
            .map_err(|e| TuneError::Config(format!("stabilization window: {}", e)))?;
        let outcome = run_cycle(self.client.as_ref(), &mut state, profile, stabilization, now).await?;
        self.persist(&state);
        Ok(Some(outcome))
    }

    /// Write anything queued for persistence
    pub async fn flush(&self) {
        if let Some(persist) = &self.persist {
            persist.flush().await;
        }
    }

    fn persist(&self, state: &DeviceState) {
        if let Some(persist) = &self.persist {
            persist.save(state);
        }
    }
}
