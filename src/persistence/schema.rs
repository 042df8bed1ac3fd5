// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! On-disk shape of the control state
//!
//! Version 2 wraps the records in `{version, devices}`. Version 1 was a bare
//! array keyed by `ip` and is migrated on load.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TuneError};
use crate::tuning::classifier::RailClass;
use crate::tuning::curve::ChipFamily;
use crate::tuning::profile::ProfileName;
use crate::tuning::state::{
    Action, BoundedLog, Ceiling, CostSettings, DeviceState, FaultRecord, Sample, Setting,
    ShareCounts, SlidingWindow, FAULT_HISTORY_CAP, SMOOTHING_WINDOW, TUNING_LOG_CAP,
};

/// Current state file version
pub const STATE_VERSION: u32 = 2;

/// Root of the state file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub devices: Vec<PersistedDevice>,
}

impl StateFile {
    pub fn new(devices: Vec<PersistedDevice>) -> Self {
        Self {
            version: STATE_VERSION,
            devices,
        }
    }

    /// Decode any known version
    pub fn decode(value: Value) -> Result<Self> {
        match value {
            Value::Array(_) => {
                let legacy: Vec<LegacyDevice> = serde_json::from_value(value)?;
                tracing::info!("Migrating {} legacy state records", legacy.len());
                Ok(Self::new(legacy.into_iter().map(PersistedDevice::from).collect()))
            }
            Value::Object(_) => {
                let file: StateFile = serde_json::from_value(value)?;
                if file.version > STATE_VERSION {
                    return Err(TuneError::Persistence(format!(
                        "state file version {} is newer than supported version {}",
                        file.version, STATE_VERSION
                    )));
                }
                Ok(file)
            }
            _ => Err(TuneError::Persistence(
                "state file is neither an object nor an array".to_string(),
            )),
        }
    }
}

/// Everything about a device that survives a restart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDevice {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Kept as text so unknown names fall back instead of failing the load
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub current_voltage: f64,
    #[serde(default)]
    pub current_frequency: f64,
    #[serde(default)]
    pub last_share_counts: ShareCounts,
    #[serde(default)]
    pub last_hardware_error_count: u64,
    #[serde(default)]
    pub error_rate_window: Vec<f64>,
    #[serde(default)]
    pub stable_cycle_count: u32,
    #[serde(default)]
    pub last_action: Action,
    #[serde(default)]
    pub adaptive_limits: Option<Ceiling>,
    #[serde(default)]
    pub fault_history: Vec<FaultRecord>,
    #[serde(default)]
    pub tuning_log: Vec<Sample>,
    #[serde(default)]
    pub detected_chip_family: Option<ChipFamily>,
    #[serde(default)]
    pub detected_rail_class: Option<RailClass>,
    #[serde(default)]
    pub cost: Option<CostSettings>,
    #[serde(default)]
    pub last_known_good: Option<Setting>,
}

fn default_enabled() -> bool {
    true
}

impl From<&DeviceState> for PersistedDevice {
    fn from(state: &DeviceState) -> Self {
        Self {
            address: state.address.clone(),
            name: state.name.clone(),
            enabled: state.enabled,
            profile: state.profile.to_string(),
            current_voltage: state.current_voltage,
            current_frequency: state.current_frequency,
            last_share_counts: state.last_shares,
            last_hardware_error_count: state.last_hardware_error_count,
            error_rate_window: state.error_rate_window.values(),
            stable_cycle_count: state.stable_cycle_count,
            last_action: state.last_action,
            adaptive_limits: state.adaptive_limits,
            fault_history: state.fault_history.to_vec(),
            tuning_log: state.tuning_log.to_vec(),
            detected_chip_family: state.chip_family,
            detected_rail_class: state.rail_class,
            cost: state.cost,
            last_known_good: state.last_known_good,
        }
    }
}

impl PersistedDevice {
    /// Rebuild the in-memory state; runtime-only fields start fresh
    pub fn into_state(self) -> DeviceState {
        let mut state = DeviceState::new(self.address, ProfileName::parse_or_default(&self.profile));
        state.name = self.name;
        state.enabled = self.enabled;
        state.current_voltage = self.current_voltage;
        state.current_frequency = self.current_frequency;
        state.last_shares = self.last_share_counts;
        state.last_hardware_error_count = self.last_hardware_error_count;
        state.error_rate_window = SlidingWindow::from_values(SMOOTHING_WINDOW, self.error_rate_window);
        state.stable_cycle_count = self.stable_cycle_count;
        state.last_action = self.last_action;
        state.adaptive_limits = self.adaptive_limits;
        state.fault_history = BoundedLog::from_entries(FAULT_HISTORY_CAP, self.fault_history);
        state.tuning_log = BoundedLog::from_entries(TUNING_LOG_CAP, self.tuning_log);
        state.chip_family = self.detected_chip_family;
        state.rail_class = self.detected_rail_class;
        state.cost = self.cost;
        state.last_known_good = self.last_known_good;
        state
    }
}

/// Version 1 record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDevice {
    ip: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    current_voltage: Option<f64>,
    #[serde(default)]
    current_freq: Option<f64>,
    #[serde(default)]
    last_shares: Option<LegacyShares>,
    #[serde(default)]
    last_error_count: Option<u64>,
    #[serde(default)]
    error_history: Vec<f64>,
    #[serde(default)]
    stable_cycle_count: Option<u32>,
    #[serde(default)]
    last_action: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct LegacyShares {
    #[serde(default)]
    valid: u64,
    #[serde(default)]
    invalid: u64,
}

impl From<LegacyDevice> for PersistedDevice {
    fn from(legacy: LegacyDevice) -> Self {
        let shares = legacy.last_shares.unwrap_or_default();
        Self {
            address: legacy.ip,
            name: None,
            enabled: legacy.enabled,
            profile: legacy.mode.unwrap_or_default(),
            current_voltage: legacy.current_voltage.unwrap_or_default(),
            current_frequency: legacy.current_freq.unwrap_or_default(),
            last_share_counts: ShareCounts {
                accepted: shares.valid,
                rejected: shares.invalid,
            },
            last_hardware_error_count: legacy.last_error_count.unwrap_or_default(),
            error_rate_window: legacy.error_history,
            stable_cycle_count: legacy.stable_cycle_count.unwrap_or_default(),
            last_action: legacy
                .last_action
                .as_deref()
                .map(Action::from_tag)
                .unwrap_or_default(),
            adaptive_limits: None,
            fault_history: Vec::new(),
            tuning_log: Vec::new(),
            detected_chip_family: None,
            detected_rail_class: None,
            cost: None,
            last_known_good: None,
        }
    }
}
