// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for axetune
//!
//! Settings are read from ~/.axetune/settings.json; axetune never writes them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::tuning::profile::{InputVoltageRange, Profile, ProfileName, ProfileTable, StallThresholds};
use crate::tuning::state::CostSettings;

mod io;
mod migration;
mod validation;

/// Profile value that switches tuning off for a device
pub const PROFILE_OFF: &str = "off";

/// Main settings structure, stored in ~/.axetune/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Control loop timing
    #[serde(default)]
    pub controller: ControllerConfig,

    /// State file location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Devices to seed tuning with on first start
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Per-profile overrides of the built-in tables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<ProfileName, ProfileOverride>,
}

/// Control loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Scheduler tick, seconds
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Telemetry read timeout, milliseconds
    #[serde(default = "default_telemetry_timeout_ms")]
    pub telemetry_timeout_ms: u64,

    /// Settings write and restart timeout, milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Stabilization window after a fault restart, seconds
    #[serde(default = "default_stabilization_secs")]
    pub stabilization_secs: u64,

    /// Coalescing delay for state file writes, milliseconds
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            telemetry_timeout_ms: default_telemetry_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            stabilization_secs: default_stabilization_secs(),
            persist_debounce_ms: default_persist_debounce_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn stabilization_window(&self) -> Duration {
        Duration::from_secs(self.stabilization_secs)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// State file path (default: ~/.axetune/autotune_state.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| Settings::axetune_home().join("autotune_state.json"))
    }
}

/// A configured device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Host or base URL of the device API
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Profile name, or "off"
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Electricity price per kWh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwh_price: Option<f64>,

    /// Daily cost ceiling for cost-sensitive tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_cost_limit: Option<f64>,
}

impl DeviceConfig {
    /// Profile to tune with; `None` when tuning is off
    pub fn profile_name(&self) -> Option<ProfileName> {
        if self.profile.trim().eq_ignore_ascii_case(PROFILE_OFF) {
            None
        } else {
            Some(ProfileName::parse_or_default(&self.profile))
        }
    }

    pub fn cost_settings(&self) -> Option<CostSettings> {
        if self.kwh_price.is_none() && self.daily_cost_limit.is_none() {
            return None;
        }
        Some(CostSettings {
            price_per_kwh: self.kwh_price,
            daily_cost_limit: self.daily_cost_limit,
        })
    }
}

/// Optional replacements for any numeric field of a built-in profile
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProfileOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjust_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_warning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_danger: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_efficiency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rail_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_voltage_range: Option<InputVoltageRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_watts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_error_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severe_hw_error_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_hash_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stall: Option<StallThresholds>,
}

macro_rules! override_fields {
    ($src:expr, $dst:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $src.$field {
                $dst.$field = value;
            }
        )+
    };
}

impl ProfileOverride {
    /// Apply the set fields on top of `profile`
    pub fn apply(&self, mut profile: Profile) -> Profile {
        override_fields!(
            self,
            profile,
            min_voltage,
            max_voltage,
            min_frequency,
            max_frequency,
            voltage_step,
            frequency_step,
            adjust_interval_secs,
            temp_target,
            temp_warning,
            temp_danger,
            max_error_rate,
            recovery_voltage,
            recovery_frequency,
            max_rail_temp,
            input_voltage_range,
            max_watts,
            emergency_temp,
            hw_error_threshold,
            severe_hw_error_threshold,
            min_hash_ratio,
            stall,
        );
        if self.target_efficiency.is_some() {
            profile.target_efficiency = self.target_efficiency;
        }
        profile
    }
}

impl Settings {
    /// Built-in profiles with the configured overrides applied
    pub fn profile_table(&self) -> ProfileTable {
        let mut table = ProfileTable::default();
        for (name, overrides) in &self.profiles {
            table.insert(*name, overrides.apply(Profile::builtin(*name)));
        }
        table
    }
}

fn default_tick_interval_secs() -> u64 {
    10
}

fn default_telemetry_timeout_ms() -> u64 {
    3000
}

fn default_write_timeout_ms() -> u64 {
    5000
}

fn default_stabilization_secs() -> u64 {
    120
}

fn default_persist_debounce_ms() -> u64 {
    250
}

fn default_profile() -> String {
    ProfileName::default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_controller_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(10));
        assert_eq!(config.telemetry_timeout(), Duration::from_secs(3));
        assert_eq!(config.write_timeout(), Duration::from_secs(5));
        assert_eq!(config.stabilization_window(), Duration::from_secs(120));
    }

    #[test]
    fn test_settings_load_from_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let settings = Settings::load_from(&path).unwrap();
        assert!(settings.devices.is_empty());
        assert_eq!(settings.controller.tick_interval_secs, 10);
    }

    #[test]
    fn test_settings_partial_json() {
        let json = r#"{
            "controller": {"tick_interval_secs": 5},
            "devices": [{"address": "192.168.1.50"}]
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.controller.tick_interval_secs, 5);
        assert_eq!(settings.controller.stabilization_secs, 120);
        assert_eq!(settings.devices[0].profile, "conservative");
        assert_eq!(
            settings.devices[0].profile_name(),
            Some(ProfileName::Conservative)
        );
    }

    #[test]
    fn test_device_profile_off() {
        let device = DeviceConfig {
            address: "10.0.0.1".into(),
            name: None,
            profile: "OFF".into(),
            kwh_price: None,
            daily_cost_limit: None,
        };
        assert!(device.profile_name().is_none());
        assert!(device.cost_settings().is_none());
    }

    #[test]
    fn test_device_cost_settings() {
        let device = DeviceConfig {
            address: "10.0.0.1".into(),
            name: Some("garage".into()),
            profile: "cost_sensitive".into(),
            kwh_price: Some(0.31),
            daily_cost_limit: None,
        };
        let cost = device.cost_settings().unwrap();
        assert_eq!(cost.price_per_kwh, Some(0.31));
        assert!(cost.daily_cost_limit.is_none());
    }

    #[test]
    fn test_profile_overrides_apply() {
        let json = r#"{
            "profiles": {
                "aggressive": {"max_frequency": 900, "temp_target": 68},
                "conservative": {"stall": {"min_expected_hashrate": 50, "max_hashrate_ratio": 0.1, "max_power_watts": 8}}
            }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        let table = settings.profile_table();

        let aggressive = table.get(ProfileName::Aggressive);
        assert_eq!(aggressive.max_frequency, 900.0);
        assert_eq!(aggressive.temp_target, 68.0);
        assert_eq!(aggressive.min_frequency, 450.0);

        assert_eq!(table.get(ProfileName::Conservative).stall.max_power_watts, 8.0);
        assert_eq!(table.get(ProfileName::CostSensitive), &Profile::cost_sensitive());
    }

    #[test]
    fn test_storage_state_path_override() {
        let storage = StorageConfig {
            state_path: Some(PathBuf::from("/tmp/state.json")),
        };
        assert_eq!(storage.state_path(), PathBuf::from("/tmp/state.json"));
        assert!(StorageConfig::default()
            .state_path()
            .ends_with("autotune_state.json"));
    }

    #[test]
    fn test_resolve_validates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"controller": {"tick_interval_secs": 0}}"#).unwrap();

        assert!(Settings::load_from(&path).is_ok());
        assert!(matches!(
            Settings::resolve(Some(&path)),
            Err(crate::error::TuneError::Config(_))
        ));
    }

    #[test]
    fn test_resolve_missing_file_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.json");
        let settings = Settings::resolve(Some(&path)).unwrap();
        assert_eq!(settings.controller.stabilization_secs, 120);
    }

    #[test]
    fn test_load_from_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            Settings::load_from(temp_dir.path()),
            Err(crate::error::TuneError::Io(_))
        ));
    }

    #[test]
    fn test_load_migrates_legacy_mode_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"devices": [{"address": "10.0.0.3", "mode": "aggressive"}]}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.devices[0].profile, "aggressive");
    }
}
