// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tuning profiles: named bundles of static bounds and thresholds

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::classifier::RailClass;
use crate::error::TuneError;

/// Named tuning presets. `Conservative` is the fallback for any lookup miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileName {
    #[default]
    Conservative,
    Aggressive,
    CostSensitive,
}

impl ProfileName {
    /// Every preset, in display order
    pub const ALL: [ProfileName; 3] = [
        ProfileName::Conservative,
        ProfileName::Aggressive,
        ProfileName::CostSensitive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Conservative => "conservative",
            ProfileName::Aggressive => "aggressive",
            ProfileName::CostSensitive => "cost_sensitive",
        }
    }

    /// Lenient lookup used for persisted or configured names.
    /// Unknown names fall back to the default preset.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unknown profile '{}', falling back to '{}'",
                name,
                ProfileName::default()
            );
            ProfileName::default()
        })
    }

    /// Whether the cost-overrun rule applies to this preset
    pub fn is_cost_sensitive(&self) -> bool {
        matches!(self, ProfileName::CostSensitive)
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "conservative" => Ok(ProfileName::Conservative),
            "aggressive" => Ok(ProfileName::Aggressive),
            "cost_sensitive" | "cost" => Ok(ProfileName::CostSensitive),
            other => Err(TuneError::Validation(format!("unknown profile '{}'", other))),
        }
    }
}

/// Acceptable input-rail band in millivolts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputVoltageRange {
    pub min_mv: f64,
    pub max_mv: f64,
}

impl InputVoltageRange {
    /// Band for `rail`. Configured bands describe a 5V supply and scale
    /// with the rail's nominal input.
    pub fn for_rail(&self, rail: RailClass) -> Self {
        let scale = rail.nominal_input_mv() / RailClass::FiveVolt.nominal_input_mv();
        Self {
            min_mv: self.min_mv * scale,
            max_mv: self.max_mv * scale,
        }
    }

    /// A zero reading means the device did not report the rail.
    pub fn is_violated_by(&self, input_mv: f64) -> bool {
        input_mv > 0.0 && (input_mv < self.min_mv || input_mv > self.max_mv)
    }
}

/// Cut lines for the "stalled" critical fault
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StallThresholds {
    /// Expected hashrate (GH/s) above which a stall is meaningful
    pub min_expected_hashrate: f64,
    /// Observed/expected ratio below which hashing counts as stopped
    pub max_hashrate_ratio: f64,
    /// Power draw (W) below which the ASIC is considered idle
    pub max_power_watts: f64,
}

impl Default for StallThresholds {
    fn default() -> Self {
        Self {
            min_expected_hashrate: 100.0,
            max_hashrate_ratio: 0.05,
            max_power_watts: 10.0,
        }
    }
}

/// Static tuning bounds for one preset.
///
/// Voltages are core millivolts, frequencies MHz, temperatures °C, power W.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub min_voltage: f64,
    pub max_voltage: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub voltage_step: f64,
    pub frequency_step: f64,
    /// Minimum spacing between applied changes, in seconds
    pub adjust_interval_secs: u64,
    pub temp_target: f64,
    pub temp_warning: f64,
    pub temp_danger: f64,
    /// Energy per unit work target (J/TH); `None` disables efficiency tuning
    pub target_efficiency: Option<f64>,
    /// Smoothed rejected-share fraction tolerated before acting
    pub max_error_rate: f64,
    pub recovery_voltage: f64,
    pub recovery_frequency: f64,
    /// VRM temperature cap (soft fault)
    pub max_rail_temp: f64,
    pub input_voltage_range: InputVoltageRange,
    /// Power cap (soft fault)
    pub max_watts: f64,
    /// Raw core temperature that forces the profile minimum
    pub emergency_temp: f64,
    /// Hardware error delta per cycle that counts as instability
    pub hw_error_threshold: u64,
    /// Hardware error delta per cycle treated like a high share error rate
    pub severe_hw_error_threshold: u64,
    /// Hash performance ratio below which the device is underperforming
    pub min_hash_ratio: f64,
    pub stall: StallThresholds,
}

impl Profile {
    pub fn conservative() -> Self {
        Self {
            min_voltage: 1150.0,
            max_voltage: 1250.0,
            min_frequency: 450.0,
            max_frequency: 575.0,
            voltage_step: 10.0,
            frequency_step: 10.0,
            adjust_interval_secs: 60,
            temp_target: 62.0,
            temp_warning: 67.0,
            temp_danger: 72.0,
            target_efficiency: Some(16.0),
            max_error_rate: 0.05,
            recovery_voltage: 1150.0,
            recovery_frequency: 500.0,
            max_rail_temp: 85.0,
            input_voltage_range: InputVoltageRange {
                min_mv: 4800.0,
                max_mv: 5600.0,
            },
            max_watts: 40.0,
            emergency_temp: 75.0,
            hw_error_threshold: 5,
            severe_hw_error_threshold: 20,
            min_hash_ratio: 0.94,
            stall: StallThresholds::default(),
        }
    }

    pub fn aggressive() -> Self {
        Self {
            max_voltage: 1400.0,
            max_frequency: 1200.0,
            voltage_step: 15.0,
            adjust_interval_secs: 30,
            temp_target: 71.0,
            temp_warning: 72.0,
            temp_danger: 73.0,
            target_efficiency: None,
            max_error_rate: 0.25,
            recovery_frequency: 800.0,
            max_rail_temp: 86.0,
            max_watts: 45.0,
            hw_error_threshold: 50,
            ..Self::conservative()
        }
    }

    /// Conservative bounds; what sets it apart is the daily cost rule
    pub fn cost_sensitive() -> Self {
        Self::conservative()
    }

    /// Built-in table entry for a preset
    pub fn builtin(name: ProfileName) -> Self {
        match name {
            ProfileName::Conservative => Self::conservative(),
            ProfileName::Aggressive => Self::aggressive(),
            ProfileName::CostSensitive => Self::cost_sensitive(),
        }
    }

    pub fn adjust_interval(&self) -> Duration {
        Duration::from_secs(self.adjust_interval_secs)
    }
}

/// Resolved profile for every preset
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    profiles: HashMap<ProfileName, Profile>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            profiles: ProfileName::ALL
                .into_iter()
                .map(|name| (name, Profile::builtin(name)))
                .collect(),
        }
    }
}

impl ProfileTable {
    /// Replace one preset's bounds
    pub fn insert(&mut self, name: ProfileName, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Profile for `name`, falling back to the default preset
    pub fn get(&self, name: ProfileName) -> &Profile {
        self.profiles
            .get(&name)
            .or_else(|| self.profiles.get(&ProfileName::default()))
            .unwrap_or(&FALLBACK)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProfileName, &Profile)> {
        ProfileName::ALL.into_iter().map(move |name| (name, self.get(name)))
    }
}

static FALLBACK: std::sync::LazyLock<Profile> = std::sync::LazyLock::new(Profile::conservative);
