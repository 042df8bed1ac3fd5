// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-device control state and its bounded containers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::classifier::{RailClass, RailLimits};
use super::curve::ChipFamily;
use super::profile::ProfileName;

/// Samples kept for temperature and error-rate smoothing
pub const SMOOTHING_WINDOW: usize = 5;
/// Fault records kept per device
pub const FAULT_HISTORY_CAP: usize = 50;
/// Tuning log samples kept per device
pub const TUNING_LOG_CAP: usize = 500;

/// Fixed-size window of recent readings
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Build a window from persisted values, keeping only the newest ones
    pub fn from_values(capacity: usize, values: impl IntoIterator<Item = f64>) -> Self {
        let mut window = Self::new(capacity);
        for value in values {
            window.push(value);
        }
        window
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Append-only list that evicts its oldest entry on overflow
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn from_entries(capacity: usize, entries: impl IntoIterator<Item = T>) -> Self {
        let mut log = Self::new(capacity);
        for entry in entries {
            log.push(entry);
        }
        log
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> BoundedLog<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// Upper bound on core voltage (mV) and clock (MHz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ceiling {
    pub max_voltage: f64,
    pub max_frequency: f64,
}

/// A voltage/frequency pair applied to or observed on a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub voltage: f64,
    pub frequency: f64,
}

/// Share counters from the previous cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCounts {
    pub accepted: u64,
    pub rejected: u64,
}

/// Electricity pricing for cost-sensitive tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSettings {
    #[serde(default)]
    pub price_per_kwh: Option<f64>,
    #[serde(default)]
    pub daily_cost_limit: Option<f64>,
}

impl CostSettings {
    /// Projected daily cost at a constant power draw
    pub fn daily_cost(&self, power_watts: f64) -> f64 {
        match self.price_per_kwh {
            Some(price) if power_watts > 0.0 && price > 0.0 => power_watts / 1000.0 * 24.0 * price,
            _ => 0.0,
        }
    }
}

/// A confirmed critical fault and what was learned from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultRecord {
    pub timestamp: DateTime<Utc>,
    pub voltage_at_fault: f64,
    pub frequency_at_fault: f64,
    pub reasons: Vec<String>,
    pub resulting_limits: Ceiling,
    #[serde(default)]
    pub limits_adapted: bool,
}

/// One tuning log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub voltage: f64,
    pub frequency: f64,
    pub hashrate: f64,
    pub power: f64,
    pub smoothed_temp: f64,
    pub smoothed_error_rate: f64,
    pub action: Action,
}

/// Label of the decision taken in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    #[default]
    Maintain,
    Stabilizing,
    PostRestartRecovery,
    EmergencyCooling,
    CostThrottleFrequency,
    CostThrottleVoltage,
    CriticalFaultRecovery,
    RailTempThrottle,
    PowerLimitThrottle,
    ThermalDanger,
    ThermalWarning,
    InstabilityRevertOptimization,
    InstabilityThrottleFrequency,
    IncreaseStabilityVoltage,
    HashrateStabilityBoost,
    HashrateThrottle,
    StabilityWatch,
    VoltagePullback,
    TuneForEfficiency,
    IncreaseFrequencyEfficiency,
    IncreaseFrequency,
    IncreaseFrequencyWithCurve,
    IncreaseFrequencyWithCurveOffset,
    IncreaseFrequencyReduceVoltage,
    IncreaseFrequencyReduceVoltageCurve,
    OptimizeVoltageThermal,
    OptimizeVoltageMaxFrequency,
    CeilingCapped,
}

impl Action {
    const TAGS: [(Action, &'static str); 28] = [
        (Action::Maintain, "maintain"),
        (Action::Stabilizing, "stabilizing"),
        (Action::PostRestartRecovery, "post_restart_recovery"),
        (Action::EmergencyCooling, "emergency_cooling"),
        (Action::CostThrottleFrequency, "cost_throttle_freq"),
        (Action::CostThrottleVoltage, "cost_throttle_voltage"),
        (Action::CriticalFaultRecovery, "critical_fault_recovery"),
        (Action::RailTempThrottle, "vr_temp_throttle"),
        (Action::PowerLimitThrottle, "power_limit_throttle"),
        (Action::ThermalDanger, "decrease_temp_aggressive"),
        (Action::ThermalWarning, "decrease_temp_warning"),
        (Action::InstabilityRevertOptimization, "instability_revert_optimization"),
        (Action::InstabilityThrottleFrequency, "instability_throttle_freq"),
        (Action::IncreaseStabilityVoltage, "increase_stability_voltage"),
        (Action::HashrateStabilityBoost, "hashrate_stability_boost"),
        (Action::HashrateThrottle, "hashrate_throttle"),
        (Action::StabilityWatch, "stability_watch"),
        (Action::VoltagePullback, "voltage_pullback_optimization"),
        (Action::TuneForEfficiency, "tune_for_efficiency"),
        (Action::IncreaseFrequencyEfficiency, "increase_freq_efficiency"),
        (Action::IncreaseFrequency, "increase_freq"),
        (Action::IncreaseFrequencyWithCurve, "increase_freq_with_curve"),
        (Action::IncreaseFrequencyWithCurveOffset, "increase_freq_with_curve_offset"),
        (Action::IncreaseFrequencyReduceVoltage, "increase_freq_reduce_voltage"),
        (Action::IncreaseFrequencyReduceVoltageCurve, "increase_freq_reduce_voltage_curve"),
        (Action::OptimizeVoltageThermal, "optimize_voltage_thermal"),
        (Action::OptimizeVoltageMaxFrequency, "optimize_voltage_max_freq"),
        (Action::CeilingCapped, "ceiling_capped"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::TAGS
            .iter()
            .find(|(action, _)| action == self)
            .map(|(_, tag)| *tag)
            .unwrap_or("maintain")
    }

    /// Parse a persisted tag, accepting older spellings. Unknown tags read as `Maintain`.
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace("pll", "curve");
        let normalized = match normalized.as_str() {
            "vf_curve_cap" => "ceiling_capped",
            other => other,
        };
        Self::TAGS
            .iter()
            .find(|(_, t)| *t == normalized)
            .map(|(action, _)| *action)
            .unwrap_or_default()
    }

    /// Actions that hold the current setting and count toward stability
    pub fn is_holding(&self) -> bool {
        matches!(self, Action::Maintain | Action::Stabilizing)
    }

    /// Cooling actions that bypass the stabilization gate and keep their label when capped
    pub fn is_cooling_critical(&self) -> bool {
        matches!(
            self,
            Action::EmergencyCooling | Action::ThermalDanger | Action::ThermalWarning
        )
    }

    /// Actions produced by the optimization ladder
    pub fn is_optimization(&self) -> bool {
        matches!(
            self,
            Action::VoltagePullback
                | Action::TuneForEfficiency
                | Action::IncreaseFrequencyEfficiency
                | Action::IncreaseFrequency
                | Action::IncreaseFrequencyWithCurve
                | Action::IncreaseFrequencyWithCurveOffset
                | Action::IncreaseFrequencyReduceVoltage
                | Action::IncreaseFrequencyReduceVoltageCurve
                | Action::OptimizeVoltageThermal
                | Action::OptimizeVoltageMaxFrequency
        )
    }

    /// Frequency throttles caused by instability (lengthen the next cooldown)
    pub fn is_instability_throttle(&self) -> bool {
        matches!(
            self,
            Action::InstabilityThrottleFrequency | Action::InstabilityRevertOptimization
        )
    }

    /// Whether the label came from the voltage curve
    pub fn uses_curve(&self) -> bool {
        self.as_str().contains("curve")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Action {
    fn from(tag: String) -> Self {
        Action::from_tag(&tag)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// Everything the controller knows about one tuned device.
///
/// Owned by the controller's state store and mutated only by that device's
/// own control cycle or by an explicit operator command.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub address: String,
    pub name: Option<String>,
    pub enabled: bool,
    pub profile: ProfileName,
    pub current_voltage: f64,
    pub current_frequency: f64,
    pub temp_window: SlidingWindow,
    pub error_rate_window: SlidingWindow,
    pub last_shares: ShareCounts,
    pub last_hardware_error_count: u64,
    pub stable_cycle_count: u32,
    pub heartbeat_count: u32,
    pub last_action: Action,
    pub stabilization_deadline: Option<DateTime<Utc>>,
    pub restarting: bool,
    pub fault_counter: u32,
    pub adaptive_limits: Option<Ceiling>,
    pub fault_history: BoundedLog<FaultRecord>,
    pub tuning_log: BoundedLog<Sample>,
    pub chip_family: Option<ChipFamily>,
    /// `None` until the device has been classified
    pub rail_class: Option<RailClass>,
    pub cost: Option<CostSettings>,
    pub last_known_good: Option<Setting>,
    /// Time of the last successfully applied change
    pub last_adjustment: Option<DateTime<Utc>>,
    /// Raw temperature of the previous cycle, for glitch detection
    pub last_seen_temp: Option<f64>,
}

impl DeviceState {
    pub fn new(address: impl Into<String>, profile: ProfileName) -> Self {
        Self {
            address: address.into(),
            name: None,
            enabled: true,
            profile,
            current_voltage: 0.0,
            current_frequency: 0.0,
            temp_window: SlidingWindow::new(SMOOTHING_WINDOW),
            error_rate_window: SlidingWindow::new(SMOOTHING_WINDOW),
            last_shares: ShareCounts::default(),
            last_hardware_error_count: 0,
            stable_cycle_count: 0,
            heartbeat_count: 0,
            last_action: Action::Maintain,
            stabilization_deadline: None,
            restarting: false,
            fault_counter: 0,
            adaptive_limits: None,
            fault_history: BoundedLog::new(FAULT_HISTORY_CAP),
            tuning_log: BoundedLog::new(TUNING_LOG_CAP),
            chip_family: None,
            rail_class: None,
            cost: None,
            last_known_good: None,
            last_adjustment: None,
            last_seen_temp: None,
        }
    }

    /// Rail ceiling, using the most conservative class until classified
    pub fn rail_limits(&self) -> RailLimits {
        self.rail_class.unwrap_or_default().limits()
    }

    /// Whether a stabilization window is still open at `now`
    pub fn is_stabilizing(&self, now: DateTime<Utc>) -> bool {
        self.stabilization_deadline.is_some_and(|deadline| now < deadline)
    }

    pub fn current_setting(&self) -> Setting {
        Setting {
            voltage: self.current_voltage,
            frequency: self.current_frequency,
        }
    }

    pub fn cost_settings(&self) -> CostSettings {
        self.cost.unwrap_or_default()
    }
}
