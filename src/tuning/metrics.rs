// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Derived per-cycle metrics and telemetry smoothing

use crate::device::Telemetry;

use super::profile::{Profile, ProfileName};
use super::state::{DeviceState, ShareCounts};

/// Reported voltage within this distance of the tracked value keeps the tracked value
const VOLTAGE_SYNC_TOLERANCE_MV: f64 = 1.5;

/// Everything the fault detector and decision engine read from one sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reading {
    /// Raw core temperature, °C
    pub temp: f64,
    pub smoothed_temp: f64,
    /// Share error rate of this cycle (0..1)
    pub error_rate: f64,
    pub smoothed_error_rate: f64,
    pub hw_error_count: u64,
    /// Hardware errors since the previous cycle
    pub hw_error_delta: u64,
    /// Observed / expected hashrate
    pub hash_ratio: f64,
    /// J/TH, only when the profile tracks efficiency
    pub efficiency: Option<f64>,
    pub daily_cost: f64,
    pub hashrate: f64,
    pub power: f64,
}

/// Share error rate for this cycle: the firmware percentage when reported,
/// otherwise the rejected share of the counter delta.
pub fn error_rate(telemetry: &Telemetry, last: ShareCounts) -> f64 {
    if let Some(percentage) = telemetry.error_percentage {
        return percentage / 100.0;
    }
    let accepted = telemetry.shares_accepted.saturating_sub(last.accepted);
    let rejected = telemetry.shares_rejected.saturating_sub(last.rejected);
    let total = accepted + rejected;
    if total == 0 {
        0.0
    } else {
        rejected as f64 / total as f64
    }
}

pub fn hash_ratio(telemetry: &Telemetry) -> f64 {
    if telemetry.expected_hashrate > 0.0 {
        telemetry.hash_rate / telemetry.expected_hashrate
    } else {
        1.0
    }
}

/// Energy per unit work in J/TH (hashrate is GH/s)
pub fn efficiency(power_watts: f64, hashrate_ghs: f64) -> Option<f64> {
    (power_watts > 0.0 && hashrate_ghs > 0.0).then(|| power_watts / (hashrate_ghs / 1000.0))
}

/// Fold one telemetry sample into the device state and derive this cycle's metrics.
///
/// Pushes the smoothing windows, records share and hardware-error counters
/// for the next delta, and syncs the tracked voltage/frequency with what the
/// device reports.
pub fn observe(state: &mut DeviceState, telemetry: &Telemetry, profile: &Profile) -> Reading {
    let error_rate = error_rate(telemetry, state.last_shares);
    state.temp_window.push(telemetry.temp);
    state.error_rate_window.push(error_rate);

    let hw_error_count = telemetry.hardware_error_count();
    let hw_error_delta = hw_error_count.saturating_sub(state.last_hardware_error_count);
    state.last_hardware_error_count = hw_error_count;
    state.last_shares = ShareCounts {
        accepted: telemetry.shares_accepted,
        rejected: telemetry.shares_rejected,
    };

    sync_setting(state, telemetry);

    let daily_cost = if state.profile == ProfileName::CostSensitive {
        state.cost_settings().daily_cost(telemetry.power)
    } else {
        0.0
    };

    Reading {
        temp: telemetry.temp,
        smoothed_temp: state.temp_window.mean().unwrap_or(telemetry.temp),
        error_rate,
        smoothed_error_rate: state.error_rate_window.mean().unwrap_or(error_rate),
        hw_error_count,
        hw_error_delta,
        hash_ratio: hash_ratio(telemetry),
        efficiency: profile
            .target_efficiency
            .and_then(|_| efficiency(telemetry.power, telemetry.hash_rate)),
        daily_cost,
        hashrate: telemetry.hash_rate,
        power: telemetry.power,
    }
}

fn sync_setting(state: &mut DeviceState, telemetry: &Telemetry) {
    // Firmware rounds to whole millivolts; keep our fractional value when it matches
    if telemetry.core_voltage > 0.0
        && (telemetry.core_voltage - state.current_voltage).abs() > VOLTAGE_SYNC_TOLERANCE_MV
    {
        state.current_voltage = telemetry.core_voltage;
    }
    if telemetry.frequency > 0.0 {
        state.current_frequency = telemetry.frequency;
    }
}
