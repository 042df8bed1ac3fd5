// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Read-only views of the tuning state for dashboards and the CLI

use serde::Serialize;

use crate::tuning::classifier::RailClass;
use crate::tuning::curve::ChipFamily;
use crate::tuning::limits::{config_ceiling, effective_limits, is_limited};
use crate::tuning::profile::{ProfileName, ProfileTable};
use crate::tuning::state::{Action, Ceiling, DeviceState, FaultRecord, Sample, Setting};

/// How far the learned ceiling sits below the configured one
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reduction {
    pub voltage: f64,
    pub frequency: f64,
}

/// Limits view of one device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLimits {
    pub address: String,
    pub name: Option<String>,
    pub enabled: bool,
    pub profile: ProfileName,
    pub current_settings: Setting,
    pub adaptive_limits: Ceiling,
    pub config_limits: Ceiling,
    pub is_limited: bool,
    pub reduction: Reduction,
    pub fault_count: usize,
    pub last_fault: Option<FaultRecord>,
    pub fault_history: Vec<FaultRecord>,
    pub rail_class: Option<RailClass>,
    pub chip_family: Option<ChipFamily>,
    pub last_known_good: Option<Setting>,
}

/// Limits view of the whole fleet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsSummary {
    pub devices: Vec<DeviceLimits>,
    pub total_devices: usize,
    pub limited_devices: usize,
}

/// Everything recorded about one device
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetail {
    #[serde(flatten)]
    pub limits: DeviceLimits,
    pub stable_cycle_count: u32,
    pub last_action: Action,
    pub restarting: bool,
    pub tuning_log: Vec<Sample>,
}

pub fn device_limits(state: &DeviceState, profiles: &ProfileTable) -> DeviceLimits {
    let profile = profiles.get(state.profile);
    let config = config_ceiling(profile, &state.rail_limits());
    let effective = effective_limits(state, profile);

    DeviceLimits {
        address: state.address.clone(),
        name: state.name.clone(),
        enabled: state.enabled,
        profile: state.profile,
        current_settings: state.current_setting(),
        adaptive_limits: effective,
        config_limits: config,
        is_limited: is_limited(state, profile),
        reduction: Reduction {
            voltage: config.max_voltage - effective.max_voltage,
            frequency: config.max_frequency - effective.max_frequency,
        },
        fault_count: state.fault_history.len(),
        last_fault: state.fault_history.last().cloned(),
        fault_history: state.fault_history.to_vec(),
        rail_class: state.rail_class,
        chip_family: state.chip_family,
        last_known_good: state.last_known_good,
    }
}

/// Summary over `states`, ordered by address
pub fn summarize(states: &[DeviceState], profiles: &ProfileTable) -> LimitsSummary {
    let mut devices: Vec<DeviceLimits> = states
        .iter()
        .map(|state| device_limits(state, profiles))
        .collect();
    devices.sort_by(|a, b| a.address.cmp(&b.address));

    LimitsSummary {
        total_devices: devices.len(),
        limited_devices: devices.iter().filter(|d| d.is_limited).count(),
        devices,
    }
}

pub fn detail(state: &DeviceState, profiles: &ProfileTable) -> DeviceDetail {
    DeviceDetail {
        limits: device_limits(state, profiles),
        stable_cycle_count: state.stable_cycle_count,
        last_action: state.last_action,
        restarting: state.restarting,
        tuning_log: state.tuning_log.to_vec(),
    }
}
