// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::collections::HashSet;

use crate::error::{Result, TuneError};
use crate::tuning::profile::{Profile, ProfileName};

use super::{Settings, PROFILE_OFF};

impl Settings {
    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let controller = &self.controller;
        if controller.tick_interval_secs == 0 {
            return Err(config_error("controller.tick_interval_secs must be positive"));
        }
        if controller.telemetry_timeout_ms == 0 || controller.write_timeout_ms == 0 {
            return Err(config_error("controller timeouts must be positive"));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            let address = device.address.trim();
            if address.is_empty() {
                return Err(config_error("device address must not be empty"));
            }
            if !seen.insert(address.to_ascii_lowercase()) {
                return Err(config_error(format!("duplicate device address '{}'", address)));
            }
            let profile = device.profile.trim();
            if !profile.eq_ignore_ascii_case(PROFILE_OFF) && profile.parse::<ProfileName>().is_err() {
                return Err(config_error(format!(
                    "device '{}' has unknown profile '{}'",
                    address, device.profile
                )));
            }
            for (label, value) in [
                ("kwh_price", device.kwh_price),
                ("daily_cost_limit", device.daily_cost_limit),
            ] {
                if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                    return Err(config_error(format!(
                        "device '{}' {} must be non-negative",
                        address, label
                    )));
                }
            }
        }

        for (name, profile) in self.profile_table().iter() {
            validate_profile(name, profile)?;
        }
        Ok(())
    }
}

fn validate_profile(name: ProfileName, p: &Profile) -> Result<()> {
    let fail = |what: &str| config_error(format!("profile '{}': {}", name, what));

    if p.min_voltage > p.max_voltage {
        return Err(fail("min_voltage exceeds max_voltage"));
    }
    if p.min_frequency > p.max_frequency {
        return Err(fail("min_frequency exceeds max_frequency"));
    }
    if p.voltage_step <= 0.0 || p.frequency_step <= 0.0 {
        return Err(fail("steps must be positive"));
    }
    if !(p.temp_target < p.temp_warning && p.temp_warning < p.temp_danger) {
        return Err(fail("temperatures must satisfy target < warning < danger"));
    }
    if p.adjust_interval_secs == 0 {
        return Err(fail("adjust_interval_secs must be positive"));
    }
    if p.input_voltage_range.min_mv > p.input_voltage_range.max_mv {
        return Err(fail("input_voltage_range is inverted"));
    }
    if !(0.0..=1.0).contains(&p.max_error_rate) {
        return Err(fail("max_error_rate must be within 0..1"));
    }
    Ok(())
}

fn config_error(msg: impl Into<String>) -> TuneError {
    TuneError::Config(msg.into())
}
