// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Fault classification and debounce

use chrono::{DateTime, Utc};
use std::fmt;

use crate::device::Telemetry;

use super::classifier::RailClass;
use super::profile::Profile;
use super::state::DeviceState;

/// Consecutive critical cycles needed to confirm a fault
pub const CONFIRMATION_CYCLES: u32 = 3;

/// A drop larger than this (°C) to a reading below [`GLITCH_FLOOR_TEMP`] is a sensor glitch
const GLITCH_DROP: f64 = 25.0;
const GLITCH_FLOOR_TEMP: f64 = 40.0;

/// Conditions that lead to a restart once confirmed
#[derive(Debug, Clone, PartialEq)]
pub enum CriticalReason {
    /// Firmware fault flag
    FaultFlag(String),
    /// Hashing stopped while the clock is above the floor
    Stalled { hashrate: f64, power: f64 },
    /// Input rail outside the profile band (mV)
    InputVoltage(f64),
    /// Sudden implausible temperature drop (°C); contributes to the reason list only
    TempGlitch(f64),
}

impl fmt::Display for CriticalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriticalReason::FaultFlag(flag) => write!(f, "API_FAULT({})", flag),
            CriticalReason::Stalled { hashrate, power } => {
                write!(f, "FALLBACK_FAULT({:.0}H/{:.1}W)", hashrate, power)
            }
            CriticalReason::InputVoltage(mv) => write!(f, "VOLTAGE_OUT_OF_RANGE({}mV)", mv),
            CriticalReason::TempGlitch(drop) => write!(f, "TEMP_GLITCH_DETECTED(-{:.1}C)", drop),
        }
    }
}

/// Overages throttled immediately without a restart
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoftReason {
    RailTemp(f64),
    PowerLimit(f64),
}

impl fmt::Display for SoftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftReason::RailTemp(temp) => write!(f, "VR_HOT({}C)", temp),
            SoftReason::PowerLimit(watts) => write!(f, "POWER_LIMIT({}W)", watts),
        }
    }
}

/// Fault picture of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultAssessment {
    pub critical: Vec<CriticalReason>,
    pub soft: Vec<SoftReason>,
    /// Set by [`debounce`] once the critical condition has persisted long enough
    pub confirmed: bool,
}

impl FaultAssessment {
    /// Whether any real critical condition holds (glitches alone never count)
    pub fn is_critical(&self) -> bool {
        self.critical
            .iter()
            .any(|reason| !matches!(reason, CriticalReason::TempGlitch(_)))
    }

    pub fn is_soft(&self) -> bool {
        !self.soft.is_empty()
    }

    pub fn has_glitch(&self) -> bool {
        self.critical
            .iter()
            .any(|reason| matches!(reason, CriticalReason::TempGlitch(_)))
    }

    pub fn reason_tags(&self) -> Vec<String> {
        self.critical.iter().map(ToString::to_string).collect()
    }

    pub fn is_rail_temp(&self) -> bool {
        self.soft
            .iter()
            .any(|reason| matches!(reason, SoftReason::RailTemp(_)))
    }
}

/// Classify one telemetry sample. `current_frequency` is the tracked clock.
pub fn detect(
    telemetry: &Telemetry,
    profile: &Profile,
    rail: RailClass,
    current_frequency: f64,
    last_seen_temp: Option<f64>,
) -> FaultAssessment {
    let mut critical = Vec::new();

    if let Some(flag) = telemetry.power_fault.as_deref().filter(|_| telemetry.has_fault_flag()) {
        critical.push(CriticalReason::FaultFlag(flag.to_string()));
    }

    let stall = &profile.stall;
    let underperforming = telemetry.expected_hashrate > stall.min_expected_hashrate
        && telemetry.hash_rate < telemetry.expected_hashrate * stall.max_hashrate_ratio;
    if underperforming
        && telemetry.power < stall.max_power_watts
        && current_frequency > profile.min_frequency
    {
        critical.push(CriticalReason::Stalled {
            hashrate: telemetry.hash_rate,
            power: telemetry.power,
        });
    }

    if profile
        .input_voltage_range
        .for_rail(rail)
        .is_violated_by(telemetry.input_voltage)
    {
        critical.push(CriticalReason::InputVoltage(telemetry.input_voltage));
    }

    if !critical.is_empty() {
        let drop = last_seen_temp.unwrap_or(telemetry.temp) - telemetry.temp;
        if drop > GLITCH_DROP && telemetry.temp < GLITCH_FLOOR_TEMP {
            critical.push(CriticalReason::TempGlitch(drop));
        }
    }

    let mut soft = Vec::new();
    if telemetry.vr_temp >= profile.max_rail_temp {
        soft.push(SoftReason::RailTemp(telemetry.vr_temp));
    }
    if telemetry.power > profile.max_watts {
        soft.push(SoftReason::PowerLimit(telemetry.power));
    }

    FaultAssessment {
        critical,
        soft,
        confirmed: false,
    }
}

/// Advance the fault counter and decide confirmation.
///
/// The counter grows once per critical cycle and drops to zero on the first
/// healthy one. Confirmation additionally needs the device to be out of any
/// restart and stabilization window.
pub fn debounce(
    state: &mut DeviceState,
    assessment: &mut FaultAssessment,
    temp: f64,
    now: DateTime<Utc>,
) {
    state.last_seen_temp = Some(temp);

    if !assessment.is_critical() {
        state.fault_counter = 0;
        return;
    }

    state.fault_counter += 1;
    assessment.confirmed = state.fault_counter >= CONFIRMATION_CYCLES
        && !state.restarting
        && !state.is_stabilizing(now);

    if !assessment.confirmed && !state.restarting {
        let verb = if assessment.has_glitch() {
            "Sensor glitch"
        } else {
            "Potential critical fault"
        };
        tracing::info!(
            device = %state.address,
            "{} detected ({}). Verifying (cycle {}/{})",
            verb,
            assessment.reason_tags().join(", "),
            state.fault_counter,
            CONFIRMATION_CYCLES
        );
    }
}
