// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! One control cycle for one device
//!
//! Fetch, classify, detect, decide, gate, apply, account. The only
//! suspension points are the device calls; a failed telemetry fetch ends the
//! cycle before any state is touched.

use chrono::{DateTime, Duration, Utc};

use crate::device::DeviceClient;
use crate::error::Result;
use crate::tuning::classifier::classify;
use crate::tuning::engine::{self, CycleContext, Decision};
use crate::tuning::fault;
use crate::tuning::gate;
use crate::tuning::limits;
use crate::tuning::metrics::{self, Reading};
use crate::tuning::profile::Profile;
use crate::tuning::state::{Action, Ceiling, DeviceState, Sample};

use super::applier;

/// Unchanged cycles between heartbeat log lines
pub const HEARTBEAT_EVERY: u32 = 6;
/// Stable cycles before a setting counts as known good
const KNOWN_GOOD_CYCLES: u32 = 30;
const KNOWN_GOOD_ERROR: f64 = 0.01;
/// Share of the frequency ceiling a known-good setting must reach
const KNOWN_GOOD_FREQUENCY_SHARE: f64 = 0.8;

/// Result of one cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Name of the rule that fired
    pub rule: &'static str,
    pub decision: Decision,
    pub reading: Reading,
    /// Whether a settings write reached the device
    pub applied: bool,
}

/// Run one cycle against `state`.
///
/// `stabilization` is the window opened after a fault restart.
pub async fn run_cycle(
    client: &dyn DeviceClient,
    state: &mut DeviceState,
    profile: &Profile,
    stabilization: Duration,
    now: DateTime<Utc>,
) -> Result<CycleOutcome> {
    let telemetry = client.fetch_telemetry(&state.address).await?;

    if state.rail_class.is_none() {
        let found = classify(&telemetry, state.name.as_deref());
        state.chip_family = found.chip;
        state.rail_class = Some(found.rail);
        tracing::info!(
            device = %state.address,
            "Detected chip {} on {} rail",
            found.chip.map_or("unknown", |chip| chip.as_str()),
            found.rail
        );
    }

    let reading = metrics::observe(state, &telemetry, profile);
    let mut faults = fault::detect(
        &telemetry,
        profile,
        state.rail_class.unwrap_or_default(),
        state.current_frequency,
        state.last_seen_temp,
    );
    fault::debounce(state, &mut faults, telemetry.temp, now);

    let ceiling = limits::effective_limits(state, profile);
    let learned = faults
        .confirmed
        .then(|| limits::learn_from_fault(ceiling, profile, state.current_setting()));

    let (rule, proposed) = engine::decide(&CycleContext {
        state: &*state,
        profile,
        reading: &reading,
        faults: &faults,
        ceiling,
        learned,
        now,
    });
    let decision_ceiling = match learned {
        Some(learned) if proposed.restart() => learned.ceiling,
        _ => ceiling,
    };
    let decision = gate::finalize(proposed, state, profile, decision_ceiling, now);

    let applied = if decision.restart() {
        recover_from_fault(client, state, profile, &decision, faults.reason_tags(), stabilization, now)
            .await
    } else if decision.changes(state) {
        apply_change(client, state, &decision, &reading, now).await
    } else {
        false
    };

    account(state, &decision, &reading, decision_ceiling, now);

    Ok(CycleOutcome {
        rule,
        decision,
        reading,
        applied,
    })
}

async fn recover_from_fault(
    client: &dyn DeviceClient,
    state: &mut DeviceState,
    profile: &Profile,
    decision: &Decision,
    reasons: Vec<String>,
    stabilization: Duration,
    now: DateTime<Utc>,
) -> bool {
    let fault_at = state.current_setting();
    let record = limits::record_fault(state, profile, fault_at, reasons, now);
    tracing::error!(
        device = %state.address,
        "Confirmed critical fault ({}). Recovering at {}mV/{}MHz with restart",
        record.reasons.join(", "),
        decision.voltage,
        decision.frequency
    );

    match applier::apply(client, &state.address, decision.voltage, decision.frequency, true).await {
        Ok(applied) => {
            state.current_voltage = decision.voltage;
            state.current_frequency = decision.frequency;
            state.last_adjustment = Some(now);
            state.stabilization_deadline = Some(now + stabilization);
            state.restarting = applied.restarted;
            state.fault_counter = 0;
            true
        }
        Err(e) => {
            tracing::error!(device = %state.address, "Recovery write failed: {}", e);
            false
        }
    }
}

async fn apply_change(
    client: &dyn DeviceClient,
    state: &mut DeviceState,
    decision: &Decision,
    reading: &Reading,
    now: DateTime<Utc>,
) -> bool {
    match applier::apply(client, &state.address, decision.voltage, decision.frequency, false).await {
        Ok(_) => {
            tracing::info!(
                device = %state.address,
                "{}mV/{}MHz -> {}mV/{}MHz ({}, temp {:.1}C, err {:.2}%, hw +{}, perf {:.1}%, stable {})",
                state.current_voltage,
                state.current_frequency,
                decision.voltage,
                decision.frequency,
                decision.action,
                reading.smoothed_temp,
                reading.smoothed_error_rate * 100.0,
                reading.hw_error_delta,
                reading.hash_ratio * 100.0,
                state.stable_cycle_count
            );
            state.current_voltage = decision.voltage;
            state.current_frequency = decision.frequency;
            state.last_adjustment = Some(now);
            true
        }
        Err(e) => {
            tracing::warn!(
                device = %state.address,
                "Failed to apply {} ({}mV/{}MHz): {}",
                decision.action,
                decision.voltage,
                decision.frequency,
                e
            );
            false
        }
    }
}

/// Counters, known-good tracking, heartbeat and the tuning log
fn account(
    state: &mut DeviceState,
    decision: &Decision,
    reading: &Reading,
    ceiling: Ceiling,
    now: DateTime<Utc>,
) {
    if decision.action.is_holding() {
        state.stable_cycle_count += 1;
    } else {
        state.stable_cycle_count = 0;
    }
    if decision.action == Action::PostRestartRecovery {
        state.restarting = false;
        tracing::info!(device = %state.address, "Restart settled, resuming tuning");
    }

    if state.stable_cycle_count >= KNOWN_GOOD_CYCLES
        && reading.smoothed_error_rate < KNOWN_GOOD_ERROR
        && state.current_frequency >= KNOWN_GOOD_FREQUENCY_SHARE * ceiling.max_frequency
    {
        let setting = state.current_setting();
        if state.last_known_good != Some(setting) {
            tracing::info!(
                device = %state.address,
                "New last known good: {}mV/{}MHz",
                setting.voltage,
                setting.frequency
            );
            state.last_known_good = Some(setting);
        }
    }

    if decision.changes(state) || !decision.action.is_holding() {
        state.heartbeat_count = 0;
    } else {
        state.heartbeat_count += 1;
        if state.heartbeat_count % HEARTBEAT_EVERY == 0 {
            tracing::info!(
                device = %state.address,
                "Heartbeat: {}mV/{}MHz, temp {:.1}C, err {:.2}%, {}, {} / {}",
                state.current_voltage,
                state.current_frequency,
                reading.smoothed_temp,
                reading.smoothed_error_rate * 100.0,
                reading
                    .efficiency
                    .map_or_else(|| "efficiency n/a".to_string(), |e| format!("{:.1} J/TH", e)),
                state.chip_family.map_or("unknown chip", |chip| chip.as_str()),
                state.rail_class.map_or("unclassified", |rail| rail.as_str())
            );
        }
    }

    state.tuning_log.push(Sample {
        timestamp: now,
        voltage: decision.voltage,
        frequency: decision.frequency,
        hashrate: reading.hashrate,
        power: reading.power,
        smoothed_temp: reading.smoothed_temp,
        smoothed_error_rate: reading.smoothed_error_rate,
        action: decision.action,
    });
    state.last_action = decision.action;
}
