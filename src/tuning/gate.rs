// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Post-processing applied to every decision: stabilization gate, then the
//! ceiling clamp, then the profile floor.

use chrono::{DateTime, Utc};

use super::engine::Decision;
use super::profile::Profile;
use super::state::{Action, Ceiling, DeviceState};

/// Cooling and fault recovery keep their label when the ceiling trims them
fn keeps_label_when_capped(action: Action) -> bool {
    action.is_cooling_critical() || action == Action::CriticalFaultRecovery
}

/// Suppress increases while the stabilization window is open.
///
/// Safety-critical cooling passes untouched. Any other decision that raises
/// voltage or frequency is replaced by a hold labelled `Stabilizing`.
pub fn stabilization_gate(decision: Decision, state: &DeviceState, now: DateTime<Utc>) -> Decision {
    if !state.is_stabilizing(now) || decision.action.is_cooling_critical() {
        return decision;
    }
    if decision.voltage > state.current_voltage || decision.frequency > state.current_frequency {
        return Decision::hold(state, Action::Stabilizing);
    }
    decision
}

/// Clamp to the effective ceiling and the profile floor.
///
/// While stabilizing or cooling the floor is lowered to the current setting,
/// so the clamp never turns into an increase.
pub fn clamp(
    decision: Decision,
    state: &DeviceState,
    profile: &Profile,
    ceiling: Ceiling,
    now: DateTime<Utc>,
) -> Decision {
    let mut out = decision;

    let voltage = out.voltage.min(ceiling.max_voltage);
    let frequency = out.frequency.min(ceiling.max_frequency);
    if voltage != out.voltage || frequency != out.frequency {
        out.voltage = voltage;
        out.frequency = frequency;
        if !keeps_label_when_capped(out.action) {
            out.action = Action::CeilingCapped;
        }
    }

    let (floor_voltage, floor_frequency) =
        if state.is_stabilizing(now) || out.action.is_cooling_critical() {
            (
                profile.min_voltage.min(state.current_voltage),
                profile.min_frequency.min(state.current_frequency),
            )
        } else {
            (profile.min_voltage, profile.min_frequency)
        };
    out.voltage = out.voltage.max(floor_voltage);
    out.frequency = out.frequency.max(floor_frequency);
    out
}

/// Gate, then clamp
pub fn finalize(
    decision: Decision,
    state: &DeviceState,
    profile: &Profile,
    ceiling: Ceiling,
    now: DateTime<Utc>,
) -> Decision {
    clamp(
        stabilization_gate(decision, state, now),
        state,
        profile,
        ceiling,
        now,
    )
}
