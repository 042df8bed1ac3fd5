// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Adaptive ceiling store
//!
//! Each device carries an optional learned ceiling that only shrinks after a
//! confirmed critical fault. It can be restored with [`reset`] or overwritten
//! with [`set_manual`]; both stay inside the configured ceiling.

use chrono::{DateTime, Utc};

use crate::error::{Result, TuneError};

use super::classifier::RailLimits;
use super::profile::Profile;
use super::state::{Ceiling, DeviceState, FaultRecord, Setting};

/// Ceiling implied by the profile and the rail class
pub fn config_ceiling(profile: &Profile, rail: &RailLimits) -> Ceiling {
    Ceiling {
        max_voltage: profile.max_voltage.min(rail.max_voltage),
        max_frequency: profile.max_frequency.min(rail.max_frequency),
    }
}

/// Ceiling currently in force for a device
pub fn effective_limits(state: &DeviceState, profile: &Profile) -> Ceiling {
    let config = config_ceiling(profile, &state.rail_limits());
    match state.adaptive_limits {
        Some(learned) => Ceiling {
            max_voltage: learned.max_voltage.min(config.max_voltage),
            max_frequency: learned.max_frequency.min(config.max_frequency),
        },
        None => config,
    }
}

/// Outcome of learning from one fault
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Learned {
    pub ceiling: Ceiling,
    /// Whether any component went down
    pub adapted: bool,
}

/// Ceiling after a fault at `fault`, never above `current`
pub fn learn_from_fault(current: Ceiling, profile: &Profile, fault: Setting) -> Learned {
    let candidate_voltage = profile
        .min_voltage
        .max(fault.voltage - 2.0 * profile.voltage_step);
    let candidate_frequency = profile
        .min_frequency
        .max(fault.frequency - 3.0 * profile.frequency_step);

    let voltage_reduced = candidate_voltage < current.max_voltage;
    let frequency_reduced = candidate_frequency < current.max_frequency;

    Learned {
        ceiling: Ceiling {
            max_voltage: if voltage_reduced {
                candidate_voltage
            } else {
                current.max_voltage
            },
            max_frequency: if frequency_reduced {
                candidate_frequency
            } else {
                current.max_frequency
            },
        },
        adapted: voltage_reduced || frequency_reduced,
    }
}

/// Shrink the ceiling after a confirmed fault and append it to the history
pub fn record_fault(
    state: &mut DeviceState,
    profile: &Profile,
    fault: Setting,
    reasons: Vec<String>,
    now: DateTime<Utc>,
) -> FaultRecord {
    let current = effective_limits(state, profile);
    let learned = learn_from_fault(current, profile, fault);

    if learned.adapted {
        tracing::warn!(
            device = %state.address,
            "Learned from fault, reducing limits: V={}mV->{}mV, F={}MHz->{}MHz",
            current.max_voltage,
            learned.ceiling.max_voltage,
            current.max_frequency,
            learned.ceiling.max_frequency
        );
    }
    state.adaptive_limits = Some(learned.ceiling);

    let record = FaultRecord {
        timestamp: now,
        voltage_at_fault: fault.voltage,
        frequency_at_fault: fault.frequency,
        reasons,
        resulting_limits: learned.ceiling,
        limits_adapted: learned.adapted,
    };
    state.fault_history.push(record.clone());
    record
}

/// Forget the learned ceiling
pub fn reset(state: &mut DeviceState, profile: &Profile) -> Ceiling {
    state.adaptive_limits = None;
    let ceiling = effective_limits(state, profile);
    tracing::info!(
        device = %state.address,
        "Adaptive limits reset to {}mV/{}MHz",
        ceiling.max_voltage,
        ceiling.max_frequency
    );
    ceiling
}

/// Overwrite the learned ceiling after validating it against the configured bounds
pub fn set_manual(
    state: &mut DeviceState,
    profile: &Profile,
    max_voltage: f64,
    max_frequency: f64,
) -> Result<Ceiling> {
    let config = config_ceiling(profile, &state.rail_limits());

    if !(profile.min_voltage..=config.max_voltage).contains(&max_voltage) {
        return Err(TuneError::Validation(format!(
            "voltage {}mV outside {}-{}mV",
            max_voltage, profile.min_voltage, config.max_voltage
        )));
    }
    if !(profile.min_frequency..=config.max_frequency).contains(&max_frequency) {
        return Err(TuneError::Validation(format!(
            "frequency {}MHz outside {}-{}MHz",
            max_frequency, profile.min_frequency, config.max_frequency
        )));
    }

    let ceiling = Ceiling {
        max_voltage,
        max_frequency,
    };
    state.adaptive_limits = Some(ceiling);
    tracing::info!(
        device = %state.address,
        "Adaptive limits set to {}mV/{}MHz",
        max_voltage,
        max_frequency
    );
    Ok(ceiling)
}

/// Whether the learned ceiling sits below the configured one
pub fn is_limited(state: &DeviceState, profile: &Profile) -> bool {
    let config = config_ceiling(profile, &state.rail_limits());
    let effective = effective_limits(state, profile);
    effective.max_voltage < config.max_voltage || effective.max_frequency < config.max_frequency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::profile::ProfileName;
    use proptest::prelude::*;

    fn device() -> (DeviceState, Profile) {
        (
            DeviceState::new("10.0.0.7", ProfileName::Conservative),
            Profile::conservative(),
        )
    }

    fn fault(voltage: f64, frequency: f64) -> Setting {
        Setting { voltage, frequency }
    }

    #[test]
    fn test_effective_defaults_to_config() {
        let (state, profile) = device();
        let ceiling = effective_limits(&state, &profile);
        assert_eq!(ceiling.max_voltage, 1250.0);
        assert_eq!(ceiling.max_frequency, 575.0);
        assert!(!is_limited(&state, &profile));
    }

    #[test]
    fn test_aggressive_capped_by_rail() {
        let state = DeviceState::new("10.0.0.7", ProfileName::Aggressive);
        let ceiling = effective_limits(&state, &Profile::aggressive());
        assert_eq!(ceiling.max_voltage, 1400.0);
        assert_eq!(ceiling.max_frequency, 1200.0);
    }

    #[test]
    fn test_record_fault_shrinks_both() {
        let (mut state, profile) = device();
        let record = record_fault(
            &mut state,
            &profile,
            fault(1250.0, 600.0),
            vec!["API_FAULT(Power Fault)".into()],
            Utc::now(),
        );
        assert_eq!(record.resulting_limits.max_voltage, 1230.0);
        assert_eq!(record.resulting_limits.max_frequency, 570.0);
        assert!(record.limits_adapted);
        assert_eq!(state.fault_history.len(), 1);
        assert!(is_limited(&state, &profile));
    }

    #[test]
    fn test_record_fault_never_raises() {
        let (mut state, profile) = device();
        record_fault(&mut state, &profile, fault(1200.0, 500.0), vec![], Utc::now());
        let before = effective_limits(&state, &profile);

        // A fault at a higher setting must not loosen anything
        let record = record_fault(&mut state, &profile, fault(1250.0, 575.0), vec![], Utc::now());
        assert!(!record.limits_adapted);
        assert_eq!(effective_limits(&state, &profile), before);
        assert_eq!(state.fault_history.len(), 2);
    }

    #[test]
    fn test_record_fault_respects_profile_floor() {
        let (mut state, profile) = device();
        record_fault(&mut state, &profile, fault(1150.0, 450.0), vec![], Utc::now());
        let ceiling = effective_limits(&state, &profile);
        assert_eq!(ceiling.max_voltage, 1150.0);
        assert_eq!(ceiling.max_frequency, 450.0);
    }

    #[test]
    fn test_only_lower_component_applies() {
        let (mut state, profile) = device();
        state.adaptive_limits = Some(Ceiling {
            max_voltage: 1200.0,
            max_frequency: 575.0,
        });
        // voltage candidate 1230 is higher, frequency candidate 520 is lower
        record_fault(&mut state, &profile, fault(1250.0, 550.0), vec![], Utc::now());
        let ceiling = effective_limits(&state, &profile);
        assert_eq!(ceiling.max_voltage, 1200.0);
        assert_eq!(ceiling.max_frequency, 520.0);
    }

    #[test]
    fn test_reset_restores_config() {
        let (mut state, profile) = device();
        record_fault(&mut state, &profile, fault(1250.0, 600.0), vec![], Utc::now());
        let ceiling = reset(&mut state, &profile);
        assert_eq!(ceiling, config_ceiling(&profile, &state.rail_limits()));
        assert!(state.adaptive_limits.is_none());
    }

    #[test]
    fn test_set_manual_in_bounds() {
        let (mut state, profile) = device();
        set_manual(&mut state, &profile, 1200.0, 525.0).unwrap();
        let ceiling = effective_limits(&state, &profile);
        assert_eq!((ceiling.max_voltage, ceiling.max_frequency), (1200.0, 525.0));
    }

    #[test]
    fn test_set_manual_out_of_bounds_leaves_state() {
        let (mut state, profile) = device();
        set_manual(&mut state, &profile, 1200.0, 525.0).unwrap();

        for (v, f) in [(1100.0, 500.0), (1300.0, 500.0), (1200.0, 400.0), (1200.0, 900.0)] {
            let err = set_manual(&mut state, &profile, v, f).unwrap_err();
            assert!(matches!(err, TuneError::Validation(_)));
        }
        let ceiling = effective_limits(&state, &profile);
        assert_eq!((ceiling.max_voltage, ceiling.max_frequency), (1200.0, 525.0));
    }

    proptest! {
        #[test]
        fn prop_ceiling_non_increasing(
            faults in prop::collection::vec((1100.0f64..1500.0, 300.0f64..1300.0), 1..20),
            aggressive in any::<bool>(),
        ) {
            let (name, profile) = if aggressive {
                (ProfileName::Aggressive, Profile::aggressive())
            } else {
                (ProfileName::Conservative, Profile::conservative())
            };
            let mut state = DeviceState::new("10.0.0.7", name);
            let config = config_ceiling(&profile, &state.rail_limits());
            let mut previous = effective_limits(&state, &profile);

            for (v, f) in faults {
                record_fault(&mut state, &profile, fault(v, f), vec![], Utc::now());
                let next = effective_limits(&state, &profile);
                prop_assert!(next.max_voltage <= previous.max_voltage);
                prop_assert!(next.max_frequency <= previous.max_frequency);
                prop_assert!(next.max_voltage <= config.max_voltage);
                prop_assert!(next.max_frequency <= config.max_frequency);
                previous = next;
            }
        }
    }
}
