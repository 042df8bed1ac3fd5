// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Decision engine
//!
//! An ordered table of `(guard, action)` rules evaluated top to bottom; the
//! first guard that holds produces the cycle's [`Decision`]. Rules are pure:
//! they read a [`CycleContext`] and never touch device state. Side effects
//! (fault learning, restart, counters) are applied by the control cycle based
//! on the chosen action.

use chrono::{DateTime, Utc};

use super::curve;
use super::fault::FaultAssessment;
use super::limits::Learned;
use super::metrics::Reading;
use super::profile::Profile;
use super::state::{Action, Ceiling, DeviceState};

/// Stable cycles and error bar for "very stable"
const VERY_STABLE_CYCLES: u32 = 10;
const VERY_STABLE_ERROR: f64 = 0.01;
/// Stable cycles and error bar for "stable"
const STABLE_CYCLES: u32 = 5;
const STABLE_ERROR: f64 = 0.02;
/// Cooldown in stable cycles before raising the clock again
const COOLDOWN_CYCLES: u32 = 2;
const COOLDOWN_AFTER_THROTTLE: u32 = 5;
/// Required margin to the target temperature before raising the clock, °C
const MIN_TEMP_MARGIN: f64 = 3.0;
/// Below this margin only single frequency steps are taken, °C
const APPROACH_TEMP_MARGIN: f64 = 5.0;
/// Band around the efficiency target, J/TH
const EFFICIENCY_BAND: f64 = 0.5;

/// Target setting chosen for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub voltage: f64,
    pub frequency: f64,
}

impl Decision {
    /// Keep the current setting under the given label
    pub fn hold(state: &DeviceState, action: Action) -> Self {
        Self {
            action,
            voltage: state.current_voltage,
            frequency: state.current_frequency,
        }
    }

    /// Whether applying the decision changes the device
    pub fn changes(&self, state: &DeviceState) -> bool {
        self.voltage != state.current_voltage || self.frequency != state.current_frequency
    }

    pub fn restart(&self) -> bool {
        self.action == Action::CriticalFaultRecovery
    }
}

/// Inputs of one decision
#[derive(Debug, Clone, Copy)]
pub struct CycleContext<'a> {
    pub state: &'a DeviceState,
    pub profile: &'a Profile,
    pub reading: &'a Reading,
    pub faults: &'a FaultAssessment,
    /// Ceiling in force before this cycle
    pub ceiling: Ceiling,
    /// Ceiling after learning from a confirmed fault
    pub learned: Option<Learned>,
    pub now: DateTime<Utc>,
}

impl CycleContext<'_> {
    fn stabilizing(&self) -> bool {
        self.state.is_stabilizing(self.now)
    }

    fn very_stable(&self) -> bool {
        self.state.stable_cycle_count >= VERY_STABLE_CYCLES
            && self.reading.smoothed_error_rate < VERY_STABLE_ERROR
    }

    fn stable(&self) -> bool {
        self.state.stable_cycle_count >= STABLE_CYCLES
            && self.reading.smoothed_error_rate < STABLE_ERROR
    }

    fn daily_cost_limit(&self) -> Option<f64> {
        if !self.state.profile.is_cost_sensitive() {
            return None;
        }
        self.state.cost_settings().daily_cost_limit
    }

    fn has_cost_headroom(&self) -> bool {
        self.daily_cost_limit()
            .map_or(true, |limit| self.reading.daily_cost < limit)
    }

    fn has_frequency_headroom(&self) -> bool {
        self.state.current_frequency < self.ceiling.max_frequency && self.has_cost_headroom()
    }

    /// Voltage sits comfortably above the floor, so a one-step pullback is safe
    fn voltage_reducible(&self) -> bool {
        self.state.current_voltage > self.profile.min_voltage + 3.0 * self.profile.voltage_step
    }

    /// Floored at the profile minimum, never above the current clock
    fn step_frequency_down(&self, steps: f64) -> f64 {
        let current = self.state.current_frequency;
        current.min(
            self.profile
                .min_frequency
                .max(current - steps * self.profile.frequency_step),
        )
    }

    fn step_voltage_down(&self) -> f64 {
        let current = self.state.current_voltage;
        current.min(
            self.profile
                .min_voltage
                .max(current - self.profile.voltage_step),
        )
    }

    /// Frequency down by `steps`; voltage follows one step once the clock is at its floor
    fn throttle(&self, steps: f64, action: Action) -> Decision {
        let frequency = self.step_frequency_down(steps);
        let voltage = if frequency <= self.profile.min_frequency {
            self.step_voltage_down()
        } else {
            self.state.current_voltage
        };
        Decision {
            action,
            voltage,
            frequency,
        }
    }

    /// Curve voltage for `frequency`, carrying this unit's offset from the curve
    /// at its current clock. The flag is true when the offset was applied.
    fn curve_voltage(&self, frequency: f64) -> Option<(f64, bool)> {
        let rail = self.state.rail_limits();
        let chip = self.state.chip_family;
        let new_base = curve::recommend(frequency, chip, &rail)?;

        Some(
            match curve::recommend(self.state.current_frequency, chip, &rail) {
                Some(current_base) => {
                    let offset = self.state.current_voltage - current_base;
                    let target = (new_base + offset)
                        .min(self.ceiling.max_voltage)
                        .max(self.profile.min_voltage);
                    (target, true)
                }
                None => (new_base.min(self.ceiling.max_voltage), false),
            },
        )
    }
}

type Guard = fn(&CycleContext<'_>) -> bool;
type Act = fn(&CycleContext<'_>) -> Decision;

/// One entry of the priority ladder
pub struct Rule {
    pub name: &'static str,
    pub guard: Guard,
    pub action: Act,
}

/// The priority ladder, highest priority first
pub const RULES: &[Rule] = &[
    Rule {
        name: "post_restart_recovery",
        guard: restart_settled,
        action: resume_after_restart,
    },
    Rule {
        name: "emergency_cooling",
        guard: is_emergency,
        action: emergency_cooling,
    },
    Rule {
        name: "cost_overrun",
        guard: is_over_budget,
        action: cost_throttle,
    },
    Rule {
        name: "critical_fault",
        guard: is_fault_confirmed,
        action: fault_recovery,
    },
    Rule {
        name: "soft_fault",
        guard: has_soft_fault,
        action: soft_throttle,
    },
    Rule {
        name: "thermal_danger",
        guard: is_thermal_danger,
        action: thermal_danger,
    },
    Rule {
        name: "thermal_warning",
        guard: is_thermal_warning,
        action: thermal_warning,
    },
    Rule {
        name: "stability",
        guard: is_unstable,
        action: stabilize,
    },
    Rule {
        name: "optimization",
        guard: has_thermal_headroom,
        action: optimize,
    },
    Rule {
        name: "maintain",
        guard: always,
        action: maintain,
    },
];

/// Run the ladder; returns the matching rule's name and its decision
pub fn decide(ctx: &CycleContext<'_>) -> (&'static str, Decision) {
    RULES
        .iter()
        .find(|rule| (rule.guard)(ctx))
        .map(|rule| (rule.name, (rule.action)(ctx)))
        .unwrap_or_else(|| ("maintain", maintain(ctx)))
}

fn always(_: &CycleContext<'_>) -> bool {
    true
}

fn maintain(ctx: &CycleContext<'_>) -> Decision {
    Decision::hold(ctx.state, Action::Maintain)
}

// 1. post-restart recovery

fn restart_settled(ctx: &CycleContext<'_>) -> bool {
    ctx.state.restarting && !ctx.stabilizing()
}

fn resume_after_restart(ctx: &CycleContext<'_>) -> Decision {
    // The device booted on the recovery setting; adopt what it reports
    Decision::hold(ctx.state, Action::PostRestartRecovery)
}

// 2. emergency cooling

fn is_emergency(ctx: &CycleContext<'_>) -> bool {
    ctx.reading.temp >= ctx.profile.emergency_temp
}

fn emergency_cooling(ctx: &CycleContext<'_>) -> Decision {
    Decision {
        action: Action::EmergencyCooling,
        voltage: ctx.profile.min_voltage.min(ctx.state.current_voltage),
        frequency: ctx.profile.min_frequency.min(ctx.state.current_frequency),
    }
}

// 3. cost overrun

fn is_over_budget(ctx: &CycleContext<'_>) -> bool {
    ctx.daily_cost_limit()
        .is_some_and(|limit| ctx.reading.daily_cost > limit)
}

fn cost_throttle(ctx: &CycleContext<'_>) -> Decision {
    if ctx.state.current_frequency > ctx.profile.min_frequency {
        Decision {
            action: Action::CostThrottleFrequency,
            voltage: ctx.state.current_voltage,
            frequency: ctx.step_frequency_down(2.0),
        }
    } else {
        Decision {
            action: Action::CostThrottleVoltage,
            voltage: ctx.step_voltage_down(),
            frequency: ctx.state.current_frequency,
        }
    }
}

// 4. confirmed critical fault

fn is_fault_confirmed(ctx: &CycleContext<'_>) -> bool {
    ctx.faults.confirmed
}

/// Safe baseline the device restarts on after a confirmed fault
pub fn recovery_target(ctx: &CycleContext<'_>) -> (f64, f64) {
    let profile = ctx.profile;
    let ceiling = ctx.learned.map_or(ctx.ceiling, |learned| learned.ceiling);

    let frequency = (profile.min_frequency + 10.0 * profile.frequency_step)
        .min(ceiling.max_frequency)
        .max(profile.min_frequency);

    let baseline_voltage = profile.min_voltage + 5.0 * profile.voltage_step;
    let voltage = match ctx.state.chip_family {
        Some(_) => curve::recommend(frequency, ctx.state.chip_family, &ctx.state.rail_limits())
            .unwrap_or(baseline_voltage),
        None => baseline_voltage.max(profile.recovery_voltage),
    }
    .min(ceiling.max_voltage)
    .max(profile.min_voltage);

    (voltage, frequency)
}

fn fault_recovery(ctx: &CycleContext<'_>) -> Decision {
    let (voltage, frequency) = recovery_target(ctx);
    Decision {
        action: Action::CriticalFaultRecovery,
        voltage,
        frequency,
    }
}

// 5. soft fault

fn has_soft_fault(ctx: &CycleContext<'_>) -> bool {
    ctx.faults.is_soft() && !ctx.state.restarting && !ctx.stabilizing()
}

fn soft_throttle(ctx: &CycleContext<'_>) -> Decision {
    let action = if ctx.faults.is_rail_temp() {
        Action::RailTempThrottle
    } else {
        Action::PowerLimitThrottle
    };
    ctx.throttle(2.0, action)
}

// 6. thermal danger

fn is_thermal_danger(ctx: &CycleContext<'_>) -> bool {
    ctx.reading.smoothed_temp >= ctx.profile.temp_danger
}

fn thermal_danger(ctx: &CycleContext<'_>) -> Decision {
    let profile = ctx.profile;
    let frequency = ctx.step_frequency_down(2.0);
    let at_floor = frequency <= profile.min_frequency;
    let voltage = if at_floor
        || ctx.state.current_voltage > profile.min_voltage + profile.voltage_step
    {
        ctx.step_voltage_down()
    } else {
        ctx.state.current_voltage
    };
    Decision {
        action: Action::ThermalDanger,
        voltage,
        frequency,
    }
}

// 7. thermal warning

fn is_thermal_warning(ctx: &CycleContext<'_>) -> bool {
    ctx.reading.smoothed_temp >= ctx.profile.temp_warning
}

fn thermal_warning(ctx: &CycleContext<'_>) -> Decision {
    let profile = ctx.profile;
    let frequency = ctx.step_frequency_down(1.0);
    let voltage = if frequency <= profile.min_frequency
        && ctx.reading.smoothed_temp >= profile.temp_warning + 1.0
    {
        ctx.step_voltage_down()
    } else {
        ctx.state.current_voltage
    };
    Decision {
        action: Action::ThermalWarning,
        voltage,
        frequency,
    }
}

// 8. stability issue

fn is_high_error(ctx: &CycleContext<'_>) -> bool {
    ctx.reading.smoothed_error_rate > ctx.profile.max_error_rate
}

fn is_low_hash(ctx: &CycleContext<'_>) -> bool {
    ctx.reading.hash_ratio < ctx.profile.min_hash_ratio
}

fn is_unstable(ctx: &CycleContext<'_>) -> bool {
    is_high_error(ctx)
        || ctx.reading.hw_error_delta > ctx.profile.hw_error_threshold
        || is_low_hash(ctx)
}

/// Tie-break order: revert a failed optimization, then share/hardware
/// errors, then low hash performance.
fn stabilize(ctx: &CycleContext<'_>) -> Decision {
    let profile = ctx.profile;
    let state = ctx.state;
    let step_down = |action| Decision {
        action,
        voltage: state.current_voltage,
        frequency: ctx.step_frequency_down(1.0),
    };
    let step_up_voltage = |action| Decision {
        action,
        voltage: ctx
            .ceiling
            .max_voltage
            .min(state.current_voltage + profile.voltage_step),
        frequency: state.current_frequency,
    };

    if state.last_action.is_optimization() {
        return step_down(Action::InstabilityRevertOptimization);
    }

    if is_high_error(ctx) || ctx.reading.hw_error_delta > profile.severe_hw_error_threshold {
        return if state.current_frequency > profile.min_frequency + 5.0 * profile.frequency_step {
            step_down(Action::InstabilityThrottleFrequency)
        } else if state.current_voltage < ctx.ceiling.max_voltage {
            step_up_voltage(Action::IncreaseStabilityVoltage)
        } else {
            step_down(Action::InstabilityThrottleFrequency)
        };
    }

    if is_low_hash(ctx) {
        return if state.current_voltage < ctx.ceiling.max_voltage - profile.voltage_step {
            step_up_voltage(Action::HashrateStabilityBoost)
        } else {
            step_down(Action::HashrateThrottle)
        };
    }

    // Moderate hardware errors: hold, but start counting stability again
    Decision::hold(state, Action::StabilityWatch)
}

// 9. optimization

fn has_thermal_headroom(ctx: &CycleContext<'_>) -> bool {
    ctx.reading.smoothed_temp < ctx.profile.temp_target
}

fn optimize(ctx: &CycleContext<'_>) -> Decision {
    let profile = ctx.profile;
    let state = ctx.state;
    let frequency_headroom = ctx.has_frequency_headroom();
    let very_stable = ctx.very_stable();

    // a. voltage pullback at the ceiling
    if state.current_voltage >= ctx.ceiling.max_voltage && very_stable && !frequency_headroom {
        return Decision {
            action: Action::VoltagePullback,
            voltage: ctx.step_voltage_down(),
            frequency: state.current_frequency,
        };
    }

    if let (Some(efficiency), Some(target)) = (ctx.reading.efficiency, profile.target_efficiency) {
        // b. over the efficiency target
        if efficiency > target + EFFICIENCY_BAND {
            return ctx.throttle(1.0, Action::TuneForEfficiency);
        }
        // c. under the target with room to clock up
        if efficiency < target - EFFICIENCY_BAND && frequency_headroom {
            let frequency = ctx
                .ceiling
                .max_frequency
                .min(state.current_frequency + profile.frequency_step);
            let (voltage, action) = match ctx.curve_voltage(frequency) {
                Some((voltage, true)) if voltage > state.current_voltage => {
                    (voltage, Action::IncreaseFrequencyWithCurveOffset)
                }
                Some((voltage, false)) if voltage > state.current_voltage => {
                    (voltage, Action::IncreaseFrequencyWithCurve)
                }
                _ => (state.current_voltage, Action::IncreaseFrequencyEfficiency),
            };
            return Decision {
                action,
                voltage,
                frequency,
            };
        }
    }

    // d. main path
    if frequency_headroom {
        return raise_frequency(ctx);
    }

    // e. at the frequency ceiling: trade voltage for efficiency
    if very_stable && ctx.voltage_reducible() {
        return Decision {
            action: Action::OptimizeVoltageMaxFrequency,
            voltage: ctx.step_voltage_down(),
            frequency: state.current_frequency,
        };
    }

    maintain(ctx)
}

fn raise_frequency(ctx: &CycleContext<'_>) -> Decision {
    let profile = ctx.profile;
    let state = ctx.state;
    let step = profile.frequency_step;

    let cooldown = if state.last_action.is_instability_throttle() {
        COOLDOWN_AFTER_THROTTLE
    } else {
        COOLDOWN_CYCLES
    };
    let margin = profile.temp_target - ctx.reading.smoothed_temp;
    let reducible = ctx.very_stable() && ctx.voltage_reducible();

    if !(ctx.stable() && state.stable_cycle_count >= cooldown && margin > MIN_TEMP_MARGIN) {
        // Thermal wall: shed voltage now so the clock can rise later
        if reducible {
            return Decision {
                action: Action::OptimizeVoltageThermal,
                voltage: ctx.step_voltage_down(),
                frequency: state.current_frequency,
            };
        }
        return maintain(ctx);
    }

    let distance = ctx.ceiling.max_frequency - state.current_frequency;
    let increase = if margin < APPROACH_TEMP_MARGIN {
        step
    } else if distance > 100.0 {
        4.0 * step
    } else if distance > 50.0 {
        2.0 * step
    } else {
        step
    };
    let frequency = ctx
        .ceiling
        .max_frequency
        .min(state.current_frequency + increase);

    let (voltage, action) = match ctx.curve_voltage(frequency) {
        Some((voltage, offset)) if voltage > state.current_voltage => (
            voltage,
            if offset {
                Action::IncreaseFrequencyWithCurveOffset
            } else {
                Action::IncreaseFrequencyWithCurve
            },
        ),
        Some((voltage, _)) if reducible && voltage < state.current_voltage => (
            voltage.max(profile.min_voltage),
            Action::IncreaseFrequencyReduceVoltageCurve,
        ),
        Some(_) => (state.current_voltage, Action::IncreaseFrequency),
        // No curve: fixed-step fallback
        None if reducible => (
            ctx.step_voltage_down(),
            Action::IncreaseFrequencyReduceVoltage,
        ),
        None => (state.current_voltage, Action::IncreaseFrequency),
    };

    Decision {
        action,
        voltage,
        frequency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::classifier::RailClass;
    use crate::tuning::curve::ChipFamily;
    use crate::tuning::fault::{CriticalReason, SoftReason};
    use crate::tuning::gate::finalize;
    use crate::tuning::limits::{effective_limits, learn_from_fault};
    use crate::tuning::profile::ProfileName;
    use crate::tuning::state::{CostSettings, Setting};
    use chrono::Duration;

    struct Fixture {
        state: DeviceState,
        profile: Profile,
        reading: Reading,
        faults: FaultAssessment,
        now: DateTime<Utc>,
    }

    impl Fixture {
        /// Conservative device at 1200 mV / 525 MHz, warm enough to hold
        fn new() -> Self {
            let mut state = DeviceState::new("10.0.0.20", ProfileName::Conservative);
            state.current_voltage = 1200.0;
            state.current_frequency = 525.0;
            state.rail_class = Some(RailClass::FiveVolt);
            Self {
                state,
                profile: Profile::conservative(),
                reading: Reading {
                    temp: 63.0,
                    smoothed_temp: 63.0,
                    hash_ratio: 1.0,
                    ..Reading::default()
                },
                faults: FaultAssessment::default(),
                now: Utc::now(),
            }
        }

        fn with_temp(mut self, temp: f64) -> Self {
            self.reading.temp = temp;
            self.reading.smoothed_temp = temp;
            self
        }

        fn decide(&self) -> (&'static str, Decision) {
            let ceiling = effective_limits(&self.state, &self.profile);
            let learned = self.faults.confirmed.then(|| {
                learn_from_fault(ceiling, &self.profile, self.state.current_setting())
            });
            decide(&CycleContext {
                state: &self.state,
                profile: &self.profile,
                reading: &self.reading,
                faults: &self.faults,
                ceiling,
                learned,
                now: self.now,
            })
        }
    }

    #[test]
    fn test_rule_order_matches_ladder() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "post_restart_recovery",
                "emergency_cooling",
                "cost_overrun",
                "critical_fault",
                "soft_fault",
                "thermal_danger",
                "thermal_warning",
                "stability",
                "optimization",
                "maintain"
            ]
        );
    }

    #[test]
    fn test_default_maintains() {
        let (rule, d) = Fixture::new().decide();
        assert_eq!(rule, "maintain");
        assert_eq!(d.action, Action::Maintain);
        assert!(!d.changes(&Fixture::new().state));
    }

    #[test]
    fn test_post_restart_recovery_adopts_current() {
        let mut fx = Fixture::new().with_temp(80.0);
        fx.state.restarting = true;
        fx.state.stabilization_deadline = Some(fx.now - Duration::seconds(1));
        let (rule, d) = fx.decide();
        assert_eq!(rule, "post_restart_recovery");
        assert_eq!((d.voltage, d.frequency), (1200.0, 525.0));
    }

    #[test]
    fn test_restart_pending_does_not_recover_early() {
        let mut fx = Fixture::new();
        fx.state.restarting = true;
        fx.state.stabilization_deadline = Some(fx.now + Duration::seconds(30));
        assert_ne!(fx.decide().0, "post_restart_recovery");
    }

    #[test]
    fn test_emergency_uses_raw_temp_and_ignores_stabilization() {
        let mut fx = Fixture::new();
        fx.reading.temp = 75.0;
        fx.state.stabilization_deadline = Some(fx.now + Duration::seconds(60));
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::EmergencyCooling);
        assert_eq!((d.voltage, d.frequency), (1150.0, 450.0));
    }

    fn cost_fixture(daily_cost: f64) -> Fixture {
        let mut fx = Fixture::new();
        fx.state.profile = ProfileName::CostSensitive;
        fx.profile = Profile::cost_sensitive();
        fx.state.cost = Some(CostSettings {
            price_per_kwh: Some(0.3),
            daily_cost_limit: Some(0.1),
        });
        fx.reading.daily_cost = daily_cost;
        fx
    }

    #[test]
    fn test_cost_overrun_throttles_frequency_first() {
        let (_, d) = cost_fixture(0.2).decide();
        assert_eq!(d.action, Action::CostThrottleFrequency);
        assert_eq!((d.voltage, d.frequency), (1200.0, 505.0));
    }

    #[test]
    fn test_cost_overrun_drops_voltage_at_floor() {
        let mut fx = cost_fixture(0.2);
        fx.state.current_frequency = 450.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::CostThrottleVoltage);
        assert_eq!((d.voltage, d.frequency), (1190.0, 450.0));
    }

    #[test]
    fn test_cost_rule_needs_cost_profile() {
        let mut fx = cost_fixture(0.2);
        fx.state.profile = ProfileName::Conservative;
        fx.profile = Profile::conservative();
        assert_ne!(fx.decide().0, "cost_overrun");
    }

    #[test]
    fn test_confirmed_fault_recovery_without_chip() {
        let mut fx = Fixture::new();
        fx.state.current_voltage = 1250.0;
        fx.state.current_frequency = 600.0;
        fx.faults.critical = vec![CriticalReason::FaultFlag("Power Fault".into())];
        fx.faults.confirmed = true;
        let (rule, d) = fx.decide();
        assert_eq!(rule, "critical_fault");
        assert!(d.restart());
        // 450 + 10 steps under the learned 570 MHz; 1150 + 5 steps
        assert_eq!((d.voltage, d.frequency), (1200.0, 550.0));
    }

    #[test]
    fn test_confirmed_fault_recovery_uses_curve() {
        let mut fx = Fixture::new();
        fx.state.chip_family = Some(ChipFamily::BM1366);
        fx.state.current_voltage = 1250.0;
        fx.state.current_frequency = 600.0;
        fx.faults.critical = vec![CriticalReason::FaultFlag("Power Fault".into())];
        fx.faults.confirmed = true;
        let (_, d) = fx.decide();
        // BM1366 at 550 MHz is 1200 mV plus the 5V margin
        assert_eq!((d.voltage, d.frequency), (1220.0, 550.0));
    }

    #[test]
    fn test_recovery_respects_learned_ceiling() {
        let mut fx = Fixture::new();
        fx.state.current_voltage = 1160.0;
        fx.state.current_frequency = 480.0;
        fx.faults.critical = vec![CriticalReason::FaultFlag("Power Fault".into())];
        fx.faults.confirmed = true;
        let (_, d) = fx.decide();
        // learned ceiling: 1150 mV / 450 MHz
        assert_eq!((d.voltage, d.frequency), (1150.0, 450.0));
    }

    #[test]
    fn test_unconfirmed_fault_falls_through() {
        let mut fx = Fixture::new();
        fx.faults.critical = vec![CriticalReason::FaultFlag("Power Fault".into())];
        assert_eq!(fx.decide().0, "maintain");
    }

    #[test]
    fn test_soft_fault_throttles_two_steps() {
        let mut fx = Fixture::new();
        fx.faults.soft = vec![SoftReason::RailTemp(90.0)];
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::RailTempThrottle);
        assert_eq!((d.voltage, d.frequency), (1200.0, 505.0));

        fx.faults.soft = vec![SoftReason::PowerLimit(44.0)];
        fx.state.current_frequency = 460.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::PowerLimitThrottle);
        assert_eq!((d.voltage, d.frequency), (1190.0, 450.0));
    }

    #[test]
    fn test_soft_fault_waits_for_stabilization() {
        let mut fx = Fixture::new();
        fx.faults.soft = vec![SoftReason::PowerLimit(44.0)];
        fx.state.stabilization_deadline = Some(fx.now + Duration::seconds(60));
        assert_ne!(fx.decide().0, "soft_fault");
    }

    #[test]
    fn test_thermal_danger() {
        let (_, d) = Fixture::new().with_temp(72.5).decide();
        assert_eq!(d.action, Action::ThermalDanger);
        assert_eq!((d.voltage, d.frequency), (1190.0, 505.0));
    }

    #[test]
    fn test_thermal_danger_keeps_low_voltage_with_clock_headroom() {
        let mut fx = Fixture::new().with_temp(73.0);
        fx.state.current_voltage = 1160.0;
        let (_, d) = fx.decide();
        assert_eq!((d.voltage, d.frequency), (1160.0, 505.0));

        fx.state.current_frequency = 455.0;
        let (_, d) = fx.decide();
        assert_eq!((d.voltage, d.frequency), (1150.0, 450.0));
    }

    fn finalized(fx: &Fixture) -> Decision {
        let ceiling = effective_limits(&fx.state, &fx.profile);
        finalize(fx.decide().1, &fx.state, &fx.profile, ceiling, fx.now)
    }

    #[test]
    fn test_cooling_below_floor_never_raises_clock() {
        for temp in [68.0, 73.0, 76.0] {
            let mut fx = Fixture::new().with_temp(temp);
            fx.state.current_frequency = 400.0;
            let d = finalized(&fx);
            assert!(d.action.is_cooling_critical(), "{}", temp);
            assert!(d.frequency <= 400.0, "{}: {}", temp, d.frequency);
            assert!(d.voltage <= 1200.0, "{}: {}", temp, d.voltage);
        }

        let mut fx = Fixture::new().with_temp(73.0);
        fx.state.current_frequency = 400.0;
        assert_eq!(finalized(&fx), Decision {
            action: Action::ThermalDanger,
            voltage: 1190.0,
            frequency: 400.0,
        });

        let mut fx = Fixture::new().with_temp(76.0);
        fx.state.current_voltage = 1120.0;
        fx.state.current_frequency = 400.0;
        assert_eq!(finalized(&fx), Decision {
            action: Action::EmergencyCooling,
            voltage: 1120.0,
            frequency: 400.0,
        });
    }

    #[test]
    fn test_thermal_warning() {
        let (_, d) = Fixture::new().with_temp(67.5).decide();
        assert_eq!(d.action, Action::ThermalWarning);
        assert_eq!((d.voltage, d.frequency), (1200.0, 515.0));
    }

    #[test]
    fn test_thermal_warning_voltage_only_at_floor_and_hotter() {
        let mut fx = Fixture::new().with_temp(67.5);
        fx.state.current_frequency = 450.0;
        assert_eq!(fx.decide().1.voltage, 1200.0);

        let mut fx = fx.with_temp(68.0);
        fx.state.current_frequency = 450.0;
        assert_eq!(fx.decide().1.voltage, 1190.0);
    }

    #[test]
    fn test_stability_reverts_failed_optimization() {
        let mut fx = Fixture::new();
        fx.state.last_action = Action::VoltagePullback;
        fx.reading.smoothed_error_rate = 0.08;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::InstabilityRevertOptimization);
        assert_eq!(d.frequency, 515.0);
    }

    #[test]
    fn test_stability_high_error_throttles_with_headroom() {
        let mut fx = Fixture::new();
        fx.reading.smoothed_error_rate = 0.08;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::InstabilityThrottleFrequency);
        assert_eq!(d.frequency, 515.0);
    }

    #[test]
    fn test_stability_high_error_near_floor_adds_voltage() {
        let mut fx = Fixture::new();
        fx.state.current_frequency = 490.0;
        fx.reading.hw_error_delta = 25;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::IncreaseStabilityVoltage);
        assert_eq!((d.voltage, d.frequency), (1210.0, 490.0));

        fx.state.current_voltage = 1250.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::InstabilityThrottleFrequency);
        assert_eq!(d.frequency, 480.0);
    }

    #[test]
    fn test_stability_low_hash() {
        let mut fx = Fixture::new();
        fx.reading.hash_ratio = 0.9;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::HashrateStabilityBoost);
        assert_eq!(d.voltage, 1210.0);

        fx.state.current_voltage = 1245.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::HashrateThrottle);
        assert_eq!(d.frequency, 515.0);
    }

    #[test]
    fn test_stability_moderate_hw_errors_watch() {
        let mut fx = Fixture::new();
        fx.reading.hw_error_delta = 10;
        let (rule, d) = fx.decide();
        assert_eq!(rule, "stability");
        assert_eq!(d.action, Action::StabilityWatch);
        assert!(!d.changes(&fx.state));
    }

    #[test]
    fn test_aggressive_tolerates_more_hw_errors() {
        let mut fx = Fixture::new();
        fx.state.profile = ProfileName::Aggressive;
        fx.profile = Profile::aggressive();
        fx.reading.hw_error_delta = 30;
        fx = fx.with_temp(72.0 - 0.5);
        assert_ne!(fx.decide().0, "stability");
    }

    /// Stable for 10 cycles, 55 °C against a 62 °C target
    fn optimizing() -> Fixture {
        let mut fx = Fixture::new().with_temp(55.0);
        fx.state.current_frequency = 550.0;
        fx.state.stable_cycle_count = 10;
        fx.reading.smoothed_error_rate = 0.01;
        fx.reading.hash_ratio = 0.97;
        fx.reading.efficiency = Some(16.0);
        fx
    }

    #[test]
    fn test_cool_stable_device_single_step_with_curve_voltage() {
        let mut fx = optimizing();
        fx.state.chip_family = Some(ChipFamily::BM1366);
        let (rule, d) = fx.decide();
        assert_eq!(rule, "optimization");
        assert_eq!(d.frequency, 560.0);
        // curve 1220 -> 1226 at 560 MHz, unit sits 20 mV under the curve
        assert_eq!(d.voltage, 1206.0);
        assert_eq!(d.action, Action::IncreaseFrequencyWithCurveOffset);
    }

    #[test]
    fn test_unknown_chip_fixed_step() {
        let mut fx = optimizing();
        assert!(fx.state.chip_family.is_none());
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::IncreaseFrequency);
        assert_eq!((d.voltage, d.frequency), (1200.0, 560.0));

        // very stable with voltage well above the floor: one-step voltage trim
        fx.reading.smoothed_error_rate = 0.005;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::IncreaseFrequencyReduceVoltage);
        assert_eq!((d.voltage, d.frequency), (1190.0, 560.0));
    }

    #[test]
    fn test_frequency_step_scales_with_distance() {
        let mut fx = optimizing();
        fx.state.current_frequency = 460.0;
        assert_eq!(fx.decide().1.frequency, 500.0);

        fx.state.current_frequency = 520.0;
        assert_eq!(fx.decide().1.frequency, 540.0);

        fx.state.current_frequency = 570.0;
        assert_eq!(fx.decide().1.frequency, 575.0);
    }

    #[test]
    fn test_single_step_when_approaching_target() {
        let mut fx = optimizing().with_temp(58.0);
        fx.state.current_frequency = 460.0;
        assert_eq!(fx.decide().1.frequency, 470.0);
    }

    #[test]
    fn test_cooldown_after_throttle() {
        let mut fx = optimizing();
        fx.state.stable_cycle_count = 4;
        fx.reading.smoothed_error_rate = 0.0;
        fx.state.last_action = Action::InstabilityThrottleFrequency;
        // 4 stable cycles: stable bar needs 5
        assert_eq!(fx.decide().1.action, Action::Maintain);

        fx.state.stable_cycle_count = 5;
        assert_eq!(fx.decide().1.frequency, 560.0);
    }

    #[test]
    fn test_thermal_wall_sheds_voltage() {
        let mut fx = optimizing().with_temp(60.0);
        fx.reading.smoothed_error_rate = 0.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::OptimizeVoltageThermal);
        assert_eq!((d.voltage, d.frequency), (1190.0, 550.0));
    }

    #[test]
    fn test_voltage_pullback_at_ceiling() {
        let mut fx = optimizing();
        fx.state.current_voltage = 1250.0;
        fx.state.current_frequency = 575.0;
        fx.reading.smoothed_error_rate = 0.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::VoltagePullback);
        assert_eq!(d.voltage, 1240.0);
    }

    #[test]
    fn test_max_frequency_trades_voltage() {
        let mut fx = optimizing();
        fx.state.current_voltage = 1220.0;
        fx.state.current_frequency = 575.0;
        fx.reading.smoothed_error_rate = 0.0;
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::OptimizeVoltageMaxFrequency);
        assert_eq!(d.voltage, 1210.0);
    }

    #[test]
    fn test_efficiency_over_target_steps_down() {
        let mut fx = optimizing();
        fx.reading.efficiency = Some(17.0);
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::TuneForEfficiency);
        assert_eq!(d.frequency, 540.0);
    }

    #[test]
    fn test_efficiency_under_target_steps_up() {
        let mut fx = optimizing();
        fx.state.stable_cycle_count = 0;
        fx.reading.efficiency = Some(14.0);
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::IncreaseFrequencyEfficiency);
        assert_eq!((d.voltage, d.frequency), (1200.0, 560.0));

        fx.state.chip_family = Some(ChipFamily::BM1366);
        let (_, d) = fx.decide();
        assert_eq!(d.action, Action::IncreaseFrequencyWithCurveOffset);
        assert_eq!(d.voltage, 1206.0);
    }

    #[test]
    fn test_cost_limit_blocks_frequency_increase() {
        let mut fx = optimizing();
        fx.state.profile = ProfileName::CostSensitive;
        fx.profile = Profile::cost_sensitive();
        fx.reading.efficiency = None;
        fx.state.cost = Some(CostSettings {
            price_per_kwh: Some(0.3),
            daily_cost_limit: Some(0.1),
        });
        fx.reading.daily_cost = 0.1;
        let (_, d) = fx.decide();
        assert_eq!(d.frequency, 550.0);
    }

    #[test]
    fn test_learned_recovery_uses_fault_setting() {
        let mut fx = Fixture::new();
        fx.faults.confirmed = true;
        fx.faults.critical = vec![CriticalReason::InputVoltage(4000.0)];
        let ceiling = effective_limits(&fx.state, &fx.profile);
        let learned = learn_from_fault(
            ceiling,
            &fx.profile,
            Setting {
                voltage: 1200.0,
                frequency: 525.0,
            },
        );
        assert_eq!(learned.ceiling.max_frequency, 495.0);
        assert_eq!(fx.decide().1.frequency, 495.0);
    }
}
