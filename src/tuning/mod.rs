// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tuning domain: curves, classification, adaptive limits, fault detection
//! and the decision ladder. Nothing in here performs I/O.

pub mod classifier;
pub mod curve;
pub mod engine;
pub mod fault;
pub mod gate;
pub mod limits;
pub mod metrics;
pub mod profile;
pub mod state;

pub use classifier::{classify, Classification, RailClass, RailLimits};
pub use curve::{recommend, ChipFamily, VoltageCurve};
pub use engine::{decide, CycleContext, Decision, Rule, RULES};
pub use fault::{CriticalReason, FaultAssessment, SoftReason};
pub use limits::{config_ceiling, effective_limits};
pub use metrics::Reading;
pub use profile::{Profile, ProfileName, ProfileTable};
pub use state::{Action, Ceiling, CostSettings, DeviceState, FaultRecord, Sample, Setting};
