// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chip family and power-rail inference from telemetry and naming heuristics

use serde::{Deserialize, Serialize};
use std::fmt;

use super::curve::ChipFamily;
use crate::device::Telemetry;

/// Input voltage above which a device is assumed to sit on a 12V rail
const HIGH_RAIL_CUT_MV: f64 = 8000.0;

/// Power-delivery architecture of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RailClass {
    /// USB/barrel 5V devices (Ultra, Supra, Hex)
    #[default]
    #[serde(rename = "5V")]
    FiveVolt,
    /// 12V input devices (NerdQAxe, GT variants)
    #[serde(rename = "12V")]
    TwelveVolt,
    /// Bitaxe Gamma family
    #[serde(rename = "Gamma601")]
    Gamma601,
}

/// Hardware ceiling for a rail class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RailLimits {
    pub min_voltage: f64,
    pub max_voltage: f64,
    pub max_frequency: f64,
    /// Added on top of curve recommendations
    pub safety_margin_mv: f64,
}

impl RailClass {
    pub const ALL: [RailClass; 3] = [RailClass::FiveVolt, RailClass::TwelveVolt, RailClass::Gamma601];

    pub fn limits(&self) -> RailLimits {
        let safety_margin_mv = match self {
            RailClass::FiveVolt => 20.0,
            RailClass::TwelveVolt => 30.0,
            RailClass::Gamma601 => 25.0,
        };
        RailLimits {
            min_voltage: 1100.0,
            max_voltage: 1400.0,
            max_frequency: 1200.0,
            safety_margin_mv,
        }
    }

    /// Nominal supply voltage in millivolts
    pub fn nominal_input_mv(&self) -> f64 {
        match self {
            RailClass::FiveVolt | RailClass::Gamma601 => 5000.0,
            RailClass::TwelveVolt => 12000.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RailClass::FiveVolt => "5V",
            RailClass::TwelveVolt => "12V",
            RailClass::Gamma601 => "Gamma601",
        }
    }
}

impl fmt::Display for RailClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub chip: Option<ChipFamily>,
    pub rail: RailClass,
}

/// Classify a device from one telemetry sample.
///
/// `name` is the operator-assigned device name, consulted after the
/// firmware-reported model fields.
pub fn classify(telemetry: &Telemetry, name: Option<&str>) -> Classification {
    Classification {
        chip: detect_chip_family(telemetry, name),
        rail: detect_rail_class(telemetry, name),
    }
}

fn lowered(value: Option<&str>) -> String {
    value.unwrap_or_default().to_ascii_lowercase()
}

/// Chip family from model identifiers, then from the device name
pub fn detect_chip_family(telemetry: &Telemetry, name: Option<&str>) -> Option<ChipFamily> {
    let chip_info = lowered(telemetry.chip_info().as_deref());
    let model = lowered(telemetry.asic_model.as_deref());

    if let Some(chip) = ChipFamily::ALL.into_iter().find(|chip| {
        let number = chip.model_number();
        chip_info.contains(number) || model.contains(number)
    }) {
        return Some(chip);
    }

    let device_name = lowered(telemetry.device_model.as_deref().or(name));
    if device_name.contains("gamma") {
        Some(ChipFamily::BM1370)
    } else if device_name.contains("hex") {
        Some(ChipFamily::BM1368)
    } else {
        None
    }
}

/// Rail class from the device name, then from the measured input voltage
pub fn detect_rail_class(telemetry: &Telemetry, name: Option<&str>) -> RailClass {
    let device_name = lowered(
        telemetry
            .device_model
            .as_deref()
            .or(name)
            .or(telemetry.hostname.as_deref()),
    );

    if device_name.contains("nerdq") {
        return RailClass::TwelveVolt;
    }
    // Every Gamma variant (601/901/903) shares one envelope
    if device_name.contains("gamma") {
        return RailClass::Gamma601;
    }
    if device_name.contains("hex") {
        return RailClass::FiveVolt;
    }
    if device_name.contains("gt") {
        return RailClass::TwelveVolt;
    }
    if device_name.contains("ultra") || device_name.contains("supra") {
        return RailClass::FiveVolt;
    }

    if telemetry.input_voltage > 0.0 {
        return if telemetry.input_voltage > HIGH_RAIL_CUT_MV {
            RailClass::TwelveVolt
        } else {
            RailClass::FiveVolt
        };
    }

    RailClass::default()
}
