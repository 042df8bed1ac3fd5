// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Device telemetry as reported by `GET /api/system/info`
//!
//! Firmware builds disagree on types (numbers vs. numeric strings vs. null)
//! and omit fields freely. Every numeric field therefore decodes leniently and
//! defaults to zero so a flaky device never stops the control loop.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One telemetry sample from a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    /// Core (ASIC) temperature, °C
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temp: f64,

    /// Voltage regulator temperature, °C
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vr_temp: f64,

    /// Input rail voltage, mV
    #[serde(default, rename = "voltage", deserialize_with = "lenient_f64")]
    pub input_voltage: f64,

    /// Configured core voltage, mV
    #[serde(default, deserialize_with = "lenient_f64")]
    pub core_voltage: f64,

    /// ASIC clock, MHz
    #[serde(default, deserialize_with = "lenient_f64")]
    pub frequency: f64,

    /// Power draw, W
    #[serde(default, deserialize_with = "lenient_f64")]
    pub power: f64,

    /// Observed hashrate, GH/s
    #[serde(default, deserialize_with = "lenient_f64")]
    pub hash_rate: f64,

    /// Hashrate expected for the current clock, GH/s
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_hashrate: f64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub shares_accepted: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub shares_rejected: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate_monitor: Option<HashrateMonitor>,

    /// Firmware fault string, e.g. "Power Fault"
    #[serde(default, rename = "power_fault", deserialize_with = "lenient_string")]
    pub power_fault: Option<String>,

    /// Direct share error percentage (0–100) on newer firmware
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub error_percentage: Option<f64>,

    #[serde(default, rename = "ASICModel", deserialize_with = "lenient_string")]
    pub asic_model: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub device_model: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub hostname: Option<String>,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub asic_count: u64,
}

/// Per-ASIC hardware error counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HashrateMonitor {
    #[serde(default)]
    pub asics: Vec<AsicMonitor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsicMonitor {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub error_count: u64,
}

impl Telemetry {
    /// Hardware error counter of the first ASIC (0 when not reported)
    pub fn hardware_error_count(&self) -> u64 {
        self.hashrate_monitor
            .as_ref()
            .and_then(|m| m.asics.first())
            .map(|a| a.error_count)
            .unwrap_or(0)
    }

    /// Whether firmware flagged an explicit fault
    pub fn has_fault_flag(&self) -> bool {
        self.power_fault
            .as_deref()
            .is_some_and(|flag| flag.contains("Fault"))
    }

    /// `ASICModel (count)` identifier used by chip detection
    pub fn chip_info(&self) -> Option<String> {
        match self.asic_model.as_deref() {
            Some(model) if self.asic_count > 0 => Some(format!("{} ({})", model, self.asic_count)),
            _ => None,
        }
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value))
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_f64(&value)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .unwrap_or(0))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
