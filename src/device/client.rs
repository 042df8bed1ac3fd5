// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Device client trait
//!
//! The controller only ever talks to devices through this seam: one telemetry
//! read, one settings write and one restart command, each bounded by a timeout
//! in the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::device::Telemetry;
use crate::error::DeviceError;

/// Result type for device transport calls
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Body of the settings write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// Core voltage, whole millivolts
    pub core_voltage: i64,
    /// ASIC clock, whole MHz
    pub frequency: i64,
}

impl SettingsPatch {
    /// Round a tracked setting to what the firmware accepts
    pub fn new(voltage: f64, frequency: f64) -> Self {
        Self {
            core_voltage: voltage.round() as i64,
            frequency: frequency.round() as i64,
        }
    }
}

/// Transport to a fleet of devices, addressed by host (or base URL)
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Read one telemetry sample
    async fn fetch_telemetry(&self, address: &str) -> DeviceResult<Telemetry>;

    /// Write core voltage and frequency
    async fn apply_settings(&self, address: &str, patch: SettingsPatch) -> DeviceResult<()>;

    /// Reboot the device
    async fn restart(&self, address: &str) -> DeviceResult<()>;
}
