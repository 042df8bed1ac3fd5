// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings applier
//!
//! One write per call, no retry. The next scheduled cycle re-reads telemetry
//! and decides again, which is the recovery path for a failed write.

use crate::device::{DeviceClient, DeviceResult, SettingsPatch};

/// What reached the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub patch: SettingsPatch,
    /// Restart was requested and accepted
    pub restarted: bool,
}

/// Write a setting, then optionally restart.
///
/// A failed write is returned as an error. A failed restart after a
/// successful write is logged and reported through [`Applied::restarted`].
pub async fn apply(
    client: &dyn DeviceClient,
    address: &str,
    voltage: f64,
    frequency: f64,
    restart: bool,
) -> DeviceResult<Applied> {
    let patch = SettingsPatch::new(voltage, frequency);
    client.apply_settings(address, patch).await?;

    let restarted = if restart {
        match client.restart(address).await {
            Ok(()) => {
                tracing::info!(device = %address, "Restart issued");
                true
            }
            Err(e) => {
                tracing::warn!(device = %address, "Restart failed: {}", e);
                false
            }
        }
    } else {
        false
    };

    Ok(Applied { patch, restarted })
}
