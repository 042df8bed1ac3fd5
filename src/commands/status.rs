// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Status and detail commands

use crate::cli::args::{DetailArgs, OutputFormat};
use crate::controller::{DeviceDetail, DeviceLimits, LimitsSummary};
use crate::error::Result;

use super::Context;

/// Execute the status command
pub async fn execute(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let controller = ctx.offline_controller().await?;
    let summary = controller.summary().await;

    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print!("{}", render_summary(&summary));
    Ok(())
}

/// Execute the detail command
pub async fn execute_detail(ctx: &Context, args: &DetailArgs, format: &OutputFormat) -> Result<()> {
    let controller = ctx.offline_controller().await?;
    let mut detail = controller.detail(&args.address).await?;
    let skip = detail.tuning_log.len().saturating_sub(args.tail);
    detail.tuning_log = detail.tuning_log.split_off(skip);

    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    print!("{}", render_detail(&detail));
    Ok(())
}

fn device_line(device: &DeviceLimits) -> String {
    let label = match &device.name {
        Some(name) => format!("{} ({})", device.address, name),
        None => device.address.clone(),
    };
    let mut line = format!(
        "{:<32} {:<15} {:>7.1}mV {:>6.0}MHz  ceiling {:.0}mV/{:.0}MHz",
        label,
        device.profile.as_str(),
        device.current_settings.voltage,
        device.current_settings.frequency,
        device.adaptive_limits.max_voltage,
        device.adaptive_limits.max_frequency,
    );
    if device.is_limited {
        line.push_str(&format!(
            "  (-{:.0}mV/-{:.0}MHz, {} faults)",
            device.reduction.voltage, device.reduction.frequency, device.fault_count
        ));
    }
    if !device.enabled {
        line.push_str("  [disabled]");
    }
    line
}

pub(crate) fn render_summary(summary: &LimitsSummary) -> String {
    let mut out = String::from("\n=== Tuned Devices ===\n\n");
    if summary.devices.is_empty() {
        out.push_str("No devices under tuning.\n");
        return out;
    }
    for device in &summary.devices {
        out.push_str(&device_line(device));
        out.push('\n');
    }
    out.push_str(&format!(
        "\n{} devices, {} limited\n",
        summary.total_devices, summary.limited_devices
    ));
    out
}

pub(crate) fn render_detail(detail: &DeviceDetail) -> String {
    let limits = &detail.limits;
    let mut out = format!("\n=== {} ===\n\n", limits.address);
    out.push_str(&format!("Profile: {}\n", limits.profile));
    out.push_str(&format!(
        "Current: {:.1}mV / {:.0}MHz\n",
        limits.current_settings.voltage, limits.current_settings.frequency
    ));
    out.push_str(&format!(
        "Ceiling: {:.0}mV / {:.0}MHz (configured {:.0}mV / {:.0}MHz)\n",
        limits.adaptive_limits.max_voltage,
        limits.adaptive_limits.max_frequency,
        limits.config_limits.max_voltage,
        limits.config_limits.max_frequency,
    ));
    if let Some(chip) = limits.chip_family {
        out.push_str(&format!("Chip: {:?}\n", chip));
    }
    if let Some(rail) = limits.rail_class {
        out.push_str(&format!("Rail: {}\n", rail.as_str()));
    }
    if let Some(good) = limits.last_known_good {
        out.push_str(&format!(
            "Last known good: {:.1}mV / {:.0}MHz\n",
            good.voltage, good.frequency
        ));
    }
    out.push_str(&format!(
        "Last action: {} (stable for {} cycles){}\n",
        detail.last_action,
        detail.stable_cycle_count,
        if detail.restarting { ", restarting" } else { "" }
    ));

    if !limits.fault_history.is_empty() {
        out.push_str("\n--- Faults ---\n");
        for fault in &limits.fault_history {
            out.push_str(&format!(
                "{}  at {:.0}mV/{:.0}MHz -> {:.0}mV/{:.0}MHz  {}\n",
                fault.timestamp.format("%Y-%m-%d %H:%M:%S"),
                fault.voltage_at_fault,
                fault.frequency_at_fault,
                fault.resulting_limits.max_voltage,
                fault.resulting_limits.max_frequency,
                fault.reasons.join(", "),
            ));
        }
    }

    if !detail.tuning_log.is_empty() {
        out.push_str("\n--- Tuning log ---\n");
        for sample in &detail.tuning_log {
            out.push_str(&format!(
                "{}  {:>7.1}mV {:>6.0}MHz {:>8.1}GH/s {:>5.1}W {:>5.1}C  {}\n",
                sample.timestamp.format("%H:%M:%S"),
                sample.voltage,
                sample.frequency,
                sample.hashrate,
                sample.power,
                sample.smoothed_temp,
                sample.action,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::DetailArgs;
    use crate::commands::test_support;
    use crate::controller::EnableRequest;
    use crate::error::TuneError;
    use crate::tuning::profile::ProfileName;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_render_empty_summary() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_support::context(&temp_dir);
        let controller = ctx.offline_controller().await.unwrap();
        let out = render_summary(&controller.summary().await);
        assert!(out.contains("No devices under tuning"));
    }

    #[tokio::test]
    async fn test_render_limited_device() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_support::context(&temp_dir);
        let controller = ctx.offline_controller().await.unwrap();
        controller
            .enable(EnableRequest::new("10.0.0.1", ProfileName::Conservative))
            .await;
        controller
            .set_adaptive_limits("10.0.0.1", 1230.0, 545.0)
            .await
            .unwrap();

        let out = render_summary(&controller.summary().await);
        assert!(out.contains("10.0.0.1"));
        assert!(out.contains("ceiling 1230mV/545MHz"));
        assert!(out.contains("(-20mV/-30MHz, 0 faults)"));
        assert!(out.contains("1 devices, 1 limited"));

        let detail = render_detail(&controller.detail("10.0.0.1").await.unwrap());
        assert!(detail.contains("Profile: conservative"));
        assert!(detail.contains("configured 1250mV / 575MHz"));
    }

    #[tokio::test]
    async fn test_detail_unknown_device() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_support::context(&temp_dir);
        let args = DetailArgs {
            address: "10.9.9.9".to_string(),
            tail: 5,
        };
        let result = execute_detail(&ctx, &args, &OutputFormat::Json).await;
        assert!(matches!(result, Err(TuneError::UnknownDevice(_))));
    }
}
