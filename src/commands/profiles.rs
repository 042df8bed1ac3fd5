// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Effective profile table

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::Result;
use crate::tuning::profile::{Profile, ProfileName, ProfileTable};

use super::Context;

#[derive(Serialize)]
struct NamedProfile<'a> {
    name: ProfileName,
    #[serde(flatten)]
    profile: &'a Profile,
}

/// Execute the profiles command
pub fn execute(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let table = ctx.settings.profile_table();

    if matches!(format, OutputFormat::Json) {
        let profiles: Vec<NamedProfile> = table
            .iter()
            .map(|(name, profile)| NamedProfile { name, profile })
            .collect();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    print!("{}", render(&table));
    Ok(())
}

fn render(table: &ProfileTable) -> String {
    let mut out = String::new();
    for (name, p) in table.iter() {
        out.push_str(&format!("\n=== {} ===\n\n", name));
        out.push_str(&format!(
            "Voltage:    {:.0}-{:.0}mV, step {:.0}mV\n",
            p.min_voltage, p.max_voltage, p.voltage_step
        ));
        out.push_str(&format!(
            "Frequency:  {:.0}-{:.0}MHz, step {:.0}MHz\n",
            p.min_frequency, p.max_frequency, p.frequency_step
        ));
        out.push_str(&format!(
            "Temps:      target {:.0}C, warning {:.0}C, danger {:.0}C, emergency {:.0}C\n",
            p.temp_target, p.temp_warning, p.temp_danger, p.emergency_temp
        ));
        out.push_str(&format!("Interval:   {}s\n", p.adjust_interval_secs));
        match p.target_efficiency {
            Some(target) => out.push_str(&format!("Efficiency: {:.1} J/TH\n", target)),
            None => out.push_str("Efficiency: off\n"),
        }
        out.push_str(&format!(
            "Recovery:   {:.0}mV / {:.0}MHz\n",
            p.recovery_voltage, p.recovery_frequency
        ));
    }
    out
}
