// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Adaptive limit overrides

use serde::Serialize;

use crate::cli::args::{LimitsArgs, LimitsCommands, OutputFormat};
use crate::error::Result;
use crate::tuning::state::Ceiling;

use super::Context;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitsChanged<'a> {
    address: &'a str,
    adaptive_limits: Ceiling,
}

/// Execute a limits subcommand
pub async fn execute(ctx: &Context, args: &LimitsArgs, format: &OutputFormat) -> Result<()> {
    let controller = ctx.offline_controller().await?;

    let (address, ceiling) = match &args.command {
        LimitsCommands::Reset(target) => {
            let address = target.address.trim();
            (address, controller.reset_adaptive_limits(address).await?)
        }
        LimitsCommands::Set {
            address,
            voltage,
            frequency,
        } => {
            let address = address.trim();
            (
                address,
                controller
                    .set_adaptive_limits(address, *voltage, *frequency)
                    .await?,
            )
        }
    };
    ctx.commit(&controller).await?;

    if matches!(format, OutputFormat::Json) {
        let body = LimitsChanged {
            address,
            adaptive_limits: ceiling,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "Adaptive limits for {}: {:.0}mV / {:.0}MHz",
            address, ceiling.max_voltage, ceiling.max_frequency
        );
    }
    Ok(())
}
