// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Enable and disable commands

use serde::Serialize;

use crate::cli::args::{AddressArgs, EnableArgs, OutputFormat};
use crate::controller::EnableRequest;
use crate::error::{Result, TuneError};
use crate::tuning::profile::ProfileName;
use crate::tuning::state::CostSettings;

use super::Context;

#[derive(Serialize)]
struct Disabled<'a> {
    address: &'a str,
    disabled: bool,
}

/// Turn command-line arguments into a validated enable request
pub(crate) fn request_from_args(args: &EnableArgs) -> Result<EnableRequest> {
    let address = args.address.trim();
    if address.is_empty() {
        return Err(TuneError::Validation("address must not be empty".to_string()));
    }
    let profile: ProfileName = args.profile.parse()?;

    for (label, value) in [
        ("kwh price", args.kwh_price),
        ("daily cost limit", args.daily_cost_limit),
    ] {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(TuneError::Validation(format!(
                    "{} must be a non-negative number",
                    label
                )));
            }
        }
    }

    let mut request = EnableRequest::new(address, profile);
    request.name = args.name.clone();
    if args.kwh_price.is_some() || args.daily_cost_limit.is_some() {
        request.cost = Some(CostSettings {
            price_per_kwh: args.kwh_price,
            daily_cost_limit: args.daily_cost_limit,
        });
    }
    Ok(request)
}

/// Execute the enable command
pub async fn execute_enable(ctx: &Context, args: &EnableArgs, format: &OutputFormat) -> Result<()> {
    let request = request_from_args(args)?;
    let address = request.address.clone();

    let controller = ctx.offline_controller().await?;
    controller.enable(request).await;
    ctx.commit(&controller).await?;

    let detail = controller.detail(&address).await?;
    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(&detail.limits)?);
    } else {
        println!(
            "Tuning enabled for {} with profile {} (ceiling {:.0}mV / {:.0}MHz)",
            address,
            detail.limits.profile,
            detail.limits.adaptive_limits.max_voltage,
            detail.limits.adaptive_limits.max_frequency,
        );
    }
    Ok(())
}

/// Execute the disable command
pub async fn execute_disable(ctx: &Context, args: &AddressArgs, format: &OutputFormat) -> Result<()> {
    let address = args.address.trim();
    let controller = ctx.offline_controller().await?;
    controller.disable(address).await?;
    ctx.commit(&controller).await?;

    if matches!(format, OutputFormat::Json) {
        let body = Disabled {
            address,
            disabled: true,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("Tuning disabled for {}", address);
    }
    Ok(())
}
