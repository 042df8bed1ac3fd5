// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for axetune.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// axetune - autonomous voltage/frequency tuning for AxeOS miners
#[derive(Parser, Debug)]
#[command(name = "axetune")]
#[command(version, about = "Autonomous voltage/frequency tuning for AxeOS miners")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.axetune/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// State file path (overrides storage.state_path)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tuning loop until interrupted
    Run,

    /// Show adaptive limits for every tuned device
    Status,

    /// Show tuning log and fault history for one device
    Detail(DetailArgs),

    /// Start (or reconfigure) tuning for a device
    Enable(EnableArgs),

    /// Stop tuning a device and forget its state
    Disable(AddressArgs),

    /// Inspect or override learned limits
    Limits(LimitsArgs),

    /// List the effective profile table
    Profiles,
}

/// A single device address
#[derive(clap::Args, Debug)]
pub struct AddressArgs {
    /// Device host or base URL
    pub address: String,
}

/// Arguments for the detail subcommand
#[derive(clap::Args, Debug)]
pub struct DetailArgs {
    /// Device host or base URL
    pub address: String,

    /// Number of tuning log entries to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub tail: usize,
}

/// Arguments for the enable subcommand
#[derive(clap::Args, Debug)]
pub struct EnableArgs {
    /// Device host or base URL
    pub address: String,

    /// Tuning profile (conservative, aggressive, cost_sensitive)
    #[arg(short, long, default_value = "conservative")]
    pub profile: String,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Electricity price per kWh
    #[arg(long)]
    pub kwh_price: Option<f64>,

    /// Daily cost ceiling (cost_sensitive profile)
    #[arg(long)]
    pub daily_cost_limit: Option<f64>,
}

/// Arguments for the limits subcommand
#[derive(clap::Args, Debug)]
pub struct LimitsArgs {
    #[command(subcommand)]
    pub command: LimitsCommands,
}

#[derive(Subcommand, Debug)]
pub enum LimitsCommands {
    /// Restore the configured ceiling
    Reset(AddressArgs),

    /// Overwrite the learned ceiling
    Set {
        /// Device host or base URL
        address: String,

        /// Maximum core voltage, mV
        #[arg(long)]
        voltage: f64,

        /// Maximum frequency, MHz
        #[arg(long)]
        frequency: f64,
    },
}

/// Output format for responses
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
