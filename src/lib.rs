// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! axetune - autonomous voltage/frequency tuning for AxeOS ASIC miners.
//!
//! This crate exposes the runtime used by the `axetune` CLI (`src/main.rs`).
//!
//! Architecture highlights:
//! - `device`: telemetry model and the HTTP client for the device API
//! - `tuning`: pure decision logic (classifier, fault detector, rule ladder,
//!   stabilization gate, adaptive limits)
//! - `controller`: per-device state, control cycles and the periodic scheduler
//! - `persistence`: versioned state file and the debounced background writer
//! - `config`, `cli`, `commands`: settings, argument parsing and subcommands

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod persistence;
pub mod tuning;

pub use error::{Result, TuneError};
