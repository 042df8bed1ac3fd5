// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Device access: telemetry schema, the client trait, and its HTTP and mock
//! implementations

pub mod client;
pub mod http;
pub mod mock;
pub mod telemetry;

pub use client::{DeviceClient, DeviceResult, SettingsPatch};
pub use http::HttpDevice;
pub use mock::MockDevice;
pub use telemetry::Telemetry;
