// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP client for AxeOS-style device APIs

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

use crate::device::client::{DeviceClient, DeviceResult, SettingsPatch};
use crate::device::Telemetry;
use crate::error::{DeviceError, Result};

const INFO_PATH: &str = "/api/system/info";
const SETTINGS_PATH: &str = "/api/system";
const RESTART_PATH: &str = "/api/system/restart";

/// Device client over the local HTTP API
#[derive(Debug, Clone)]
pub struct HttpDevice {
    client: Client,
    telemetry_timeout: Duration,
    write_timeout: Duration,
}

impl HttpDevice {
    pub fn new(telemetry_timeout: Duration, write_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(telemetry_timeout)
            .user_agent(concat!("axetune/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            telemetry_timeout,
            write_timeout,
        })
    }

    /// Base URL for an address. Bare hosts get `http://`.
    pub fn base_url(address: &str) -> String {
        let address = address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }

    async fn check_status(response: Response) -> DeviceResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(DeviceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DeviceClient for HttpDevice {
    async fn fetch_telemetry(&self, address: &str) -> DeviceResult<Telemetry> {
        let url = format!("{}{}", Self::base_url(address), INFO_PATH);
        let response = self
            .client
            .get(&url)
            .timeout(self.telemetry_timeout)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| DeviceError::Malformed(e.to_string()))
    }

    async fn apply_settings(&self, address: &str, patch: SettingsPatch) -> DeviceResult<()> {
        let url = format!("{}{}", Self::base_url(address), SETTINGS_PATH);
        tracing::debug!(
            device = %address,
            "Sending settings {}mV / {}MHz",
            patch.core_voltage,
            patch.frequency
        );
        let response = self
            .client
            .patch(&url)
            .json(&patch)
            .timeout(self.write_timeout)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn restart(&self, address: &str) -> DeviceResult<()> {
        let url = format!("{}{}", Self::base_url(address), RESTART_PATH);
        let response = self
            .client
            .post(&url)
            .timeout(self.write_timeout)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
