// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Subcommand implementations
//!
//! `run` drives live devices. Everything else works offline against the
//! persisted state file.

pub mod device;
pub mod limits;
pub mod profiles;
pub mod run;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::controller::Controller;
use crate::device::HttpDevice;
use crate::error::Result;
use crate::persistence::StateStore;

/// Settings and storage shared by every subcommand
pub struct Context {
    pub settings: Settings,
    pub store: StateStore,
}

impl Context {
    /// `state_override` takes precedence over `storage.state_path`
    pub fn new(settings: Settings, state_override: Option<PathBuf>) -> Self {
        let path = state_override.unwrap_or_else(|| settings.storage.state_path());
        Self {
            settings,
            store: StateStore::new(path),
        }
    }

    /// A controller without a background writer, restored from the state file
    pub async fn offline_controller(&self) -> Result<Controller> {
        let controller = Controller::new(
            Arc::new(self.http_client()?),
            self.settings.profile_table(),
            self.settings.controller.clone(),
        );
        controller.restore(self.store.load()?).await;
        Ok(controller)
    }

    /// Write an offline controller's devices back to the state file
    pub async fn commit(&self, controller: &Controller) -> Result<()> {
        self.store.save(&controller.snapshot().await)
    }

    pub fn http_client(&self) -> Result<HttpDevice> {
        HttpDevice::new(
            self.settings.controller.telemetry_timeout(),
            self.settings.controller.write_timeout(),
        )
    }
}
