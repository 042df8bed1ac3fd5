// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! State file on disk

use std::path::{Path, PathBuf};

use crate::error::{Result, TuneError};
use crate::tuning::state::DeviceState;

use super::schema::{PersistedDevice, StateFile};

/// JSON state file holding one record per tuned device
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty fleet.
    pub fn load_records(&self) -> Result<Vec<PersistedDevice>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            TuneError::Persistence(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(StateFile::decode(value)?.devices)
    }

    /// Read every record as live state
    pub fn load(&self) -> Result<Vec<DeviceState>> {
        let states: Vec<DeviceState> = self
            .load_records()?
            .into_iter()
            .map(PersistedDevice::into_state)
            .collect();
        tracing::info!(
            "Loaded tuning state for {} devices from {}",
            states.len(),
            self.path.display()
        );
        Ok(states)
    }

    /// Replace the file contents. Writes a sibling temp file and renames it
    /// over the target so readers never see a partial file.
    pub fn save_records(&self, records: &[PersistedDevice]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut records = records.to_vec();
        records.sort_by(|a, b| a.address.cmp(&b.address));

        let content = serde_json::to_string_pretty(&StateFile::new(records))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn save(&self, states: &[DeviceState]) -> Result<()> {
        let records: Vec<PersistedDevice> = states.iter().map(PersistedDevice::from).collect();
        self.save_records(&records)
    }
}
