// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::migration;
use super::Settings;

impl Settings {
    /// `settings.json` under the axetune home
    pub fn default_path() -> PathBuf {
        Self::axetune_home().join("settings.json")
    }

    /// Validated settings from `path`, or from [`Settings::default_path`]
    /// when no path is given.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);
        let settings = Self::load_from(&path)?;
        settings.validate()?;
        tracing::debug!(
            path = %path.display(),
            devices = settings.devices.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Read one settings file. A missing file yields the defaults; older
    /// layouts are migrated before decoding.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let raw: serde_json::Value = serde_json::from_str(&content)?;
        Ok(serde_json::from_value(migration::migrate_on_load(raw))?)
    }

    /// `$AXETUNE_HOME`, else `~/.axetune`
    pub fn axetune_home() -> PathBuf {
        std::env::var_os("AXETUNE_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".axetune")))
            .unwrap_or_else(|| PathBuf::from(".axetune"))
    }
}
