// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tuning state persistence
//!
//! Learned limits, fault history and control counters survive restarts in a
//! single versioned JSON file.

pub mod schema;
pub mod store;
pub mod writer;

pub use schema::{PersistedDevice, StateFile, STATE_VERSION};
pub use store::StateStore;
pub use writer::PersistHandle;
