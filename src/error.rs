// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for axetune
//!
//! Every error is scoped to a single device or a single user request; nothing
//! here is fatal to the controller loop.

use thiserror::Error;

/// Main error type for axetune operations
#[derive(Error, Debug)]
pub enum TuneError {
    /// Device transport errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// A request was rejected before touching any state
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The device is not under tuning
    #[error("Device not tuned: {0}")]
    UnknownDevice(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// State file errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Transport-level failures talking to a device
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device did not answer within the bounded timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection refused, reset, or unreachable
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The device answered with a non-success status
    #[error("Device returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The body could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeviceError::Timeout
        } else if err.is_decode() {
            DeviceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            DeviceError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            DeviceError::Connection(err.to_string())
        }
    }
}

/// Result type alias for axetune operations
pub type Result<T> = std::result::Result<T, TuneError>;
