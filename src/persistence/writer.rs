// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Background state writer
//!
//! Control cycles hand their updated record to [`PersistHandle`] and move on.
//! The writer task keeps the latest record per device, coalesces bursts for
//! the debounce delay and rewrites the whole file. Write failures are logged
//! and never reach the caller.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::tuning::state::DeviceState;

use super::schema::PersistedDevice;
use super::store::StateStore;

enum WriteRequest {
    Upsert(Box<PersistedDevice>),
    Remove(String),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle to the writer task
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl std::fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteRequest::Upsert(record) => write!(f, "Upsert({})", record.address),
            WriteRequest::Remove(address) => write!(f, "Remove({})", address),
            WriteRequest::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl PersistHandle {
    /// Start the writer. `initial` seeds the records already on disk.
    pub fn spawn(
        store: StateStore,
        initial: Vec<PersistedDevice>,
        debounce: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let records = initial
            .into_iter()
            .map(|record| (record.address.clone(), record))
            .collect();
        let task = tokio::spawn(run_writer(store, records, debounce, rx));
        (Self { tx }, task)
    }

    /// Queue the device's current state for writing
    pub fn save(&self, state: &DeviceState) {
        self.send(WriteRequest::Upsert(Box::new(PersistedDevice::from(state))));
    }

    /// Queue removal of a device's record
    pub fn remove(&self, address: &str) {
        self.send(WriteRequest::Remove(address.to_string()));
    }

    /// Write anything pending and wait for it to land
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(WriteRequest::Flush(ack_tx));
        let _ = ack_rx.await;
    }

    fn send(&self, request: WriteRequest) {
        if let Err(e) = self.tx.send(request) {
            tracing::debug!("State writer stopped, dropping {:?}", e.0);
        }
    }
}

async fn run_writer(
    store: StateStore,
    mut records: HashMap<String, PersistedDevice>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let request = match deadline {
            Some(at) => match tokio::time::timeout_at(at, rx.recv()).await {
                Ok(request) => request,
                Err(_) => {
                    write_all(&store, &records);
                    deadline = None;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match request {
            Some(WriteRequest::Upsert(record)) => {
                records.insert(record.address.clone(), *record);
                deadline.get_or_insert_with(|| Instant::now() + debounce);
            }
            Some(WriteRequest::Remove(address)) => {
                records.remove(&address);
                deadline.get_or_insert_with(|| Instant::now() + debounce);
            }
            Some(WriteRequest::Flush(ack)) => {
                if deadline.take().is_some() {
                    write_all(&store, &records);
                }
                let _ = ack.send(());
            }
            None => {
                if deadline.is_some() {
                    write_all(&store, &records);
                }
                break;
            }
        }
    }
}

fn write_all(store: &StateStore, records: &HashMap<String, PersistedDevice>) {
    let records: Vec<PersistedDevice> = records.values().cloned().collect();
    match store.save_records(&records) {
        Ok(()) => tracing::debug!(
            "Persisted {} device records to {}",
            records.len(),
            store.path().display()
        ),
        Err(e) => tracing::error!("Failed to persist tuning state: {}", e),
    }
}
