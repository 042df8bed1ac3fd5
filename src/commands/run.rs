// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! The tuning loop

use std::future::Future;
use std::sync::Arc;

use crate::controller::{Controller, Scheduler};
use crate::device::DeviceClient;
use crate::error::Result;
use crate::persistence::{PersistHandle, PersistedDevice};

use super::Context;

/// Execute the run command: tune every device until Ctrl-C
pub async fn execute(ctx: &Context) -> Result<()> {
    let client = Arc::new(ctx.http_client()?);
    serve(ctx, client, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}

/// Restore persisted state, enable configured devices and run the scheduler
/// against `client` until `shutdown` resolves
pub async fn serve<F>(ctx: &Context, client: Arc<dyn DeviceClient>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let records = ctx.store.load_records()?;
    let states: Vec<_> = records
        .iter()
        .cloned()
        .map(PersistedDevice::into_state)
        .collect();

    let (persist, writer) = PersistHandle::spawn(
        ctx.store.clone(),
        records,
        ctx.settings.controller.persist_debounce(),
    );
    let controller = Controller::new(
        client,
        ctx.settings.profile_table(),
        ctx.settings.controller.clone(),
    )
    .with_persistence(persist);

    controller.restore(states).await;
    controller.seed(&ctx.settings.devices).await;
    tracing::info!(
        "Tuning {} devices, state at {}",
        controller.addresses().await.len(),
        ctx.store.path().display()
    );

    let controller = Arc::new(controller);
    Scheduler::new(Arc::clone(&controller)).run(shutdown).await;

    // Dropping the last handle closes the writer's channel
    drop(controller);
    if let Err(e) = writer.await {
        tracing::warn!("State writer ended abnormally: {}", e);
    }
    Ok(())
}
