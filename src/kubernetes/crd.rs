// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use kube::{api::GroupVersionKind, discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the given kind to be served by the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crd(client: &Client, gvk: &GroupVersionKind) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;
    let crd_name = format!("{} ({}/{})", gvk.kind, gvk.group, gvk.version);

    loop {
        match check_crd_exists(client, gvk).await {
            Ok(true) => {
                info!("CRD {} is available", crd_name);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "CRD {} not yet available, waiting {} seconds...",
                    crd_name, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for CRD {}: {}, retrying in {} seconds...",
                    crd_name, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn check_crd_exists(client: &Client, gvk: &GroupVersionKind) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[gvk.group.as_str()])
        .run()
        .await?;

    let served = discovery
        .groups()
        .filter(|group| group.name() == gvk.group)
        .flat_map(|group| group.recommended_resources())
        .any(|(ar, _)| ar.kind == gvk.kind && ar.version == gvk.version);
    Ok(served)
}
