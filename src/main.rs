// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleetgate::admission::server::WebhookServer;
use fleetgate::admission::{Admission, AdmissionPolicy};
use fleetgate::catalog::ProviderCatalog;
use fleetgate::config::Config;
use fleetgate::kubernetes::{wait_for_crd, HelmReleaseRenderer, Resolver};
use fleetgate::reconcilers::DeploymentReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting fleetgate");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: webhook_port={}, tls={}, validate_upgrade_path={}",
        config.webhook_port,
        config.tls.is_some(),
        config.validate_upgrade_path
    );

    let catalog = Arc::new(ProviderCatalog::load(config.provider_catalog.as_deref())?);

    // Create Kubernetes client
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    // Rendered resources are HelmReleases, wait until they can be served
    info!("Waiting for HelmRelease CRD to become available...");
    wait_for_crd(&client, &HelmReleaseRenderer::gvk()).await?;

    let admission = Admission::new(
        Resolver::new(client.clone()),
        catalog,
        AdmissionPolicy::from(&config),
    );
    let server = WebhookServer::new(admission, &config);
    let reconciler = DeploymentReconciler::new(client, &config, Arc::new(HelmReleaseRenderer));

    info!("Starting webhook server and reconciler...");

    tokio::try_join!(server.run(), reconciler.run())?;

    // This should never be reached as both run forever
    warn!("Webhook server and reconciler stopped unexpectedly");
    Ok(())
}
