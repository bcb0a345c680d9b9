// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission of ClusterDeployment create/update/delete requests.
//!
//! Each entry point reads the referenced objects once into an
//! [`AdmissionSnapshot`] and then runs the pure checks from
//! [`orchestrator`] over it, so a decision is reproducible from its snapshot.

pub mod defaults;
pub mod orchestrator;
pub mod review;
pub mod server;

use crate::catalog::ProviderCatalog;
use crate::config::{Config, CrossNamespacePolicy};
use crate::error::FleetError;
use crate::kubernetes::{AdmissionSnapshot, Resolver};
use crate::types::{ClusterDeployment, ClusterTemplate};
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub use orchestrator::{evaluate_create, evaluate_update};

/// The rule a rejected request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Request,
    Fetch,
    TemplateResolvable,
    TemplateValid,
    K8sCompatibility,
    Credential,
    CrossNamespace,
    ServiceTemplates,
    Config,
    UpgradePath,
    DefaultTemplate,
    DefaultTemplateValid,
}

/// A refused request: the failing rule, why it failed, and advisory warnings
#[derive(Debug)]
pub struct Rejection {
    pub check: Check,
    pub error: FleetError,
    pub warnings: Vec<String>,
}

impl Rejection {
    pub fn new(check: Check, error: FleetError) -> Self {
        Self {
            check,
            error,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// The system failed, rather than the request being wrong
    pub fn is_internal(&self) -> bool {
        !self.error.is_rejection()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.check {
            Check::Request | Check::UpgradePath => write!(f, "{}", self.error),
            Check::Fetch => write!(f, "failed to read referenced objects: {}", self.error),
            Check::K8sCompatibility => {
                write!(f, "failed to validate k8s compatibility: {}", self.error)
            }
            Check::DefaultTemplate => write!(
                f,
                "could not get template for the clusterDeployment: {}",
                self.error
            ),
            Check::DefaultTemplateValid => write!(f, "template is invalid: {}", self.error),
            _ => write!(f, "the ClusterDeployment is invalid: {}", self.error),
        }
    }
}

impl std::error::Error for Rejection {}

/// Accepted requests carry advisory warnings, refused ones a [`Rejection`]
pub type Verdict = std::result::Result<Vec<String>, Rejection>;

/// Admission knobs taken from configuration
#[derive(Debug, Clone, Default)]
pub struct AdmissionPolicy {
    pub validate_upgrade_path: bool,
    pub cross_namespace: CrossNamespacePolicy,
}

impl From<&Config> for AdmissionPolicy {
    fn from(config: &Config) -> Self {
        Self {
            validate_upgrade_path: config.validate_upgrade_path,
            cross_namespace: config.cross_namespace.clone(),
        }
    }
}

/// Admission entry points backed by the cluster
pub struct Admission {
    resolver: Resolver,
    catalog: Arc<ProviderCatalog>,
    policy: AdmissionPolicy,
}

impl Admission {
    pub fn new(resolver: Resolver, catalog: Arc<ProviderCatalog>, policy: AdmissionPolicy) -> Self {
        Self {
            resolver,
            catalog,
            policy,
        }
    }

    async fn snapshot(&self, deployment: &ClusterDeployment) -> Result<AdmissionSnapshot, Rejection> {
        self.resolver.snapshot(deployment).await.map_err(|e| {
            warn!("Failed to read objects referenced by {}: {}", deployment.key(), e);
            Rejection::new(Check::Fetch, e)
        })
    }

    #[instrument(skip(self, deployment), fields(deployment = %deployment.key()))]
    pub async fn on_create(&self, deployment: &ClusterDeployment) -> Verdict {
        let snapshot = self.snapshot(deployment).await?;
        let verdict = evaluate_create(deployment, &snapshot, &self.catalog, &self.policy);
        log_verdict("create", &verdict);
        verdict
    }

    #[instrument(skip(self, old, new), fields(deployment = %new.key()))]
    pub async fn on_update(&self, old: &ClusterDeployment, new: &ClusterDeployment) -> Verdict {
        let snapshot = self.snapshot(new).await?;
        let verdict = evaluate_update(old, new, &snapshot, &self.catalog, &self.policy);
        log_verdict("update", &verdict);
        verdict
    }

    pub fn on_delete(&self, _deployment: &ClusterDeployment) -> Verdict {
        Ok(Vec::new())
    }

    /// Fill in the template's default config; returns the deployment unchanged when nothing applies
    #[instrument(skip(self, deployment), fields(deployment = %deployment.key()))]
    pub async fn on_default(&self, deployment: &ClusterDeployment) -> Result<ClusterDeployment, Rejection> {
        if !defaults::needs_defaults(deployment) {
            return Ok(deployment.clone());
        }

        let namespace = deployment.namespace().unwrap_or_default();
        let template: ClusterTemplate = self
            .resolver
            .resolve(&namespace, &deployment.spec.template)
            .await
            .map_err(|e| Rejection::new(Check::DefaultTemplate, e))?;

        defaults::apply_defaults(deployment, &template)
            .map_err(|e| Rejection::new(Check::DefaultTemplateValid, e))
    }
}

fn log_verdict(operation: &str, verdict: &Verdict) {
    match verdict {
        Ok(_) => info!("Admitted ClusterDeployment {}", operation),
        Err(rejection) if rejection.is_internal() => {
            warn!("Failed to evaluate ClusterDeployment {}: {}", operation, rejection)
        }
        Err(rejection) => info!("Rejected ClusterDeployment {}: {}", operation, rejection),
    }
}
