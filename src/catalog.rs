// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Provider identity catalog: which identity kinds each infrastructure provider accepts.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

/// One provider as registered at startup
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRegistration {
    pub name: String,
    #[serde(default)]
    pub cluster_identity_kinds: Vec<String>,
}

/// Read-only mapping from infrastructure provider short name to accepted identity kinds.
/// Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    identity_kinds: HashMap<String, BTreeSet<String>>,
}

impl ProviderCatalog {
    pub fn from_registrations(registrations: impl IntoIterator<Item = ProviderRegistration>) -> Self {
        let mut identity_kinds: HashMap<String, BTreeSet<String>> = HashMap::new();
        for registration in registrations {
            identity_kinds
                .entry(registration.name)
                .or_default()
                .extend(registration.cluster_identity_kinds);
        }
        Self { identity_kinds }
    }

    /// Registrations for the providers shipped with fleetgate
    pub fn builtin() -> Self {
        let registration = |name: &str, kinds: &[&str]| ProviderRegistration {
            name: name.to_string(),
            cluster_identity_kinds: kinds.iter().map(|k| k.to_string()).collect(),
        };

        Self::from_registrations([
            registration(
                "aws",
                &[
                    "AWSClusterStaticIdentity",
                    "AWSClusterRoleIdentity",
                    "AWSClusterControllerIdentity",
                ],
            ),
            registration("azure", &["AzureClusterIdentity"]),
            registration("vsphere", &["VSphereClusterIdentity"]),
            registration("openstack", &["Secret"]),
            registration("gcp", &["Secret"]),
            registration("docker", &["Secret"]),
        ])
    }

    /// Parse a YAML list of provider registrations
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let registrations: Vec<ProviderRegistration> =
            serde_yaml::from_str(yaml).context("Failed to parse provider registrations")?;
        Ok(Self::from_registrations(registrations))
    }

    /// Load from the given file, or fall back to the built-in registrations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let catalog = match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read provider catalog {}", path.display()))?;
                Self::from_yaml(&yaml)?
            }
            None => Self::builtin(),
        };
        info!("Provider catalog loaded with {} providers", catalog.len());
        Ok(catalog)
    }

    /// Accepted identity kinds, `None` when the provider is unknown
    pub fn identity_kinds(&self, provider: &str) -> Option<&BTreeSet<String>> {
        self.identity_kinds.get(provider)
    }

    pub fn len(&self) -> usize {
        self.identity_kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identity_kinds.is_empty()
    }
}
