// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::FINALIZER;
use crate::types::condition::Condition;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "fleetgate.io", version = "v1alpha1", kind = "ClusterDeployment")]
#[kube(namespaced)]
#[kube(status = "ClusterDeploymentStatus")]
#[kube(shortname = "cld")]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// ClusterTemplate name in the deployment's namespace
    #[serde(default)]
    pub template: String,
    /// Credential name in the deployment's namespace
    #[serde(default)]
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub service_spec: ServiceSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub services: Vec<Service>,
}

/// An add-on service attached to the deployment
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    /// ServiceTemplate name in the deployment's namespace
    pub template: String,
    /// Namespace the service targets, the deployment's namespace when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub disable: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum DeploymentPhase {
    #[default]
    Pending,
    Provisioning,
    Ready,
    Upgrading,
    Terminating,
    Deleted,
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentStatus {
    /// Templates this deployment may be moved to
    #[serde(default)]
    pub available_upgrades: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<DeploymentPhase>,
    /// Template whose rendered resources last became healthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_template: Option<String>,
    #[serde(rename = "k8sVersion", skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ClusterDeployment {
    /// `namespace/name` identity of this deployment
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Services that are not disabled, in declaration order
    pub fn enabled_services(&self) -> impl Iterator<Item = &Service> {
        self.spec.service_spec.services.iter().filter(|s| !s.disable)
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn phase(&self) -> DeploymentPhase {
        self.status
            .as_ref()
            .and_then(|s| s.phase)
            .unwrap_or_default()
    }

    pub fn available_upgrades(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|s| s.available_upgrades.as_slice())
            .unwrap_or_default()
    }

    pub fn current_template(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.current_template.as_deref())
    }

    /// True once the reconciler has acted on the latest spec generation
    pub fn is_generation_observed(&self) -> bool {
        let observed = self.status.as_ref().and_then(|s| s.observed_generation);
        observed.is_some() && observed == self.metadata.generation
    }
}
