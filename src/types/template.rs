// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::providers::INFRA_PREFIX;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Location of the packaged chart a template renders from
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_ref: Option<ChartRef>,
}

/// Status fields shared by cluster and service templates
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStatusCommon {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub validation_error: String,
    /// Default configuration handed to deployments that bring none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub providers: Vec<String>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "fleetgate.io", version = "v1alpha1", kind = "ClusterTemplate")]
#[kube(namespaced)]
#[kube(status = "ClusterTemplateStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateSpec {
    #[serde(default)]
    pub helm: HelmSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateStatus {
    #[serde(flatten)]
    pub common: TemplateStatusCommon,
    /// Kubernetes version the rendered cluster runs
    #[serde(rename = "k8sVersion", default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "fleetgate.io", version = "v1alpha1", kind = "ServiceTemplate")]
#[kube(namespaced)]
#[kube(status = "ServiceTemplateStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplateSpec {
    #[serde(default)]
    pub helm: HelmSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplateStatus {
    #[serde(flatten)]
    pub common: TemplateStatusCommon,
    /// Version range of Kubernetes the service supports, e.g. `>=1.28.0 <1.30.0`
    #[serde(rename = "k8sConstraint", default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_constraint: String,
}

/// Upgrade allow-list for a set of cluster templates
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "fleetgate.io", version = "v1alpha1", kind = "ClusterTemplateChain")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTemplateChainSpec {
    #[serde(default)]
    pub supported_templates: Vec<SupportedTemplate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportedTemplate {
    pub name: String,
    #[serde(default)]
    pub available_upgrades: Vec<AvailableUpgrade>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct AvailableUpgrade {
    pub name: String,
}

/// Validity as reported by the template's own validation
pub trait TemplateValidity {
    fn common_status(&self) -> Option<&TemplateStatusCommon>;

    fn is_valid(&self) -> bool {
        self.common_status().is_some_and(|s| s.valid)
    }

    fn validation_error(&self) -> &str {
        self.common_status()
            .map(|s| s.validation_error.as_str())
            .unwrap_or_default()
    }
}

impl TemplateValidity for ClusterTemplate {
    fn common_status(&self) -> Option<&TemplateStatusCommon> {
        self.status.as_ref().map(|s| &s.common)
    }
}

impl TemplateValidity for ServiceTemplate {
    fn common_status(&self) -> Option<&TemplateStatusCommon> {
        self.status.as_ref().map(|s| &s.common)
    }
}

impl ClusterTemplate {
    pub fn kubernetes_version(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.kubernetes_version.as_str())
            .unwrap_or_default()
    }

    pub fn providers(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|s| s.common.providers.as_slice())
            .unwrap_or_default()
    }

    /// Short names of the infrastructure providers, in declaration order
    pub fn infrastructure_providers(&self) -> impl Iterator<Item = &str> {
        self.providers()
            .iter()
            .filter_map(|p| p.strip_prefix(INFRA_PREFIX))
    }

    pub fn default_config(&self) -> Option<&serde_json::Value> {
        self.status.as_ref().and_then(|s| s.common.config.as_ref())
    }
}

impl ServiceTemplate {
    pub fn kubernetes_constraint(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.kubernetes_constraint.as_str())
            .unwrap_or_default()
    }
}

impl ClusterTemplateChain {
    /// Templates the chain allows moving to from `template`
    pub fn upgrades_from<'a>(&'a self, template: &'a str) -> impl Iterator<Item = &'a str> {
        self.spec
            .supported_templates
            .iter()
            .filter(move |t| t.name == template)
            .flat_map(|t| t.available_upgrades.iter().map(|u| u.name.as_str()))
    }
}
