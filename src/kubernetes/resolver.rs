// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Point reads of templates and credentials, and the per-request admission snapshot.

use crate::error::{FleetError, Result};
use crate::types::{ClusterDeployment, ClusterTemplate, ClusterTemplateChain, Credential, ServiceTemplate};
use kube::{api::ListParams, core::NamespaceResourceScope, Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Everything an admission decision reads, fetched once per request.
/// Absent objects are `None` (or missing from the map) so checks can reject them in order.
#[derive(Debug, Clone, Default)]
pub struct AdmissionSnapshot {
    pub template: Option<ClusterTemplate>,
    pub credential: Option<Credential>,
    /// ServiceTemplates keyed by name; names that do not exist are left out
    pub service_templates: BTreeMap<String, ServiceTemplate>,
}

#[derive(Clone)]
pub struct Resolver {
    client: Client,
}

impl Resolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Read a namespaced object, `None` when it does not exist.
    /// Store errors are returned as-is, nothing is retried.
    pub async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        if name.is_empty() {
            return Ok(None);
        }
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    /// Read a namespaced object, failing with `NotFound` when it does not exist
    pub async fn resolve<K>(&self, namespace: &str, name: &str) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        self.get_opt(namespace, name)
            .await?
            .ok_or_else(|| FleetError::not_found(&K::kind(&()), namespace, name))
    }

    /// Take the snapshot of referenced objects for one admission decision
    #[instrument(skip(self, deployment), fields(deployment = %deployment.key()))]
    pub async fn snapshot(&self, deployment: &ClusterDeployment) -> Result<AdmissionSnapshot> {
        let namespace = deployment.namespace().unwrap_or_default();

        let template = self
            .get_opt::<ClusterTemplate>(&namespace, &deployment.spec.template)
            .await?;
        let credential = self
            .get_opt::<Credential>(&namespace, &deployment.spec.credential)
            .await?;

        let mut service_templates = BTreeMap::new();
        for service in &deployment.spec.service_spec.services {
            if service_templates.contains_key(&service.template) {
                continue;
            }
            if let Some(tpl) = self
                .get_opt::<ServiceTemplate>(&namespace, &service.template)
                .await?
            {
                service_templates.insert(service.template.clone(), tpl);
            }
        }

        debug!(
            "Snapshot taken: template found={}, credential found={}, {} service templates",
            template.is_some(),
            credential.is_some(),
            service_templates.len()
        );

        Ok(AdmissionSnapshot {
            template,
            credential,
            service_templates,
        })
    }

    /// Template chains declared in a namespace
    pub async fn template_chains(&self, namespace: &str) -> Result<Vec<ClusterTemplateChain>> {
        let api: Api<ClusterTemplateChain> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    /// Templates the chains in `namespace` allow moving to from `template`,
    /// keeping only those that exist and are valid
    pub async fn available_upgrades(&self, namespace: &str, template: &str) -> Result<Vec<String>> {
        use crate::types::TemplateValidity;

        let mut candidates: Vec<String> = Vec::new();
        for chain in self.template_chains(namespace).await? {
            for upgrade in chain.upgrades_from(template) {
                if !candidates.iter().any(|c| c == upgrade) {
                    candidates.push(upgrade.to_string());
                }
            }
        }

        let mut upgrades = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let target = self.get_opt::<ClusterTemplate>(namespace, &candidate).await?;
            if target.is_some_and(|t| t.is_valid()) {
                upgrades.push(candidate);
            }
        }

        Ok(upgrades)
    }
}
