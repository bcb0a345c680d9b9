// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace isolation for service attachments.

use crate::config::CrossNamespacePolicy;
use crate::error::{FleetError, Policy, Result};
use crate::types::ClusterDeployment;
use kube::ResourceExt;

/// Services may only target a foreign namespace the policy allows.
pub fn validate_service_refs(deployment: &ClusterDeployment, policy: &CrossNamespacePolicy) -> Result<()> {
    let own_namespace = deployment.namespace().unwrap_or_default();

    for service in &deployment.spec.service_spec.services {
        let Some(target) = service.namespace.as_deref() else {
            continue;
        };
        if target.is_empty() || target == own_namespace || policy.allows(target) {
            continue;
        }

        return Err(FleetError::policy(
            Policy::CrossNamespace,
            format!(
                "service {:?} references namespace {:?} which differs from the ClusterDeployment namespace {:?}",
                service.name, target, own_namespace
            ),
        ));
    }

    Ok(())
}
