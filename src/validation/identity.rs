// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential to infrastructure provider identity matching.

use crate::catalog::ProviderCatalog;
use crate::constants::providers::{INFRA_PREFIX, INTERNAL, SECRET_KIND};
use crate::error::{FleetError, Policy, Result};
use crate::types::{ClusterTemplate, Credential};
use kube::ResourceExt;

/// The template must declare at least one infrastructure provider.
pub fn check_template_providers(template: &ClusterTemplate) -> Result<()> {
    let providers = template.providers();
    if providers.is_empty() {
        return Err(FleetError::Invalid(format!(
            "template {:?} has no providers defined",
            template.name_any()
        )));
    }

    if !providers.iter().any(|p| p.starts_with(INFRA_PREFIX)) {
        return Err(FleetError::Invalid(format!(
            "template {:?} has no infrastructure providers defined",
            template.name_any()
        )));
    }

    Ok(())
}

/// The credential must be Ready and its identity kind accepted by every
/// infrastructure provider of the template, checked in declaration order.
pub fn match_credential(
    credential: &Credential,
    template: &ClusterTemplate,
    catalog: &ProviderCatalog,
) -> Result<()> {
    check_template_providers(template)?;

    if !credential.is_ready() {
        return Err(FleetError::Invalid("credential is not Ready".to_string()));
    }

    let kind = credential.identity_kind();
    let wrong_kind = |provider: &str| {
        FleetError::policy(
            Policy::IdentityKind,
            format!(
                "wrong kind of the ClusterIdentity {:?} for provider {:?}",
                kind, provider
            ),
        )
    };

    for provider in template.infrastructure_providers() {
        if provider == INTERNAL {
            if kind != SECRET_KIND {
                return Err(wrong_kind(provider));
            }
            continue;
        }

        let Some(accepted) = catalog.identity_kinds(provider) else {
            return Err(FleetError::policy(
                Policy::SupportedProvider,
                format!("unsupported infrastructure provider {}", provider),
            ));
        };

        if !accepted.contains(kind) {
            return Err(wrong_kind(provider));
        }
    }

    Ok(())
}
