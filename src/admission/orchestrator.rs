// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ordered admission checks over an [`AdmissionSnapshot`].
//!
//! The first failing check decides the rejection; later checks are not run.

use super::{AdmissionPolicy, Check, Rejection, Verdict};
use crate::catalog::ProviderCatalog;
use crate::constants::warnings;
use crate::error::{FleetError, Result};
use crate::kubernetes::AdmissionSnapshot;
use crate::types::{ClusterDeployment, ClusterTemplate};
use crate::validation::identity::check_template_providers;
use crate::validation::upgrade::forbidden_upgrade_warning;
use crate::validation::{
    check_compatibility, is_template_valid, match_credential, services_have_valid_templates,
    validate_service_refs, validate_upgrade_path,
};
use kube::ResourceExt;

fn reject(check: Check, result: Result<()>) -> std::result::Result<(), Rejection> {
    result.map_err(|e| Rejection::new(check, e))
}

fn require_template<'a>(
    deployment: &ClusterDeployment,
    snapshot: &'a AdmissionSnapshot,
) -> std::result::Result<&'a ClusterTemplate, Rejection> {
    snapshot.template.as_ref().ok_or_else(|| {
        Rejection::new(
            Check::TemplateResolvable,
            FleetError::not_found(
                "ClusterTemplate",
                &deployment.namespace().unwrap_or_default(),
                &deployment.spec.template,
            ),
        )
    })
}

fn check_k8s(
    deployment: &ClusterDeployment,
    template: &ClusterTemplate,
    snapshot: &AdmissionSnapshot,
) -> std::result::Result<(), Rejection> {
    check_compatibility(deployment, template.kubernetes_version(), &snapshot.service_templates)
        .map_err(|e| {
            Rejection::new(Check::K8sCompatibility, e).with_warning(warnings::K8S_COMPATIBILITY)
        })
}

fn check_credential(
    deployment: &ClusterDeployment,
    template: &ClusterTemplate,
    snapshot: &AdmissionSnapshot,
    catalog: &ProviderCatalog,
) -> Result<()> {
    check_template_providers(template)?;

    let credential = snapshot.credential.as_ref().ok_or_else(|| {
        FleetError::not_found(
            "Credential",
            &deployment.namespace().unwrap_or_default(),
            &deployment.spec.credential,
        )
    })?;

    match_credential(credential, template, catalog)
}

/// `spec.config` is either absent or a JSON object
pub fn check_config(deployment: &ClusterDeployment) -> Result<()> {
    match &deployment.spec.config {
        None | Some(serde_json::Value::Object(_)) => Ok(()),
        Some(_) => Err(FleetError::Invalid(
            "spec.config must be a JSON object".to_string(),
        )),
    }
}

/// Checks shared by create and update once the template is settled
fn check_bindings(
    deployment: &ClusterDeployment,
    template: &ClusterTemplate,
    snapshot: &AdmissionSnapshot,
    catalog: &ProviderCatalog,
    policy: &AdmissionPolicy,
) -> std::result::Result<(), Rejection> {
    let namespace = deployment.namespace().unwrap_or_default();

    reject(
        Check::Credential,
        check_credential(deployment, template, snapshot, catalog),
    )?;
    reject(
        Check::CrossNamespace,
        validate_service_refs(deployment, &policy.cross_namespace),
    )?;
    reject(
        Check::ServiceTemplates,
        services_have_valid_templates(
            &deployment.spec.service_spec.services,
            &namespace,
            &snapshot.service_templates,
        ),
    )?;
    reject(Check::Config, check_config(deployment))
}

/// Decide a create request
pub fn evaluate_create(
    deployment: &ClusterDeployment,
    snapshot: &AdmissionSnapshot,
    catalog: &ProviderCatalog,
    policy: &AdmissionPolicy,
) -> Verdict {
    let template = require_template(deployment, snapshot)?;
    reject(Check::TemplateValid, is_template_valid(template))?;
    check_k8s(deployment, template, snapshot)?;
    check_bindings(deployment, template, snapshot, catalog, policy)?;

    Ok(Vec::new())
}

/// Decide an update request. Template validity and compatibility are only
/// re-checked when the template changes.
pub fn evaluate_update(
    old: &ClusterDeployment,
    new: &ClusterDeployment,
    snapshot: &AdmissionSnapshot,
    catalog: &ProviderCatalog,
    policy: &AdmissionPolicy,
) -> Verdict {
    let template = require_template(new, snapshot)?;

    if old.spec.template != new.spec.template {
        if policy.validate_upgrade_path {
            validate_upgrade_path(old, new).map_err(|e| {
                Rejection::new(Check::UpgradePath, e).with_warning(forbidden_upgrade_warning(
                    &old.spec.template,
                    &new.spec.template,
                ))
            })?;
        }

        reject(Check::TemplateValid, is_template_valid(template))?;
        check_k8s(new, template, snapshot)?;
    }

    check_bindings(new, template, snapshot, catalog, policy)?;

    Ok(Vec::new())
}
