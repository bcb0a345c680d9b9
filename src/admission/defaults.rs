// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use crate::types::{ClusterDeployment, ClusterTemplate};
use crate::validation::is_template_valid;
use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation};
use serde_json::Value;

/// Defaulting only acts on deployments without a config that name a template
pub fn needs_defaults(deployment: &ClusterDeployment) -> bool {
    deployment.spec.config.is_none() && !deployment.spec.template.is_empty()
}

/// Copy the template's default config into the deployment and force a dry run,
/// so the user reviews the defaults before anything is provisioned.
pub fn apply_defaults(deployment: &ClusterDeployment, template: &ClusterTemplate) -> Result<ClusterDeployment> {
    let mut defaulted = deployment.clone();
    if !needs_defaults(deployment) {
        return Ok(defaulted);
    }

    is_template_valid(template)?;

    if let Some(config) = template.default_config() {
        defaulted.spec.config = Some(config.clone());
        defaulted.spec.dry_run = true;
    }

    Ok(defaulted)
}

fn add(path: [&str; 2], value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(path),
        value,
    })
}

/// JSON Patch turning `before` into `after`
pub fn default_patch(before: &ClusterDeployment, after: &ClusterDeployment) -> Patch {
    let mut ops = Vec::new();

    if before.spec.config != after.spec.config {
        if let Some(config) = &after.spec.config {
            ops.push(add(["spec", "config"], config.clone()));
        }
    }
    if before.spec.dry_run != after.spec.dry_run {
        ops.push(add(["spec", "dryRun"], Value::Bool(after.spec.dry_run)));
    }

    Patch(ops)
}
