// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Template-to-template transitions limited to the recorded upgrade allow-list.

use crate::error::{FleetError, Policy, Result};
use crate::types::ClusterDeployment;

/// Warning text returned alongside a forbidden upgrade
pub fn forbidden_upgrade_warning(from: &str, to: &str) -> String {
    format!(
        "Cluster can't be upgraded from {} to {}. This upgrade sequence is not allowed",
        from, to
    )
}

/// A template change is only allowed towards a template listed in the old
/// object's `status.availableUpgrades`. Unchanged templates always pass.
pub fn validate_upgrade_path(old: &ClusterDeployment, new: &ClusterDeployment) -> Result<()> {
    let from = old.spec.template.as_str();
    let to = new.spec.template.as_str();

    if from == to || old.available_upgrades().iter().any(|t| t == to) {
        return Ok(());
    }

    Err(FleetError::policy(Policy::UpgradePath, "cluster upgrade is forbidden"))
}
