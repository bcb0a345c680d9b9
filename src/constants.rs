// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group served by the fleetgate custom resources
pub const API_GROUP: &str = "fleetgate.io";

/// The operator name used for server-side apply
pub const OPERATOR_NAME: &str = "fleetgate";

/// Finalizer guarding teardown of rendered resources
pub const FINALIZER: &str = "fleetgate.io/cluster-deployment";

/// Label keys stamped on every rendered resource
pub mod labels {
    pub const DEPLOYMENT: &str = "fleetgate.io/deployment";
    pub const DEPLOYMENT_NAMESPACE: &str = "fleetgate.io/deployment-namespace";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
}

/// Infrastructure provider naming
pub mod providers {
    /// Prefix distinguishing infrastructure providers from other provider kinds
    pub const INFRA_PREFIX: &str = "infrastructure-";
    /// Built-in provider that needs no cloud account
    pub const INTERNAL: &str = "internal";
    /// Identity kind accepted by the built-in provider
    pub const SECRET_KIND: &str = "Secret";
}

/// Condition types written to ClusterDeployment status
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const TEMPLATE_READY: &str = "TemplateReady";
    pub const CREDENTIAL_READY: &str = "CredentialReady";
    pub const DRY_RUN: &str = "DryRun";
}

/// Admission warning texts
pub mod warnings {
    pub const K8S_COMPATIBILITY: &str =
        "Failed to validate k8s version compatibility with ServiceTemplates";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
