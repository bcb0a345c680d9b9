// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use thiserror::Error;

/// Named policies a ClusterDeployment can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    UpgradePath,
    CrossNamespace,
    IdentityKind,
    SupportedProvider,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Policy::UpgradePath => "upgrade-path",
            Policy::CrossNamespace => "cross-namespace",
            Policy::IdentityKind => "identity-kind",
            Policy::SupportedProvider => "supported-provider",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{0}")]
    Invalid(String),

    #[error(
        "k8s version {version} of the ClusterDeployment {deployment} does not satisfy constrained version {constraint} from the ServiceTemplate {service}"
    )]
    ConstraintViolation {
        deployment: String,
        service: String,
        constraint: String,
        version: String,
    },

    #[error("{message}")]
    PolicyViolation { policy: Policy, message: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Render failed: {0}")]
    RenderError(String),
}

impl FleetError {
    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        FleetError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn policy(policy: Policy, message: impl Into<String>) -> Self {
        FleetError::PolicyViolation {
            policy,
            message: message.into(),
        }
    }

    /// True when the request itself is wrong, false when the system is unhealthy.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FleetError::NotFound { .. }
                | FleetError::Invalid(_)
                | FleetError::ConstraintViolation { .. }
                | FleetError::PolicyViolation { .. }
                | FleetError::BadRequest(_)
        )
    }

    /// True when the API server refused a write because the object changed underneath us.
    pub fn is_conflict(&self) -> bool {
        matches!(self, FleetError::KubeError(kube::Error::Api(err)) if err.code == 409)
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
