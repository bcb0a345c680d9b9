// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources managed and read by fleetgate.

pub mod condition;
pub mod credential;
pub mod deployment;
pub mod template;

pub use condition::Condition;
pub use credential::Credential;
pub use deployment::{ClusterDeployment, DeploymentPhase};
pub use template::{ClusterTemplate, ClusterTemplateChain, ServiceTemplate, TemplateValidity};
