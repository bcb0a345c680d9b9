// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes access: CRD discovery, point reads and manifest rendering.

pub mod crd;
pub mod render;
pub mod resolver;

pub use crd::wait_for_crd;
pub use render::{HelmReleaseRenderer, Renderer};
pub use resolver::{AdmissionSnapshot, Resolver};
