// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure checks run by admission. Each takes the objects it needs explicitly
//! and never reads from the cluster.

pub mod compatibility;
pub mod identity;
pub mod references;
pub mod templates;
pub mod upgrade;

pub use compatibility::check_compatibility;
pub use identity::match_credential;
pub use references::validate_service_refs;
pub use templates::{is_template_valid, services_have_valid_templates};
pub use upgrade::validate_upgrade_path;
