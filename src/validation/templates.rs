// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Template validity checks.

use crate::error::{FleetError, Result};
use crate::types::deployment::Service;
use crate::types::{ServiceTemplate, TemplateValidity};
use std::collections::BTreeMap;

pub fn is_template_valid(template: &impl TemplateValidity) -> Result<()> {
    if !template.is_valid() {
        return Err(FleetError::Invalid(format!(
            "the template is not valid: {}",
            template.validation_error()
        )));
    }

    Ok(())
}

/// Every attached service, enabled or not, must reference an existing and valid ServiceTemplate.
pub fn services_have_valid_templates(
    services: &[Service],
    namespace: &str,
    service_templates: &BTreeMap<String, ServiceTemplate>,
) -> Result<()> {
    for service in services {
        let template = service_templates
            .get(&service.template)
            .ok_or_else(|| FleetError::not_found("ServiceTemplate", namespace, &service.template))?;

        if !template.is_valid() {
            return Err(FleetError::Invalid(format!(
                "the ServiceTemplate {}/{} is not valid: {}",
                namespace,
                service.template,
                template.validation_error()
            )));
        }
    }

    Ok(())
}
