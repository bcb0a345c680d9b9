// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turning a ClusterDeployment and its template into infrastructure manifests.

use crate::constants::{labels, OPERATOR_NAME};
use crate::error::{FleetError, Result};
use crate::types::{ClusterDeployment, ClusterTemplate};
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind},
    ResourceExt,
};
use std::collections::BTreeMap;

/// Renders the manifests backing a deployment. Must be a pure function of its inputs.
pub trait Renderer: Send + Sync {
    /// The kind of object this renderer produces
    fn api_resource(&self) -> ApiResource;

    fn render(&self, deployment: &ClusterDeployment, template: &ClusterTemplate) -> Result<Vec<DynamicObject>>;
}

/// Label selector matching every resource rendered for `deployment`
pub fn ownership_selector(deployment: &ClusterDeployment) -> String {
    format!(
        "{}={},{}={}",
        labels::DEPLOYMENT,
        deployment.name_any(),
        labels::DEPLOYMENT_NAMESPACE,
        deployment.namespace().unwrap_or_default()
    )
}

fn ownership_labels(deployment: &ClusterDeployment) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::DEPLOYMENT.to_string(), deployment.name_any()),
        (
            labels::DEPLOYMENT_NAMESPACE.to_string(),
            deployment.namespace().unwrap_or_default(),
        ),
        (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
    ])
}

/// Renders one Flux HelmRelease per deployment, valued with the deployment's config.
#[derive(Debug, Clone, Default)]
pub struct HelmReleaseRenderer;

impl HelmReleaseRenderer {
    pub fn gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("helm.toolkit.fluxcd.io", "v2", "HelmRelease")
    }
}

impl Renderer for HelmReleaseRenderer {
    fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&Self::gvk())
    }

    fn render(&self, deployment: &ClusterDeployment, template: &ClusterTemplate) -> Result<Vec<DynamicObject>> {
        let name = deployment.name_any();
        let namespace = deployment.namespace().unwrap_or_default();

        let chart_ref = template.spec.helm.chart_ref.as_ref().ok_or_else(|| {
            FleetError::RenderError(format!(
                "ClusterTemplate {}/{} has no chart reference",
                namespace,
                template.name_any()
            ))
        })?;

        let values = match &deployment.spec.config {
            None => serde_json::json!({}),
            Some(config @ serde_json::Value::Object(_)) => config.clone(),
            Some(_) => {
                return Err(FleetError::Invalid(format!(
                    "config of the ClusterDeployment {} must be an object",
                    deployment.key()
                )))
            }
        };

        let mut release = DynamicObject::new(&name, &self.api_resource())
            .within(&namespace)
            .data(serde_json::json!({
                "spec": {
                    "releaseName": name,
                    "interval": "10m",
                    "chartRef": {
                        "kind": chart_ref.kind,
                        "name": chart_ref.name,
                        "namespace": chart_ref.namespace.clone().unwrap_or_else(|| namespace.clone()),
                    },
                    "values": values,
                }
            }));
        release.metadata.labels = Some(ownership_labels(deployment));

        Ok(vec![release])
    }
}

/// True when the rendered object reports `Ready=True` for its current generation.
/// A status written before the latest spec change does not count.
pub fn is_manifest_ready(object: &DynamicObject) -> bool {
    let current = |observed: &serde_json::Value| match object.metadata.generation {
        Some(generation) => observed.as_i64().is_some_and(|o| o >= generation),
        None => true,
    };

    let status = &object.data["status"];
    if !current(&status["observedGeneration"]) {
        return false;
    }

    status["conditions"].as_array().is_some_and(|conditions| {
        conditions.iter().any(|c| {
            c["type"] == "Ready"
                && c["status"] == "True"
                && (c["observedGeneration"].is_null() || current(&c["observedGeneration"]))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_cluster_template, make_deployment};
    use crate::types::template::ChartRef;

    fn template_with_chart() -> ClusterTemplate {
        let mut template = make_cluster_template("t1", true, "1.29.0", &["infrastructure-aws"]);
        template.spec.helm.chart_ref = Some(ChartRef {
            kind: "HelmChart".to_string(),
            name: "aws-standalone".to_string(),
            namespace: Some("fleetgate-system".to_string()),
        });
        template
    }

    #[test]
    fn test_render_helm_release() {
        let mut cd = make_deployment("t1", vec![]);
        cd.spec.config = Some(serde_json::json!({"region": "eu-west-1"}));

        let manifests = HelmReleaseRenderer.render(&cd, &template_with_chart()).unwrap();
        assert_eq!(manifests.len(), 1);

        let release = &manifests[0];
        assert_eq!(release.name_any(), "prod-eu");
        assert_eq!(release.namespace().as_deref(), Some("team-a"));
        assert_eq!(release.data["spec"]["values"]["region"], "eu-west-1");
        assert_eq!(release.data["spec"]["chartRef"]["name"], "aws-standalone");
        assert_eq!(release.data["spec"]["chartRef"]["namespace"], "fleetgate-system");
        assert_eq!(
            release.labels().get(labels::DEPLOYMENT).map(String::as_str),
            Some("prod-eu")
        );
    }

    #[test]
    fn test_render_without_config_uses_empty_values() {
        let cd = make_deployment("t1", vec![]);
        let manifests = HelmReleaseRenderer.render(&cd, &template_with_chart()).unwrap();
        assert_eq!(manifests[0].data["spec"]["values"], serde_json::json!({}));
    }

    #[test]
    fn test_render_is_deterministic() {
        let cd = make_deployment("t1", vec![]);
        let first = HelmReleaseRenderer.render(&cd, &template_with_chart()).unwrap();
        let second = HelmReleaseRenderer.render(&cd, &template_with_chart()).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn test_render_rejects_non_object_config() {
        let mut cd = make_deployment("t1", vec![]);
        cd.spec.config = Some(serde_json::json!(["not", "an", "object"]));

        let err = HelmReleaseRenderer.render(&cd, &template_with_chart()).unwrap_err();
        assert!(matches!(err, FleetError::Invalid(_)));
    }

    #[test]
    fn test_render_without_chart_ref_fails() {
        let cd = make_deployment("t1", vec![]);
        let template = make_cluster_template("t1", true, "1.29.0", &["infrastructure-aws"]);

        let err = HelmReleaseRenderer.render(&cd, &template).unwrap_err();
        assert!(matches!(err, FleetError::RenderError(_)));
    }

    #[test]
    fn test_ownership_selector() {
        let cd = make_deployment("t1", vec![]);
        assert_eq!(
            ownership_selector(&cd),
            "fleetgate.io/deployment=prod-eu,fleetgate.io/deployment-namespace=team-a"
        );
    }

    #[test]
    fn test_is_manifest_ready() {
        let ar = HelmReleaseRenderer.api_resource();
        let ready = DynamicObject::new("r", &ar).data(serde_json::json!({
            "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        }));
        let pending = DynamicObject::new("r", &ar).data(serde_json::json!({
            "status": {"conditions": [{"type": "Ready", "status": "Unknown"}]}
        }));
        let fresh = DynamicObject::new("r", &ar);

        assert!(is_manifest_ready(&ready));
        assert!(!is_manifest_ready(&pending));
        assert!(!is_manifest_ready(&fresh));
    }

    fn release(generation: i64, observed: serde_json::Value, condition_generation: serde_json::Value) -> DynamicObject {
        let mut object = DynamicObject::new("r", &HelmReleaseRenderer.api_resource()).data(serde_json::json!({
            "status": {
                "observedGeneration": observed,
                "conditions": [{"type": "Ready", "status": "True", "observedGeneration": condition_generation}]
            }
        }));
        object.metadata.generation = Some(generation);
        object
    }

    #[test]
    fn test_stale_ready_is_not_ready() {
        use serde_json::{json, Value};

        assert!(is_manifest_ready(&release(2, json!(2), json!(2))));
        assert!(is_manifest_ready(&release(2, json!(2), Value::Null)));
        // controller has not seen the applied spec yet
        assert!(!is_manifest_ready(&release(2, json!(1), json!(1))));
        assert!(!is_manifest_ready(&release(2, json!(1), Value::Null)));
        assert!(!is_manifest_ready(&release(2, Value::Null, Value::Null)));
        assert!(!is_manifest_ready(&release(2, json!(2), json!(1))));
    }
}
