// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses and building fixtures.

use crate::types::credential::{CredentialSpec, CredentialStatus, IdentityRef};
use crate::types::deployment::{ClusterDeploymentSpec, Service, ServiceSpec};
use crate::types::template::{
    ClusterTemplateSpec, ClusterTemplateStatus, ServiceTemplateSpec, ServiceTemplateStatus,
    TemplateStatusCommon,
};
use crate::types::{ClusterDeployment, ClusterTemplate, Credential, ServiceTemplate};
use http::{Request, Response};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service as TowerService;

/// Path prefix of the fleetgate API group
pub const API_PREFIX: &str = "/apis/fleetgate.io/v1alpha1";

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for requests with the given method matching the path
    pub fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Method and path of every request received so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received with the given method
    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|(m, _)| m == method).count()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Try prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl TowerService<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));
        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("resource", &path)));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a 409 conflict response
pub fn conflict_json(name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("Operation cannot be fulfilled on clusterdeployments \"{}\": the object has been modified", name),
        "reason": "Conflict",
        "code": 409
    })
    .to_string()
}

pub fn make_service(name: &str, template: &str, disable: bool) -> Service {
    Service {
        name: name.to_string(),
        template: template.to_string(),
        namespace: None,
        disable,
    }
}

/// A deployment `team-a/prod-eu` bound to credential `aws-cred`
pub fn make_deployment(template: &str, services: Vec<Service>) -> ClusterDeployment {
    ClusterDeployment {
        metadata: ObjectMeta {
            name: Some("prod-eu".to_string()),
            namespace: Some("team-a".to_string()),
            generation: Some(1),
            resource_version: Some("100".to_string()),
            ..Default::default()
        },
        spec: ClusterDeploymentSpec {
            template: template.to_string(),
            credential: "aws-cred".to_string(),
            service_spec: ServiceSpec { services },
            ..Default::default()
        },
        status: None,
    }
}

pub fn make_cluster_template(name: &str, valid: bool, version: &str, providers: &[&str]) -> ClusterTemplate {
    ClusterTemplate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("team-a".to_string()),
            ..Default::default()
        },
        spec: ClusterTemplateSpec::default(),
        status: Some(ClusterTemplateStatus {
            common: TemplateStatusCommon {
                valid,
                validation_error: if valid { String::new() } else { "chart not found".to_string() },
                config: None,
                providers: providers.iter().map(|p| p.to_string()).collect(),
            },
            kubernetes_version: version.to_string(),
        }),
    }
}

pub fn make_service_template(name: &str, valid: bool, constraint: &str) -> ServiceTemplate {
    ServiceTemplate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("team-a".to_string()),
            ..Default::default()
        },
        spec: ServiceTemplateSpec::default(),
        status: Some(ServiceTemplateStatus {
            common: TemplateStatusCommon {
                valid,
                ..Default::default()
            },
            kubernetes_constraint: constraint.to_string(),
        }),
    }
}

pub fn make_credential(name: &str, identity_kind: &str, ready: bool) -> Credential {
    Credential {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("team-a".to_string()),
            ..Default::default()
        },
        spec: CredentialSpec {
            identity_ref: IdentityRef {
                api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
                kind: identity_kind.to_string(),
                name: format!("{}-identity", name),
                namespace: None,
            },
            description: None,
        },
        status: Some(CredentialStatus { ready, error: None }),
    }
}

fn with_types(mut value: serde_json::Value, kind: &str) -> String {
    value["apiVersion"] = "fleetgate.io/v1alpha1".into();
    value["kind"] = kind.into();
    value.to_string()
}

pub fn deployment_json(deployment: &ClusterDeployment) -> String {
    with_types(serde_json::to_value(deployment).unwrap(), "ClusterDeployment")
}

pub fn cluster_template_json(name: &str, valid: bool, version: &str, providers: &[&str]) -> String {
    let mut template = make_cluster_template(name, valid, version, providers);
    template.spec.helm.chart_ref = Some(crate::types::template::ChartRef {
        kind: "HelmChart".to_string(),
        name: name.to_string(),
        namespace: None,
    });
    with_types(serde_json::to_value(template).unwrap(), "ClusterTemplate")
}

pub fn service_template_json(name: &str, valid: bool, constraint: &str) -> String {
    with_types(
        serde_json::to_value(make_service_template(name, valid, constraint)).unwrap(),
        "ServiceTemplate",
    )
}

pub fn credential_json(name: &str, identity_kind: &str, ready: bool) -> String {
    with_types(
        serde_json::to_value(make_credential(name, identity_kind, ready)).unwrap(),
        "Credential",
    )
}
