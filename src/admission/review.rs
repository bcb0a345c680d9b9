// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `admission.k8s.io/v1` AdmissionReview handling for the ClusterDeployment webhooks.

use super::{defaults, Admission, Check, Rejection, Verdict};
use crate::constants::API_GROUP;
use crate::error::{FleetError, Result};
use crate::types::ClusterDeployment;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::{DynamicObject, GroupVersionKind, Status};
use tracing::{debug, info};

/// The review type exchanged with the API server
pub type Review = AdmissionReview<DynamicObject>;
type Request = AdmissionRequest<DynamicObject>;

/// Refuse the request answered by `response`. Malformed requests report 400,
/// rejected ones 403 and internal failures 500.
pub fn deny(response: AdmissionResponse, rejection: &Rejection) -> AdmissionResponse {
    let (code, reason) = match &rejection.error {
        FleetError::BadRequest(_) => (400, "BadRequest"),
        e if e.is_rejection() => (403, "Forbidden"),
        _ => (500, "InternalError"),
    };

    let mut response = response.deny(rejection);
    response.result = Status::failure(&rejection.to_string(), reason).with_code(code);
    if !rejection.warnings.is_empty() {
        response.warnings = Some(rejection.warnings.clone());
    }
    response
}

fn respond(request: &Request, verdict: Verdict) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    match verdict {
        Ok(warnings) => {
            if !warnings.is_empty() {
                response.warnings = Some(warnings);
            }
            response
        }
        Err(rejection) => deny(response, &rejection),
    }
}

/// The object kinds the webhooks accept, decoded once per request
#[derive(Debug, Clone)]
pub enum AdmissionObject {
    ClusterDeployment(Box<ClusterDeployment>),
}

impl AdmissionObject {
    pub fn decode(kind: &GroupVersionKind, object: &DynamicObject) -> Result<Self> {
        match (kind.group.as_str(), kind.kind.as_str()) {
            (API_GROUP, "ClusterDeployment") => {
                let deployment: ClusterDeployment = serde_json::to_value(object)
                    .and_then(serde_json::from_value)
                    .map_err(|e| FleetError::BadRequest(format!("failed to decode ClusterDeployment: {}", e)))?;
                Ok(AdmissionObject::ClusterDeployment(Box::new(deployment)))
            }
            (group, kind) => Err(FleetError::BadRequest(format!(
                "unsupported kind {}/{}",
                group, kind
            ))),
        }
    }

    pub fn into_deployment(self) -> ClusterDeployment {
        match self {
            AdmissionObject::ClusterDeployment(deployment) => *deployment,
        }
    }
}

/// Which webhook a review arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Validate,
    Mutate,
}

fn decode_field(
    request: &Request,
    object: Option<&DynamicObject>,
    field: &str,
) -> std::result::Result<ClusterDeployment, Rejection> {
    let object = object.ok_or_else(|| {
        Rejection::new(
            Check::Request,
            FleetError::BadRequest(format!("admission request has no {}", field)),
        )
    })?;
    AdmissionObject::decode(&request.kind, object)
        .map(AdmissionObject::into_deployment)
        .map_err(|e| Rejection::new(Check::Request, e))
}

async fn validate(admission: &Admission, request: &Request) -> Verdict {
    match request.operation {
        Operation::Create => {
            let deployment = decode_field(request, request.object.as_ref(), "object")?;
            admission.on_create(&deployment).await
        }
        Operation::Update => {
            let old = decode_field(request, request.old_object.as_ref(), "oldObject")?;
            let new = decode_field(request, request.object.as_ref(), "object")?;
            admission.on_update(&old, &new).await
        }
        Operation::Delete => match request.old_object.as_ref() {
            Some(old) => {
                let deployment = decode_field(request, Some(old), "oldObject")?;
                admission.on_delete(&deployment)
            }
            None => Ok(Vec::new()),
        },
        Operation::Connect => Ok(Vec::new()),
    }
}

async fn mutate(admission: &Admission, request: &Request) -> Result<AdmissionResponse> {
    let response = AdmissionResponse::from(request);
    if request.operation != Operation::Create {
        return Ok(response);
    }

    let deployment = match decode_field(request, request.object.as_ref(), "object") {
        Ok(deployment) => deployment,
        Err(rejection) => return Ok(deny(response, &rejection)),
    };

    match admission.on_default(&deployment).await {
        Ok(defaulted) => {
            let patch = defaults::default_patch(&deployment, &defaulted);
            if patch.0.is_empty() {
                return Ok(response);
            }
            info!("Defaulted ClusterDeployment {}", deployment.key());
            response
                .with_patch(patch)
                .map_err(|e| FleetError::Internal(e.to_string()))
        }
        Err(rejection) => Ok(deny(response, &rejection)),
    }
}

/// Answer one AdmissionReview. A review without a request is a bad request.
pub async fn handle_review(admission: &Admission, endpoint: Endpoint, review: Review) -> Result<Review> {
    let converted: std::result::Result<Request, _> = review.try_into();
    let request = converted.map_err(|e| FleetError::BadRequest(e.to_string()))?;

    debug!(
        "Reviewing {:?} of {}/{} ({:?})",
        request.operation,
        request.namespace.as_deref().unwrap_or_default(),
        request.name,
        endpoint
    );

    let response = match endpoint {
        Endpoint::Validate => respond(&request, validate(admission, &request).await),
        Endpoint::Mutate => mutate(admission, &request).await?,
    };

    Ok(response.into_review())
}
