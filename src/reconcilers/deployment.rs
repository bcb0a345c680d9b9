// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ClusterDeployment reconciler - renders, applies and tears down the
//! resources backing each deployment and records its lifecycle in status.

use super::lifecycle::{plan, settle, Observation, Outcome, Step};
use crate::config::Config;
use crate::constants::{conditions, FINALIZER, OPERATOR_NAME};
use crate::error::{FleetError, Result};
use crate::kubernetes::render::{is_manifest_ready, ownership_selector};
use crate::kubernetes::{Renderer, Resolver};
use crate::types::condition::{find_condition, set_condition};
use crate::types::deployment::ClusterDeploymentStatus;
use crate::types::{ClusterDeployment, ClusterTemplate, Condition, Credential, DeploymentPhase};
use crate::validation::is_template_valid;
use futures::StreamExt;
use kube::{
    api::{DeleteParams, DynamicObject, ListParams, Patch, PatchParams},
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound for the retry delay after repeated reconcile errors
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(300);

pub struct DeploymentReconciler {
    client: Client,
    resolver: Resolver,
    renderer: Arc<dyn Renderer>,
    requeue_interval: Duration,
    teardown_poll_interval: Duration,
    /// Consecutive reconcile errors per deployment key
    failures: Mutex<HashMap<String, u32>>,
}

impl DeploymentReconciler {
    pub fn new(client: Client, config: &Config, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            resolver: Resolver::new(client.clone()),
            client,
            renderer,
            requeue_interval: config.requeue_interval,
            teardown_poll_interval: config.teardown_poll_interval,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Delay before retrying a failed deployment, doubling per consecutive error
    fn error_backoff(&self, deployment: &ClusterDeployment) -> Duration {
        let attempts = match self.failures.lock() {
            Ok(mut failures) => {
                let attempts = failures.entry(deployment.key()).or_insert(0);
                *attempts = attempts.saturating_add(1);
                *attempts
            }
            Err(_) => 1,
        };
        let factor = 2u32.saturating_pow((attempts - 1).min(16));
        self.requeue_interval.saturating_mul(factor).min(MAX_ERROR_BACKOFF)
    }

    fn clear_backoff(&self, deployment: &ClusterDeployment) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(&deployment.key());
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let deployments: Api<ClusterDeployment> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(deployments, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled ClusterDeployment: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    fn deployments(&self, namespace: &str) -> Api<ClusterDeployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn rendered(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.renderer.api_resource())
    }

    /// Run one lifecycle step. Write conflicts requeue immediately.
    #[instrument(skip(self, deployment), fields(deployment = %deployment.key()))]
    pub async fn reconcile_deployment(&self, deployment: &ClusterDeployment) -> Result<Outcome> {
        let step = plan(&Observation::of(deployment));
        debug!("Planned {:?} in phase {}", step, deployment.phase());

        let outcome = match step {
            Step::AwaitChange => Ok(Outcome::Done),
            Step::HoldDryRun => self.hold_dry_run(deployment).await,
            Step::AttachFinalizer => self.attach_finalizer(deployment).await,
            Step::Render { upgrading } => self.render(deployment, upgrading).await,
            Step::Teardown => self.teardown(deployment).await,
        };

        match outcome {
            Err(e) if e.is_conflict() => {
                debug!("ClusterDeployment {} changed during reconcile, retrying", deployment.key());
                Ok(Outcome::RequeueNow)
            }
            other => other,
        }
    }

    /// Merge-patch status guarded by the observed resourceVersion. Unchanged status is not written.
    async fn write_status(
        &self,
        deployment: &ClusterDeployment,
        status: ClusterDeploymentStatus,
    ) -> Result<ClusterDeployment> {
        if deployment.status.as_ref() == Some(&status) {
            return Ok(deployment.clone());
        }

        let mut patch = json!({ "status": status });
        if let Some(rv) = deployment.resource_version() {
            patch["metadata"] = json!({ "resourceVersion": rv });
        }

        let api = self.deployments(&deployment.namespace().unwrap_or_default());
        Ok(api
            .patch_status(&deployment.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn set_finalizers(
        &self,
        deployment: &ClusterDeployment,
        finalizers: Vec<String>,
    ) -> Result<ClusterDeployment> {
        let mut metadata = json!({ "finalizers": finalizers });
        if let Some(rv) = deployment.resource_version() {
            metadata["resourceVersion"] = json!(rv);
        }

        let api = self.deployments(&deployment.namespace().unwrap_or_default());
        Ok(api
            .patch(
                &deployment.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&json!({ "metadata": metadata })),
            )
            .await?)
    }

    async fn hold_dry_run(&self, deployment: &ClusterDeployment) -> Result<Outcome> {
        let mut status = deployment.status.clone().unwrap_or_default();
        status.phase = Some(DeploymentPhase::Pending);
        status.observed_generation = deployment.metadata.generation;
        set_condition(
            &mut status.conditions,
            Condition::new(conditions::DRY_RUN, true, "DryRunEnabled", "nothing is rendered while dryRun is set"),
        );
        set_condition(
            &mut status.conditions,
            Condition::new(conditions::READY, false, "DryRun", ""),
        );

        self.write_status(deployment, status).await?;
        Ok(Outcome::Done)
    }

    async fn attach_finalizer(&self, deployment: &ClusterDeployment) -> Result<Outcome> {
        let mut finalizers = deployment.finalizers().to_vec();
        finalizers.push(FINALIZER.to_string());
        let updated = self.set_finalizers(deployment, finalizers).await?;
        info!("Added finalizer to ClusterDeployment {}", deployment.key());

        let mut status = updated.status.clone().unwrap_or_default();
        status.phase = Some(DeploymentPhase::Provisioning);
        status.conditions.retain(|c| c.condition_type != conditions::DRY_RUN);
        self.write_status(&updated, status).await?;

        Ok(Outcome::Done)
    }

    /// Record why rendering cannot proceed and try again later
    async fn stall(
        &self,
        deployment: &ClusterDeployment,
        mut status: ClusterDeploymentStatus,
        phase: DeploymentPhase,
        condition: Condition,
    ) -> Result<()> {
        warn!(
            "ClusterDeployment {} is stalled: {}",
            deployment.key(),
            condition.message.as_deref().unwrap_or_default()
        );

        let reason = condition.reason.clone().unwrap_or_default();
        let message = condition.message.clone().unwrap_or_default();
        if condition.condition_type != conditions::READY {
            set_condition(&mut status.conditions, condition);
        }
        set_condition(
            &mut status.conditions,
            Condition::new(conditions::READY, false, &reason, message).with_generation(deployment.metadata.generation),
        );
        status.phase = Some(phase);
        status.observed_generation = deployment.metadata.generation;

        self.write_status(deployment, status).await?;
        Ok(())
    }

    async fn render(&self, deployment: &ClusterDeployment, upgrading: bool) -> Result<Outcome> {
        let namespace = deployment.namespace().unwrap_or_default();
        let in_flight = settle(upgrading, false);
        let retry = Outcome::RequeueAfter(self.requeue_interval);

        let mut status = deployment.status.clone().unwrap_or_default();
        status.conditions.retain(|c| c.condition_type != conditions::DRY_RUN);

        let template = match self
            .resolver
            .resolve::<ClusterTemplate>(&namespace, &deployment.spec.template)
            .await
            .and_then(|template| is_template_valid(&template).map(|_| template))
        {
            Ok(template) => template,
            Err(e) if e.is_rejection() => {
                let condition = Condition::new(conditions::TEMPLATE_READY, false, "TemplateUnavailable", e.to_string());
                self.stall(deployment, status, in_flight, condition).await?;
                return Ok(retry);
            }
            Err(e) => return Err(e),
        };
        set_condition(
            &mut status.conditions,
            Condition::new(conditions::TEMPLATE_READY, true, "TemplateValid", ""),
        );

        let credential = self
            .resolver
            .get_opt::<Credential>(&namespace, &deployment.spec.credential)
            .await?;
        if !credential.as_ref().is_some_and(Credential::is_ready) {
            let message = match credential {
                Some(_) => "credential is not Ready".to_string(),
                None => FleetError::not_found("Credential", &namespace, &deployment.spec.credential).to_string(),
            };
            let condition = Condition::new(conditions::CREDENTIAL_READY, false, "CredentialUnavailable", message);
            self.stall(deployment, status, in_flight, condition).await?;
            return Ok(retry);
        }
        set_condition(
            &mut status.conditions,
            Condition::new(conditions::CREDENTIAL_READY, true, "CredentialReady", ""),
        );

        let manifests = match self.renderer.render(deployment, &template) {
            Ok(manifests) => manifests,
            Err(e) => {
                let condition = Condition::new(conditions::READY, false, "RenderFailed", e.to_string());
                self.stall(deployment, status, in_flight, condition).await?;
                // a malformed deployment cannot render until its spec changes
                return Ok(match e {
                    FleetError::Invalid(msg) => Outcome::Fatal(msg),
                    _ => retry,
                });
            }
        };

        let healthy = self.apply(&namespace, &manifests).await?;
        let phase = settle(upgrading, healthy);

        status.available_upgrades = self
            .resolver
            .available_upgrades(&namespace, &deployment.spec.template)
            .await?;
        let version = template.kubernetes_version();
        status.kubernetes_version = (!version.is_empty()).then(|| version.to_string());
        if healthy {
            status.current_template = Some(deployment.spec.template.clone());
            if !find_condition(&status.conditions, conditions::READY).is_some_and(Condition::is_true) {
                info!("ClusterDeployment {} became Ready", deployment.key());
            }
        }
        set_condition(
            &mut status.conditions,
            Condition::new(
                conditions::READY,
                healthy,
                &phase.to_string(),
                if healthy { "" } else { "waiting for rendered resources to become ready" },
            )
            .with_generation(deployment.metadata.generation),
        );
        status.phase = Some(phase);
        status.observed_generation = deployment.metadata.generation;

        self.write_status(deployment, status).await?;
        info!(
            "ClusterDeployment {} rendered {} resources with template {}, phase {}",
            deployment.key(),
            manifests.len(),
            deployment.spec.template,
            phase
        );

        Ok(if healthy { Outcome::Done } else { retry })
    }

    /// Server-side apply every manifest, true when all report ready
    async fn apply(&self, namespace: &str, manifests: &[DynamicObject]) -> Result<bool> {
        let api = self.rendered(namespace);
        let params = PatchParams::apply(OPERATOR_NAME).force();

        let mut healthy = true;
        for manifest in manifests {
            let applied = api
                .patch(&manifest.name_any(), &params, &Patch::Apply(manifest))
                .await?;
            healthy &= is_manifest_ready(&applied);
        }

        Ok(healthy)
    }

    async fn teardown(&self, deployment: &ClusterDeployment) -> Result<Outcome> {
        let namespace = deployment.namespace().unwrap_or_default();

        let mut status = deployment.status.clone().unwrap_or_default();
        status.phase = Some(DeploymentPhase::Terminating);
        set_condition(
            &mut status.conditions,
            Condition::new(conditions::READY, false, "Deleting", ""),
        );
        let current = self.write_status(deployment, status).await?;

        let api = self.rendered(&namespace);
        let remaining = api
            .list(&ListParams::default().labels(&ownership_selector(deployment)))
            .await?
            .items;

        if remaining.is_empty() {
            let finalizers = current
                .finalizers()
                .iter()
                .filter(|f| f.as_str() != FINALIZER)
                .cloned()
                .collect();
            self.set_finalizers(&current, finalizers).await?;
            info!("ClusterDeployment {} torn down, finalizer removed", deployment.key());
            return Ok(Outcome::Done);
        }

        for object in remaining.iter().filter(|o| o.metadata.deletion_timestamp.is_none()) {
            match api.delete(&object.name_any(), &DeleteParams::background()).await {
                Ok(_) => debug!("Deleting {} for {}", object.name_any(), deployment.key()),
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            "Waiting for {} resources of ClusterDeployment {} to be deleted",
            remaining.len(),
            deployment.key()
        );
        Ok(Outcome::RequeueAfter(self.teardown_poll_interval))
    }
}

async fn reconcile(deployment: Arc<ClusterDeployment>, ctx: Arc<DeploymentReconciler>) -> Result<Action> {
    let outcome = ctx.reconcile_deployment(&deployment).await?;
    ctx.clear_backoff(&deployment);
    if let Outcome::Fatal(reason) = &outcome {
        error!("ClusterDeployment {} cannot progress: {}", deployment.key(), reason);
    }
    Ok(outcome.into_action())
}

fn error_policy(
    deployment: Arc<ClusterDeployment>,
    error: &FleetError,
    ctx: Arc<DeploymentReconciler>,
) -> Action {
    let delay = ctx.error_backoff(&deployment);
    error!(
        "Reconciliation error for {}: {}, retrying in {:?}",
        deployment.key(),
        error,
        delay
    );
    Action::requeue(delay)
}
