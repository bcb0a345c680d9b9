// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure lifecycle decisions for a ClusterDeployment.
//!
//! `Pending → Provisioning → Ready → Upgrading → Terminating → Deleted`

use crate::types::{ClusterDeployment, DeploymentPhase};
use kube_runtime::controller::Action;
use std::time::Duration;

/// What the reconciler observed about a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<'a> {
    pub deleting: bool,
    pub has_finalizer: bool,
    pub dry_run: bool,
    pub phase: DeploymentPhase,
    pub generation_observed: bool,
    pub template: &'a str,
    pub current_template: Option<&'a str>,
}

impl<'a> Observation<'a> {
    pub fn of(deployment: &'a ClusterDeployment) -> Self {
        Self {
            deleting: deployment.is_deleting(),
            has_finalizer: deployment.has_finalizer(),
            dry_run: deployment.spec.dry_run,
            phase: deployment.phase(),
            generation_observed: deployment.is_generation_observed(),
            template: &deployment.spec.template,
            current_template: deployment.current_template(),
        }
    }
}

/// The next thing to do for a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AwaitChange,
    HoldDryRun,
    AttachFinalizer,
    Render { upgrading: bool },
    Teardown,
}

pub fn plan(observation: &Observation) -> Step {
    if observation.deleting {
        return if observation.has_finalizer {
            Step::Teardown
        } else {
            Step::AwaitChange
        };
    }

    if observation.dry_run {
        return Step::HoldDryRun;
    }

    if !observation.has_finalizer {
        return Step::AttachFinalizer;
    }

    let template_current = observation.current_template == Some(observation.template);
    if observation.phase == DeploymentPhase::Ready && observation.generation_observed && template_current {
        return Step::AwaitChange;
    }

    Step::Render {
        // a first render has nothing to upgrade from
        upgrading: observation.current_template.is_some() && !template_current,
    }
}

/// Phase after a render pass
pub fn settle(upgrading: bool, healthy: bool) -> DeploymentPhase {
    match (healthy, upgrading) {
        (true, _) => DeploymentPhase::Ready,
        (false, true) => DeploymentPhase::Upgrading,
        (false, false) => DeploymentPhase::Provisioning,
    }
}

/// Result of one reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    RequeueAfter(Duration),
    RequeueNow,
    Fatal(String),
}

impl Outcome {
    pub fn into_action(self) -> Action {
        match self {
            Outcome::Done | Outcome::Fatal(_) => Action::await_change(),
            Outcome::RequeueAfter(delay) => Action::requeue(delay),
            Outcome::RequeueNow => Action::requeue(Duration::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed() -> Observation<'static> {
        Observation {
            deleting: false,
            has_finalizer: true,
            dry_run: false,
            phase: DeploymentPhase::Ready,
            generation_observed: true,
            template: "t1",
            current_template: Some("t1"),
        }
    }

    #[test]
    fn test_plan_deletion() {
        let deleting = Observation {
            deleting: true,
            ..observed()
        };
        assert_eq!(plan(&deleting), Step::Teardown);

        let released = Observation {
            has_finalizer: false,
            ..deleting
        };
        assert_eq!(plan(&released), Step::AwaitChange);
    }

    #[test]
    fn test_plan_deletion_beats_dry_run() {
        let obs = Observation {
            deleting: true,
            dry_run: true,
            ..observed()
        };
        assert_eq!(plan(&obs), Step::Teardown);
    }

    #[test]
    fn test_plan_dry_run_holds() {
        let obs = Observation {
            dry_run: true,
            has_finalizer: false,
            phase: DeploymentPhase::Pending,
            ..observed()
        };
        assert_eq!(plan(&obs), Step::HoldDryRun);
    }

    #[test]
    fn test_plan_attaches_finalizer_first() {
        let obs = Observation {
            has_finalizer: false,
            phase: DeploymentPhase::Pending,
            generation_observed: false,
            current_template: None,
            ..observed()
        };
        assert_eq!(plan(&obs), Step::AttachFinalizer);
    }

    #[test]
    fn test_plan_ready_is_noop() {
        assert_eq!(plan(&observed()), Step::AwaitChange);
    }

    #[test]
    fn test_plan_new_generation_renders() {
        let obs = Observation {
            generation_observed: false,
            ..observed()
        };
        assert_eq!(plan(&obs), Step::Render { upgrading: false });
    }

    #[test]
    fn test_plan_first_render() {
        let obs = Observation {
            phase: DeploymentPhase::Provisioning,
            current_template: None,
            ..observed()
        };
        assert_eq!(plan(&obs), Step::Render { upgrading: false });
    }

    #[test]
    fn test_plan_template_change_upgrades() {
        let obs = Observation {
            template: "t2",
            generation_observed: false,
            ..observed()
        };
        assert_eq!(plan(&obs), Step::Render { upgrading: true });

        let waiting = Observation {
            phase: DeploymentPhase::Upgrading,
            ..obs
        };
        assert_eq!(plan(&waiting), Step::Render { upgrading: true });
    }

    #[test]
    fn test_settle() {
        assert_eq!(settle(false, true), DeploymentPhase::Ready);
        assert_eq!(settle(true, true), DeploymentPhase::Ready);
        assert_eq!(settle(true, false), DeploymentPhase::Upgrading);
        assert_eq!(settle(false, false), DeploymentPhase::Provisioning);
    }

    #[test]
    fn test_outcome_into_action() {
        assert_eq!(Outcome::Done.into_action(), Action::await_change());
        assert_eq!(
            Outcome::RequeueAfter(Duration::from_secs(10)).into_action(),
            Action::requeue(Duration::from_secs(10))
        );
        assert_eq!(Outcome::RequeueNow.into_action(), Action::requeue(Duration::ZERO));
        assert_eq!(
            Outcome::Fatal("broken".to_string()).into_action(),
            Action::await_change()
        );
    }
}
