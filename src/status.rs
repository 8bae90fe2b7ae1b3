// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Folds build resolution, spec validation and child health into the
//! conditions each parent publishes.
//!
//! Every function here is pure and starts from the previous status, so an
//! unchanged world produces a status equal to the one already stored and no
//! write is issued.

use crate::constants::conditions::{self, reasons};
use crate::images::TargetImageError;
use crate::reconcilers::children::{Applied, ChildResource};
use crate::types::status::ConditionSet;
use crate::types::{BuildStatus, Function, ProcessorStatus, RequestProcessorStatus, SpecError};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::ResourceExt;

pub const PROCESSOR_CONDITIONS: ConditionSet = ConditionSet::new(
    conditions::READY,
    &[
        conditions::BUILD_READY,
        conditions::DEPLOYMENT_READY,
        conditions::AUTOSCALER_READY,
    ],
);

pub const BUILD_CONDITIONS: ConditionSet =
    ConditionSet::new(conditions::READY, &[conditions::IMAGE_RESOLVED]);

pub const REQUEST_PROCESSOR_CONDITIONS: ConditionSet =
    ConditionSet::new(conditions::READY, &[conditions::FUNCTIONS_READY]);

/// Where a processor's image comes from, as seen in this pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildResolution {
    /// The processor references no build
    NoBuild,
    /// The referenced build resolved to this image
    Resolved(String),
    /// The build exists in the spec but has no usable image right now
    Pending {
        reason: &'static str,
        message: String,
    },
    /// The build reference itself is malformed
    Invalid(SpecError),
}

/// What a reconcile pass knows about one child slot
#[derive(Debug)]
pub enum ChildObservation<'a, K> {
    /// The parent wants no child here
    NotExpected,
    /// A child is wanted but none exists and none could be created yet
    Missing,
    Applied(&'a Applied<K>),
    /// The factory could not produce the child
    ConstructionFailed(String),
}

impl<'a, K> ChildObservation<'a, K> {
    /// Observation of the first applied child, if any
    pub fn from_applied(applied: &'a [Applied<K>]) -> Option<Self> {
        applied.first().map(ChildObservation::Applied)
    }
}

enum Health {
    Healthy,
    Unhealthy {
        reason: &'static str,
        message: String,
    },
}

fn child_health<K: ChildResource>(applied: &Applied<K>, not_ready: &'static str) -> Health {
    match applied {
        Applied::Current(child) if child.is_healthy() => Health::Healthy,
        Applied::Current(child) => Health::Unhealthy {
            reason: not_ready,
            message: child.health_message().unwrap_or_else(|| {
                format!("{} {} is not ready", K::kind(&()), child.name_any())
            }),
        },
        Applied::Rejected { message, .. } => Health::Unhealthy {
            reason: reasons::APPLY_FAILED,
            message: message.clone(),
        },
    }
}

fn current_name<K: ChildResource>(observation: &ChildObservation<'_, K>) -> Option<String> {
    match observation {
        ChildObservation::Applied(Applied::Current(child)) => Some(child.name_any()),
        _ => None,
    }
}

/// Status of a processor after one pass.
///
/// `validation` covers everything about the spec other than the build
/// reference; a failure there holds the workload and is reported on
/// `DeploymentReady`.
pub fn processor_status(
    previous: Option<&ProcessorStatus>,
    generation: Option<i64>,
    build: &BuildResolution,
    validation: Result<(), &SpecError>,
    deployment: ChildObservation<'_, Deployment>,
    autoscaler: ChildObservation<'_, HorizontalPodAutoscaler>,
) -> ProcessorStatus {
    let mut status = previous.cloned().unwrap_or_default();
    status.observed_generation = generation;

    match build {
        BuildResolution::NoBuild => status.latest_image = None,
        BuildResolution::Resolved(image) => status.latest_image = Some(image.clone()),
        // Keep rolling out the last good image until the build recovers
        BuildResolution::Pending { .. } | BuildResolution::Invalid(_) => {}
    }
    status.deployment_name = current_name(&deployment);
    status.autoscaler_name = current_name(&autoscaler);

    let mut manager = PROCESSOR_CONDITIONS.manage(&mut status.conditions);
    manager.initialize();

    match build {
        BuildResolution::NoBuild => manager.mark_false(
            conditions::BUILD_READY,
            reasons::NO_BUILD_REFERENCE,
            "processor does not reference a container or function",
        ),
        BuildResolution::Resolved(_) => manager.mark_true(conditions::BUILD_READY),
        BuildResolution::Pending { reason, message } => {
            manager.mark_false(conditions::BUILD_READY, reason, message)
        }
        BuildResolution::Invalid(err) => {
            manager.mark_false(conditions::BUILD_READY, err.reason(), &err.to_string())
        }
    }

    match (validation, &deployment) {
        (Err(err), _) => {
            manager.mark_false(conditions::DEPLOYMENT_READY, err.reason(), &err.to_string())
        }
        (Ok(()), ChildObservation::NotExpected) => manager.mark_false(
            conditions::DEPLOYMENT_READY,
            reasons::NO_BUILD_REFERENCE,
            "no deployment is created without a build",
        ),
        (Ok(()), ChildObservation::Missing) => manager.mark_false(
            conditions::DEPLOYMENT_READY,
            reasons::AWAITING_IMAGE,
            "waiting for the build to produce an image",
        ),
        (Ok(()), ChildObservation::ConstructionFailed(message)) => manager.mark_false(
            conditions::DEPLOYMENT_READY,
            reasons::CONSTRUCTION_FAILED,
            message,
        ),
        (Ok(()), ChildObservation::Applied(applied)) => {
            match child_health(applied, reasons::DEPLOYMENT_NOT_READY) {
                Health::Healthy => manager.mark_true(conditions::DEPLOYMENT_READY),
                Health::Unhealthy { reason, message } => {
                    manager.mark_false(conditions::DEPLOYMENT_READY, reason, &message)
                }
            }
        }
    }

    match &autoscaler {
        ChildObservation::NotExpected => manager.mark_true_with_reason(
            conditions::AUTOSCALER_READY,
            reasons::AUTOSCALING_DISABLED,
            "no autoscaler is required",
        ),
        ChildObservation::Missing => manager.mark_false(
            conditions::AUTOSCALER_READY,
            reasons::AUTOSCALER_NOT_READY,
            "autoscaler waits for the deployment",
        ),
        ChildObservation::ConstructionFailed(message) => manager.mark_false(
            conditions::AUTOSCALER_READY,
            reasons::CONSTRUCTION_FAILED,
            message,
        ),
        ChildObservation::Applied(applied) => {
            match child_health(applied, reasons::AUTOSCALER_NOT_READY) {
                Health::Healthy => manager.mark_true(conditions::AUTOSCALER_READY),
                Health::Unhealthy { reason, message } => {
                    manager.mark_false(conditions::AUTOSCALER_READY, reason, &message)
                }
            }
        }
    }

    status
}

/// Outcome of resolving a Container or Function image
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    Resolved { target: String, image: String },
    InvalidTarget(TargetImageError),
}

pub fn build_status(
    previous: Option<&BuildStatus>,
    generation: Option<i64>,
    outcome: &BuildOutcome,
) -> BuildStatus {
    let mut status = previous.cloned().unwrap_or_default();
    status.observed_generation = generation;

    let mut manager = BUILD_CONDITIONS.manage(&mut status.conditions);
    manager.initialize();
    match outcome {
        BuildOutcome::Resolved { .. } => manager.mark_true(conditions::IMAGE_RESOLVED),
        BuildOutcome::InvalidTarget(err @ TargetImageError::PrefixMissing(_)) => manager.mark_false(
            conditions::IMAGE_RESOLVED,
            reasons::DEFAULT_IMAGE_PREFIX_MISSING,
            &err.to_string(),
        ),
        BuildOutcome::InvalidTarget(err @ TargetImageError::Empty) => manager.mark_false(
            conditions::IMAGE_RESOLVED,
            reasons::IMAGE_NOT_RESOLVED,
            &err.to_string(),
        ),
    }

    match outcome {
        BuildOutcome::Resolved { target, image } => {
            status.target_image = Some(target.clone());
            status.latest_image = Some(image.clone());
        }
        // A previously resolved image stays published for consumers
        BuildOutcome::InvalidTarget(_) => status.target_image = None,
    }
    status
}

/// Status of a request processor from one observation per item, in item order.
pub fn request_processor_status(
    previous: Option<&RequestProcessorStatus>,
    generation: Option<i64>,
    items: &[ChildObservation<'_, Function>],
) -> RequestProcessorStatus {
    let mut status = previous.cloned().unwrap_or_default();
    status.observed_generation = generation;

    status.function_names = items
        .iter()
        .map(|item| current_name(item).unwrap_or_default())
        .collect();
    status.latest_images = items
        .iter()
        .map(|item| match item {
            ChildObservation::Applied(Applied::Current(function)) => function
                .status
                .as_ref()
                .and_then(|s| s.latest_image.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .collect();

    let first_problem = items.iter().enumerate().find_map(|(index, item)| match item {
        ChildObservation::NotExpected => None,
        ChildObservation::Missing => Some((
            reasons::FUNCTION_NOT_READY,
            format!("function for item {} does not exist yet", index),
        )),
        ChildObservation::ConstructionFailed(message) => {
            Some((reasons::CONSTRUCTION_FAILED, message.clone()))
        }
        ChildObservation::Applied(applied) => match child_health(applied, reasons::FUNCTION_NOT_READY) {
            Health::Healthy => None,
            Health::Unhealthy { reason, message } => Some((reason, message)),
        },
    });

    let mut manager = REQUEST_PROCESSOR_CONDITIONS.manage(&mut status.conditions);
    manager.initialize();
    match first_problem {
        None => manager.mark_true(conditions::FUNCTIONS_READY),
        Some((reason, message)) => manager.mark_false(conditions::FUNCTIONS_READY, reason, &message),
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::status::{Condition, ResourceStatus, CONDITION_FALSE, CONDITION_TRUE};
    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
    use kube::api::ObjectMeta;

    const IMAGE_A: &str = "registry.example.com/square@sha256:aaa";

    fn deployment(available: bool) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("square-processor".to_string()),
                generation: Some(1),
                ..Default::default()
            },
            spec: None,
            status: Some(DeploymentStatus {
                observed_generation: Some(1),
                conditions: Some(vec![DeploymentCondition {
                    type_: "Available".to_string(),
                    status: if available { "True" } else { "False" }.to_string(),
                    message: Some("rolling out".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
        }
    }

    fn condition<'a>(status: &'a ProcessorStatus, condition_type: &str) -> &'a Condition {
        status.condition(condition_type).unwrap()
    }

    fn healthy_processor_status() -> ProcessorStatus {
        let applied = Applied::Current(deployment(true));
        processor_status(
            None,
            Some(1),
            &BuildResolution::Resolved(IMAGE_A.to_string()),
            Ok(()),
            ChildObservation::Applied(&applied),
            ChildObservation::NotExpected,
        )
    }

    #[test]
    fn test_ready_when_build_and_children_are_healthy() {
        let status = healthy_processor_status();
        assert!(status.is_ready());
        assert_eq!(status.latest_image.as_deref(), Some(IMAGE_A));
        assert_eq!(status.deployment_name.as_deref(), Some("square-processor"));
        assert_eq!(status.autoscaler_name, None);
        assert_eq!(status.observed_generation, Some(1));
    }

    #[test]
    fn test_conditions_are_ordered_ready_first() {
        let status = healthy_processor_status();
        let types: Vec<&str> = status
            .conditions
            .iter()
            .map(|c| c.condition_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec!["Ready", "BuildReady", "DeploymentReady", "AutoscalerReady"]
        );
    }

    #[test]
    fn test_recomputing_the_same_state_is_stable() {
        let first = healthy_processor_status();
        let applied = Applied::Current(deployment(true));
        let second = processor_status(
            Some(&first),
            Some(1),
            &BuildResolution::Resolved(IMAGE_A.to_string()),
            Ok(()),
            ChildObservation::Applied(&applied),
            ChildObservation::NotExpected,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_unhealthy_deployment_blocks_ready() {
        let applied = Applied::Current(deployment(false));
        let status = processor_status(
            None,
            Some(1),
            &BuildResolution::Resolved(IMAGE_A.to_string()),
            Ok(()),
            ChildObservation::Applied(&applied),
            ChildObservation::NotExpected,
        );
        let ready = condition(&status, conditions::READY);
        assert_eq!(ready.status, CONDITION_FALSE);
        assert_eq!(ready.reason.as_deref(), Some(reasons::DEPLOYMENT_NOT_READY));
        assert_eq!(ready.message.as_deref(), Some("rolling out"));
    }

    #[test]
    fn test_removed_build_reports_no_build_reference() {
        let previous = healthy_processor_status();
        let status = processor_status(
            Some(&previous),
            Some(2),
            &BuildResolution::NoBuild,
            Ok(()),
            ChildObservation::NotExpected,
            ChildObservation::NotExpected,
        );
        let ready = condition(&status, conditions::READY);
        assert_eq!(ready.status, CONDITION_FALSE);
        assert_eq!(ready.reason.as_deref(), Some(reasons::NO_BUILD_REFERENCE));
        assert_eq!(status.latest_image, None);
        assert_eq!(status.deployment_name, None);
    }

    #[test]
    fn test_pending_build_keeps_last_image() {
        let previous = healthy_processor_status();
        let applied = Applied::Current(deployment(true));
        let status = processor_status(
            Some(&previous),
            Some(1),
            &BuildResolution::Pending {
                reason: reasons::BUILD_NOT_FOUND,
                message: "container 'square' not found".to_string(),
            },
            Ok(()),
            ChildObservation::Applied(&applied),
            ChildObservation::NotExpected,
        );
        assert_eq!(status.latest_image.as_deref(), Some(IMAGE_A));
        assert_eq!(
            condition(&status, conditions::READY).reason.as_deref(),
            Some(reasons::BUILD_NOT_FOUND)
        );
    }

    #[test]
    fn test_invalid_build_reference_is_reported() {
        let err = SpecError::AmbiguousBuildReference {
            container: "a".to_string(),
            function: "b".to_string(),
        };
        let status = processor_status(
            None,
            Some(1),
            &BuildResolution::Invalid(err),
            Ok(()),
            ChildObservation::Missing,
            ChildObservation::NotExpected,
        );
        assert_eq!(
            condition(&status, conditions::READY).reason.as_deref(),
            Some(reasons::AMBIGUOUS_BUILD_REFERENCE)
        );
    }

    #[test]
    fn test_invalid_bindings_are_reported_on_deployment() {
        let err = SpecError::InvalidBindings("at least one input is required".to_string());
        let status = processor_status(
            None,
            Some(1),
            &BuildResolution::Resolved(IMAGE_A.to_string()),
            Err(&err),
            ChildObservation::Missing,
            ChildObservation::NotExpected,
        );
        let deployment_ready = condition(&status, conditions::DEPLOYMENT_READY);
        assert_eq!(deployment_ready.reason.as_deref(), Some(reasons::INVALID_BINDINGS));
        assert!(!status.is_ready());
    }

    #[test]
    fn test_rejected_autoscaler_is_scoped() {
        let deployment = Applied::Current(deployment(true));
        let autoscaler: Applied<HorizontalPodAutoscaler> = Applied::Rejected {
            name: "square-processor".to_string(),
            message: "spec.maxReplicas: Invalid value".to_string(),
        };
        let status = processor_status(
            None,
            Some(1),
            &BuildResolution::Resolved(IMAGE_A.to_string()),
            Ok(()),
            ChildObservation::Applied(&deployment),
            ChildObservation::Applied(&autoscaler),
        );
        assert_eq!(condition(&status, conditions::DEPLOYMENT_READY).status, CONDITION_TRUE);
        let autoscaler_ready = condition(&status, conditions::AUTOSCALER_READY);
        assert_eq!(autoscaler_ready.reason.as_deref(), Some(reasons::APPLY_FAILED));
        assert!(!status.is_ready());
    }

    #[test]
    fn test_build_status_resolved() {
        let status = build_status(
            None,
            Some(3),
            &BuildOutcome::Resolved {
                target: "registry.example.com/square".to_string(),
                image: IMAGE_A.to_string(),
            },
        );
        assert!(status.is_ready());
        assert_eq!(status.latest_image.as_deref(), Some(IMAGE_A));
        assert_eq!(status.target_image.as_deref(), Some("registry.example.com/square"));
        assert_eq!(status.observed_generation, Some(3));
    }

    #[test]
    fn test_build_status_missing_prefix_keeps_latest_image() {
        let previous = build_status(
            None,
            Some(1),
            &BuildOutcome::Resolved {
                target: "registry.example.com/square".to_string(),
                image: IMAGE_A.to_string(),
            },
        );
        let status = build_status(
            Some(&previous),
            Some(2),
            &BuildOutcome::InvalidTarget(TargetImageError::PrefixMissing("_".to_string())),
        );
        let resolved = status.condition(conditions::IMAGE_RESOLVED).unwrap();
        assert_eq!(resolved.reason.as_deref(), Some(reasons::DEFAULT_IMAGE_PREFIX_MISSING));
        assert!(!status.is_ready());
        assert_eq!(status.latest_image.as_deref(), Some(IMAGE_A));
        assert_eq!(status.target_image, None);
    }

    #[test]
    fn test_request_processor_status_shapes_per_item() {
        let mut function = Function::new("web-0", Default::default());
        function.status = Some(BuildStatus {
            latest_image: Some(IMAGE_A.to_string()),
            ..Default::default()
        });
        let applied = Applied::Current(function);
        let items = [ChildObservation::Applied(&applied), ChildObservation::NotExpected];

        let status = request_processor_status(None, Some(1), &items);
        assert_eq!(status.function_names, vec!["web-0".to_string(), String::new()]);
        assert_eq!(status.latest_images, vec![IMAGE_A.to_string(), String::new()]);
        let ready = status.condition(conditions::READY).unwrap();
        assert_eq!(ready.reason.as_deref(), Some(reasons::FUNCTION_NOT_READY));
    }

    #[test]
    fn test_request_processor_without_items_is_ready() {
        let status = request_processor_status(None, Some(1), &[]);
        assert!(status.is_ready());
        assert!(status.function_names.is_empty());
    }
}
