// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload and autoscaler for a Processor.

use crate::error::{ControllerError, Result};
use crate::resources::{names, owner_reference, stamp};
use crate::types::processor::{ScalingSpec, StreamBinding};
use crate::types::Processor;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ResourceMetricSource,
};
use k8s_openapi::api::core::v1::{Container as PodContainer, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Name given to the workload container when the template leaves it unnamed
pub const PROCESSOR_CONTAINER: &str = "processor";

/// Environment variables the controller owns on the workload container
pub mod env {
    pub const INPUTS: &str = "INPUTS";
    pub const OUTPUTS: &str = "OUTPUTS";
    pub const INPUT_NAMES: &str = "INPUT_NAMES";
    pub const OUTPUT_NAMES: &str = "OUTPUT_NAMES";
    pub const GROUP: &str = "GROUP";
}

/// Desired Deployment for `processor` running `image`.
///
/// Returns `None` when the processor references no build: such a processor
/// owns no workload and any existing one is garbage collected.
pub fn desired_deployment(processor: &Processor, image: &str) -> Result<Option<Deployment>> {
    let build = processor
        .spec
        .build_ref()
        .map_err(|e| ControllerError::Construction(e.to_string()))?;
    if build.is_none() {
        return Ok(None);
    }
    processor
        .spec
        .validate()
        .map_err(|e| ControllerError::Construction(e.to_string()))?;
    if image.is_empty() {
        return Err(ControllerError::Construction(
            "cannot build a workload without an image".to_string(),
        ));
    }

    let namespace = processor.namespace().unwrap_or_default();
    let labels = names::owner_labels(processor);
    let selector = BTreeMap::from([(
        names::owner_label_key::<Processor>(),
        processor.name_any(),
    )]);

    let deployment = Deployment {
        metadata: ObjectMeta {
            name: Some(names::processor_deployment(processor)),
            namespace: Some(namespace.clone()),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner_reference(processor)?]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            // The autoscaler owns the replica count when scaling is enabled
            replicas: if processor.spec.scaling.is_some() {
                None
            } else {
                Some(1)
            },
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec(processor, &namespace, image)),
            },
            ..Default::default()
        }),
        status: None,
    };
    stamp(deployment).map(Some)
}

/// Desired autoscaler for `processor`, present only when it references a
/// build and requests scaling.
pub fn desired_autoscaler(processor: &Processor) -> Result<Option<HorizontalPodAutoscaler>> {
    let build = processor
        .spec
        .build_ref()
        .map_err(|e| ControllerError::Construction(e.to_string()))?;
    let Some(scaling) = processor.spec.scaling.as_ref() else {
        return Ok(None);
    };
    if build.is_none() {
        return Ok(None);
    }
    processor
        .spec
        .validate_scaling()
        .map_err(|e| ControllerError::Construction(e.to_string()))?;

    let autoscaler = HorizontalPodAutoscaler {
        metadata: ObjectMeta {
            name: Some(names::processor_autoscaler(processor)),
            namespace: processor.namespace(),
            labels: Some(names::owner_labels(processor)),
            owner_references: Some(vec![owner_reference(processor)?]),
            ..Default::default()
        },
        spec: Some(autoscaler_spec(processor, scaling)),
        status: None,
    };
    stamp(autoscaler).map(Some)
}

fn autoscaler_spec(processor: &Processor, scaling: &ScalingSpec) -> HorizontalPodAutoscalerSpec {
    HorizontalPodAutoscalerSpec {
        scale_target_ref: CrossVersionObjectReference {
            api_version: Some("apps/v1".to_string()),
            kind: "Deployment".to_string(),
            name: names::processor_deployment(processor),
        },
        min_replicas: Some(scaling.min_replicas),
        max_replicas: scaling.max_replicas,
        metrics: Some(vec![MetricSpec {
            type_: "Resource".to_string(),
            resource: Some(ResourceMetricSource {
                name: "cpu".to_string(),
                target: MetricTarget {
                    type_: "Utilization".to_string(),
                    average_utilization: Some(scaling.target_cpu_utilization),
                    ..Default::default()
                },
            }),
            ..Default::default()
        }]),
        behavior: None,
    }
}

fn pod_spec(processor: &Processor, namespace: &str, image: &str) -> PodSpec {
    let mut spec = processor.spec.template.clone().unwrap_or_default();
    if spec.containers.is_empty() {
        spec.containers.push(PodContainer::default());
    }
    let binding_env = binding_env(processor, namespace);

    let container = &mut spec.containers[0];
    if container.name.is_empty() {
        container.name = PROCESSOR_CONTAINER.to_string();
    }
    container.image = Some(image.to_string());

    // Controller-owned variables replace any user-supplied ones of the same name
    let mut vars: Vec<EnvVar> = container
        .env
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|var| !binding_env.iter().any(|own| own.name == var.name))
        .collect();
    vars.extend(binding_env);
    container.env = Some(vars);

    spec
}

fn binding_env(processor: &Processor, namespace: &str) -> Vec<EnvVar> {
    let addresses = |bindings: &[StreamBinding]| {
        bindings
            .iter()
            .map(|b| format!("{}/{}", namespace, b.stream))
            .collect::<Vec<_>>()
            .join(",")
    };
    let exposed = |bindings: &[StreamBinding]| {
        bindings
            .iter()
            .map(StreamBinding::exposed_name)
            .collect::<Vec<_>>()
            .join(",")
    };
    let var = |name: &str, value: String| EnvVar {
        name: name.to_string(),
        value: Some(value),
        value_from: None,
    };

    vec![
        var(env::INPUTS, addresses(&processor.spec.inputs)),
        var(env::OUTPUTS, addresses(&processor.spec.outputs)),
        var(env::INPUT_NAMES, exposed(&processor.spec.inputs)),
        var(env::OUTPUT_NAMES, exposed(&processor.spec.outputs)),
        var(env::GROUP, processor.name_any()),
    ]
}
