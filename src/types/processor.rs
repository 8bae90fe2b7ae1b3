// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Processor: binds ordered input and output streams to a workload whose image
//! follows a Container or Function.

use crate::constants::conditions::reasons;
use crate::types::build::{BuildKey, BuildKind};
use crate::types::status::{Condition, ResourceStatus};
use k8s_openapi::api::core::v1::PodSpec;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "streaming.projectriff.io", version = "v1alpha1", kind = "Processor")]
#[kube(namespaced)]
#[kube(status = "ProcessorStatus")]
#[kube(category = "riff")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSpec {
    /// Resolves the image from a build resource. As the build produces new
    /// images they are rolled out to the processor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
    /// Ordered list of streams to bind as inputs
    pub inputs: Vec<StreamBinding>,
    /// Ordered list of streams to bind as outputs
    #[serde(default)]
    pub outputs: Vec<StreamBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodSpec>,
    /// Horizontal autoscaling of the workload; fixed at one replica when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingSpec>,
}

/// Wire form of the build reference. Exactly one field may be set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// References a Container in this namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_ref: Option<String>,
    /// References a Function in this namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_ref: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamBinding {
    /// Stream name, from this namespace
    pub stream: String,
    /// Exposes the stream under another name within the processor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl StreamBinding {
    /// The name the workload sees for this binding
    pub fn exposed_name(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.stream)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScalingSpec {
    #[serde(default = "default_min_replicas")]
    pub min_replicas: i32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: i32,
    #[serde(default = "default_cpu_target")]
    pub target_cpu_utilization: i32,
}

fn default_min_replicas() -> i32 {
    1
}

fn default_max_replicas() -> i32 {
    10
}

fn default_cpu_target() -> i32 {
    80
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaler_name: Option<String>,
}

impl ResourceStatus for ProcessorStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

/// A validated build reference: exactly one arm is populated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuildRef {
    Container(String),
    Function(String),
}

impl BuildRef {
    pub fn kind(&self) -> BuildKind {
        match self {
            BuildRef::Container(_) => BuildKind::Container,
            BuildRef::Function(_) => BuildKind::Function,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BuildRef::Container(name) | BuildRef::Function(name) => name,
        }
    }

    pub fn key(&self, namespace: &str) -> BuildKey {
        BuildKey::new(self.kind(), namespace, self.name())
    }
}

/// A processor spec that cannot be turned into a workload until the user edits it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecError {
    AmbiguousBuildReference { container: String, function: String },
    EmptyBuildReference,
    InvalidBindings(String),
    InvalidScaling(String),
}

impl SpecError {
    /// Condition reason published for this error
    pub fn reason(&self) -> &'static str {
        match self {
            SpecError::AmbiguousBuildReference { .. } => reasons::AMBIGUOUS_BUILD_REFERENCE,
            SpecError::EmptyBuildReference => reasons::EMPTY_BUILD_REFERENCE,
            SpecError::InvalidBindings(_) => reasons::INVALID_BINDINGS,
            SpecError::InvalidScaling(_) => reasons::INVALID_SCALING,
        }
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::AmbiguousBuildReference {
                container,
                function,
            } => write!(
                f,
                "build references both container '{}' and function '{}'",
                container, function
            ),
            SpecError::EmptyBuildReference => {
                write!(f, "build must reference a container or a function")
            }
            SpecError::InvalidBindings(message) | SpecError::InvalidScaling(message) => {
                write!(f, "{}", message)
            }
        }
    }
}

impl Build {
    /// Convert the wire form into a tagged reference, rejecting both-or-neither.
    pub fn resolve(&self) -> Result<BuildRef, SpecError> {
        let container = self.container_ref.as_deref().filter(|s| !s.is_empty());
        let function = self.function_ref.as_deref().filter(|s| !s.is_empty());
        match (container, function) {
            (Some(container), None) => Ok(BuildRef::Container(container.to_string())),
            (None, Some(function)) => Ok(BuildRef::Function(function.to_string())),
            (Some(container), Some(function)) => Err(SpecError::AmbiguousBuildReference {
                container: container.to_string(),
                function: function.to_string(),
            }),
            (None, None) => Err(SpecError::EmptyBuildReference),
        }
    }
}

impl ProcessorSpec {
    /// The build reference, if any. `Ok(None)` means no build is requested.
    pub fn build_ref(&self) -> Result<Option<BuildRef>, SpecError> {
        self.build.as_ref().map(Build::resolve).transpose()
    }

    pub fn validate_bindings(&self) -> Result<(), SpecError> {
        if self.inputs.is_empty() {
            return Err(SpecError::InvalidBindings(
                "at least one input is required".to_string(),
            ));
        }
        validate_side("inputs", &self.inputs)?;
        validate_side("outputs", &self.outputs)
    }

    pub fn validate_scaling(&self) -> Result<(), SpecError> {
        let Some(scaling) = &self.scaling else {
            return Ok(());
        };
        if scaling.min_replicas < 1 {
            return Err(SpecError::InvalidScaling(format!(
                "scaling.minReplicas must be at least 1, got {}",
                scaling.min_replicas
            )));
        }
        if scaling.max_replicas < scaling.min_replicas {
            return Err(SpecError::InvalidScaling(format!(
                "scaling.maxReplicas ({}) is below minReplicas ({})",
                scaling.max_replicas, scaling.min_replicas
            )));
        }
        if !(1..=100).contains(&scaling.target_cpu_utilization) {
            return Err(SpecError::InvalidScaling(format!(
                "scaling.targetCpuUtilization must be between 1 and 100, got {}",
                scaling.target_cpu_utilization
            )));
        }
        Ok(())
    }

    /// Everything about the spec that does not depend on other resources
    pub fn validate(&self) -> Result<(), SpecError> {
        self.validate_bindings()?;
        self.validate_scaling()
    }
}

fn validate_side(side: &str, bindings: &[StreamBinding]) -> Result<(), SpecError> {
    let mut streams = HashSet::new();
    let mut exposed = HashSet::new();
    for (i, binding) in bindings.iter().enumerate() {
        if binding.stream.is_empty() {
            return Err(SpecError::InvalidBindings(format!(
                "{}[{}]: stream name is required",
                side, i
            )));
        }
        if !streams.insert(binding.stream.as_str()) {
            return Err(SpecError::InvalidBindings(format!(
                "{}[{}]: stream '{}' is bound more than once",
                side, i, binding.stream
            )));
        }
        if !exposed.insert(binding.exposed_name()) {
            return Err(SpecError::InvalidBindings(format!(
                "{}[{}]: name '{}' is exposed more than once",
                side,
                i,
                binding.exposed_name()
            )));
        }
    }
    Ok(())
}

impl Processor {
    /// Key of the build this processor depends on, when the reference is valid
    pub fn build_key(&self) -> Option<BuildKey> {
        let namespace = self.namespace().unwrap_or_default();
        self.spec
            .build_ref()
            .ok()
            .flatten()
            .map(|r| r.key(&namespace))
    }
}
