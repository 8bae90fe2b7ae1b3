// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Container and Function: the two resources a Processor can take its image from.

use crate::types::status::{Condition, ResourceStatus};
use kube::core::NamespaceResourceScope;
use kube::{CustomResource, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "build.projectriff.io", version = "v1alpha1", kind = "Container")]
#[kube(namespaced)]
#[kube(status = "BuildStatus")]
#[kube(category = "riff")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Image repository to watch for built images. A leading `_` is replaced
    /// by the default image prefix; `_` alone means prefix plus resource name.
    pub image: String,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "build.projectriff.io", version = "v1alpha1", kind = "Function")]
#[kube(namespaced)]
#[kube(status = "BuildStatus")]
#[kube(category = "riff")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// Image repository the function build publishes to
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker: Option<String>,
}

/// Observed state shared by Container and Function
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Image reference after default-prefix expansion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_image: Option<String>,
    /// Most recent resolved image, the value rolled out to consumers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,
}

impl ResourceStatus for BuildStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildKind {
    Container,
    Function,
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildKind::Container => write!(f, "Container"),
            BuildKind::Function => write!(f, "Function"),
        }
    }
}

/// Identity of a build resource that processors can depend on
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildKey {
    pub kind: BuildKind,
    pub namespace: String,
    pub name: String,
}

impl BuildKey {
    pub fn new(kind: BuildKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A resource that resolves to an image consumers roll out.
pub trait BuildSource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const BUILD_KIND: BuildKind;

    /// The image as declared in the spec, before prefix expansion
    fn image(&self) -> &str;

    fn build_status(&self) -> Option<&BuildStatus>;

    fn latest_image(&self) -> Option<&str> {
        self.build_status()
            .and_then(|s| s.latest_image.as_deref())
            .filter(|image| !image.is_empty())
    }

    fn build_key(&self) -> BuildKey {
        BuildKey::new(
            Self::BUILD_KIND,
            &self.namespace().unwrap_or_default(),
            &self.name_any(),
        )
    }
}

impl BuildSource for Container {
    const BUILD_KIND: BuildKind = BuildKind::Container;

    fn image(&self) -> &str {
        &self.spec.image
    }

    fn build_status(&self) -> Option<&BuildStatus> {
        self.status.as_ref()
    }
}

impl BuildSource for Function {
    const BUILD_KIND: BuildKind = BuildKind::Function;

    fn image(&self) -> &str {
        &self.spec.image
    }

    fn build_status(&self) -> Option<&BuildStatus> {
        self.status.as_ref()
    }
}
