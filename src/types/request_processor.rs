// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::build::FunctionSpec;
use crate::types::status::{Condition, ResourceStatus};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "knative.projectriff.io", version = "v1alpha1", kind = "RequestProcessor")]
#[kube(namespaced)]
#[kube(status = "RequestProcessorStatus")]
#[kube(category = "riff")]
#[kube(
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RequestProcessorSpec {
    /// Positional items; an item's index is part of its child's name
    #[serde(default)]
    pub items: Vec<RequestProcessorItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestProcessorItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ItemBuild>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemBuild {
    /// Inline function build owned by this request processor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestProcessorStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// One entry per item; empty when the item has no build
    #[serde(default)]
    pub function_names: Vec<String>,
    /// One entry per item; empty until the item's function resolves an image
    #[serde(default)]
    pub latest_images: Vec<String>,
}

impl ResourceStatus for RequestProcessorStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl RequestProcessorItem {
    pub fn function(&self) -> Option<&FunctionSpec> {
        self.build.as_ref().and_then(|b| b.function.as_ref())
    }
}
