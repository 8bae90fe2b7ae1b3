// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Child resource factory: pure functions from a parent to the children it
//! should own. No cluster access; identical input yields byte-identical output.

pub mod function;
pub mod names;
pub mod processor;

pub use function::desired_function;
pub use processor::{desired_autoscaler, desired_deployment};

use crate::constants::annotations;
use crate::error::{ControllerError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Controller owner reference pointing at `parent`
pub(crate) fn owner_reference<K: Resource<DynamicType = ()>>(parent: &K) -> Result<OwnerReference> {
    parent
        .controller_owner_ref(&())
        .ok_or(ControllerError::MissingObjectKey(".metadata.uid"))
}

/// sha256 over the serialized manifest, excluding the hash annotation itself
pub fn manifest_hash<K: Resource + Serialize>(child: &K) -> Result<String> {
    let bytes = serde_json::to_vec(child)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// The hash recorded on a child when it was last applied
pub fn recorded_hash<K: Resource>(child: &K) -> Option<&str> {
    child
        .meta()
        .annotations
        .as_ref()
        .and_then(|a| a.get(annotations::MANIFEST_HASH))
        .map(String::as_str)
}

/// Record the manifest hash on a freshly built child
pub(crate) fn stamp<K: Resource + Serialize>(mut child: K) -> Result<K> {
    let hash = manifest_hash(&child)?;
    child
        .meta_mut()
        .annotations
        .get_or_insert_with(Default::default)
        .insert(annotations::MANIFEST_HASH.to_string(), hash);
    Ok(child)
}
