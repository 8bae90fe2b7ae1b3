// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic names and ownership labels for generated children.
//!
//! The same parent always yields the same child names, so a child is updated
//! in place across reconciles instead of being replaced. Every child carries
//! an `<group>/<kind>: <parent>` label so it can be found by selector even if
//! its owner reference is lost.

use crate::constants::{labels, OPERATOR_NAME};
use crate::types::{Processor, RequestProcessor};
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Suffix distinguishing a child from its parent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildSuffix {
    /// A singleton child with a fixed role, e.g. `processor`
    Role(&'static str),
    /// Position in an indexed family of children
    Index(usize),
}

/// Name of the child identified by `suffix` under `parent`.
///
/// Roles and indices never contain `-`, so `parent-suffix` can be split
/// unambiguously on its last dash and two parents never share a child name.
pub fn child_name<K: ResourceExt>(parent: &K, suffix: ChildSuffix) -> String {
    match suffix {
        ChildSuffix::Role(role) => format!("{}-{}", parent.name_any(), role),
        ChildSuffix::Index(index) => format!("{}-{}", parent.name_any(), index),
    }
}

/// Label key identifying the owning parent kind, e.g. `streaming.projectriff.io/processor`
pub fn owner_label_key<K: Resource<DynamicType = ()>>() -> String {
    format!("{}/{}", K::group(&()), K::kind(&()).to_lowercase())
}

/// Labels stamped on every child of `parent`
pub fn owner_labels<K: Resource<DynamicType = ()>>(parent: &K) -> BTreeMap<String, String> {
    BTreeMap::from([
        (owner_label_key::<K>(), parent.name_any()),
        (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
    ])
}

/// Label selector matching exactly the children of `parent`
pub fn owner_selector<K: Resource<DynamicType = ()>>(parent: &K) -> String {
    format!("{}={}", owner_label_key::<K>(), parent.name_any())
}

/// The parent of kind `P` named by a child's owner label
pub fn parent_ref<P, C>(child: &C) -> Option<ObjectRef<P>>
where
    P: Resource<DynamicType = ()>,
    C: ResourceExt,
{
    let name = child.labels().get(&owner_label_key::<P>())?;
    let namespace = child.namespace()?;
    Some(ObjectRef::new(name).within(&namespace))
}

pub fn processor_deployment(processor: &Processor) -> String {
    child_name(processor, ChildSuffix::Role("processor"))
}

pub fn processor_autoscaler(processor: &Processor) -> String {
    child_name(processor, ChildSuffix::Role("processor"))
}

pub fn request_processor_item(rp: &RequestProcessor, index: usize) -> String {
    child_name(rp, ChildSuffix::Index(index))
}
