// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Diff and apply of generated children, shared by every parent reconciler.
//!
//! Children are found by owner label, compared on the state the factory
//! controls (manifest hash, owner labels, controller reference) and
//! converged with the fewest API calls: nothing is written when a child is
//! already in sync, and a child is only deleted if its owner references name
//! the parent.

use crate::constants::OPERATOR_NAME;
use crate::error::{self, ControllerError, Result};
use crate::resources::recorded_hash;
use crate::types::{Function, ResourceStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams, Preconditions};
use kube::core::NamespaceResourceScope;
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, info, instrument, warn};

/// A kind of child a parent can own
pub trait ChildResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The child reports itself ready by its own readiness signal
    fn is_healthy(&self) -> bool;

    /// Why the child is not ready, when it says so
    fn health_message(&self) -> Option<String> {
        None
    }
}

impl ChildResource for Deployment {
    fn is_healthy(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        let observed_current = match (self.metadata.generation, status.observed_generation) {
            (Some(generation), Some(observed)) => observed >= generation,
            (None, _) => true,
            (Some(_), None) => false,
        };
        observed_current
            && status
                .conditions
                .iter()
                .flatten()
                .any(|c| c.type_ == "Available" && c.status == "True")
    }

    fn health_message(&self) -> Option<String> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .flatten()
            .find(|c| c.type_ == "Available" && c.status != "True")
            .and_then(|c| c.message.clone())
    }
}

impl ChildResource for HorizontalPodAutoscaler {
    fn is_healthy(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "AbleToScale" && c.status == "True")
            })
    }

    fn health_message(&self) -> Option<String> {
        self.status
            .as_ref()?
            .conditions
            .as_ref()?
            .iter()
            .find(|c| c.type_ == "AbleToScale" && c.status != "True")
            .and_then(|c| c.message.clone())
    }
}

impl ChildResource for Function {
    fn is_healthy(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.is_ready())
    }

    fn health_message(&self) -> Option<String> {
        self.status
            .as_ref()?
            .condition(crate::constants::conditions::READY)
            .and_then(|c| c.message.clone())
    }
}

/// What the parent wants of one child kind
#[derive(Debug)]
pub enum Desired<K> {
    /// Inputs are unavailable; leave whatever exists alone
    Hold,
    /// Converge on exactly these children
    Exactly(Vec<K>),
}

/// The calls needed to converge one child kind
#[derive(Debug)]
pub struct ChildPlan<K> {
    pub creates: Vec<K>,
    /// Desired manifests carrying the observed resourceVersion
    pub updates: Vec<K>,
    /// Owned children no longer desired
    pub deletes: Vec<K>,
    /// Existing children already in sync
    pub unchanged: Vec<K>,
    /// Existing children with a desired name that belong to someone else
    pub foreign: Vec<K>,
}

impl<K> ChildPlan<K> {
    pub fn is_noop(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Result of converging one desired child
#[derive(Debug)]
pub enum Applied<K> {
    /// The child as the API server last returned it
    Current(K),
    /// The API server refused the manifest, or the name is taken
    Rejected { name: String, message: String },
}

impl<K: ResourceExt> Applied<K> {
    pub fn name(&self) -> String {
        match self {
            Applied::Current(child) => child.name_any(),
            Applied::Rejected { name, .. } => name.clone(),
        }
    }
}

fn is_owned_by<K: Resource>(child: &K, owner_uid: &str) -> bool {
    child.owner_references().iter().any(|r| r.uid == owner_uid)
}

fn in_sync<K: Resource + Serialize>(desired: &K, current: &K, owner_uid: &str) -> bool {
    let hash_matches = recorded_hash(desired) == recorded_hash(current);
    let controlled = current
        .owner_references()
        .iter()
        .any(|r| r.uid == owner_uid && r.controller == Some(true));
    hash_matches && controlled && fields_match(desired, current)
}

/// Every field the factory sets is present in `current` with the same value.
/// Fields only the API server or other actors set are ignored.
fn fields_match<K: Serialize>(desired: &K, current: &K) -> bool {
    match (serde_json::to_value(desired), serde_json::to_value(current)) {
        (Ok(desired), Ok(current)) => covers(&desired, &current),
        _ => false,
    }
}

fn covers(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Object(desired), Value::Object(current)) => desired.iter().all(|(key, want)| {
            match current.get(key) {
                Some(have) => covers(want, have),
                None => is_empty(want),
            }
        }),
        (Value::Array(desired), Value::Array(current)) => {
            desired.len() == current.len() && desired.iter().zip(current).all(|(w, h)| covers(w, h))
        }
        (Value::Null, _) => true,
        (desired, current) => desired == current,
    }
}

/// The API server drops empty maps and lists
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Diff `desired` against the children found by owner label.
pub fn plan_children<K: ChildResource>(
    desired: Desired<K>,
    actual: Vec<K>,
    owner_uid: &str,
) -> ChildPlan<K> {
    let mut plan = ChildPlan {
        creates: Vec::new(),
        updates: Vec::new(),
        deletes: Vec::new(),
        unchanged: Vec::new(),
        foreign: Vec::new(),
    };

    let desired = match desired {
        Desired::Hold => {
            plan.unchanged = actual
                .into_iter()
                .filter(|child| is_owned_by(child, owner_uid))
                .collect();
            return plan;
        }
        Desired::Exactly(desired) => desired,
    };

    let mut actual: BTreeMap<String, K> = actual.into_iter().map(|c| (c.name_any(), c)).collect();
    for mut want in desired {
        match actual.remove(&want.name_any()) {
            None => plan.creates.push(want),
            Some(current) if !is_owned_by(&current, owner_uid) => plan.foreign.push(current),
            Some(current) if in_sync(&want, &current, owner_uid) => plan.unchanged.push(current),
            Some(current) => {
                want.meta_mut().resource_version = current.resource_version();
                plan.updates.push(want);
            }
        }
    }

    // Only children this parent owns are collected; a stray label is not ownership
    plan.deletes = actual
        .into_values()
        .filter(|child| is_owned_by(child, owner_uid))
        .collect();
    plan
}

/// Children of one kind carrying the parent's owner label
pub async fn list_children<K: ChildResource>(api: &Api<K>, selector: &str) -> Result<Vec<K>> {
    let list = api.list(&ListParams::default().labels(selector)).await?;
    Ok(list.items)
}

/// Create and update the children in `plan`. Rejections are scoped to their
/// child; conflicts and transient failures abort the pass.
#[instrument(skip(api, plan), fields(kind = %K::kind(&())))]
pub async fn apply_upserts<K: ChildResource>(
    api: &Api<K>,
    plan: &ChildPlan<K>,
) -> Result<Vec<Applied<K>>> {
    let mut applied: Vec<Applied<K>> = plan.unchanged.iter().cloned().map(Applied::Current).collect();

    for child in &plan.foreign {
        warn!(name = %child.name_any(), "Child name is taken by an object this parent does not own");
        applied.push(Applied::Rejected {
            name: child.name_any(),
            message: format!(
                "{} {} already exists and is not owned by this resource",
                K::kind(&()),
                child.name_any()
            ),
        });
    }

    for child in &plan.creates {
        let name = child.name_any();
        info!(%name, "Creating child");
        let result = api.create(&PostParams::default(), child).await;
        applied.push(classify::<K>(result, name)?);
    }

    let params = PatchParams::apply(OPERATOR_NAME).force();
    for child in &plan.updates {
        let name = child.name_any();
        info!(%name, "Updating child");
        let result = api.patch(&name, &params, &Patch::Apply(child)).await;
        applied.push(classify::<K>(result, name)?);
    }

    Ok(applied)
}

/// Delete owned children that are no longer desired, guarded by their uid.
#[instrument(skip(api, plan), fields(kind = %K::kind(&())))]
pub async fn apply_deletes<K: ChildResource>(api: &Api<K>, plan: &ChildPlan<K>) -> Result<()> {
    for child in &plan.deletes {
        let name = child.name_any();
        info!(%name, "Deleting orphaned child");
        let params = DeleteParams {
            preconditions: Some(Preconditions {
                uid: child.uid(),
                resource_version: None,
            }),
            ..Default::default()
        };
        match api.delete(&name, &params).await {
            Ok(_) => {}
            Err(e) if error::is_not_found(&e) => debug!(%name, "Child already gone"),
            Err(e) if error::is_conflict(&e) => {
                return Err(ControllerError::Conflict(format!("{} {}", K::kind(&()), name)))
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn classify<K: ChildResource>(
    result: std::result::Result<K, kube::Error>,
    name: String,
) -> Result<Applied<K>> {
    match result {
        Ok(child) => Ok(Applied::Current(child)),
        Err(e) if error::is_rejected(&e) => {
            let message = match e {
                kube::Error::Api(response) => response.message,
                other => other.to_string(),
            };
            warn!(%name, %message, "Child manifest rejected");
            Ok(Applied::Rejected { name, message })
        }
        Err(e) if error::is_conflict(&e) => {
            Err(ControllerError::Conflict(format!("{} {}", K::kind(&()), name)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Write `next` to the parent's status subresource unless it equals what is
/// already there. The patch carries the parent's resourceVersion, so a write
/// based on a stale read fails with a conflict instead of clobbering.
#[instrument(skip_all, fields(name = %parent.name_any()))]
pub async fn persist_status<K, S>(
    api: &Api<K>,
    parent: &K,
    previous: Option<&S>,
    next: &S,
) -> Result<bool>
where
    K: Resource + Clone + Debug + DeserializeOwned,
    S: Serialize + PartialEq,
{
    if previous == Some(next) {
        debug!("Status unchanged");
        return Ok(false);
    }
    let name = parent.name_any();
    let patch = serde_json::json!({
        "metadata": { "resourceVersion": parent.resource_version() },
        "status": next,
    });
    match api
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if error::is_conflict(&e) => Err(ControllerError::Conflict(format!("status of {}", name))),
        Err(e) => Err(e.into()),
    }
}
