// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! RequestProcessor reconciler - keeps one Function per item that declares
//! a function build and aggregates their readiness.

use crate::config::Config;
use crate::error::{ControllerError, Result};
use crate::kubernetes::watched_api;
use crate::reconcilers::backoff::ErrorBackoff;
use crate::reconcilers::children::{
    apply_deletes, apply_upserts, list_children, persist_status, plan_children, Desired,
};
use crate::resources::{desired_function, names};
use crate::status::{request_processor_status, ChildObservation};
use crate::types::{Function, RequestProcessor};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct RequestProcessorReconciler {
    client: Client,
    config: Config,
    backoff: ErrorBackoff,
}

enum ItemSlot {
    NoBuild,
    Wanted(String),
    Failed(String),
}

impl RequestProcessorReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        let backoff = ErrorBackoff::new(config.error_backoff_base, config.error_backoff_max);
        Self {
            client,
            config,
            backoff,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespace = self.config.watch_namespace.clone();
        let parents: Api<RequestProcessor> = watched_api(self.client.clone(), namespace.as_deref());
        let functions: Api<Function> = watched_api(self.client.clone(), namespace.as_deref());
        let children = WatcherConfig::default().labels(&names::owner_label_key::<RequestProcessor>());
        let context = Arc::new(self);

        info!("Starting RequestProcessor reconciler");
        Controller::new(parents, WatcherConfig::default())
            .watches(functions, children, |f| names::parent_ref::<RequestProcessor, _>(&f))
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled request processor: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn reconcile_request_processor(&self, namespace: &str, name: &str) -> Result<Action> {
        let parents: Api<RequestProcessor> = Api::namespaced(self.client.clone(), namespace);
        let Some(rp) = parents.get_opt(name).await? else {
            debug!("RequestProcessor is gone");
            return Ok(Action::await_change());
        };
        let uid = rp
            .uid()
            .ok_or(ControllerError::MissingObjectKey(".metadata.uid"))?;

        let mut slots = Vec::with_capacity(rp.spec.items.len());
        let mut wanted = Vec::new();
        for index in 0..rp.spec.items.len() {
            match desired_function(&rp, index) {
                Ok(Some(function)) => {
                    slots.push(ItemSlot::Wanted(function.name_any()));
                    wanted.push(function);
                }
                Ok(None) => slots.push(ItemSlot::NoBuild),
                Err(ControllerError::Construction(message)) => slots.push(ItemSlot::Failed(message)),
                Err(e) => return Err(e),
            }
        }
        // A failed item may still have a child; collect nothing until it builds
        let desired = if slots.iter().any(|s| matches!(s, ItemSlot::Failed(_))) {
            Desired::Hold
        } else {
            Desired::Exactly(wanted)
        };

        let functions: Api<Function> = Api::namespaced(self.client.clone(), namespace);
        let actual = list_children(&functions, &names::owner_selector(&rp)).await?;
        let plan = plan_children(desired, actual, &uid);
        let applied = apply_upserts(&functions, &plan).await?;
        apply_deletes(&functions, &plan).await?;

        let observations: Vec<ChildObservation<'_, Function>> = slots
            .into_iter()
            .map(|slot| match slot {
                ItemSlot::NoBuild => ChildObservation::NotExpected,
                ItemSlot::Failed(message) => ChildObservation::ConstructionFailed(message),
                ItemSlot::Wanted(name) => applied
                    .iter()
                    .find(|a| a.name() == name)
                    .map(ChildObservation::Applied)
                    .unwrap_or(ChildObservation::Missing),
            })
            .collect();

        let next = request_processor_status(rp.status.as_ref(), rp.meta().generation, &observations);
        if persist_status(&parents, &rp, rp.status.as_ref(), &next).await? {
            info!(functions = next.function_names.len(), "Updated request processor status");
        }

        Ok(Action::requeue(self.config.resync_interval))
    }
}

fn object_key(rp: &RequestProcessor) -> String {
    format!("{}/{}", rp.namespace().unwrap_or_default(), rp.name_any())
}

async fn reconcile(rp: Arc<RequestProcessor>, ctx: Arc<RequestProcessorReconciler>) -> Result<Action> {
    let namespace = rp
        .namespace()
        .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
    let action = ctx
        .reconcile_request_processor(&namespace, &rp.name_any())
        .await?;
    ctx.backoff.reset(&object_key(&rp));
    Ok(action)
}

fn error_policy(
    rp: Arc<RequestProcessor>,
    error: &ControllerError,
    ctx: Arc<RequestProcessorReconciler>,
) -> Action {
    ctx.backoff.action_for(&object_key(&rp), error)
}
