// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Processor reconciler - converges a processor's Deployment and autoscaler
//! on its build's latest image and reports their health.

use crate::config::Config;
use crate::constants::conditions::{self, reasons};
use crate::error::{ControllerError, Result};
use crate::kubernetes::watched_api;
use crate::propagation::Triggers;
use crate::reconcilers::backoff::ErrorBackoff;
use crate::reconcilers::children::{
    apply_deletes, apply_upserts, list_children, persist_status, plan_children, Applied,
    ChildResource, Desired,
};
use crate::resources::{desired_autoscaler, desired_deployment, names};
use crate::status::{processor_status, BuildResolution, ChildObservation};
use crate::types::{BuildRef, BuildSource, Container, Function, Processor, ResourceStatus};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ProcessorReconciler {
    client: Client,
    config: Config,
    backoff: ErrorBackoff,
}

/// What the factory produced for one child slot
enum Wanted<K> {
    /// Converge on this (possibly empty) set
    Children(Vec<K>),
    /// Leave existing children alone
    Hold,
    /// The factory failed; existing children are left alone
    Failed(String),
}

impl<K> Wanted<K> {
    fn from_factory(result: Result<Option<K>>) -> Result<Self> {
        match result {
            Ok(child) => Ok(Wanted::Children(child.into_iter().collect())),
            Err(ControllerError::Construction(message)) => Ok(Wanted::Failed(message)),
            Err(e) => Err(e),
        }
    }

    fn has_children(&self) -> bool {
        matches!(self, Wanted::Children(children) if !children.is_empty())
    }

    fn split(self) -> (Desired<K>, Slot) {
        match self {
            Wanted::Children(children) => {
                let slot = if children.is_empty() {
                    Slot::NotExpected
                } else {
                    Slot::Expected
                };
                (Desired::Exactly(children), slot)
            }
            Wanted::Hold => (Desired::Hold, Slot::Expected),
            Wanted::Failed(message) => (Desired::Hold, Slot::Failed(message)),
        }
    }
}

enum Slot {
    NotExpected,
    Expected,
    Failed(String),
}

fn observe<'a, K: ChildResource>(slot: Slot, applied: &'a [Applied<K>]) -> ChildObservation<'a, K> {
    match slot {
        Slot::Failed(message) => ChildObservation::ConstructionFailed(message),
        Slot::NotExpected => ChildObservation::NotExpected,
        Slot::Expected => ChildObservation::from_applied(applied).unwrap_or(ChildObservation::Missing),
    }
}

impl ProcessorReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        let backoff = ErrorBackoff::new(config.error_backoff_base, config.error_backoff_max);
        Self {
            client,
            config,
            backoff,
        }
    }

    /// Run until the watches end. `triggers` carries processors whose build
    /// published a new image.
    pub async fn run(self, triggers: Triggers) -> anyhow::Result<()> {
        let namespace = self.config.watch_namespace.clone();
        let processors: Api<Processor> = watched_api(self.client.clone(), namespace.as_deref());
        let deployments: Api<Deployment> = watched_api(self.client.clone(), namespace.as_deref());
        let autoscalers: Api<HorizontalPodAutoscaler> =
            watched_api(self.client.clone(), namespace.as_deref());
        let children = WatcherConfig::default().labels(&names::owner_label_key::<Processor>());
        let context = Arc::new(self);

        info!("Starting Processor reconciler");
        Controller::new(processors, WatcherConfig::default())
            .watches(deployments, children.clone(), |d| names::parent_ref::<Processor, _>(&d))
            .watches(autoscalers, children, |h| names::parent_ref::<Processor, _>(&h))
            .reconcile_on(triggers)
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled processor: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn reconcile_processor(&self, namespace: &str, name: &str) -> Result<Action> {
        let processors: Api<Processor> = Api::namespaced(self.client.clone(), namespace);
        let Some(processor) = processors.get_opt(name).await? else {
            debug!("Processor is gone");
            return Ok(Action::await_change());
        };
        let uid = processor
            .uid()
            .ok_or(ControllerError::MissingObjectKey(".metadata.uid"))?;

        let build_ref = processor.spec.build_ref();
        let validation = processor.spec.validate();
        let resolution = match &build_ref {
            Err(e) => BuildResolution::Invalid(e.clone()),
            Ok(None) => BuildResolution::NoBuild,
            Ok(Some(build)) => self.resolve_build(namespace, build).await?,
        };

        let spec_ok = build_ref.is_ok() && validation.is_ok();
        let (deployment_wanted, autoscaler_wanted) = if !spec_ok {
            (Wanted::Hold, Wanted::Hold)
        } else {
            let image = match &resolution {
                BuildResolution::Resolved(image) => Some(image.clone()),
                _ => processor
                    .status
                    .as_ref()
                    .and_then(|s| s.latest_image.clone())
                    .filter(|image| !image.is_empty()),
            };
            let deployment = match (&resolution, image) {
                (BuildResolution::NoBuild, _) => Wanted::Children(Vec::new()),
                (_, Some(image)) => Wanted::from_factory(desired_deployment(&processor, &image))?,
                // No image has ever been resolved for this build
                (_, None) => Wanted::Hold,
            };
            let autoscaler = match Wanted::from_factory(desired_autoscaler(&processor))? {
                Wanted::Children(wanted) if wanted.is_empty() => Wanted::Children(wanted),
                Wanted::Failed(message) => Wanted::Failed(message),
                // An autoscaler is only converged alongside the deployment it targets
                wanted if deployment.has_children() => wanted,
                _ => Wanted::Hold,
            };
            (deployment, autoscaler)
        };

        let selector = names::owner_selector(&processor);
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let autoscalers: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), namespace);

        let (desired, deployment_slot) = deployment_wanted.split();
        let deployment_plan = plan_children(desired, list_children(&deployments, &selector).await?, &uid);
        let (desired, autoscaler_slot) = autoscaler_wanted.split();
        let autoscaler_plan = plan_children(desired, list_children(&autoscalers, &selector).await?, &uid);

        let applied_deployments = apply_upserts(&deployments, &deployment_plan).await?;
        let applied_autoscalers = apply_upserts(&autoscalers, &autoscaler_plan).await?;
        apply_deletes(&autoscalers, &autoscaler_plan).await?;
        apply_deletes(&deployments, &deployment_plan).await?;

        let next = processor_status(
            processor.status.as_ref(),
            processor.meta().generation,
            &resolution,
            validation.as_ref().map(|_| ()),
            observe(deployment_slot, &applied_deployments),
            observe(autoscaler_slot, &applied_autoscalers),
        );
        if persist_status(&processors, &processor, processor.status.as_ref(), &next).await? {
            info!(
                ready = next
                    .condition(conditions::READY)
                    .map(|c| c.status.as_str())
                    .unwrap_or(""),
                "Updated processor status"
            );
        }

        if let Err(e) = build_ref.and(validation) {
            debug!("Processor spec is invalid: {}", e);
        }
        Ok(Action::requeue(self.config.resync_interval))
    }

    async fn resolve_build(&self, namespace: &str, build: &BuildRef) -> Result<BuildResolution> {
        match build {
            BuildRef::Container(name) => {
                resolve_from::<Container>(Api::namespaced(self.client.clone(), namespace), name).await
            }
            BuildRef::Function(name) => {
                resolve_from::<Function>(Api::namespaced(self.client.clone(), namespace), name).await
            }
        }
    }
}

/// Latest image of the named build. A missing or unresolved build is a
/// pending state, not an error; only API failures are errors.
async fn resolve_from<B: BuildSource>(api: Api<B>, name: &str) -> Result<BuildResolution> {
    let Some(build) = api.get_opt(name).await? else {
        return Ok(BuildResolution::Pending {
            reason: reasons::BUILD_NOT_FOUND,
            message: format!("{} '{}' not found", B::BUILD_KIND, name),
        });
    };
    Ok(match build.latest_image() {
        Some(image) => BuildResolution::Resolved(image.to_string()),
        None => BuildResolution::Pending {
            reason: reasons::IMAGE_NOT_RESOLVED,
            message: format!("{} '{}' has not resolved an image yet", B::BUILD_KIND, name),
        },
    })
}

fn object_key(processor: &Processor) -> String {
    format!("{}/{}", processor.namespace().unwrap_or_default(), processor.name_any())
}

async fn reconcile(processor: Arc<Processor>, ctx: Arc<ProcessorReconciler>) -> Result<Action> {
    let namespace = processor
        .namespace()
        .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
    let action = ctx.reconcile_processor(&namespace, &processor.name_any()).await?;
    ctx.backoff.reset(&object_key(&processor));
    Ok(action)
}

fn error_policy(processor: Arc<Processor>, error: &ControllerError, ctx: Arc<ProcessorReconciler>) -> Action {
    ctx.backoff.action_for(&object_key(&processor), error)
}
