// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Build reconciler - resolves the image of a Container or Function and
//! publishes it on the resource's status.

use crate::config::Config;
use crate::error::{ControllerError, Result};
use crate::images::{target_image, ImageResolver};
use crate::kubernetes::watched_api;
use crate::reconcilers::backoff::ErrorBackoff;
use crate::reconcilers::children::persist_status;
use crate::status::{build_status, BuildOutcome};
use crate::types::BuildSource;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct BuildReconciler<B> {
    client: Client,
    config: Config,
    resolver: Arc<dyn ImageResolver>,
    backoff: ErrorBackoff,
    _kind: PhantomData<fn() -> B>,
}

impl<B: BuildSource> BuildReconciler<B> {
    pub fn new(client: Client, config: Config, resolver: Arc<dyn ImageResolver>) -> Self {
        let backoff = ErrorBackoff::new(config.error_backoff_base, config.error_backoff_max);
        Self {
            client,
            config,
            resolver,
            backoff,
            _kind: PhantomData,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let builds: Api<B> = watched_api(self.client.clone(), self.config.watch_namespace.as_deref());
        let context = Arc::new(self);

        info!("Starting {} reconciler", B::BUILD_KIND);
        Controller::new(builds, WatcherConfig::default())
            .run(reconcile::<B>, error_policy::<B>, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled {}: {:?}", B::BUILD_KIND, o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    #[instrument(skip(self), fields(kind = %B::BUILD_KIND))]
    async fn reconcile_build(&self, namespace: &str, name: &str) -> Result<Action> {
        let builds: Api<B> = Api::namespaced(self.client.clone(), namespace);
        let Some(build) = builds.get_opt(name).await? else {
            debug!("Build is gone");
            return Ok(Action::await_change());
        };

        let outcome = match target_image(
            build.image(),
            self.config.default_image_prefix.as_deref(),
            name,
        ) {
            Ok(target) => {
                let image = self.resolver.resolve(&target).await?;
                BuildOutcome::Resolved { target, image }
            }
            Err(e) => {
                info!("Image cannot be resolved: {}", e);
                BuildOutcome::InvalidTarget(e)
            }
        };

        let next = build_status(build.build_status(), build.meta().generation, &outcome);
        if persist_status(&builds, &build, build.build_status(), &next).await? {
            info!(
                latest_image = next.latest_image.as_deref().unwrap_or(""),
                "Updated build status"
            );
        }

        Ok(Action::requeue(self.config.resync_interval))
    }
}

fn object_key<B: BuildSource>(build: &B) -> String {
    format!("{}/{}", build.namespace().unwrap_or_default(), build.name_any())
}

async fn reconcile<B: BuildSource>(build: Arc<B>, ctx: Arc<BuildReconciler<B>>) -> Result<Action> {
    let namespace = build
        .namespace()
        .ok_or(ControllerError::MissingObjectKey(".metadata.namespace"))?;
    let action = ctx.reconcile_build(&namespace, &build.name_any()).await?;
    ctx.backoff.reset(&object_key(build.as_ref()));
    Ok(action)
}

fn error_policy<B: BuildSource>(
    build: Arc<B>,
    error: &ControllerError,
    ctx: Arc<BuildReconciler<B>>,
) -> Action {
    ctx.backoff.action_for(&object_key(build.as_ref()), error)
}
