// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use riff_controller::config::Config;
use riff_controller::images::{ImageResolver, ReferenceResolver};
use riff_controller::kubernetes::{wait_for_crds, watched_api};
use riff_controller::propagation::{pump_builds, pump_processors, Router};
use riff_controller::reconcilers::{BuildReconciler, ProcessorReconciler, RequestProcessorReconciler};
use riff_controller::types::{Container, Function, Processor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting riff controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: default_image_prefix={}, watch_namespace={}",
        config.default_image_prefix.as_deref().unwrap_or("<unset>"),
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for platform CRDs to become available...");
    wait_for_crds(&client).await?;

    // The router turns build image changes into processor triggers
    let (router, router_handle, triggers) = Router::new();
    let namespace = config.watch_namespace.clone();
    let resolver: Arc<dyn ImageResolver> = Arc::new(ReferenceResolver);

    let containers = BuildReconciler::<Container>::new(client.clone(), config.clone(), resolver.clone());
    let functions = BuildReconciler::<Function>::new(client.clone(), config.clone(), resolver);
    let processors = ProcessorReconciler::new(client.clone(), config.clone());
    let request_processors = RequestProcessorReconciler::new(client.clone(), config);

    info!("Starting reconcilers...");

    tokio::try_join!(
        router.run(),
        pump_processors(
            watched_api::<Processor>(client.clone(), namespace.as_deref()),
            router_handle.clone()
        ),
        pump_builds(
            watched_api::<Container>(client.clone(), namespace.as_deref()),
            router_handle.clone()
        ),
        pump_builds(
            watched_api::<Function>(client.clone(), namespace.as_deref()),
            router_handle
        ),
        containers.run(),
        functions.run(),
        processors.run(triggers),
        request_processors.run()
    )?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
