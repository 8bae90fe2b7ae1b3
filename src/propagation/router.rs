// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Routes build image changes to the processors that consume them.
//!
//! The router task is the only writer of the dependency index. Reconcilers
//! report what they see through a [`RouterHandle`]; the router turns image
//! changes into processor keys on the trigger stream the processor
//! controller consumes.

use crate::propagation::index::{DependencyIndex, ProcessorKey};
use crate::types::{BuildKey, Processor};
use futures::channel::mpsc as trigger_channel;
use kube::runtime::reflector::ObjectRef;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Events reconcilers send to the Router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// A processor was reconciled with this build reference
    ProcessorApplied {
        processor: ProcessorKey,
        build: Option<BuildKey>,
    },
    /// A processor no longer exists
    ProcessorDeleted { processor: ProcessorKey },
    /// A build was reconciled and publishes this image
    ImageObserved {
        build: BuildKey,
        image: Option<String>,
    },
    /// A build no longer exists
    BuildDeleted { build: BuildKey },
}

/// Processor keys to reconcile because a build they use changed
pub type Triggers = trigger_channel::UnboundedReceiver<ObjectRef<Processor>>;

pub struct Router {
    index: DependencyIndex,
    images: HashMap<BuildKey, Option<String>>,
    event_rx: mpsc::Receiver<RouterEvent>,
    trigger_tx: trigger_channel::UnboundedSender<ObjectRef<Processor>>,
}

/// Handle to send events to the Router
#[derive(Clone)]
pub struct RouterHandle {
    event_tx: mpsc::Sender<RouterEvent>,
}

impl RouterHandle {
    pub async fn send(&self, event: RouterEvent) {
        if let Err(e) = self.event_tx.send(event).await {
            error!("Failed to send event to Router: {}", e);
        }
    }
}

impl Router {
    pub fn new() -> (Self, RouterHandle, Triggers) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (trigger_tx, triggers) = trigger_channel::unbounded();

        let router = Self {
            index: DependencyIndex::new(),
            images: HashMap::new(),
            event_rx,
            trigger_tx,
        };

        (router, RouterHandle { event_tx }, triggers)
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Router started, listening for events...");

        while let Some(event) = self.event_rx.recv().await {
            for processor in self.handle_event(event) {
                if self.trigger_tx.unbounded_send(processor).is_err() {
                    warn!("Processor controller stopped consuming triggers");
                }
            }
        }

        Ok(())
    }

    /// Apply one event to the index and return the processors to re-reconcile.
    #[instrument(skip(self))]
    pub fn handle_event(&mut self, event: RouterEvent) -> Vec<ObjectRef<Processor>> {
        match event {
            RouterEvent::ProcessorApplied { processor, build } => {
                let moved = self.index.upsert(processor.clone(), build.clone());
                // The build's image may have been observed before this processor referenced it
                match build {
                    Some(build) if moved && matches!(self.images.get(&build), Some(Some(_))) => {
                        debug!(%processor, %build, "Processor moved to a build with a known image");
                        vec![processor.object_ref()]
                    }
                    _ => Vec::new(),
                }
            }
            RouterEvent::ProcessorDeleted { processor } => {
                self.index.remove(&processor);
                Vec::new()
            }
            RouterEvent::ImageObserved { build, image } => {
                if self.images.get(&build) == Some(&image) {
                    return Vec::new();
                }
                info!(%build, image = image.as_deref().unwrap_or(""), "Build image changed");
                self.images.insert(build.clone(), image);
                self.dependents(&build)
            }
            RouterEvent::BuildDeleted { build } => {
                if self.images.remove(&build).is_none() {
                    return Vec::new();
                }
                info!(%build, "Build deleted");
                self.dependents(&build)
            }
        }
    }

    fn dependents(&self, build: &BuildKey) -> Vec<ObjectRef<Processor>> {
        let refs: Vec<ObjectRef<Processor>> = self
            .index
            .dependents_of(build)
            .map(ProcessorKey::object_ref)
            .collect();
        debug!(%build, count = refs.len(), "Re-enqueueing dependents");
        refs
    }
}
