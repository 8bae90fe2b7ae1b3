// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch pumps that feed the router.
//!
//! The controllers never see deletions, so the router learns about
//! processors and builds from plain watch streams instead.

use crate::propagation::index::ProcessorKey;
use crate::propagation::router::{RouterEvent, RouterHandle};
use crate::types::{BuildSource, Processor};
use futures::{StreamExt, TryStreamExt};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, ResourceExt};
use tracing::{info, warn};

fn processor_key(processor: &Processor) -> ProcessorKey {
    ProcessorKey::new(&processor.namespace().unwrap_or_default(), &processor.name_any())
}

/// Router event for one processor watch event
pub fn processor_event(event: watcher::Event<Processor>) -> Option<RouterEvent> {
    match event {
        watcher::Event::Apply(processor) | watcher::Event::InitApply(processor) => {
            Some(RouterEvent::ProcessorApplied {
                processor: processor_key(&processor),
                build: processor.build_key(),
            })
        }
        watcher::Event::Delete(processor) => Some(RouterEvent::ProcessorDeleted {
            processor: processor_key(&processor),
        }),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Router event for one Container or Function watch event
pub fn build_event<B: BuildSource>(event: watcher::Event<B>) -> Option<RouterEvent> {
    match event {
        watcher::Event::Apply(build) | watcher::Event::InitApply(build) => Some(RouterEvent::ImageObserved {
            build: build.build_key(),
            image: build.latest_image().map(str::to_string),
        }),
        watcher::Event::Delete(build) => Some(RouterEvent::BuildDeleted {
            build: build.build_key(),
        }),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Forward processor changes to the router until the watch ends
pub async fn pump_processors(api: Api<Processor>, handle: RouterHandle) -> anyhow::Result<()> {
    info!("Watching processors for build references");
    pump(api, handle, processor_event).await
}

/// Forward image changes of one build kind to the router until the watch ends
pub async fn pump_builds<B: BuildSource>(api: Api<B>, handle: RouterHandle) -> anyhow::Result<()> {
    info!("Watching {} images", B::BUILD_KIND);
    pump(api, handle, build_event::<B>).await
}

async fn pump<K, F>(api: Api<K>, handle: RouterHandle, translate: F) -> anyhow::Result<()>
where
    K: kube::Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::de::DeserializeOwned + Send + 'static,
    F: Fn(watcher::Event<K>) -> Option<RouterEvent>,
{
    let mut events = watcher(api, watcher::Config::default()).default_backoff().boxed();
    loop {
        match events.try_next().await {
            Ok(Some(event)) => {
                if let Some(event) = translate(event) {
                    handle.send(event).await;
                }
            }
            Ok(None) => return Ok(()),
            // The backoff retries the watch; the error is only reported
            Err(e) => warn!("Watch error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::build::ContainerSpec;
    use crate::types::processor::{Build, ProcessorSpec};
    use crate::types::{BuildKey, BuildKind, BuildStatus, Container};

    fn make_processor(container: Option<&str>) -> Processor {
        let mut processor = Processor::new(
            "square",
            ProcessorSpec {
                build: container.map(|c| Build {
                    container_ref: Some(c.to_string()),
                    function_ref: None,
                }),
                inputs: vec![],
                outputs: vec![],
                template: None,
                scaling: None,
            },
        );
        processor.metadata.namespace = Some("default".to_string());
        processor
    }

    fn make_container(latest_image: Option<&str>) -> Container {
        let mut container = Container::new(
            "square",
            ContainerSpec {
                image: "registry.example.com/square".to_string(),
            },
        );
        container.metadata.namespace = Some("default".to_string());
        container.status = latest_image.map(|image| BuildStatus {
            latest_image: Some(image.to_string()),
            ..Default::default()
        });
        container
    }

    #[test]
    fn test_processor_events() {
        let key = ProcessorKey::new("default", "square");
        assert_eq!(
            processor_event(watcher::Event::InitApply(make_processor(Some("square")))),
            Some(RouterEvent::ProcessorApplied {
                processor: key.clone(),
                build: Some(BuildKey::new(BuildKind::Container, "default", "square")),
            })
        );
        assert_eq!(
            processor_event(watcher::Event::Apply(make_processor(None))),
            Some(RouterEvent::ProcessorApplied {
                processor: key.clone(),
                build: None,
            })
        );
        assert_eq!(
            processor_event(watcher::Event::Delete(make_processor(None))),
            Some(RouterEvent::ProcessorDeleted { processor: key })
        );
        assert_eq!(processor_event(watcher::Event::InitDone), None);
    }

    #[test]
    fn test_build_events() {
        let build = BuildKey::new(BuildKind::Container, "default", "square");
        assert_eq!(
            build_event(watcher::Event::Apply(make_container(Some("registry.example.com/square@sha256:aaa")))),
            Some(RouterEvent::ImageObserved {
                build: build.clone(),
                image: Some("registry.example.com/square@sha256:aaa".to_string()),
            })
        );
        assert_eq!(
            build_event(watcher::Event::Apply(make_container(None))),
            Some(RouterEvent::ImageObserved {
                build: build.clone(),
                image: None,
            })
        );
        assert_eq!(
            build_event(watcher::Event::Delete(make_container(None))),
            Some(RouterEvent::BuildDeleted { build })
        );
        assert_eq!(build_event::<Container>(watcher::Event::Init), None);
    }
}
