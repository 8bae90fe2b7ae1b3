// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use crate::types::{Container, Function, Processor, RequestProcessor};
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// A custom resource the controller cannot run without
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredCrd {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl RequiredCrd {
    fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            group: K::group(&()).to_string(),
            version: K::version(&()).to_string(),
            kind: K::kind(&()).to_string(),
        }
    }
}

impl std::fmt::Display for RequiredCrd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}/{})", self.kind, self.group, self.version)
    }
}

pub fn required_crds() -> Vec<RequiredCrd> {
    vec![
        RequiredCrd::of::<Container>(),
        RequiredCrd::of::<Function>(),
        RequiredCrd::of::<Processor>(),
        RequiredCrd::of::<RequestProcessor>(),
    ]
}

/// Wait for every platform CRD to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let required = required_crds();
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match find_missing(client, &required).await {
            Ok(missing) if missing.is_empty() => {
                info!("All {} platform CRDs are available", required.len());
                return Ok(());
            }
            Ok(missing) => {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                info!(
                    "CRDs not yet available: {}, waiting {} seconds...",
                    names.join(", "),
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for platform CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn find_missing(client: &Client, required: &[RequiredCrd]) -> Result<Vec<RequiredCrd>> {
    let mut groups: Vec<&str> = required.iter().map(|r| r.group.as_str()).collect();
    groups.sort_unstable();
    groups.dedup();

    let discovery = Discovery::new(client.clone()).filter(&groups).run().await?;

    let mut discovered = Vec::new();
    for group in discovery.groups() {
        for (ar, _) in group.recommended_resources() {
            discovered.push(RequiredCrd {
                group: group.name().to_string(),
                version: ar.version,
                kind: ar.kind,
            });
        }
    }

    Ok(missing_from(required, &discovered))
}

fn missing_from(required: &[RequiredCrd], discovered: &[RequiredCrd]) -> Vec<RequiredCrd> {
    required
        .iter()
        .filter(|r| !discovered.contains(r))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_crds() {
        let names: Vec<String> = required_crds().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "Container (build.projectriff.io/v1alpha1)",
                "Function (build.projectriff.io/v1alpha1)",
                "Processor (streaming.projectriff.io/v1alpha1)",
                "RequestProcessor (knative.projectriff.io/v1alpha1)",
            ]
        );
    }

    #[test]
    fn test_missing_from() {
        let required = required_crds();
        let discovered = vec![required[0].clone(), required[2].clone()];
        let missing = missing_from(&required, &discovered);
        assert_eq!(missing, vec![required[1].clone(), required[3].clone()]);
        assert!(missing_from(&required, &required).is_empty());
    }
}
