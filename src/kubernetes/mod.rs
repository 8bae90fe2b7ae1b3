// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and namespace scoping.

pub mod crd;

pub use crd::wait_for_crds;

use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};

/// Api over every namespace, or only `namespace` when the controller is scoped
pub fn watched_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}
