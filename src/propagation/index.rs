// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::{BuildKey, Processor};
use kube::runtime::reflector::ObjectRef;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Namespace and name of a processor
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorKey {
    pub namespace: String,
    pub name: String,
}

impl ProcessorKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn object_ref(&self) -> ObjectRef<Processor> {
        ObjectRef::new(&self.name).within(&self.namespace)
    }
}

impl fmt::Display for ProcessorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Which processors depend on which build, kept current one processor at a time.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    dependents: HashMap<BuildKey, BTreeSet<ProcessorKey>>,
    builds: HashMap<ProcessorKey, BuildKey>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `processor` now depends on `build` (or on nothing),
    /// dropping whatever it depended on before. Returns true when the
    /// processor moved to a different build.
    pub fn upsert(&mut self, processor: ProcessorKey, build: Option<BuildKey>) -> bool {
        match build {
            Some(build) => {
                if self.builds.get(&processor) == Some(&build) {
                    return false;
                }
                self.remove(&processor);
                self.dependents
                    .entry(build.clone())
                    .or_default()
                    .insert(processor.clone());
                self.builds.insert(processor, build);
                true
            }
            None => self.remove(&processor),
        }
    }

    /// Forget `processor`. Returns true when it depended on a build.
    pub fn remove(&mut self, processor: &ProcessorKey) -> bool {
        let Some(build) = self.builds.remove(processor) else {
            return false;
        };
        if let Some(set) = self.dependents.get_mut(&build) {
            set.remove(processor);
            if set.is_empty() {
                self.dependents.remove(&build);
            }
        }
        true
    }

    pub fn dependents_of(&self, build: &BuildKey) -> impl Iterator<Item = &ProcessorKey> {
        self.dependents.get(build).into_iter().flatten()
    }

    #[cfg(test)]
    pub fn build_of(&self, processor: &ProcessorKey) -> Option<&BuildKey> {
        self.builds.get(processor)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.builds.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}
