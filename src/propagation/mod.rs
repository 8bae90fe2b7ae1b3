// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cross-resource image rollout: build image changes re-enqueue every
//! processor that references the build.

pub mod index;
pub mod router;
pub mod watch;

pub use index::{DependencyIndex, ProcessorKey};
pub use router::{Router, RouterEvent, RouterHandle, Triggers};
pub use watch::{pump_builds, pump_processors};
