// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod backoff;
pub mod build;
pub mod children;
pub mod processor;
pub mod request_processor;

pub use build::BuildReconciler;
pub use processor::ProcessorReconciler;
pub use request_processor::RequestProcessorReconciler;
