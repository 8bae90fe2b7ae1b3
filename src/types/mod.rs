// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources managed by the controller.

pub mod build;
pub mod processor;
pub mod request_processor;
pub mod status;

pub use build::{BuildKey, BuildKind, BuildSource, BuildStatus, Container, Function, FunctionSpec};
pub use processor::{BuildRef, Processor, ProcessorSpec, ProcessorStatus, SpecError, StreamBinding};
pub use request_processor::{RequestProcessor, RequestProcessorSpec, RequestProcessorStatus};
pub use status::{Condition, ConditionSet, ResourceStatus};
