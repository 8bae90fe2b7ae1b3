// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod images;
pub mod kubernetes;
pub mod propagation;
pub mod reconcilers;
pub mod resources;
pub mod status;
pub mod types;

#[cfg(test)]
pub mod test_utils;
