// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Image references for Container and Function builds.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Turns a target image reference into the concrete image consumers roll out.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, image: &str) -> Result<String>;
}

/// Treats the reference itself as the resolved image. Digest lookups against a
/// registry plug in behind [`ImageResolver`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceResolver;

#[async_trait]
impl ImageResolver for ReferenceResolver {
    async fn resolve(&self, image: &str) -> Result<String> {
        Ok(image.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetImageError {
    /// The spec leaves the image blank
    Empty,
    /// The image asks for the default prefix but none is configured
    PrefixMissing(String),
}

impl fmt::Display for TargetImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetImageError::Empty => write!(f, "image is required"),
            TargetImageError::PrefixMissing(image) => write!(
                f,
                "image '{}' needs a default image prefix, set DEFAULT_IMAGE_PREFIX",
                image
            ),
        }
    }
}

/// Expand a declared image against the default prefix.
///
/// `_` becomes `<prefix>/<name>` and `_/rest` becomes `<prefix>/rest`; any
/// other reference is used as is.
pub fn target_image(
    image: &str,
    prefix: Option<&str>,
    name: &str,
) -> std::result::Result<String, TargetImageError> {
    let image = image.trim();
    if image.is_empty() {
        return Err(TargetImageError::Empty);
    }
    let rest = match image.strip_prefix('_') {
        Some("") => name,
        Some(rest) => match rest.strip_prefix('/') {
            Some(rest) => rest,
            None => return Ok(image.to_string()),
        },
        None => return Ok(image.to_string()),
    };
    match prefix {
        Some(prefix) => Ok(format!("{}/{}", prefix, rest)),
        None => Err(TargetImageError::PrefixMissing(image.to_string())),
    }
}
