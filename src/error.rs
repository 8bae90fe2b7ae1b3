// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Stale resource version: {0}")]
    Conflict(String),

    #[error("Object is missing key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Cannot construct child resource: {0}")]
    Construction(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image resolution failed: {0}")]
    ImageResolution(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

impl ControllerError {
    /// A write was rejected because the object changed since it was read
    pub fn is_conflict(&self) -> bool {
        match self {
            ControllerError::Conflict(_) => true,
            ControllerError::KubeError(e) => is_conflict(e),
            _ => false,
        }
    }
}

/// Optimistic concurrency failure (stale resourceVersion or concurrent create)
pub fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(err) if err.code == 409)
}

/// The API server refused the manifest itself; retrying the same body cannot help
pub fn is_rejected(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(err) if err.code == 400 || err.code == 422)
}

pub fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(err) if err.code == 404)
}
