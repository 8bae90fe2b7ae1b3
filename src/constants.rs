// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes label keys used on generated children
pub mod labels {
    /// Marks every child created by this operator
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
}

/// Kubernetes annotation keys used on generated children
pub mod annotations {
    /// sha256 of the manifest the factory produced for a child
    pub const MANIFEST_HASH: &str = "projectriff.io/manifest-hash";
}

/// The operator name used for server-side apply and the managed-by label
pub const OPERATOR_NAME: &str = "riff-controller";

/// Condition types and reasons published on parent resources
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const IMAGE_RESOLVED: &str = "ImageResolved";
    pub const BUILD_READY: &str = "BuildReady";
    pub const DEPLOYMENT_READY: &str = "DeploymentReady";
    pub const AUTOSCALER_READY: &str = "AutoscalerReady";
    pub const FUNCTIONS_READY: &str = "FunctionsReady";

    pub mod reasons {
        pub const NO_BUILD_REFERENCE: &str = "NoBuildReference";
        pub const AMBIGUOUS_BUILD_REFERENCE: &str = "AmbiguousBuildReference";
        pub const EMPTY_BUILD_REFERENCE: &str = "EmptyBuildReference";
        pub const BUILD_NOT_FOUND: &str = "BuildNotFound";
        pub const IMAGE_NOT_RESOLVED: &str = "ImageNotResolved";
        pub const INVALID_BINDINGS: &str = "InvalidBindings";
        pub const INVALID_SCALING: &str = "InvalidScaling";
        pub const AWAITING_IMAGE: &str = "AwaitingImage";
        pub const DEPLOYMENT_NOT_READY: &str = "DeploymentNotReady";
        pub const AUTOSCALER_NOT_READY: &str = "AutoscalerNotReady";
        pub const AUTOSCALING_DISABLED: &str = "AutoscalingDisabled";
        pub const APPLY_FAILED: &str = "ApplyFailed";
        pub const DEFAULT_IMAGE_PREFIX_MISSING: &str = "DefaultImagePrefixMissing";
        pub const FUNCTION_NOT_READY: &str = "FunctionNotReady";
        pub const CONSTRUCTION_FAILED: &str = "ConstructionFailed";
    }
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
