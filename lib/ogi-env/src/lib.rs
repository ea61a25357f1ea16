//! Cloud and runtime environment detection.
//!
//! Process bootstrap needs to know which cloud provider and execution substrate it is running
//! under -- a bare server, a managed Kubernetes cluster, or a serverless runtime -- in order to
//! select environment-specific configuration. This crate determines that by running a layered
//! probe pipeline over several independent signals: metadata-endpoint reachability, injected
//! service account files, orchestration API node labels, and runtime-injected environment
//! variables.
//!
//! Detection is a single call ([`detect_environment`], or [`EnvironmentDetector::detect`] for
//! custom probe configuration) that either yields a [`CloudEnvironment`] or fails fast with
//! [`DetectionError::UnsupportedEnvironment`]; callers are expected to treat that failure as
//! fatal rather than retry.
#![deny(warnings)]
#![deny(missing_docs)]

mod detector;
pub use self::detector::{detect_environment, DetectionError, EnvironmentDetector};

mod environment;
pub use self::environment::{CloudEnvironment, CloudProvider};

mod kubernetes;
pub use self::kubernetes::{InClusterNodeLookup, NodeMetadataLookup};

mod probe;
pub use self::probe::{MetadataEndpoint, ProbeOutcome};

mod server;
mod serverless;
