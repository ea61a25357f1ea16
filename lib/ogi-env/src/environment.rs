use std::fmt;
use std::str::FromStr;

use ogi_error::{generic_error, GenericError};

/// A cloud provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CloudProvider {
    /// Amazon Web Services.
    Aws,

    /// Microsoft Azure.
    Azure,

    /// Google Cloud Platform.
    Gcp,
}

impl CloudProvider {
    /// Returns the canonical identifier of this provider.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The environment a process is running in: which cloud provider is in play, and on which
/// execution substrate.
///
/// This is a closed enumeration. Downstream code dispatches on it with exhaustive `match`
/// expressions, so adding a variant is a compile-time-visible change rather than a stringly-typed
/// one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CloudEnvironment {
    /// A bare virtual or physical server with a reachable cloud metadata service.
    Server(CloudProvider),

    /// A managed Kubernetes cluster (EKS, AKS, or GKE).
    Kubernetes(CloudProvider),

    /// A function-as-a-service runtime (Lambda, Azure Functions, Cloud Functions).
    Serverless(CloudProvider),
}

impl CloudEnvironment {
    /// Returns the canonical identifier of this environment.
    ///
    /// Identifiers are stable, and are the values callers should use as configuration keys when
    /// selecting environment-specific settings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server(CloudProvider::Aws) => "aws",
            Self::Server(CloudProvider::Azure) => "azure",
            Self::Server(CloudProvider::Gcp) => "gcp",
            Self::Kubernetes(CloudProvider::Aws) => "aws-eks",
            Self::Kubernetes(CloudProvider::Azure) => "azure-aks",
            Self::Kubernetes(CloudProvider::Gcp) => "gcp-gke",
            Self::Serverless(CloudProvider::Aws) => "aws-lambda",
            Self::Serverless(CloudProvider::Azure) => "azure-functions",
            Self::Serverless(CloudProvider::Gcp) => "gcp-cloud-functions",
        }
    }

    /// Returns the cloud provider managing this environment.
    pub const fn provider(self) -> CloudProvider {
        match self {
            Self::Server(provider) | Self::Kubernetes(provider) | Self::Serverless(provider) => provider,
        }
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudEnvironment {
    type Err = GenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Self::Server(CloudProvider::Aws)),
            "azure" => Ok(Self::Server(CloudProvider::Azure)),
            "gcp" => Ok(Self::Server(CloudProvider::Gcp)),
            "aws-eks" => Ok(Self::Kubernetes(CloudProvider::Aws)),
            "azure-aks" => Ok(Self::Kubernetes(CloudProvider::Azure)),
            "gcp-gke" => Ok(Self::Kubernetes(CloudProvider::Gcp)),
            "aws-lambda" => Ok(Self::Serverless(CloudProvider::Aws)),
            "azure-functions" => Ok(Self::Serverless(CloudProvider::Azure)),
            "gcp-cloud-functions" => Ok(Self::Serverless(CloudProvider::Gcp)),
            _ => Err(generic_error!("unknown environment identifier '{}'", s)),
        }
    }
}
