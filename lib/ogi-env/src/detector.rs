use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ogi_config::GenericConfiguration;
use ogi_error::{ErrorContext as _, GenericError};
use snafu::Snafu;
use tracing::{debug, info};

use crate::environment::{CloudEnvironment, CloudProvider};
use crate::kubernetes::{self, InClusterNodeLookup, NodeMetadataLookup};
use crate::probe;
use crate::server::{self, ServerProbes};
use crate::serverless;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

const ENVIRONMENT_OVERRIDE_ENV_VAR: &str = "CLOUD_ENV_OVERRIDE";
const POD_NAME_ENV_VAR: &str = "HOSTNAME";

const PROBE_TIMEOUT_CONFIG_KEY: &str = "cloud_probe_timeout_ms";

/// An environment detection error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum DetectionError {
    /// No detection stage produced a positive signal.
    #[snafu(display("Unsupported environment. No cloud provider or serverless runtime could be identified."))]
    UnsupportedEnvironment,

    /// The operator-supplied override does not name a known environment.
    #[snafu(display("Invalid environment override '{}'. Expected a canonical environment identifier.", value))]
    InvalidOverride {
        /// The rejected override value.
        value: String,
    },
}

/// Detects which cloud provider and execution substrate the process is running under.
///
/// Detection runs up to three stages in a strict precedence order, stopping at the first stage
/// that produces a positive signal:
///
/// 1. Container orchestration: an injected service account on the local filesystem marks an
///    in-cluster environment, and the managing provider is identified from the labels of the node
///    hosting the current workload. The filesystem check is instantaneous and the most specific
///    signal available, so it goes first. When the cluster is detected but the managing provider
///    cannot be identified, detection terminates as unsupported rather than falling through: the
///    remaining stages describe substrates the process is demonstrably not on.
/// 2. Bare server: provider-specific metadata endpoints are probed over the network with a short
///    timeout, concurrently, with a fixed-order tie-break.
/// 3. Serverless: provider-injected environment variables, the least specific signal, checked
///    last. Serverless runtimes do not expose reachable metadata services, so stage 2 cannot
///    shadow this one.
///
/// An operator can short-circuit all of the above by setting `CLOUD_ENV_OVERRIDE` to a canonical
/// environment identifier.
///
/// The detector holds no state across calls: every probe result is produced and consumed within a
/// single [`detect`][Self::detect] invocation, so a detector can be shared or rebuilt freely
/// without staleness concerns.
pub struct EnvironmentDetector {
    probe_timeout: Duration,
    server_probes: ServerProbes,
    kubernetes_marker_paths: Vec<PathBuf>,
    namespace_file_path: PathBuf,
    pod_name_env_var: String,
    serverless_markers: Vec<(CloudProvider, String)>,
    override_env_var: String,
    node_lookup: Arc<dyn NodeMetadataLookup>,
}

impl EnvironmentDetector {
    /// Creates a new `EnvironmentDetector` with the well-known probe endpoints, marker paths, and
    /// the default probe timeout.
    pub fn new() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            server_probes: ServerProbes::well_known(),
            kubernetes_marker_paths: kubernetes::well_known_marker_paths(),
            namespace_file_path: PathBuf::from(kubernetes::SERVICE_ACCOUNT_NAMESPACE_FILE),
            pod_name_env_var: POD_NAME_ENV_VAR.to_string(),
            serverless_markers: serverless::well_known_markers(),
            override_env_var: ENVIRONMENT_OVERRIDE_ENV_VAR.to_string(),
            node_lookup: Arc::new(InClusterNodeLookup),
        }
    }

    /// Creates a new `EnvironmentDetector`, honoring overrides from the given configuration.
    ///
    /// Currently a single override is supported: `cloud_probe_timeout_ms` adjusts the per-request
    /// timeout of the metadata probes.
    ///
    /// # Errors
    ///
    /// If a recognized configuration value is present but cannot be deserialized, an error will be
    /// returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let mut detector = Self::new();

        if let Some(timeout_ms) = config
            .try_get_typed::<u64>(PROBE_TIMEOUT_CONFIG_KEY)
            .error_context("Failed to read cloud probe timeout from configuration.")?
        {
            detector.probe_timeout = Duration::from_millis(timeout_ms);
        }

        Ok(detector)
    }

    /// Replaces the orchestration API implementation used by the Kubernetes stage.
    ///
    /// Defaults to [`InClusterNodeLookup`].
    pub fn with_node_lookup<L>(mut self, lookup: L) -> Self
    where
        L: NodeMetadataLookup + 'static,
    {
        self.node_lookup = Arc::new(lookup);
        self
    }

    /// Detects the environment the current process is running in.
    ///
    /// # Errors
    ///
    /// If no stage produces a positive signal, or if an operator-supplied override does not name
    /// a known environment, an error will be returned.
    pub async fn detect(&self) -> Result<CloudEnvironment, DetectionError> {
        if let Some(value) = probe::non_empty_env_var(&self.override_env_var) {
            return match value.parse::<CloudEnvironment>() {
                Ok(environment) => {
                    info!(environment = environment.as_str(), "Environment override set. Skipping detection.");
                    Ok(environment)
                }
                Err(_) => Err(DetectionError::InvalidOverride { value }),
            };
        }

        if probe::any_path_exists(&self.kubernetes_marker_paths) {
            debug!("Found in-cluster service account marker. Identifying managing provider.");
            return match self.identify_kubernetes_provider().await {
                Some(provider) => {
                    let environment = CloudEnvironment::Kubernetes(provider);
                    info!(environment = environment.as_str(), "Detected managed Kubernetes environment.");
                    Ok(environment)
                }
                // Inside a cluster, but nothing marks who manages it. The other stages describe
                // substrates this process is not on, so terminate instead of falling through.
                None => Err(DetectionError::UnsupportedEnvironment),
            };
        }

        if let Some(provider) = self.identify_server_provider().await {
            let environment = CloudEnvironment::Server(provider);
            info!(environment = environment.as_str(), "Detected cloud server environment.");
            return Ok(environment);
        }

        if let Some(provider) = serverless::identify_serverless_provider(&self.serverless_markers) {
            let environment = CloudEnvironment::Serverless(provider);
            info!(environment = environment.as_str(), "Detected serverless environment.");
            return Ok(environment);
        }

        Err(DetectionError::UnsupportedEnvironment)
    }

    /// Checks whether any cloud metadata service is reachable from this process.
    ///
    /// This only establishes "some metadata service answered", not which provider is behind it,
    /// and is independent of the precedence chain in [`detect`][Self::detect].
    pub async fn is_metadata_service_reachable(&self) -> bool {
        match self.http_client() {
            Ok(client) => server::is_metadata_service_reachable(&client, &self.server_probes).await,
            Err(e) => {
                debug!(error = %e, "Failed to build HTTP client for metadata probes.");
                false
            }
        }
    }

    fn http_client(&self) -> Result<reqwest::Client, GenericError> {
        reqwest::Client::builder()
            .timeout(self.probe_timeout)
            .build()
            .error_context("Failed to build HTTP client for metadata probes.")
    }

    async fn identify_kubernetes_provider(&self) -> Option<CloudProvider> {
        let pod_name = match probe::non_empty_env_var(&self.pod_name_env_var) {
            Some(pod_name) => pod_name,
            None => {
                debug!(
                    env_var = self.pod_name_env_var.as_str(),
                    "Pod name variable not set. Cannot identify managing provider."
                );
                return None;
            }
        };

        let namespace = kubernetes::read_namespace(&self.namespace_file_path).await;

        kubernetes::identify_kubernetes_provider(self.node_lookup.as_ref(), &namespace, &pod_name).await
    }

    async fn identify_server_provider(&self) -> Option<CloudProvider> {
        let client = match self.http_client() {
            Ok(client) => client,
            Err(e) => {
                debug!(error = %e, "Failed to build HTTP client for metadata probes. Skipping bare-server detection.");
                return None;
            }
        };

        server::identify_server_provider(&client, &self.server_probes).await
    }
}

/// Detects the environment the current process is running in, using the default detector.
///
/// This is a convenience wrapper for process bootstrap code; anything needing a non-default probe
/// timeout or orchestration API implementation should construct an [`EnvironmentDetector`]
/// directly.
///
/// # Errors
///
/// If no detection stage produces a positive signal, or if an operator-supplied override does not
/// name a known environment, an error will be returned.
pub async fn detect_environment() -> Result<CloudEnvironment, DetectionError> {
    EnvironmentDetector::new().detect().await
}
