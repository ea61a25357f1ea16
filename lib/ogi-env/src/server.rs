use reqwest::Client;
use tracing::debug;

use crate::environment::CloudProvider;
use crate::probe::{probe_metadata_endpoint, MetadataEndpoint, ProbeOutcome};

// All three major providers answer on the link-local metadata address; GCP additionally aliases it
// behind a well-known hostname, which is what their client libraries use.
const METADATA_REACHABILITY_URL: &str = "http://169.254.169.254/";
const AWS_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/";
const AZURE_METADATA_URL: &str = "http://169.254.169.254/metadata/instance?api-version=2021-02-01";
const GCP_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1/";

/// The set of metadata endpoints consulted during bare-server detection.
pub(crate) struct ServerProbes {
    pub(crate) reachability: MetadataEndpoint,
    pub(crate) aws: MetadataEndpoint,
    pub(crate) azure: MetadataEndpoint,
    pub(crate) gcp: MetadataEndpoint,
}

impl ServerProbes {
    /// Returns the well-known production endpoints.
    pub(crate) fn well_known() -> Self {
        Self {
            reachability: MetadataEndpoint::new(METADATA_REACHABILITY_URL),
            aws: MetadataEndpoint::new(AWS_METADATA_URL),
            azure: MetadataEndpoint::new(AZURE_METADATA_URL).with_header("Metadata", "true"),
            gcp: MetadataEndpoint::new(GCP_METADATA_URL).with_header("Metadata-Flavor", "Google"),
        }
    }
}

/// Checks whether any cloud metadata service is reachable.
///
/// This only establishes "some metadata service answered", not which provider is behind it.
pub(crate) async fn is_metadata_service_reachable(client: &Client, probes: &ServerProbes) -> bool {
    probe_metadata_endpoint(client, &probes.reachability).await.is_positive()
}

/// Identifies the cloud provider by probing each provider-specific metadata endpoint.
///
/// The probes run concurrently, but outcomes are resolved in a fixed AWS, Azure, GCP order so that
/// a multi-positive result (not expected in practice) stays deterministic. All-negative is a valid
/// outcome at this stage and yields `None`; the caller decides what no signal means.
pub(crate) async fn identify_server_provider(client: &Client, probes: &ServerProbes) -> Option<CloudProvider> {
    let (aws, azure, gcp) = tokio::join!(
        probe_metadata_endpoint(client, &probes.aws),
        probe_metadata_endpoint(client, &probes.azure),
        probe_metadata_endpoint(client, &probes.gcp),
    );

    let outcomes = [
        (CloudProvider::Aws, aws),
        (CloudProvider::Azure, azure),
        (CloudProvider::Gcp, gcp),
    ];

    for (provider, outcome) in outcomes {
        match outcome {
            ProbeOutcome::Positive => {
                debug!(provider = provider.as_str(), "Metadata endpoint identified provider.");
                return Some(provider);
            }
            ProbeOutcome::Negative => {}
            ProbeOutcome::Inconclusive(e) => {
                debug!(provider = provider.as_str(), error = %e, "Metadata probe could not reach endpoint.");
            }
        }
    }

    None
}
