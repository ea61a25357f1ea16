use tracing::debug;

use crate::environment::CloudProvider;
use crate::probe;

// Variables injected by the function runtimes themselves; none of them is settable through the
// provider consoles, which is what makes them usable as markers.
const AWS_LAMBDA_ENV_VAR: &str = "AWS_EXECUTION_ENV";
const AZURE_FUNCTIONS_ENV_VAR: &str = "AZURE_FUNCTIONS_ENVIRONMENT";
const GCP_FUNCTIONS_ENV_VAR: &str = "FUNCTION_NAME";

/// Returns the well-known serverless runtime markers, in detection order.
pub(crate) fn well_known_markers() -> Vec<(CloudProvider, String)> {
    vec![
        (CloudProvider::Aws, AWS_LAMBDA_ENV_VAR.to_string()),
        (CloudProvider::Azure, AZURE_FUNCTIONS_ENV_VAR.to_string()),
        (CloudProvider::Gcp, GCP_FUNCTIONS_ENV_VAR.to_string()),
    ]
}

/// Identifies the serverless runtime from provider-injected environment variables.
///
/// Purely synchronous, no I/O. Markers are checked in the given order and the first variable that
/// is set to a non-empty value wins. Environment variables are the weakest of the detection
/// signals (nothing stops an operator from exporting one by hand), which is why this stage runs
/// last in the precedence chain.
pub(crate) fn identify_serverless_provider(markers: &[(CloudProvider, String)]) -> Option<CloudProvider> {
    for (provider, marker) in markers {
        if probe::is_env_var_present(marker) {
            debug!(provider = provider.as_str(), marker = marker.as_str(), "Found serverless runtime marker variable.");
            return Some(*provider);
        }
    }

    None
}
