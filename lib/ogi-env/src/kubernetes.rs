use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{Api, Client};
use ogi_error::{generic_error, ErrorContext as _, GenericError};
use tokio::fs;
use tracing::debug;

use crate::environment::CloudProvider;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const NAMESPACE_MARKER_FILE: &str = "/var/run/secrets/kubernetes.io/namespace";

pub(crate) const SERVICE_ACCOUNT_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

// Each managed-Kubernetes offering injects a distinguishing label onto the nodes it provisions.
const EKS_NODEGROUP_LABEL: &str = "eks.amazonaws.com/nodegroup";
const AKS_CLUSTER_LABEL: &str = "kubernetes.azure.com/cluster";
const GKE_NODEPOOL_LABEL: &str = "cloud.google.com/gke-nodepool";

/// Returns the filesystem paths whose presence marks an in-cluster environment.
pub(crate) fn well_known_marker_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(SERVICE_ACCOUNT_DIR), PathBuf::from(NAMESPACE_MARKER_FILE)]
}

/// Looks up pod and node metadata through an orchestration API.
///
/// This is the seam between provider identification and the Kubernetes control plane: detection
/// only ever needs to resolve a pod to its node, and a node to its labels, so that is the entire
/// capability expressed here. Tests substitute a canned implementation; production uses
/// [`InClusterNodeLookup`].
#[async_trait]
pub trait NodeMetadataLookup: Send + Sync {
    /// Returns the name of the node the given pod is scheduled on.
    async fn pod_node_name(&self, namespace: &str, pod_name: &str) -> Result<String, GenericError>;

    /// Returns the metadata labels of the given node.
    async fn node_labels(&self, node_name: &str) -> Result<BTreeMap<String, String>, GenericError>;
}

/// A [`NodeMetadataLookup`] backed by the in-cluster orchestration API.
///
/// Credentials and connection information come from the standard in-cluster sources: the service
/// account token and CA certificate injected by the kubelet, or a local kubeconfig when one is
/// present. The underlying client is constructed per call, so a lookup attempted outside a
/// cluster fails cleanly without leaving a half-initialized client behind.
pub struct InClusterNodeLookup;

#[async_trait]
impl NodeMetadataLookup for InClusterNodeLookup {
    async fn pod_node_name(&self, namespace: &str, pod_name: &str) -> Result<String, GenericError> {
        let client = Client::try_default()
            .await
            .error_context("Failed to create orchestration API client.")?;

        let pods: Api<Pod> = Api::namespaced(client, namespace);
        let pod = pods
            .get(pod_name)
            .await
            .with_error_context(|| format!("Failed to get pod '{}' in namespace '{}'.", pod_name, namespace))?;

        pod.spec
            .and_then(|spec| spec.node_name)
            .ok_or_else(|| generic_error!("Pod '{}' has not been scheduled to a node.", pod_name))
    }

    async fn node_labels(&self, node_name: &str) -> Result<BTreeMap<String, String>, GenericError> {
        let client = Client::try_default()
            .await
            .error_context("Failed to create orchestration API client.")?;

        let nodes: Api<Node> = Api::all(client);
        let node = nodes
            .get(node_name)
            .await
            .with_error_context(|| format!("Failed to get node '{}'.", node_name))?;

        Ok(node.metadata.labels.unwrap_or_default())
    }
}

/// Reads the namespace of the current workload from the injected service account file.
///
/// Falls back to `default` when the file is missing, unreadable, or empty, which matches how the
/// orchestration runtime treats an unspecified namespace.
pub(crate) async fn read_namespace(path: &Path) -> String {
    const DEFAULT_NAMESPACE: &str = "default";

    let namespace = fs::read_to_string(path)
        .await
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());

    if namespace.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else {
        namespace
    }
}

/// Maps a node's labels to the cloud provider managing the cluster.
///
/// Labels are inspected in a fixed order so that a label set carrying more than one marker (not
/// expected in practice) resolves deterministically. A label set with none of the markers is a
/// valid outcome: self-managed clusters have no provider marker at all.
pub(crate) fn provider_from_node_labels(labels: &BTreeMap<String, String>) -> Option<CloudProvider> {
    if labels.contains_key(EKS_NODEGROUP_LABEL) {
        Some(CloudProvider::Aws)
    } else if labels.contains_key(AKS_CLUSTER_LABEL) {
        Some(CloudProvider::Azure)
    } else if labels.contains_key(GKE_NODEPOOL_LABEL) {
        Some(CloudProvider::Gcp)
    } else {
        None
    }
}

/// Identifies the cloud provider managing the cluster the given pod runs in.
///
/// Two sequential API round-trips: pod to node name, node to labels. Every failure along the way
/// is converted to "no signal" rather than propagated, since a misconfigured orchestration client
/// must not abort the detection pipeline.
pub(crate) async fn identify_kubernetes_provider(
    lookup: &dyn NodeMetadataLookup, namespace: &str, pod_name: &str,
) -> Option<CloudProvider> {
    let node_name = match lookup.pod_node_name(namespace, pod_name).await {
        Ok(node_name) => node_name,
        Err(e) => {
            debug!(error = %e, pod_name, "Failed to resolve node for pod. No managed Kubernetes signal.");
            return None;
        }
    };

    let labels = match lookup.node_labels(&node_name).await {
        Ok(labels) => labels,
        Err(e) => {
            debug!(error = %e, node_name = %node_name, "Failed to query node labels. No managed Kubernetes signal.");
            return None;
        }
    };

    provider_from_node_labels(&labels)
}
