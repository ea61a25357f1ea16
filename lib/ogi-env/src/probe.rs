use std::path::Path;

use ogi_error::GenericError;
use reqwest::{Client, StatusCode};

/// A well-known metadata endpoint to probe.
///
/// Cloud metadata services identify themselves purely by URL and, for some providers, a fixed
/// request header. No authentication is involved.
pub struct MetadataEndpoint {
    url: String,
    headers: Vec<(&'static str, &'static str)>,
}

impl MetadataEndpoint {
    /// Creates a new `MetadataEndpoint` for the given URL, with no additional request headers.
    pub fn new<S>(url: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a fixed header sent with every probe of this endpoint.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Returns the URL of this endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// The outcome of a single signal probe.
///
/// `Negative` means the signal was observed to be absent: the endpoint answered, but not with the
/// status that identifies the provider. `Inconclusive` means the probe could not observe the
/// signal at all (timeout, connection refused, DNS failure) and retains the transport-level cause.
/// The detection pipeline treats both as "no signal", but keeping them distinct lets callers and
/// tests tell "definitely not this provider" apart from "could not determine".
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The signal is present.
    Positive,

    /// The signal is absent.
    Negative,

    /// The probe could not determine whether the signal is present.
    Inconclusive(GenericError),
}

impl ProbeOutcome {
    /// Returns `true` if the probe observed a positive signal.
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

/// Maps a metadata response status to a probe outcome.
///
/// Only an exact 200 identifies a provider. Redirects, client errors, and server errors all count
/// as the signal being absent.
pub(crate) fn outcome_for_status(status: StatusCode) -> ProbeOutcome {
    if status == StatusCode::OK {
        ProbeOutcome::Positive
    } else {
        ProbeOutcome::Negative
    }
}

/// Probes a metadata endpoint with a single GET request.
///
/// The request timeout is whatever the given client was built with, which for detection is short:
/// metadata services are link-local and answer in single-digit milliseconds when present.
pub(crate) async fn probe_metadata_endpoint(client: &Client, endpoint: &MetadataEndpoint) -> ProbeOutcome {
    let mut request = client.get(endpoint.url());
    for (name, value) in &endpoint.headers {
        request = request.header(*name, *value);
    }

    match request.send().await {
        Ok(response) => outcome_for_status(response.status()),
        Err(e) => ProbeOutcome::Inconclusive(e.into()),
    }
}

fn file_exists<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    std::fs::metadata(path).is_ok()
}

/// Returns `true` if any of the given paths exists on the local filesystem.
pub(crate) fn any_path_exists<I, P>(paths: I) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths.into_iter().any(|path| file_exists(path))
}

/// Returns the value of the given environment variable if it is set and non-empty.
pub(crate) fn non_empty_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Returns `true` if the given environment variable is set to a non-empty value.
pub(crate) fn is_env_var_present(name: &str) -> bool {
    non_empty_env_var(name).is_some()
}
