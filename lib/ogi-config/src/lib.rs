//! Typed and untyped access to configuration data.
//!
//! Components receive their settings through a [`GenericConfiguration`]: a merged, key-addressable
//! view over one or more configuration sources (YAML files, prefixed environment variables).
//! Sources are added through [`ConfigurationLoader`], with later sources taking precedence over
//! earlier ones.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, collections::HashSet, sync::Arc};

use figment::providers::Serialized;
pub use figment::value;
use figment::Provider;
use figment::{error::Kind, providers::Env, Figment};
use ogi_error::GenericError;
use serde::Deserialize;
use snafu::Snafu;
use tracing::debug;

mod provider;
use self::provider::ResolvedProvider;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how to set the missing field.
        ///
        /// This is meant to be displayed to the user, and includes environment variable-specific
        /// text if environment variables had been loaded originally.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field's value was not of the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Name of the invalid field.
        ///
        /// This is a period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e.into() },
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum LookupSource {
    /// The configuration key is looked up in a form suitable for environment variables.
    Environment {
        prefix: String,
    },
}

impl LookupSource {
    fn transform_key(&self, key: &str) -> String {
        match self {
            // The prefix is already uppercased with a trailing underscore by the time the source is
            // recorded, so only the key itself needs transforming here.
            LookupSource::Environment { prefix } => format!("{}{}", prefix, key.replace('.', "_").to_uppercase()),
        }
    }
}

struct BoxedProvider(Box<dyn figment::Provider + Send + Sync>);

impl figment::Provider for BoxedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// A configuration loader that can pull from various sources.
///
/// This loader provides a wrapper around a lower-level library, `figment`, to expose a simpler and
/// focused API for loading configuration data and querying it.
///
/// Sources have an implicit priority based on the order in which they are added: sources added
/// later take precedence over sources added prior.
///
/// # Supported sources
///
/// - YAML file
/// - environment variables (must be prefixed; see [`from_environment`][Self::from_environment])
#[derive(Default)]
pub struct ConfigurationLoader {
    lookup_sources: HashSet<LookupSource>,
    providers: Vec<BoxedProvider>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let resolved_provider =
            ResolvedProvider::from_yaml(&path).map_err(|e| ConfigurationError::Generic { source: e.into() })?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable/accessible, and not being valid
    /// YAML.
    pub fn try_from_yaml<P>(self, path: P) -> Self
    where
        P: AsRef<std::path::Path>,
    {
        match ResolvedProvider::from_yaml(&path) {
            Ok(resolved_provider) => {
                let mut loader = self;
                loader.providers.push(BoxedProvider(Box::new(resolved_provider)));
                loader
            }
            Err(e) => {
                debug!(error = %e, file_path = %path.as_ref().to_string_lossy(), "Unable to read YAML configuration file. Ignoring.");
                self
            }
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with
    /// one. For example, with a prefix of `app`, any environment variable starting with `app_`
    /// would be matched.
    ///
    /// The prefix is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_string()
        } else {
            format!("{}_", prefix)
        };

        // `Env` is not `Send + Sync`, so the matching variables are captured eagerly and handed to
        // a `Serialized` provider instead.
        let env = Env::prefixed(&prefix);
        let values = env.data()?;
        if let Some(default_dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
            self.lookup_sources.insert(LookupSource::Environment { prefix });
        }
        Ok(self)
    }

    /// Consumes the configuration loader and wraps it in a generic wrapper.
    ///
    /// # Errors
    ///
    /// If the loaded sources could not be merged, an error will be returned.
    pub fn into_generic(self) -> Result<GenericConfiguration, ConfigurationError> {
        let figment = self
            .providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider));

        Ok(GenericConfiguration {
            inner: Arc::new(Inner {
                figment,
                lookup_sources: self.lookup_sources,
            }),
        })
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    lookup_sources: HashSet<LookupSource>,
}

/// A generic configuration object.
///
/// This represents the merged configuration derived from [`ConfigurationLoader`] in its raw form.
/// Values can be queried by key, and can be extracted either as typed values or in their raw form.
///
/// Keys must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested value.
///
/// Using an example YAML configuration:
///
/// ```yaml
/// a:
///   b:
///     c: value
/// ```
///
/// Querying for the value of `a.b.c` would return `"value"`, and querying for `a.b` would return
/// the nested mapping `{ c: value }`.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) => {
                if matches!(e.kind, Kind::MissingField(_)) {
                    // We might have been given a key that uses nested notation -- `foo.bar` -- but
                    // is only present in the environment variables. We specifically don't want to
                    // use a different separator in environment variables to map to nested key
                    // separators, so we simply try again here but with all nested key separators
                    // (`.`) replaced with `_`, to match environment variables.
                    let fallback_key = key.replace('.', "_");
                    self.inner
                        .figment
                        .extract_inner(&fallback_key)
                        .map_err(|fallback_e| from_figment_error(&self.inner.lookup_sources, fallback_e))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Gets a configuration value by key.
    ///
    /// The key must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested
    /// lookup.
    ///
    /// # Errors
    ///
    /// If the key does not exist in the configuration, or if the value could not be deserialized
    /// into `T`, an error variant will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets a configuration value by key, or the default value if a key does not exist or could
    /// not be deserialized.
    ///
    /// The `Default` implementation of `T` will be used both if the key could not be found, as
    /// well as for any error during deserialization. This effectively swallows any errors and
    /// should generally be used sparingly.
    ///
    /// The key must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested
    /// lookup.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets a configuration value by key, if it exists.
    ///
    /// If the key exists in the configuration, and can be deserialized, `Ok(Some(value))` is
    /// returned. If the key does not exist, `Ok(None)` will be returned.
    ///
    /// The key must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested
    /// lookup.
    ///
    /// # Errors
    ///
    /// If the value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Attempts to deserialize the entire configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the value could not be deserialized into `T`, an error will be returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract()
            .map_err(|e| from_figment_error(&self.inner.lookup_sources, e))
    }
}

fn from_figment_error(lookup_sources: &HashSet<LookupSource>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let mut valid_keys = lookup_sources
                .iter()
                .map(|source| source.transform_key(&field))
                .collect::<Vec<_>>();

            // Always specify the original key as a valid key to try.
            valid_keys.insert(0, field.to_string());

            let help_text = format!("Try setting `{}`.", valid_keys.join("` or `"));

            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn write_yaml(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn empty_environment_prefix_is_rejected() {
        let result = ConfigurationLoader::default().from_environment("");
        assert!(matches!(result, Err(ConfigurationError::EmptyPrefix)));
    }

    #[test]
    fn yaml_values_are_queryable_by_key() {
        let (_dir, path) = write_yaml("cloud_probe_timeout_ms: 250\nnested:\n  flag: true\n");

        let config = ConfigurationLoader::default()
            .from_yaml(&path)
            .unwrap()
            .into_generic()
            .unwrap();

        assert_eq!(config.get_typed::<u64>("cloud_probe_timeout_ms").unwrap(), 250);
        assert!(config.get_typed::<bool>("nested.flag").unwrap());
    }

    #[test]
    fn missing_yaml_file_is_an_error_when_required() {
        let result = ConfigurationLoader::default().from_yaml("/nonexistent/config.yaml");
        assert!(matches!(result, Err(ConfigurationError::Generic { .. })));
    }

    #[test]
    fn missing_yaml_file_is_ignored_when_optional() {
        let config = ConfigurationLoader::default()
            .try_from_yaml("/nonexistent/config.yaml")
            .into_generic()
            .unwrap();

        assert_eq!(config.try_get_typed::<u64>("anything").unwrap(), None);
    }

    #[test]
    fn missing_field_reports_environment_lookup_hint() {
        std::env::set_var("OGI_CFGTEST_HINT_PRESENT", "1");

        let config = ConfigurationLoader::default()
            .from_environment("OGI_CFGTEST_HINT")
            .unwrap()
            .into_generic()
            .unwrap();

        match config.get_typed::<u64>("absent") {
            Err(ConfigurationError::MissingField { help_text, field }) => {
                assert_eq!(field, "absent");
                assert!(help_text.contains("OGI_CFGTEST_HINT_ABSENT"));
            }
            other => panic!("expected MissingField, got {:?}", other.map(|_| ())),
        }

        std::env::remove_var("OGI_CFGTEST_HINT_PRESENT");
    }

    #[test]
    fn environment_source_takes_precedence_over_yaml() {
        let (_dir, path) = write_yaml("cloud_probe_timeout_ms: 250\n");
        std::env::set_var("OGI_CFGTEST_PREC_CLOUD_PROBE_TIMEOUT_MS", "500");

        let config = ConfigurationLoader::default()
            .from_yaml(&path)
            .unwrap()
            .from_environment("OGI_CFGTEST_PREC")
            .unwrap()
            .into_generic()
            .unwrap();

        assert_eq!(config.get_typed::<u64>("cloud_probe_timeout_ms").unwrap(), 500);

        std::env::remove_var("OGI_CFGTEST_PREC_CLOUD_PROBE_TIMEOUT_MS");
    }

    #[test]
    fn try_get_typed_distinguishes_missing_from_invalid() {
        let (_dir, path) = write_yaml("probe_timeout: not-a-number\n");

        let config = ConfigurationLoader::default()
            .from_yaml(&path)
            .unwrap()
            .into_generic()
            .unwrap();

        assert_eq!(config.try_get_typed::<String>("absent_field").unwrap(), None);
        assert!(matches!(
            config.try_get_typed::<u64>("probe_timeout"),
            Err(ConfigurationError::InvalidFieldType { .. })
        ));
    }

    #[test]
    fn get_typed_or_default_swallows_missing_fields() {
        let config = ConfigurationLoader::default().into_generic().unwrap();
        assert_eq!(config.get_typed_or_default::<u64>("absent_field"), 0);
    }

    #[test]
    fn whole_configuration_deserializes_as_typed() {
        #[derive(Deserialize)]
        struct ProbeSettings {
            cloud_probe_timeout_ms: u64,
            cloud_env_override: Option<String>,
        }

        let (_dir, path) = write_yaml("cloud_probe_timeout_ms: 125\n");

        let config = ConfigurationLoader::default()
            .from_yaml(&path)
            .unwrap()
            .into_generic()
            .unwrap();

        let settings = config.as_typed::<ProbeSettings>().unwrap();
        assert_eq!(settings.cloud_probe_timeout_ms, 125);
        assert_eq!(settings.cloud_env_override, None);
    }
}
