//! Method registry for creating drift methods by key.
//!
//! The registry maps a `(key, feature type)` pair to a constructor. It is
//! assembled once through [`MethodRegistryBuilder`] and immutable
//! afterwards, so it can be shared between calculators behind an `Arc`.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::warn;

use crate::{
    column::FeatureType,
    drift::method::{Method, MethodKind, MethodParams},
    error::{Error, Result},
};

/// Builds a [`Method`] from construction arguments.
pub type MethodConstructor = Arc<dyn Fn(MethodParams) -> Method + Send + Sync>;

/// Collects registrations for a [`MethodRegistry`].
///
/// # Example
///
/// ```
/// use vigilar::drift::{Method, MethodKind, MethodParams, MethodRegistry};
/// use vigilar::FeatureType;
///
/// let registry = MethodRegistry::builder()
///     .with_builtins()
///     .register("ks_exact", FeatureType::Continuous, |params: MethodParams| {
///         Method::from_params(MethodKind::KolmogorovSmirnov, params)
///             .with_names("KS statistic (exact)", "ks_exact")
///     })
///     .build();
///
/// assert!(registry.supports("ks_exact", FeatureType::Continuous));
/// assert!(registry.supports("chi2", FeatureType::Categorical));
/// ```
#[derive(Clone, Default)]
pub struct MethodRegistryBuilder {
    entries: BTreeMap<String, BTreeMap<FeatureType, MethodConstructor>>,
}

impl MethodRegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for a key and feature type.
    ///
    /// Registering the same pair again replaces the earlier constructor and
    /// logs a warning.
    #[must_use]
    pub fn register<F>(
        mut self,
        key: impl Into<String>,
        feature_type: FeatureType,
        constructor: F,
    ) -> Self
    where
        F: Fn(MethodParams) -> Method + Send + Sync + 'static,
    {
        let key = key.into();
        let previous = self
            .entries
            .entry(key.clone())
            .or_default()
            .insert(feature_type, Arc::new(constructor));
        if previous.is_some() {
            warn!(
                key = %key,
                feature_type = %feature_type,
                "re-registering method, overwriting the existing registration"
            );
        }
        self
    }

    /// Registers a built-in kind under its key for every feature type it
    /// supports.
    #[must_use]
    pub fn register_kind(self, kind: MethodKind) -> Self {
        kind.feature_types().iter().fold(self, |builder, feature_type| {
            builder.register(kind.key(), *feature_type, move |params| {
                Method::from_params(kind, params)
            })
        })
    }

    /// Registers all built-in kinds.
    #[must_use]
    pub fn with_builtins(self) -> Self {
        MethodKind::ALL
            .into_iter()
            .fold(self, MethodRegistryBuilder::register_kind)
    }

    /// Freezes the registrations.
    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable lookup table from `(key, feature type)` to method constructor.
#[derive(Clone)]
pub struct MethodRegistry {
    entries: BTreeMap<String, BTreeMap<FeatureType, MethodConstructor>>,
}

impl MethodRegistry {
    /// Starts building a registry.
    pub fn builder() -> MethodRegistryBuilder {
        MethodRegistryBuilder::new()
    }

    /// Creates a method for a key and feature type.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error when the key is unknown (the
    /// message lists the known keys) or when the key is not registered for
    /// the feature type.
    pub fn create(
        &self,
        key: &str,
        feature_type: FeatureType,
        params: MethodParams,
    ) -> Result<Method> {
        let by_type = self.entries.get(key).ok_or_else(|| {
            Error::invalid_arguments(format!(
                "unknown method key '{key}'. Specify one of {}",
                self.keys().join(", ")
            ))
        })?;

        let constructor = by_type.get(&feature_type).ok_or_else(|| {
            Error::invalid_arguments(format!(
                "method '{key}' does not support {feature_type} features. Supported: {}",
                by_type
                    .keys()
                    .map(FeatureType::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        Ok(constructor(params))
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Returns true if the key is registered for the feature type.
    pub fn supports(&self, key: &str, feature_type: FeatureType) -> bool {
        self.entries
            .get(key)
            .is_some_and(|by_type| by_type.contains_key(&feature_type))
    }

    /// Feature types registered for a key.
    pub fn feature_types(&self, key: &str) -> Vec<FeatureType> {
        self.entries
            .get(key)
            .map(|by_type| by_type.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        MethodRegistryBuilder::new().with_builtins().build()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(key, by_type)| (key, by_type.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl fmt::Debug for MethodRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistryBuilder")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
