//! Declarative configuration of a drift calculation
//!
//! A [`DriftCalculatorConfig`] is read from YAML or JSON and turned into a
//! [`UnivariateDriftCalculator`]:
//!
//! ```yaml
//! column_names: [age, income, city]
//! timestamp_column_name: ts
//! continuous_methods: [kolmogorov_smirnov, jensen_shannon]
//! categorical_methods: [chi2]
//! chunker:
//!   type: period
//!   period: month
//! thresholds:
//!   jensen_shannon:
//!     type: constant
//!     upper: 0.1
//! computation_params:
//!   kolmogorov_smirnov:
//!     calculation_method: exact
//! ```

use std::{collections::BTreeMap, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    chunk::{
        Chunker, CountBasedChunker, DefaultChunker, Incomplete, Period, PeriodBasedChunker,
        SizeBasedChunker,
    },
    column::FeatureType,
    drift::{
        CardinalityRule, ComputationParams, MethodKind, MethodRegistry, UnivariateDriftCalculator,
    },
    error::{Error, Result},
    threshold::Threshold,
};

/// Chunker selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ChunkerConfig {
    /// Ten equally sized chunks
    #[default]
    Default,
    /// Chunks of a fixed number of rows
    Size {
        /// Rows per chunk
        chunk_size: usize,
        /// Policy for trailing rows
        #[serde(default)]
        incomplete: Incomplete,
    },
    /// A fixed number of chunks
    Count {
        /// Number of chunks
        chunk_number: usize,
        /// Policy for trailing rows
        #[serde(default = "append")]
        incomplete: Incomplete,
    },
    /// One chunk per calendar period
    Period {
        /// Timestamp column; defaults to the calculator's timestamp column
        #[serde(default)]
        timestamp_column_name: Option<String>,
        /// Calendar period
        period: Period,
    },
}

fn append() -> Incomplete {
    Incomplete::Append
}

fn default_methods() -> Vec<String> {
    vec![MethodKind::JensenShannon.key().to_string()]
}

impl ChunkerConfig {
    /// Builds the chunker.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error for a period chunker without a
    /// timestamp column.
    pub fn build(&self, timestamp_column_name: Option<&str>) -> Result<Arc<dyn Chunker>> {
        Ok(match self {
            Self::Default => match timestamp_column_name {
                Some(ts) => Arc::new(DefaultChunker::new().with_timestamp_column(ts)),
                None => Arc::new(DefaultChunker::new()),
            },
            Self::Size {
                chunk_size,
                incomplete,
            } => {
                let chunker = SizeBasedChunker::new(*chunk_size).with_incomplete(*incomplete);
                match timestamp_column_name {
                    Some(ts) => Arc::new(chunker.with_timestamp_column(ts)),
                    None => Arc::new(chunker),
                }
            }
            Self::Count {
                chunk_number,
                incomplete,
            } => {
                let chunker = CountBasedChunker::new(*chunk_number).with_incomplete(*incomplete);
                match timestamp_column_name {
                    Some(ts) => Arc::new(chunker.with_timestamp_column(ts)),
                    None => Arc::new(chunker),
                }
            }
            Self::Period {
                timestamp_column_name: own,
                period,
            } => {
                let ts = own
                    .as_deref()
                    .or(timestamp_column_name)
                    .ok_or_else(|| {
                        Error::invalid_arguments("period chunker requires a timestamp column")
                    })?;
                Arc::new(PeriodBasedChunker::new(ts, *period))
            }
        })
    }
}

/// Serialized form of a [`UnivariateDriftCalculator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriftCalculatorConfig {
    /// Columns to monitor
    pub column_names: Vec<String>,
    /// Optional timestamp column
    #[serde(default)]
    pub timestamp_column_name: Option<String>,
    /// Method keys for continuous columns
    #[serde(default = "default_methods")]
    pub continuous_methods: Vec<String>,
    /// Method keys for categorical columns
    #[serde(default = "default_methods")]
    pub categorical_methods: Vec<String>,
    /// Chunking strategy
    #[serde(default)]
    pub chunker: ChunkerConfig,
    /// Threshold overrides by method key
    #[serde(default)]
    pub thresholds: BTreeMap<String, Threshold>,
    /// Computation settings by method key
    #[serde(default)]
    pub computation_params: BTreeMap<String, ComputationParams>,
    /// Continuous versus categorical treatment of numeric columns
    #[serde(default)]
    pub cardinality: CardinalityRule,
}

impl DriftCalculatorConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::parse(format!("invalid YAML config: {e}")))
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::parse(format!("invalid JSON config: {e}")))
    }

    /// Reads a config file, choosing the format by extension.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and a parse error for
    /// unknown extensions or malformed content.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let content = || std::fs::read_to_string(path).map_err(|e| Error::io(e, path));
        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content()?),
            "json" => Self::from_json_str(&content()?),
            _ => Err(Error::parse(format!(
                "unknown config extension: .{extension}. Supported: yaml, yml, json"
            ))),
        }
    }

    /// Serializes to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::parse(e.to_string()))
    }

    /// Builds a calculator, checking every method key against the registry.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error for a method key the registry
    /// does not hold for its feature type, and any chunker config error.
    pub fn into_calculator(
        self,
        registry: Arc<MethodRegistry>,
    ) -> Result<UnivariateDriftCalculator> {
        for (feature_type, keys) in [
            (FeatureType::Continuous, &self.continuous_methods),
            (FeatureType::Categorical, &self.categorical_methods),
        ] {
            if let Some(key) = keys.iter().find(|k| !registry.supports(k, feature_type)) {
                return Err(Error::invalid_arguments(format!(
                    "method '{key}' is not available for {feature_type} columns. Known keys: {}",
                    registry.keys().join(", ")
                )));
            }
        }

        let chunker = self.chunker.build(self.timestamp_column_name.as_deref())?;

        let mut calculator = UnivariateDriftCalculator::new(self.column_names)
            .with_continuous_methods(self.continuous_methods)
            .with_categorical_methods(self.categorical_methods)
            .with_shared_chunker(chunker)
            .with_cardinality_rule(self.cardinality)
            .with_registry(registry);
        if let Some(ts) = self.timestamp_column_name {
            calculator = calculator.with_timestamp_column(ts);
        }
        for (key, threshold) in self.thresholds {
            calculator = calculator.with_threshold(key, threshold);
        }
        for (key, params) in self.computation_params {
            calculator = calculator.with_computation_params(key, params);
        }
        Ok(calculator)
    }
}
