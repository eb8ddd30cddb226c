//! Column classification and missing value handling
//!
//! A [`Column`] is a named Arrow array. Its Arrow data type decides the
//! [`FeatureType`] used for method dispatch, and [`strip_missing`] turns it
//! into the [`Values`] payload the statistics work on.

use std::{collections::BTreeSet, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    compute::cast,
    datatypes::DataType,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a column holds continuous or categorical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// Numeric data
    Continuous,
    /// Labels: strings, booleans and dictionary encoded values
    Categorical,
}

impl FeatureType {
    /// Lowercase name, as used in configuration and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
        }
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true for data types treated as categorical.
pub fn is_categorical(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean | DataType::Dictionary(_, _)
    )
}

/// Returns true for numeric data types.
pub fn is_continuous(data_type: &DataType) -> bool {
    data_type.is_integer() || data_type.is_floating()
}

/// A named column of data.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    array: ArrayRef,
}

impl Column {
    /// Wraps an Arrow array under the given name.
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Self {
            name: name.into(),
            array,
        }
    }

    /// Builds a Float64 column.
    pub fn from_f64(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, Arc::new(Float64Array::from(values)))
    }

    /// Builds a nullable Float64 column.
    pub fn from_optional_f64(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, Arc::new(Float64Array::from(values)))
    }

    /// Builds a Utf8 column.
    pub fn from_strings<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let array: StringArray = values
            .iter()
            .map(|s| -> Option<&str> { Some(s.as_ref()) })
            .collect();
        Self::new(name, Arc::new(array))
    }

    /// Builds a nullable Utf8 column.
    pub fn from_optional_strings<S: AsRef<str>>(
        name: impl Into<String>,
        values: &[Option<S>],
    ) -> Self {
        let array: StringArray = values
            .iter()
            .map(|s| -> Option<&str> { s.as_ref().map(AsRef::as_ref) })
            .collect();
        Self::new(name, Arc::new(array))
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying Arrow array.
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    /// Arrow data type of the column.
    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// Number of rows, missing values included.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns true if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Returns true if the column holds categorical data.
    pub fn is_categorical(&self) -> bool {
        is_categorical(self.data_type())
    }

    /// Classifies the column.
    ///
    /// # Errors
    ///
    /// Returns an invalid arguments error for types that are neither numeric
    /// nor categorical, e.g. timestamps.
    pub fn feature_type(&self) -> Result<FeatureType> {
        let data_type = self.data_type();
        if is_categorical(data_type) {
            Ok(FeatureType::Categorical)
        } else if is_continuous(data_type) {
            Ok(FeatureType::Continuous)
        } else {
            Err(Error::invalid_arguments(format!(
                "column '{}' has unsupported type {data_type}",
                self.name
            )))
        }
    }

    /// Number of missing values: nulls, plus NaN for floating point columns.
    pub fn missing_count(&self) -> usize {
        let nan_count = match self.data_type() {
            DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                cast(&self.array, &DataType::Float64)
                    .ok()
                    .and_then(|a| {
                        a.as_any()
                            .downcast_ref::<Float64Array>()
                            .map(|arr| arr.iter().flatten().filter(|v| v.is_nan()).count())
                    })
                    .unwrap_or(0)
            }
            _ => 0,
        };
        self.array.null_count() + nan_count
    }

    /// Drops missing values, see [`strip_missing`].
    pub fn values(&self) -> Result<Values> {
        strip_missing(self)
    }
}

/// Non-missing column content, in row order.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Numeric values, NaN free
    Numeric(Vec<f64>),
    /// Category labels
    Categorical(Vec<String>),
}

impl Values {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    /// Returns true if there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature type of the payload.
    pub fn feature_type(&self) -> FeatureType {
        match self {
            Self::Numeric(_) => FeatureType::Continuous,
            Self::Categorical(_) => FeatureType::Categorical,
        }
    }

    /// Number of distinct values.
    pub fn n_unique(&self) -> usize {
        match self {
            Self::Numeric(v) => {
                let mut sorted = v.clone();
                sorted.sort_by(f64::total_cmp);
                sorted.dedup();
                sorted.len()
            }
            Self::Categorical(v) => v.iter().collect::<BTreeSet<_>>().len(),
        }
    }
}

/// Drops nulls (and NaN for numeric columns), preserving row order.
///
/// # Errors
///
/// Returns an error if the column type is unsupported, the Arrow cast
/// fails, or a numeric column holds infinite values.
pub fn strip_missing(column: &Column) -> Result<Values> {
    match column.feature_type()? {
        FeatureType::Continuous => {
            let array = cast(column.array(), &DataType::Float64)?;
            let arr = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| Error::schema_mismatch("expected Float64 after cast"))?;
            let values: Vec<f64> = arr.iter().flatten().filter(|v| !v.is_nan()).collect();
            let infinite = values.iter().filter(|v| v.is_infinite()).count();
            if infinite > 0 {
                return Err(Error::invalid_arguments(format!(
                    "column '{}' contains {infinite} infinite value(s)",
                    column.name()
                )));
            }
            Ok(Values::Numeric(values))
        }
        FeatureType::Categorical => {
            let array = cast(column.array(), &DataType::Utf8)?;
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::schema_mismatch("expected Utf8 after cast"))?;
            Ok(Values::Categorical(
                arr.iter().flatten().map(str::to_string).collect(),
            ))
        }
    }
}
