//! Dataset types for vigilar.
//!
//! Provides the [`Dataset`] trait and [`ArrowDataset`] implementation
//! holding the reference and analysis tables that drift and quality
//! calculators consume.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, RecordBatch},
    compute::{concat, concat_batches},
    datatypes::{Field, Schema, SchemaRef},
};

use crate::{
    column::Column,
    error::{Error, Result},
};

/// A tabular dataset.
///
/// All implementations must be thread-safe (Send + Sync).
pub trait Dataset: Send + Sync {
    /// Returns the total number of rows in the dataset.
    fn len(&self) -> usize;

    /// Returns true if the dataset contains no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the schema of the dataset.
    fn schema(&self) -> SchemaRef;

    /// Returns the number of batches in the dataset.
    fn num_batches(&self) -> usize;
}

/// An in-memory dataset backed by Arrow RecordBatches.
///
/// # Example
///
/// ```
/// use vigilar::{ArrowDataset, Column, Dataset};
///
/// let dataset = ArrowDataset::from_columns(vec![
///     Column::from_f64("car_value", vec![1.0, 2.0, 3.0]),
///     Column::from_strings("salary_range", &["low", "high", "low"]),
/// ])
/// .unwrap();
/// assert_eq!(dataset.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ArrowDataset {
    batches: Vec<RecordBatch>,
    schema: SchemaRef,
    row_count: usize,
}

impl ArrowDataset {
    /// Creates a new ArrowDataset from a vector of RecordBatches.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The batches vector is empty
    /// - The batches have inconsistent schemas
    pub fn new(batches: Vec<RecordBatch>) -> Result<Self> {
        if batches.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let schema = batches[0].schema();

        for (i, batch) in batches.iter().enumerate().skip(1) {
            if batch.schema() != schema {
                return Err(Error::schema_mismatch(format!(
                    "Batch {} has different schema than batch 0",
                    i
                )));
            }
        }

        let row_count = batches.iter().map(RecordBatch::num_rows).sum();

        Ok(Self {
            batches,
            schema,
            row_count,
        })
    }

    /// Creates an ArrowDataset from a single RecordBatch.
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        Self::new(vec![batch])
    }

    /// Creates an ArrowDataset from equally long named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if no columns are given or their lengths differ.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(c.name(), c.data_type().clone(), true))
            .collect();
        let arrays: Vec<ArrayRef> = columns.iter().map(|c| Arc::clone(c.array())).collect();

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Self::from_batch(batch)
    }

    /// Returns the underlying batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Concatenates all batches into a single RecordBatch.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        if self.batches.len() == 1 {
            return Ok(self.batches[0].clone());
        }
        Ok(concat_batches(&self.schema, &self.batches)?)
    }

    /// Returns true if the dataset has a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.schema.column_with_name(name).is_some()
    }

    /// Returns the named column across all batches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the schema has no such column.
    pub fn column(&self, name: &str) -> Result<Column> {
        let (index, _) = self
            .schema
            .column_with_name(name)
            .ok_or_else(|| Error::column_not_found(name))?;

        let array = if self.batches.len() == 1 {
            Arc::clone(self.batches[0].column(index))
        } else {
            let parts: Vec<&dyn arrow::array::Array> = self
                .batches
                .iter()
                .map(|b| b.column(index).as_ref())
                .collect();
            concat(&parts)?
        };

        Ok(Column::new(name, array))
    }

    /// Returns the names of the requested columns that are absent from the
    /// schema.
    pub fn missing_columns<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|n| !self.has_column(n))
            .map(String::as_str)
            .collect()
    }
}

impl Dataset for ArrowDataset {
    fn len(&self) -> usize {
        self.row_count
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn num_batches(&self) -> usize {
        self.batches.len()
    }
}
