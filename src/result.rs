//! Result tables produced by the drift and data quality calculators
//!
//! Both result types are flat row lists keyed by (column, metric, chunk).
//! Reference period rows always precede analysis period rows.

use std::sync::Arc;

use arrow::{
    array::{
        ArrayRef, BooleanArray, Float64Array, RecordBatch, StringArray,
        TimestampNanosecondArray, UInt64Array,
    },
    datatypes::{DataType, Field, Schema, TimeUnit},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{chunk::Chunk, error::Result};

/// Which dataset a result row was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPeriod {
    /// Rows from the reference data used to fit the calculator
    Reference,
    /// Rows from data passed to `calculate`
    Analysis,
}

impl DataPeriod {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Analysis => "analysis",
        }
    }
}

/// Chunk metadata attached to every result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Chunk key
    pub key: String,
    /// Position of the chunk within its period
    pub chunk_index: usize,
    /// First row of the chunk
    pub start_index: usize,
    /// Last row of the chunk (inclusive)
    pub end_index: usize,
    /// Chunk start time, if known
    pub start_date: Option<DateTime<Utc>>,
    /// Chunk end time, if known
    pub end_date: Option<DateTime<Utc>>,
    /// Data period of the chunk
    pub period: DataPeriod,
}

impl ChunkInfo {
    /// Captures the metadata of a chunk.
    pub fn from_chunk(chunk: &Chunk, period: DataPeriod) -> Self {
        Self {
            key: chunk.key.clone(),
            chunk_index: chunk.index,
            start_index: chunk.start_index,
            end_index: chunk.end_index,
            start_date: chunk.start_datetime,
            end_date: chunk.end_datetime,
            period,
        }
    }
}

/// One drift statistic for one column on one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    /// Chunk the value was computed on
    pub chunk: ChunkInfo,
    /// Monitored column
    pub column_name: String,
    /// Result column name of the method, e.g. `jensen_shannon`
    pub method: String,
    /// Statistic value
    pub value: f64,
    /// P-value, for methods that run a hypothesis test
    pub p_value: Option<f64>,
    /// Lower alert threshold
    pub lower_threshold: Option<f64>,
    /// Upper alert threshold
    pub upper_threshold: Option<f64>,
    /// Whether the value raised an alert
    pub alert: bool,
}

/// Result of a univariate drift calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    records: Vec<DriftRecord>,
}

impl DriftResult {
    /// Wraps result rows.
    pub fn new(records: Vec<DriftRecord>) -> Self {
        Self { records }
    }

    /// All rows.
    pub fn records(&self) -> &[DriftRecord] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows of one data period.
    pub fn filter_period(&self, period: DataPeriod) -> Self {
        Self::new(
            self.records
                .iter()
                .filter(|r| r.chunk.period == period)
                .cloned()
                .collect(),
        )
    }

    /// Rows of one column and method.
    pub fn filter(&self, column_name: &str, method: &str) -> Self {
        Self::new(
            self.records
                .iter()
                .filter(|r| r.column_name == column_name && r.method == method)
                .cloned()
                .collect(),
        )
    }

    /// Rows that raised an alert.
    pub fn alerts(&self) -> Vec<&DriftRecord> {
        self.records.iter().filter(|r| r.alert).collect()
    }

    /// Appends the rows of another result.
    pub fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
    }

    /// Converts the rows to an Arrow table.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = chunk_fields();
        fields.extend([
            Field::new("column_name", DataType::Utf8, false),
            Field::new("method", DataType::Utf8, false),
            Field::new("value", DataType::Float64, true),
            Field::new("p_value", DataType::Float64, true),
            Field::new("lower_threshold", DataType::Float64, true),
            Field::new("upper_threshold", DataType::Float64, true),
            Field::new("alert", DataType::Boolean, false),
        ]);

        let infos: Vec<&ChunkInfo> = self.records.iter().map(|r| &r.chunk).collect();
        let mut columns = chunk_columns(&infos);
        columns.extend([
            strings(self.records.iter().map(|r| r.column_name.as_str())),
            strings(self.records.iter().map(|r| r.method.as_str())),
            floats(self.records.iter().map(|r| Some(r.value))),
            floats(self.records.iter().map(|r| r.p_value)),
            floats(self.records.iter().map(|r| r.lower_threshold)),
            floats(self.records.iter().map(|r| r.upper_threshold)),
            Arc::new(BooleanArray::from(
                self.records.iter().map(|r| r.alert).collect::<Vec<_>>(),
            )) as ArrayRef,
        ]);

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

/// One data quality metric for one column on one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    /// Chunk the value was computed on
    pub chunk: ChunkInfo,
    /// Monitored column
    pub column_name: String,
    /// Metric name, e.g. `missing_values_rate`
    pub metric: String,
    /// Metric value
    pub value: f64,
    /// Sampling error of the value
    pub sampling_error: f64,
    /// Upper confidence bound, `value + 3 * sampling_error` clipped to limits
    pub upper_confidence_boundary: Option<f64>,
    /// Lower confidence bound, `value - 3 * sampling_error` clipped to limits
    pub lower_confidence_boundary: Option<f64>,
    /// Lower alert threshold
    pub lower_threshold: Option<f64>,
    /// Upper alert threshold
    pub upper_threshold: Option<f64>,
    /// Whether the value raised an alert
    pub alert: bool,
}

/// Result of a data quality calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    records: Vec<QualityRecord>,
}

impl QualityResult {
    /// Wraps result rows.
    pub fn new(records: Vec<QualityRecord>) -> Self {
        Self { records }
    }

    /// All rows.
    pub fn records(&self) -> &[QualityRecord] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows of one data period.
    pub fn filter_period(&self, period: DataPeriod) -> Self {
        Self::new(
            self.records
                .iter()
                .filter(|r| r.chunk.period == period)
                .cloned()
                .collect(),
        )
    }

    /// Rows of one column.
    pub fn filter_column(&self, column_name: &str) -> Self {
        Self::new(
            self.records
                .iter()
                .filter(|r| r.column_name == column_name)
                .cloned()
                .collect(),
        )
    }

    /// Rows that raised an alert.
    pub fn alerts(&self) -> Vec<&QualityRecord> {
        self.records.iter().filter(|r| r.alert).collect()
    }

    /// Appends the rows of another result.
    pub fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
    }

    /// Converts the rows to an Arrow table.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = chunk_fields();
        fields.extend([
            Field::new("column_name", DataType::Utf8, false),
            Field::new("metric", DataType::Utf8, false),
            Field::new("value", DataType::Float64, true),
            Field::new("sampling_error", DataType::Float64, true),
            Field::new("upper_confidence_boundary", DataType::Float64, true),
            Field::new("lower_confidence_boundary", DataType::Float64, true),
            Field::new("lower_threshold", DataType::Float64, true),
            Field::new("upper_threshold", DataType::Float64, true),
            Field::new("alert", DataType::Boolean, false),
        ]);

        let infos: Vec<&ChunkInfo> = self.records.iter().map(|r| &r.chunk).collect();
        let mut columns = chunk_columns(&infos);
        columns.extend([
            strings(self.records.iter().map(|r| r.column_name.as_str())),
            strings(self.records.iter().map(|r| r.metric.as_str())),
            floats(self.records.iter().map(|r| Some(r.value))),
            floats(self.records.iter().map(|r| Some(r.sampling_error))),
            floats(self.records.iter().map(|r| r.upper_confidence_boundary)),
            floats(self.records.iter().map(|r| r.lower_confidence_boundary)),
            floats(self.records.iter().map(|r| r.lower_threshold)),
            floats(self.records.iter().map(|r| r.upper_threshold)),
            Arc::new(BooleanArray::from(
                self.records.iter().map(|r| r.alert).collect::<Vec<_>>(),
            )) as ArrayRef,
        ]);

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

fn chunk_fields() -> Vec<Field> {
    vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt64, false),
        Field::new("start_index", DataType::UInt64, false),
        Field::new("end_index", DataType::UInt64, false),
        Field::new(
            "start_date",
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            true,
        ),
        Field::new(
            "end_date",
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
            true,
        ),
        Field::new("period", DataType::Utf8, false),
    ]
}

fn chunk_columns(infos: &[&ChunkInfo]) -> Vec<ArrayRef> {
    let indices = |f: fn(&ChunkInfo) -> usize| -> ArrayRef {
        Arc::new(UInt64Array::from(
            infos.iter().map(|c| f(c) as u64).collect::<Vec<_>>(),
        ))
    };
    let dates = |f: fn(&ChunkInfo) -> Option<DateTime<Utc>>| -> ArrayRef {
        Arc::new(
            TimestampNanosecondArray::from(
                infos
                    .iter()
                    .map(|c| f(c).and_then(|d| d.timestamp_nanos_opt()))
                    .collect::<Vec<_>>(),
            )
            .with_timezone("UTC"),
        )
    };

    vec![
        strings(infos.iter().map(|c| c.key.as_str())),
        indices(|c| c.chunk_index),
        indices(|c| c.start_index),
        indices(|c| c.end_index),
        dates(|c| c.start_date),
        dates(|c| c.end_date),
        strings(infos.iter().map(|c| c.period.as_str())),
    ]
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(values.map(Some).collect::<StringArray>())
}

fn floats(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(values.collect::<Float64Array>())
}
