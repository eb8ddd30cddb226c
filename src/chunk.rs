// Allow casts for index arithmetic on row counts
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

//! Chunking of datasets into analysis units
//!
//! A [`Chunker`] splits an [`ArrowDataset`] into an ordered sequence of
//! [`Chunk`]s: contiguous row slices for the size and count based chunkers,
//! timestamp periods for the [`PeriodBasedChunker`]. Each chunk is one
//! point on a drift or data quality time series.
//!
//! # Example
//!
//! ```
//! use vigilar::{ArrowDataset, Chunker, Column, SizeBasedChunker};
//!
//! let dataset = ArrowDataset::from_columns(vec![Column::from_f64(
//!     "x",
//!     (0..10).map(f64::from).collect(),
//! )])
//! .unwrap();
//!
//! let chunks = SizeBasedChunker::new(4).split(&dataset).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[0].key, "[0:3]");
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, RecordBatch, TimestampNanosecondArray, UInt32Array},
    compute::{cast, take},
    datatypes::{DataType, TimeUnit},
};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    column::Column,
    dataset::{ArrowDataset, Dataset},
    error::{Error, Result},
};

/// Below this many chunks thresholds become unreliable.
const MIN_RECOMMENDED_CHUNKS: usize = 6;

/// A contiguous slice of rows treated as one analysis unit.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Stable chunk key, e.g. `[0:999]` or `2024-03`
    pub key: String,
    /// Position of the chunk in the split
    pub index: usize,
    /// First row covered by the chunk
    pub start_index: usize,
    /// Last row covered by the chunk (inclusive)
    pub end_index: usize,
    /// Start of the chunk in time, if timestamps are known
    pub start_datetime: Option<DateTime<Utc>>,
    /// End of the chunk in time, if timestamps are known
    pub end_datetime: Option<DateTime<Utc>>,
    /// Row data of the chunk
    pub data: RecordBatch,
}

impl Chunk {
    /// Number of rows in the chunk.
    pub fn len(&self) -> usize {
        self.data.num_rows()
    }

    /// Returns true if the chunk has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a column of the chunk data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the chunk has no such column.
    pub fn column(&self, name: &str) -> Result<Column> {
        self.data
            .column_by_name(name)
            .map(|array| Column::new(name, Arc::clone(array)))
            .ok_or_else(|| Error::column_not_found(name))
    }
}

/// Splits a dataset into an ordered, deterministic sequence of chunks.
pub trait Chunker: fmt::Debug + Send + Sync {
    /// Splits the dataset.
    fn split(&self, data: &ArrowDataset) -> Result<Vec<Chunk>>;
}

/// What to do with trailing rows that do not fill a whole chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Incomplete {
    /// Emit them as a smaller final chunk
    #[default]
    Keep,
    /// Discard them
    Drop,
    /// Merge them into the last full chunk
    Append,
}

/// Splits data into chunks of a fixed number of rows.
#[derive(Debug, Clone)]
pub struct SizeBasedChunker {
    chunk_size: usize,
    incomplete: Incomplete,
    timestamp_column_name: Option<String>,
}

impl SizeBasedChunker {
    /// Creates a chunker emitting chunks of `chunk_size` rows.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            incomplete: Incomplete::Keep,
            timestamp_column_name: None,
        }
    }

    /// Sets the policy for trailing rows.
    #[must_use]
    pub fn with_incomplete(mut self, incomplete: Incomplete) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// Fills chunk datetimes from the given timestamp column.
    #[must_use]
    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column_name = Some(name.into());
        self
    }

    /// Configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Chunker for SizeBasedChunker {
    fn split(&self, data: &ArrowDataset) -> Result<Vec<Chunk>> {
        if self.chunk_size == 0 {
            return Err(Error::chunker("chunk_size must be positive"));
        }

        let batch = data.to_batch()?;
        let timestamps = match &self.timestamp_column_name {
            Some(name) => Some(timestamps_of(&batch, name)?),
            None => None,
        };

        let len = batch.num_rows();
        let full = len / self.chunk_size;
        let remainder = len % self.chunk_size;

        let mut ranges: Vec<(usize, usize)> = (0..full)
            .map(|i| (i * self.chunk_size, self.chunk_size))
            .collect();

        if remainder > 0 {
            let start = full * self.chunk_size;
            match self.incomplete {
                Incomplete::Keep => ranges.push((start, remainder)),
                Incomplete::Drop => {}
                Incomplete::Append => match ranges.last_mut() {
                    Some(last) => last.1 += remainder,
                    None => ranges.push((start, remainder)),
                },
            }
        }

        let chunks = ranges
            .into_iter()
            .enumerate()
            .map(|(index, (start, length))| {
                let end = start + length - 1;
                let (start_datetime, end_datetime) = timestamps
                    .as_deref()
                    .map_or((None, None), |ts| datetime_range(&ts[start..=end]));
                Chunk {
                    key: format!("[{start}:{end}]"),
                    index,
                    start_index: start,
                    end_index: end,
                    start_datetime,
                    end_datetime,
                    data: batch.slice(start, length),
                }
            })
            .collect::<Vec<_>>();

        warn_on_few_chunks(chunks.len());
        Ok(chunks)
    }
}

/// Splits data into a fixed number of equally sized chunks.
#[derive(Debug, Clone)]
pub struct CountBasedChunker {
    chunk_number: usize,
    incomplete: Incomplete,
    timestamp_column_name: Option<String>,
}

impl CountBasedChunker {
    /// Creates a chunker emitting `chunk_number` chunks.
    ///
    /// Rows left over by the integer division are appended to the last
    /// chunk unless configured otherwise.
    pub fn new(chunk_number: usize) -> Self {
        Self {
            chunk_number,
            incomplete: Incomplete::Append,
            timestamp_column_name: None,
        }
    }

    /// Sets the policy for trailing rows.
    #[must_use]
    pub fn with_incomplete(mut self, incomplete: Incomplete) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// Fills chunk datetimes from the given timestamp column.
    #[must_use]
    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.timestamp_column_name = Some(name.into());
        self
    }
}

impl Chunker for CountBasedChunker {
    fn split(&self, data: &ArrowDataset) -> Result<Vec<Chunk>> {
        if self.chunk_number == 0 {
            return Err(Error::chunker("chunk_number must be positive"));
        }
        if self.chunk_number > data.len() {
            return Err(Error::invalid_arguments(format!(
                "chunk_number {} is larger than the number of rows {}",
                self.chunk_number,
                data.len()
            )));
        }

        let mut inner = SizeBasedChunker::new(data.len() / self.chunk_number)
            .with_incomplete(self.incomplete);
        inner.timestamp_column_name.clone_from(&self.timestamp_column_name);
        inner.split(data)
    }
}

/// The chunker used when none is configured: ten count based chunks.
#[derive(Debug, Clone)]
pub struct DefaultChunker {
    inner: CountBasedChunker,
}

/// Number of chunks produced by [`DefaultChunker`].
pub const DEFAULT_CHUNK_NUMBER: usize = 10;

impl DefaultChunker {
    /// Creates the default chunker.
    pub fn new() -> Self {
        Self {
            inner: CountBasedChunker::new(DEFAULT_CHUNK_NUMBER),
        }
    }

    /// Fills chunk datetimes from the given timestamp column.
    #[must_use]
    pub fn with_timestamp_column(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.with_timestamp_column(name);
        self
    }
}

impl Default for DefaultChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for DefaultChunker {
    fn split(&self, data: &ArrowDataset) -> Result<Vec<Chunk>> {
        self.inner.split(data)
    }
}

/// Calendar period used by [`PeriodBasedChunker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Calendar day
    Day,
    /// ISO week, starting on Monday
    Week,
    /// Calendar month
    Month,
    /// Calendar quarter
    Quarter,
    /// Calendar year
    Year,
}

impl Period {
    /// First day of the period containing `date`.
    fn start_of(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => Some(date),
            Self::Week => date.checked_sub_days(Days::new(u64::from(
                date.weekday().num_days_from_monday(),
            ))),
            Self::Month => date.with_day(1),
            Self::Quarter => {
                NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1)
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    /// First day of the following period.
    fn next_start(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => start.checked_add_days(Days::new(1)),
            Self::Week => start.checked_add_days(Days::new(7)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Quarter => start.checked_add_months(Months::new(3)),
            Self::Year => start.checked_add_months(Months::new(12)),
        }
    }

    /// Chunk key for the period starting at `start`.
    fn key(self, start: NaiveDate) -> String {
        match self {
            Self::Day => start.format("%Y-%m-%d").to_string(),
            Self::Week => start.format("%G-W%V").to_string(),
            Self::Month => start.format("%Y-%m").to_string(),
            Self::Quarter => format!("{}Q{}", start.year(), start.month0() / 3 + 1),
            Self::Year => start.format("%Y").to_string(),
        }
    }
}

/// Splits data by the calendar period of a timestamp column.
#[derive(Debug, Clone)]
pub struct PeriodBasedChunker {
    timestamp_column_name: String,
    period: Period,
}

impl PeriodBasedChunker {
    /// Creates a period chunker over the given timestamp column.
    pub fn new(timestamp_column_name: impl Into<String>, period: Period) -> Self {
        Self {
            timestamp_column_name: timestamp_column_name.into(),
            period,
        }
    }
}

impl Chunker for PeriodBasedChunker {
    fn split(&self, data: &ArrowDataset) -> Result<Vec<Chunk>> {
        let batch = data.to_batch()?;
        let timestamps = timestamps_of(&batch, &self.timestamp_column_name)?;

        let mut groups: BTreeMap<NaiveDate, Vec<u32>> = BTreeMap::new();
        for (row, ts) in timestamps.iter().enumerate() {
            let ts = ts.ok_or_else(|| {
                Error::invalid_arguments(format!(
                    "timestamp column '{}' contains a missing value at row {row}",
                    self.timestamp_column_name
                ))
            })?;
            let start = self
                .period
                .start_of(ts.date_naive())
                .ok_or_else(|| Error::chunker(format!("no {:?} period for {ts}", self.period)))?;
            let row = u32::try_from(row)
                .map_err(|_| Error::chunker("dataset too large for period chunking"))?;
            groups.entry(start).or_default().push(row);
        }

        let mut chunks = Vec::with_capacity(groups.len());
        for (index, (start, rows)) in groups.into_iter().enumerate() {
            let indices = UInt32Array::from(rows.clone());
            let columns = batch
                .columns()
                .iter()
                .map(|c| take(c.as_ref(), &indices, None))
                .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
            let chunk_data = RecordBatch::try_new(batch.schema(), columns)?;

            let next = self
                .period
                .next_start(start)
                .ok_or_else(|| Error::chunker(format!("period after {start} out of range")))?;

            chunks.push(Chunk {
                key: self.period.key(start),
                index,
                start_index: rows.first().map_or(0, |r| *r as usize),
                end_index: rows.last().map_or(0, |r| *r as usize),
                start_datetime: Some(start.and_time(chrono::NaiveTime::MIN).and_utc()),
                end_datetime: Some(
                    next.and_time(chrono::NaiveTime::MIN).and_utc()
                        - chrono::Duration::nanoseconds(1),
                ),
                data: chunk_data,
            });
        }

        warn_on_few_chunks(chunks.len());
        Ok(chunks)
    }
}

fn warn_on_few_chunks(count: usize) {
    if count < MIN_RECOMMENDED_CHUNKS {
        warn!(
            chunks = count,
            "the resulting number of chunks is too low, consider a smaller chunk size"
        );
    }
}

/// Reads a timestamp or date column as UTC datetimes.
pub(crate) fn timestamps_of(batch: &RecordBatch, name: &str) -> Result<Vec<Option<DateTime<Utc>>>> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| Error::column_not_found(name))?;

    if !matches!(
        array.data_type(),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64
    ) {
        return Err(Error::invalid_arguments(format!(
            "timestamp column '{name}' has non temporal type {}",
            array.data_type()
        )));
    }

    let nanos = cast(array, &DataType::Timestamp(TimeUnit::Nanosecond, None))?;
    let nanos = nanos
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .ok_or_else(|| Error::schema_mismatch("expected nanosecond timestamps after cast"))?;

    Ok(nanos
        .iter()
        .map(|v| v.map(DateTime::from_timestamp_nanos))
        .collect())
}

fn datetime_range(
    timestamps: &[Option<DateTime<Utc>>],
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let present = || timestamps.iter().flatten().copied();
    (present().min(), present().max())
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Float64Array, TimestampSecondArray},
        datatypes::{Field, Schema},
    };

    use super::*;

    fn numbered(rows: usize) -> ArrowDataset {
        ArrowDataset::from_columns(vec![Column::from_f64(
            "x",
            (0..rows).map(|i| i as f64).collect(),
        )])
        .expect("dataset")
    }

    fn with_timestamps(seconds: Vec<i64>) -> ArrowDataset {
        let n = seconds.len();
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("ts", DataType::Timestamp(TimeUnit::Second, None), true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from((0..n).map(|i| i as f64).collect::<Vec<_>>())),
                Arc::new(TimestampSecondArray::from(seconds)),
            ],
        )
        .expect("batch");
        ArrowDataset::from_batch(batch).expect("dataset")
    }

    #[test]
    fn test_size_chunker_keep() {
        let chunks = SizeBasedChunker::new(4).split(&numbered(10)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].key, "[8:9]");
        assert_eq!(chunks[2].len(), 2);
        assert_eq!(chunks[1].start_index, 4);
        assert_eq!(chunks[1].end_index, 7);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_size_chunker_drop() {
        let chunks = SizeBasedChunker::new(4)
            .with_incomplete(Incomplete::Drop)
            .split(&numbered(10))
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.iter().map(Chunk::len).sum::<usize>(), 8);
    }

    #[test]
    fn test_size_chunker_append() {
        let chunks = SizeBasedChunker::new(4)
            .with_incomplete(Incomplete::Append)
            .split(&numbered(10))
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].key, "[4:9]");
        assert_eq!(chunks[1].len(), 6);
    }

    #[test]
    fn test_size_chunker_larger_than_data() {
        let chunks = SizeBasedChunker::new(100).split(&numbered(10)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 10);
    }

    #[test]
    fn test_size_chunker_zero_size() {
        assert!(SizeBasedChunker::new(0).split(&numbered(10)).is_err());
    }

    #[test]
    fn test_count_chunker() {
        let chunks = CountBasedChunker::new(3).split(&numbered(10)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 4);
        assert_eq!(chunks.iter().map(Chunk::len).sum::<usize>(), 10);
    }

    #[test]
    fn test_count_chunker_too_many_chunks() {
        let result = CountBasedChunker::new(20).split(&numbered(10));
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));
    }

    #[test]
    fn test_default_chunker() {
        let chunks = DefaultChunker::new().split(&numbered(1005)).unwrap();
        assert_eq!(chunks.len(), DEFAULT_CHUNK_NUMBER);
        assert_eq!(chunks[9].len(), 105);
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = numbered(50);
        let a = SizeBasedChunker::new(7).split(&data).unwrap();
        let b = SizeBasedChunker::new(7).split(&data).unwrap();
        let keys_a: Vec<_> = a.iter().map(|c| c.key.clone()).collect();
        let keys_b: Vec<_> = b.iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn test_chunk_column() {
        let chunks = SizeBasedChunker::new(5).split(&numbered(10)).unwrap();
        let column = chunks[1].column("x").unwrap();
        assert_eq!(column.len(), 5);
        assert!(chunks[1].column("y").is_err());
    }

    #[test]
    fn test_size_chunker_datetimes() {
        let data = with_timestamps(vec![100, 50, 300, 200]);
        let chunks = SizeBasedChunker::new(2)
            .with_timestamp_column("ts")
            .split(&data)
            .unwrap();
        assert_eq!(chunks[0].start_datetime.unwrap().timestamp(), 50);
        assert_eq!(chunks[0].end_datetime.unwrap().timestamp(), 100);
        assert_eq!(chunks[1].start_datetime.unwrap().timestamp(), 200);
    }

    #[test]
    fn test_period_chunker_month() {
        // 2024-01-15, 2024-01-20, 2024-02-01, 2024-03-10
        let data = with_timestamps(vec![
            1_705_276_800,
            1_705_708_800,
            1_706_745_600,
            1_710_028_800,
        ]);
        let chunks = PeriodBasedChunker::new("ts", Period::Month).split(&data).unwrap();
        let keys: Vec<_> = chunks.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(
            chunks[1].start_datetime.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert_eq!(
            chunks[1].end_datetime.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_period_chunker_orders_by_period() {
        // rows out of time order: 2024-03-10, 2024-01-15
        let data = with_timestamps(vec![1_710_028_800, 1_705_276_800]);
        let chunks = PeriodBasedChunker::new("ts", Period::Quarter).split(&data).unwrap();
        let keys: Vec<_> = chunks.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["2024Q1"]);
        assert_eq!(chunks[0].len(), 2);

        let chunks = PeriodBasedChunker::new("ts", Period::Week).split(&data).unwrap();
        assert_eq!(chunks[0].key, "2024-W03");
        assert_eq!(chunks[0].start_index, 1);
        assert_eq!(chunks[1].key, "2024-W10");
    }

    #[test]
    fn test_period_chunker_rejects_non_temporal() {
        let result = PeriodBasedChunker::new("x", Period::Day).split(&numbered(3));
        assert!(matches!(result, Err(Error::InvalidArguments { .. })));
    }

    #[test]
    fn test_period_keys() {
        let d = NaiveDate::from_ymd_opt(2023, 11, 5).unwrap();
        assert_eq!(Period::Day.key(d), "2023-11-05");
        assert_eq!(Period::Year.key(d), "2023");
        assert_eq!(Period::Quarter.key(Period::Quarter.start_of(d).unwrap()), "2023Q4");
        assert_eq!(
            Period::Week.start_of(d).unwrap(),
            NaiveDate::from_ymd_opt(2023, 10, 30).unwrap()
        );
    }
}
