//! vigilar - Univariate Drift Detection and Data Quality Monitoring
//!
//! Watches the input data of a deployed model for distribution shift
//! without needing ground truth. Reference data (typically the test set)
//! fixes the expected distribution of every column; analysis data is split
//! into chunks, and each chunk is compared against the reference with one
//! or more drift statistics. Alert thresholds come from how those
//! statistics vary across the reference chunks themselves.
//!
//! # Design Principles
//!
//! 1. **Fit once, calculate often** - fitted methods keep only summaries of
//!    the reference data
//! 2. **Typed lifecycle** - an unfit [`drift::Method`] cannot be asked for a
//!    statistic; fitting yields a [`drift::FittedMethod`]
//! 3. **Arrow in, Arrow out** - data arrives as `RecordBatch`es and results
//!    convert back to them
//!
//! # Quick Start
//!
//! ```
//! use vigilar::drift::UnivariateDriftCalculator;
//! use vigilar::{ArrowDataset, Column, SizeBasedChunker};
//!
//! let reference = ArrowDataset::from_columns(vec![Column::from_f64(
//!     "age",
//!     (0..1000).map(|i| 20.0 + f64::from(i % 50)).collect(),
//! )])
//! .unwrap();
//! let analysis = ArrowDataset::from_columns(vec![Column::from_f64(
//!     "age",
//!     (0..200).map(|i| 45.0 + f64::from(i % 50)).collect(),
//! )])
//! .unwrap();
//!
//! let mut calculator = UnivariateDriftCalculator::new(["age"])
//!     .with_continuous_methods(["kolmogorov_smirnov"])
//!     .with_chunker(SizeBasedChunker::new(100))
//!     .fit(&reference)
//!     .unwrap();
//!
//! let result = calculator.calculate(&analysis).unwrap();
//! assert_eq!(result.alerts().len(), 2);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_lossless,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::float_cmp,
        clippy::similar_names,
        clippy::unreadable_literal,
        clippy::too_many_lines
    )
)]
// Allow some pedantic lints for cleaner code
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]

pub mod chunk;
pub mod column;
pub mod config;
pub mod dataset;
pub mod drift;
pub mod error;
pub mod quality;
pub mod result;
pub mod threshold;

// Re-exports for convenience
// Re-export arrow types commonly needed
pub use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
pub use chunk::{
    Chunk, Chunker, CountBasedChunker, DefaultChunker, Incomplete, Period, PeriodBasedChunker,
    SizeBasedChunker,
};
pub use column::{Column, FeatureType, Values};
pub use config::{ChunkerConfig, DriftCalculatorConfig};
pub use dataset::{ArrowDataset, Dataset};
pub use drift::{
    FittedMethod, FittedUnivariateDriftCalculator, Method, MethodKind, MethodRegistry,
    UnivariateDriftCalculator,
};
pub use error::{Error, Result};
pub use quality::{MissingValuesCalculator, UnseenValuesCalculator};
pub use result::{ChunkInfo, DataPeriod, DriftRecord, DriftResult, QualityRecord, QualityResult};
pub use threshold::{calculate_threshold_values, Threshold, ThresholdLimits};
