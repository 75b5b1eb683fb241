//! # pipecheck-kernel
//!
//! Verification of `pipelines_check` outputs. Every check takes data
//! through the `pipecheck-registry` traits and returns a report with a
//! `checkKind`, an `accepted`/`rejected` result, deduplicated failure
//! classes and one finding per failure.
//!
//! ## Checks
//!
//! ```text
//! compare            ← source vs comparison catalog, k-d tree match + tolerance
//! chain              ← output chain lists (or omits) the run and its inputs
//! transfer           ← `butler` output reports the expected dataset count
//! reference          ← quantities and row counts against a reference table
//! parity             ← direct run vs execution-butler run hold the same datasets
//!                      and the same number of task log records
//! ```
//!
//! Failure findings carry a `witness_id` derived from their class and
//! subject, so the same failure keeps the same id across runs.

pub mod chain;
pub mod compare;
pub mod config;
pub mod error;
pub mod kdtree;
pub mod parity;
pub mod reference;
pub mod transfer;
pub mod witness;

pub use chain::{
    CHAIN_CHECK_KIND, ChainCheckReport, ChainFinding, REQUIRED_INPUT_COLLECTIONS,
    UNFLATTENED_ALIAS, check_input_collections, check_run_membership, verify_chain,
    verify_chain_info,
};
pub use compare::{
    COMPARE_CHECK_KIND, CentroidMatch, ColumnComparison, ComparisonReport, ComparisonViolation,
    MatchSet, compare, compare_column, evaluate, match_centroids, shared_float_columns,
};
pub use config::{
    ComparatorConfig, DEFAULT_CENTROID_X_COLUMN, DEFAULT_CENTROID_Y_COLUMN, EvaluationMode,
};
pub use error::{CompareError, ConfigError};
pub use kdtree::{KdTree2, Neighbor};
pub use parity::{
    DEFAULT_LOG_DATASET_TYPE, LOG_PARITY_CHECK_KIND, LogParityReport, PARITY_CHECK_KIND,
    ParityError, ParityFinding, ParityReport, check_log_parity, check_run_parity,
};
pub use reference::{
    QuantityExpectation, REFERENCE_CHECK_KIND, ReferenceError, ReferenceFinding, ReferenceReport,
    ReferenceTable, RowCountExpectation, almost_equal, validate_outputs,
};
pub use transfer::{TransferCountError, TransferSource, check_transfer_count};
pub use witness::compute_witness_id;
