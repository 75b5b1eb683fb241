//! Error types for comparator configuration and evaluation.

/// Comparator configuration rejected at construction or load time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A fraction lies outside `[0, 1]` or is not finite.
    #[error("{field} must be a finite fraction in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    /// The search radius is not a finite positive number.
    #[error("max_search_radius_pixels must be finite and > 0, got {0}")]
    InvalidRadius(f64),

    #[error("{field} must not be empty")]
    EmptyColumnName { field: &'static str },

    #[error("failed to read {path}: {message}")]
    ReadFile { path: String, message: String },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures raised by the catalog comparator.
///
/// `MissingSources` and `ColumnDiscrepancy` are criterion failures: strict
/// evaluation returns the first one as an error. The rest are structural and
/// abort evaluation in every mode.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error(
        "unmatched sources fraction {unmatched_fraction:.3} ({unmatched} of {total}) exceeds \
         max_missing_sources_fraction ({allowed:.3})"
    )]
    MissingSources {
        unmatched: usize,
        total: usize,
        unmatched_fraction: f64,
        allowed: f64,
    },

    #[error(
        "catalog discrepancies for column {column} exceed max_fractional_diff: outlier fraction \
         {outlier_fraction:.3} ({discrepant} of {comparable}) > max_outlier_fraction ({allowed:.3})"
    )]
    ColumnDiscrepancy {
        column: String,
        discrepant: usize,
        comparable: usize,
        outlier_fraction: f64,
        allowed: f64,
    },

    /// A centroid column is absent or not floating in one of the catalogs.
    #[error("{catalog} catalog centroid column `{column}`: {reason}")]
    InvalidCentroid {
        catalog: &'static str,
        column: String,
        reason: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
