//! Comparator tolerances.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CENTROID_X_COLUMN: &str = "base_SdssCentroid_x";
pub const DEFAULT_CENTROID_Y_COLUMN: &str = "base_SdssCentroid_y";

/// How the comparator reacts to a failed criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Stop at the first violation and surface it as an error.
    Strict,
    /// Evaluate every criterion and return all violations.
    Collect,
}

impl std::fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Collect => write!(f, "collect"),
        }
    }
}

/// Tolerances for positional catalog comparison.
///
/// Every field has a default and may be overridden independently. TOML
/// files use the field names as keys; absent keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparatorConfig {
    /// Largest `|a - b| / |b|` at which a matched pair still agrees.
    pub max_fractional_diff: f64,

    /// Largest fraction of comparable matched rows per column allowed to
    /// exceed `max_fractional_diff`.
    pub max_outlier_fraction: f64,

    /// Largest fraction of comparison rows allowed to have no source
    /// neighbour within the search radius.
    pub max_missing_sources_fraction: f64,

    /// Nearest-neighbour cutoff in pixels. Inclusive.
    pub max_search_radius_pixels: f64,

    /// Strict (`true`) or collecting (`false`) evaluation.
    pub do_raise: bool,

    pub centroid_x_column: String,
    pub centroid_y_column: String,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            max_fractional_diff: 0.01,
            max_outlier_fraction: 0.01,
            max_missing_sources_fraction: 0.01,
            max_search_radius_pixels: 2.0,
            do_raise: true,
            centroid_x_column: DEFAULT_CENTROID_X_COLUMN.to_string(),
            centroid_y_column: DEFAULT_CENTROID_Y_COLUMN.to_string(),
        }
    }
}

impl ComparatorConfig {
    /// Check ranges: fractions in `[0, 1]`, radius finite and positive,
    /// centroid names non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_fractional_diff", self.max_fractional_diff),
            ("max_outlier_fraction", self.max_outlier_fraction),
            (
                "max_missing_sources_fraction",
                self.max_missing_sources_fraction,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { field, value });
            }
        }
        if !self.max_search_radius_pixels.is_finite() || self.max_search_radius_pixels <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.max_search_radius_pixels));
        }
        if self.centroid_x_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumnName {
                field: "centroid_x_column",
            });
        }
        if self.centroid_y_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumnName {
                field: "centroid_y_column",
            });
        }
        Ok(())
    }

    /// Consume and return the config if it validates.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    pub fn mode(&self) -> EvaluationMode {
        if self.do_raise {
            EvaluationMode::Strict
        } else {
            EvaluationMode::Collect
        }
    }

    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })?;
        config.validated()
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }
}
