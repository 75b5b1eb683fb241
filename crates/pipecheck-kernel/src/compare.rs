//! Positional catalog comparison.
//!
//! Every comparison row is matched to its nearest source row within the
//! search radius, then every floating column shared by both catalogs is
//! checked for fractional agreement over the matched pairs.
//!
//! Matching is many-to-one: two comparison rows may pick the same source
//! row. There is no one-to-one assignment step, so dense fields can hide
//! discrepancies behind a shared neighbour.

use crate::config::{ComparatorConfig, EvaluationMode};
use crate::error::CompareError;
use crate::kdtree::KdTree2;
use crate::witness::compute_witness_id;
use pipecheck_registry::{Catalog, Column};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

pub const COMPARE_CHECK_KIND: &str = "pipecheck.compare.v1";

pub const FAILURE_CLASS_MISSING_SOURCES: &str = "compare.missing_sources";
pub const FAILURE_CLASS_COLUMN_DISCREPANCY: &str = "compare.column_discrepancy";

/// One comparison row paired with its nearest source row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentroidMatch {
    pub comparison_row: usize,
    pub source_row: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchSet {
    pub matches: Vec<CentroidMatch>,
    pub unmatched_rows: Vec<usize>,
}

impl MatchSet {
    /// Fraction of comparison rows with no neighbour; 0 for no rows.
    pub fn unmatched_fraction(&self) -> f64 {
        let total = self.matches.len() + self.unmatched_rows.len();
        if total == 0 {
            0.0
        } else {
            self.unmatched_rows.len() as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnComparison {
    pub column: String,
    /// Matched pairs with a usable fractional difference.
    pub comparable: usize,
    /// Matched pairs dropped for a zero reference or a NaN ratio.
    pub excluded: usize,
    pub discrepant: usize,
    pub outlier_fraction: f64,
    pub max_observed_fractional_diff: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonViolation {
    pub witness_id: String,
    pub class: String,
    pub column: Option<String>,
    pub count: usize,
    pub total: usize,
    pub fraction: f64,
    pub allowed: f64,
    pub message: String,
}

impl ComparisonViolation {
    fn missing_sources(unmatched: usize, total: usize, fraction: f64, allowed: f64) -> Self {
        let error = CompareError::MissingSources {
            unmatched,
            total,
            unmatched_fraction: fraction,
            allowed,
        };
        Self {
            witness_id: compute_witness_id(FAILURE_CLASS_MISSING_SOURCES, "comparison", None),
            class: FAILURE_CLASS_MISSING_SOURCES.to_string(),
            column: None,
            count: unmatched,
            total,
            fraction,
            allowed,
            message: error.to_string(),
        }
    }

    fn column_discrepancy(stats: &ColumnComparison, allowed: f64) -> Self {
        let error = CompareError::ColumnDiscrepancy {
            column: stats.column.clone(),
            discrepant: stats.discrepant,
            comparable: stats.comparable,
            outlier_fraction: stats.outlier_fraction,
            allowed,
        };
        Self {
            witness_id: compute_witness_id(
                FAILURE_CLASS_COLUMN_DISCREPANCY,
                &stats.column,
                Some(&json!({ "comparable": stats.comparable })),
            ),
            class: FAILURE_CLASS_COLUMN_DISCREPANCY.to_string(),
            column: Some(stats.column.clone()),
            count: stats.discrepant,
            total: stats.comparable,
            fraction: stats.outlier_fraction,
            allowed,
            message: error.to_string(),
        }
    }

    /// The error strict evaluation raises for this violation.
    pub fn to_error(&self) -> CompareError {
        match &self.column {
            None => CompareError::MissingSources {
                unmatched: self.count,
                total: self.total,
                unmatched_fraction: self.fraction,
                allowed: self.allowed,
            },
            Some(column) => CompareError::ColumnDiscrepancy {
                column: column.clone(),
                discrepant: self.count,
                comparable: self.total,
                outlier_fraction: self.fraction,
                allowed: self.allowed,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub check_kind: String,
    pub result: String,
    pub mode: EvaluationMode,
    pub source_rows: usize,
    pub comparison_rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub unmatched_fraction: f64,
    /// Shared floating columns, in source schema order.
    pub shared_float_columns: Vec<String>,
    /// Per-column statistics for the columns actually evaluated.
    pub columns: Vec<ColumnComparison>,
    pub failure_classes: Vec<String>,
    pub violations: Vec<ComparisonViolation>,
}

impl ComparisonReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

/// Pair each comparison row with its nearest source row within the radius.
pub fn match_centroids(
    source: &Catalog,
    comparison: &Catalog,
    config: &ComparatorConfig,
) -> Result<MatchSet, CompareError> {
    let source_points = centroids(source, "source", config)?;
    let comparison_points = centroids(comparison, "comparison", config)?;

    let tree = KdTree2::build(&source_points);
    let mut set = MatchSet::default();
    for (row, point) in comparison_points.iter().enumerate() {
        match tree.nearest_within(*point, config.max_search_radius_pixels) {
            Some(neighbor) => set.matches.push(CentroidMatch {
                comparison_row: row,
                source_row: neighbor.index,
                distance: neighbor.distance,
            }),
            None => set.unmatched_rows.push(row),
        }
    }
    Ok(set)
}

fn centroids(
    catalog: &Catalog,
    label: &'static str,
    config: &ComparatorConfig,
) -> Result<Vec<[f64; 2]>, CompareError> {
    let x = centroid_column(catalog, label, &config.centroid_x_column)?;
    let y = centroid_column(catalog, label, &config.centroid_y_column)?;
    Ok((0..catalog.len())
        .map(|row| {
            [
                x.float_at(row).unwrap_or(f64::NAN),
                y.float_at(row).unwrap_or(f64::NAN),
            ]
        })
        .collect())
}

fn centroid_column<'a>(
    catalog: &'a Catalog,
    label: &'static str,
    name: &str,
) -> Result<&'a Column, CompareError> {
    let column = catalog
        .column(name)
        .ok_or_else(|| CompareError::InvalidCentroid {
            catalog: label,
            column: name.to_string(),
            reason: "column not present".to_string(),
        })?;
    if !column.dtype().is_floating() {
        return Err(CompareError::InvalidCentroid {
            catalog: label,
            column: name.to_string(),
            reason: format!("column is {}, not floating", column.dtype()),
        });
    }
    Ok(column)
}

/// Floating columns present in both catalogs, in source schema order.
pub fn shared_float_columns(source: &Catalog, comparison: &Catalog) -> Vec<String> {
    let comparison_floats: BTreeSet<&str> = comparison.float_column_names().into_iter().collect();
    source
        .float_column_names()
        .into_iter()
        .filter(|name| comparison_floats.contains(name))
        .map(str::to_string)
        .collect()
}

/// Fractional agreement of one column over the matched pairs.
pub fn compare_column(
    source: &Column,
    comparison: &Column,
    matches: &[CentroidMatch],
    max_fractional_diff: f64,
    max_outlier_fraction: f64,
) -> ColumnComparison {
    let mut comparable = 0usize;
    let mut excluded = 0usize;
    let mut discrepant = 0usize;
    let mut max_observed: Option<f64> = None;

    for pair in matches {
        let (Some(a), Some(b)) = (
            source.float_at(pair.source_row),
            comparison.float_at(pair.comparison_row),
        ) else {
            excluded += 1;
            continue;
        };
        // An infinite ratio against a non-zero reference stays comparable.
        let fractional = (a - b).abs() / b.abs();
        if b == 0.0 || fractional.is_nan() {
            excluded += 1;
            continue;
        }
        comparable += 1;
        max_observed = Some(max_observed.map_or(fractional, |m: f64| m.max(fractional)));
        if fractional > max_fractional_diff {
            discrepant += 1;
        }
    }

    let outlier_fraction = if comparable == 0 {
        0.0
    } else {
        discrepant as f64 / comparable as f64
    };
    ColumnComparison {
        column: source.name.clone(),
        comparable,
        excluded,
        discrepant,
        outlier_fraction,
        max_observed_fractional_diff: max_observed,
        passed: outlier_fraction <= max_outlier_fraction,
    }
}

/// Core comparison routine shared by both evaluation modes.
///
/// `Strict` stops at the first violation; `Collect` evaluates every column.
/// In both modes a missing-sources violation ends evaluation before any
/// column is examined. Structural problems (bad config, unusable centroid
/// columns) are errors in both modes.
pub fn evaluate(
    source: &Catalog,
    comparison: &Catalog,
    config: &ComparatorConfig,
    mode: EvaluationMode,
) -> Result<ComparisonReport, CompareError> {
    config.validate()?;

    let matched = match_centroids(source, comparison, config)?;
    let unmatched_fraction = matched.unmatched_fraction();
    let shared = shared_float_columns(source, comparison);

    let mut report = ComparisonReport {
        check_kind: COMPARE_CHECK_KIND.to_string(),
        result: "accepted".to_string(),
        mode,
        source_rows: source.len(),
        comparison_rows: comparison.len(),
        matched: matched.matches.len(),
        unmatched: matched.unmatched_rows.len(),
        unmatched_fraction,
        shared_float_columns: shared.clone(),
        columns: Vec::new(),
        failure_classes: Vec::new(),
        violations: Vec::new(),
    };

    if comparison.is_empty() {
        log::warn!("comparison catalog is empty; nothing to compare");
    }

    if unmatched_fraction > config.max_missing_sources_fraction {
        report.violations.push(ComparisonViolation::missing_sources(
            report.unmatched,
            comparison.len(),
            unmatched_fraction,
            config.max_missing_sources_fraction,
        ));
        return Ok(finish(report));
    }

    log::info!("Comparing {} float columns", shared.len());
    for name in &shared {
        let (Some(source_column), Some(comparison_column)) =
            (source.column(name), comparison.column(name))
        else {
            continue;
        };
        let stats = compare_column(
            source_column,
            comparison_column,
            &matched.matches,
            config.max_fractional_diff,
            config.max_outlier_fraction,
        );
        log::debug!(
            "Column {} discrepant fraction {:.3} ({} sources out of {}, {} excluded)",
            stats.column,
            stats.outlier_fraction,
            stats.discrepant,
            stats.comparable,
            stats.excluded
        );
        let failed = !stats.passed;
        if failed {
            report.violations.push(ComparisonViolation::column_discrepancy(
                &stats,
                config.max_outlier_fraction,
            ));
        }
        report.columns.push(stats);
        if failed && mode == EvaluationMode::Strict {
            break;
        }
    }

    Ok(finish(report))
}

fn finish(mut report: ComparisonReport) -> ComparisonReport {
    report.failure_classes = report
        .violations
        .iter()
        .map(|v| v.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !report.violations.is_empty() {
        report.result = "rejected".to_string();
    }
    report
}

/// Compare two catalogs under `config`.
///
/// With `do_raise` set the first failed criterion comes back as `Err`;
/// otherwise the report lists every violation.
pub fn compare(
    source: &Catalog,
    comparison: &Catalog,
    config: &ComparatorConfig,
) -> Result<ComparisonReport, CompareError> {
    let mode = config.mode();
    let report = evaluate(source, comparison, config, mode)?;
    if mode == EvaluationMode::Strict
        && let Some(first) = report.violations.first()
    {
        return Err(first.to_error());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(xs: &[f64], ys: &[f64], flux: &[f64]) -> Catalog {
        Catalog::new(vec![
            Column::float64("x", xs.to_vec()),
            Column::float64("y", ys.to_vec()),
            Column::float64("flux", flux.to_vec()),
        ])
        .expect("catalog should build")
    }

    fn config() -> ComparatorConfig {
        ComparatorConfig {
            centroid_x_column: "x".to_string(),
            centroid_y_column: "y".to_string(),
            ..ComparatorConfig::default()
        }
    }

    #[test]
    fn match_set_records_unmatched_rows() {
        let source = catalog(&[0.0, 10.0], &[0.0, 0.0], &[1.0, 1.0]);
        let comparison = catalog(&[0.5, 50.0], &[0.0, 0.0], &[1.0, 1.0]);
        let set = match_centroids(&source, &comparison, &config()).expect("match");
        assert_eq!(set.matches.len(), 1);
        assert_eq!(set.matches[0].source_row, 0);
        assert_eq!(set.unmatched_rows, vec![1]);
        assert_eq!(set.unmatched_fraction(), 0.5);
    }

    #[test]
    fn shared_columns_require_floating_on_both_sides() {
        let source = Catalog::new(vec![
            Column::float64("x", vec![0.0]),
            Column::float64("y", vec![0.0]),
            Column::float64("flux", vec![1.0]),
            Column::float32("shape", vec![1.0]),
            Column::float64("only_source", vec![1.0]),
        ])
        .expect("catalog");
        let comparison = Catalog::new(vec![
            Column::float64("y", vec![0.0]),
            Column::float64("x", vec![0.0]),
            Column::int64("flux", vec![1]),
            Column::float64("shape", vec![1.0]),
        ])
        .expect("catalog");
        assert_eq!(shared_float_columns(&source, &comparison), vec!["x", "y", "shape"]);
    }

    #[test]
    fn zero_reference_is_excluded_from_both_counts() {
        let source = Column::float64("flux", vec![5.0, 1.0]);
        let comparison = Column::float64("flux", vec![0.0, 1.0]);
        let matches = [
            CentroidMatch {
                comparison_row: 0,
                source_row: 0,
                distance: 0.0,
            },
            CentroidMatch {
                comparison_row: 1,
                source_row: 1,
                distance: 0.0,
            },
        ];
        let stats = compare_column(&source, &comparison, &matches, 0.01, 0.01);
        assert_eq!(stats.comparable, 1);
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.discrepant, 0);
        assert!(stats.passed);
    }

    #[test]
    fn missing_centroid_column_is_structural_error() {
        let source = Catalog::new(vec![Column::float64("flux", vec![1.0])]).expect("catalog");
        let comparison = catalog(&[0.0], &[0.0], &[1.0]);
        match evaluate(&source, &comparison, &config(), EvaluationMode::Collect) {
            Err(CompareError::InvalidCentroid { catalog, column, .. }) => {
                assert_eq!(catalog, "source");
                assert_eq!(column, "x");
            }
            other => panic!("expected centroid error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_matching() {
        let bad = ComparatorConfig {
            max_search_radius_pixels: 0.0,
            ..config()
        };
        let cat = catalog(&[0.0], &[0.0], &[1.0]);
        assert!(matches!(
            compare(&cat, &cat, &bad),
            Err(CompareError::Config(_))
        ));
    }

    #[test]
    fn empty_comparison_catalog_passes_with_nothing_compared() {
        let source = catalog(&[0.0], &[0.0], &[1.0]);
        let comparison = catalog(&[], &[], &[]);
        let report = compare(&source, &comparison, &config()).expect("empty comparison passes");
        assert!(report.accepted());
        assert_eq!(report.unmatched_fraction, 0.0);
        assert!(report.columns.iter().all(|c| c.comparable == 0));
    }
}
