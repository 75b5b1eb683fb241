//! Reference-value validation of run outputs.
//!
//! Reference values are empirical. When an algorithmic change legitimately
//! moves them, the table is regenerated rather than the tolerance widened.

use crate::witness::compute_witness_id;
use pipecheck_registry::{CatalogSource, DataIdSelector, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const REFERENCE_CHECK_KIND: &str = "pipecheck.reference.check.v1";
pub const DEFAULT_PLACES: u32 = 7;

pub const FAILURE_CLASS_QUANTITY_MISMATCH: &str = "reference.quantity_mismatch";
pub const FAILURE_CLASS_QUANTITY_MISSING: &str = "reference.quantity_missing";
pub const FAILURE_CLASS_ROW_COUNT_MISMATCH: &str = "reference.row_count_mismatch";

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {message}")]
    ReadFile { path: String, message: String },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn default_places() -> u32 {
    DEFAULT_PLACES
}

/// Expected scalar in a quantity dataset, compared to `places` decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantityExpectation {
    pub dataset_type: String,
    pub name: String,
    pub expected: f64,
    #[serde(default = "default_places")]
    pub places: u32,
}

/// Expected number of rows in a catalog dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowCountExpectation {
    pub dataset_type: String,
    pub expected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceTable {
    #[serde(default, rename = "quantity")]
    pub quantities: Vec<QuantityExpectation>,
    #[serde(default, rename = "row_count")]
    pub row_counts: Vec<RowCountExpectation>,
}

impl ReferenceTable {
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ReferenceError> {
        toml::from_str(text).map_err(|source| ReferenceError::ParseToml {
            path: origin.to_string(),
            source,
        })
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ReferenceError::ReadFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    pub fn len(&self) -> usize {
        self.quantities.len() + self.row_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// True when `actual` and `expected` agree once their difference is rounded
/// to `places` decimals. Identical values (including infinities) always agree.
pub fn almost_equal(actual: f64, expected: f64, places: u32) -> bool {
    if actual == expected {
        return true;
    }
    let scaled = (actual - expected).abs() * 10f64.powi(places as i32);
    // Round-half-even sends an exact 0.5 to zero.
    scaled <= 0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceFinding {
    pub witness_id: String,
    pub class: String,
    pub dataset_type: String,
    pub name: String,
    pub actual: Option<f64>,
    pub expected: f64,
    pub places: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceReport {
    pub check_kind: String,
    pub result: String,
    pub checked: usize,
    pub failure_classes: Vec<String>,
    pub failures: Vec<ReferenceFinding>,
}

impl ReferenceReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

/// Check every expectation in `table` against datasets selected by
/// `selector` in `collections`.
///
/// Value mismatches are collected; a dataset that cannot be resolved or
/// read aborts with an error.
pub fn validate_outputs(
    source: &impl CatalogSource,
    collections: &[String],
    selector: &DataIdSelector,
    table: &ReferenceTable,
) -> Result<ReferenceReport, ReferenceError> {
    let mut failures = Vec::new();
    let mut quantity_cache: BTreeMap<&str, BTreeMap<String, f64>> = BTreeMap::new();

    for expectation in &table.quantities {
        let dataset_type = expectation.dataset_type.as_str();
        if !quantity_cache.contains_key(dataset_type) {
            let loaded = source.get_quantities(dataset_type, selector, collections)?;
            quantity_cache.insert(dataset_type, loaded);
        }
        let actual = quantity_cache
            .get(dataset_type)
            .and_then(|values| values.get(&expectation.name))
            .copied();

        let subject = format!("{dataset_type}.{}", expectation.name);
        match actual {
            None => failures.push(ReferenceFinding {
                witness_id: compute_witness_id(FAILURE_CLASS_QUANTITY_MISSING, &subject, None),
                class: FAILURE_CLASS_QUANTITY_MISSING.to_string(),
                dataset_type: dataset_type.to_string(),
                name: expectation.name.clone(),
                actual: None,
                expected: expectation.expected,
                places: Some(expectation.places),
                message: format!("{subject}: quantity not present in dataset"),
            }),
            Some(value) if !almost_equal(value, expectation.expected, expectation.places) => {
                failures.push(ReferenceFinding {
                    witness_id: compute_witness_id(FAILURE_CLASS_QUANTITY_MISMATCH, &subject, None),
                    class: FAILURE_CLASS_QUANTITY_MISMATCH.to_string(),
                    dataset_type: dataset_type.to_string(),
                    name: expectation.name.clone(),
                    actual: Some(value),
                    expected: expectation.expected,
                    places: Some(expectation.places),
                    message: format!(
                        "{subject}: {value:.14} != {:.14} within {} places",
                        expectation.expected, expectation.places
                    ),
                });
            }
            Some(value) => log::debug!("{subject} = {value:.14} matches reference"),
        }
    }

    for expectation in &table.row_counts {
        let catalog = source.get_catalog(&expectation.dataset_type, selector, collections)?;
        if catalog.len() != expectation.expected {
            let subject = format!("{}.rows", expectation.dataset_type);
            failures.push(ReferenceFinding {
                witness_id: compute_witness_id(FAILURE_CLASS_ROW_COUNT_MISMATCH, &subject, None),
                class: FAILURE_CLASS_ROW_COUNT_MISMATCH.to_string(),
                dataset_type: expectation.dataset_type.clone(),
                name: "rows".to_string(),
                actual: Some(catalog.len() as f64),
                expected: expectation.expected as f64,
                places: None,
                message: format!(
                    "{}: {} rows, expected {}",
                    expectation.dataset_type,
                    catalog.len(),
                    expectation.expected
                ),
            });
        }
    }

    log::info!(
        "checked {} reference values, {} failed",
        table.len(),
        failures.len()
    );
    let failure_classes: Vec<String> = failures
        .iter()
        .map(|f| f.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    Ok(ReferenceReport {
        check_kind: REFERENCE_CHECK_KIND.to_string(),
        result: if failures.is_empty() {
            "accepted".to_string()
        } else {
            "rejected".to_string()
        },
        checked: table.len(),
        failure_classes,
        failures,
    })
}
