//! Output-chain update verification.
//!
//! After a run, the output chain must list the new run and the concrete
//! input collections the `HSC/defaults` alias expands to, never the alias
//! itself. When the run was expected not to land, neither may appear.

use crate::witness::compute_witness_id;
use pipecheck_registry::{ChainInfo, CollectionRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CHAIN_CHECK_KIND: &str = "pipecheck.chain.check.v1";

pub const REQUIRED_INPUT_COLLECTIONS: [&str; 3] = ["HSC/calib", "HSC/raw/all", "refcats"];
pub const UNFLATTENED_ALIAS: &str = "HSC/defaults";

pub const FAILURE_CLASS_CHAIN_MISSING: &str = "chain.missing";
pub const FAILURE_CLASS_RUN_MEMBERSHIP: &str = "chain.run_membership";
pub const FAILURE_CLASS_INPUT_COLLECTIONS: &str = "chain.input_collections";
pub const FAILURE_CLASS_UNFLATTENED_ALIAS: &str = "chain.unflattened_alias";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainFinding {
    pub witness_id: String,
    pub class: String,
    pub message: String,
}

impl ChainFinding {
    fn new(class: &str, chain: &str, message: String) -> Self {
        Self {
            witness_id: compute_witness_id(class, chain, None),
            class: class.to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainCheckReport {
    pub check_kind: String,
    pub chain: String,
    pub output_run: String,
    pub expect_present: bool,
    pub chain_exists: bool,
    /// Declared children, absent when the chain does not exist.
    pub children: Option<Vec<String>>,
    pub result: String,
    pub failure_classes: Vec<String>,
    pub errors: Vec<ChainFinding>,
}

impl ChainCheckReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

fn render_children(info: &ChainInfo) -> String {
    format!("{}={:?}", info.name, info.children)
}

/// Run membership check: passes iff `output_run` is a declared child exactly
/// when `expect_present`.
pub fn check_run_membership(
    info: &ChainInfo,
    output_run: &str,
    expect_present: bool,
) -> Option<ChainFinding> {
    let present = info.contains(output_run);
    let message = match (expect_present, present) {
        (true, false) => format!(
            "output run ({output_run}) is not in output chain ({})",
            render_children(info)
        ),
        (false, true) => format!(
            "output run ({output_run}) is in output chain ({}) but shouldn't be",
            render_children(info)
        ),
        _ => return None,
    };
    Some(ChainFinding::new(FAILURE_CLASS_RUN_MEMBERSHIP, &info.name, message))
}

/// Input-collection checks: the three concrete inputs must all be declared
/// children exactly when `expect_present`, and when present the
/// `HSC/defaults` alias must have been flattened away.
pub fn check_input_collections(info: &ChainInfo, expect_present: bool) -> Vec<ChainFinding> {
    let mut findings = Vec::new();
    let inputs: BTreeSet<&str> = REQUIRED_INPUT_COLLECTIONS.into_iter().collect();
    let subset = inputs.iter().all(|name| info.contains(name));

    if expect_present && !subset {
        findings.push(ChainFinding::new(
            FAILURE_CLASS_INPUT_COLLECTIONS,
            &info.name,
            format!(
                "input collections ({inputs:?}) not in output chain ({})",
                render_children(info)
            ),
        ));
    } else if !expect_present && subset {
        findings.push(ChainFinding::new(
            FAILURE_CLASS_INPUT_COLLECTIONS,
            &info.name,
            format!(
                "input collections ({inputs:?}) are in output chain ({}) but shouldn't be",
                render_children(info)
            ),
        ));
    }

    if expect_present && info.contains(UNFLATTENED_ALIAS) {
        findings.push(ChainFinding::new(
            FAILURE_CLASS_UNFLATTENED_ALIAS,
            &info.name,
            format!(
                "{UNFLATTENED_ALIAS} is in output chain ({}) but shouldn't be due to flattening",
                render_children(info)
            ),
        ));
    }
    findings
}

/// Evaluate already-fetched chain metadata. `None` means the chain does not
/// exist.
pub fn verify_chain_info(
    chain: &str,
    info: Option<&ChainInfo>,
    output_run: &str,
    expect_present: bool,
) -> ChainCheckReport {
    let mut errors = Vec::new();
    match info {
        None => {
            if expect_present {
                errors.push(ChainFinding::new(
                    FAILURE_CLASS_CHAIN_MISSING,
                    chain,
                    format!("output chain did not exist ({chain})"),
                ));
            }
        }
        Some(info) => {
            errors.extend(check_run_membership(info, output_run, expect_present));
            errors.extend(check_input_collections(info, expect_present));
        }
    }

    let failure_classes: Vec<String> = errors
        .iter()
        .map(|finding| finding.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let result = if errors.is_empty() {
        "accepted"
    } else {
        "rejected"
    };
    ChainCheckReport {
        check_kind: CHAIN_CHECK_KIND.to_string(),
        chain: chain.to_string(),
        output_run: output_run.to_string(),
        expect_present,
        chain_exists: info.is_some(),
        children: info.map(|i| i.children.clone()),
        result: result.to_string(),
        failure_classes,
        errors,
    }
}

/// Query `chain` from the registry and verify it.
///
/// A missing chain is interpreted through `expect_present`; any other
/// registry failure is returned as an error.
pub fn verify_chain(
    registry: &impl CollectionRegistry,
    chain: &str,
    output_run: &str,
    expect_present: bool,
) -> Result<ChainCheckReport, RegistryError> {
    let info = match registry.query_chain_info(chain) {
        Ok(info) => Some(info),
        Err(RegistryError::MissingCollection(_)) => None,
        Err(other) => return Err(other),
    };
    let report = verify_chain_info(chain, info.as_ref(), output_run, expect_present);
    for finding in &report.errors {
        log::error!("{}", finding.message);
    }
    Ok(report)
}
