//! Output parity between a direct run and an execution-butler run.
//!
//! Each chain's first flattened collection is its newest run. Both runs
//! must hold the same datasets, compared by dataset type and data id only;
//! dataset ids legitimately differ.
//!
//! Log parity narrows this to one task log: the main run must hold exactly
//! one log dataset, and the same data id must carry the same number of log
//! records through both chains. Record contents (timestamps) may differ.

use crate::witness::compute_witness_id;
use pipecheck_registry::{
    CatalogSource, CollectionRegistry, DataId, DataIdSelector, RegistryError, format_data_id,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PARITY_CHECK_KIND: &str = "pipecheck.run_parity.check.v1";
pub const MISSING_SAMPLE_LIMIT: usize = 25;

pub const FAILURE_CLASS_EXE_EMPTY: &str = "parity.exe_empty";
pub const FAILURE_CLASS_COUNT_MISMATCH: &str = "parity.count_mismatch";
pub const FAILURE_CLASS_MISSING: &str = "parity.missing";
pub const FAILURE_CLASS_ARTIFACT_MISSING: &str = "parity.artifact_missing";

pub const LOG_PARITY_CHECK_KIND: &str = "pipecheck.log_parity.check.v1";
pub const DEFAULT_LOG_DATASET_TYPE: &str = "isr_log";

pub const FAILURE_CLASS_LOG_DATASET_COUNT: &str = "parity.log_dataset_count";
pub const FAILURE_CLASS_LOG_MISSING: &str = "parity.log_missing";
pub const FAILURE_CLASS_LOG_RECORD_MISMATCH: &str = "parity.log_record_mismatch";

#[derive(Debug, thiserror::Error)]
pub enum ParityError {
    #[error("chain `{0}` flattens to no collections")]
    EmptyChain(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParityFinding {
    pub witness_id: String,
    pub class: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParityReport {
    pub check_kind: String,
    pub result: String,
    pub main_run: String,
    pub exe_run: String,
    pub dataset_type: Option<String>,
    pub main_count: usize,
    pub exe_count: usize,
    /// Datasets present in the main run but not in the execution run.
    pub missing_sample: Vec<String>,
    pub missing_count: usize,
    pub failure_classes: Vec<String>,
    pub errors: Vec<ParityFinding>,
}

impl ParityReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogParityReport {
    pub check_kind: String,
    pub result: String,
    pub main_run: String,
    pub dataset_type: String,
    /// Log datasets of `dataset_type` found in the main run; must be 1.
    pub log_dataset_count: usize,
    pub data_id: Option<String>,
    pub main_records: Option<usize>,
    pub exe_records: Option<usize>,
    pub failure_classes: Vec<String>,
    pub errors: Vec<ParityFinding>,
}

impl LogParityReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

fn result_label(errors: &[ParityFinding]) -> String {
    if errors.is_empty() {
        "accepted".to_string()
    } else {
        "rejected".to_string()
    }
}

fn dedup_classes(errors: &[ParityFinding]) -> Vec<String> {
    errors
        .iter()
        .map(|f| f.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn finding(class: &str, subject: &str, message: String) -> ParityFinding {
    ParityFinding {
        witness_id: compute_witness_id(class, subject, None),
        class: class.to_string(),
        message,
    }
}

fn first_run(registry: &impl CollectionRegistry, chain: &str) -> Result<String, ParityError> {
    let mut flattened = registry.flatten(chain)?;
    if flattened.is_empty() {
        return Err(ParityError::EmptyChain(chain.to_string()));
    }
    Ok(flattened.swap_remove(0))
}

fn unresolved_keys(
    registry: &impl CollectionRegistry,
    run: &str,
    dataset_type: Option<&str>,
) -> Result<BTreeSet<(String, DataId)>, RegistryError> {
    Ok(registry
        .datasets_in(run, dataset_type)?
        .iter()
        .map(|dataset| dataset.unresolved())
        .collect())
}

/// Compare the first runs of `main_chain` and `exe_chain`.
pub fn check_run_parity(
    registry: &impl CollectionRegistry,
    main_chain: &str,
    exe_chain: &str,
    dataset_type: Option<&str>,
) -> Result<ParityReport, ParityError> {
    let main_run = first_run(registry, main_chain)?;
    let exe_run = first_run(registry, exe_chain)?;
    log::info!("Retrieving datasets from runs {main_run} and {exe_run}");

    let main = unresolved_keys(registry, &main_run, dataset_type)?;
    let exe = unresolved_keys(registry, &exe_run, dataset_type)?;

    let mut errors = Vec::new();
    if exe.is_empty() {
        errors.push(finding(
            FAILURE_CLASS_EXE_EMPTY,
            exe_chain,
            format!("execution run {exe_run} holds no datasets"),
        ));
    }
    if main.len() != exe.len() {
        errors.push(finding(
            FAILURE_CLASS_COUNT_MISMATCH,
            exe_chain,
            format!(
                "{main_run} holds {} datasets, {exe_run} holds {}",
                main.len(),
                exe.len()
            ),
        ));
    }

    let missing: Vec<String> = main
        .difference(&exe)
        .map(|(dataset_type, data_id)| format!("{dataset_type}@{{{}}}", format_data_id(data_id)))
        .collect();
    if !missing.is_empty() {
        errors.push(finding(
            FAILURE_CLASS_MISSING,
            exe_chain,
            format!("{} datasets of {main_run} are missing from {exe_run}", missing.len()),
        ));
    }

    let absent: Vec<String> = registry
        .datasets_in(&exe_run, dataset_type)?
        .into_iter()
        .filter(|dataset| !registry.dataset_exists(dataset))
        .map(|dataset| dataset.path)
        .collect();
    if !absent.is_empty() {
        errors.push(finding(
            FAILURE_CLASS_ARTIFACT_MISSING,
            exe_chain,
            format!(
                "{} datasets of {exe_run} have no stored artifact (first: {})",
                absent.len(),
                absent[0]
            ),
        ));
    }

    let missing_count = missing.len();
    Ok(ParityReport {
        check_kind: PARITY_CHECK_KIND.to_string(),
        result: result_label(&errors),
        main_run,
        exe_run,
        dataset_type: dataset_type.map(str::to_string),
        main_count: main.len(),
        exe_count: exe.len(),
        missing_sample: missing.into_iter().take(MISSING_SAMPLE_LIMIT).collect(),
        missing_count,
        failure_classes: dedup_classes(&errors),
        errors,
    })
}

/// Compare the record counts of the single `dataset_type` log dataset of
/// `main_chain`'s first run, read through `main_chain` and `exe_chain`.
pub fn check_log_parity<S>(
    source: &S,
    main_chain: &str,
    exe_chain: &str,
    dataset_type: &str,
) -> Result<LogParityReport, ParityError>
where
    S: CollectionRegistry + CatalogSource,
{
    let main_run = first_run(source, main_chain)?;
    let logs = source.datasets_in(&main_run, Some(dataset_type))?;
    log::info!("Found {} `{dataset_type}` dataset(s) in {main_run}", logs.len());

    let mut report = LogParityReport {
        check_kind: LOG_PARITY_CHECK_KIND.to_string(),
        result: String::new(),
        main_run,
        dataset_type: dataset_type.to_string(),
        log_dataset_count: logs.len(),
        data_id: None,
        main_records: None,
        exe_records: None,
        failure_classes: Vec::new(),
        errors: Vec::new(),
    };

    if let [log_ref] = logs.as_slice() {
        let selector = DataIdSelector::from(&log_ref.data_id);
        report.data_id = Some(format_data_id(&log_ref.data_id));
        let main_records = source
            .get_log_records(dataset_type, &selector, &[main_chain.to_string()])?
            .len();
        report.main_records = Some(main_records);

        match source.get_log_records(dataset_type, &selector, &[exe_chain.to_string()]) {
            Ok(records) => {
                report.exe_records = Some(records.len());
                if records.len() != main_records {
                    report.errors.push(finding(
                        FAILURE_CLASS_LOG_RECORD_MISMATCH,
                        exe_chain,
                        format!(
                            "`{dataset_type}` {selector} holds {main_records} records in \
                             {main_chain} but {} in {exe_chain}",
                            records.len()
                        ),
                    ));
                }
            }
            Err(RegistryError::DatasetNotFound { .. }) => {
                report.errors.push(finding(
                    FAILURE_CLASS_LOG_MISSING,
                    exe_chain,
                    format!("`{dataset_type}` {selector} is not reachable from {exe_chain}"),
                ));
            }
            Err(other) => return Err(other.into()),
        }
    } else {
        report.errors.push(finding(
            FAILURE_CLASS_LOG_DATASET_COUNT,
            main_chain,
            format!(
                "{} holds {} `{dataset_type}` datasets, expected exactly 1",
                report.main_run,
                logs.len()
            ),
        ));
    }

    report.result = result_label(&report.errors);
    report.failure_classes = dedup_classes(&report.errors);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipecheck_registry::{
        CollectionRecord, DataIdValue, DatasetRef, FileRepository, MANIFEST_SCHEMA,
        RepositoryManifest,
    };
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after unix epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!(
            "pipecheck-parity-{prefix}-{}-{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&root).expect("temp root should be created");
        root
    }

    fn dataset(id: &str, dataset_type: &str, run: &str, visit: i64) -> DatasetRef {
        DatasetRef {
            id: id.to_string(),
            dataset_type: dataset_type.to_string(),
            run: run.to_string(),
            data_id: BTreeMap::from([("visit".to_string(), DataIdValue::Int(visit))]),
            path: format!("{id}.json"),
        }
    }

    fn log_dataset(id: &str, run: &str, visit: i64, records: usize) -> (DatasetRef, String) {
        let lines: Vec<String> = (0..records)
            .map(|i| format!(r#"{{"name": "isr", "message": "step {i}", "asctime": "{id}"}}"#))
            .collect();
        (dataset(id, DEFAULT_LOG_DATASET_TYPE, run, visit), lines.join("\n"))
    }

    fn repo(root: &PathBuf, main: Vec<DatasetRef>, exe: Vec<DatasetRef>) -> FileRepository {
        for d in main.iter().chain(exe.iter()) {
            std::fs::write(root.join(&d.path), "{}").expect("artifact should be written");
        }
        let manifest = RepositoryManifest {
            schema: MANIFEST_SCHEMA,
            collections: vec![
                CollectionRecord::run("main/run"),
                CollectionRecord::run("exe/run"),
                CollectionRecord::run("refcats"),
                CollectionRecord::chain("main", ["main/run", "refcats"]),
                CollectionRecord::chain("exe", ["exe/run", "refcats"]),
                CollectionRecord::chain("hollow", Vec::<String>::new()),
            ],
            datasets: main.into_iter().chain(exe).collect(),
        };
        FileRepository::from_manifest(root.clone(), manifest).expect("repository should build")
    }

    #[test]
    fn identical_runs_with_different_ids_are_accepted() {
        let root = temp_root("same");
        let repo = repo(
            &root,
            vec![dataset("m1", "src", "main/run", 1), dataset("m2", "calexp", "main/run", 1)],
            vec![dataset("e1", "src", "exe/run", 1), dataset("e2", "calexp", "exe/run", 1)],
        );
        let report = check_run_parity(&repo, "main", "exe", None).expect("parity should run");
        assert!(report.accepted(), "{report:?}");
        assert_eq!((report.main_count, report.exe_count), (2, 2));
        assert_eq!(report.main_run, "main/run");
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn missing_dataset_is_reported_with_sample() {
        let root = temp_root("missing");
        let repo = repo(
            &root,
            vec![dataset("m1", "src", "main/run", 1), dataset("m2", "src", "main/run", 2)],
            vec![dataset("e1", "src", "exe/run", 1)],
        );
        let report = check_run_parity(&repo, "main", "exe", None).expect("parity should run");
        assert_eq!(
            report.failure_classes,
            vec![FAILURE_CLASS_COUNT_MISMATCH, FAILURE_CLASS_MISSING]
        );
        assert_eq!(report.missing_count, 1);
        assert_eq!(report.missing_sample, vec!["src@{visit=2}".to_string()]);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn empty_execution_run_and_type_filter() {
        let root = temp_root("empty");
        let repo = repo(
            &root,
            vec![dataset("m1", "src", "main/run", 1)],
            vec![dataset("e1", "calexp", "exe/run", 1)],
        );
        let report =
            check_run_parity(&repo, "main", "exe", Some("src")).expect("parity should run");
        assert!(report.failure_classes.contains(&FAILURE_CLASS_EXE_EMPTY.to_string()));
        assert_eq!(report.dataset_type.as_deref(), Some("src"));

        let report =
            check_run_parity(&repo, "main", "exe", Some("deepCoadd")).expect("parity should run");
        assert_eq!(report.failure_classes, vec![FAILURE_CLASS_EXE_EMPTY]);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn absent_artifact_is_reported() {
        let root = temp_root("artifact");
        let repo = repo(
            &root,
            vec![dataset("m1", "src", "main/run", 1)],
            vec![dataset("e1", "src", "exe/run", 1)],
        );
        std::fs::remove_file(root.join("e1.json")).expect("artifact should be removed");
        let report = check_run_parity(&repo, "main", "exe", None).expect("parity should run");
        assert_eq!(report.failure_classes, vec![FAILURE_CLASS_ARTIFACT_MISSING]);
        assert!(report.errors[0].message.contains("e1.json"));
        let _ = std::fs::remove_dir_all(root);
    }

    fn log_repo(
        root: &PathBuf,
        main: Vec<(DatasetRef, String)>,
        exe: Vec<(DatasetRef, String)>,
    ) -> FileRepository {
        let (main_refs, exe_refs): (Vec<DatasetRef>, Vec<DatasetRef>) = (
            main.iter().map(|(d, _)| d.clone()).collect(),
            exe.iter().map(|(d, _)| d.clone()).collect(),
        );
        let repository = repo(root, main_refs, exe_refs);
        for (d, text) in main.iter().chain(exe.iter()) {
            std::fs::write(root.join(&d.path), text).expect("log should be written");
        }
        repository
    }

    #[test]
    fn log_parity_accepts_equal_record_counts() {
        let root = temp_root("log-same");
        let repo = log_repo(
            &root,
            vec![log_dataset("m1", "main/run", 1, 3)],
            vec![log_dataset("e1", "exe/run", 1, 3)],
        );
        let report = check_log_parity(&repo, "main", "exe", DEFAULT_LOG_DATASET_TYPE)
            .expect("log parity should run");
        assert!(report.accepted(), "{report:?}");
        assert_eq!(report.data_id.as_deref(), Some("visit=1"));
        assert_eq!((report.main_records, report.exe_records), (Some(3), Some(3)));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn log_parity_rejects_differing_record_counts() {
        let root = temp_root("log-differ");
        let repo = log_repo(
            &root,
            vec![log_dataset("m1", "main/run", 1, 3)],
            vec![log_dataset("e1", "exe/run", 1, 2)],
        );
        let report = check_log_parity(&repo, "main", "exe", DEFAULT_LOG_DATASET_TYPE)
            .expect("log parity should run");
        assert_eq!(report.failure_classes, vec![FAILURE_CLASS_LOG_RECORD_MISMATCH]);
        assert_eq!((report.main_records, report.exe_records), (Some(3), Some(2)));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn log_parity_requires_exactly_one_main_log() {
        let root = temp_root("log-count");
        let repo = log_repo(
            &root,
            vec![
                log_dataset("m1", "main/run", 1, 3),
                log_dataset("m2", "main/run", 2, 3),
            ],
            vec![log_dataset("e1", "exe/run", 1, 3)],
        );
        let report = check_log_parity(&repo, "main", "exe", DEFAULT_LOG_DATASET_TYPE)
            .expect("log parity should run");
        assert_eq!(report.failure_classes, vec![FAILURE_CLASS_LOG_DATASET_COUNT]);
        assert_eq!(report.log_dataset_count, 2);
        assert_eq!(report.main_records, None);

        let report =
            check_log_parity(&repo, "main", "exe", "calibrate_log").expect("log parity should run");
        assert_eq!(report.failure_classes, vec![FAILURE_CLASS_LOG_DATASET_COUNT]);
        assert_eq!(report.log_dataset_count, 0);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn log_parity_reports_unreachable_execution_log() {
        let root = temp_root("log-missing");
        let repo = log_repo(
            &root,
            vec![log_dataset("m1", "main/run", 1, 3)],
            vec![log_dataset("e1", "exe/run", 7, 3)],
        );
        let report = check_log_parity(&repo, "main", "exe", DEFAULT_LOG_DATASET_TYPE)
            .expect("log parity should run");
        assert_eq!(report.failure_classes, vec![FAILURE_CLASS_LOG_MISSING]);
        assert_eq!(report.exe_records, None);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn empty_chain_and_unknown_chain_are_errors() {
        let root = temp_root("chains");
        let repo = repo(&root, Vec::new(), Vec::new());
        assert!(matches!(
            check_run_parity(&repo, "hollow", "exe", None),
            Err(ParityError::EmptyChain(name)) if name == "hollow"
        ));
        assert!(matches!(
            check_run_parity(&repo, "main", "ghost", None),
            Err(ParityError::Registry(_))
        ));
        let _ = std::fs::remove_dir_all(root);
    }
}
