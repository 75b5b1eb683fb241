use pipecheck_kernel::chain::{
    FAILURE_CLASS_RUN_MEMBERSHIP, FAILURE_CLASS_UNFLATTENED_ALIAS, verify_chain,
};
use pipecheck_registry::{
    CollectionRecord, FileRepository, MANIFEST_SCHEMA, RegistryError, RepositoryManifest,
};

const CHAIN: &str = "demo_collection";

fn repository(chain_children: Option<&[&str]>) -> FileRepository {
    let mut collections = vec![
        CollectionRecord::run("run_A"),
        CollectionRecord::run("run_B"),
        CollectionRecord::run("HSC/calib"),
        CollectionRecord::run("HSC/raw/all"),
        CollectionRecord::run("refcats"),
        CollectionRecord::chain("HSC/defaults", ["HSC/calib", "HSC/raw/all", "refcats"]),
    ];
    if let Some(children) = chain_children {
        collections.push(CollectionRecord::chain(CHAIN, children.iter().copied()));
    }
    FileRepository::from_manifest(
        "/nonexistent",
        RepositoryManifest {
            schema: MANIFEST_SCHEMA,
            collections,
            datasets: Vec::new(),
        },
    )
    .expect("repository should build")
}

#[test]
fn absent_chain_passes_when_not_expected() {
    let report = verify_chain(&repository(None), CHAIN, "run_A", false).expect("verify");
    assert!(report.accepted());
    assert!(!report.chain_exists);
    assert_eq!(report.children, None);
}

#[test]
fn absent_chain_fails_when_expected() {
    let report = verify_chain(&repository(None), CHAIN, "run_A", true).expect("verify");
    assert_eq!(report.failure_classes, vec!["chain.missing"]);
    assert!(report.errors[0].message.contains("did not exist"));
}

#[test]
fn flattened_chain_with_run_passes() {
    let repo = repository(Some(&["run_A", "HSC/calib", "HSC/raw/all", "refcats"]));
    let report = verify_chain(&repo, CHAIN, "run_A", true).expect("verify");
    insta::assert_json_snapshot!(report, @r#"
    {
      "checkKind": "pipecheck.chain.check.v1",
      "chain": "demo_collection",
      "outputRun": "run_A",
      "expectPresent": true,
      "chainExists": true,
      "children": [
        "run_A",
        "HSC/calib",
        "HSC/raw/all",
        "refcats"
      ],
      "result": "accepted",
      "failureClasses": [],
      "errors": []
    }
    "#);
}

#[test]
fn unflattened_alias_fails() {
    let repo = repository(Some(&["run_A", "HSC/defaults"]));
    let report = verify_chain(&repo, CHAIN, "run_A", true).expect("verify");
    assert!(!report.accepted());
    assert!(
        report
            .failure_classes
            .contains(&FAILURE_CLASS_UNFLATTENED_ALIAS.to_string())
    );
    let alias = report
        .errors
        .iter()
        .find(|f| f.class == FAILURE_CLASS_UNFLATTENED_ALIAS)
        .expect("alias finding");
    assert!(alias.message.contains("due to flattening"));
    assert!(alias.witness_id.starts_with("w1_"));
}

#[test]
fn missing_run_fails_with_clear_diagnostic() {
    let repo = repository(Some(&["run_B", "HSC/calib", "HSC/raw/all", "refcats"]));
    let report = verify_chain(&repo, CHAIN, "run_A", true).expect("verify");
    assert_eq!(report.failure_classes, vec![FAILURE_CLASS_RUN_MEMBERSHIP]);
    assert_eq!(
        report.errors[0].message,
        "output run (run_A) is not in output chain \
         (demo_collection=[\"run_B\", \"HSC/calib\", \"HSC/raw/all\", \"refcats\"])"
    );
}

#[test]
fn run_collection_named_as_chain_is_an_error() {
    let result = verify_chain(&repository(None), "run_A", "run_A", true);
    assert!(matches!(result, Err(RegistryError::NotAChain { .. })));
}

#[test]
fn repeated_verification_yields_identical_witnesses() {
    let repo = repository(Some(&["HSC/defaults"]));
    let first = verify_chain(&repo, CHAIN, "run_A", true).expect("verify");
    let second = verify_chain(&repo, CHAIN, "run_A", true).expect("verify");
    assert_eq!(first, second);
}
