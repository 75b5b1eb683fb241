use crate::support::{
    PAYLOAD_SCHEMA, collections_arg, exit_for, open_repository_or_exit, parse_selector_or_exit,
    print_json_or_exit, status_label,
};
use pipecheck_kernel::{ReferenceReport, ReferenceTable, validate_outputs};
use serde_json::json;

fn print_report(report: &ReferenceReport) {
    println!(
        "[validate-outputs] {} (checked={}, failed={})",
        status_label(report.accepted()),
        report.checked,
        report.failures.len()
    );
    for finding in &report.failures {
        println!("  - {} ({})", finding.class, finding.message);
    }
}

pub fn run(
    repo: String,
    collection: String,
    data_id: String,
    reference: String,
    json_output: bool,
) {
    let repository = open_repository_or_exit(&repo);
    let selector = parse_selector_or_exit(&data_id);
    let table = ReferenceTable::from_toml_path(&reference).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    let collections = collections_arg(&collection);
    let report =
        validate_outputs(&repository, &collections, &selector, &table).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        });

    if json_output {
        let payload = json!({
            "schema": PAYLOAD_SCHEMA,
            "checkKind": report.check_kind,
            "reference": reference,
            "result": report.result,
            "failureClasses": report.failure_classes,
            "report": report,
        });
        print_json_or_exit(&payload, "validate-outputs");
    } else {
        print_report(&report);
    }
    exit_for(report.accepted());
}
