use crate::support::{
    PAYLOAD_SCHEMA, exit_for, open_repository_or_exit, print_json_or_exit, status_label,
};
use pipecheck_kernel::{ParityReport, check_run_parity};
use serde_json::json;

fn print_report(report: &ParityReport) {
    println!(
        "[run-parity] {} (main={} [{}], exe={} [{}])",
        status_label(report.accepted()),
        report.main_run,
        report.main_count,
        report.exe_run,
        report.exe_count
    );
    for finding in &report.errors {
        println!("  - {} ({})", finding.class, finding.message);
    }
    for missing in &report.missing_sample {
        println!("    missing: {missing}");
    }
    if report.missing_count > report.missing_sample.len() {
        println!(
            "    ... and {} more",
            report.missing_count - report.missing_sample.len()
        );
    }
}

pub fn run(
    repo: String,
    main: String,
    exe: String,
    dataset_type: Option<String>,
    json_output: bool,
) {
    let repository = open_repository_or_exit(&repo);
    let report = check_run_parity(&repository, &main, &exe, dataset_type.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        });

    if json_output {
        let payload = json!({
            "schema": PAYLOAD_SCHEMA,
            "checkKind": report.check_kind,
            "repo": repo,
            "result": report.result,
            "failureClasses": report.failure_classes,
            "report": report,
        });
        print_json_or_exit(&payload, "run-parity");
    } else {
        print_report(&report);
    }
    exit_for(report.accepted());
}
