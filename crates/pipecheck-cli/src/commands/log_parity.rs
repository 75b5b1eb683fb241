use crate::support::{
    PAYLOAD_SCHEMA, exit_for, open_repository_or_exit, print_json_or_exit, status_label,
};
use pipecheck_kernel::{LogParityReport, check_log_parity};
use serde_json::json;

fn records(count: Option<usize>) -> String {
    count.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn print_report(report: &LogParityReport) {
    println!(
        "[log-parity] {} ({} {{{}}}: main={} exe={})",
        status_label(report.accepted()),
        report.dataset_type,
        report.data_id.as_deref().unwrap_or("-"),
        records(report.main_records),
        records(report.exe_records)
    );
    for finding in &report.errors {
        println!("  - {} ({})", finding.class, finding.message);
    }
}

pub fn run(repo: String, main: String, exe: String, dataset_type: String, json_output: bool) {
    let repository = open_repository_or_exit(&repo);
    let report = check_log_parity(&repository, &main, &exe, &dataset_type).unwrap_or_else(|e| {
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
        print_json_or_exit(&payload, "log-parity");
    } else {
        print_report(&report);
    }
    exit_for(report.accepted());
}
