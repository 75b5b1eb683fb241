use crate::support::{
    PAYLOAD_SCHEMA, exit_for, open_repository_or_exit, print_json_or_exit, status_label,
};
use pipecheck_kernel::{ChainCheckReport, verify_chain};
use serde_json::json;

fn print_report(report: &ChainCheckReport) {
    println!(
        "[check-chain] {} (chain={}, run={}, expectPresent={}, exists={})",
        status_label(report.accepted()),
        report.chain,
        report.output_run,
        report.expect_present,
        report.chain_exists
    );
    for finding in &report.errors {
        println!("  - {} ({})", finding.class, finding.message);
    }
}

pub fn run(
    repo: String,
    output_run: String,
    output_chain: String,
    expect_present: bool,
    json_output: bool,
) {
    let repository = open_repository_or_exit(&repo);
    let report = verify_chain(&repository, &output_chain, &output_run, expect_present)
        .unwrap_or_else(|e| {
            eprintln!("error: failed to query chain {output_chain}: {e}");
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
        print_json_or_exit(&payload, "check-chain");
    } else {
        print_report(&report);
    }
    exit_for(report.accepted());
}
