use crate::support::{
    PAYLOAD_SCHEMA, collections_arg, exit_for, open_repository_or_exit, parse_selector_or_exit,
    print_json_or_exit, status_label,
};
use pipecheck_kernel::{ComparatorConfig, ComparisonReport, EvaluationMode, evaluate};
use pipecheck_registry::{Catalog, CatalogSource, DataIdSelector, FileRepository};
use serde_json::json;

pub struct Args {
    pub repo: String,
    pub collection: String,
    pub data_id: String,
    pub source_type: String,
    pub comparison_type: String,
    pub config: Option<String>,
    pub max_fractional_diff: Option<f64>,
    pub max_outlier_fraction: Option<f64>,
    pub max_missing_sources_fraction: Option<f64>,
    pub max_search_radius_pixels: Option<f64>,
    pub no_raise: bool,
    pub json: bool,
}

/// File values first, then flag overrides, then validation.
fn resolve_config_or_exit(args: &Args) -> ComparatorConfig {
    let mut config = match &args.config {
        Some(path) => ComparatorConfig::from_toml_path(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        }),
        None => ComparatorConfig::default(),
    };
    if let Some(value) = args.max_fractional_diff {
        config.max_fractional_diff = value;
    }
    if let Some(value) = args.max_outlier_fraction {
        config.max_outlier_fraction = value;
    }
    if let Some(value) = args.max_missing_sources_fraction {
        config.max_missing_sources_fraction = value;
    }
    if let Some(value) = args.max_search_radius_pixels {
        config.max_search_radius_pixels = value;
    }
    if args.no_raise {
        config.do_raise = false;
    }
    config.validated().unwrap_or_else(|e| {
        eprintln!("error: invalid comparator config: {e}");
        std::process::exit(1);
    })
}

fn load_catalog_or_exit(
    repository: &FileRepository,
    dataset_type: &str,
    selector: &DataIdSelector,
    collections: &[String],
) -> Catalog {
    repository
        .get_catalog(dataset_type, selector, collections)
        .unwrap_or_else(|e| {
            eprintln!("error: failed to load {dataset_type}: {e}");
            std::process::exit(1);
        })
}

fn print_report(report: &ComparisonReport) {
    println!(
        "[compare] {} (mode={}, matched={}/{}, unmatchedFraction={:.4}, columns={})",
        status_label(report.accepted()),
        report.mode,
        report.matched,
        report.comparison_rows,
        report.unmatched_fraction,
        report.columns.len()
    );
    for violation in &report.violations {
        println!("  - {} ({})", violation.class, violation.message);
    }
}

pub fn run(args: Args) {
    let config = resolve_config_or_exit(&args);
    let repository = open_repository_or_exit(&args.repo);
    let selector = parse_selector_or_exit(&args.data_id);
    let collections = collections_arg(&args.collection);

    let source = load_catalog_or_exit(&repository, &args.source_type, &selector, &collections);
    let comparison =
        load_catalog_or_exit(&repository, &args.comparison_type, &selector, &collections);

    let mode = config.mode();
    let report = evaluate(&source, &comparison, &config, mode).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    if mode == EvaluationMode::Strict
        && let Some(first) = report.violations.first()
    {
        eprintln!("error: {}", first.to_error());
    }

    if args.json {
        let payload = json!({
            "schema": PAYLOAD_SCHEMA,
            "checkKind": report.check_kind,
            "sourceType": args.source_type,
            "comparisonType": args.comparison_type,
            "dataId": selector.to_string(),
            "result": report.result,
            "failureClasses": report.failure_classes,
            "config": config,
            "report": report,
        });
        print_json_or_exit(&payload, "compare");
    } else {
        print_report(&report);
    }
    exit_for(report.accepted());
}
