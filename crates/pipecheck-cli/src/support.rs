use pipecheck_registry::{DataIdSelector, FileRepository};
use serde_json::Value;

pub const PAYLOAD_SCHEMA: u64 = 1;

pub fn open_repository_or_exit(repo: &str) -> FileRepository {
    FileRepository::open(repo).unwrap_or_else(|e| {
        eprintln!("error: failed to open repository {repo}: {e}");
        std::process::exit(1);
    })
}

pub fn parse_selector_or_exit(data_id: &str) -> DataIdSelector {
    DataIdSelector::parse(data_id).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// Split a comma-separated collection argument into search order.
pub fn collections_arg(collection: &str) -> Vec<String> {
    collection
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn print_json_or_exit(payload: &Value, label: &str) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|error| {
        eprintln!("error: failed to render {label} payload: {error}");
        std::process::exit(2);
    });
    println!("{rendered}");
}

pub fn status_label(accepted: bool) -> &'static str {
    if accepted { "OK" } else { "FAIL" }
}

pub fn exit_for(accepted: bool) {
    if !accepted {
        std::process::exit(1);
    }
}
