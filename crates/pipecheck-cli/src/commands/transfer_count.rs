use pipecheck_kernel::{TransferSource, check_transfer_count};

pub fn run(expected: u64, aggregate_graph: bool) {
    let source = if aggregate_graph {
        TransferSource::AggregateGraph
    } else {
        TransferSource::TransferFromGraph
    };
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    match check_transfer_count(stdin.lock(), &mut stdout, expected, source) {
        Ok(lines) => log::debug!("{lines} transfer summary line(s) matched {expected}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
