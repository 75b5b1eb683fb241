//! pipecheck CLI: the `pipecheck` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            repo,
            collection,
            data_id,
            source_type,
            comparison_type,
            config,
            max_fractional_diff,
            max_outlier_fraction,
            max_missing_sources_fraction,
            max_search_radius_pixels,
            no_raise,
            json,
        } => commands::compare::run(commands::compare::Args {
            repo,
            collection,
            data_id,
            source_type,
            comparison_type,
            config,
            max_fractional_diff,
            max_outlier_fraction,
            max_missing_sources_fraction,
            max_search_radius_pixels,
            no_raise,
            json,
        }),

        Commands::CheckChain {
            repo,
            output_run,
            output_chain,
            expect_present,
            json,
        } => commands::check_chain::run(repo, output_run, output_chain, expect_present == 1, json),

        Commands::TransferCount {
            expected,
            aggregate_graph,
        } => commands::transfer_count::run(expected, aggregate_graph),

        Commands::ValidateOutputs {
            repo,
            collection,
            data_id,
            reference,
            json,
        } => commands::validate_outputs::run(repo, collection, data_id, reference, json),

        Commands::RunParity {
            repo,
            main,
            exe,
            dataset_type,
            json,
        } => commands::run_parity::run(repo, main, exe, dataset_type, json),

        Commands::LogParity {
            repo,
            main,
            exe,
            dataset_type,
            json,
        } => commands::log_parity::run(repo, main, exe, dataset_type, json),
    }
}
