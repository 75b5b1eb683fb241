use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pipecheck",
    about = "pipecheck: regression checks over pipelines_check demo outputs",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match a source catalog against a comparison catalog and check shared columns
    Compare {
        /// Repository root or registry manifest path
        #[arg(long, default_value = ".")]
        repo: String,

        /// Collection (run or chain) to search for both catalogs
        #[arg(long)]
        collection: String,

        /// Data id selector, e.g. `instrument=HSC,visit=903342,detector=10`
        #[arg(long)]
        data_id: String,

        /// Dataset type of the freshly produced catalog
        #[arg(long, default_value = "src")]
        source_type: String,

        /// Dataset type of the reference catalog
        #[arg(long, default_value = "src_comparison")]
        comparison_type: String,

        /// TOML file with comparator tolerances
        #[arg(long)]
        config: Option<String>,

        /// Override `max_fractional_diff`
        #[arg(long)]
        max_fractional_diff: Option<f64>,

        /// Override `max_outlier_fraction`
        #[arg(long)]
        max_outlier_fraction: Option<f64>,

        /// Override `max_missing_sources_fraction`
        #[arg(long)]
        max_missing_sources_fraction: Option<f64>,

        /// Override `max_search_radius_pixels`
        #[arg(long)]
        max_search_radius_pixels: Option<f64>,

        /// Evaluate every column instead of stopping at the first failure
        #[arg(long)]
        no_raise: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify that an output chain was (or was not) updated by a run
    CheckChain {
        /// Repository root or registry manifest path
        repo: String,

        /// Run collection the chain should (or should not) list
        output_run: String,

        /// Output chain to inspect
        output_chain: String,

        /// 1 when the run is expected in the chain, 0 otherwise
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        expect_present: u8,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the dataset count reported by butler output read from stdin
    TransferCount {
        /// Number of datasets the transfer must report
        expected: u64,

        /// Scan for `aggregate-graph` ingest lines instead
        #[arg(long)]
        aggregate_graph: bool,
    },

    /// Check run outputs against a table of reference values
    ValidateOutputs {
        /// Repository root or registry manifest path
        #[arg(long, default_value = ".")]
        repo: String,

        /// Collection (run or chain) holding the outputs
        #[arg(long)]
        collection: String,

        /// Data id selector, e.g. `instrument=HSC,visit=903342,detector=10`
        #[arg(long)]
        data_id: String,

        /// TOML reference table
        #[arg(long)]
        reference: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a direct run and an execution-butler run hold the same datasets
    RunParity {
        /// Repository root or registry manifest path
        #[arg(long, default_value = ".")]
        repo: String,

        /// Chain of the direct run
        #[arg(long)]
        main: String,

        /// Chain of the execution-butler run
        #[arg(long)]
        exe: String,

        /// Restrict the comparison to one dataset type
        #[arg(long)]
        dataset_type: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a task log holds as many records in the execution-butler run
    LogParity {
        /// Repository root or registry manifest path
        #[arg(long, default_value = ".")]
        repo: String,

        /// Chain of the direct run
        #[arg(long)]
        main: String,

        /// Chain of the execution-butler run
        #[arg(long)]
        exe: String,

        /// Log dataset type; the main run must hold exactly one
        #[arg(long, default_value = pipecheck_kernel::DEFAULT_LOG_DATASET_TYPE)]
        dataset_type: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
