pub mod check_chain;
pub mod compare;
pub mod log_parity;
pub mod run_parity;
pub mod transfer_count;
pub mod validate_outputs;
