pub mod batch;
pub mod commands;
pub mod core_cli;

pub use commands::execute;
pub use core_cli::Cli;
