//! Support code for the `seedsweep` binary: exit codes, structured errors
//! and output rendering.

pub mod error;
pub mod exit;
pub mod output;

pub use error::{CliError, errors};
pub use exit::ExitCode;
pub use output::{Output, OutputFormat, Outputtable, ReplayOutput};
