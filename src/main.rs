//! simplepub binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    simplepub::cli::run()
}
