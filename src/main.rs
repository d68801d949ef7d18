//! Layermint - command-line tool for building generative collections from contributor layers

use std::process::ExitCode;

use layermint::cli;

fn main() -> ExitCode {
    cli::run()
}
