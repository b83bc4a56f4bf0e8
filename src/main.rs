use clap::Parser;
use portopt::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
