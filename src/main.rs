#![forbid(unsafe_code)]

//! certpull CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    std::process::exit(cli_app::run(&args));
}
