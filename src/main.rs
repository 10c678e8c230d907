use btstats::commands::{handle_analyze, AnalyzeArgs};
use btstats::log_error;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = AnalyzeArgs::parse();

    match handle_analyze(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
