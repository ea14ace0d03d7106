use clap::Parser;
use cleanup::cli::{CliArgs, run_cli};
use cleanup::logging;
use cleanup::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let _guard = logging::init(args.log.as_deref(), args.silent);

    match run_cli(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Cleanup failed");
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
