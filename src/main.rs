use std::process::ExitCode;

use clap::Parser;
use rewrite_text_lib::CliArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    match rewrite_text_lib::run(cli_args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
