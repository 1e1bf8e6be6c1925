use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    webnovel_dl::logging::init().context("init logging")?;

    let cli = webnovel_dl::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        webnovel_dl::cli::Command::Download(args) => {
            webnovel_dl::download::run(args).context("download")?;
        }
        webnovel_dl::cli::Command::Info(args) => {
            webnovel_dl::download::info(args).context("info")?;
        }
    }

    Ok(())
}
