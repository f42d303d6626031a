use clap::Parser;
use color_eyre::eyre;
use helm_mapify::logging::setup_logging;
use helm_mapify_cli::{Cli, run};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    setup_logging(
        cli.global.log_level,
        Some(cli.global.log_format),
        cli.global.color.into(),
    )?;
    run(cli)?;
    Ok(())
}
