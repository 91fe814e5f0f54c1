use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tidyup::cli::{Cli, Commands};
use tidyup::completion;
use tidyup::core::{backup, pipeline, rollback};
use tidyup::infra::config;

fn main() -> Result<()> {
    // TIDYUP_LOG selects verbosity; diagnostics go to stderr so stdout
    // stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TIDYUP_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = cli.context();
    let cfg = config::load_config()?;

    match &cli.command {
        Commands::Scan(args) => pipeline::scan_run(args, &cfg, &ctx),
        Commands::Clean(args) => pipeline::clean_run(args, &cfg, &ctx),
        Commands::Preview(args) => pipeline::preview_run(args, &cfg, &ctx),
        Commands::Backup(args) => backup::backup_run(args, cfg.backup.clone(), &ctx),
        Commands::Rollback(args) => {
            rollback::rollback_run(args, cfg.backup.clone(), cfg.rollback.clone(), &ctx)
        }
        Commands::Init(args) => config::init_run(args, &ctx),
        Commands::Completions(args) => completion::run(args),
    }
}
