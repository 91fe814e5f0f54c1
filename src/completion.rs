//! Shell completion generation for the `tup` binary.

use std::io;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, generate_to};

use crate::cli::{Cli, CompletionsArgs};

pub fn run(args: &CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();

    match &args.out_dir {
        Some(dir) => {
            let path = generate_to(args.shell, &mut cmd, "tup", dir)
                .with_context(|| format!("writing completions to {}", dir.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => {
            generate(args.shell, &mut cmd, "tup", &mut io::stdout());
        }
    }
    Ok(())
}
