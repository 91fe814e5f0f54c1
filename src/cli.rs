//! Command-line interface for `tup`.
//!
//! `clean` is preview-by-default: without `--apply` it reports what would
//! change and writes nothing. Global flags land in [`AppContext`], which is
//! threaded explicitly through every handler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::core::policy::CleanOptions;
use crate::infra::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "tup",
    version,
    about = "Detect and remove debugging artifacts from source files",
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Never write files, regardless of subcommand flags
    #[arg(long, global = true)]
    pub dry_run: bool,
}

/// Global flags every handler receives. No hidden global state.
#[derive(Debug, Clone, Copy)]
pub struct AppContext {
    pub quiet: bool,
    pub no_color: bool,
    pub dry_run: bool,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Locate artifacts without planning any changes
    Scan(ScanArgs),

    /// Remove artifacts (preview unless --apply is given)
    Clean(CleanArgs),

    /// Show unified diffs of what clean would change
    Preview(PreviewArgs),

    /// Inspect and manage the backup store
    Backup(BackupArgs),

    /// Restore files from backups
    Rollback(RollbackArgs),

    /// Write a default tidyup.toml
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Artifact categories addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Logging,
    Breakpoints,
    Dialogs,
    Conditionals,
    Comments,
    Imports,
    Functions,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Files or directories to scan
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Additional ignore globs
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Restrict to these file extensions (without dots)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Files or directories to clean
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Actually write changes (otherwise preview only)
    #[arg(long)]
    pub apply: bool,

    /// Skip the pre-write backup (not recommended)
    #[arg(long)]
    pub no_backup: bool,

    /// Minimum dev-import confidence (0.0-1.0)
    #[arg(long, value_name = "F")]
    pub min_confidence: Option<f32>,

    /// Convert marker-bearing artifacts to comments instead of deleting
    #[arg(long)]
    pub convert_comments: bool,

    /// Remove dev imports even when their symbols are still used
    #[arg(long)]
    pub remove_used_imports: bool,

    /// Do not special-case error logging inside catch blocks
    #[arg(long)]
    pub no_preserve_error_handling: bool,

    /// Leave these artifact categories untouched
    #[arg(long = "skip", value_name = "CATEGORY")]
    pub skip: Vec<CategoryArg>,

    /// Additional ignore globs
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Restrict to these file extensions (without dots)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Backup store root (default .tidyup/backups)
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Backup records and sessions to retain
    #[arg(long, value_name = "K")]
    pub retention: Option<usize>,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

impl CleanArgs {
    /// Config file options with this invocation's flags applied on top.
    pub fn merged_options(&self, config: &Config) -> CleanOptions {
        let mut options = config.clean.clone();

        if self.no_backup {
            options.create_backup = false;
        }
        if let Some(min) = self.min_confidence {
            options.min_confidence = min;
        }
        if self.convert_comments {
            options.convert_important_to_comments = true;
        }
        if self.remove_used_imports {
            options.remove_unused_imports_only = false;
        }
        if self.no_preserve_error_handling {
            options.preserve_error_handling = false;
        }
        for category in &self.skip {
            let toggles = &mut options.categories;
            match category {
                CategoryArg::Logging => toggles.logging = false,
                CategoryArg::Breakpoints => toggles.breakpoints = false,
                CategoryArg::Dialogs => toggles.dialogs = false,
                CategoryArg::Conditionals => toggles.dev_conditionals = false,
                CategoryArg::Comments => toggles.debug_comments = false,
                CategoryArg::Imports => toggles.dev_imports = false,
                CategoryArg::Functions => toggles.test_functions = false,
            }
        }

        options
    }
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Files or directories to preview
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Minimum dev-import confidence (0.0-1.0)
    #[arg(long, value_name = "F")]
    pub min_confidence: Option<f32>,

    /// Additional ignore globs
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Restrict to these file extensions (without dots)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupSubcommand {
    /// Snapshot files into a new session
    Create(BackupCreateArgs),

    /// List backup records, newest first
    List(BackupListArgs),

    /// Show one session manifest
    Show(BackupShowArgs),

    /// Evict records and sessions beyond the retention limit
    Cleanup(BackupCleanupArgs),
}

#[derive(Debug, Args)]
pub struct BackupCreateArgs {
    /// Files to snapshot
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BackupListArgs {
    /// Maximum records to print
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BackupShowArgs {
    /// Session id
    pub id: String,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BackupCleanupArgs {
    /// Override the configured retention for this run
    #[arg(long, value_name = "K")]
    pub retention: Option<usize>,
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    #[command(subcommand)]
    pub command: RollbackSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum RollbackSubcommand {
    /// Restore one file from its newest backup record
    File(RollbackFileArgs),

    /// Restore every file of a session
    Session(RollbackSessionArgs),

    /// Undo the most recent session
    Emergency(RollbackEmergencyArgs),
}

#[derive(Debug, Args)]
pub struct RollbackFileArgs {
    pub path: PathBuf,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RollbackSessionArgs {
    pub id: String,

    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RollbackEmergencyArgs {
    /// Emit machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Target path (default tidyup.toml)
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script into this directory instead of stdout
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn clean_flags_override_config() {
        let cli = Cli::parse_from([
            "tup",
            "clean",
            "src",
            "--no-backup",
            "--min-confidence",
            "0.9",
            "--skip",
            "logging",
            "--skip",
            "imports",
        ]);
        let Commands::Clean(args) = &cli.command else {
            panic!("expected clean");
        };

        let options = args.merged_options(&Config::default());
        assert!(!options.create_backup);
        assert_eq!(options.min_confidence, 0.9);
        assert!(!options.categories.logging);
        assert!(!options.categories.dev_imports);
        assert!(options.categories.breakpoints);
    }

    #[test]
    fn clean_is_preview_by_default() {
        let cli = Cli::parse_from(["tup", "clean", "src"]);
        let Commands::Clean(args) = &cli.command else {
            panic!("expected clean");
        };
        assert!(!args.apply);
    }
}
