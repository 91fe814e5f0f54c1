//! Layered configuration: `tidyup.toml` (or `.tidyup.toml`) in the working
//! directory, overridden by `TIDYUP_*` environment variables, overridden by
//! CLI flags (applied by the command handlers).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::{AppContext, InitArgs};
use crate::core::backup::BackupConfig;
use crate::core::policy::CleanOptions;
use crate::core::rollback::RollbackPolicy;

const CONFIG_CANDIDATES: &[&str] = &["tidyup.toml", ".tidyup.toml"];

/// Source extensions scanned when neither config nor CLI narrow them.
pub const DEFAULT_EXTENSIONS: &[&str] =
    &["js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Extra ignore globs on top of the built-in dependency/output dirs.
    pub ignore_patterns: Vec<String>,

    /// File extensions considered for scanning (without dots).
    pub extensions: Vec<String>,

    pub clean: CleanOptions,

    pub backup: BackupConfig,

    pub rollback: RollbackPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            clean: CleanOptions::default(),
            backup: BackupConfig::default(),
            rollback: RollbackPolicy::default(),
        }
    }
}

impl Config {
    /// Built-in-plus-config ignores, then CLI extras.
    pub fn merged_ignores(&self, extra: &[String]) -> Vec<String> {
        let mut out = self.ignore_patterns.clone();
        out.extend_from_slice(extra);
        out
    }

    /// CLI extensions replace the configured set when given.
    pub fn merged_extensions(&self, cli: &[String]) -> Vec<String> {
        if cli.is_empty() {
            self.extensions.clone()
        } else {
            cli.to_vec()
        }
    }
}

/// Discover and load configuration from the working directory and the
/// `TIDYUP_*` environment. Absent sources yield the defaults.
pub fn load_config() -> Result<Config> {
    let file = CONFIG_CANDIDATES.iter().map(Path::new).find(|p| p.is_file());
    load_config_from(file)
}

/// Same as [`load_config`] but with an explicit (optional) file path.
pub fn load_config_from(file: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(config::File::from(path.to_path_buf()));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("TIDYUP")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("building configuration")?;

    settings
        .try_deserialize::<Config>()
        .context("invalid configuration")
}

/// `tup init` entry point: write a commented default `tidyup.toml`.
pub fn init_run(args: &InitArgs, ctx: &AppContext) -> Result<()> {
    let target: PathBuf = args
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_CANDIDATES[0]));

    if target.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    let body = toml::to_string_pretty(&Config::default())
        .context("serializing default configuration")?;
    fs::write(&target, body).with_context(|| format!("writing {}", target.display()))?;

    if !ctx.quiet {
        println!("wrote {}", target.display());
    }
    Ok(())
}
