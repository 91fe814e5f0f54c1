//! tidyup: detect and remove debugging artifacts from source files.
//!
//! The pipeline scans files for leftover debugging constructs (logging
//! calls, breakpoints, dialogs, dev-only conditionals, debug comments,
//! dev imports, test helpers), classifies each finding by surrounding
//! context and importance, decides per finding to preserve / comment /
//! remove, and rewrites files with index-stable descending edits. Every
//! write is preceded by a checksummed backup; a rollback coordinator can
//! restore any file, session, or the most recent batch.
//!
//! Module map:
//! - [`core::scan`] — artifact location and analysis
//! - [`core::classify`] — context classification
//! - [`core::policy`] — config + finding -> action
//! - [`core::rewrite`] — plan application and compaction
//! - [`core::backup`] — checksummed backup store with retention
//! - [`core::rollback`] — failure triggers and restoration
//! - [`core::pipeline`] — batch orchestration
//! - [`infra`] — config, IO, walking
//! - [`report`] — text/JSON/diff rendering

pub mod cli;
pub mod completion;
pub mod core;
pub mod infra;
pub mod report;
