//! Core pipeline: detection, decision, rewriting, and write safety.

pub mod backup;
pub mod classify;
pub mod pipeline;
pub mod policy;
pub mod rewrite;
pub mod rollback;
pub mod scan;
