//! Infrastructure: configuration, file IO, and directory walking.

pub mod config;
pub mod io;
pub mod walk;
