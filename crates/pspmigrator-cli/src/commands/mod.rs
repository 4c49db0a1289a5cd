//! CLI commands

pub mod mutating;
