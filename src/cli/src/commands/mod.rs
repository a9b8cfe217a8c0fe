//! CLI subcommands.

pub mod health;
pub mod retest;
pub mod validate;
