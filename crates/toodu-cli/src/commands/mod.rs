//! CLI subcommands

pub mod local;
pub mod predict;
pub mod status;
