//! CLI module for mergr - command-line interface.
//!
//! mergr is a one-shot batch tool, so there are no subcommands; one flat
//! argument struct describes a whole run.

pub mod args;

pub use args::Cli;
