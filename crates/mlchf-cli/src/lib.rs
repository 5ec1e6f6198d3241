//! mlchf CLI library.
//!
//! This crate provides the output formatting shared by the `mlchf` binary's
//! subcommands.

pub mod output;
