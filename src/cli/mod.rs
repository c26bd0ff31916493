//! CLI module for the Pulse Analytics API

pub mod serve;

use clap::{Parser, Subcommand};

/// Pulse Analytics API - credential administration service
#[derive(Parser)]
#[command(name = "pulse-analytics-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,
}
