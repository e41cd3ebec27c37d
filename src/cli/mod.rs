//! CLI module - Command-line interface for seasonrank
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::SeasonKey;

/// seasonrank - Bangumi seasonal ranking mirror
/// Keeps per-season Bangumi indices and cached subject stats up to date
#[derive(Parser)]
#[command(name = "seasonrank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as background daemon with scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Refresh subjects now, ignoring staleness
    #[command(alias = "r")]
    Refresh {
        /// Bangumi subject IDs
        #[arg(required = true)]
        ids: Vec<i32>,
    },

    /// Sync one season's index membership and refresh its stale subjects
    #[command(alias = "u")]
    UpdateSeason {
        /// Season key, e.g. 202610
        season: SeasonKey,
    },

    /// Update every mapped season, newest first
    UpdateAll {
        /// Only the upcoming and four most recent seasons
        #[arg(long)]
        recent: bool,
    },

    /// Bring a season's remote index in line with a desired member list
    #[command(group(
        ArgGroup::new("members")
            .required(true)
            .args(["ids", "titles_file"])
    ))]
    Reconcile {
        /// Season key, e.g. 202610
        season: SeasonKey,

        /// Remote index ID the season is expected to map to
        #[arg(long)]
        index: Option<i32>,

        /// Desired subject IDs, comma separated
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i32>,

        /// File with one title per line
        #[arg(long)]
        titles_file: Option<PathBuf>,
    },

    /// List season index mappings
    #[command(alias = "ls")]
    Seasons,

    /// Show whether cached subjects are due for a refresh
    Stale {
        /// Bangumi subject IDs
        #[arg(required = true)]
        ids: Vec<i32>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    InitConfig,
}

pub use commands::*;
