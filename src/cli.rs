// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A local desktop automation agent driven by a multimodal model.
#[derive(Parser, Debug)]
#[command(name = "glimt", version, about)]
pub struct Cli {
    /// Path to an explicit config file (highest priority layer).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one goal against the desktop and stream events to stdout.
    Run {
        /// The goal, in natural language.
        goal: String,
        /// Override `loop.max_iterations` for this run.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Override the model name from config.
        #[arg(long)]
        model: Option<String>,
        /// Print events as JSON envelopes instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },

    /// Skill management.
    Skills {
        #[command(subcommand)]
        command: SkillCommands,
    },

    /// Session store management.
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Print the merged configuration and exit.
    ShowConfig,
}

#[derive(Subcommand, Debug)]
pub enum SkillCommands {
    /// List the skills discovered in the skills directory.
    List,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Print statistics for the active session.
    Stats,
    /// Fork a fresh session; the old one remains until retention expires.
    Reset,
    /// Export the most recent session as Markdown to stdout.
    Export,
}
