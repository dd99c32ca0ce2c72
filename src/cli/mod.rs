//! Command-line interface for tskdash
//!
//! This module defines the CLI structure using clap derive macros.
//! One-shot commands live in their own submodules; `watch` hands off to the
//! terminal dashboard.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::Result;
use crate::feed::FeedSettings;
use crate::output::OutputOptions;
use crate::projection::{Filter, Tab};

mod history;
mod tail;

/// tskdash - live task dashboard
///
/// Follows a job system's task feed and history listing: a terminal dashboard
/// with status tabs and search, plus one-shot and streaming commands.
#[derive(Parser, Debug)]
#[command(name = "tskdash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to ./.tskdash.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the job system (overrides feeds.base_url)
    #[arg(long, global = true, env = "TSKDASH_BASE_URL")]
    pub base_url: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Live dashboard (default)
    Watch(WatchArgs),

    /// Fetch the history listing once and print it
    History(FilterArgs),

    /// Stream store changes from the push feed as JSON lines
    Tail(TailArgs),
}

/// Tab and search shared by every view
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Tab: all, pending, processing, completed, failed, retrying, scheduled
    #[arg(long)]
    pub tab: Option<String>,

    /// Case-insensitive substring of the task name or id
    #[arg(long)]
    pub query: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Write logs to this file (the dashboard owns the terminal)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TailArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Event destination: a file path, or '-' for stdout (default)
    #[arg(long)]
    pub events: Option<String>,

    /// Stop after this many changes
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Where tracing output goes for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    Off,
}

impl FilterArgs {
    fn to_filter(&self, config: &Config) -> Result<Filter> {
        let tab = match self.tab.as_deref() {
            Some(raw) => Tab::parse(raw)?,
            None => config.ui.tab()?,
        };
        Ok(Filter::new(tab, self.query.clone().unwrap_or_default()))
    }
}

impl Cli {
    /// Log destination: the dashboard logs to `--log-file` or nowhere.
    pub fn log_target(&self) -> LogTarget {
        match &self.command {
            Some(Commands::Watch(args)) => watch_log_target(args.log_file.as_deref()),
            None => LogTarget::Off,
            Some(_) => LogTarget::Stderr,
        }
    }

    /// True when `tail` writes events to stdout, which then cannot also carry
    /// a JSON envelope.
    pub fn events_to_stdout(&self) -> bool {
        match &self.command {
            Some(Commands::Tail(args)) => args
                .events
                .as_deref()
                .map(|value| value.trim() == "-" || value.trim().is_empty())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }

    fn load_config(&self) -> Result<Config> {
        let mut config = Config::resolve(self.config.as_deref())?;
        if let Some(base_url) = self.base_url.as_ref() {
            config.feeds.base_url = base_url.trim().to_string();
            config.feeds.validate()?;
        }
        Ok(config)
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        let settings = FeedSettings::from_config(&config.feeds)?;
        let output = self.output();

        match self.command.unwrap_or(Commands::Watch(WatchArgs::default())) {
            Commands::Watch(args) => {
                let filter = args.filter.to_filter(&config)?;
                crate::ui::dashboard::run(Dashboard::new(filter), settings).await
            }
            Commands::History(args) => {
                history::run(history::HistoryOptions {
                    url: settings.history_url,
                    filter: args.to_filter(&config)?,
                    output,
                })
                .await
            }
            Commands::Tail(args) => {
                tail::run(tail::TailOptions {
                    filter: args.filter.to_filter(&config)?,
                    events: args.events,
                    limit: args.limit,
                    settings,
                    output,
                })
                .await
            }
        }
    }
}

fn watch_log_target(log_file: Option<&Path>) -> LogTarget {
    match log_file {
        Some(path) => LogTarget::File(path.to_path_buf()),
        None => LogTarget::Off,
    }
}
