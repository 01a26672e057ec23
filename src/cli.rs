use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

use crate::theme::Theme;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressMode {
    /// Enable progress UI when stderr is a TTY.
    Auto,
    /// Always enable progress UI (even when piped).
    Always,
    /// Never show progress UI.
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// One line per result: title, url, indented summary.
    Text,
    /// The `#search-results` fragment.
    Html,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// HTTP User-Agent used for downloading the search index.
    #[arg(long, global = true, default_value = "blog-search/0.1")]
    pub user_agent: String,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub progress: ProgressMode,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one query against the search index.
    Search(SearchArgs),
    /// Read successive search box contents from stdin and print each completed pass.
    Watch(WatchArgs),
    /// Add copy buttons, external-link annotations and a scroll-to-top control to a page.
    Enhance(EnhanceArgs),
    /// Show or change the persisted theme preference.
    Theme(ThemeArgs),
    /// Copy the text of one code block from a page.
    Copy(CopyArgs),
}

#[derive(Debug, clap::Args)]
pub struct IndexArgs {
    /// Site base URL; the index is fetched from `<base>/search_index.json`.
    #[arg(long, conflicts_with = "index", required_unless_present = "index")]
    pub base_url: Option<Url>,

    /// Local `search_index.json` instead of fetching one.
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Wait before the single retry of a failed index load.
    #[arg(long, default_value_t = 10)]
    pub retry_delay_secs: u64,
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub source: IndexArgs,

    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Query terms; joined with spaces.
    #[arg(required = true)]
    pub query: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: IndexArgs,

    /// Quiet period before a filter pass runs.
    #[arg(long, default_value_t = 300)]
    pub debounce_ms: u64,
}

#[derive(Debug, clap::Args)]
pub struct EnhanceArgs {
    /// Server-rendered HTML page.
    #[arg(long)]
    pub input: PathBuf,

    /// Site base URL; links to other hosts are marked external.
    #[arg(long)]
    pub base_url: Url,

    /// Output file. Defaults to stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Preferences file; when given, the saved theme is applied to `<html>`.
    #[arg(long)]
    pub prefs: Option<PathBuf>,

    /// System colour scheme preference used when nothing is saved.
    #[arg(long)]
    pub prefers_dark: bool,
}

#[derive(Debug, clap::Args)]
pub struct CopyArgs {
    /// Server-rendered HTML page.
    #[arg(long)]
    pub input: PathBuf,

    /// Code block to copy, counting from 1.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub block: u64,
}

#[derive(Debug, clap::Args)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub action: Option<ThemeAction>,

    /// Preferences file holding the `theme` key.
    #[arg(long, default_value = ".blog-search.json")]
    pub prefs: PathBuf,

    /// System colour scheme preference used when nothing is saved.
    #[arg(long)]
    pub prefers_dark: bool,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ThemeAction {
    /// Print the effective theme (default).
    Show,
    /// Switch between dark and light and save the result.
    Toggle,
    /// Save an explicit theme.
    Set {
        #[arg(value_enum)]
        theme: Theme,
    },
}
