mod cli;
mod progress;

pub mod copy;
pub mod debounce;
pub mod enhance;
pub mod fetcher;
pub mod index;
pub mod nav;
pub mod page;
pub mod post;
pub mod render;
pub mod search;
pub mod theme;

use std::io::Write;
use std::time::Duration;

use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

use copy::{BufferClipboard, CodeBlocks, Osc52Clipboard};
use enhance::{EnhanceOptions, enhance_page};
use fetcher::Fetcher;
use index::{IndexClient, IndexSource, IndexState};
use page::SearchBox;
use post::SearchIndex;
use search::SearchOutcome;
use theme::ThemeStore;

pub use cli::{
    Args as CliArgs, Command, CopyArgs, EnhanceArgs, IndexArgs, OutputFormat, ProgressMode, SearchArgs,
    ThemeAction, ThemeArgs, WatchArgs,
};

pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_with_io(args, stdin, &mut stdout).await
}

/// Runs a command against the given input and output streams.
pub async fn run_with_io<R, W>(args: CliArgs, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    use std::io::IsTerminal as _;

    let progress_enabled = match args.progress {
        ProgressMode::Always => true,
        ProgressMode::Never => false,
        ProgressMode::Auto => std::io::stderr().is_terminal(),
    };

    match &args.command {
        Command::Search(cmd) => {
            let progress = progress::Progress::new(progress_enabled);
            progress.set_stage("loading search index");
            let index = load_index(&cmd.source, &args.user_agent).await?;
            progress.finish();
            search_once(&index, cmd, out)
        }
        Command::Watch(cmd) => {
            let progress = progress::Progress::new(progress_enabled);
            progress.set_stage("loading search index");
            let client = index_client(&cmd.source, &args.user_agent)?;
            let search = SearchBox::new(Duration::from_millis(cmd.debounce_ms));
            let state = search
                .load(&client, Duration::from_secs(cmd.source.retry_delay_secs))
                .await;
            progress.finish();
            if matches!(state, IndexState::Unavailable) {
                tracing::warn!("watching without a search index");
            }
            run_watch(&search, input, out).await
        }
        Command::Enhance(cmd) => run_enhance(cmd, out),
        Command::Theme(cmd) => run_theme(cmd, out),
        Command::Copy(cmd) => run_copy(cmd, out),
    }
}

fn index_client(source: &IndexArgs, user_agent: &str) -> anyhow::Result<IndexClient> {
    let fetcher = Fetcher::new(user_agent)?;
    let source = match (&source.base_url, &source.index) {
        (_, Some(path)) => IndexSource::Local(path.clone()),
        (Some(base_url), None) => IndexSource::from_base_url(base_url)
            .with_context(|| format!("resolve search index under {base_url}"))?,
        (None, None) => anyhow::bail!("pass --base-url or --index"),
    };
    Ok(IndexClient::new(source, fetcher))
}

async fn load_index(source: &IndexArgs, user_agent: &str) -> anyhow::Result<SearchIndex> {
    let client = index_client(source, user_agent)?;
    let delay = Duration::from_secs(source.retry_delay_secs);
    let index = client
        .load_with_retry(delay, |_| {
            tracing::warn!("{}", render::UNAVAILABLE_MESSAGE);
        })
        .await
        .context("load search index")?;
    Ok(index)
}

fn search_once<W: Write>(index: &SearchIndex, cmd: &SearchArgs, out: &mut W) -> anyhow::Result<()> {
    let query = cmd.query.join(" ");
    let page = match search::search(index, &query) {
        SearchOutcome::Hidden => {
            tracing::info!("blank query; nothing to show");
            return Ok(());
        }
        SearchOutcome::Matches(page) => page,
    };
    tracing::info!(
        matches = page.total(),
        shown = page.shown.len(),
        "search complete"
    );

    let rendered = match cmd.format {
        OutputFormat::Text => render::render_results_text(&page),
        OutputFormat::Html => {
            let mut html = render::render_results(&page);
            html.push('\n');
            html
        }
    };
    out.write_all(rendered.as_bytes()).context("write results")?;
    Ok(())
}

/// Each stdin line is the full search box contents after a keystroke.
/// Prints the region after every completed pass: its HTML when visible, an
/// empty line when hidden.
async fn run_watch<R, W>(search: &SearchBox, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut rx = search.subscribe();
    let mut pending = false;
    let mut eof = false;

    loop {
        if eof && !pending {
            return Ok(());
        }
        tokio::select! {
            line = lines.next_line(), if !eof => {
                match line.context("read stdin")? {
                    Some(query) => {
                        search.input(&query);
                        pending = true;
                    }
                    None => eof = true,
                }
            }
            changed = rx.changed() => {
                changed.context("results channel closed")?;
                let region = rx.borrow_and_update().clone();
                pending = false;
                if region.visible {
                    writeln!(out, "{}", region.html).context("write results")?;
                } else {
                    writeln!(out).context("write results")?;
                }
                out.flush().context("flush results")?;
            }
        }
    }
}

fn run_enhance<W: Write>(cmd: &EnhanceArgs, out: &mut W) -> anyhow::Result<()> {
    let page = std::fs::read_to_string(&cmd.input)
        .with_context(|| format!("read {}", cmd.input.display()))?;

    let theme = cmd
        .prefs
        .as_deref()
        .map(|path| ThemeStore::open(path, cmd.prefers_dark).current());
    let opts = EnhanceOptions {
        base_url: &cmd.base_url,
        theme,
    };
    let (html, _report) = enhance_page(&page, &opts)
        .with_context(|| format!("enhance {}", cmd.input.display()))?;

    match &cmd.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
            }
            std::fs::write(path, html).with_context(|| format!("write {}", path.display()))?;
        }
        None => out.write_all(html.as_bytes()).context("write page")?,
    }
    Ok(())
}

/// Copies through the terminal clipboard; when that is unavailable the code
/// is written to `out` instead.
fn run_copy<W: Write>(cmd: &CopyArgs, out: &mut W) -> anyhow::Result<()> {
    let page = std::fs::read_to_string(&cmd.input)
        .with_context(|| format!("read {}", cmd.input.display()))?;

    let fallback = Arc::new(BufferClipboard::default());
    let blocks = CodeBlocks::attach(
        enhance::code_blocks(&page),
        Arc::new(Osc52Clipboard),
        fallback.clone(),
    );
    let index = cmd
        .block
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
        .context("code blocks are numbered from 1")?;
    let state = blocks.click(index).with_context(|| {
        format!(
            "{} has {} code block(s), no block {}",
            cmd.input.display(),
            blocks.len(),
            cmd.block
        )
    })?;
    tracing::info!(block = cmd.block, label = state.label, "copy button clicked");

    if let Some(code) = fallback.take() {
        out.write_all(code.as_bytes()).context("write code")?;
        if !code.ends_with('\n') {
            writeln!(out).context("write code")?;
        }
    }
    Ok(())
}

fn run_theme<W: Write>(cmd: &ThemeArgs, out: &mut W) -> anyhow::Result<()> {
    let mut store = ThemeStore::open(&cmd.prefs, cmd.prefers_dark);
    let theme = match cmd.action.unwrap_or(ThemeAction::Show) {
        ThemeAction::Show => store.current(),
        ThemeAction::Toggle => {
            let next = store.current().toggled();
            store
                .set(next)
                .with_context(|| format!("save theme to {}", cmd.prefs.display()))?;
            next
        }
        ThemeAction::Set { theme } => {
            store
                .set(theme)
                .with_context(|| format!("save theme to {}", cmd.prefs.display()))?;
            theme
        }
    };
    writeln!(out, "{}", theme.as_str()).context("write theme")?;
    Ok(())
}
