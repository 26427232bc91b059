use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use treegrid::config::{AppConfig, SearchConfig, SourceConfig};
use treegrid::demo::{self, DemoRow, StaticSource};
use treegrid::{handle_action, Action, ChildFetcher, NodeKey, TreeGrid, VisibleRow};

/// Load a JSON tree dataset into a grid, apply actions, and print the rows.
#[derive(Parser, Debug)]
#[command(name = "treegrid", version, about)]
struct Cli {
    /// Dataset file: a JSON array of `{ key, name, title, children? }`
    data: PathBuf,

    /// Explicit config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search for this text
    #[arg(long)]
    search: Option<String>,

    /// Advance the search selection this many times
    #[arg(long, default_value_t = 0)]
    next: usize,

    /// Expand every node, loading children as needed
    #[arg(long)]
    expand_all: bool,

    /// Collapse every node at the end
    #[arg(long)]
    collapse_all: bool,

    /// Use fuzzy matching instead of substring
    #[arg(long)]
    fuzzy: bool,

    /// Simulated latency for every child fetch
    #[arg(long)]
    fetch_delay_ms: Option<u64>,

    /// Keys whose child fetch never resolves. Numeric text is an integer
    /// key; prefix with `str:` for a numeric string key
    #[arg(long)]
    stall: Vec<String>,

    /// Upper bound on waiting for fetches after each action
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Debug-level logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            search: SearchConfig {
                match_mode: self.fuzzy.then(|| "fuzzy".to_string()),
                ..Default::default()
            },
            source: SourceConfig {
                fetch_delay_ms: self.fetch_delay_ms,
            },
            ..Default::default()
        }
    }

    fn actions(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.expand_all {
            actions.push(Action::ExpandAll);
        }
        if let Some(query) = &self.search {
            actions.push(Action::SetSearchText(query.clone()));
        }
        actions.extend(std::iter::repeat(Action::NextResult).take(self.next));
        if self.collapse_all {
            actions.push(Action::CollapseAll);
        }
        actions
    }
}

/// Integers become integer keys; `str:` forces a string key (`str:7`).
fn stall_key(raw: &str) -> NodeKey {
    if let Some(s) = raw.strip_prefix("str:") {
        return NodeKey::from(s);
    }
    raw.parse::<i64>()
        .map(NodeKey::from)
        .unwrap_or_else(|_| NodeKey::from(raw))
}

fn print_rows(grid: &TreeGrid<DemoRow>, rows: &[VisibleRow]) {
    for row in rows {
        let Ok(node) = grid.model().get(&row.key) else {
            continue;
        };
        let marker = match (row.expandable, row.expanded) {
            (false, _) => ' ',
            (true, true) => '▾',
            (true, false) => '▸',
        };
        let cursor = if row.is_selected_match {
            '>'
        } else if row.is_match {
            '*'
        } else {
            ' '
        };
        let (name, title) = node
            .row()
            .map(|r| (r.name.as_str(), r.title.as_str()))
            .unwrap_or_default();
        let indent = "  ".repeat(row.depth.saturating_sub(1));
        println!("{cursor} {indent}{marker} {name}  {title}");
        if row.loading {
            println!("  {indent}  Loading...");
        }
    }
}

async fn run(cli: Cli) -> treegrid::Result<()> {
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    let records = demo::load_dataset(&cli.data)?;
    let (rows, source) = StaticSource::from_records(&records, config.match_mode());
    let source = source
        .with_delay(config.fetch_delay())
        .with_stalled(cli.stall.iter().map(|s| stall_key(s)));
    let fetcher: Arc<dyn ChildFetcher<DemoRow>> = Arc::new(source);

    let mut grid = TreeGrid::new(rows, Some(fetcher), config.grid_settings())?;
    let limit = Duration::from_millis(cli.timeout_ms);

    if !grid.run_until_idle(limit).await? {
        warn!("initial load did not settle within {:?}", limit);
    }
    for action in cli.actions() {
        handle_action(&mut grid, action.clone())?;
        if !grid.run_until_idle(limit).await? {
            warn!(?action, "did not settle within {:?}", limit);
        }
    }
    grid.take_scroll_targets();

    let rows = grid.visible_rows()?;
    print_rows(&grid, &rows);
    if let Some(label) = grid.search().result_label() {
        println!("\n{label}");
    } else if !grid.search().query().is_empty() {
        println!("\n0 results");
    }
    info!(
        nodes = grid.model().len(),
        generation = grid.model().generation(),
        "done"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
