//! Grid configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (later sources override earlier ones):
//! 1. Built-in defaults
//! 2. Global `~/.config/treegrid/config.toml`
//! 3. Project-local `.treegrid.toml` in the current working directory
//! 4. `$TREEGRID_CONFIG` environment variable (path to config file)
//! 5. Explicit `--config` path
//! 6. CLI flags (`--fuzzy`, `--fetch-delay-ms`, ...)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::grid::GridSettings;
use crate::search::MatchMode;

// ── Section configs ──────────────────────────────────────────────────────────

/// Grid behavior.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GridConfig {
    /// Expand the first generation of rows on creation.
    pub expand_first_generation: Option<bool>,
    /// Idle tick interval while fetches are outstanding.
    pub tick_rate_ms: Option<u64>,
}

/// Search settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Delay before a running search reports itself as searching.
    pub spinner_delay_ms: Option<u64>,
    /// "substring" or "fuzzy".
    pub match_mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExpandAllConfig {
    /// Wall-clock budget for one expand-all run.
    pub budget_ms: Option<u64>,
}

/// Demo data source settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    /// Simulated latency for every child fetch.
    pub fetch_delay_ms: Option<u64>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub search: SearchConfig,
    pub expand_all: ExpandAllConfig,
    pub source: SourceConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_TICK_RATE_MS: u64 = 50;
pub const DEFAULT_SPINNER_DELAY_MS: u64 = 1_000;
pub const DEFAULT_EXPAND_ALL_BUDGET_MS: u64 = 5_000;

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths, lowest priority first.
///
/// Does NOT include the CLI `--config` path.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("treegrid").join("config.toml"));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".treegrid.toml"));
    }

    if let Ok(env_path) = std::env::var("TREEGRID_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    paths
}

/// Read and parse a TOML config file. Returns `None` if the file doesn't
/// exist or can't be parsed.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`: `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            grid: GridConfig {
                expand_first_generation: other
                    .grid
                    .expand_first_generation
                    .or(self.grid.expand_first_generation),
                tick_rate_ms: other.grid.tick_rate_ms.or(self.grid.tick_rate_ms),
            },
            search: SearchConfig {
                spinner_delay_ms: other
                    .search
                    .spinner_delay_ms
                    .or(self.search.spinner_delay_ms),
                match_mode: other
                    .search
                    .match_mode
                    .clone()
                    .or(self.search.match_mode),
            },
            expand_all: ExpandAllConfig {
                budget_ms: other.expand_all.budget_ms.or(self.expand_all.budget_ms),
            },
            source: SourceConfig {
                fetch_delay_ms: other.source.fetch_delay_ms.or(self.source.fetch_delay_ms),
            },
        }
    }

    /// Load the final merged configuration.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        for path in candidate_paths() {
            if let Some(file_cfg) = load_file(&path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn expand_first_generation(&self) -> bool {
        self.grid.expand_first_generation.unwrap_or(true)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.grid.tick_rate_ms.unwrap_or(DEFAULT_TICK_RATE_MS))
    }

    pub fn spinner_delay(&self) -> Duration {
        Duration::from_millis(
            self.search
                .spinner_delay_ms
                .unwrap_or(DEFAULT_SPINNER_DELAY_MS),
        )
    }

    /// Unknown names fall back to substring matching.
    pub fn match_mode(&self) -> MatchMode {
        self.search
            .match_mode
            .as_deref()
            .map(MatchMode::from_str)
            .unwrap_or_default()
    }

    pub fn expand_all_budget(&self) -> Duration {
        Duration::from_millis(
            self.expand_all
                .budget_ms
                .unwrap_or(DEFAULT_EXPAND_ALL_BUDGET_MS),
        )
    }

    /// Simulated fetch latency; zero means none.
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.source.fetch_delay_ms.unwrap_or(0))
    }

    /// Settings consumed by [`crate::grid::TreeGrid`].
    pub fn grid_settings(&self) -> GridSettings {
        GridSettings {
            expand_first_generation: self.expand_first_generation(),
            spinner_delay: self.spinner_delay(),
            expand_all_budget: self.expand_all_budget(),
            tick_rate: self.tick_rate(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
