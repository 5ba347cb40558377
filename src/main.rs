mod city;
mod clock;
mod dashboard;
mod listing;
mod lookup;
mod search;
mod store;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::city::directory::CityDirectory;
use crate::dashboard::Dashboard;
use crate::lookup::{
    DEFAULT_SEARCH_URL, DEFAULT_TIMEZONE_URL, DEFAULT_USER_AGENT, HttpLocationLookup,
    LookupConfig,
};
use crate::store::{DashboardState, JsonFileStore};

#[derive(Parser, Debug)]
#[command(
    name = "worldclock",
    version,
    about = "Dashboard of live clocks for cities around the world"
)]
struct Cli {
    /// Dashboard state file.
    #[arg(long, default_value = "dashboard.json")]
    state: PathBuf,

    #[arg(long, default_value = DEFAULT_SEARCH_URL)]
    search_url: String,

    #[arg(long, default_value = DEFAULT_TIMEZONE_URL)]
    timezone_url: String,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Quiet period before a typed query is searched.
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,

    /// Print the stored dashboard and exit.
    #[arg(long, conflicts_with = "add")]
    list: bool,

    /// Add the first search hit for this query and exit.
    #[arg(long, value_name = "QUERY")]
    add: Option<String>,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.debounce_ms == 0 {
        bail!("--debounce-ms must be greater than zero");
    }

    let store = JsonFileStore::open(&cli.state)
        .with_context(|| format!("failed to load {}", cli.state.display()))?;
    log::debug!("dashboard state at {}", store.path().display());
    let state = DashboardState::new(store);

    if cli.list {
        return listing::run_list(&mut CityDirectory::new(state));
    }

    let lookup = HttpLocationLookup::new(LookupConfig {
        search_url: cli.search_url,
        timezone_url: cli.timezone_url,
        user_agent: cli.user_agent,
    })?;

    if let Some(query) = cli.add.as_deref() {
        return listing::run_add(&mut CityDirectory::new(state), &lookup, query);
    }

    ui::app::run_gui(
        Dashboard::new(state),
        Arc::new(lookup),
        Duration::from_millis(cli.debounce_ms),
    )
}
