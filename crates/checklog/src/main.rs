use std::io::{self, BufWriter};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use checklog::conf::CheckConfig;
use checklog::runtime::{boot, run};
use checklog::state::StateStore;

fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let config = CheckConfig::load()
        .map_err(|e| anyhow!(e))
        .context("Failed to load configuration")?;
    boot::init_logging(&config.logging.level);

    config
        .validate()
        .map_err(|e| anyhow!(e))
        .context("Configuration validation failed")?;
    info!(sources = config.sources.len(), "configuration loaded");

    let store = StateStore::from_env();
    let mut state = store
        .load()
        .with_context(|| format!("Failed to load state from {}", store.path().display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    run::run(&config, &mut state, &mut out)?;

    store
        .save(&state)
        .with_context(|| format!("Failed to save state to {}", store.path().display()))?;
    Ok(())
}
