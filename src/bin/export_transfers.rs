use anyhow::{Context, Result};
use reqwest::Client;
use tokenflow::{
    collect_transfers, fetch::write_transfers_csv, logging::init_logging, FetchConfig,
    MoralisClient,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    init_logging("info");

    // ─── 2) configuration from the environment ──────────────────────
    let cfg = FetchConfig::from_env().context("loading exporter configuration")?;
    info!(?cfg, "starting transfer export");

    // ─── 3) page through the API ────────────────────────────────────
    let mut source = MoralisClient::new(Client::new(), &cfg)?;
    let rows = collect_transfers(&mut source, cfg.max_rows).await?;

    // ─── 4) write CSV ────────────────────────────────────────────────
    write_transfers_csv(&cfg.output_path, &rows)?;
    info!(rows = rows.len(), path = %cfg.output_path.display(), "export complete");
    println!(
        "exported {} transfers to {}",
        rows.len(),
        cfg.output_path.display()
    );

    Ok(())
}
