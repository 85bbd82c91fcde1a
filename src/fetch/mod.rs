// src/fetch/mod.rs

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info};

pub mod moralis;
pub mod types;
pub mod write;

pub use moralis::MoralisClient;
pub use types::{ApiTransfer, TransferPage, TransferRecord, TransfersResponse};
pub use write::{write_transfers, write_transfers_csv, EXPORT_HEADER};

/// Anything that can hand out transfer pages one cursor at a time.
///
/// Each call depends on the cursor returned by the previous one, so callers
/// must never have more than one request in flight.
#[allow(async_fn_in_trait)]
pub trait TransferSource {
    /// Fetch the page that starts at `cursor` (`None` = first page).
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<TransferPage>;
}

/// Walk the cursor chain of `source` until `max_rows` transfers are collected
/// or the source runs out of pages.
///
/// Rows keep the order the source returns them in. A page that would push
/// the total past `max_rows` is truncated. Any page error aborts the whole
/// run; nothing collected so far is returned.
#[tracing::instrument(level = "info", skip(source))]
pub async fn collect_transfers<S: TransferSource>(
    source: &mut S,
    max_rows: usize,
) -> Result<Vec<TransferRecord>> {
    let start = Instant::now();
    let mut rows: Vec<TransferRecord> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source
            .fetch_page(cursor.as_deref())
            .await
            .with_context(|| format!("fetching transfer page {}", pages + 1))?;
        pages += 1;

        let received = page.transfers.len();
        let remaining = max_rows.saturating_sub(rows.len());
        rows.extend(page.transfers.into_iter().take(remaining));
        debug!(page = pages, received, total = rows.len(), "page collected");

        if rows.len() >= max_rows {
            debug!(max_rows, "row cap reached");
            break;
        }
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => {
                debug!("no further cursor; pagination exhausted");
                break;
            }
        }
    }

    info!(rows = rows.len(), pages, elapsed = ?start.elapsed(), "transfers collected");
    Ok(rows)
}
