//! Token-transfer export and normalization.
//!
//! [`fetch`] pages through a transfer-listing API and writes
//! `from,to,txHash,blockNumber` CSV; [`process`] turns that CSV into
//! `from,to,txHash,geo` with decimal transaction hashes.

pub mod config;
pub mod fetch;
pub mod logging;
pub mod process;

pub use config::FetchConfig;
pub use fetch::{collect_transfers, MoralisClient, TransferRecord, TransferSource};
pub use process::{HashCache, NormalizeError, NormalizedRecord, Normalizer};
