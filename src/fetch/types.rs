// src/fetch/types.rs

use serde::{Deserialize, Deserializer, Serialize};

/// One token transfer event, in the shape written to the export CSV.
#[derive(Debug, Serialize, PartialEq, Clone, Eq)]
pub struct TransferRecord {
    pub from: String,
    pub to: String,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    #[serde(rename = "blockNumber")]
    pub block_number: u64,
}

/// A single page of results plus the cursor for the next one.
/// `cursor == None` means pagination is exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferPage {
    pub transfers: Vec<TransferRecord>,
    pub cursor: Option<String>,
}

/// Body of an `erc20/{address}/transfers` response.
#[derive(Debug, Deserialize)]
pub struct TransfersResponse {
    #[serde(default)]
    pub result: Vec<ApiTransfer>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTransfer {
    pub from_address: String,
    pub to_address: String,
    pub transaction_hash: String,
    #[serde(deserialize_with = "block_number_from_str_or_int")]
    pub block_number: u64,
}

impl From<ApiTransfer> for TransferRecord {
    fn from(tx: ApiTransfer) -> Self {
        Self {
            from: tx.from_address,
            to: tx.to_address,
            tx_hash: tx.transaction_hash,
            block_number: tx.block_number,
        }
    }
}

impl From<TransfersResponse> for TransferPage {
    fn from(resp: TransfersResponse) -> Self {
        Self {
            transfers: resp.result.into_iter().map(TransferRecord::from).collect(),
            // the API sends "" as well as null once the last page is reached
            cursor: resp.cursor.filter(|c| !c.is_empty()),
        }
    }
}

/// The API reports block numbers as decimal strings; accept plain integers too.
fn block_number_from_str_or_int<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Str(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid block_number {:?}: {}", s, e))),
    }
}
