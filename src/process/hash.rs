use num_bigint::BigUint;
use std::collections::HashMap;
use tracing::trace;

/// Render a bare hex digit string (no prefix) as a base-10 numeral.
///
/// Returns `None` when `hex` is empty or holds anything but `[0-9a-fA-F]`.
/// Leading zeros disappear; an all-zero input renders as `"0"`.
pub fn hex_digits_to_decimal(hex: &str) -> Option<String> {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    BigUint::parse_bytes(hex.as_bytes(), 16).map(|n| n.to_str_radix(10))
}

/// Memo table from lowercased transaction hash to its decimal form.
///
/// Lives for one process run. Entries are never evicted, and malformed hashes
/// are cached as `""` just like well-formed ones.
#[derive(Debug, Default)]
pub struct HashCache {
    map: HashMap<String, String>,
    hits: u64,
    misses: u64,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decimal numeral for `raw`, a hex hash with or without `0x`/`0X`.
    ///
    /// Lookup is case-insensitive. Anything that is not a non-empty hex
    /// number after the prefix maps to the empty string.
    pub fn decimal_for(&mut self, raw: &str) -> String {
        let key = raw.to_lowercase();
        if let Some(dec) = self.map.get(&key) {
            self.hits += 1;
            return dec.clone();
        }
        self.misses += 1;

        let digits = key.strip_prefix("0x").unwrap_or(&key);
        let dec = match hex_digits_to_decimal(digits) {
            Some(dec) => dec,
            None => {
                trace!(tx_hash = raw, "not a hex number; using empty txHash");
                String::new()
            }
        };

        self.map.insert(key, dec.clone());
        dec
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
