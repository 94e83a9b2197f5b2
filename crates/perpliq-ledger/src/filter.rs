//! Server-side account filters for program account scans.

use serde_json::{json, Value};

/// One predicate on raw account data. A scan returns accounts matching all
/// of its filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Exact data length.
    DataSize(u64),
    /// `bytes` present at `offset`.
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    #[must_use]
    pub fn memcmp(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        AccountFilter::Memcmp {
            offset,
            bytes: bytes.into(),
        }
    }

    /// JSON-RPC representation (memcmp patterns are base58).
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            AccountFilter::DataSize(size) => json!({ "dataSize": size }),
            AccountFilter::Memcmp { offset, bytes } => json!({
                "memcmp": {
                    "offset": offset,
                    "bytes": bs58::encode(bytes).into_string(),
                    "encoding": "base58",
                }
            }),
        }
    }

    /// Evaluate the filter locally.
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            AccountFilter::DataSize(size) => data.len() as u64 == *size,
            AccountFilter::Memcmp { offset, bytes } => data
                .get(*offset..offset + bytes.len())
                .is_some_and(|window| window == bytes.as_slice()),
        }
    }
}
