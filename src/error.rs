//! Bridge error taxonomy.
//!
//! Nothing here escalates to a crash: malformed records are logged and
//! skipped at the ingestion boundary, capacity problems resolve by eviction,
//! and stale optimistic state resolves by forced rollback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// A chunk record whose concatenated half-bitfields are not exactly
    /// 64 hex characters. The whole record is skipped, never partially
    /// materialized.
    #[error("malformed chunk bitfield for {chunk_id}: {len} hex chars, expected 64")]
    MalformedChunk { chunk_id: String, len: usize },

    /// A chunk id too short to carry the three 40-bit offset fields.
    #[error("malformed chunk id {0:?}")]
    MalformedChunkId(String),

    /// Non-hex characters where a hex field was expected.
    #[error("invalid hex in {context}: {text:?}")]
    InvalidHex { context: &'static str, text: String },
}
