use trellis_level::SpawnError;

/// Errors from encoding, storing or restoring level snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("schema version mismatch: snapshot has v{found}, expected v{expected}")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("no snapshots found")]
    NoSnapshots,
    #[error("restoring entity {id}: {source}")]
    Restore {
        id: String,
        #[source]
        source: SpawnError,
    },
}
