use std::path::PathBuf;

use trellis_common::EntityHandle;

/// Authoring errors raised while spawning an entity. Each one points at
/// broken content and aborts the spawn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("can't spawn entity: object \"{0}\" doesn't exist")]
    UnknownType(String),
    #[error("can't spawn entity: object \"{0}\" isn't tagged \"entity\"")]
    NotAnEntity(String),
    #[error("can't spawn \"{type_name}\": parent {parent} is not a live entity")]
    InvalidParent {
        type_name: String,
        parent: EntityHandle,
    },
    #[error("can't spawn \"{type_name}\" as a child of detached entity {parent}: it must be detached too")]
    DetachedParent {
        type_name: String,
        parent: EntityHandle,
    },
}

/// Errors from loading or validating an [`ActivationConfig`](crate::ActivationConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config extension: {0}")]
    UnsupportedFormat(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}
