//! Knowledge graph: typed entities and relations, explanatory path queries
//! and next-best-test selection.
//!
//! The graph is loaded once from a [`GraphSource`] into an immutable
//! [`KnowledgeGraph`] and shared through a [`GraphHandle`].

use std::path::PathBuf;

use thiserror::Error;

pub mod handle;
mod paths;
pub mod source;
pub mod store;
pub mod types;

pub use handle::GraphHandle;
pub use source::{source_for_path, GraphSource, JsonGraphSource, SqliteGraphSource};
pub use store::KnowledgeGraph;
pub use types::{Entity, EntityKind, GraphSnapshot, Relation, RelationKind, TestPrior};

/// Default hop budget for explanatory path queries.
pub const DEFAULT_MAX_HOPS: usize = 3;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read graph store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid graph snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("graph load task failed: {0}")]
    Join(String),
}

pub type GraphResult<T> = Result<T, GraphError>;
