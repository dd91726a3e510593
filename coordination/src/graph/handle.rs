//! Shared, swappable graph snapshot.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::source::GraphSource;
use super::store::KnowledgeGraph;
use super::{GraphError, GraphResult};

/// Cheap-to-clone handle over the current [`KnowledgeGraph`].
///
/// Readers take an `Arc` snapshot and keep it for the whole request, so a
/// concurrent [`reload`](Self::reload) never changes what they see.
#[derive(Debug, Clone)]
pub struct GraphHandle {
    current: Arc<RwLock<Arc<KnowledgeGraph>>>,
}

impl GraphHandle {
    pub fn new(graph: KnowledgeGraph) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(graph))),
        }
    }

    pub fn empty() -> Self {
        Self::new(KnowledgeGraph::empty())
    }

    /// Load from `source`, falling back to an empty graph on failure.
    pub async fn load_or_empty(source: Arc<dyn GraphSource>) -> Self {
        let handle = Self::empty();
        if let Err(e) = handle.reload(source).await {
            warn!(error = %e, "Knowledge graph unavailable, continuing with an empty graph");
        }
        handle
    }

    pub async fn snapshot(&self) -> Arc<KnowledgeGraph> {
        Arc::clone(&*self.current.read().await)
    }

    /// Build a fresh graph from `source` off the async runtime and swap it in.
    /// On error the previous snapshot stays in place.
    pub async fn reload(&self, source: Arc<dyn GraphSource>) -> GraphResult<()> {
        let label = source.describe();
        let graph = tokio::task::spawn_blocking(move || {
            source.load().map(KnowledgeGraph::from_snapshot)
        })
        .await
        .map_err(|e| GraphError::Join(e.to_string()))??;

        let (entities, relations) = (graph.entity_count(), graph.relation_count());
        *self.current.write().await = Arc::new(graph);
        info!(source = %label, entities, relations, "Knowledge graph reloaded");
        Ok(())
    }
}

impl Default for GraphHandle {
    fn default() -> Self {
        Self::empty()
    }
}
