//! Diagnose pipeline: dispatch → fuse → recommend.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ddx_coordination::fusion::{fuse, FusionError};
use ddx_coordination::graph::{source_for_path, GraphHandle};
use ddx_coordination::model::{AgentResult, FusedOutput, PatientContext};
use ddx_coordination::retrieval::{
    EvidenceRetriever, HybridRetriever, OpenAiEmbedder, RetrievalError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::DdxConfig;
use crate::dispatch::Dispatcher;
use crate::oracle::{OpenAiOracle, OracleError, ReasoningOracle};
use crate::recommendations::{generate_recommendations, Recommendation};
use crate::specialist::{SpecialistDeps, SpecialistSettings};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fusion failed: {0}")]
    Fusion(#[from] FusionError),

    #[error("retrieval setup failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("oracle setup failed: {0}")]
    Oracle(#[from] OracleError),
}

/// Everything produced for one request, including the raw per-specialist
/// results for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnoseResult {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub agents: Vec<AgentResult>,
    pub fused: FusedOutput,
    pub recommendations: Vec<Recommendation>,
}

pub struct Pipeline {
    dispatcher: Dispatcher,
    settings: SpecialistSettings,
    retriever: Arc<dyn EvidenceRetriever>,
    graph: GraphHandle,
    oracle: Arc<dyn ReasoningOracle>,
}

impl Pipeline {
    pub fn new(
        settings: SpecialistSettings,
        retriever: Arc<dyn EvidenceRetriever>,
        graph: GraphHandle,
        oracle: Arc<dyn ReasoningOracle>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(settings.clone()),
            settings,
            retriever,
            graph,
            oracle,
        }
    }

    /// Wire the OpenAI-compatible clients and on-disk stores named in
    /// `config`. A missing graph store or dense index degrades, it does not
    /// fail.
    pub async fn from_config(config: &DdxConfig) -> Result<Self, PipelineError> {
        let embedder = Arc::new(OpenAiEmbedder::new(
            config.embedding.base_url.clone(),
            config.embedding_api_key(),
            config.embedding.model.clone(),
            std::time::Duration::from_secs(config.embedding.timeout_secs),
        )?);
        let retriever = HybridRetriever::open(
            &config.paths.literature,
            &config.paths.dense_index,
            &config.paths.cases,
            embedder,
        )?;
        let graph = GraphHandle::load_or_empty(Arc::from(source_for_path(&config.paths.graph))).await;
        let oracle = OpenAiOracle::new(&config.oracle)?;

        Ok(Self::new(
            SpecialistSettings::from(config),
            Arc::new(retriever),
            graph,
            Arc::new(oracle),
        ))
    }

    /// Handle used to hot-swap the knowledge graph between requests.
    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    /// Run one request end to end. Only fusion can fail; specialist and
    /// recommendation failures degrade inside their own stages.
    pub async fn diagnose(&self, patient: PatientContext) -> Result<DiagnoseResult, PipelineError> {
        let request_id = Uuid::new_v4();
        let patient = Arc::new(patient);
        // Pinned for the whole request; a concurrent reload is not observed.
        let graph = self.graph.snapshot().await;

        let deps = SpecialistDeps {
            retriever: Arc::clone(&self.retriever),
            graph: Arc::clone(&graph),
            oracle: Arc::clone(&self.oracle),
        };
        let agents: Vec<AgentResult> = self
            .dispatcher
            .dispatch(Arc::clone(&patient), deps)
            .await
            .into_iter()
            .map(|outcome| outcome.into_agent_result())
            .collect();

        let fused = fuse(&agents, &patient.symptoms, &graph)?;
        let recommendations =
            generate_recommendations(self.oracle.as_ref(), &self.settings, &patient, &fused).await;

        info!(
            %request_id,
            patient_id = %patient.patient_id,
            differential = fused.differential.len(),
            disagreement = fused.disagreement_score,
            recommendations = recommendations.len(),
            "Diagnose request complete"
        );

        Ok(DiagnoseResult {
            request_id,
            generated_at: Utc::now(),
            agents,
            fused,
            recommendations,
        })
    }
}
