//! Deterministic core of the multi-specialist differential pipeline.
//!
//! This library provides:
//! - The shared data model (patient context, candidates, fused output)
//! - Candidate fusion with Jensen–Shannon disagreement scoring
//! - A knowledge graph with path queries and next-best-test selection
//! - Hybrid (BM25 + dense) evidence retrieval and prior-case search
//!
//! Nothing here talks to a reasoning oracle; specialists and dispatch live in
//! the `ddx-agents` crate.
//!
//! # Usage
//!
//! ```
//! use ddx_coordination::fusion::fuse;
//! use ddx_coordination::graph::KnowledgeGraph;
//! use ddx_coordination::model::{AgentResult, Candidate, ConfidenceQual, SpecialistDomain};
//!
//! let results = vec![AgentResult::new(
//!     SpecialistDomain::Infectious,
//!     vec![Candidate::new("Dengue", ConfidenceQual::High).with_score(0.9)],
//! )];
//! let fused = fuse(&results, &[], &KnowledgeGraph::empty()).unwrap();
//! assert_eq!(fused.differential[0].diagnosis, "Dengue");
//! ```

pub mod fusion;
pub mod graph;
pub mod model;
pub mod retrieval;
pub mod text;

// Re-export key model types
pub use model::{
    AgentResult, Candidate, CanonicalKey, Citation, ConfidenceQual, FusedDifferentialItem,
    FusedOutput, GraphEdge, NextBestTest, PatientContext, SpecialistDomain, TestPlanItem,
};

// Re-export fusion entry points
pub use fusion::{disagreement_score, fuse, FusionError};

// Re-export graph types
pub use graph::{GraphError, GraphHandle, GraphSource, KnowledgeGraph};

// Re-export retrieval types
pub use retrieval::{
    CaseHit, Embedder, EvidenceRetriever, HybridRetriever, Passage, RetrievalError, SearchParams,
};
