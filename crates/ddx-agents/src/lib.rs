//! Specialist agents and the diagnose pipeline.
//!
//! ```text
//! PatientContext ─> Dispatcher ─> 6 × Specialist ─> fuse() ─> recommendations ─> DiagnoseResult
//!                                   │  ├─ EvidenceRetriever
//!                                   │  ├─ KnowledgeGraph snapshot
//!                                   │  └─ ReasoningOracle
//! ```
//!
//! Deterministic pieces (fusion, graph, retrieval) live in
//! `ddx-coordination`; this crate owns everything that talks to the oracle.

pub mod config;
pub mod dispatch;
pub mod domains;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod recommendations;
pub mod specialist;

pub use config::{ConfigError, DdxConfig};
pub use dispatch::Dispatcher;
pub use domains::{DomainDescriptor, DOMAINS};
pub use oracle::{OpenAiOracle, OracleError, OracleRequest, ReasoningOracle};
pub use pipeline::{DiagnoseResult, Pipeline, PipelineError};
pub use recommendations::{Priority, Recommendation};
pub use specialist::{
    Specialist, SpecialistDeps, SpecialistFailure, SpecialistOutcome, SpecialistSettings,
};
