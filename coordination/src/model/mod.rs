//! Shared data model for the differential pipeline.
//!
//! | Type           | Produced by          | Consumed by               |
//! |----------------|----------------------|---------------------------|
//! | `PatientContext` | external normaliser | every specialist          |
//! | `Candidate`    | one specialist       | fusion engine             |
//! | `AgentResult`  | one specialist       | fusion engine, audit      |
//! | `FusedOutput`  | fusion engine        | persistence / API layer   |

pub mod candidate;
pub mod fused;
pub mod patient;

pub use candidate::{
    clamp_unit, round3, AgentResult, Candidate, CanonicalKey, Citation, ConfidenceQual,
    SpecialistDomain,
};
pub use fused::{
    FusedDifferentialItem, FusedOutput, GraphEdge, NextBestTest, TestPlanItem,
    CLINICAL_REEVALUATION,
};
pub use patient::{Demographics, PatientContext, Sex, Vitals};
