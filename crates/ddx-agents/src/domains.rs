//! Static table of specialist domains.

use ddx_coordination::model::SpecialistDomain;

use crate::prompts::{
    AUTOIMMUNE_PERSONA, CARDIOLOGY_PERSONA, INFECTIOUS_PERSONA, NEUROLOGY_PERSONA,
    ONCOLOGY_PERSONA, TOXICOLOGY_PERSONA,
};

/// Everything that distinguishes one specialist from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainDescriptor {
    pub domain: SpecialistDomain,
    /// Human-readable specialty used inside prompts.
    pub label: &'static str,
    /// System prompt.
    pub persona: &'static str,
    /// Literature query used when the patient has no symptoms.
    pub fallback_query: &'static str,
}

/// One descriptor per domain, in dispatch order.
pub static DOMAINS: [DomainDescriptor; 6] = [
    DomainDescriptor {
        domain: SpecialistDomain::Infectious,
        label: "infectious disease",
        persona: INFECTIOUS_PERSONA,
        fallback_query: "fever",
    },
    DomainDescriptor {
        domain: SpecialistDomain::Autoimmune,
        label: "autoimmune/rheumatology",
        persona: AUTOIMMUNE_PERSONA,
        fallback_query: "arthralgia",
    },
    DomainDescriptor {
        domain: SpecialistDomain::Cardiology,
        label: "cardiology",
        persona: CARDIOLOGY_PERSONA,
        fallback_query: "chest pain",
    },
    DomainDescriptor {
        domain: SpecialistDomain::Neurology,
        label: "neurology",
        persona: NEUROLOGY_PERSONA,
        fallback_query: "headache",
    },
    DomainDescriptor {
        domain: SpecialistDomain::Oncology,
        label: "oncology",
        persona: ONCOLOGY_PERSONA,
        fallback_query: "weight loss",
    },
    DomainDescriptor {
        domain: SpecialistDomain::Toxicology,
        label: "medical toxicology",
        persona: TOXICOLOGY_PERSONA,
        fallback_query: "altered mental status",
    },
];

pub fn descriptor(domain: SpecialistDomain) -> &'static DomainDescriptor {
    DOMAINS
        .iter()
        .find(|d| d.domain == domain)
        .unwrap_or(&DOMAINS[0])
}
