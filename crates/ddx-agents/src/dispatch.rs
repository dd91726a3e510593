//! Dispatch coordinator: JoinSet fan-out of one task per specialist domain,
//! unconditional fan-in.
//!
//! ```text
//! PatientContext ─┬─> Specialist(infectious)  ─┐
//!                 ├─> Specialist(autoimmune)  ─┤
//!                 ├─> ...                      ├─> Vec<SpecialistOutcome> (domain order)
//!                 └─> Specialist(toxicology)  ─┘
//! ```
//!
//! ## Partial failure policy
//!
//! Every task is awaited. A specialist that fails, or whose task panics,
//! becomes a `Failed` outcome in its own slot and never disturbs its
//! siblings. There is no coordinator-level timeout; each oracle call carries
//! its own.

use std::sync::Arc;
use std::time::Instant;

use ddx_coordination::model::PatientContext;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domains::DOMAINS;
use crate::specialist::{Specialist, SpecialistDeps, SpecialistFailure, SpecialistOutcome, SpecialistSettings};

pub struct Dispatcher {
    specialists: Vec<Arc<Specialist>>,
}

impl Dispatcher {
    /// One specialist per entry of the static domain table.
    pub fn new(settings: SpecialistSettings) -> Self {
        let specialists = DOMAINS
            .iter()
            .map(|descriptor| Arc::new(Specialist::new(descriptor, settings.clone())))
            .collect();
        Self { specialists }
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }

    /// Run every specialist concurrently over `patient` and return their
    /// outcomes in domain-table order, regardless of completion order.
    pub async fn dispatch(&self, patient: Arc<PatientContext>, deps: SpecialistDeps) -> Vec<SpecialistOutcome> {
        let start = Instant::now();
        info!(
            patient_id = %patient.patient_id,
            specialists = self.specialists.len(),
            "Dispatching specialists"
        );

        let mut join_set: JoinSet<(usize, SpecialistOutcome)> = JoinSet::new();
        for (slot, specialist) in self.specialists.iter().enumerate() {
            let specialist = Arc::clone(specialist);
            let patient = Arc::clone(&patient);
            let deps = deps.clone();
            join_set.spawn(async move {
                let outcome = specialist.run(&patient, &deps).await;
                (slot, outcome)
            });
        }

        let mut slots: Vec<Option<SpecialistOutcome>> = self.specialists.iter().map(|_| None).collect();
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((slot, outcome)) => {
                    debug!(agent = %outcome.agent(), failed = outcome.is_failed(), "Specialist finished");
                    slots[slot] = Some(outcome);
                }
                Err(e) => {
                    // The slot stays empty and is filled below.
                    warn!(error = %e, "Specialist task panicked");
                }
            }
        }

        let outcomes: Vec<SpecialistOutcome> = slots
            .into_iter()
            .zip(&self.specialists)
            .map(|(slot, specialist)| {
                slot.unwrap_or_else(|| SpecialistOutcome::Failed {
                    agent: specialist.domain(),
                    reason: SpecialistFailure::Aborted("task panicked or was cancelled".into()),
                })
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        info!(
            specialists = outcomes.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dispatch complete"
        );
        outcomes
    }
}
