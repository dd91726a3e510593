//! Dispatch coordinator tests: ordering, isolation and degraded evidence.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{passage, FakeRetriever, Reply, ScriptedOracle};
use ddx_agents::{Dispatcher, OracleError, SpecialistDeps, SpecialistFailure, SpecialistOutcome, SpecialistSettings};
use ddx_coordination::graph::KnowledgeGraph;
use ddx_coordination::model::{PatientContext, SpecialistDomain};

fn one_candidate(diagnosis: &str) -> Reply {
    Reply::json(serde_json::json!({
        "candidates": [{"diagnosis": diagnosis, "rationale": "fits", "confidence_qual": "medium",
                        "citations": [{"doc_id": "doc-1", "span": "s"}]}]
    }))
}

fn deps(oracle: Arc<ScriptedOracle>, retriever: Arc<FakeRetriever>) -> SpecialistDeps {
    SpecialistDeps {
        retriever,
        graph: Arc::new(KnowledgeGraph::empty()),
        oracle,
    }
}

fn patient() -> Arc<PatientContext> {
    Arc::new(PatientContext::new("p-1").with_symptoms(["fever", "rash"]))
}

#[tokio::test(start_paused = true)]
async fn outcomes_follow_domain_order_not_completion_order() {
    // Infectious finishes last, toxicology first.
    let oracle = Arc::new(
        ScriptedOracle::new(Reply::no_candidates())
            .on_domain(
                SpecialistDomain::Infectious,
                Reply::Delayed(Duration::from_secs(5), one_candidate("Dengue").text()),
            )
            .on_domain(SpecialistDomain::Oncology, Reply::Delayed(Duration::from_secs(2), one_candidate("Lymphoma").text()))
            .on_domain(SpecialistDomain::Toxicology, one_candidate("Salicylate toxicity")),
    );
    let dispatcher = Dispatcher::new(SpecialistSettings::default());
    let outcomes = dispatcher
        .dispatch(patient(), deps(oracle, Arc::new(FakeRetriever::with_passages(vec![]))))
        .await;

    let order: Vec<_> = outcomes.iter().map(|o| o.agent()).collect();
    assert_eq!(order, SpecialistDomain::ALL.to_vec());
    assert!(matches!(&outcomes[0], SpecialistOutcome::Produced(r) if r.candidates[0].diagnosis == "Dengue"));
    assert!(matches!(&outcomes[4], SpecialistOutcome::Produced(r) if r.candidates[0].diagnosis == "Lymphoma"));
    assert!(matches!(&outcomes[5], SpecialistOutcome::Produced(_)));
    assert!(matches!(
        &outcomes[1],
        SpecialistOutcome::Failed { reason: SpecialistFailure::NoCandidates, .. }
    ));
}

#[tokio::test]
async fn failing_and_panicking_specialists_do_not_affect_siblings() {
    let oracle = Arc::new(
        ScriptedOracle::new(one_candidate("Something in domain"))
            .on_domain(SpecialistDomain::Cardiology, Reply::Fail)
            .on_domain(SpecialistDomain::Neurology, Reply::Panic)
            .on_domain(SpecialistDomain::Oncology, Reply::Text("not json".into())),
    );
    let dispatcher = Dispatcher::new(SpecialistSettings::default());
    let outcomes = dispatcher
        .dispatch(patient(), deps(oracle, Arc::new(FakeRetriever::with_passages(vec![]))))
        .await;

    assert_eq!(outcomes.len(), 6);
    assert!(matches!(
        &outcomes[2],
        SpecialistOutcome::Failed { reason: SpecialistFailure::Oracle(OracleError::Status { status: 503, .. }), .. }
    ));
    assert!(matches!(
        &outcomes[3],
        SpecialistOutcome::Failed { agent: SpecialistDomain::Neurology, reason: SpecialistFailure::Aborted(_) }
    ));
    assert!(matches!(&outcomes[4], SpecialistOutcome::Failed { reason: SpecialistFailure::Parse(_), .. }));

    for i in [0, 1, 5] {
        assert!(!outcomes[i].is_failed(), "slot {i} should have produced");
    }

    let results: Vec<_> = outcomes.into_iter().map(|o| o.into_agent_result()).collect();
    assert!(results[2].is_empty() && results[3].is_empty() && results[4].is_empty());
    assert_eq!(results[0].candidates.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_oracle_times_out_per_call() {
    let oracle = Arc::new(
        ScriptedOracle::new(Reply::no_candidates()).on_domain(
            SpecialistDomain::Infectious,
            Reply::Delayed(Duration::from_secs(120), one_candidate("Dengue").text()),
        ),
    );
    let settings = SpecialistSettings {
        timeout: Duration::from_secs(30),
        ..SpecialistSettings::default()
    };
    let outcomes = Dispatcher::new(settings)
        .dispatch(patient(), deps(oracle, Arc::new(FakeRetriever::with_passages(vec![]))))
        .await;

    assert!(matches!(
        &outcomes[0],
        SpecialistOutcome::Failed { reason: SpecialistFailure::Oracle(OracleError::Timeout(_)), .. }
    ));
}

#[tokio::test]
async fn retrieval_failure_degrades_to_empty_evidence() {
    let oracle = Arc::new(ScriptedOracle::new(one_candidate("Dengue")));
    let outcomes = Dispatcher::new(SpecialistSettings::default())
        .dispatch(patient(), deps(Arc::clone(&oracle), Arc::new(FakeRetriever::failing())))
        .await;

    assert!(outcomes.iter().all(|o| !o.is_failed()));
    let request = oracle.request_for("INFECTIOUS ETIOLOGIES").unwrap();
    assert!(request.user.contains("LOCAL LITERATURE (top 0):\n(none)"));
    assert!(request.user.contains("PREVIOUS CASES (top 0):\n(none)"));
}

#[tokio::test]
async fn specialist_prompt_carries_snippets_and_settings() {
    let long_text = "x".repeat(1000);
    let passages: Vec<_> = (0..12)
        .map(|i| passage(&format!("doc-{i}"), &long_text))
        .collect();
    let retriever = Arc::new(FakeRetriever::with_passages(passages));
    let oracle = Arc::new(ScriptedOracle::new(Reply::no_candidates()));

    Dispatcher::new(SpecialistSettings::default())
        .dispatch(patient(), deps(Arc::clone(&oracle), Arc::clone(&retriever)))
        .await;

    let request = oracle.request_for("ONCOLOGIC ETIOLOGIES").unwrap();
    assert_eq!(request.model, "gpt-4o");
    assert_eq!(request.temperature, 0.2);
    assert!(request.json_mode);
    assert!(request.user.contains("LOCAL LITERATURE (top 8):"));
    assert!(request.user.contains(&format!("- doc-7: {}\n", "x".repeat(350))));
    assert!(!request.user.contains("- doc-8:"));

    let queries = retriever.queries.lock().unwrap();
    assert_eq!(queries.len(), 6);
    assert!(queries.iter().all(|q| q == "fever, rash"));
}

#[tokio::test]
async fn empty_symptoms_use_domain_fallback_query() {
    let retriever = Arc::new(FakeRetriever::with_passages(vec![]));
    let oracle = Arc::new(ScriptedOracle::new(Reply::no_candidates()));
    Dispatcher::new(SpecialistSettings::default())
        .dispatch(Arc::new(PatientContext::new("p-2")), deps(oracle, Arc::clone(&retriever)))
        .await;

    let queries = retriever.queries.lock().unwrap();
    assert!(queries.contains(&"weight loss".to_string()));
    assert!(queries.contains(&"fever".to_string()));
}
