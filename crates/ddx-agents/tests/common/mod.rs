//! Hand-written fakes for the oracle and retrieval boundaries.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ddx_agents::{OracleError, OracleRequest, ReasoningOracle};
use ddx_coordination::model::SpecialistDomain;
use ddx_coordination::retrieval::{
    CaseHit, EvidenceRetriever, Passage, RetrievalError, RetrievalResult, SearchParams,
};

/// Text that only appears in one system prompt.
pub fn persona_marker(domain: SpecialistDomain) -> &'static str {
    match domain {
        SpecialistDomain::Infectious => "INFECTIOUS ETIOLOGIES",
        SpecialistDomain::Autoimmune => "AUTOIMMUNE/INFLAMMATORY ETIOLOGIES",
        SpecialistDomain::Cardiology => "CARDIOVASCULAR ETIOLOGIES",
        SpecialistDomain::Neurology => "NEUROLOGIC ETIOLOGIES",
        SpecialistDomain::Oncology => "ONCOLOGIC ETIOLOGIES",
        SpecialistDomain::Toxicology => "TOXICOLOGIC ETIOLOGIES",
    }
}

pub const RECOMMENDATIONS_MARKER: &str = "clinical recommendations assistant";

#[derive(Clone)]
pub enum Reply {
    Text(String),
    Delayed(Duration, String),
    Fail,
    Panic,
}

impl Reply {
    pub fn json(value: serde_json::Value) -> Self {
        Self::Text(value.to_string())
    }

    pub fn no_candidates() -> Self {
        Self::json(serde_json::json!({ "candidates": [] }))
    }

    pub fn text(&self) -> String {
        match self {
            Self::Text(text) | Self::Delayed(_, text) => text.clone(),
            Self::Fail | Self::Panic => String::new(),
        }
    }
}

/// Oracle that answers by looking for a marker in the system prompt.
pub struct ScriptedOracle {
    script: Vec<(&'static str, Reply)>,
    fallback: Reply,
    pub requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(fallback: Reply) -> Self {
        Self {
            script: Vec::new(),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, marker: &'static str, reply: Reply) -> Self {
        self.script.push((marker, reply));
        self
    }

    pub fn on_domain(self, domain: SpecialistDomain, reply: Reply) -> Self {
        self.on(persona_marker(domain), reply)
    }

    pub fn request_for(&self, marker: &str) -> Option<OracleRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.system.contains(marker))
            .cloned()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .script
            .iter()
            .find(|(marker, _)| request.system.contains(marker))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Fail => Err(OracleError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
            Reply::Panic => panic!("scripted oracle panic"),
        }
    }
}

/// Retriever with canned passages and cases.
pub struct FakeRetriever {
    pub passages: Vec<Passage>,
    pub cases: Vec<CaseHit>,
    pub fail: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FakeRetriever {
    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            cases: Vec::new(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_passages(Vec::new())
        }
    }
}

#[async_trait]
impl EvidenceRetriever for FakeRetriever {
    async fn hybrid_search(&self, query: &str, params: SearchParams) -> RetrievalResult<Vec<Passage>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(RetrievalError::IndexMissing);
        }
        Ok(self.passages.iter().take(params.k_final).cloned().collect())
    }

    async fn prior_case_search(&self, _symptoms: &[String], k: usize) -> RetrievalResult<Vec<CaseHit>> {
        if self.fail {
            return Err(RetrievalError::Embedding("service down".into()));
        }
        Ok(self.cases.iter().take(k).cloned().collect())
    }
}

pub fn passage(doc_id: &str, text: &str) -> Passage {
    Passage {
        doc_id: doc_id.to_string(),
        title: String::new(),
        year: None,
        tags: Vec::new(),
        score: 1.0,
        text: text.to_string(),
    }
}
