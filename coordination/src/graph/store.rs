//! In-memory knowledge graph built once from a [`GraphSnapshot`].
//!
//! Entities live in a petgraph arena addressed by `NodeIndex`; relations are
//! parallel-capable directed edges. Two side indices avoid rescanning the
//! arena: entity name → nodes, and relation kind → edges (insertion order).

use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::{debug, warn};

use super::types::{Entity, GraphSnapshot, Relation, RelationKind, TestPrior};

/// Read-only view over one loaded snapshot.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<Entity, Relation>,
    by_name: HashMap<String, Vec<NodeIndex>>,
    by_kind: HashMap<RelationKind, Vec<EdgeIndex>>,
    test_priors: Vec<TestPrior>,
}

impl KnowledgeGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the arena and indices. Relations whose endpoints are unknown are
    /// dropped with a warning.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let GraphSnapshot {
            entities,
            relations,
            test_priors,
        } = snapshot;

        let mut graph = DiGraph::with_capacity(entities.len(), relations.len());
        let mut by_id: HashMap<i64, NodeIndex> = HashMap::with_capacity(entities.len());
        let mut by_name: HashMap<String, Vec<NodeIndex>> = HashMap::new();

        for entity in entities {
            let id = entity.id;
            let name = entity.name.clone();
            let node = graph.add_node(entity);
            by_id.insert(id, node);
            by_name.entry(name).or_default().push(node);
        }

        let mut by_kind: HashMap<RelationKind, Vec<EdgeIndex>> = HashMap::new();
        let mut dropped = 0usize;
        for relation in relations {
            let (Some(&src), Some(&dst)) = (by_id.get(&relation.src), by_id.get(&relation.dst))
            else {
                dropped += 1;
                continue;
            };
            let kind = relation.rel.clone();
            let edge = graph.add_edge(src, dst, relation);
            by_kind.entry(kind).or_default().push(edge);
        }

        if dropped > 0 {
            warn!(dropped, "Dropped relations with unknown endpoints");
        }
        debug!(
            entities = graph.node_count(),
            relations = graph.edge_count(),
            test_priors = test_priors.len(),
            "Knowledge graph built"
        );

        Self {
            graph,
            by_name,
            by_kind,
            test_priors,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Test priors in the order the store enumerated them.
    pub fn test_priors(&self) -> &[TestPrior] {
        &self.test_priors
    }

    pub fn entity(&self, node: NodeIndex) -> &Entity {
        &self.graph[node]
    }

    pub fn name_of(&self, node: NodeIndex) -> &str {
        &self.graph[node].name
    }

    /// Every node carrying `name`, regardless of entity kind.
    pub fn nodes_named(&self, name: &str) -> &[NodeIndex] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn inner(&self) -> &DiGraph<Entity, Relation> {
        &self.graph
    }

    /// `(src_name, dst_name, relation)` for every relation of `kind`, in
    /// insertion order.
    pub fn relations_of_kind<'a>(
        &'a self,
        kind: &RelationKind,
    ) -> impl Iterator<Item = (&'a str, &'a str, &'a Relation)> + 'a {
        self.by_kind
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&edge| {
                let (src, dst) = self.graph.edge_endpoints(edge)?;
                Some((self.name_of(src), self.name_of(dst), &self.graph[edge]))
            })
    }

    /// Human-readable facts around the first `max_symptoms` symptoms, as
    /// `a -[rel]-> b` lines. At most `per_symptom` lines per symptom and
    /// `total` overall.
    pub fn neighbourhood_facts(
        &self,
        symptoms: &[String],
        max_symptoms: usize,
        per_symptom: usize,
        total: usize,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for symptom in symptoms.iter().take(max_symptoms) {
            let mut connected: Vec<String> = Vec::new();
            for &node in self.nodes_named(symptom) {
                let outgoing = self
                    .graph
                    .edges_directed(node, Direction::Outgoing)
                    .map(|e| format!("{symptom} -[{}]-> {}", e.weight().rel, self.name_of(e.target())));
                let incoming = self
                    .graph
                    .edges_directed(node, Direction::Incoming)
                    .map(|e| format!("{} -[{}]-> {symptom}", self.name_of(e.source()), e.weight().rel));
                for fact in outgoing.chain(incoming) {
                    if !connected.contains(&fact) {
                        connected.push(fact);
                    }
                }
            }
            lines.extend(connected.into_iter().take(per_symptom));
        }
        lines.truncate(total);
        lines
    }
}
