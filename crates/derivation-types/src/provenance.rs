// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Provenance Graph
// ─────────────────────────────────────────────────────────────────────
//! Arena-backed dependency DAG. Nodes live in a `Vec` and refer to each
//! other by index; a node may only depend on nodes that already exist,
//! so the graph is acyclic by construction and serialises as a list.

use serde::{Deserialize, Serialize};

use crate::error::{DerivationError, DerivationResult};
use crate::phase::Phase;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Constant,
    Parameter,
    Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceNode {
    pub id: NodeId,
    /// Key of the value inside its stage's produced map.
    pub label: String,
    pub kind: NodeKind,
    pub stage: Phase,
    pub depends_on: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceGraph {
    nodes: Vec<ProvenanceNode>,
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Fails on any dependency that is not an existing node.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        kind: NodeKind,
        stage: Phase,
        depends_on: Vec<NodeId>,
    ) -> DerivationResult<NodeId> {
        let id = self.nodes.len();
        if let Some(&dependency) = depends_on.iter().find(|&&d| d >= id) {
            return Err(DerivationError::ForwardReference {
                node: id,
                dependency,
            });
        }
        self.nodes.push(ProvenanceNode {
            id,
            label: label.into(),
            kind,
            stage,
            depends_on,
        });
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&ProvenanceNode> {
        self.nodes.get(id)
    }

    /// Id of the first node with `label`.
    pub fn find(&self, label: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.label == label)
    }

    pub fn nodes(&self) -> &[ProvenanceNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node created at or after `len`. Used to roll back a
    /// stage that failed after registering some of its nodes.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    /// All transitive dependencies of `id`, ascending.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self
            .get(id)
            .map(|n| n.depends_on.clone())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if next < seen.len() && !seen[next] {
                seen[next] = true;
                stack.extend(self.nodes[next].depends_on.iter().copied());
            }
        }
        seen.iter()
            .enumerate()
            .filter_map(|(i, &s)| s.then_some(i))
            .collect()
    }
}
