use crate::error::{Result, TmError};
use crate::model::{DataAsset, Element, Flow};
use crate::registry::{ModelConfig, ModelSnapshot};
use crate::types::ElementKind;
use serde::Serialize;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Graph types
// ---------------------------------------------------------------------------

/// An element plus its resolved boundary parent (index into `nodes`).
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

/// A dataflow with resolved endpoint indices. `pair` links both halves of a
/// request/response pair; `is_response` marks the answering half.
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub flow: Flow,
    pub source: usize,
    pub dest: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair: Option<usize>,
    pub is_response: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<usize>,
}

/// A data asset with every reference resolved to node/edge indices.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedData {
    pub asset: DataAsset,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created_at: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transformed_at: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stored_at: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traverses: Vec<usize>,
}

/// Fully resolved directed graph for one model. Node and edge order equals
/// registration order; iteration is never hash-derived, so output is stable
/// across runs.
#[derive(Debug, Clone, Serialize)]
pub struct ModelGraph {
    pub config: ModelConfig,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub data: Vec<ResolvedData>,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

impl ModelGraph {
    pub fn build(snapshot: &ModelSnapshot) -> Result<ModelGraph> {
        let by_name: HashMap<&str, usize> = snapshot
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), i))
            .collect();

        // 1. Boundary tree
        let mut nodes = Vec::with_capacity(snapshot.elements.len());
        for element in &snapshot.elements {
            let parent = match &element.in_boundary {
                None => None,
                Some(boundary) => {
                    let idx = *by_name.get(boundary.as_str()).ok_or_else(|| {
                        TmError::UnresolvedReference {
                            element: element.name.clone(),
                            reference: boundary.clone(),
                        }
                    })?;
                    if snapshot.elements[idx].kind != ElementKind::Boundary {
                        return Err(TmError::NotABoundary {
                            element: element.name.clone(),
                            reference: boundary.clone(),
                        });
                    }
                    Some(idx)
                }
            };
            nodes.push(Node {
                element: element.clone(),
                parent,
            });
        }
        detect_boundary_cycles(&nodes)?;

        // 2. Edges
        let data_by_name: HashMap<&str, usize> = snapshot
            .data
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();
        let mut edges = Vec::with_capacity(snapshot.flows.len());
        for flow in &snapshot.flows {
            let resolve = |name: &str| -> Result<usize> {
                by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| TmError::UnresolvedReference {
                        element: flow.name.clone(),
                        reference: name.to_string(),
                    })
            };
            let source = resolve(&flow.source)?;
            let dest = resolve(&flow.dest)?;
            let mut data = Vec::with_capacity(flow.data.len());
            for name in &flow.data {
                let idx = data_by_name.get(name.as_str()).copied().ok_or_else(|| {
                    TmError::UnresolvedReference {
                        element: flow.name.clone(),
                        reference: name.clone(),
                    }
                })?;
                data.push(idx);
            }
            if let Some(ceiling) = flow.max_classification {
                for &idx in &data {
                    let asset = &snapshot.data[idx];
                    if asset.classification > ceiling {
                        return Err(TmError::FlowClassificationViolation {
                            data: asset.name.clone(),
                            flow: flow.name.clone(),
                            classification: asset.classification,
                            ceiling,
                        });
                    }
                }
            }
            edges.push(Edge {
                flow: flow.clone(),
                source,
                dest,
                pair: None,
                is_response: false,
                data,
            });
        }

        // 3. Request/response pairing
        // Edges are pushed in flow registration order, so flow indices are
        // edge indices.
        let edge_by_name: HashMap<&str, usize> = snapshot
            .flows
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.as_str(), i))
            .collect();
        for i in 0..edges.len() {
            let Some(request_name) = edges[i].flow.response_to.clone() else {
                continue;
            };
            let req = *edge_by_name.get(request_name.as_str()).ok_or_else(|| {
                TmError::UnresolvedReference {
                    element: edges[i].flow.name.clone(),
                    reference: request_name.clone(),
                }
            })?;
            if edges[req].source != edges[i].dest || edges[req].dest != edges[i].source {
                return Err(TmError::AsymmetricResponse {
                    request: request_name,
                    response: edges[i].flow.name.clone(),
                });
            }
            // Pairing is one-to-one; a request cannot have two responses.
            if edges[req].pair.is_some() {
                return Err(TmError::DuplicateResponse {
                    request: request_name,
                    response: edges[i].flow.name.clone(),
                });
            }
            edges[i].pair = Some(req);
            edges[i].is_response = true;
            edges[req].pair = Some(i);
        }

        // 4. Data references, classification ceilings, traverse paths
        let mut data = Vec::with_capacity(snapshot.data.len());
        for asset in &snapshot.data {
            let resolve_elements = |names: &[String]| -> Result<Vec<usize>> {
                names
                    .iter()
                    .map(|name| {
                        by_name.get(name.as_str()).copied().ok_or_else(|| {
                            TmError::UnresolvedReference {
                                element: asset.name.clone(),
                                reference: name.clone(),
                            }
                        })
                    })
                    .collect()
            };
            let created_at = resolve_elements(&asset.created_at)?;
            let transformed_at = resolve_elements(&asset.transformed_at)?;
            let stored_at = resolve_elements(&asset.stored_at)?;

            for &idx in &stored_at {
                let store = nodes[idx].element.store.as_ref().ok_or_else(|| {
                    TmError::NotADatastore {
                        data: asset.name.clone(),
                        element: nodes[idx].element.name.clone(),
                    }
                })?;
                if asset.classification > store.max_classification {
                    return Err(TmError::ClassificationViolation {
                        data: asset.name.clone(),
                        datastore: nodes[idx].element.name.clone(),
                        classification: asset.classification,
                        ceiling: store.max_classification,
                    });
                }
            }

            let traverses: Vec<usize> = asset
                .traverses
                .iter()
                .map(|name| {
                    edge_by_name.get(name.as_str()).copied().ok_or_else(|| {
                        TmError::UnresolvedReference {
                            element: asset.name.clone(),
                            reference: name.clone(),
                        }
                    })
                })
                .collect::<Result<_>>()?;
            for &idx in &traverses {
                if let Some(ceiling) = edges[idx].flow.max_classification {
                    if asset.classification > ceiling {
                        return Err(TmError::FlowClassificationViolation {
                            data: asset.name.clone(),
                            flow: edges[idx].flow.name.clone(),
                            classification: asset.classification,
                            ceiling,
                        });
                    }
                }
            }
            for pair in traverses.windows(2) {
                if edges[pair[0]].dest != edges[pair[1]].source {
                    return Err(TmError::BrokenTraversePath {
                        data: asset.name.clone(),
                        from: edges[pair[0]].flow.name.clone(),
                        to: edges[pair[1]].flow.name.clone(),
                    });
                }
            }

            data.push(ResolvedData {
                asset: asset.clone(),
                created_at,
                transformed_at,
                stored_at,
                traverses,
            });
        }

        Ok(ModelGraph {
            config: snapshot.config.clone(),
            nodes,
            edges,
            data,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node_named(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.element.name == name)
    }

    /// Ancestor boundary indices of a node, innermost first.
    pub fn boundary_chain(&self, idx: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cur = self.nodes[idx].parent;
        while let Some(p) = cur {
            // Cycles were rejected at build time; cap the walk anyway.
            if chain.len() > self.nodes.len() {
                break;
            }
            chain.push(p);
            cur = self.nodes[p].parent;
        }
        chain
    }

    /// A flow crosses a trust boundary when its endpoints sit in different
    /// immediate boundaries.
    pub fn crosses_boundary(&self, edge: &Edge) -> bool {
        self.nodes[edge.source].parent != self.nodes[edge.dest].parent
    }

    pub fn edges_from(&self, node: usize) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == node)
    }

    pub fn edges_to(&self, node: usize) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.dest == node)
    }

    /// Nodes whose immediate boundary is `boundary`.
    pub fn members_of(&self, boundary: usize) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(move |n| n.parent == Some(boundary))
    }

    /// Canonical key for a request/response pair: the lower edge index.
    pub fn pair_key(&self, edge_idx: usize) -> Option<usize> {
        self.edges[edge_idx]
            .pair
            .map(|other| edge_idx.min(other))
    }
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

fn detect_boundary_cycles(nodes: &[Node]) -> Result<()> {
    // Iterative DFS over parent pointers with a three-color visiting set.
    const NEW: u8 = 0;
    const VISITING: u8 = 1;
    const DONE: u8 = 2;
    let mut color = vec![NEW; nodes.len()];
    for start in 0..nodes.len() {
        if color[start] != NEW {
            continue;
        }
        let mut walked = Vec::new();
        let mut cur = Some(start);
        while let Some(idx) = cur {
            match color[idx] {
                DONE => break,
                VISITING => {
                    return Err(TmError::CyclicBoundary(nodes[idx].element.name.clone()));
                }
                _ => {
                    color[idx] = VISITING;
                    walked.push(idx);
                    cur = nodes[idx].parent;
                }
            }
        }
        for idx in walked {
            color[idx] = DONE;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
