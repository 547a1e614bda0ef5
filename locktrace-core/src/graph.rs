//! Dependency graph construction.
//!
//! Scores each endpoint's difficulty, infers prerequisite edges between every
//! ordered pair of endpoints and freezes the result into an [`ExecutionPlan`].
//! Edges are inserted into a petgraph `DiGraph` in rule priority order and any
//! edge that would close a cycle is rejected, so the plan is always a DAG.

use crate::model::{Endpoint, EndpointKind, Outcome};
use petgraph::algo::{DfsSpace, has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Header names that mark a request as carrying credentials.
pub const AUTH_HEADERS: [&str; 4] = ["authorization", "cookie", "x-auth-token", "x-api-key"];

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;

/// Difficulty contributed by the HTTP method alone.
pub fn method_weight(method: &str) -> u8 {
    match method {
        "GET" => 1,
        "POST" => 3,
        "PUT" | "PATCH" => 4,
        "DELETE" => 5,
        _ => 0,
    }
}

/// Scores how risky an endpoint is to process, from 1 (easy) to 10.
pub fn score_difficulty(endpoint: &Endpoint) -> u8 {
    let mut difficulty: u8 = 1;

    difficulty += method_weight(&endpoint.method);

    if endpoint.has_auth_header() {
        difficulty += 2;
    }

    if let Some(ref body) = endpoint.body
        && body.is_structured()
        && body.top_level_fields() > 5
    {
        difficulty += 2;
    }

    if has_numeric_api_segment(&endpoint.path()) {
        difficulty += 1;
    }

    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

fn has_numeric_api_segment(path: &str) -> bool {
    match path.find("/api/") {
        Some(idx) => path[idx + "/api/".len()..]
            .split('/')
            .any(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeReason {
    Authentication,
    ResourcePrefix,
    Temporal,
}

impl EdgeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeReason::Authentication => "authentication",
            EdgeReason::ResourcePrefix => "resource_prefix",
            EdgeReason::Temporal => "temporal",
        }
    }
}

/// `from` must be completed before `to` can be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: usize,
    pub to: usize,
    pub reason: EdgeReason,
}

/// Returns the rule that makes `a` a prerequisite of `b`, if any.
///
/// Rules are checked in priority order and only the first match counts:
/// authentication endpoints first, then reads before writes on the same
/// resource, then capture order.
pub fn infer_edge(a: &Endpoint, b: &Endpoint) -> Option<EdgeReason> {
    if a.id == b.id {
        return None;
    }

    // Between two auth endpoints, capture order decides which goes first
    if a.is_authentication() && (!b.is_authentication() || captured_before(a, b)) {
        return Some(EdgeReason::Authentication);
    }

    if a.is_get() && !b.is_get() && shares_resource(a, b) {
        return Some(EdgeReason::ResourcePrefix);
    }

    match (a.captured_at, b.captured_at) {
        (Some(ta), Some(tb)) if ta < tb => Some(EdgeReason::Temporal),
        _ => None,
    }
}

fn captured_before(a: &Endpoint, b: &Endpoint) -> bool {
    match (a.captured_at, b.captured_at) {
        (Some(ta), Some(tb)) if ta != tb => ta < tb,
        _ => a.id < b.id,
    }
}

/// True when `b`'s parent path is a non-empty segment-wise prefix of `a`'s
/// path, e.g. GET `/api/users/7` and DELETE `/api/users/7/avatar`'s parent
/// `/api/users/7`.
fn shares_resource(a: &Endpoint, b: &Endpoint) -> bool {
    let mut parent = b.path_segments();
    if parent.pop().is_none() || parent.is_empty() {
        return false;
    }
    let a_segments = a.path_segments();
    a_segments.len() >= parent.len() && a_segments[..parent.len()] == parent[..]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStatistics {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub edges: usize,
    pub average_difficulty: f64,
}

/// Endpoints that share a method and path pattern, such as polling calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarGroup {
    pub pattern: String,
    pub endpoint_ids: Vec<usize>,
}

/// Endpoints sorted by ascending difficulty plus the inferred edges.
///
/// Built once from a frozen endpoint list. Only completion state changes
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    endpoints: Vec<Endpoint>,
    edges: Vec<DependencyEdge>,
    positions: HashMap<usize, usize>,
}

impl ExecutionPlan {
    pub fn build(mut endpoints: Vec<Endpoint>) -> Self {
        for endpoint in endpoints.iter_mut() {
            let difficulty = score_difficulty(endpoint);
            endpoint.assign_difficulty(difficulty);
        }

        let edges = infer_edges(&endpoints);

        // Stable: ties keep capture order
        endpoints.sort_by_key(|e| e.difficulty());

        let positions = endpoints
            .iter()
            .enumerate()
            .map(|(position, endpoint)| (endpoint.id, position))
            .collect();

        info!(
            "Built execution plan: {} endpoints, {} edges",
            endpoints.len(),
            edges.len()
        );

        Self {
            endpoints,
            edges,
            positions,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Endpoint> {
        self.positions.get(&id).map(|&pos| &self.endpoints[pos])
    }

    pub fn is_completed(&self, id: usize) -> bool {
        self.get(id).is_some_and(Endpoint::is_completed)
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    pub fn prerequisites_of(&self, id: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from)
            .collect()
    }

    pub fn dependents_of(&self, id: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect()
    }

    /// Records an outcome for `id`. Idempotent: only the first call on an
    /// endpoint has any effect. Returns whether the state changed.
    pub fn mark_completed(&mut self, id: usize, outcome: Outcome) -> bool {
        match self.positions.get(&id) {
            Some(&pos) => {
                let changed = self.endpoints[pos].complete(outcome);
                if changed {
                    debug!("Marked endpoint {} completed", id);
                }
                changed
            }
            None => false,
        }
    }

    /// Endpoint ids in an order that satisfies every edge.
    pub fn topological_order(&self) -> Vec<usize> {
        let (graph, _) = self.to_graph();
        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|idx| graph[idx]).collect(),
            // Unreachable for plans built by `build`, which rejects cycles
            Err(_) => self.endpoints.iter().map(|e| e.id).collect(),
        }
    }

    /// Picks the endpoint that best represents the stated goal.
    ///
    /// The first endpoint (in plan order) whose URL contains any goal word
    /// longer than three characters wins; otherwise the most difficult one.
    pub fn select_master(&self, goal: &str) -> Option<&Endpoint> {
        let tokens: Vec<String> = goal
            .split_whitespace()
            .filter(|word| word.chars().count() > 3)
            .map(str::to_lowercase)
            .collect();

        if let Some(endpoint) = self.endpoints.iter().find(|endpoint| {
            let url = endpoint.url.to_lowercase();
            tokens.iter().any(|token| url.contains(token.as_str()))
        }) {
            return Some(endpoint);
        }

        self.endpoints.iter().fold(None, |best: Option<&Endpoint>, current| match best {
            Some(b) if b.difficulty() >= current.difficulty() => Some(b),
            _ => Some(current),
        })
    }

    pub fn statistics(&self) -> PlanStatistics {
        let total = self.endpoints.len();
        let completed = self.endpoints.iter().filter(|e| e.is_completed()).count();
        let failed = self
            .endpoints
            .iter()
            .filter(|e| e.outcome().is_some_and(Outcome::is_failed))
            .count();
        let average_difficulty = if total == 0 {
            0.0
        } else {
            self.endpoints
                .iter()
                .map(|e| f64::from(e.difficulty()))
                .sum::<f64>()
                / total as f64
        };

        PlanStatistics {
            total,
            completed,
            failed,
            pending: total - completed,
            edges: self.edges.len(),
            average_difficulty,
        }
    }

    /// Number of endpoints that deal with authentication, by URL or headers.
    pub fn security_endpoint_count(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|e| e.kind() == EndpointKind::Authentication || e.has_auth_header())
            .count()
    }

    pub fn similar_groups(&self) -> Vec<SimilarGroup> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for endpoint in &self.endpoints {
            let key = format!("{} {}", endpoint.method, endpoint.path_pattern());
            groups.entry(key).or_default().push(endpoint.id);
        }

        groups
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(pattern, mut endpoint_ids)| {
                endpoint_ids.sort_unstable();
                SimilarGroup {
                    pattern,
                    endpoint_ids,
                }
            })
            .collect()
    }

    fn to_graph(&self) -> (DiGraph<usize, EdgeReason>, HashMap<usize, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for endpoint in &self.endpoints {
            nodes.insert(endpoint.id, graph.add_node(endpoint.id));
        }
        for edge in &self.edges {
            graph.add_edge(nodes[&edge.from], nodes[&edge.to], edge.reason);
        }
        (graph, nodes)
    }
}

/// Evaluates every ordered pair and inserts the surviving edges in rule
/// priority order, dropping any edge that would create a cycle.
fn infer_edges(endpoints: &[Endpoint]) -> Vec<DependencyEdge> {
    let mut candidates = Vec::new();
    for a in endpoints {
        for b in endpoints {
            if let Some(reason) = infer_edge(a, b) {
                candidates.push(DependencyEdge {
                    from: a.id,
                    to: b.id,
                    reason,
                });
            }
        }
    }
    // Stable: within a rule, pair evaluation order is kept
    candidates.sort_by_key(|edge| edge.reason);

    let mut graph: DiGraph<usize, EdgeReason> = DiGraph::new();
    let nodes: HashMap<usize, NodeIndex> = endpoints
        .iter()
        .map(|e| (e.id, graph.add_node(e.id)))
        .collect();
    let mut space = DfsSpace::new(&graph);

    let mut edges = Vec::with_capacity(candidates.len());
    for edge in candidates {
        let (from, to) = (nodes[&edge.from], nodes[&edge.to]);
        if has_path_connecting(&graph, to, from, Some(&mut space)) {
            debug!(
                "Rejected {} edge {} -> {}: would create a cycle",
                edge.reason.as_str(),
                edge.from,
                edge.to
            );
            continue;
        }
        graph.add_edge(from, to, edge.reason);
        edges.push(edge);
    }

    edges
}
