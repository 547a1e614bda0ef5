//! Pending-set resolution: which endpoints are safe to process now.

use crate::graph::ExecutionPlan;
use crate::model::Endpoint;
use std::collections::HashSet;

/// Endpoints that are not completed and whose prerequisites all are, in plan
/// order. Linear in the number of edges.
pub fn pending(plan: &ExecutionPlan) -> Vec<&Endpoint> {
    let blocked: HashSet<usize> = plan
        .edges()
        .iter()
        .filter(|edge| !plan.is_completed(edge.from))
        .map(|edge| edge.to)
        .collect();

    plan.endpoints()
        .iter()
        .filter(|endpoint| !endpoint.is_completed() && !blocked.contains(&endpoint.id))
        .collect()
}

pub fn pending_ids(plan: &ExecutionPlan) -> Vec<usize> {
    pending(plan).into_iter().map(|endpoint| endpoint.id).collect()
}

pub fn is_ready(plan: &ExecutionPlan, id: usize) -> bool {
    match plan.get(id) {
        Some(endpoint) if !endpoint.is_completed() => plan
            .prerequisites_of(id)
            .into_iter()
            .all(|prerequisite| plan.is_completed(prerequisite)),
        _ => false,
    }
}
