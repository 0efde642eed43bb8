//! Solver seam and the default greedy solver.
//!
//! The kernel treats the flow optimizer as a collaborator behind
//! [`ExchangeSolver`]: it receives a translated graph and appends
//! matches that respect every residual capacity. The [`GreedySolver`]
//! here is the deterministic default; a host may swap in a proper
//! optimization backend without touching the rest of the round.

use super::graph::{Arc, ExchangeGraph};
use super::{ExchangeError, EPS};
use std::cmp::Ordering;

/// A matching backend for one translated graph.
pub trait ExchangeSolver {
    /// Append matches to `graph`. Every match must respect the residual
    /// capacities the graph tracks; an over-constrained market is not an
    /// error, it simply yields fewer (or no) matches.
    fn solve(&mut self, graph: &mut ExchangeGraph) -> Result<(), ExchangeError>;
}

/// Preference-greedy allocation.
///
/// Request groups are served in declaration order. Within a group, arcs
/// are tried in descending preference (ties broken by arc order), each
/// taking the largest quantity the residual capacities and the group's
/// remaining demand allow. Exclusive endpoints are all-or-nothing: the
/// arc either moves the full exclusive quantity or nothing.
///
/// The same inputs always produce the same matches; there is no
/// randomness and no iteration over unordered containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySolver;

impl ExchangeSolver for GreedySolver {
    fn solve(&mut self, graph: &mut ExchangeGraph) -> Result<(), ExchangeError> {
        for gi in 0..graph.request_groups().len() {
            let mut candidates: Vec<(Arc, f64)> = Vec::new();
            for &nid in graph.request_groups()[gi].nodes() {
                for &arc in graph.arcs_for(nid) {
                    if arc.unode() != nid {
                        continue;
                    }
                    let pref = graph.node(nid).prefs.get(&arc).copied().unwrap_or(0.0);
                    candidates.push((arc, pref));
                }
            }
            candidates.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });

            for (arc, _) in candidates {
                let demand = graph.request_groups()[gi].qty();
                if demand <= EPS {
                    break;
                }
                let capacity = graph.arc_capacity(arc);
                let Some(amount) = allocation(graph, arc, capacity, demand) else {
                    continue;
                };
                if amount > EPS {
                    graph.add_match(arc, amount);
                }
            }
        }
        Ok(())
    }
}

/// Quantity to move on `arc`, or `None` when the arc cannot be used.
fn allocation(graph: &ExchangeGraph, arc: Arc, capacity: f64, demand: f64) -> Option<f64> {
    let u = graph.node(arc.unode());
    let v = graph.node(arc.vnode());

    if u.exclusive || v.exclusive {
        // All-or-nothing at the exclusive quantity.
        if u.exclusive && v.exclusive && (u.qty - v.qty).abs() > EPS {
            return None;
        }
        let want = if u.exclusive { u.qty } else { v.qty };
        if want > capacity + EPS || want > demand + EPS {
            return None;
        }
        return Some(want.min(capacity));
    }

    Some(capacity.min(demand))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::graph::{ExchangeNode, ExchangeNodeGroup, RequestGroup};

    /// One request node (qty 10) wired to two suppliers (qty 6 each),
    /// preferring the second.
    fn two_supplier_graph() -> (ExchangeGraph, Arc, Arc) {
        let mut g = ExchangeGraph::new();
        let u = g.add_node(ExchangeNode::new(10.0, false));
        let v1 = g.add_node(ExchangeNode::new(6.0, false));
        let v2 = g.add_node(ExchangeNode::new(6.0, false));

        let rg = g.add_request_group(RequestGroup::new(10.0));
        g.add_to_group(rg, u);
        let s1 = g.add_supply_group(ExchangeNodeGroup::new());
        g.add_to_group(s1, v1);
        let s2 = g.add_supply_group(ExchangeNodeGroup::new());
        g.add_to_group(s2, v2);

        let a1 = Arc::new(u, v1);
        let a2 = Arc::new(u, v2);
        g.add_arc(a1);
        g.add_arc(a2);
        g.node_mut(u).prefs.insert(a1, 1.0);
        g.node_mut(u).prefs.insert(a2, 2.0);
        (g, a1, a2)
    }

    #[test]
    fn higher_preference_is_served_first() {
        let (mut g, a1, a2) = two_supplier_graph();
        GreedySolver.solve(&mut g).unwrap();

        // a2 (pref 2) takes its full 6, a1 tops up the remaining 4.
        assert_eq!(g.matches().len(), 2);
        assert_eq!(g.matches()[0].arc, a2);
        assert!((g.matches()[0].qty - 6.0).abs() < EPS);
        assert_eq!(g.matches()[1].arc, a1);
        assert!((g.matches()[1].qty - 4.0).abs() < EPS);
    }

    #[test]
    fn demand_stops_allocation() {
        let (mut g, _, _) = two_supplier_graph();
        GreedySolver.solve(&mut g).unwrap();
        let total: f64 = g.matches().iter().map(|m| m.qty).sum();
        assert!((total - 10.0).abs() < EPS);
        assert!(g.request_groups()[0].qty().abs() < EPS);
    }

    #[test]
    fn exclusive_supplier_is_all_or_nothing() {
        let mut g = ExchangeGraph::new();
        let u = g.add_node(ExchangeNode::new(10.0, false));
        // Offers 15 exclusively; demand is only 10, so it cannot match.
        let v = g.add_node(ExchangeNode::new(15.0, true));

        let rg = g.add_request_group(RequestGroup::new(10.0));
        g.add_to_group(rg, u);
        let sg = g.add_supply_group(ExchangeNodeGroup::new());
        g.add_to_group(sg, v);

        let a = Arc::new(u, v);
        g.add_arc(a);
        g.node_mut(u).prefs.insert(a, 1.0);

        GreedySolver.solve(&mut g).unwrap();
        assert!(g.matches().is_empty());
    }
}
