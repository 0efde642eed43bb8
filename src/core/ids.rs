//! Stable identifiers and the simulation-scoped id generator.
//!
//! Every kernel object that participates in keyed lookups (agents,
//! requests, bids, portfolios, graph nodes, capacity constraints) carries
//! a small integer id. Ids are allocated by [`IdGen`], which belongs to a
//! single simulation: branching or re-running a simulation with a fresh
//! generator reproduces the exact same id sequence, which keeps every
//! ordered traversal in the kernel deterministic.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

/// Unique identifier for an agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent#{}", self.0)
    }
}

/// Unique identifier for a resource request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request#{}", self.0)
    }
}

/// Unique identifier for a bid on a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct BidId(pub u32);

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bid#{}", self.0)
    }
}

/// Unique identifier for a request or bid portfolio.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PortfolioId(pub u32);

impl fmt::Display for PortfolioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Portfolio#{}", self.0)
    }
}

/// Unique identifier for an exchange graph node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node#{}", self.0)
    }
}

/// Simulation-scoped monotonic id generator.
///
/// One `IdGen` lives in the simulation context; it is handed by shared
/// reference to whatever needs to mint an id (portfolio construction,
/// constraint construction, graph translation). Counters use interior
/// mutability so callers never need `&mut` access just to allocate.
///
/// # Example
/// ```
/// use fuelcycle_simulator_core_rs::core::ids::IdGen;
///
/// let ids = IdGen::new();
/// let a = ids.next_agent();
/// let b = ids.next_agent();
/// assert!(a < b);
/// ```
#[derive(Debug, Default)]
pub struct IdGen {
    agent: Cell<u32>,
    request: Cell<u32>,
    bid: Cell<u32>,
    portfolio: Cell<u32>,
    node: Cell<u32>,
    constraint: Cell<u32>,
}

impl IdGen {
    /// Create a generator with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_agent(&self) -> AgentId {
        AgentId(bump(&self.agent))
    }

    pub fn next_request(&self) -> RequestId {
        RequestId(bump(&self.request))
    }

    pub fn next_bid(&self) -> BidId {
        BidId(bump(&self.bid))
    }

    pub fn next_portfolio(&self) -> PortfolioId {
        PortfolioId(bump(&self.portfolio))
    }

    pub fn next_node(&self) -> NodeId {
        NodeId(bump(&self.node))
    }

    /// Next constraint id. Constraint ids double as the registration order
    /// of capacity constraints within a portfolio.
    pub fn next_constraint(&self) -> u32 {
        bump(&self.constraint)
    }
}

fn bump(cell: &Cell<u32>) -> u32 {
    let id = cell.get();
    cell.set(id + 1);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let ids = IdGen::new();
        assert_eq!(ids.next_agent(), AgentId(0));
        assert_eq!(ids.next_request(), RequestId(0));
        assert_eq!(ids.next_request(), RequestId(1));
        assert_eq!(ids.next_agent(), AgentId(1));
    }

    #[test]
    fn fresh_generators_replay_the_same_sequence() {
        let a = IdGen::new();
        let b = IdGen::new();
        for _ in 0..10 {
            assert_eq!(a.next_node(), b.next_node());
        }
    }
}
