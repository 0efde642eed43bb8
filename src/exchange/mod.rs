//! Dynamic Resource Exchange (DRE).
//!
//! Once per time step and per resource kind, the kernel runs a matching
//! round that turns per-agent resource requests and bids into quantified
//! trades:
//!
//! 1. Collect request portfolios from traders
//! 2. Solicit bid portfolios, commodity by commodity
//! 3. Let requesters adjust their preferences
//! 4. Translate the market into a bipartite exchange graph
//! 5. Solve the graph for feasible matches
//! 6. Back-translate matches into trades and apply them
//!
//! The submodules follow that pipeline: [`request`]/[`bid`] hold the
//! portfolio layer, [`context`] aggregates the market, [`translation`]
//! builds the [`graph`], [`solver`] produces matches, and [`manager`]
//! drives the whole round.

pub mod bid;
pub mod constraint;
pub mod context;
pub mod graph;
pub mod manager;
pub mod request;
pub mod solver;
pub mod trader;
pub mod translation;

use crate::core::ids::{AgentId, NodeId, RequestId};
use thiserror::Error;

/// Tolerance for capacity and quantity comparisons.
///
/// Unit capacities and match quantities are products and quotients of
/// user-supplied reals; exact comparison would reject feasible flows that
/// differ from a bound by floating-point noise.
pub const EPS: f64 = 1e-6;

/// Portfolio insertion invariant violations.
///
/// These indicate a defective trading agent: a portfolio bundles the
/// requests (or bids) of exactly one trader, and all requests in a
/// portfolio share one target quantity.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("insertion error: requesters do not match ({expected} != {got})")]
    RequesterMismatch { expected: AgentId, got: AgentId },

    #[error("insertion error: request quantities do not match ({expected} != {got})")]
    QuantityMismatch { expected: f64, got: f64 },

    #[error("insertion error: bidders do not match ({expected} != {got})")]
    BidderMismatch { expected: AgentId, got: AgentId },
}

/// Failures inside an exchange round.
///
/// Lookup failures mean a converter or the back-translation could not
/// resolve a graph entity against the translation tables; they are fatal
/// to the round.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("converter invoked without an arc")]
    MissingArc,

    #[error("converter invoked without a translation context")]
    MissingTranslation,

    #[error("no request mapped for {0}")]
    UnmappedNode(NodeId),

    #[error("no bid mapped for {0}")]
    UnmappedBidNode(NodeId),

    #[error("no coefficient registered for {0}")]
    UnmappedRequest(RequestId),

    #[error("bid references {0}, which is not part of this exchange")]
    UnknownRequest(RequestId),

    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
}
