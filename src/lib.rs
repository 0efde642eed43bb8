//! Fuel Cycle Simulator Core - Rust Engine
//!
//! Simulation kernel for a discrete-time agent-based fuel-cycle
//! simulator with deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Identifiers and time configuration
//! - **models**: Domain types (resources, agent interfaces, context)
//! - **events**: Datum recording (the persistence sink)
//! - **exchange**: Dynamic Resource Exchange (portfolios, graph, solver)
//! - **scheduler**: Main simulation loop and snapshots
//!
//! # Critical Invariants
//!
//! 1. Phase order within a step is fixed: Build, Tick, Exchange, Tock,
//!    Decom
//! 2. All keyed iteration is ordered; identical inputs replay identical
//!    callback and trade sequences
//! 3. Capacity residuals never go negative: every match is validated at
//!    the graph boundary

// Module declarations
pub mod core;
pub mod events;
pub mod exchange;
pub mod models;
pub mod scheduler;

// Re-exports for convenience
pub use crate::core::ids::{AgentId, BidId, IdGen, NodeId, PortfolioId, RequestId};
pub use crate::core::time::SimInfo;
pub use events::{Datum, DatumBuilder, Recorder, Value};
pub use exchange::{
    bid::{Bid, BidPortfolio},
    constraint::{CapacityConstraint, Converter, ConverterFn},
    context::{ExchangeContext, PrefMap},
    graph::{Arc, ExchangeGraph, ExchangeNode, ExchangeNodeGroup, GroupId, Match, RequestGroup},
    manager::ExchangeManager,
    request::{Request, RequestPortfolio},
    solver::{ExchangeSolver, GreedySolver},
    trader::{Trade, Trader},
    translation::{translate, TranslationContext},
    ExchangeError, PortfolioError, EPS,
};
pub use models::{
    agent::{Agent, TimeListener},
    context::{PrototypeFn, SimContext},
    resource::{Material, Product, Resource, ResourceKind},
};
pub use scheduler::{snapshot, SimSnapshot, SimulationError, Timer};
