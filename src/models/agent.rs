//! Agent-facing kernel interfaces.
//!
//! Agents are black boxes to the kernel: the scheduler drives them
//! through [`TimeListener`] during the Tick and Tock phases, and through
//! the lifecycle half of [`Agent`] when they are built or
//! decommissioned. Exchange participation comes from the `Trader`
//! supertraits, one per built-in resource kind.

use crate::core::ids::AgentId;
use crate::exchange::trader::Trader;
use crate::models::resource::{Material, Product};
use crate::scheduler::engine::{SimulationError, Timer};

/// Per-step notifications bracketing the exchange.
///
/// Listeners are traversed in ascending id order during both phases. The
/// scheduler handle allows mid-phase scheduling edits (builds,
/// decommissions, snapshot requests, killing the run). An error from
/// either callback terminates the simulation.
pub trait TimeListener {
    /// Stable id; also the listener's registry key and traversal rank.
    fn id(&self) -> AgentId;

    /// Called before the exchange rounds of each time step.
    fn tick(&mut self, _timer: &mut Timer) -> Result<(), SimulationError> {
        Ok(())
    }

    /// Called after the exchange rounds of each time step.
    fn tock(&mut self, _timer: &mut Timer) -> Result<(), SimulationError> {
        Ok(())
    }
}

/// Full agent surface: time notifications, trading facets, lifecycle.
///
/// Lifecycle calls arrive in a fixed order: `build(parent)` on the new
/// agent, then `build_notify(child)` on its parent; at decommission,
/// `decom_notify(child)` on the parent, then `decommission()` on the
/// agent itself, after which the kernel drops it.
pub trait Agent: TimeListener + Trader<Material> + Trader<Product> {
    /// Prototype name this agent was instantiated from.
    fn prototype(&self) -> &str;

    /// The current parent, if any.
    fn parent(&self) -> Option<AgentId>;

    fn build(&mut self, _parent: Option<AgentId>) {}

    fn build_notify(&mut self, _child: AgentId) {}

    fn decommission(&mut self) {}

    fn decom_notify(&mut self, _child: AgentId) {}
}
