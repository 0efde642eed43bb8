//! Simulation context: the kernel's ownership hub.
//!
//! The context owns everything that outlives a single phase: the agent
//! registry, the prototype factories agents are built from, the per-kind
//! trader registries, the id generator, and the datum recorder. The
//! scheduler and the exchange managers borrow through it; agents
//! themselves never hold references to one another, only ids.

use crate::core::ids::{AgentId, IdGen};
use crate::events::{DatumBuilder, Recorder};
use crate::models::agent::Agent;
use crate::models::resource::ResourceKind;
use crate::scheduler::engine::SimulationError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Factory producing a fresh agent for a prototype name. The kernel
/// supplies the new agent's id.
pub type PrototypeFn = Box<dyn Fn(AgentId) -> Box<dyn Agent>>;

/// Owned kernel state shared by the scheduler and the exchange.
#[derive(Default)]
pub struct SimContext {
    pub(crate) agents: BTreeMap<AgentId, Box<dyn Agent>>,
    pub(crate) prototypes: BTreeMap<String, PrototypeFn>,
    pub(crate) material_traders: BTreeSet<AgentId>,
    pub(crate) product_traders: BTreeSet<AgentId>,
    pub(crate) ids: IdGen,
    pub(crate) recorder: Recorder,
}

impl SimContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The simulation's id generator.
    pub fn ids(&self) -> &IdGen {
        &self.ids
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Register a factory for `prototype`, used by scheduled builds.
    pub fn register_prototype(&mut self, prototype: impl Into<String>, factory: PrototypeFn) {
        self.prototypes.insert(prototype.into(), factory);
    }

    /// Instantiate `prototype` with a fresh id and take ownership of the
    /// new agent. Lifecycle notifications are the scheduler's job.
    pub fn create_agent(&mut self, prototype: &str) -> Result<AgentId, SimulationError> {
        let factory = self
            .prototypes
            .get(prototype)
            .ok_or_else(|| SimulationError::UnknownPrototype(prototype.to_string()))?;
        let id = self.ids.next_agent();
        let agent = factory(id);
        debug_assert_eq!(agent.id(), id, "factory must adopt the assigned id");
        self.agents.insert(id, agent);
        Ok(id)
    }

    /// Take ownership of an externally constructed agent, keyed by its
    /// own id.
    ///
    /// # Panics
    /// If an agent with the same id is already registered.
    pub fn add_agent(&mut self, agent: Box<dyn Agent>) -> AgentId {
        let id = agent.id();
        let prev = self.agents.insert(id, agent);
        assert!(prev.is_none(), "duplicate agent id {id}");
        id
    }

    /// Remove an agent, dropping its trader registrations with it.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Box<dyn Agent>> {
        self.material_traders.remove(&id);
        self.product_traders.remove(&id);
        self.agents.remove(&id)
    }

    pub fn agent(&self, id: AgentId) -> Option<&dyn Agent> {
        self.agents.get(&id).map(|a| a.as_ref())
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut (dyn Agent + 'static)> {
        self.agents.get_mut(&id).map(|a| a.as_mut())
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    /// All live agent ids, ascending.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    // ------------------------------------------------------------------
    // Traders
    // ------------------------------------------------------------------

    /// Register `id` as a trader of resource kind `K`.
    pub fn register_trader<K: ResourceKind>(&mut self, id: AgentId) {
        K::traders_mut(self).insert(id);
    }

    /// Remove `id` from the trader registry of kind `K`.
    pub fn unregister_trader<K: ResourceKind>(&mut self, id: AgentId) {
        K::traders_mut(self).remove(&id);
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Start a new output row for `table`.
    pub fn new_datum(&mut self, table: &str) -> DatumBuilder<'_> {
        self.recorder.new_datum(table)
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }
}

impl fmt::Debug for SimContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimContext")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .field("prototypes", &self.prototypes.keys().collect::<Vec<_>>())
            .field("material_traders", &self.material_traders)
            .field("product_traders", &self.product_traders)
            .field("recorded_rows", &self.recorder.len())
            .finish()
    }
}
