//! Simulation scheduler.
//!
//! The `Timer` drives the whole simulation: an integer time loop where
//! every step runs a fixed phase sequence over the registered agents:
//!
//! ```text
//! For each time step t:
//! 1. Build queued agents
//! 2. Tick listeners (ascending id)
//! 3. Resource exchange, one round per kind (Material, then Product)
//! 4. Tock listeners (ascending id)
//! 5. Decommission queued agents
//! 6. Advance time
//! ```
//!
//! All operations at step `t` complete before any at `t + 1`; within a
//! step the phases never interleave. Listeners receive the timer itself
//! and may edit the schedule mid-phase — queue builds for later steps,
//! re-schedule decommissions, request a snapshot, or kill the run — and
//! the scheduler is required to survive those edits.
//!
//! # Determinism
//!
//! Given the same `SimInfo`, agent set, and schedules, every run
//! produces the identical callback order: the listener registry and both
//! queues are ordered maps, and nothing here consults a clock or RNG.

use crate::core::ids::AgentId;
use crate::core::time::SimInfo;
use crate::exchange::manager::ExchangeManager;
use crate::exchange::ExchangeError;
use crate::models::context::SimContext;
use crate::models::resource::{Material, Product};
use crate::scheduler::snapshot::snapshot;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Scheduler and simulation errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid month0 {0}; must be between 1 and 12 (inclusive)")]
    InvalidMonth(u32),

    #[error("cannot schedule build for t={t} <= current time {now}")]
    BuildInPast { t: i32, now: i32 },

    #[error("cannot schedule decommission for t={t} < current time {now}")]
    DecomInPast { t: i32, now: i32 },

    #[error("unknown prototype: {0}")]
    UnknownPrototype(String),

    #[error("agent {id} failed: {msg}")]
    AgentFailure { id: AgentId, msg: String },

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// The time-stepped scheduler.
///
/// Owns the listener registry and the build/decommission queues; borrows
/// the [`SimContext`] for the duration of each call that touches agents.
#[derive(Debug, Default)]
pub struct Timer {
    time: i32,
    si: SimInfo,
    tickers: BTreeSet<AgentId>,
    build_queue: BTreeMap<i32, Vec<(String, Option<AgentId>)>>,
    decom_queue: BTreeMap<i32, Vec<AgentId>>,
    want_snapshot: bool,
    want_kill: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a validated configuration and move to the starting step.
    ///
    /// Fails when `m0` is outside `[1, 12]`. Honors `branch_time` when
    /// non-negative; clears any pending kill request.
    pub fn initialize(&mut self, si: SimInfo) -> Result<(), SimulationError> {
        if si.m0 < 1 || si.m0 > 12 {
            return Err(SimulationError::InvalidMonth(si.m0));
        }

        self.want_kill = false;
        self.time = if si.branch_time > -1 { si.branch_time } else { 0 };
        self.si = si;
        Ok(())
    }

    /// Current time step.
    pub fn time(&self) -> i32 {
        self.time
    }

    /// Configured simulation duration.
    pub fn dur(&self) -> i32 {
        self.si.duration
    }

    /// Register a listener for Tick/Tock notifications, keyed by id.
    pub fn register_time_listener(&mut self, id: AgentId) {
        self.tickers.insert(id);
    }

    pub fn unregister_time_listener(&mut self, id: AgentId) {
        self.tickers.remove(&id);
    }

    /// Queue a build of `prototype` for step `t`, with `parent` notified
    /// on completion.
    ///
    /// `t` must be strictly in the future: the current step's build
    /// phase has already run.
    pub fn sched_build(
        &mut self,
        parent: Option<AgentId>,
        prototype: impl Into<String>,
        t: i32,
    ) -> Result<(), SimulationError> {
        if t <= self.time {
            return Err(SimulationError::BuildInPast { t, now: self.time });
        }
        self.build_queue
            .entry(t)
            .or_default()
            .push((prototype.into(), parent));
        Ok(())
    }

    /// Queue decommissioning of `agent` at step `t` (which may be the
    /// current step; the decom phase runs last).
    ///
    /// An agent may be scheduled for decommissioning more than once.
    /// Duplicate queue entries would destroy the same agent twice, so
    /// any previous scheduling is removed first and the re-scheduling is
    /// logged as a warning.
    pub fn sched_decom(&mut self, agent: AgentId, t: i32) -> Result<(), SimulationError> {
        if t < self.time {
            return Err(SimulationError::DecomInPast { t, now: self.time });
        }

        'scan: for queued in self.decom_queue.values_mut() {
            for i in 0..queued.len() {
                if queued[i] == agent {
                    tracing::warn!("scheduled over previous decommissioning of {agent}");
                    queued.remove(i);
                    break 'scan;
                }
            }
        }

        self.decom_queue.entry(t).or_default().push(agent);
        Ok(())
    }

    /// Ask for a snapshot at the start of the next step.
    pub fn request_snapshot(&mut self) {
        self.want_snapshot = true;
    }

    /// Ask the run to stop at the end of the current step.
    pub fn kill_sim(&mut self) {
        self.want_kill = true;
    }

    /// Clear listeners, queues, and configuration.
    pub fn reset(&mut self) {
        self.tickers.clear();
        self.build_queue.clear();
        self.decom_queue.clear();
        self.si = SimInfo::default();
    }

    /// Run the main loop until the configured duration is reached or the
    /// run is killed.
    ///
    /// Always records a terminal `Finish { EarlyTerm, EndTime }` row and
    /// a final snapshot. A phase error records
    /// `Finish(EarlyTerm = true)` before propagating.
    pub fn run_sim(&mut self, ctx: &mut SimContext) -> Result<(), SimulationError> {
        tracing::info!(
            "simulation set to run from start=0 to end={}",
            self.si.duration
        );

        let mut matl_manager = ExchangeManager::<Material>::new();
        let mut genrsrc_manager = ExchangeManager::<Product>::new();

        while self.time < self.si.duration {
            tracing::debug!("current time: {}", self.time);

            if self.want_snapshot {
                self.want_snapshot = false;
                snapshot(ctx, self.time)?;
            }

            if let Err(err) = self.step(ctx, &mut matl_manager, &mut genrsrc_manager) {
                ctx.new_datum("Finish")
                    .add_val("EarlyTerm", true)
                    .add_val("EndTime", self.time)
                    .record();
                let _ = snapshot(ctx, self.time);
                return Err(err);
            }

            self.time += 1;

            if self.want_kill {
                break;
            }
        }

        ctx.new_datum("Finish")
            .add_val("EarlyTerm", self.want_kill)
            .add_val("EndTime", self.time - 1)
            .record();

        // Always snapshot at the end of every simulation.
        snapshot(ctx, self.time - 1)
    }

    fn step(
        &mut self,
        ctx: &mut SimContext,
        matl_manager: &mut ExchangeManager<Material>,
        genrsrc_manager: &mut ExchangeManager<Product>,
    ) -> Result<(), SimulationError> {
        self.do_build(ctx)?;
        tracing::debug!("beginning tick for time: {}", self.time);
        self.do_tick(ctx)?;
        tracing::debug!("beginning resource exchange for time: {}", self.time);
        self.do_res_ex(ctx, matl_manager, genrsrc_manager)?;
        tracing::debug!("beginning tock for time: {}", self.time);
        self.do_tock(ctx)?;
        self.do_decom(ctx);
        Ok(())
    }

    /// Build agents queued for the current step and wire them into the
    /// listener registry.
    fn do_build(&mut self, ctx: &mut SimContext) -> Result<(), SimulationError> {
        let build_list = self.build_queue.remove(&self.time).unwrap_or_default();
        for (prototype, parent) in build_list {
            tracing::debug!("building a {prototype} from parent {parent:?}");
            let child = ctx.create_agent(&prototype)?;
            if let Some(agent) = ctx.agents.get_mut(&child) {
                agent.build(parent);
            }
            self.register_time_listener(child);
            match parent {
                Some(pid) => {
                    if let Some(p) = ctx.agents.get_mut(&pid) {
                        p.build_notify(child);
                    }
                }
                None => tracing::debug!("built an agent without a parent"),
            }
        }
        Ok(())
    }

    fn do_tick(&mut self, ctx: &mut SimContext) -> Result<(), SimulationError> {
        for id in self.listener_ids() {
            if let Some(agent) = ctx.agents.get_mut(&id) {
                agent.tick(self)?;
            }
        }
        Ok(())
    }

    fn do_res_ex(
        &mut self,
        ctx: &mut SimContext,
        matl_manager: &mut ExchangeManager<Material>,
        genrsrc_manager: &mut ExchangeManager<Product>,
    ) -> Result<(), SimulationError> {
        matl_manager.execute(ctx, self.time)?;
        genrsrc_manager.execute(ctx, self.time)?;
        Ok(())
    }

    fn do_tock(&mut self, ctx: &mut SimContext) -> Result<(), SimulationError> {
        for id in self.listener_ids() {
            if let Some(agent) = ctx.agents.get_mut(&id) {
                agent.tock(self)?;
            }
        }
        Ok(())
    }

    /// Decommission agents queued for the current step and drop them
    /// from every registry.
    fn do_decom(&mut self, ctx: &mut SimContext) {
        let decom_list = self.decom_queue.remove(&self.time).unwrap_or_default();
        for id in decom_list {
            let parent = ctx.agents.get(&id).and_then(|a| a.parent());
            if let Some(pid) = parent {
                if let Some(p) = ctx.agents.get_mut(&pid) {
                    p.decom_notify(id);
                }
            }
            if let Some(mut agent) = ctx.remove_agent(id) {
                agent.decommission();
            }
            self.unregister_time_listener(id);
        }
    }

    /// Snapshot of the registry so listeners can (un)register mid-phase.
    fn listener_ids(&self) -> Vec<AgentId> {
        self.tickers.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_validates_month() {
        let mut timer = Timer::new();
        let mut si = SimInfo::new(5);
        si.m0 = 0;
        assert_eq!(
            timer.initialize(si).unwrap_err(),
            SimulationError::InvalidMonth(0)
        );

        let mut si = SimInfo::new(5);
        si.m0 = 12;
        assert!(timer.initialize(si).is_ok());
    }

    #[test]
    fn initialize_honors_branch_time() {
        let mut timer = Timer::new();
        timer.initialize(SimInfo::branched(10, 4)).unwrap();
        assert_eq!(timer.time(), 4);

        timer.initialize(SimInfo::new(10)).unwrap();
        assert_eq!(timer.time(), 0);
    }

    #[test]
    fn builds_cannot_target_the_current_step() {
        let mut timer = Timer::new();
        timer.initialize(SimInfo::new(10)).unwrap();
        assert_eq!(
            timer.sched_build(None, "Reactor", 0).unwrap_err(),
            SimulationError::BuildInPast { t: 0, now: 0 }
        );
        assert!(timer.sched_build(None, "Reactor", 1).is_ok());
    }

    #[test]
    fn decommissions_may_target_the_current_step() {
        let mut timer = Timer::new();
        timer.initialize(SimInfo::new(10)).unwrap();
        assert!(timer.sched_decom(AgentId(1), 0).is_ok());
        assert_eq!(
            timer.sched_decom(AgentId(2), -1).unwrap_err(),
            SimulationError::DecomInPast { t: -1, now: 0 }
        );
    }

    #[test]
    fn rescheduled_decom_replaces_the_previous_entry() {
        let mut timer = Timer::new();
        timer.initialize(SimInfo::new(10)).unwrap();
        timer.sched_decom(AgentId(1), 5).unwrap();
        timer.sched_decom(AgentId(1), 7).unwrap();

        assert!(timer.decom_queue.get(&5).map_or(true, |q| q.is_empty()));
        assert_eq!(timer.decom_queue[&7], vec![AgentId(1)]);
    }

    #[test]
    fn reset_clears_schedules_and_config() {
        let mut timer = Timer::new();
        timer.initialize(SimInfo::new(10)).unwrap();
        timer.register_time_listener(AgentId(1));
        timer.sched_build(None, "Reactor", 3).unwrap();
        timer.sched_decom(AgentId(1), 3).unwrap();

        timer.reset();
        assert!(timer.tickers.is_empty());
        assert!(timer.build_queue.is_empty());
        assert!(timer.decom_queue.is_empty());
        assert_eq!(timer.dur(), 0);
    }
}
