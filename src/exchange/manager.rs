//! Exchange round orchestration.
//!
//! One manager exists per resource kind; the scheduler calls
//! [`ExchangeManager::execute`] once per time step, between the Tick and
//! Tock phases. A round walks six steps:
//!
//! 1. Collect request portfolios from every registered trader
//! 2. Solicit bid portfolios, one commodity at a time
//! 3. Hand each requester its preference slice for adjustment
//! 4. Translate the market into an exchange graph
//! 5. Partition the graph and solve each component
//! 6. Back-translate matches into trades and apply them
//!
//! Matches found in separate components are merged in the parent graph's
//! arc-declaration order before application, so the trade sequence is
//! reproducible no matter how the components were solved.

use super::context::ExchangeContext;
use super::graph::{Arc, Match};
use super::solver::{ExchangeSolver, GreedySolver};
use super::trader::Trade;
use super::translation::translate;
use super::ExchangeError;
use crate::core::ids::AgentId;
use crate::models::context::SimContext;
use crate::models::resource::ResourceKind;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Drives the Dynamic Resource Exchange for one resource kind.
pub struct ExchangeManager<K: ResourceKind> {
    solver: Box<dyn ExchangeSolver>,
    _kind: PhantomData<K>,
}

impl<K: ResourceKind> ExchangeManager<K> {
    /// Manager backed by the default greedy solver.
    pub fn new() -> Self {
        Self::with_solver(Box::new(GreedySolver))
    }

    /// Manager backed by a caller-supplied solver.
    pub fn with_solver(solver: Box<dyn ExchangeSolver>) -> Self {
        Self {
            solver,
            _kind: PhantomData,
        }
    }

    /// Run one full exchange round, returning the number of applied
    /// trades.
    ///
    /// An over-constrained market is not an error: a solver failure on a
    /// component simply contributes no matches. Lookup failures during
    /// translation or back-translation are fatal to the round.
    pub fn execute(&mut self, ctx: &mut SimContext, time: i32) -> Result<usize, ExchangeError> {
        let trader_ids: Vec<AgentId> = K::traders(ctx).iter().copied().collect();
        let mut ex = ExchangeContext::<K>::new();

        // STEP 1: COLLECT REQUESTS
        for &tid in &trader_ids {
            let Some(agent) = ctx.agents.get_mut(&tid) else {
                continue;
            };
            for port in K::trader_of(agent.as_mut()).request_portfolios(&ctx.ids) {
                ex.add_request_portfolio(port);
            }
        }

        // STEP 2: SOLICIT BIDS, COMMODITY BY COMMODITY
        let commodities: Vec<String> = ex.commod_requests().keys().cloned().collect();
        for commodity in &commodities {
            let requests = ex.commod_requests()[commodity].clone();
            for &tid in &trader_ids {
                let Some(agent) = ctx.agents.get_mut(&tid) else {
                    continue;
                };
                for port in
                    K::trader_of(agent.as_mut()).bid_portfolios(&ctx.ids, commodity, &requests)
                {
                    ex.add_bid_portfolio(port);
                }
            }
        }

        // STEP 3: PREFERENCE ADJUSTMENT
        // Only requesters hold preferences; after this loop they are
        // frozen for the round.
        let requesters: Vec<AgentId> = ex.requesters().iter().copied().collect();
        for tid in requesters {
            let Some(agent) = ctx.agents.get_mut(&tid) else {
                continue;
            };
            if let Some(prefs) = ex.trader_prefs_mut(tid) {
                K::trader_of(agent.as_mut()).adjust_prefs(prefs);
            }
        }

        // STEP 4: TRANSLATE
        let (mut graph, trans) = translate(&ex)?;
        if graph.arcs().is_empty() {
            tracing::debug!(
                target: "dre",
                "{} exchange at time {time}: no candidate trades",
                K::LABEL
            );
            return Ok(0);
        }

        // STEP 5: PARTITION AND SOLVE
        let arc_order: BTreeMap<Arc, usize> = graph
            .arcs()
            .iter()
            .copied()
            .enumerate()
            .map(|(i, a)| (a, i))
            .collect();

        let mut solved: Vec<Match> = Vec::new();
        for mut component in graph.partition() {
            if let Err(err) = self.solver.solve(&mut component) {
                tracing::warn!(target: "dre", "component yielded no matches: {err}");
                continue;
            }
            solved.extend_from_slice(component.matches());
        }
        solved.sort_by_key(|m| arc_order[&m.arc]);
        for m in &solved {
            graph.add_match(m.arc, m.qty);
        }

        // STEP 6: BACK-TRANSLATE AND APPLY
        let mut trades = 0usize;
        for m in graph.matches() {
            let request = trans
                .node_to_request
                .get(&m.arc.unode())
                .cloned()
                .ok_or(ExchangeError::UnmappedNode(m.arc.unode()))?;
            let bid = trans
                .node_to_bid
                .get(&m.arc.vnode())
                .cloned()
                .ok_or(ExchangeError::UnmappedBidNode(m.arc.vnode()))?;
            let trade = Trade {
                request,
                bid,
                qty: m.qty,
            };
            tracing::debug!(target: "dre", "executing {trade}");

            ctx.recorder
                .new_datum("Trades")
                .add_val("Time", time)
                .add_val("ResourceKind", K::LABEL)
                .add_val("Commodity", trade.request.commodity())
                .add_val("SupplierId", trade.bid.bidder().0)
                .add_val("RequesterId", trade.request.requester().0)
                .add_val("Quantity", trade.qty)
                .record();

            let supplier = trade.bid.bidder();
            let requester = trade.request.requester();
            if let Some(agent) = ctx.agents.get_mut(&supplier) {
                K::trader_of(agent.as_mut()).apply_trade(&trade);
            }
            if requester != supplier {
                if let Some(agent) = ctx.agents.get_mut(&requester) {
                    K::trader_of(agent.as_mut()).apply_trade(&trade);
                }
            }
            trades += 1;
        }

        tracing::debug!(
            target: "dre",
            "{} exchange at time {time}: {trades} trades applied",
            K::LABEL
        );
        Ok(trades)
    }
}

impl<K: ResourceKind> Default for ExchangeManager<K> {
    fn default() -> Self {
        Self::new()
    }
}
