//! Market-wide aggregation for one exchange round.
//!
//! The exchange context collects every portfolio submitted for a single
//! resource kind and re-indexes the contents for the three gathering
//! phases of the round: request collection, commodity-indexed bid
//! solicitation, and per-trader preference adjustment.

use super::bid::{Bid, BidPortfolio};
use super::request::{Request, RequestPortfolio};
use crate::core::ids::{AgentId, BidId, RequestId};
use crate::models::resource::Resource;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// One trader's preferences: request → bid → preference value.
pub type PrefMap = BTreeMap<RequestId, BTreeMap<BidId, f64>>;

/// Requests, bids, and derived indexes for one resource kind's round.
#[derive(Debug, Default)]
pub struct ExchangeContext<T: Resource> {
    requests: Vec<RequestPortfolio<T>>,
    bids: Vec<BidPortfolio<T>>,
    requesters: BTreeSet<AgentId>,
    bidders: BTreeSet<AgentId>,
    commod_requests: BTreeMap<String, Vec<Rc<Request<T>>>>,
    bids_by_request: BTreeMap<RequestId, Vec<Rc<Bid<T>>>>,
    trader_prefs: BTreeMap<AgentId, PrefMap>,
}

impl<T: Resource> ExchangeContext<T> {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            bids: Vec::new(),
            requesters: BTreeSet::new(),
            bidders: BTreeSet::new(),
            commod_requests: BTreeMap::new(),
            bids_by_request: BTreeMap::new(),
            trader_prefs: BTreeMap::new(),
        }
    }

    /// Deposit a request portfolio, indexing each request by commodity
    /// and recording its requester.
    pub fn add_request_portfolio(&mut self, port: RequestPortfolio<T>) {
        for request in port.requests() {
            self.add_request(Rc::clone(request));
        }
        self.requests.push(port);
    }

    fn add_request(&mut self, request: Rc<Request<T>>) {
        self.requesters.insert(request.requester());
        self.commod_requests
            .entry(request.commodity().to_string())
            .or_default()
            .push(request);
    }

    /// Deposit a bid portfolio, indexing each bid by its request and
    /// seeding the requester's preference for the (request, bid) pair
    /// from the request's declared preference.
    pub fn add_bid_portfolio(&mut self, port: BidPortfolio<T>) {
        for bid in port.bids() {
            self.add_bid(Rc::clone(bid));
        }
        self.bids.push(port);
    }

    fn add_bid(&mut self, bid: Rc<Bid<T>>) {
        let request = bid.request();
        self.bidders.insert(bid.bidder());
        self.trader_prefs
            .entry(request.requester())
            .or_default()
            .entry(request.id())
            .or_default()
            .insert(bid.id(), request.preference());
        tracing::debug!(target: "dre", "connecting {} with {}", request, bid);
        self.bids_by_request
            .entry(request.id())
            .or_default()
            .push(bid);
    }

    pub fn request_portfolios(&self) -> &[RequestPortfolio<T>] {
        &self.requests
    }

    pub fn bid_portfolios(&self) -> &[BidPortfolio<T>] {
        &self.bids
    }

    /// Traders with at least one request in this round.
    pub fn requesters(&self) -> &BTreeSet<AgentId> {
        &self.requesters
    }

    /// Traders with at least one bid in this round.
    pub fn bidders(&self) -> &BTreeSet<AgentId> {
        &self.bidders
    }

    /// Requests grouped by commodity.
    pub fn commod_requests(&self) -> &BTreeMap<String, Vec<Rc<Request<T>>>> {
        &self.commod_requests
    }

    /// Bids grouped by the request they respond to.
    pub fn bids_by_request(&self) -> &BTreeMap<RequestId, Vec<Rc<Bid<T>>>> {
        &self.bids_by_request
    }

    /// All traders' preferences.
    pub fn trader_prefs(&self) -> &BTreeMap<AgentId, PrefMap> {
        &self.trader_prefs
    }

    /// Mutable access to one trader's preferences, for the adjustment
    /// phase. Returns `None` for traders with no requests bid on.
    pub fn trader_prefs_mut(&mut self, trader: AgentId) -> Option<&mut PrefMap> {
        self.trader_prefs.get_mut(&trader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::IdGen;
    use crate::models::resource::Material;

    fn mat(qty: f64) -> Rc<Material> {
        Rc::new(Material::new(qty))
    }

    #[test]
    fn request_portfolio_is_indexed_by_commodity() {
        let ids = IdGen::new();
        let mut port = RequestPortfolio::new(&ids);
        port.add_request(mat(10.0), AgentId(1), "fuelA", 1.0, false, &ids)
            .unwrap();
        port.add_request(mat(10.0), AgentId(1), "fuelB", 2.0, false, &ids)
            .unwrap();

        let mut ex = ExchangeContext::new();
        ex.add_request_portfolio(port);

        assert!(ex.requesters().contains(&AgentId(1)));
        assert_eq!(ex.commod_requests()["fuelA"].len(), 1);
        assert_eq!(ex.commod_requests()["fuelB"].len(), 1);
    }

    #[test]
    fn bids_seed_trader_preferences() {
        let ids = IdGen::new();
        let mut rport = RequestPortfolio::new(&ids);
        let req = rport
            .add_request(mat(10.0), AgentId(1), "fuel", 2.5, false, &ids)
            .unwrap();

        let mut bport = BidPortfolio::new(&ids);
        let bid = bport
            .add_bid(Rc::clone(&req), mat(20.0), AgentId(2), false, &ids)
            .unwrap();

        let mut ex = ExchangeContext::new();
        ex.add_request_portfolio(rport);
        ex.add_bid_portfolio(bport);

        assert!(ex.bidders().contains(&AgentId(2)));
        assert_eq!(ex.bids_by_request()[&req.id()].len(), 1);
        assert_eq!(ex.trader_prefs()[&AgentId(1)][&req.id()][&bid.id()], 2.5);
    }
}
