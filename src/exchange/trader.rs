//! Trader-side exchange callbacks.

use super::bid::{Bid, BidPortfolio};
use super::context::PrefMap;
use super::request::{Request, RequestPortfolio};
use crate::core::ids::IdGen;
use crate::models::resource::Resource;
use std::fmt;
use std::rc::Rc;

/// A quantified commitment between one request and one bid, produced by
/// back-translating a solved match.
#[derive(Debug)]
pub struct Trade<T: Resource> {
    pub request: Rc<Request<T>>,
    pub bid: Rc<Bid<T>>,
    pub qty: f64,
}

impl<T: Resource> Clone for Trade<T> {
    fn clone(&self) -> Self {
        Self {
            request: Rc::clone(&self.request),
            bid: Rc::clone(&self.bid),
            qty: self.qty,
        }
    }
}

impl<T: Resource> fmt::Display for Trade<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trade of {} {} from {} to {}",
            self.qty,
            self.request.commodity(),
            self.bid.bidder(),
            self.request.requester()
        )
    }
}

/// Exchange participation callbacks for one resource kind.
///
/// Every method defaults to "not participating", so an agent implements
/// only the sides and kinds it actually trades. The id generator handed
/// to the gathering callbacks is the simulation's own, keeping ids
/// deterministic across runs.
pub trait Trader<T: Resource> {
    /// Portfolios of resource requests for this round.
    fn request_portfolios(&mut self, _ids: &IdGen) -> Vec<RequestPortfolio<T>> {
        Vec::new()
    }

    /// Portfolios of bids against `requests`, all of which ask for
    /// `commodity`.
    fn bid_portfolios(
        &mut self,
        _ids: &IdGen,
        _commodity: &str,
        _requests: &[Rc<Request<T>>],
    ) -> Vec<BidPortfolio<T>> {
        Vec::new()
    }

    /// Adjust own preferences in place before the market is translated.
    /// After this returns, preferences are frozen for the round.
    fn adjust_prefs(&mut self, _prefs: &mut PrefMap) {}

    /// Accept one side of an executed trade. Suppliers are notified
    /// before requesters.
    fn apply_trade(&mut self, _trade: &Trade<T>) {}
}
