//! Bids and bid portfolios.

use super::constraint::CapacityConstraint;
use super::request::Request;
use super::PortfolioError;
use crate::core::ids::{AgentId, BidId, IdGen, PortfolioId};
use crate::models::resource::Resource;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// An offer of a resource against a specific request.
///
/// The referenced request stays live through the exchange round (it is
/// shared, not borrowed). The owning portfolio is referenced by id.
#[derive(Debug)]
pub struct Bid<T: Resource> {
    id: BidId,
    request: Rc<Request<T>>,
    offer: Rc<T>,
    bidder: AgentId,
    portfolio: PortfolioId,
    exclusive: bool,
}

impl<T: Resource> Bid<T> {
    pub fn id(&self) -> BidId {
        self.id
    }

    /// The request this bid responds to.
    pub fn request(&self) -> &Rc<Request<T>> {
        &self.request
    }

    /// The resource being offered.
    pub fn offer(&self) -> &Rc<T> {
        &self.offer
    }

    pub fn bidder(&self) -> AgentId {
        self.bidder
    }

    /// Id of the portfolio that owns this bid.
    pub fn portfolio(&self) -> PortfolioId {
        self.portfolio
    }

    /// Whether the offer is all-or-nothing.
    pub fn exclusive(&self) -> bool {
        self.exclusive
    }
}

impl<T: Resource> fmt::Display for Bid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bid for {} of {} from {}",
            self.offer.quantity(),
            self.request.commodity(),
            self.bidder
        )
    }
}

/// A single bidder's set of bids plus shared capacity constraints.
///
/// Unlike requests, bids carry no shared-quantity invariant; the only
/// insertion rule is that all bids come from the same bidder. The
/// portfolio tracks which commodities its bids cover.
#[derive(Debug)]
pub struct BidPortfolio<T: Resource> {
    id: PortfolioId,
    bidder: Option<AgentId>,
    bids: Vec<Rc<Bid<T>>>,
    constraints: Vec<CapacityConstraint<T>>,
    commodities: BTreeSet<String>,
}

impl<T: Resource> BidPortfolio<T> {
    pub fn new(ids: &IdGen) -> Self {
        Self {
            id: ids.next_portfolio(),
            bidder: None,
            bids: Vec::new(),
            constraints: Vec::new(),
            commodities: BTreeSet::new(),
        }
    }

    /// Offer `offer` against `request`.
    ///
    /// Fails when `bidder` differs from the portfolio's bidder.
    pub fn add_bid(
        &mut self,
        request: Rc<Request<T>>,
        offer: Rc<T>,
        bidder: AgentId,
        exclusive: bool,
        ids: &IdGen,
    ) -> Result<Rc<Bid<T>>, PortfolioError> {
        match self.bidder {
            None => self.bidder = Some(bidder),
            Some(expected) if expected != bidder => {
                return Err(PortfolioError::BidderMismatch {
                    expected,
                    got: bidder,
                })
            }
            Some(_) => {}
        }

        self.commodities.insert(request.commodity().to_string());
        let bid = Rc::new(Bid {
            id: ids.next_bid(),
            request,
            offer,
            bidder,
            portfolio: self.id,
            exclusive,
        });
        tracing::debug!(target: "dre", "adding {}", bid);
        self.bids.push(Rc::clone(&bid));
        Ok(bid)
    }

    /// Add a capacity constraint unless an equal one is already present.
    pub fn add_constraint(&mut self, constraint: CapacityConstraint<T>) {
        if !self.constraints.iter().any(|c| *c == constraint) {
            self.constraints.push(constraint);
        }
    }

    pub fn id(&self) -> PortfolioId {
        self.id
    }

    /// The bidder, once the first bid fixed it.
    pub fn bidder(&self) -> Option<AgentId> {
        self.bidder
    }

    pub fn bids(&self) -> &[Rc<Bid<T>>] {
        &self.bids
    }

    /// Constraints in registration order.
    pub fn constraints(&self) -> &[CapacityConstraint<T>] {
        &self.constraints
    }

    /// Commodities covered by this portfolio's bids.
    pub fn commodities(&self) -> &BTreeSet<String> {
        &self.commodities
    }
}
