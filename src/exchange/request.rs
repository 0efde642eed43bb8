//! Requests and request portfolios.
//!
//! A request portfolio is one trader's bundle of resource requests that
//! may be mutually met by suppliers. All requests in a portfolio share
//! the requester and the target quantity; the shared quantity is the
//! portfolio's demand. Take a facility that needs fuel available as two
//! commodities, fuelA and fuelB: if some combination of the two will do,
//! it requests both in one portfolio and caps the total with a
//! constraint.

use super::constraint::{CapacityConstraint, Converter};
use super::{PortfolioError, EPS};
use crate::core::ids::{AgentId, IdGen, PortfolioId, RequestId};
use crate::models::resource::Resource;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A single resource request.
///
/// Immutable once created; preference adjustments during the exchange
/// happen in the preference map, not here. The owning portfolio is
/// referenced by id to keep ownership acyclic.
#[derive(Debug)]
pub struct Request<T: Resource> {
    id: RequestId,
    target: Rc<T>,
    requester: AgentId,
    portfolio: PortfolioId,
    commodity: String,
    preference: f64,
    exclusive: bool,
}

impl<T: Resource> Request<T> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The resource this request wants.
    pub fn target(&self) -> &Rc<T> {
        &self.target
    }

    pub fn requester(&self) -> AgentId {
        self.requester
    }

    /// Id of the portfolio that owns this request.
    pub fn portfolio(&self) -> PortfolioId {
        self.portfolio
    }

    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    /// Preference relative to the portfolio's other requests; seeds the
    /// trader's preference map when bids arrive.
    pub fn preference(&self) -> f64 {
        self.preference
    }

    /// Whether this request must be met in its entirety by a single offer.
    pub fn exclusive(&self) -> bool {
        self.exclusive
    }
}

impl<T: Resource> fmt::Display for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request for {} of {} from {} with preference {}",
            self.target.quantity(),
            self.commodity,
            self.requester,
            self.preference
        )
    }
}

/// A group of possibly constrained requests from a single requester.
///
/// The first added request fixes the requester and the shared quantity;
/// later additions must agree with both. Each request starts with a
/// default mass-constraint coefficient of 1.0. Requests declared
/// mutually satisfying (any one filled satisfies the group) get their
/// coefficients renormalized by [`add_mutual_reqs`]; call
/// [`add_default_constraint`] once all requests are in to turn the
/// coefficient table into an actual capacity constraint.
///
/// [`add_mutual_reqs`]: RequestPortfolio::add_mutual_reqs
/// [`add_default_constraint`]: RequestPortfolio::add_default_constraint
#[derive(Debug)]
pub struct RequestPortfolio<T: Resource> {
    id: PortfolioId,
    requester: Option<AgentId>,
    qty: Option<f64>,
    requests: Vec<Rc<Request<T>>>,
    coeffs: BTreeMap<RequestId, f64>,
    constraints: Vec<CapacityConstraint<T>>,
}

impl<T: Resource> RequestPortfolio<T> {
    pub fn new(ids: &IdGen) -> Self {
        Self {
            id: ids.next_portfolio(),
            requester: None,
            qty: None,
            requests: Vec::new(),
            coeffs: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    /// Add a request for `target` to the portfolio.
    ///
    /// Fails when `requester` differs from the portfolio's requester or
    /// when the target quantity differs from the portfolio's shared
    /// quantity (beyond [`EPS`]).
    pub fn add_request(
        &mut self,
        target: Rc<T>,
        requester: AgentId,
        commodity: impl Into<String>,
        preference: f64,
        exclusive: bool,
        ids: &IdGen,
    ) -> Result<Rc<Request<T>>, PortfolioError> {
        match self.requester {
            None => self.requester = Some(requester),
            Some(expected) if expected != requester => {
                return Err(PortfolioError::RequesterMismatch {
                    expected,
                    got: requester,
                })
            }
            Some(_) => {}
        }

        let qty = target.quantity();
        match self.qty {
            None => self.qty = Some(qty),
            Some(expected) if (expected - qty).abs() > EPS => {
                return Err(PortfolioError::QuantityMismatch {
                    expected,
                    got: qty,
                })
            }
            Some(_) => {}
        }

        let request = Rc::new(Request {
            id: ids.next_request(),
            target,
            requester,
            portfolio: self.id,
            commodity: commodity.into(),
            preference,
            exclusive,
        });
        tracing::debug!(target: "dre", "adding {}", request);
        self.coeffs.insert(request.id(), 1.0);
        self.requests.push(Rc::clone(&request));
        Ok(request)
    }

    /// Declare `reqs` mutually satisfying: any one of them being filled
    /// satisfies the whole subset.
    ///
    /// Coefficients for the subset are renormalized to each request's
    /// quantity divided by the subset's mean quantity. May be called
    /// repeatedly with disjoint subsets; overlapping requests take the
    /// latest coefficient.
    pub fn add_mutual_reqs(&mut self, reqs: &[Rc<Request<T>>]) {
        if reqs.is_empty() {
            return;
        }
        let mean =
            reqs.iter().map(|r| r.target().quantity()).sum::<f64>() / reqs.len() as f64;
        for r in reqs {
            self.coeffs.insert(r.id(), r.target().quantity() / mean);
        }
    }

    /// Add a capacity constraint unless an equal one is already present.
    pub fn add_constraint(&mut self, constraint: CapacityConstraint<T>) {
        if !self.constraints.iter().any(|c| *c == constraint) {
            self.constraints.push(constraint);
        }
    }

    /// Add the default mass constraint built from the current coefficient
    /// table.
    ///
    /// The capacity is the portfolio's shared per-request quantity, not
    /// the sum over requests: under mutually-satisfying semantics one
    /// filled request covers the demand, so the shared quantity is the
    /// ceiling. Callers wanting an aggregate cap across independent
    /// requests should add an explicit constraint instead.
    ///
    /// # Panics
    /// If no request has been added yet (there is no quantity to cap).
    pub fn add_default_constraint(&mut self, ids: &IdGen) {
        let c = CapacityConstraint::new(
            self.qty(),
            Converter::CoeffTable(self.coeffs.clone()),
            ids,
        );
        self.add_constraint(c);
    }

    pub fn id(&self) -> PortfolioId {
        self.id
    }

    /// The requester, once the first request fixed it.
    pub fn requester(&self) -> Option<AgentId> {
        self.requester
    }

    /// The shared request quantity; 0 while the portfolio is empty.
    pub fn qty(&self) -> f64 {
        self.qty.unwrap_or(0.0)
    }

    pub fn requests(&self) -> &[Rc<Request<T>>] {
        &self.requests
    }

    /// Constraints in registration order.
    pub fn constraints(&self) -> &[CapacityConstraint<T>] {
        &self.constraints
    }

    /// Default mass-constraint coefficients by request.
    pub fn coefficients(&self) -> &BTreeMap<RequestId, f64> {
        &self.coeffs
    }
}
