//! Translation from the domain context to the exchange graph.
//!
//! Translation is two passes over the collected portfolios:
//!
//! 1. Every portfolio becomes a group carrying one aggregate capacity
//!    per constraint; every request and bid becomes a node. The mapping
//!    tables between nodes and their domain objects are recorded so a
//!    solved flow can be projected back to trades.
//! 2. Every bid becomes an arc from its request's node to its own node.
//!    Each endpoint gets one unit capacity per portfolio constraint, in
//!    registration order, and the requester's final preference for the
//!    (request, bid) pair is recorded on the request side of the arc.
//!
//! Unit capacities are per unit of flow: a constraint contributes
//! `convert(resource, arc, ctx) / resource.quantity()`, so a match of
//! `q` absolute units consumes `unit * q` of the group's aggregate
//! capacity.

use super::bid::Bid;
use super::context::ExchangeContext;
use super::graph::{Arc, ExchangeGraph, ExchangeNode, ExchangeNodeGroup, RequestGroup};
use super::request::Request;
use super::ExchangeError;
use crate::core::ids::{BidId, NodeId, RequestId};
use crate::models::resource::Resource;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Mapping tables recorded during translation.
///
/// Converters resolve nodes to requests through this; the manager uses
/// it to project solved matches back onto requests and bids.
#[derive(Debug, Default)]
pub struct TranslationContext<T: Resource> {
    pub node_to_request: BTreeMap<NodeId, Rc<Request<T>>>,
    pub request_to_node: BTreeMap<RequestId, NodeId>,
    pub node_to_bid: BTreeMap<NodeId, Rc<Bid<T>>>,
    pub bid_to_node: BTreeMap<BidId, NodeId>,
}

impl<T: Resource> TranslationContext<T> {
    fn new() -> Self {
        Self {
            node_to_request: BTreeMap::new(),
            request_to_node: BTreeMap::new(),
            node_to_bid: BTreeMap::new(),
            bid_to_node: BTreeMap::new(),
        }
    }
}

/// Build an [`ExchangeGraph`] from a gathered market.
pub fn translate<T: Resource>(
    ex: &ExchangeContext<T>,
) -> Result<(ExchangeGraph, TranslationContext<T>), ExchangeError> {
    let mut graph = ExchangeGraph::new();
    let mut trans = TranslationContext::new();

    // Pass 1: groups, nodes, mapping tables.
    for port in ex.request_portfolios() {
        let mut group = RequestGroup::new(port.qty());
        for c in port.constraints() {
            group.add_capacity(c.capacity());
        }
        let gid = graph.add_request_group(group);
        for request in port.requests() {
            let nid = graph.add_node(ExchangeNode::new(
                request.target().quantity(),
                request.exclusive(),
            ));
            graph.add_to_group(gid, nid);
            trans.node_to_request.insert(nid, Rc::clone(request));
            trans.request_to_node.insert(request.id(), nid);
        }
    }

    for port in ex.bid_portfolios() {
        let mut group = ExchangeNodeGroup::new();
        for c in port.constraints() {
            group.add_capacity(c.capacity());
        }
        let gid = graph.add_supply_group(group);
        for bid in port.bids() {
            let nid = graph.add_node(ExchangeNode::new(
                bid.offer().quantity(),
                bid.exclusive(),
            ));
            graph.add_to_group(gid, nid);
            trans.node_to_bid.insert(nid, Rc::clone(bid));
            trans.bid_to_node.insert(bid.id(), nid);
        }
    }

    // Portfolio lookup for constraint traversal in pass 2.
    let rport_by_id: BTreeMap<_, _> = ex
        .request_portfolios()
        .iter()
        .map(|p| (p.id(), p))
        .collect();
    let bport_by_id: BTreeMap<_, _> =
        ex.bid_portfolios().iter().map(|p| (p.id(), p)).collect();

    // Pass 2: arcs, unit capacities, final preferences.
    for (rid, bids) in ex.bids_by_request() {
        let unode = *trans
            .request_to_node
            .get(rid)
            .ok_or(ExchangeError::UnknownRequest(*rid))?;
        for bid in bids {
            let vnode = trans.bid_to_node[&bid.id()];
            let arc = Arc::new(unode, vnode);
            graph.add_arc(arc);

            let request = Rc::clone(&trans.node_to_request[&unode]);
            let rport = rport_by_id[&request.portfolio()];
            for c in rport.constraints() {
                let val = c.convert(request.target().as_ref(), Some(&arc), Some(&trans))?;
                push_unit(&mut graph, unode, arc, val, request.target().quantity());
            }

            let bport = bport_by_id[&bid.portfolio()];
            for c in bport.constraints() {
                let val = c.convert(bid.offer().as_ref(), Some(&arc), Some(&trans))?;
                push_unit(&mut graph, vnode, arc, val, bid.offer().quantity());
            }

            let pref = ex
                .trader_prefs()
                .get(&request.requester())
                .and_then(|m| m.get(rid))
                .and_then(|m| m.get(&bid.id()))
                .copied()
                .expect("preference seeded when the bid was registered");
            graph.node_mut(unode).prefs.insert(arc, pref);

            debug_assert_eq!(
                graph.node(unode).unit_capacities.get(&arc).map_or(0, Vec::len),
                rport.constraints().len()
            );
            debug_assert_eq!(
                graph.node(vnode).unit_capacities.get(&arc).map_or(0, Vec::len),
                bport.constraints().len()
            );
        }
    }

    Ok((graph, trans))
}

fn push_unit(graph: &mut ExchangeGraph, node: NodeId, arc: Arc, val: f64, qty: f64) {
    debug_assert!(val >= 0.0, "converters must return nonnegative costs");
    graph
        .node_mut(node)
        .unit_capacities
        .entry(arc)
        .or_default()
        .push(val / qty);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{AgentId, IdGen};
    use crate::exchange::bid::BidPortfolio;
    use crate::exchange::constraint::CapacityConstraint;
    use crate::exchange::request::RequestPortfolio;
    use crate::models::resource::Material;

    fn mat(qty: f64) -> Rc<Material> {
        Rc::new(Material::new(qty))
    }

    #[test]
    fn single_bid_translates_to_one_arc() {
        let ids = IdGen::new();

        let mut rport = RequestPortfolio::new(&ids);
        let req = rport
            .add_request(mat(10.0), AgentId(1), "fuel", 1.0, false, &ids)
            .unwrap();

        let mut bport = BidPortfolio::new(&ids);
        bport.add_constraint(CapacityConstraint::trivial(4.0, &ids));
        let bid = bport
            .add_bid(Rc::clone(&req), mat(20.0), AgentId(2), false, &ids)
            .unwrap();

        let mut ex = ExchangeContext::new();
        ex.add_request_portfolio(rport);
        ex.add_bid_portfolio(bport);

        let (graph, trans) = translate(&ex).unwrap();
        assert_eq!(graph.arcs().len(), 1);
        assert_eq!(graph.request_groups().len(), 1);
        assert_eq!(graph.supply_groups().len(), 1);
        assert_eq!(graph.supply_groups()[0].capacities(), &[4.0]);

        let arc = graph.arcs()[0];
        let unode = trans.request_to_node[&req.id()];
        let vnode = trans.bid_to_node[&bid.id()];
        assert_eq!(arc.unode(), unode);
        assert_eq!(arc.vnode(), vnode);

        // No request-side constraints: no unit capacities on u.
        assert!(graph.node(unode).unit_capacities.get(&arc).is_none());
        // Trivial converter: convert(offer) / offer.qty = 1 per unit.
        assert_eq!(graph.node(vnode).unit_capacities[&arc], vec![1.0]);
        // Preference flows from the request.
        assert_eq!(graph.node(unode).prefs[&arc], 1.0);
    }

    #[test]
    fn default_constraint_prices_by_coefficient() {
        let ids = IdGen::new();

        let mut rport = RequestPortfolio::new(&ids);
        let r1 = rport
            .add_request(mat(10.0), AgentId(1), "fuelA", 1.0, false, &ids)
            .unwrap();
        let r2 = rport
            .add_request(mat(10.0), AgentId(1), "fuelB", 1.0, false, &ids)
            .unwrap();
        rport.add_mutual_reqs(&[Rc::clone(&r1), Rc::clone(&r2)]);
        rport.add_default_constraint(&ids);

        let mut bport = BidPortfolio::new(&ids);
        bport
            .add_bid(Rc::clone(&r1), mat(10.0), AgentId(2), false, &ids)
            .unwrap();

        let mut ex = ExchangeContext::new();
        ex.add_request_portfolio(rport);
        ex.add_bid_portfolio(bport);

        let (graph, trans) = translate(&ex).unwrap();
        let arc = graph.arcs()[0];
        let unode = trans.request_to_node[&r1.id()];

        // coeff 1.0: unit capacity = (qty * coeff) / qty = 1.
        assert_eq!(graph.node(unode).unit_capacities[&arc], vec![1.0]);
        assert_eq!(graph.request_groups()[0].capacities(), &[10.0]);
        assert_eq!(graph.request_groups()[0].qty(), 10.0);
    }
}
