//! End-to-end exchange round tests through the full manager:
//! request collection, bid solicitation, preference adjustment,
//! translation, solve, and trade application.

use fuelcycle_simulator_core_rs::{
    Agent, AgentId, BidPortfolio, CapacityConstraint, ExchangeManager, IdGen, Material, PrefMap,
    Request, RequestPortfolio, SimContext, TimeListener, Trade, Trader, Value, EPS,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Applied-trade log shared between a test agent and the test body:
/// (commodity, quantity) per `apply_trade` call.
type TradeLog = Rc<RefCell<Vec<(String, f64)>>>;

/// What a test agent does on the material market.
enum Role {
    /// One portfolio of requests, one per (commodity, preference) entry,
    /// all sharing `qty`.
    Requester {
        requests: Vec<(String, f64)>,
        qty: f64,
        mutual: bool,
        default_constraint: bool,
    },
    /// Bids `offer` on every request for `commodity`, optionally under a
    /// trivial-converter capacity.
    Supplier {
        commodity: String,
        offer: f64,
        capacity: Option<f64>,
        exclusive: bool,
    },
    /// Requester that bumps its preference for the highest bid id.
    PickyRequester { commodity: String, qty: f64 },
}

struct TestAgent {
    id: AgentId,
    role: Role,
    log: TradeLog,
}

impl TestAgent {
    fn new(id: AgentId, role: Role) -> (Box<Self>, TradeLog) {
        let log: TradeLog = Rc::new(RefCell::new(Vec::new()));
        (
            Box::new(Self {
                id,
                role,
                log: Rc::clone(&log),
            }),
            log,
        )
    }
}

impl TimeListener for TestAgent {
    fn id(&self) -> AgentId {
        self.id
    }
}

impl Trader<Material> for TestAgent {
    fn request_portfolios(&mut self, ids: &IdGen) -> Vec<RequestPortfolio<Material>> {
        let (requests, qty, mutual, default_constraint) = match &self.role {
            Role::Requester {
                requests,
                qty,
                mutual,
                default_constraint,
            } => (requests.clone(), *qty, *mutual, *default_constraint),
            Role::PickyRequester { commodity, qty } => {
                (vec![(commodity.clone(), 1.0)], *qty, false, false)
            }
            Role::Supplier { .. } => return Vec::new(),
        };

        let mut port = RequestPortfolio::new(ids);
        let mut added = Vec::new();
        for (commodity, pref) in &requests {
            let r = port
                .add_request(
                    Rc::new(Material::new(qty)),
                    self.id,
                    commodity.clone(),
                    *pref,
                    false,
                    ids,
                )
                .unwrap();
            added.push(r);
        }
        if mutual {
            port.add_mutual_reqs(&added);
        }
        if default_constraint {
            port.add_default_constraint(ids);
        }
        vec![port]
    }

    fn bid_portfolios(
        &mut self,
        ids: &IdGen,
        commodity: &str,
        requests: &[Rc<Request<Material>>],
    ) -> Vec<BidPortfolio<Material>> {
        let Role::Supplier {
            commodity: own,
            offer,
            capacity,
            exclusive,
        } = &self.role
        else {
            return Vec::new();
        };
        if own != commodity {
            return Vec::new();
        }

        let mut port = BidPortfolio::new(ids);
        for request in requests {
            port.add_bid(
                Rc::clone(request),
                Rc::new(Material::new(*offer)),
                self.id,
                *exclusive,
                ids,
            )
            .unwrap();
        }
        if let Some(cap) = capacity {
            port.add_constraint(CapacityConstraint::trivial(*cap, ids));
        }
        vec![port]
    }

    fn adjust_prefs(&mut self, prefs: &mut PrefMap) {
        if matches!(self.role, Role::PickyRequester { .. }) {
            for bids in prefs.values_mut() {
                if let Some((&best, _)) = bids.iter().next_back() {
                    bids.insert(best, 10.0);
                }
            }
        }
    }

    fn apply_trade(&mut self, trade: &Trade<Material>) {
        self.log
            .borrow_mut()
            .push((trade.request.commodity().to_string(), trade.qty));
    }
}

impl Trader<fuelcycle_simulator_core_rs::Product> for TestAgent {}

impl Agent for TestAgent {
    fn prototype(&self) -> &str {
        "TestAgent"
    }

    fn parent(&self) -> Option<AgentId> {
        None
    }
}

/// Register `role` as a new material trader; returns (id, trade log).
fn spawn(ctx: &mut SimContext, role: Role) -> (AgentId, TradeLog) {
    let id = ctx.ids().next_agent();
    let (agent, log) = TestAgent::new(id, role);
    ctx.add_agent(agent);
    ctx.register_trader::<Material>(id);
    (id, log)
}

fn requester(commodity: &str, qty: f64) -> Role {
    Role::Requester {
        requests: vec![(commodity.to_string(), 1.0)],
        qty,
        mutual: false,
        default_constraint: false,
    }
}

fn supplier(commodity: &str, offer: f64, capacity: Option<f64>) -> Role {
    Role::Supplier {
        commodity: commodity.to_string(),
        offer,
        capacity,
        exclusive: false,
    }
}

fn trade_quantities(ctx: &SimContext) -> Vec<f64> {
    ctx.recorder()
        .rows_for_table("Trades")
        .iter()
        .map(|row| match row.get("Quantity") {
            Some(Value::Double(q)) => *q,
            other => panic!("missing quantity field: {other:?}"),
        })
        .collect()
}

#[test]
fn test_empty_market_yields_no_trades() {
    let mut ctx = SimContext::new();
    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();
    assert_eq!(trades, 0);
    assert!(ctx.recorder().rows_for_table("Trades").is_empty());
}

#[test]
fn test_single_arc_trades_at_demand() {
    let mut ctx = SimContext::new();
    let (_, req_log) = spawn(&mut ctx, requester("fuel", 10.0));
    let (_, sup_log) = spawn(&mut ctx, supplier("fuel", 20.0, None));

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();

    assert_eq!(trades, 1);
    assert_eq!(trade_quantities(&ctx), vec![10.0]);
    // Both sides saw the same trade.
    assert_eq!(&*req_log.borrow(), &[("fuel".to_string(), 10.0)]);
    assert_eq!(&*sup_log.borrow(), &[("fuel".to_string(), 10.0)]);
}

#[test]
fn test_capped_supply_limits_the_match() {
    let mut ctx = SimContext::new();
    spawn(&mut ctx, requester("fuel", 10.0));
    spawn(&mut ctx, supplier("fuel", 20.0, Some(4.0)));

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();

    assert_eq!(trades, 1);
    assert_eq!(trade_quantities(&ctx), vec![4.0]);
}

#[test]
fn test_mutual_requests_fill_once() {
    let mut ctx = SimContext::new();
    let (_, req_log) = spawn(
        &mut ctx,
        Role::Requester {
            requests: vec![("fuelA".to_string(), 1.0), ("fuelB".to_string(), 1.0)],
            qty: 10.0,
            mutual: true,
            default_constraint: true,
        },
    );
    // Supplier covers only fuelA; the mutual group is satisfied by it.
    spawn(&mut ctx, supplier("fuelA", 10.0, None));

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();

    assert_eq!(trades, 1);
    assert_eq!(trade_quantities(&ctx), vec![10.0]);
    assert_eq!(&*req_log.borrow(), &[("fuelA".to_string(), 10.0)]);
}

#[test]
fn test_mutual_requests_share_the_default_cap() {
    // Suppliers on both commodities: the shared default constraint
    // (capacity = the portfolio quantity) keeps total fills at 10.
    let mut ctx = SimContext::new();
    spawn(
        &mut ctx,
        Role::Requester {
            requests: vec![("fuelA".to_string(), 1.0), ("fuelB".to_string(), 1.0)],
            qty: 10.0,
            mutual: true,
            default_constraint: true,
        },
    );
    spawn(&mut ctx, supplier("fuelA", 10.0, None));
    spawn(&mut ctx, supplier("fuelB", 10.0, None));

    ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();

    let total: f64 = trade_quantities(&ctx).iter().sum();
    assert!((total - 10.0).abs() < EPS, "total filled {total}");
}

#[test]
fn test_exclusive_bid_is_all_or_nothing() {
    // Offer exceeds demand: an exclusive bid cannot partially fill.
    let mut ctx = SimContext::new();
    spawn(&mut ctx, requester("fuel", 10.0));
    spawn(
        &mut ctx,
        Role::Supplier {
            commodity: "fuel".to_string(),
            offer: 15.0,
            capacity: None,
            exclusive: true,
        },
    );

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();
    assert_eq!(trades, 0);

    // Exact-fit exclusive offer trades in full.
    let mut ctx = SimContext::new();
    spawn(&mut ctx, requester("fuel", 10.0));
    spawn(
        &mut ctx,
        Role::Supplier {
            commodity: "fuel".to_string(),
            offer: 10.0,
            capacity: None,
            exclusive: true,
        },
    );

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();
    assert_eq!(trades, 1);
    assert_eq!(trade_quantities(&ctx), vec![10.0]);
}

#[test]
fn test_preference_adjustment_steers_allocation() {
    let mut ctx = SimContext::new();
    spawn(
        &mut ctx,
        Role::PickyRequester {
            commodity: "fuel".to_string(),
            qty: 10.0,
        },
    );
    let (first, _) = spawn(&mut ctx, supplier("fuel", 6.0, None));
    let (favored, _) = spawn(&mut ctx, supplier("fuel", 6.0, None));

    ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();

    // The favored supplier is served first by the solver and sells its
    // full 6; the other tops up the remaining 4. Recorded rows follow
    // arc declaration order, so check quantities by supplier.
    let rows = ctx.recorder().rows_for_table("Trades");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("SupplierId"), Some(&Value::Int(first.0 as i64)));
    assert_eq!(rows[0].get("Quantity"), Some(&Value::Double(4.0)));
    assert_eq!(rows[1].get("SupplierId"), Some(&Value::Int(favored.0 as i64)));
    assert_eq!(rows[1].get("Quantity"), Some(&Value::Double(6.0)));
}

#[test]
fn test_disjoint_markets_solve_independently() {
    // Two unrelated commodity pairs: the graph partitions into two
    // components and both trade.
    let mut ctx = SimContext::new();
    let (_, log_a) = spawn(&mut ctx, requester("fuelA", 5.0));
    let (_, log_b) = spawn(&mut ctx, requester("fuelB", 7.0));
    spawn(&mut ctx, supplier("fuelA", 5.0, None));
    spawn(&mut ctx, supplier("fuelB", 9.0, None));

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 3)
        .unwrap();

    assert_eq!(trades, 2);
    assert_eq!(&*log_a.borrow(), &[("fuelA".to_string(), 5.0)]);
    assert_eq!(&*log_b.borrow(), &[("fuelB".to_string(), 7.0)]);

    // Trade rows carry the round's time step.
    for row in ctx.recorder().rows_for_table("Trades") {
        assert_eq!(row.get("Time"), Some(&Value::Int(3)));
        assert_eq!(row.get("ResourceKind"), Some(&Value::Text("Material".to_string())));
    }
}

#[test]
fn test_unregistered_trader_does_not_participate() {
    let mut ctx = SimContext::new();
    spawn(&mut ctx, requester("fuel", 10.0));

    // Construct a supplier but do not register it as a material trader.
    let id = ctx.ids().next_agent();
    let (agent, _) = TestAgent::new(id, supplier("fuel", 20.0, None));
    ctx.add_agent(agent);

    let trades = ExchangeManager::<Material>::new()
        .execute(&mut ctx, 0)
        .unwrap();
    assert_eq!(trades, 0);
}
