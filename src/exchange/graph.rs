//! Bipartite exchange graph.
//!
//! The graph is the ground truth the solver works against: request nodes
//! on one side, supply nodes on the other, arcs for every candidate
//! trade. Nodes belong to groups (one group per portfolio) carrying the
//! aggregate capacities of that portfolio's constraints; each node holds,
//! per incident arc, one unit capacity per constraint, in constraint
//! registration order.
//!
//! Capacities held by groups and nodes are residuals: recording a match
//! consumes them, so the graph can validate every match against what is
//! actually left. Graphs are ephemeral to one exchange round.
//!
//! # Determinism
//!
//! - Nodes live in a `BTreeMap` arena keyed by ascending `NodeId`
//! - Arcs keep declaration order; `node_arc_map` lists are append-only
//! - `partition` orders components by their smallest member node

use super::EPS;
use crate::core::ids::NodeId;
use std::collections::BTreeMap;

// ============================================================================
// Arc
// ============================================================================

/// A candidate trade link between one request node and one supply node.
///
/// Identity is structural: two arcs are the same arc iff they join the
/// same pair of nodes. The u-side is always the request side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Arc {
    unode: NodeId,
    vnode: NodeId,
}

impl Arc {
    pub fn new(unode: NodeId, vnode: NodeId) -> Self {
        Self { unode, vnode }
    }

    /// Request-side endpoint.
    pub fn unode(&self) -> NodeId {
        self.unode
    }

    /// Supply-side endpoint.
    pub fn vnode(&self) -> NodeId {
        self.vnode
    }
}

/// A quantified commitment on an arc, produced by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub arc: Arc,
    pub qty: f64,
}

// ============================================================================
// Nodes and groups
// ============================================================================

/// Handle to a group inside one graph.
///
/// Request and supply groups live in separate sequences, so the handle
/// carries the side along with the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupId {
    Request(usize),
    Supply(usize),
}

/// One graph node per request or per bid.
///
/// `qty` is the remaining quantity the node can move (request target or
/// bid offer); `exclusive` marks all-or-nothing participation.
/// `unit_capacities[arc]` holds one per-unit cost against each group
/// capacity, in constraint registration order; `prefs[arc]` is the final
/// preference the solver reads as the arc's value (kept on the request
/// side).
#[derive(Debug, Clone, Default)]
pub struct ExchangeNode {
    pub qty: f64,
    pub exclusive: bool,
    pub group: Option<GroupId>,
    pub unit_capacities: BTreeMap<Arc, Vec<f64>>,
    pub prefs: BTreeMap<Arc, f64>,
}

impl ExchangeNode {
    pub fn new(qty: f64, exclusive: bool) -> Self {
        Self {
            qty,
            exclusive,
            ..Self::default()
        }
    }
}

/// A portfolio's footprint in the graph: its nodes plus one aggregate
/// capacity per constraint. Capacities are residuals.
#[derive(Debug, Clone, Default)]
pub struct ExchangeNodeGroup {
    nodes: Vec<NodeId>,
    capacities: Vec<f64>,
}

impl ExchangeNodeGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn capacities(&self) -> &[f64] {
        &self.capacities
    }

    /// Append an aggregate capacity, in constraint registration order.
    pub fn add_capacity(&mut self, cap: f64) {
        self.capacities.push(cap);
    }
}

/// A request-side group additionally carries the portfolio's total
/// demand, shared by all of its requests. Demand is a residual.
#[derive(Debug, Clone, Default)]
pub struct RequestGroup {
    qty: f64,
    group: ExchangeNodeGroup,
}

impl RequestGroup {
    pub fn new(qty: f64) -> Self {
        Self {
            qty,
            group: ExchangeNodeGroup::new(),
        }
    }

    /// Remaining unmet demand of the portfolio.
    pub fn qty(&self) -> f64 {
        self.qty
    }

    pub fn nodes(&self) -> &[NodeId] {
        self.group.nodes()
    }

    pub fn capacities(&self) -> &[f64] {
        self.group.capacities()
    }

    pub fn add_capacity(&mut self, cap: f64) {
        self.group.add_capacity(cap);
    }
}

// ============================================================================
// Graph
// ============================================================================

/// The bipartite structure consumed by the solver.
///
/// Built by translation, read and match-extended by the solver. The node
/// arena is keyed by `NodeId`, so subgraphs produced by [`partition`]
/// share ids with their parent and matches transfer back by arc identity.
///
/// [`partition`]: ExchangeGraph::partition
#[derive(Debug, Clone, Default)]
pub struct ExchangeGraph {
    nodes: BTreeMap<NodeId, ExchangeNode>,
    request_groups: Vec<RequestGroup>,
    supply_groups: Vec<ExchangeNodeGroup>,
    arcs: Vec<Arc>,
    node_arc_map: BTreeMap<NodeId, Vec<Arc>>,
    matches: Vec<Match>,
    next_node: u32,
}

impl ExchangeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Allocate a node in the arena.
    pub fn add_node(&mut self, node: ExchangeNode) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Append a request group, returning its handle.
    pub fn add_request_group(&mut self, group: RequestGroup) -> GroupId {
        self.request_groups.push(group);
        GroupId::Request(self.request_groups.len() - 1)
    }

    /// Append a supply group, returning its handle.
    pub fn add_supply_group(&mut self, group: ExchangeNodeGroup) -> GroupId {
        self.supply_groups.push(group);
        GroupId::Supply(self.supply_groups.len() - 1)
    }

    /// Place `node` in `group` and set its back-reference.
    ///
    /// # Panics
    /// If the node or group does not exist in this graph.
    pub fn add_to_group(&mut self, group: GroupId, node: NodeId) {
        match group {
            GroupId::Request(i) => self.request_groups[i].group.nodes.push(node),
            GroupId::Supply(i) => self.supply_groups[i].nodes.push(node),
        }
        self.nodes
            .get_mut(&node)
            .expect("node added to group before being added to graph")
            .group = Some(group);
    }

    /// Append an arc and index it under both endpoints.
    pub fn add_arc(&mut self, arc: Arc) {
        debug_assert!(
            self.nodes.contains_key(&arc.unode) && self.nodes.contains_key(&arc.vnode),
            "arc endpoints must exist in the graph"
        );
        self.arcs.push(arc);
        self.node_arc_map.entry(arc.unode).or_default().push(arc);
        self.node_arc_map.entry(arc.vnode).or_default().push(arc);
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &ExchangeNode {
        &self.nodes[&id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ExchangeNode {
        self.nodes.get_mut(&id).expect("unknown node")
    }

    pub fn request_groups(&self) -> &[RequestGroup] {
        &self.request_groups
    }

    pub fn supply_groups(&self) -> &[ExchangeNodeGroup] {
        &self.supply_groups
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn node_arc_map(&self) -> &BTreeMap<NodeId, Vec<Arc>> {
        &self.node_arc_map
    }

    /// Arcs incident to `node`, in declaration order.
    pub fn arcs_for(&self, node: NodeId) -> &[Arc] {
        self.node_arc_map
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    fn group_capacities(&self, id: GroupId) -> &[f64] {
        match id {
            GroupId::Request(i) => self.request_groups[i].capacities(),
            GroupId::Supply(i) => self.supply_groups[i].capacities(),
        }
    }

    // ------------------------------------------------------------------
    // Capacity queries and match bookkeeping
    // ------------------------------------------------------------------

    /// Largest quantity `arc` can still carry, limited by both endpoint
    /// node quantities and both endpoint groups' residual capacities.
    pub fn arc_capacity(&self, arc: Arc) -> f64 {
        self.side_capacity(arc.unode, arc)
            .min(self.side_capacity(arc.vnode, arc))
    }

    fn side_capacity(&self, node: NodeId, arc: Arc) -> f64 {
        let n = &self.nodes[&node];
        let mut cap = n.qty;
        if let (Some(units), Some(group)) = (n.unit_capacities.get(&arc), n.group) {
            let residuals = self.group_capacities(group);
            debug_assert_eq!(
                units.len(),
                residuals.len(),
                "unit capacity vector length must equal the group's constraint count"
            );
            for (unit, residual) in units.iter().zip(residuals) {
                if *unit > 0.0 {
                    cap = cap.min(residual / unit);
                }
            }
        }
        cap
    }

    /// Record a solved match of `qty` on `arc`, consuming residual
    /// capacity at both endpoints.
    ///
    /// # Panics
    /// If `qty` is negative or exceeds [`arc_capacity`] beyond [`EPS`].
    /// Such a call is a solver defect, not a market condition.
    ///
    /// [`arc_capacity`]: ExchangeGraph::arc_capacity
    pub fn add_match(&mut self, arc: Arc, qty: f64) {
        assert!(qty >= 0.0, "match quantity must be nonnegative");
        assert!(
            qty <= self.arc_capacity(arc) + EPS,
            "match of {} exceeds residual capacity {} on {:?}",
            qty,
            self.arc_capacity(arc),
            arc
        );

        self.consume(arc.unode, arc, qty);
        self.consume(arc.vnode, arc, qty);

        if let Some(GroupId::Request(i)) = self.nodes[&arc.unode].group {
            self.request_groups[i].qty -= qty;
            debug_assert!(self.request_groups[i].qty >= -EPS);
        }

        self.matches.push(Match { arc, qty });
    }

    fn consume(&mut self, node: NodeId, arc: Arc, qty: f64) {
        let (group, units) = {
            let n = self.nodes.get_mut(&node).expect("unknown match endpoint");
            n.qty -= qty;
            (n.group, n.unit_capacities.get(&arc).cloned())
        };
        if let (Some(group), Some(units)) = (group, units) {
            let residuals = match group {
                GroupId::Request(i) => &mut self.request_groups[i].group.capacities,
                GroupId::Supply(i) => &mut self.supply_groups[i].capacities,
            };
            for (residual, unit) in residuals.iter_mut().zip(&units) {
                *residual -= unit * qty;
                debug_assert!(
                    *residual >= -EPS * (1.0 + unit),
                    "group capacity over-allocated"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Partition
    // ------------------------------------------------------------------

    /// Split into weakly connected components.
    ///
    /// Arcs are treated as undirected edges; additionally all nodes of a
    /// group count as connected, so a portfolio's aggregate capacities
    /// are never divided across subgraphs. Each component becomes a
    /// subgraph with its groups, nodes, and arcs; node ids are preserved,
    /// so a match found in a subgraph is valid against the parent.
    ///
    /// The result is a set; the order carries no meaning beyond being
    /// deterministic (components sorted by smallest member node).
    pub fn partition(&self) -> Vec<ExchangeGraph> {
        let mut dsu = DisjointSet::new(self.nodes.keys().copied());

        for arc in &self.arcs {
            dsu.union(arc.unode, arc.vnode);
        }
        for g in &self.request_groups {
            union_all(&mut dsu, g.nodes());
        }
        for g in &self.supply_groups {
            union_all(&mut dsu, g.nodes());
        }

        // Component key: smallest node id in the component.
        let mut parts: BTreeMap<NodeId, ExchangeGraph> = BTreeMap::new();

        for g in &self.request_groups {
            let Some(&first) = g.nodes().first() else {
                continue;
            };
            let key = dsu.find(first);
            let sub = parts.entry(key).or_default();
            let gid = sub.add_request_group(RequestGroup {
                qty: g.qty,
                group: ExchangeNodeGroup {
                    nodes: Vec::new(),
                    capacities: g.capacities().to_vec(),
                },
            });
            for &n in g.nodes() {
                sub.copy_node(n, &self.nodes[&n], gid);
            }
        }
        for g in &self.supply_groups {
            let Some(&first) = g.nodes().first() else {
                continue;
            };
            let key = dsu.find(first);
            let sub = parts.entry(key).or_default();
            let gid = sub.add_supply_group(ExchangeNodeGroup {
                nodes: Vec::new(),
                capacities: g.capacities().to_vec(),
            });
            for &n in g.nodes() {
                sub.copy_node(n, &self.nodes[&n], gid);
            }
        }
        for arc in &self.arcs {
            let key = dsu.find(arc.unode);
            if let Some(sub) = parts.get_mut(&key) {
                sub.add_arc(*arc);
            }
        }

        parts.into_values().collect()
    }

    /// Insert a clone of a parent node under its original id.
    fn copy_node(&mut self, id: NodeId, node: &ExchangeNode, group: GroupId) {
        let mut copy = node.clone();
        copy.group = Some(group);
        self.nodes.insert(id, copy);
        match group {
            GroupId::Request(i) => self.request_groups[i].group.nodes.push(id),
            GroupId::Supply(i) => self.supply_groups[i].nodes.push(id),
        }
        self.next_node = self.next_node.max(id.0 + 1);
    }
}

fn union_all(dsu: &mut DisjointSet, nodes: &[NodeId]) {
    for pair in nodes.windows(2) {
        dsu.union(pair[0], pair[1]);
    }
}

/// Union-find over node ids, with the smallest id as representative.
struct DisjointSet {
    parent: BTreeMap<NodeId, NodeId>,
}

impl DisjointSet {
    fn new(nodes: impl Iterator<Item = NodeId>) -> Self {
        Self {
            parent: nodes.map(|n| (n, n)).collect(),
        }
    }

    fn find(&mut self, n: NodeId) -> NodeId {
        let p = self.parent[&n];
        if p == n {
            return n;
        }
        let root = self.find(p);
        self.parent.insert(n, root);
        root
    }

    fn union(&mut self, a: NodeId, b: NodeId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        // Smaller id wins so component keys are stable.
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent.insert(hi, lo);
    }
}
