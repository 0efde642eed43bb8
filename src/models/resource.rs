//! Resource abstraction and the built-in resource kinds.
//!
//! The kernel never looks inside a resource beyond its quantity; the
//! concrete taxonomy (isotopics, product qualities) belongs to the agent
//! library. Two kinds are built in — [`Material`] and [`Product`] — and
//! each gets its own exchange round per time step, in that order.

use crate::core::ids::AgentId;
use crate::exchange::trader::Trader;
use crate::models::agent::Agent;
use crate::models::context::SimContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A quantity-bearing payload tradeable on the exchange.
pub trait Resource {
    /// Positive quantity of this resource, in its native unit.
    fn quantity(&self) -> f64;
}

/// Bulk material, the primary fuel-cycle resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    quantity: f64,
}

impl Material {
    /// # Panics
    /// If `quantity` is not positive.
    pub fn new(quantity: f64) -> Self {
        assert!(quantity > 0.0, "resource quantity must be positive");
        Self { quantity }
    }
}

impl Resource for Material {
    fn quantity(&self) -> f64 {
        self.quantity
    }
}

/// Generic non-material resource with a free-form unit label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    quantity: f64,
    units: String,
}

impl Product {
    /// # Panics
    /// If `quantity` is not positive.
    pub fn new(quantity: f64, units: impl Into<String>) -> Self {
        assert!(quantity > 0.0, "resource quantity must be positive");
        Self {
            quantity,
            units: units.into(),
        }
    }

    pub fn units(&self) -> &str {
        &self.units
    }
}

impl Resource for Product {
    fn quantity(&self) -> f64 {
        self.quantity
    }
}

/// A resource kind the scheduler runs an exchange round for.
///
/// Binds the kind to its trader registry in the simulation context and
/// to the matching `Trader` facet of an agent, so the exchange manager
/// can stay generic while agents implement one trait per kind they
/// trade.
pub trait ResourceKind: Resource + Sized + 'static {
    /// Label used in log lines and recorded rows.
    const LABEL: &'static str;

    /// Agents registered to trade this kind.
    fn traders(ctx: &SimContext) -> &BTreeSet<AgentId>;

    fn traders_mut(ctx: &mut SimContext) -> &mut BTreeSet<AgentId>;

    /// View an agent through its trading facet for this kind.
    fn trader_of(agent: &mut dyn Agent) -> &mut dyn Trader<Self>;
}

impl ResourceKind for Material {
    const LABEL: &'static str = "Material";

    fn traders(ctx: &SimContext) -> &BTreeSet<AgentId> {
        &ctx.material_traders
    }

    fn traders_mut(ctx: &mut SimContext) -> &mut BTreeSet<AgentId> {
        &mut ctx.material_traders
    }

    fn trader_of(agent: &mut dyn Agent) -> &mut dyn Trader<Material> {
        agent
    }
}

impl ResourceKind for Product {
    const LABEL: &'static str = "Product";

    fn traders(ctx: &SimContext) -> &BTreeSet<AgentId> {
        &ctx.product_traders
    }

    fn traders_mut(ctx: &mut SimContext) -> &mut BTreeSet<AgentId> {
        &mut ctx.product_traders
    }

    fn trader_of(agent: &mut dyn Agent) -> &mut dyn Trader<Product> {
        agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_pass_through() {
        assert_eq!(Material::new(3.5).quantity(), 3.5);
        let p = Product::new(2.0, "kWh");
        assert_eq!(p.quantity(), 2.0);
        assert_eq!(p.units(), "kWh");
    }

    #[test]
    #[should_panic(expected = "quantity must be positive")]
    fn nonpositive_material_is_rejected() {
        Material::new(0.0);
    }
}
