//! Capacity constraints and resource converters.
//!
//! A capacity constraint is a domain statement: "this portfolio can
//! supply or consume at most `capacity` units of `converter(resource)`".
//! The converter is the extensibility hinge — two supply portfolios may
//! both advertise a mass cap, each with its own way of weighing a
//! resource against it.

use super::graph::Arc;
use super::translation::TranslationContext;
use super::ExchangeError;
use crate::core::ids::{IdGen, RequestId};
use crate::models::resource::Resource;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// User-supplied conversion hook for [`Converter::Adapter`].
///
/// `convert` must be total and deterministic given immutable inputs and
/// must not retain state beyond the call.
pub trait ConverterFn<T: Resource> {
    fn convert(
        &self,
        offer: &T,
        arc: Option<&Arc>,
        ctx: Option<&TranslationContext<T>>,
    ) -> Result<f64, ExchangeError>;
}

/// Maps (resource, arc, translation context) to a nonnegative unit cost
/// against a constraint.
pub enum Converter<T: Resource> {
    /// Returns the resource's quantity unchanged.
    Trivial,

    /// Multiplies the resource's quantity by a per-request coefficient,
    /// resolved through the translation context's node-to-request table.
    /// Fails with a lookup error when the arc's u-node is unmapped.
    CoeffTable(BTreeMap<RequestId, f64>),

    /// Arbitrary user-defined conversion.
    Adapter(Rc<dyn ConverterFn<T>>),
}

impl<T: Resource> Converter<T> {
    pub fn convert(
        &self,
        offer: &T,
        arc: Option<&Arc>,
        ctx: Option<&TranslationContext<T>>,
    ) -> Result<f64, ExchangeError> {
        match self {
            Converter::Trivial => Ok(offer.quantity()),
            Converter::CoeffTable(coeffs) => {
                let arc = arc.ok_or(ExchangeError::MissingArc)?;
                let ctx = ctx.ok_or(ExchangeError::MissingTranslation)?;
                let request = ctx
                    .node_to_request
                    .get(&arc.unode())
                    .ok_or(ExchangeError::UnmappedNode(arc.unode()))?;
                let coeff = coeffs
                    .get(&request.id())
                    .ok_or(ExchangeError::UnmappedRequest(request.id()))?;
                Ok(offer.quantity() * coeff)
            }
            Converter::Adapter(f) => f.convert(offer, arc, ctx),
        }
    }
}

impl<T: Resource> Clone for Converter<T> {
    fn clone(&self) -> Self {
        match self {
            Converter::Trivial => Converter::Trivial,
            Converter::CoeffTable(c) => Converter::CoeffTable(c.clone()),
            Converter::Adapter(f) => Converter::Adapter(Rc::clone(f)),
        }
    }
}

/// Equality is structural where it can be, conservative where it cannot:
/// adapters compare equal only when they are the same allocation.
impl<T: Resource> PartialEq for Converter<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Converter::Trivial, Converter::Trivial) => true,
            (Converter::CoeffTable(a), Converter::CoeffTable(b)) => a == b,
            (Converter::Adapter(a), Converter::Adapter(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Resource> fmt::Debug for Converter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Trivial => f.write_str("Trivial"),
            Converter::CoeffTable(c) => f.debug_tuple("CoeffTable").field(c).finish(),
            Converter::Adapter(_) => f.write_str("Adapter(..)"),
        }
    }
}

/// Reserved classification for constraints; participates in equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapType {
    #[default]
    None,
    Floor,
    Ceiling,
}

/// A capacity paired with the converter that prices resources against it.
///
/// Each constraint is assigned a monotonic id at construction; ids give
/// constraints a stable registration order inside a portfolio, while
/// equality (used to deduplicate constraints) is structural over
/// `(capacity, converter, cap_type)`.
#[derive(Debug, Clone)]
pub struct CapacityConstraint<T: Resource> {
    capacity: f64,
    converter: Converter<T>,
    cap_type: CapType,
    id: u32,
}

impl<T: Resource> CapacityConstraint<T> {
    /// Constraint with an arbitrary converter.
    ///
    /// # Panics
    /// If `capacity` is not positive.
    pub fn new(capacity: f64, converter: Converter<T>, ids: &IdGen) -> Self {
        assert!(capacity > 0.0, "constraint capacity must be positive");
        Self {
            capacity,
            converter,
            cap_type: CapType::None,
            id: ids.next_constraint(),
        }
    }

    /// Constraint with the trivial converter.
    pub fn trivial(capacity: f64, ids: &IdGen) -> Self {
        Self::new(capacity, Converter::Trivial, ids)
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn converter(&self) -> &Converter<T> {
        &self.converter
    }

    pub fn cap_type(&self) -> CapType {
        self.cap_type
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Price `offer` against this constraint.
    pub fn convert(
        &self,
        offer: &T,
        arc: Option<&Arc>,
        ctx: Option<&TranslationContext<T>>,
    ) -> Result<f64, ExchangeError> {
        self.converter.convert(offer, arc, ctx)
    }
}

impl<T: Resource> PartialEq for CapacityConstraint<T> {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity
            && self.cap_type == other.cap_type
            && self.converter == other.converter
    }
}
