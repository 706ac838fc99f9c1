//! Resolution requests and their results.
//!
//! A [Request] describes what a caller wants: a token, a construction unit,
//! or an arbitrarily nested ordered-list / keyed-map combination of those.
//! Requests are transient values; the engine clones what it needs and never
//! mutates a caller-supplied structure. A [Resolved] mirrors the request
//! shape with concrete values at the leaves.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::token::{RawToken, Token};
use crate::unit::Unit;

/// A single constructed value, type-erased.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Box a constructed value for return from a construction closure.
///
/// Saves the explicit `as Value` cast at every factory return site.
pub fn value<T: Any + Send + Sync>(inner: T) -> Value {
    Arc::new(inner)
}

/// What the caller wants resolved.
#[derive(Clone)]
pub enum Request {
    /// Look up the token's registered unit and resolve it.
    Token(RawToken),
    /// Resolve a construction unit directly.
    Unit(Unit),
    /// Resolve every element, preserving order.
    List(Vec<Request>),
    /// Resolve every value, preserving the key set.
    Map(BTreeMap<String, Request>),
    /// A caller-supplied value of no recognized shape; always fails with
    /// [crate::ResolutionError::UnresolvableRequest].
    Opaque(Value),
}

impl Request {
    pub fn token<T: ?Sized>(token: &Token<T>) -> Self {
        Request::Token(token.raw())
    }

    pub fn unit(unit: &Unit) -> Self {
        Request::Unit(unit.clone())
    }

    pub fn list(items: impl IntoIterator<Item = Request>) -> Self {
        Request::List(items.into_iter().collect())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Request)>,
    {
        Request::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn opaque(value: impl Any + Send + Sync) -> Self {
        Request::Opaque(Arc::new(value))
    }
}

impl<T: ?Sized> From<&Token<T>> for Request {
    fn from(token: &Token<T>) -> Self {
        Request::Token(token.raw())
    }
}

impl From<&Unit> for Request {
    fn from(unit: &Unit) -> Self {
        Request::Unit(unit.clone())
    }
}

impl From<Unit> for Request {
    fn from(unit: Unit) -> Self {
        Request::Unit(unit)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Token(t) => f.debug_tuple("Token").field(&t.name()).finish(),
            Request::Unit(u) => f.debug_tuple("Unit").field(&u.name()).finish(),
            Request::List(items) => f.debug_tuple("List").field(items).finish(),
            Request::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Request::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// The result of a resolution, shaped like the request that produced it.
#[derive(Clone)]
pub enum Resolved {
    Value(Value),
    List(Vec<Resolved>),
    Map(BTreeMap<String, Resolved>),
}

impl Resolved {
    /// The constructed value, if this is a leaf of the requested type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Resolved::Value(v) => v.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Resolved]> {
        match self {
            Resolved::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Resolved>> {
        match self {
            Resolved::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(_) => f.write_str("Value(..)"),
            Resolved::List(items) => f.debug_tuple("List").field(items).finish(),
            Resolved::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}
