//! The resolution engine: token registry, singleton cache, in-flight
//! de-duplication and the recursive resolution algorithm.
//!
//! The engine owns the only mutable shared state in the crate: the registry,
//! the singleton cache and the in-flight map. All three live in [DashMap]s and
//! are only ever mutated with insert-if-absent or remove-on-completion, so the
//! entry API gives us the atomic join-or-start step for singleton
//! construction without any broader locking. No map guard is ever held across
//! an `.await`.

use std::any::Any;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;

use crate::error::{BoxError, ResolutionError};
use crate::request::{Request, Resolved, Value};
use crate::token::{RawToken, Token, TokenId};
use crate::unit::{Recipe, Unit, UnitId};

/// Ancestor chain of one recursive descent, used for cycle detection and
/// error context. Cloned on descent so sibling branches of a composite
/// request never observe each other's extensions.
#[derive(Clone, Default)]
struct Path {
    entries: Vec<(UnitId, Arc<str>)>,
}

impl Path {
    fn contains(&self, id: UnitId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    fn extended(&self, id: UnitId, name: Arc<str>) -> Self {
        let mut entries = self.entries.clone();
        entries.push((id, name));
        Self { entries }
    }

    fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(_, name)| name.to_string())
            .collect()
    }

    /// The full chain from the root down to the repeated identity, which
    /// therefore appears twice.
    fn cycle_chain(&self, repeat: &str) -> Vec<String> {
        let mut chain = self.names();
        chain.push(repeat.to_owned());
        chain
    }
}

type InflightFuture = Shared<BoxFuture<'static, Result<Value, ResolutionError>>>;

#[derive(Default)]
struct EngineInner {
    registry: DashMap<TokenId, Unit>,
    singletons: DashMap<UnitId, Value>,
    inflight: DashMap<UnitId, InflightFuture>,
}

/// Process-wide dependency-resolution engine.
///
/// Cloning the engine clones a handle to the same registry and caches, so a
/// clone can be captured by `'static` construction futures or handed to
/// independent tasks.
#[derive(Clone, Default)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a token with its construction unit.
    ///
    /// At most one unit per token; a second registration for the same token
    /// fails with [ResolutionError::DuplicateRegistration].
    pub fn register<T: ?Sized>(&self, token: &Token<T>, unit: Unit) -> Result<(), ResolutionError> {
        match self.inner.registry.entry(token.id()) {
            Entry::Occupied(_) => Err(ResolutionError::DuplicateRegistration(
                token.name().to_owned(),
            )),
            Entry::Vacant(slot) => {
                tracing::trace!(token = token.name(), unit = unit.name(), "registered");
                slot.insert(unit);
                Ok(())
            }
        }
    }

    fn lookup(&self, token: &RawToken) -> Result<Unit, ResolutionError> {
        self.inner
            .registry
            .get(&token.id())
            .map(|entry| entry.clone())
            .ok_or_else(|| ResolutionError::MissingDependency(token.name().to_owned()))
    }

    /// Resolve a request into concrete values.
    ///
    /// Composite requests fan out concurrently and rejoin preserving input
    /// order and key sets; singleton units are constructed at most once no
    /// matter how many callers race on them.
    pub async fn resolve(&self, request: &Request) -> Result<Resolved, ResolutionError> {
        self.resolve_on_path(request, &Path::default()).await
    }

    /// Resolve a token and downcast the result to its declared type.
    pub async fn resolve_token<T>(&self, token: &Token<T>) -> Result<Arc<T>, ResolutionError>
    where
        T: Any + Send + Sync,
    {
        let resolved = self.resolve(&Request::token(token)).await?;
        resolved
            .downcast::<T>()
            .ok_or_else(|| ResolutionError::TypeMismatch(token.name().to_owned()))
    }

    fn resolve_on_path<'a>(
        &'a self,
        request: &'a Request,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<Resolved, ResolutionError>> {
        async move {
            match request {
                Request::List(items) => {
                    let values = future::try_join_all(
                        items.iter().map(|item| self.resolve_on_path(item, path)),
                    )
                    .await?;
                    Ok(Resolved::List(values))
                }
                Request::Map(entries) => {
                    let values = future::try_join_all(
                        entries.values().map(|value| self.resolve_on_path(value, path)),
                    )
                    .await?;
                    Ok(Resolved::Map(entries.keys().cloned().zip(values).collect()))
                }
                Request::Token(token) => {
                    let unit = self.lookup(token)?;
                    let value = self.resolve_unit(&unit, token.name_arc(), path).await?;
                    Ok(Resolved::Value(value))
                }
                Request::Unit(unit) => {
                    let value = self.resolve_unit(unit, unit.name_arc(), path).await?;
                    Ok(Resolved::Value(value))
                }
                Request::Opaque(_) => Err(ResolutionError::UnresolvableRequest),
            }
        }
        .boxed()
    }

    /// Resolve one construction unit, `name` being the name to report on the
    /// resolution path (the token's name when reached through a token).
    async fn resolve_unit(
        &self,
        unit: &Unit,
        name: Arc<str>,
        path: &Path,
    ) -> Result<Value, ResolutionError> {
        let recipe = unit
            .recipe()
            .ok_or_else(|| ResolutionError::Undeclared(unit.name().to_owned()))?
            .clone();

        if recipe.is_singleton() {
            if let Some(cached) = self.inner.singletons.get(&unit.id()) {
                tracing::trace!(unit = %name, "singleton cache hit");
                return Ok(cached.clone());
            }
        }

        // Same-path re-entry is a cycle whether or not a construction is in
        // flight; checking here keeps a self-dependent singleton from
        // awaiting its own in-flight future.
        if path.contains(unit.id()) {
            return Err(ResolutionError::CircularDependency {
                chain: path.cycle_chain(&name),
            });
        }

        if !recipe.is_singleton() {
            return self.construct(unit, &recipe, name, path).await;
        }

        // Join-or-start is one atomic step; the entry guard is dropped
        // before the await below.
        let (shared, started) = match self.inner.inflight.entry(unit.id()) {
            Entry::Occupied(slot) => {
                tracing::debug!(unit = %name, "joining in-flight construction");
                (slot.get().clone(), false)
            }
            Entry::Vacant(slot) => {
                // A finished owner caches the value before clearing its
                // in-flight entry, so a vacant entry here can still mean the
                // construction completed after our cache check above. The
                // re-check under the entry guard keeps a late caller from
                // constructing the singleton a second time.
                if let Some(cached) = self.inner.singletons.get(&unit.id()) {
                    return Ok(cached.clone());
                }
                let engine = self.clone();
                let owned_unit = unit.clone();
                let owned_recipe = recipe.clone();
                let owned_name = name.clone();
                let owned_path = path.clone();
                let shared = async move {
                    engine
                        .construct(&owned_unit, &owned_recipe, owned_name, &owned_path)
                        .await
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());
                (shared, true)
            }
        };

        let outcome = shared.await;
        if started {
            if let Ok(value) = &outcome {
                // Cache before clearing the in-flight entry so later callers
                // always observe one or the other.
                self.inner.singletons.insert(unit.id(), value.clone());
            }
            self.inner.inflight.remove(&unit.id());
        }
        outcome
    }

    /// Resolve the unit's dependencies on an extended path, then invoke its
    /// construction closure.
    async fn construct(
        &self,
        unit: &Unit,
        recipe: &Recipe,
        name: Arc<str>,
        path: &Path,
    ) -> Result<Value, ResolutionError> {
        let child = path.extended(unit.id(), name.clone());
        tracing::debug!(unit = %name, kind = ?recipe.kind(), "constructing");
        let deps = future::try_join_all(
            recipe
                .dependencies()
                .iter()
                .map(|dep| self.resolve_on_path(dep, &child)),
        )
        .await?;
        match unit.construct(deps).await {
            Ok(value) => Ok(value),
            Err(cause) => {
                tracing::debug!(unit = %name, error = %cause, "construction failed");
                Err(wrap_failure(cause, &child))
            }
        }
    }
}

/// Annotate a user-code failure with its ancestor chain, exactly once.
///
/// User code that performed its own nested resolve may hand back an
/// already-annotated failure through its error channel; that one is
/// propagated unwrapped.
fn wrap_failure(cause: BoxError, path: &Path) -> ResolutionError {
    match cause.downcast::<ResolutionError>() {
        Ok(inner) if matches!(*inner, ResolutionError::Construction { .. }) => *inner,
        Ok(inner) => ResolutionError::Construction {
            chain: path.names(),
            cause: Arc::new(*inner),
        },
        Err(cause) => ResolutionError::Construction {
            chain: path.names(),
            cause: Arc::from(cause),
        },
    }
}
