//! Construction units and their recipes.
//!
//! A [Unit] is the thing the engine actually invokes: an async closure
//! producing one value, tagged with a unique identity and a diagnostic name.
//! Its [Recipe] (dependency requests, construction kind, singleton flag) is
//! plain data supplied at declaration time, so nothing here relies on
//! reflection or attribute machinery. A recipe is write-once: it can be given
//! to [Unit::new] up front or attached later exactly once with
//! [Unit::declare].

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::OnceCell;

use crate::error::{BoxError, ResolutionError};
use crate::request::{Request, Resolved, Value};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a [Unit]; key of the singleton cache and the
/// in-flight map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

/// Whether the unit's closure stands for a free factory function or an
/// object constructor. Purely diagnostic in this engine; both kinds are
/// invoked the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Factory,
    Constructor,
}

/// Declared metadata for a construction unit.
///
/// ```
/// use ikebana::{Recipe, Token};
///
/// struct Config;
/// let config: Token<Config> = Token::new("config");
/// let recipe = Recipe::factory().with_dependency(&config).singleton();
/// assert!(recipe.is_singleton());
/// assert_eq!(recipe.dependencies().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Recipe {
    dependencies: Vec<Request>,
    kind: UnitKind,
    singleton: bool,
}

impl Recipe {
    /// A transient factory recipe with no dependencies.
    pub fn factory() -> Self {
        Self {
            dependencies: Vec::new(),
            kind: UnitKind::Factory,
            singleton: false,
        }
    }

    /// A transient constructor recipe with no dependencies.
    pub fn constructor() -> Self {
        Self {
            dependencies: Vec::new(),
            kind: UnitKind::Constructor,
            singleton: false,
        }
    }

    /// Append one dependency request; order is the argument order the
    /// construction closure will observe.
    pub fn with_dependency(mut self, dep: impl Into<Request>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Append several dependency requests at once.
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = Request>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    /// Mark the unit as a shared singleton: constructed at most once, its
    /// value cached for the process lifetime.
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn dependencies(&self) -> &[Request] {
        &self.dependencies
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }
}

type ConstructFn =
    Arc<dyn Fn(Vec<Resolved>) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

struct UnitInner {
    id: UnitId,
    name: Arc<str>,
    recipe: OnceCell<Recipe>,
    construct: ConstructFn,
}

/// A factory function or constructor capable of producing one value.
///
/// Cloning a [Unit] clones a handle to the same identity; requesting the
/// clone and the original resolves the same underlying unit.
#[derive(Clone)]
pub struct Unit {
    inner: Arc<UnitInner>,
}

impl Unit {
    /// Create a unit with its recipe declared up front.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, recipe: Recipe, construct: F) -> Self
    where
        F: Fn(Vec<Resolved>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self::build(name.into(), OnceCell::with_value(recipe), construct)
    }

    /// Create a unit without a recipe.
    ///
    /// Resolving it fails with [ResolutionError::Undeclared] until a recipe
    /// is attached via [Unit::declare].
    pub fn undeclared<F, Fut>(name: impl Into<Arc<str>>, construct: F) -> Self
    where
        F: Fn(Vec<Resolved>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self::build(name.into(), OnceCell::new(), construct)
    }

    fn build<F, Fut>(name: Arc<str>, recipe: OnceCell<Recipe>, construct: F) -> Self
    where
        F: Fn(Vec<Resolved>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(UnitInner {
                id: UnitId(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed)),
                name,
                recipe,
                construct: Arc::new(move |deps| construct(deps).boxed()),
            }),
        }
    }

    /// Attach the recipe to a unit created with [Unit::undeclared].
    ///
    /// Recipes are write-once; a second call fails with
    /// [ResolutionError::AlreadyDeclared].
    pub fn declare(&self, recipe: Recipe) -> Result<(), ResolutionError> {
        self.inner
            .recipe
            .set(recipe)
            .map_err(|_| ResolutionError::AlreadyDeclared(self.name().to_owned()))
    }

    pub fn id(&self) -> UnitId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.inner.name.clone()
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.inner.recipe.get()
    }

    /// Invoke the construction closure with already-resolved dependencies.
    pub(crate) fn construct(&self, deps: Vec<Resolved>) -> BoxFuture<'static, Result<Value, BoxError>> {
        (self.inner.construct)(deps)
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("recipe", &self.inner.recipe.get())
            .finish()
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Unit {}
