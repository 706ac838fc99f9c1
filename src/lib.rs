//! Asynchronous, token-based dependency resolution with singleton
//! de-duplication and cycle detection.
//!
//! # Simple use case
//!
//! ```
//! use ikebana::{value, Engine, Recipe, Resolved, Token, Unit};
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Database {
//!     url: String,
//! }
//!
//! # fn main() -> Result<(), ikebana::ResolutionError> {
//! let engine = Engine::new();
//! let config: Token<Config> = Token::new("config");
//! let database: Token<Database> = Token::new("database");
//!
//! engine.register(
//!     &config,
//!     Unit::new("config", Recipe::factory().singleton(), |_deps: Vec<Resolved>| async {
//!         Ok(value(Config { url: "postgres://localhost".into() }))
//!     }),
//! )?;
//!
//! let deps = Recipe::factory().with_dependency(&config).singleton();
//! engine.register(
//!     &database,
//!     Unit::new("database", deps, |deps: Vec<Resolved>| async move {
//!         let config = deps[0].downcast::<Config>().ok_or("missing config")?;
//!         Ok(value(Database { url: config.url.clone() }))
//!     }),
//! )?;
//!
//! let db = futures::executor::block_on(engine.resolve_token(&database))?;
//! assert_eq!(db.url, "postgres://localhost");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Collaborators mint opaque [Token]s, attach a [Recipe] (dependency list,
//! construction kind, singleton flag) to each construction [Unit], and
//! register the pair with an [Engine]. [Engine::resolve] then expands a
//! [Request] (a token, a unit, or an arbitrarily nested ordered-list /
//! keyed-map combination of those) into concrete values:
//!
//! * composite requests fan out concurrently and rejoin preserving input
//!   order and key sets;
//! * singleton units resolve through a memoization cache, and concurrent
//!   first resolutions are de-duplicated through a shared in-flight future,
//!   so a singleton's construction code runs at most once;
//! * each recursive descent carries its ancestor chain, so a unit that
//!   reappears on its own path fails with
//!   [ResolutionError::CircularDependency] naming the full chain;
//! * a failed construction caches nothing and detaches from the in-flight
//!   map, leaving later calls free to retry.
//!
//! The crate is executor-agnostic: it depends on the `futures` traits only
//! and runs under any async runtime.

mod engine;
mod error;
mod request;
mod token;
mod unit;

pub use engine::Engine;
pub use error::{BoxError, ResolutionError};
pub use request::{value, Request, Resolved, Value};
pub use token::{RawToken, Token, TokenId};
pub use unit::{Recipe, Unit, UnitId, UnitKind};
