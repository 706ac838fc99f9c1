//! Opaque identity handles for registered dependencies.
//!
//! A [Token] pairs a process-unique id with a human-readable name and a
//! phantom type parameter. The id is the identity used by the registry; the
//! name only ever appears in diagnostics; the type parameter lets
//! [crate::Engine::resolve_token] hand back a typed `Arc<T>` without any
//! runtime type tag on the registered value.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(0);

/// Registry key behind a [Token], independent of its logical type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

/// A [Token] with its type parameter erased.
///
/// This is what [crate::Request] carries and what the registry keys on;
/// collaborators normally keep the typed handle and never see this form.
#[derive(Clone, Debug)]
pub struct RawToken {
    id: TokenId,
    name: Arc<str>,
}

impl RawToken {
    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }
}

impl PartialEq for RawToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawToken {}

impl std::hash::Hash for RawToken {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Opaque, globally unique handle identifying a registered dependency.
///
/// Two tokens created with the same name are still distinct identities; only
/// clones of one token compare equal. The name exists for error messages and
/// log output.
///
/// ```
/// use ikebana::Token;
///
/// struct Config;
/// let a: Token<Config> = Token::new("config");
/// let b: Token<Config> = Token::new("config");
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// ```
pub struct Token<T: ?Sized> {
    raw: RawToken,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Token<T> {
    /// Mint a fresh token with the given diagnostic name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            raw: RawToken {
                id: TokenId(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.into(),
            },
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> TokenId {
        self.raw.id
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    /// The type-erased form used in [crate::Request] values.
    pub fn raw(&self) -> RawToken {
        self.raw.clone()
    }
}

// Manual impls: the phantom parameter must not constrain T.
impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.raw.id)
            .field("name", &self.raw.name)
            .finish()
    }
}

impl<T: ?Sized> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw.id == other.raw.id
    }
}

impl<T: ?Sized> Eq for Token<T> {}

impl<T: ?Sized> std::hash::Hash for Token<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.id.hash(state);
    }
}
