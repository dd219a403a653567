//! Token → request mapping for in-flight transfers.
//!
//! The transport only ever sees a [`Token`]. While a transfer is in flight the
//! registry holds a strong reference to the request, so the request stays
//! alive even if the caller dropped every handle it had. Releasing the token
//! gives that reference back.

use crate::urlrequest::descriptor::RequestHandle;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier correlating transport callbacks with their request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(NonZeroU64);

impl Token {
    /// Rebuild a token from the raw value a transport carried. Zero is never a token.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Token)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }
}

/// Concurrent token registry. Tokens come from a monotonic counter and are
/// never handed out twice.
pub struct HandleRegistry<T = RequestHandle> {
    entries: DashMap<Token, T>,
    next: AtomicU64,
}

static GLOBAL: Lazy<HandleRegistry> = Lazy::new(HandleRegistry::new);

impl HandleRegistry {
    /// The process-wide registry the dispatch callbacks resolve against.
    pub fn global() -> &'static HandleRegistry {
        &GLOBAL
    }
}

impl<T: Clone> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    pub fn register(&self, value: T) -> Token {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        // Starts at 1 and a u64 counter does not wrap in practice.
        let token = Token(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN));
        self.entries.insert(token, value);
        token
    }

    pub fn resolve(&self, token: Token) -> Option<T> {
        self.entries.get(&token).map(|entry| entry.value().clone())
    }

    /// Remove the entry, handing back the registry's reference.
    pub fn release(&self, token: Token) -> Option<T> {
        self.entries.remove(&token).map(|(_, value)| value)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
