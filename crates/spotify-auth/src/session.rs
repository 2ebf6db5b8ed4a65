//! Session token custody
//!
//! The bearer token lives in two horizons that are written together:
//!
//! - the cookie horizon: an httpOnly cookie the server sees on every request
//!   and that survives top-level navigation, capped at one hour
//! - the cache horizon: page-lifetime client storage for fast reads
//!
//! Reads prefer the cache and back-fill it from the cookie on a miss. The
//! horizons are not transactional; a reader may briefly see a stale value,
//! but every write goes to both.
//!
//! Known weakness: nothing here checks the token's own expiry. A cache can
//! outlive the cookie, and the first sign is a 401 from the API gateway.

use std::collections::HashMap;
use std::time::Duration;

use common::Secret;

use crate::constants::{ACCESS_TOKEN_COOKIE, TOKEN_LIFETIME_SECS};
use crate::token::{AccessToken, BearerToken, now_millis};

/// One place a named value can be kept.
pub trait Horizon {
    fn read(&self, name: &str) -> Option<String>;

    /// Store `value` under `name`. `max_age` is advisory; horizons without a
    /// notion of expiry ignore it.
    fn write(&mut self, name: &str, value: &str, max_age: Duration);

    /// Remove `name`. Removing an absent name is not an error.
    fn remove(&mut self, name: &str);
}

/// Get/set/clear access to the session's bearer token.
pub trait TokenStore {
    fn set_token(&mut self, token: &BearerToken);

    /// The live token, or `None` when neither horizon holds one.
    fn get_token(&mut self) -> Option<AccessToken>;

    /// Remove the token everywhere. Idempotent.
    fn clear_token(&mut self);

    fn is_authenticated(&mut self) -> bool {
        self.get_token().is_some()
    }
}

/// Horizon backed by a map that lives as long as its owner.
#[derive(Debug, Default, Clone)]
pub struct MemoryHorizon {
    entries: HashMap<String, String>,
}

impl MemoryHorizon {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Horizon for MemoryHorizon {
    fn read(&self, name: &str) -> Option<String> {
        self.entries.get(name).cloned()
    }

    fn write(&mut self, name: &str, value: &str, _max_age: Duration) {
        self.entries.insert(name.to_string(), value.to_string());
    }

    fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }
}

/// Token store over a cache horizon `C` and a cookie horizon `K`.
#[derive(Debug, Default)]
pub struct DualHorizonStore<C, K> {
    cache: C,
    cookies: K,
}

/// In-memory fake with the same semantics as the browser-backed store.
pub type MemoryTokenStore = DualHorizonStore<MemoryHorizon, MemoryHorizon>;

impl<C: Horizon, K: Horizon> DualHorizonStore<C, K> {
    pub fn new(cache: C, cookies: K) -> Self {
        Self { cache, cookies }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cookies(&self) -> &K {
        &self.cookies
    }

    /// Split back into the two horizons (e.g. to emit cookie changes).
    pub fn into_parts(self) -> (C, K) {
        (self.cache, self.cookies)
    }
}

impl<C: Horizon, K: Horizon> TokenStore for DualHorizonStore<C, K> {
    fn set_token(&mut self, token: &BearerToken) {
        let max_age = Duration::from_secs(token.remaining_secs(now_millis()).min(TOKEN_LIFETIME_SECS));
        let value = token.value().expose();
        self.cookies.write(ACCESS_TOKEN_COOKIE, value, max_age);
        self.cache.write(ACCESS_TOKEN_COOKIE, value, max_age);
    }

    fn get_token(&mut self) -> Option<AccessToken> {
        if let Some(value) = self.cache.read(ACCESS_TOKEN_COOKIE).filter(|v| !v.is_empty()) {
            return Some(Secret::new(value));
        }
        let value = self
            .cookies
            .read(ACCESS_TOKEN_COOKIE)
            .filter(|v| !v.is_empty())?;
        self.cache.write(
            ACCESS_TOKEN_COOKIE,
            &value,
            Duration::from_secs(TOKEN_LIFETIME_SECS),
        );
        Some(Secret::new(value))
    }

    fn clear_token(&mut self) {
        self.cookies.remove(ACCESS_TOKEN_COOKIE);
        self.cache.remove(ACCESS_TOKEN_COOKIE);
    }
}
