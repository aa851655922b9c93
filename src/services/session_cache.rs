use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::utils::pkce::constant_time_compare;

/// TTL for an end-user session token: `{username}-token`.
pub const USER_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// TTL for an admin/manager session token: `{username}-manager-token`.
pub const MANAGER_TOKEN_TTL_SECS: i64 = 2 * 60 * 60;

const MANAGER_TOKEN_PREFIX: &str = "bearer ";

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process KV store with per-entry TTL, holding the session token that
/// accompanies a logged-in user or admin. Not persisted: a restart logs
/// every session out, which is acceptable since the value is reissued on
/// the next login.
pub struct SessionCache {
    entries: DashMap<String, Entry>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    fn insert(&self, key: String, value: String, ttl_secs: i64) {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64);
        self.entries.insert(key, Entry { value, expires_at });
    }

    fn get_live(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.is_live() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    pub fn set_user_token(&self, username: &str, token: &str) {
        self.insert(user_key(username), token.to_string(), USER_TOKEN_TTL_SECS);
    }

    pub fn set_manager_token(&self, username: &str, token: &str) {
        self.insert(
            manager_key(username),
            format!("{MANAGER_TOKEN_PREFIX}{token}"),
            MANAGER_TOKEN_TTL_SECS,
        );
    }

    /// Byte-exact comparison against the cached value; a miss or an expired
    /// entry is indistinguishable from a mismatch to the caller.
    pub fn verify_user_token(&self, username: &str, token: &str) -> bool {
        match self.get_live(&user_key(username)) {
            Some(cached) => constant_time_compare(&cached, token),
            None => false,
        }
    }

    pub fn verify_manager_token(&self, username: &str, token: &str) -> bool {
        let expected = format!("{MANAGER_TOKEN_PREFIX}{token}");
        match self.get_live(&manager_key(username)) {
            Some(cached) => constant_time_compare(&cached, &expected),
            None => false,
        }
    }

    pub fn invalidate_user(&self, username: &str) {
        self.entries.remove(&user_key(username));
    }

    pub fn invalidate_manager(&self, username: &str) {
        self.entries.remove(&manager_key(username));
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

fn user_key(username: &str) -> String {
    format!("{username}-token")
}

fn manager_key(username: &str) -> String {
    format!("{username}-manager-token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_token_round_trip() {
        let cache = SessionCache::new();
        cache.set_user_token("alice", "tok-1");
        assert!(cache.verify_user_token("alice", "tok-1"));
        assert!(!cache.verify_user_token("alice", "tok-2"));
    }

    #[test]
    fn manager_token_is_prefixed() {
        let cache = SessionCache::new();
        cache.set_manager_token("admin", "tok-1");
        assert!(cache.verify_manager_token("admin", "tok-1"));
        assert!(!cache.verify_user_token("admin", "bearer tok-1"));
    }

    #[test]
    fn missing_entry_does_not_verify() {
        let cache = SessionCache::new();
        assert!(!cache.verify_user_token("nobody", "anything"));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = SessionCache::new();
        cache.set_user_token("alice", "tok-1");
        cache.invalidate_user("alice");
        assert!(!cache.verify_user_token("alice", "tok-1"));
    }

    #[test]
    fn expired_entry_does_not_verify() {
        let cache = SessionCache::new();
        cache.insert(user_key("alice"), "tok-1".to_string(), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cache.verify_user_token("alice", "tok-1"));
    }
}
