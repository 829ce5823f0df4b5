use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::modules::utils::time::get_current_timestamp;

pub const CODE_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// A code waiting to be spent by a password reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    pub code: String,
    pub issued_at: u64,
}

impl PendingCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            issued_at: get_current_timestamp(),
        }
    }
}

/// Generate a six digit reset code, uniform over the whole range
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_RANGE).to_string()
}

/// Process-wide store of pending one-time codes, one per username.
///
/// A newer code for a username replaces the older one. Without a TTL codes
/// live until they are spent or replaced.
#[derive(Debug, Default)]
pub struct OneTimeCodeStore {
    codes: Mutex<HashMap<String, PendingCode>>,
    ttl: Option<Duration>,
}

impl OneTimeCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codes older than `ttl` behave as if they were never issued
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Store `code` for `username`, superseding any pending one
    pub fn put(&self, username: &str, code: &str) {
        self.lock()
            .insert(username.to_string(), PendingCode::new(code));
    }

    /// Look up the pending code without spending it
    pub fn get(&self, username: &str) -> Option<String> {
        let mut codes = self.lock();
        self.live_entry(&mut codes, username).map(|p| p.code.clone())
    }

    /// Drop the pending code for `username`
    pub fn remove(&self, username: &str) -> Option<PendingCode> {
        self.lock().remove(username)
    }

    /// Compare `supplied` with the pending code without spending it
    pub fn matches(&self, username: &str, supplied: &str) -> bool {
        let mut codes = self.lock();
        self.live_entry(&mut codes, username)
            .map(|pending| bool::from(pending.code.as_bytes().ct_eq(supplied.as_bytes())))
            .unwrap_or(false)
    }

    /// Spend the pending code if `supplied` matches it.
    ///
    /// Comparison and removal happen under one lock, so two callers racing
    /// with the same code can never both succeed.
    pub fn take_if_matches(&self, username: &str, supplied: &str) -> Option<PendingCode> {
        let mut codes = self.lock();
        let pending = self.live_entry(&mut codes, username)?;
        let matches: bool = pending.code.as_bytes().ct_eq(supplied.as_bytes()).into();
        if !matches {
            return None;
        }
        codes.remove(username)
    }

    /// Put a taken code back after a failed reset, unless a newer code
    /// has been issued in the meantime
    pub fn restore(&self, username: &str, pending: PendingCode) -> bool {
        let mut codes = self.lock();
        if codes.contains_key(username) {
            return false;
        }
        codes.insert(username.to_string(), pending);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry<'a>(
        &self,
        codes: &'a mut HashMap<String, PendingCode>,
        username: &str,
    ) -> Option<&'a PendingCode> {
        if let Some(ttl) = self.ttl {
            let expired = codes
                .get(username)
                .map(|p| get_current_timestamp().saturating_sub(p.issued_at) >= ttl.as_secs())
                .unwrap_or(false);
            if expired {
                log::debug!("Discarding expired reset code");
                codes.remove(username);
            }
        }
        codes.get(username)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingCode>> {
        // a panic while holding the lock cannot leave the map half-written
        self.codes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
