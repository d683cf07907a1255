//! Client-side persistence.
//!
//! Two lifetimes are kept strictly apart:
//!
//! - [`ProgressStore`] is durable. It survives reloads and restarts and is
//!   never cleared implicitly; only [`ProgressStore::forget`] removes a code's
//!   entries.
//! - [`VerificationSession`] lives as long as one tab (or one CLI run) and is
//!   cleared every time the reader navigates to a new code.
//!
//! Both are thin typed layers over a string [`Store`], so the browser can
//! back them with `localStorage`/`sessionStorage` and the CLI with a file.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::paste::Paste;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("The storage backend rejected the write: {0}")]
    Rejected(String),
    #[error("Failed to persist storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode a stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A string key-value store.
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the backend refused or failed to persist the value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns an error if the backend failed to persist the removal.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default, Clone, Debug)]
pub struct MemoryStore(HashMap<String, String>);

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.0.remove(key);
        Ok(())
    }
}

const LAST_CODE_KEY: &str = "paste_code";
const VERIFIED_KEY: &str = "is_verified";
const VERIFIED_PASTE_KEY: &str = "verified_paste_data";

fn progress_key(code: &str) -> String {
    format!("action_gate_{code}")
}

fn viewed_key(code: &str) -> String {
    format!("paste_viewed_{code}")
}

/// Durable per-code state: completed actions, view markers and the last code
/// the reader navigated to.
pub struct ProgressStore<S>(S);

impl<S: Store> ProgressStore<S> {
    pub const fn new(store: S) -> Self {
        Self(store)
    }

    pub fn into_inner(self) -> S {
        self.0
    }

    pub fn last_code(&self) -> Option<String> {
        self.0.get(LAST_CODE_KEY).filter(|code| !code.is_empty())
    }

    /// # Errors
    ///
    /// Returns an error if the backing store failed to persist the code.
    pub fn remember_code(&mut self, code: &str) -> Result<(), StoreError> {
        self.0.set(LAST_CODE_KEY, code)
    }

    /// Completed action indices for a code. Missing or unreadable entries
    /// read as "nothing completed yet".
    pub fn load(&self, code: &str) -> BTreeSet<usize> {
        let raw = match self.0.get(&progress_key(code)) {
            Some(raw) => raw,
            None => return BTreeSet::new(),
        };

        match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(values) => values
                .iter()
                .filter_map(serde_json::Value::as_u64)
                .filter_map(|index| usize::try_from(index).ok())
                .collect(),
            Err(e) => {
                warn!(code, "Ignoring malformed action progress: {e}");
                BTreeSet::new()
            }
        }
    }

    /// Overwrites the stored set for a code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store failed to persist the set.
    pub fn save(&mut self, code: &str, completed: &BTreeSet<usize>) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(completed)?;
        self.0.set(&progress_key(code), &encoded)
    }

    pub fn viewed_at(&self, code: &str) -> Option<DateTime<Utc>> {
        let millis = self.0.get(&viewed_key(code))?.trim().parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    pub fn has_viewed(&self, code: &str) -> bool {
        self.0.get(&viewed_key(code)).is_some()
    }

    /// # Errors
    ///
    /// Returns an error if the backing store failed to persist the marker.
    pub fn mark_viewed(&mut self, code: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.0
            .set(&viewed_key(code), &at.timestamp_millis().to_string())
    }

    /// Drops everything recorded about a code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store failed to persist the removal.
    pub fn forget(&mut self, code: &str) -> Result<(), StoreError> {
        self.0.remove(&progress_key(code))?;
        self.0.remove(&viewed_key(code))?;
        if self.last_code().as_deref() == Some(code) {
            self.0.remove(LAST_CODE_KEY)?;
        }
        Ok(())
    }
}

/// Per-tab verification state: whether the reader passed the gates and the
/// paste they unlocked.
pub struct VerificationSession<S>(S);

impl<S: Store> VerificationSession<S> {
    pub const fn new(store: S) -> Self {
        Self(store)
    }

    pub fn into_inner(self) -> S {
        self.0
    }

    pub fn is_verified(&self) -> bool {
        self.0.get(VERIFIED_KEY).as_deref() == Some("true")
    }

    /// The unlocked paste, if the session is verified and its data is intact.
    pub fn verified_paste(&self) -> Option<Paste> {
        if !self.is_verified() {
            return None;
        }

        let raw = self.0.get(VERIFIED_PASTE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(paste) => Some(paste),
            Err(e) => {
                warn!("Discarding unreadable verified paste: {e}");
                None
            }
        }
    }

    pub fn verified_for(&self, code: &str) -> bool {
        self.verified_paste()
            .map_or(false, |paste| paste.code == code)
    }

    /// # Errors
    ///
    /// Returns an error if the backing store failed to persist the session.
    pub fn mark_verified(&mut self, paste: &Paste) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(paste)?;
        self.0.set(VERIFIED_PASTE_KEY, &encoded)?;
        self.0.set(VERIFIED_KEY, "true")
    }

    /// # Errors
    ///
    /// Returns an error if the backing store failed to persist the removal.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.0.remove(VERIFIED_KEY)?;
        self.0.remove(VERIFIED_PASTE_KEY)
    }
}
