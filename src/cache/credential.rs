use std::fmt;

use chrono::{DateTime, Utc};

use crate::helpers::time::far_past;

/// Bearer credential held by the token store.
///
/// Fields stay private to the cache module: other components only ever see
/// the token value handed out by `TokenStore::acquire`.
#[derive(Clone)]
pub struct Credential {
    value: String,
    valid_until: DateTime<Utc>,
    issued_from: String,
}

impl Credential {
    /// Never-fetched credential.
    pub(super) fn empty() -> Self {
        Self {
            value: String::new(),
            valid_until: far_past(),
            issued_from: String::new(),
        }
    }

    pub(super) fn new(value: String, valid_until: DateTime<Utc>, issued_from: String) -> Self {
        Self { value, valid_until, issued_from }
    }

    /// Token value if still valid at `now`.
    pub(super) fn valid_value(&self, now: DateTime<Utc>) -> Option<&str> {
        if !self.value.is_empty() && now < self.valid_until {
            Some(&self.value)
        } else {
            None
        }
    }

    pub(super) fn expire(&mut self) {
        self.valid_until = far_past();
    }

    pub(super) fn value(&self) -> &str {
        &self.value
    }

    pub(super) fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &if self.value.is_empty() { "<empty>" } else { "***" })
            .field("valid_until", &self.valid_until)
            .field("issued_from", &self.issued_from)
            .finish()
    }
}
