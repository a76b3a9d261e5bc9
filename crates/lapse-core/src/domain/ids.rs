//! Request identifiers.
//!
//! The queue only needs a stable string per live item. Ids produced by this
//! crate are ULID based (`req-<ulid>`), which keeps them unique without any
//! coordination and sortable by creation time. Ids supplied by callers can be
//! any string.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

const PREFIX: &str = "req-";

/// Identifier of a tracked request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{PREFIX}{ulid}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ULID part, when the id was generated by this crate.
    pub fn ulid(&self) -> Option<Ulid> {
        self.0
            .strip_prefix(PREFIX)
            .and_then(|raw| Ulid::from_string(raw).ok())
    }
}

impl From<Ulid> for RequestId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
