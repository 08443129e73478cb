//! The update tag stamped on every node and relationship touched by a run.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Numeric label for one synchronization run.
///
/// Every write made during a run sets `lastupdated` to this value; cleanup
/// jobs delete nodes/edges whose `lastupdated` differs from it. Tags must be
/// strictly comparable, so the default is the unix timestamp at run start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateTag(pub i64);

impl UpdateTag {
    /// Tag for a run starting now (unix seconds).
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UpdateTag {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for UpdateTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_ordered() {
        assert!(UpdateTag(100) < UpdateTag(200));
    }

    #[test]
    fn now_is_positive() {
        assert!(UpdateTag::now().as_i64() > 0);
    }
}
