//! Subscription identifiers.
//!
//! # ULID ベースの ID
//! `Dispatcher::run` のたびに ULID を発行し、並行する subscription のログと
//! summary を区別できるようにする。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 収集した summary が生成順に並ぶ
//! - **分散生成可能**: 調整なしで生成できる

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Ulid);

impl SubscriptionId {
    pub fn generate() -> Self {
        let timestamp_ms = Utc::now().timestamp_millis() as u64;
        Self(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = SubscriptionId::generate();
        let b = SubscriptionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_has_prefix() {
        let id = SubscriptionId::from_ulid(Ulid::nil());
        assert_eq!(id.to_string(), format!("sub-{}", Ulid::nil()));
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = SubscriptionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
    }
}
