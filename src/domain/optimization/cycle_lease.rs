use crate::domain::market::MarketKey;
use chrono::{DateTime, Duration, Utc};

/// Mutual-exclusion token for one market key. Expires so that a crashed
/// holder cannot block the key forever.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleLease {
    pub key: MarketKey,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CycleLease {
    pub fn new(key: MarketKey, holder: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key,
            holder: holder.into(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaseAcquisition {
    Acquired(CycleLease),
    Held { holder: String, expires_at: DateTime<Utc> },
}
