//! Unix timestamps for record ordering and payment expiry.
//!
//! Every configuration row carries an `updated_at` used to pick the most recent
//! active row for a route, and every payment carries an `expires_at` checked by
//! the expiry sweeper.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::SystemTime;

/// Seconds since the Unix epoch (1970-01-01T00:00:00Z).
///
/// Serialized as a plain JSON integer.
///
/// ```
/// use paybridge_types::timestamp::UnixTimestamp;
///
/// let created = UnixTimestamp::from_secs(1_700_000_000);
/// let expires = created + 3600;
/// assert!(expires.is_after(created));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// A clock set before the epoch reads as the epoch itself.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_after(&self, other: UnixTimestamp) -> bool {
        self.0 > other.0
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_add(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_integer() {
        let ts = UnixTimestamp::from_secs(1699999999);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1699999999");
        let back: UnixTimestamp = serde_json::from_str("1699999999").unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_add_saturates() {
        let ts = UnixTimestamp::from_secs(u64::MAX - 1);
        assert_eq!((ts + 10).as_secs(), u64::MAX);
    }

    #[test]
    fn test_now_is_recent() {
        // 2020-01-01
        assert!(UnixTimestamp::now().as_secs() > 1_577_836_800);
    }
}
