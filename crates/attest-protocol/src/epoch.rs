//! Wall-clock aligned epochs.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;

/// Default epoch length in milliseconds.
pub const DEFAULT_EPOCH_MS: u64 = 12_000;

/// A fixed-duration bucket aligned to multiples of its duration since the
/// Unix epoch. Independent of playlist sequence numbers, so two processes
/// watching the same stream agree on boundaries as far as their clocks agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epoch {
    /// Start of the bucket in Unix milliseconds (inclusive)
    pub start: u64,

    /// Bucket length in milliseconds
    pub duration_ms: u64,
}

impl Epoch {
    /// The epoch containing `now_ms`. Boundaries are inclusive at the start.
    pub fn containing(now_ms: u64, duration_ms: NonZeroU64) -> Self {
        let duration_ms = duration_ms.get();
        Self {
            start: (now_ms / duration_ms) * duration_ms,
            duration_ms,
        }
    }

    /// End of the bucket (exclusive).
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.duration_ms)
    }

    pub fn contains(&self, t_ms: u64) -> bool {
        t_ms >= self.start && t_ms < self.end()
    }

    /// The epoch immediately before this one.
    pub fn previous(&self) -> Self {
        Self {
            start: self.start.saturating_sub(self.duration_ms),
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> NonZeroU64 {
        NonZeroU64::new(v).unwrap()
    }

    #[test]
    fn test_flooring() {
        assert_eq!(Epoch::containing(25_500, ms(12_000)).start, 24_000);
        assert_eq!(Epoch::containing(0, ms(12_000)).start, 0);
        assert_eq!(Epoch::containing(11_999, ms(12_000)).start, 0);
    }

    #[test]
    fn test_boundary_inclusive() {
        let epoch = Epoch::containing(12_000, ms(12_000));
        assert_eq!(epoch.start, 12_000);
        assert!(epoch.contains(12_000));
        assert!(!epoch.contains(24_000));
        assert_eq!(epoch.end(), 24_000);
    }

    #[test]
    fn test_previous() {
        let epoch = Epoch::containing(36_100, ms(12_000));
        assert_eq!(epoch.previous().start, 24_000);
        assert_eq!(Epoch::containing(5, ms(12_000)).previous().start, 0);
    }

    #[test]
    fn test_wire_shape() {
        let epoch = Epoch::containing(25_500, ms(12_000));
        let json = serde_json::to_value(epoch).unwrap();
        assert_eq!(json, serde_json::json!({"start": 24000, "durationMs": 12000}));
    }
}
