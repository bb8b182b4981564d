//! Wall-clock source for vault operations.
//!
//! Every RPC handler reads the time once and passes it down, so one request
//! settles, accrues and records events at a single timestamp.

use std::sync::Arc;

use harbor_types::Timestamp;

/// Shared time source.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Current Unix time in seconds.
pub fn system_now() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Clock backed by the system time.
pub fn system() -> Clock {
    Arc::new(system_now)
}

/// Manually advanced clock for tests.
#[cfg(test)]
#[derive(Clone)]
pub struct ManualClock(Arc<std::sync::atomic::AtomicU64>);

#[cfg(test)]
impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Arc::new(std::sync::atomic::AtomicU64::new(start)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn clock(&self) -> Clock {
        let now = self.0.clone();
        Arc::new(move || now.load(std::sync::atomic::Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_recent() {
        // 2023-11-14
        assert!(system()() > 1_700_000_000);
    }

    #[test]
    fn test_manual_clock() {
        let manual = ManualClock::new(1_000);
        let clock = manual.clock();
        assert_eq!(clock(), 1_000);
        manual.advance(60);
        assert_eq!(clock(), 1_060);
    }
}
