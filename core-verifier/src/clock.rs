use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Source of the current time, in seconds since the UNIX epoch.
pub trait Clock {
    fn now(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Arc<AtomicU32>);

impl ManualClock {
    pub fn new(now: u32) -> Self {
        Self(Arc::new(AtomicU32::new(now)))
    }

    pub fn set(&self, now: u32) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u32) {
        let _ = self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new(10);
        let handle = clock.clone();

        handle.advance(5);
        assert_eq!(15, clock.now());
        handle.set(100);
        assert_eq!(100, clock.now());
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
