use std::time::{Duration, Instant};

/// Blocking fixed-rate ticker for the background worker.
pub struct Ticker {
    expires_at: Instant,
    period: Duration,
}

impl Ticker {
    /// Creates a new ticker that ticks at the specified interval.
    pub fn every(period: Duration) -> Self {
        Self {
            expires_at: Instant::now() + period,
            period,
        }
    }

    /// Waits for the next tick.
    ///
    /// If a blocking operation made the caller miss one or more ticks, the
    /// missed ticks are skipped instead of fired back to back.
    pub fn next(&mut self) {
        let now = Instant::now();

        match self.expires_at.checked_duration_since(now) {
            Some(remaining) => std::thread::sleep(remaining),
            None if now - self.expires_at > self.period => {
                self.expires_at = now;
            }
            None => {}
        }

        self.expires_at += self.period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_at_rate() {
        let start = Instant::now();
        let mut ticker = Ticker::every(Duration::from_millis(5));
        for _ in 0..4 {
            ticker.next();
        }
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_missed_ticks_are_skipped() {
        let mut ticker = Ticker::every(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(30));

        // The first tick fires immediately, the second waits a full period
        let start = Instant::now();
        ticker.next();
        ticker.next();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }
}
