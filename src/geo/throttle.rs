use std::time::Duration;

use tokio::time::Instant;

/// Admits at most one event per `min_interval`; events in between are dropped.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_admitted: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_admitted {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }

        self.last_admitted = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::Throttle;

    #[test]
    fn drops_events_inside_the_window() {
        let mut throttle = Throttle::new(Duration::from_secs(2));
        let start = Instant::now();

        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_millis(500)));
        assert!(!throttle.admit(start + Duration::from_millis(1_999)));
        assert!(throttle.admit(start + Duration::from_secs(2)));
    }

    #[test]
    fn dropped_events_do_not_extend_the_window() {
        let mut throttle = Throttle::new(Duration::from_secs(2));
        let start = Instant::now();

        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_millis(1_500)));
        assert!(throttle.admit(start + Duration::from_millis(2_100)));
    }
}
