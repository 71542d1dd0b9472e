use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Admission times of recent and reserved requests, sorted ascending.
///
/// Admissions leave the window once they are older than its length, never
/// because newer ones arrive.
#[derive(Debug, Clone)]
pub(crate) struct Window {
    admissions: VecDeque<Instant>,
    capacity: usize,
    length: Duration,
}

impl Window {
    /// A window admitting at most `capacity` requests per `length`
    pub(crate) fn new(capacity: usize, length: Duration) -> Self {
        Self {
            admissions: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            length,
        }
    }

    /// Reserve the earliest admission time at or after `now` that keeps
    /// at most `capacity` admissions within any window.
    ///
    /// The returned time is recorded right away, so concurrent callers get
    /// distinct slots.
    pub(crate) fn reserve(&mut self, now: Instant) -> Instant {
        self.expire(now);

        let count = self.admissions.len();
        let admit_at = if count < self.capacity {
            now
        } else {
            // wait until the admission `capacity` places back leaves the window
            now.max(self.admissions[count - self.capacity] + self.length)
        };
        self.admissions.push_back(admit_at);
        admit_at
    }

    /// Return a slot handed out by [`Window::reserve`] that went unused
    pub(crate) fn cancel(&mut self, admit_at: Instant) {
        if let Some(index) = self.admissions.iter().rposition(|&at| at == admit_at) {
            self.admissions.remove(index);
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.admissions.front()
            && oldest + self.length <= now
        {
            self.admissions.pop_front();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.admissions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_immediately_below_capacity() {
        let now = Instant::now();
        let mut window = Window::new(3, Duration::from_secs(1));

        assert_eq!(window.reserve(now), now);
        assert_eq!(window.reserve(now), now);
        assert_eq!(window.reserve(now), now);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_full_window_delays_until_oldest_expires() {
        let start = Instant::now();
        let mut window = Window::new(2, Duration::from_secs(1));

        window.reserve(start);
        window.reserve(start + Duration::from_millis(300));

        let third = window.reserve(start + Duration::from_millis(400));
        assert_eq!(third, start + Duration::from_secs(1));
        assert_eq!(window.len(), 3);

        // the next slot follows the second admission
        let fourth = window.reserve(start + Duration::from_millis(400));
        assert_eq!(fourth, start + Duration::from_millis(1300));
    }

    #[test]
    fn test_old_admissions_do_not_delay() {
        let start = Instant::now();
        let mut window = Window::new(1, Duration::from_secs(1));

        window.reserve(start);
        let later = start + Duration::from_secs(5);
        assert_eq!(window.reserve(later), later);
    }

    #[test]
    fn test_cancel_frees_slot() {
        let start = Instant::now();
        let mut window = Window::new(1, Duration::from_secs(1));

        let first = window.reserve(start);
        window.cancel(first);
        assert_eq!(window.len(), 0);
        assert_eq!(window.reserve(start), start);
    }

    #[test]
    fn test_cancel_keeps_earlier_admissions() {
        let start = Instant::now();
        let mut window = Window::new(3, Duration::from_secs(1));
        for _ in 0..3 {
            window.reserve(start);
        }

        let delayed = window.reserve(start);
        assert_eq!(delayed, start + Duration::from_secs(1));
        window.cancel(delayed);

        // the window is still full with the first three admissions
        let next = window.reserve(start + Duration::from_millis(100));
        assert_eq!(next, start + Duration::from_secs(1));
    }

    #[test]
    fn test_expired_admissions_are_dropped() {
        let start = Instant::now();
        let mut window = Window::new(2, Duration::from_secs(1));
        window.reserve(start);
        window.reserve(start + Duration::from_millis(500));

        let now = start + Duration::from_secs(1);
        assert_eq!(window.reserve(now), now);
        assert_eq!(window.len(), 2);
    }
}
