use crate::task::TaskId;
use chrono::Utc;

/// Largest id a stored payload may carry (`Number.MAX_SAFE_INTEGER`).
pub const MAX_ID: TaskId = (1 << 53) - 1;

/// Issues epoch-millisecond ids that never repeat within one generator.
///
/// Two calls inside the same millisecond would collide on the raw clock, so
/// each id is at least one greater than the last one issued or observed.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: TaskId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an id already in use (e.g. loaded from storage).
    pub fn observe(&mut self, id: TaskId) {
        self.last = self.last.max(id);
    }

    pub fn next_id(&mut self) -> TaskId {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&mut self, now_ms: TaskId) -> TaskId {
        let id = match self.last.checked_add(1) {
            Some(after_last) => now_ms.max(after_last),
            None => {
                log::error!("task ids exhausted at {}, falling back to the clock", self.last);
                now_ms
            }
        };
        self.last = self.last.max(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_clock_when_ahead() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next_at(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn same_millisecond_still_distinct() {
        let mut ids = IdGenerator::new();
        let a = ids.next_at(42);
        let b = ids.next_at(42);
        assert_eq!((a, b), (42, 43));
    }

    #[test]
    fn observed_ids_are_skipped() {
        let mut ids = IdGenerator::new();
        ids.observe(5_000);
        assert_eq!(ids.next_at(10), 5_001);
    }

    #[test]
    fn exhausted_ids_do_not_panic() {
        let mut ids = IdGenerator::new();
        ids.observe(TaskId::MAX);
        assert_eq!(ids.next_at(42), 42);
    }

    #[test]
    fn real_clock_ids_increase() {
        let mut ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
    }
}
