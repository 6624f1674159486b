//! Local identifier generation

use std::sync::atomic::{AtomicI64, Ordering};

use uuid::Uuid;

/// Monotonic millisecond clock for locally generated ids.
///
/// Returns the current Unix time in milliseconds, bumped past the previous
/// value when two calls land in the same millisecond, so ids never repeat
/// within a process.
#[derive(Debug, Default)]
pub struct LocalIdGenerator {
    last: AtomicI64,
}

impl LocalIdGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Next strictly increasing id
    pub fn next_id(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }

    /// Composite id for a record owned by `trip_id`
    pub fn next_child_id(&self, trip_id: i64) -> String {
        format!("{trip_id}-{}", self.next_id())
    }
}

/// Random time-sortable id (UUID v7) as a string
pub fn new_uuid_string() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rapid_ids_never_repeat() {
        let ids = LocalIdGenerator::new();
        let generated: Vec<i64> = (0..1_000).map(|_| ids.next_id()).collect();
        let unique: HashSet<i64> = generated.iter().copied().collect();
        assert_eq!(unique.len(), generated.len());
        assert!(generated.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn child_ids_embed_trip_id() {
        let ids = LocalIdGenerator::new();
        let id = ids.next_child_id(42);
        assert!(id.starts_with("42-"));
    }

    #[test]
    fn uuid_strings_are_unique() {
        assert_ne!(new_uuid_string(), new_uuid_string());
    }
}
