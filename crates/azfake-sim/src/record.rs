use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use azfake_domain::CloudError;

/// One observed invocation: what the caller sent and what it got back.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall<I, O> {
    pub input: I,
    pub outcome: Result<O, CloudError>,
}

impl<I, O> RecordedCall<I, O> {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Append-only history of calls to one operation.
///
/// Tests consume it with [`pop`](CallRecord::pop), which hands back calls in
/// the order they were made.
pub struct CallRecord<I, O> {
    calls: Mutex<VecDeque<RecordedCall<I, O>>>,
}

impl<I, O> CallRecord<I, O> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RecordedCall<I, O>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, input: I, outcome: Result<O, CloudError>) {
        self.lock().push_back(RecordedCall { input, outcome });
    }

    /// Remove and return the oldest call.
    pub fn pop(&self) -> Option<RecordedCall<I, O>> {
        self.lock().pop_front()
    }

    /// Remove and return the most recent call.
    pub fn pop_latest(&self) -> Option<RecordedCall<I, O>> {
        self.lock().pop_back()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<I: Clone, O: Clone> CallRecord<I, O> {
    /// Copy of every recorded call, oldest first, without consuming them.
    pub fn snapshot(&self) -> Vec<RecordedCall<I, O>> {
        self.lock().iter().cloned().collect()
    }
}

impl<I, O> Default for CallRecord<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> fmt::Debug for CallRecord<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecord").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use azfake_domain::ResourceKind;

    use super::*;

    #[test]
    fn pop_is_fifo() {
        let record: CallRecord<&str, u32> = CallRecord::new();
        record.push("first", Ok(1));
        record.push("second", Err(CloudError::not_found(ResourceKind::Subnet, "x")));
        record.push("third", Ok(3));
        assert_eq!(record.len(), 3);

        assert_eq!(record.pop().unwrap().input, "first");
        let latest = record.pop_latest().unwrap();
        assert_eq!(latest.input, "third");
        let failed = record.pop().unwrap();
        assert!(!failed.succeeded());
        assert!(record.pop().is_none());
    }

    #[test]
    fn snapshot_does_not_consume() {
        let record: CallRecord<u8, ()> = CallRecord::new();
        record.push(1, Ok(()));
        assert_eq!(record.snapshot().len(), 1);
        assert_eq!(record.len(), 1);
        record.clear();
        assert!(record.is_empty());
    }
}
