use serde::Serialize;

/// One message that could not be delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageError {
    pub message_id: i32,
    pub error: String,
}

/// Outcome of a completed run. `sent + failed == total` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationResult {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub topics_created: usize,
    pub errors: Vec<MessageError>,
}

/// Per-run accumulator. Created fresh for every run and consumed by `finish`.
#[derive(Debug)]
pub(crate) struct RunTally {
    total: usize,
    sent: usize,
    errors: Vec<MessageError>,
    topics_created: usize,
}

impl RunTally {
    pub fn new(total: usize, topics_created: usize) -> Self {
        Self {
            total,
            sent: 0,
            errors: Vec::new(),
            topics_created,
        }
    }

    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub fn record_failed(&mut self, message_id: i32, error: impl ToString) {
        self.errors.push(MessageError {
            message_id,
            error: error.to_string(),
        });
    }

    pub fn processed(&self) -> usize {
        self.sent + self.errors.len()
    }

    pub fn finish(self) -> MigrationResult {
        debug_assert_eq!(self.processed(), self.total);
        MigrationResult {
            total: self.total,
            sent: self.sent,
            failed: self.errors.len(),
            topics_created: self.topics_created,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_add_up() {
        let mut tally = RunTally::new(3, 1);
        tally.record_sent();
        tally.record_failed(42, "Bad Request: chat not found");
        tally.record_sent();
        let result = tally.finish();
        assert_eq!(result.sent, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.sent + result.failed, result.total);
        assert_eq!(result.topics_created, 1);
        assert_eq!(result.errors[0].message_id, 42);
    }
}
