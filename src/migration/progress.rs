use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Receives `(processed, total)` updates while a migration runs.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, current: usize, total: usize) -> Result<()>;
}

/// Reporter for callers that don't care about progress.
#[cfg(test)]
pub struct NoProgress;

#[cfg(test)]
#[async_trait]
impl ProgressReporter for NoProgress {
    async fn report(&self, _current: usize, _total: usize) -> Result<()> {
        Ok(())
    }
}

/// Decides when to report and swallows reporter failures.
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    interval: usize,
    total: usize,
}

impl<'a> ProgressTracker<'a> {
    /// An `interval` of 0 disables periodic reports; the final one still fires.
    pub fn new(reporter: &'a dyn ProgressReporter, interval: usize, total: usize) -> Self {
        Self {
            reporter,
            interval,
            total,
        }
    }

    pub fn is_due(&self, processed: usize) -> bool {
        self.interval > 0 && processed > 0 && processed % self.interval == 0
    }

    /// Call after each processed message.
    pub async fn tick(&self, processed: usize) {
        if self.is_due(processed) {
            self.emit(processed).await;
        }
    }

    /// Unconditional `(total, total)` report after the loop.
    pub async fn finish(&self) {
        self.emit(self.total).await;
    }

    async fn emit(&self, current: usize) {
        if let Err(e) = self.reporter.report(current, self.total).await {
            debug!("Progress report {}/{} failed: {:#}", current, self.total, e);
        }
    }
}
