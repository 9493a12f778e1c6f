use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::model::{CapturedMessage, ChannelId};

use super::delivery::{DeliveryEngine, DeliveryLimits};
use super::pacer::{RatePacer, RetryPolicy};
use super::progress::{ProgressReporter, ProgressTracker};
use super::remap::{build_topic_mapping, TopicMapping};
use super::result::{MigrationResult, RunTally};
use super::{MessageSource, MigrationError, SendError, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationSettings {
    pub messages_per_second: f64,
    pub progress_interval: usize,
    pub limits: DeliveryLimits,
    pub retry: RetryPolicy,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            messages_per_second: 20.0,
            progress_interval: 100,
            limits: DeliveryLimits::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    TopicMapping,
    Sending,
    Completed,
    Aborted,
}

/// Replays one channel's captured history into another.
///
/// A `Migrator` holds no per-run state; every `run` builds its own topic
/// mapping and tally, so one instance can serve consecutive runs. Runs
/// against the same target must be serialized by the caller.
pub struct Migrator<'a> {
    store: &'a dyn MessageSource,
    transport: &'a dyn Transport,
    settings: MigrationSettings,
}

impl<'a> Migrator<'a> {
    pub fn new(
        store: &'a dyn MessageSource,
        transport: &'a dyn Transport,
        settings: MigrationSettings,
    ) -> Self {
        Self {
            store,
            transport,
            settings,
        }
    }

    pub async fn run(
        &self,
        source: ChannelId,
        target: ChannelId,
        progress: &dyn ProgressReporter,
    ) -> Result<MigrationResult, MigrationError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("migration", %run_id, %source, %target);
        self.run_inner(source, target, progress)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        source: ChannelId,
        target: ChannelId,
        progress: &dyn ProgressReporter,
    ) -> Result<MigrationResult, MigrationError> {
        let mut phase = Phase::Idle;
        transition(&mut phase, Phase::TopicMapping);

        let messages = match self.load_source(source).await {
            Ok(messages) => messages,
            Err(e) => {
                transition(&mut phase, Phase::Aborted);
                error!("Migration aborted: {}", e);
                return Err(e);
            }
        };
        let topics = match self.store.topics(source).await {
            Ok(topics) => topics,
            Err(e) => {
                transition(&mut phase, Phase::Aborted);
                return Err(MigrationError::Store(e));
            }
        };

        info!(
            "Starting reinitialization: {} messages from {} to {}",
            messages.len(),
            source,
            target
        );

        let mapping = build_topic_mapping(self.transport, target, &topics).await;
        if mapping.is_empty() && !topics.is_empty() {
            info!("No topics mapped; every message goes to the target's general chat");
        }

        transition(&mut phase, Phase::Sending);
        let result = self.send_all(target, &messages, &mapping, progress).await;

        transition(&mut phase, Phase::Completed);
        info!(
            "Reinitialization complete: {} sent, {} failed",
            result.sent, result.failed
        );
        Ok(result)
    }

    /// Abort preconditions: the source must exist and hold messages.
    async fn load_source(&self, source: ChannelId) -> Result<Vec<CapturedMessage>, MigrationError> {
        let channel = self
            .store
            .channel(source)
            .await
            .map_err(MigrationError::Store)?;
        if channel.is_none() {
            return Err(MigrationError::NotFound(source));
        }

        let messages = self
            .store
            .messages(source)
            .await
            .map_err(MigrationError::Store)?;
        if messages.is_empty() {
            return Err(MigrationError::EmptySource(source));
        }
        Ok(messages)
    }

    async fn send_all(
        &self,
        target: ChannelId,
        messages: &[CapturedMessage],
        mapping: &TopicMapping,
        progress: &dyn ProgressReporter,
    ) -> MigrationResult {
        let delivery = DeliveryEngine::new(self.transport, &self.settings.limits);
        let mut pacer = RatePacer::new(self.settings.messages_per_second);
        debug!("Pacing sends {:?} apart", pacer.interval());
        let tracker = ProgressTracker::new(progress, self.settings.progress_interval, messages.len());
        let mut tally = RunTally::new(messages.len(), mapping.created());

        for message in messages {
            let topic = mapping.resolve(message.topic_id);
            let payload = delivery.prepare(&message.content);

            pacer.wait().await;
            let mut retries = 0;
            let outcome = loop {
                match delivery.deliver(target, topic, &payload).await {
                    Err(SendError::Throttled { retry_after })
                        if self.settings.retry.allows_retry(retries) =>
                    {
                        pacer.absorb_throttle(retry_after).await;
                        retries += 1;
                    }
                    other => break other,
                }
            };
            pacer.mark_sent();

            match outcome {
                Ok(()) => tally.record_sent(),
                Err(e) => {
                    error!("Failed to send message {}: {}", message.message_id, e);
                    tally.record_failed(message.message_id, e);
                }
            }

            tracker.tick(tally.processed()).await;
        }

        tracker.finish().await;
        tally.finish()
    }
}

fn transition(phase: &mut Phase, next: Phase) {
    debug!("Migration phase {:?} -> {:?}", phase, next);
    *phase = next;
}
