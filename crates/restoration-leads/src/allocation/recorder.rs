use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::domain::{AssignmentDecision, LeadId, LeadStatus};

/// Outcome events appended for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    Decision(AssignmentDecision),
    LeadStateChanged {
        lead_id: LeadId,
        from: LeadStatus,
        to: LeadStatus,
        at: DateTime<Utc>,
    },
}

impl RecordedEvent {
    pub fn lead_id(&self) -> &LeadId {
        match self {
            RecordedEvent::Decision(decision) => &decision.lead_id,
            RecordedEvent::LeadStateChanged { lead_id, .. } => lead_id,
        }
    }
}

/// Fire-and-forget recording hook. Implementations must not block the caller on
/// delivery and must never report failure back into the allocation path.
pub trait DecisionRecorder: Send + Sync {
    fn record(&self, event: RecordedEvent);
}

/// External persistence/notification boundary the recorder delivers to.
pub trait DecisionSink: Send + Sync + 'static {
    fn deliver(&self, event: &RecordedEvent) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("event sink unavailable: {0}")]
    Transport(String),
}

/// Bounded retry with exponential backoff for sink delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub(crate) fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Bounds for the recorder queue and for events waiting out a retry backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub capacity: usize,
    pub max_retrying: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            capacity: 1_024,
            max_retrying: 256,
        }
    }
}

/// Recorder that queues events and delivers them from a background task.
///
/// The worker makes the first delivery attempt itself; an event that fails moves to
/// its own retry task so the events queued behind it are not held up. When the queue
/// or the retry set is full the event is logged and dropped.
#[derive(Debug, Clone)]
pub struct QueuedRecorder {
    sender: mpsc::Sender<RecordedEvent>,
}

impl QueuedRecorder {
    /// Start the delivery worker on the current tokio runtime with default limits.
    pub fn spawn<S>(sink: Arc<S>, policy: RetryPolicy) -> (Self, JoinHandle<()>)
    where
        S: DecisionSink,
    {
        Self::spawn_with_limits(sink, policy, QueueLimits::default())
    }

    /// The worker exits once every `QueuedRecorder` clone has been dropped, the queue is
    /// drained and every pending retry has finished.
    pub fn spawn_with_limits<S>(
        sink: Arc<S>,
        policy: RetryPolicy,
        limits: QueueLimits,
    ) -> (Self, JoinHandle<()>)
    where
        S: DecisionSink,
    {
        let (sender, mut receiver) = mpsc::channel::<RecordedEvent>(limits.capacity.max(1));
        let handle = tokio::spawn(async move {
            let mut retries = JoinSet::new();
            loop {
                tokio::select! {
                    received = receiver.recv() => {
                        let Some(event) = received else { break };
                        let Err(err) = sink.deliver(&event) else { continue };
                        if policy.max_attempts <= 1 {
                            abandon(&event, 1, &err);
                        } else if retries.len() >= limits.max_retrying {
                            warn!(
                                lead_id = %event.lead_id(),
                                error = %err,
                                retrying = retries.len(),
                                "retry set full; event dropped"
                            );
                        } else {
                            retries.spawn(retry_delivery(sink.clone(), event, policy, err));
                        }
                    }
                    Some(_) = retries.join_next(), if !retries.is_empty() => {}
                }
            }
            while retries.join_next().await.is_some() {}
            debug!("decision recorder queue closed");
        });
        (Self { sender }, handle)
    }
}

impl DecisionRecorder for QueuedRecorder {
    fn record(&self, event: RecordedEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(lead_id = %event.lead_id(), "decision recorder queue full; event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                warn!(lead_id = %event.lead_id(), "decision recorder stopped; event dropped");
            }
        }
    }
}

/// Attempts 2..=max for one event whose first delivery failed with `first_error`.
async fn retry_delivery<S>(
    sink: Arc<S>,
    event: RecordedEvent,
    policy: RetryPolicy,
    first_error: SinkError,
) where
    S: DecisionSink,
{
    let mut last_error = first_error;
    for attempt in 2..=policy.max_attempts {
        let backoff = policy.backoff_for(attempt - 1);
        warn!(
            lead_id = %event.lead_id(),
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %last_error,
            "event delivery failed, retrying"
        );
        tokio::time::sleep(backoff).await;
        match sink.deliver(&event) {
            Ok(()) => return,
            Err(err) => last_error = err,
        }
    }
    abandon(&event, policy.max_attempts, &last_error);
}

fn abandon(event: &RecordedEvent, attempts: u32, error: &SinkError) {
    warn!(
        lead_id = %event.lead_id(),
        attempts,
        error = %error,
        "event delivery abandoned"
    );
}

/// Sink that writes each event to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DecisionSink for TracingSink {
    fn deliver(&self, event: &RecordedEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| SinkError::Transport(format!("serialize event: {err}")))?;
        info!(lead_id = %event.lead_id(), %payload, "lead event recorded");
        Ok(())
    }
}
