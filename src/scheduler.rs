//! Delayed, strictly ordered reply delivery
//!
//! Every enqueued request is classified immediately and given a deadline
//! of `enqueue time + delay`. A single delivery task walks the queue front
//! to back, waiting for each deadline in turn, so replies always come out
//! in submission order even when a later deadline expires first.

mod delay;

pub use delay::{DelayPolicy, FixedDelay, JitteredDelay};

use crate::classifier::{Intent, RuleTable};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A classified reply that has waited out its delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReply {
    pub seq: u64,
    pub intent: Intent,
    pub text: &'static str,
}

#[derive(Debug, Error)]
#[error("Response scheduler has been shut down")]
pub struct SchedulerClosed;

/// Queue entry: the reply is already known, only its deadline is pending
#[derive(Debug)]
struct PendingReply {
    reply: ScheduledReply,
    deadline: Instant,
}

pub struct ResponseScheduler {
    rules: &'static RuleTable,
    delay: Arc<dyn DelayPolicy>,
    queue_tx: mpsc::UnboundedSender<PendingReply>,
    cancel: CancellationToken,
    next_seq: AtomicU64,
    delivery_task: Mutex<Option<JoinHandle<usize>>>,
}

impl ResponseScheduler {
    /// Spawn the delivery task. `deliver` is called once per reply, in
    /// submission order, from that task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<D>(
        rules: &'static RuleTable,
        delay: Arc<dyn DelayPolicy>,
        cancel: CancellationToken,
        deliver: D,
    ) -> Self
    where
        D: FnMut(ScheduledReply) + Send + 'static,
    {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let delivery_task = tokio::spawn(deliver_in_order(queue_rx, cancel.clone(), deliver));

        Self {
            rules,
            delay,
            queue_tx,
            cancel,
            next_seq: AtomicU64::new(1),
            delivery_task: Mutex::new(Some(delivery_task)),
        }
    }

    /// Classify `text` and queue its reply. Returns the request's sequence
    /// number. Never blocks.
    pub fn enqueue(&self, text: &str) -> Result<u64, SchedulerClosed> {
        if self.is_closed() {
            return Err(SchedulerClosed);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let classification = self.rules.classify(text);
        let delay = self.delay.delay_for(seq);

        tracing::debug!(
            seq,
            intent = classification.intent.as_str(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reply scheduled"
        );

        self.queue_tx
            .send(PendingReply {
                reply: ScheduledReply {
                    seq,
                    intent: classification.intent,
                    text: classification.response,
                },
                deadline: Instant::now() + delay,
            })
            .map_err(|_| SchedulerClosed)?;

        Ok(seq)
    }

    /// True once torn down, or once the delivery task has stopped on its own.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.queue_tx.is_closed()
    }

    /// Stop delivering. Replies still queued are dropped.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Close and wait for the delivery task to exit. Returns how many
    /// queued replies were discarded. Later calls return 0.
    pub async fn shutdown(&self) -> usize {
        self.close();

        let task = self
            .delivery_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match task {
            Some(task) => match task.await {
                Ok(discarded) => discarded,
                Err(e) => {
                    tracing::error!(error = %e, "Reply delivery task failed");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for ResponseScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn deliver_in_order<D>(
    mut queue_rx: mpsc::UnboundedReceiver<PendingReply>,
    cancel: CancellationToken,
    mut deliver: D,
) -> usize
where
    D: FnMut(ScheduledReply),
{
    let mut discarded = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = queue_rx.recv() => next,
        };
        let Some(PendingReply { reply, deadline }) = next else {
            break;
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                discarded += 1;
                break;
            }
            () = tokio::time::sleep_until(deadline) => {
                tracing::debug!(seq = reply.seq, "Delivering reply");
                deliver(reply);
            }
        }
    }

    queue_rx.close();
    while queue_rx.try_recv().is_ok() {
        discarded += 1;
    }

    if discarded > 0 {
        tracing::info!(discarded, "Discarded undelivered replies");
    }
    discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::rules::{
        FALLBACK_RESPONSE, PEST_CONTROL_RESPONSE, SOIL_FERTILITY_RESPONSE, WATERING_RESPONSE,
    };
    use crate::classifier::FARMING;
    use std::time::Duration;

    type Delivered = Arc<Mutex<Vec<(ScheduledReply, Duration)>>>;

    /// Scheduler that records each delivery with its time since `start`
    fn recording_scheduler(delay: Arc<dyn DelayPolicy>) -> (ResponseScheduler, Delivered) {
        let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();
        let sink = Arc::clone(&delivered);
        let scheduler = ResponseScheduler::start(
            &FARMING,
            delay,
            CancellationToken::new(),
            move |reply| {
                sink.lock().unwrap().push((reply, start.elapsed()));
            },
        );
        (scheduler, delivered)
    }

    /// Paused-clock timers fire on millisecond ticks
    fn near(at: Duration, millis: u64) -> bool {
        let expected = Duration::from_millis(millis);
        at >= expected && at <= expected + Duration::from_millis(5)
    }

    fn texts(delivered: &Delivered) -> Vec<&'static str> {
        delivered.lock().unwrap().iter().map(|(r, _)| r.text).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_arrives_after_delay() {
        let (scheduler, delivered) =
            recording_scheduler(Arc::new(FixedDelay(Duration::from_millis(1500))));

        let seq = scheduler.enqueue("How often should I water tomatoes?").unwrap();
        assert_eq!(seq, 1);

        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert!(delivered.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0.intent, Intent::Watering);
        assert_eq!(delivered[0].0.text, WATERING_RESPONSE);
        assert!(near(delivered[0].1, 1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_measured_from_enqueue() {
        let (scheduler, delivered) =
            recording_scheduler(Arc::new(FixedDelay(Duration::from_millis(1500))));

        scheduler.enqueue("first").unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        scheduler.enqueue("second").unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(near(delivered[0].1, 1500));
        // Not 1500 + 1500: the second timer ran while the first was waiting
        assert!(near(delivered[1].1, 2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_when_later_timer_fires_first() {
        // First request waits longest, second shortest
        let policy = |seq: u64| match seq {
            1 => Duration::from_millis(3000),
            2 => Duration::from_millis(10),
            _ => Duration::from_millis(500),
        };
        let (scheduler, delivered) = recording_scheduler(Arc::new(policy));

        scheduler.enqueue("pest help").unwrap();
        scheduler.enqueue("fertilizer help").unwrap();
        scheduler.enqueue("anything else").unwrap();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(delivered.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(
            texts(&delivered),
            vec![PEST_CONTROL_RESPONSE, SOIL_FERTILITY_RESPONSE, FALLBACK_RESPONSE]
        );
        // Overdue replies go out together right behind the slow one
        assert!(delivered
            .lock()
            .unwrap()
            .iter()
            .all(|(_, at)| near(*at, 3000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_with_jitter() {
        let policy = JitteredDelay {
            base: Duration::from_millis(1500),
            jitter: Duration::from_millis(1400),
        };
        let (scheduler, delivered) = recording_scheduler(Arc::new(policy));

        let count: u64 = 40;
        for i in 0..count {
            scheduler.enqueue(&format!("question {i}")).unwrap();
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        let seqs: Vec<u64> = delivered.lock().unwrap().iter().map(|(r, _)| r.seq).collect();
        assert_eq!(seqs, (1..=count).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_queued_replies() {
        let (scheduler, delivered) =
            recording_scheduler(Arc::new(FixedDelay(Duration::from_millis(1500))));

        scheduler.enqueue("water").unwrap();
        scheduler.enqueue("pest").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(scheduler.shutdown().await, 2);
        assert!(scheduler.is_closed());
        assert!(scheduler.enqueue("rain").is_err());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(delivered.lock().unwrap().is_empty());
        assert_eq!(scheduler.shutdown().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_keeps_delivered_replies() {
        let (scheduler, delivered) =
            recording_scheduler(Arc::new(FixedDelay(Duration::from_millis(1500))));

        scheduler.enqueue("water").unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        scheduler.enqueue("pest").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(scheduler.shutdown().await, 1);
        assert_eq!(texts(&delivered), vec![WATERING_RESPONSE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_after_delivery_task_dies() {
        let scheduler = ResponseScheduler::start(
            &FARMING,
            Arc::new(FixedDelay(Duration::from_millis(10))),
            CancellationToken::new(),
            |reply| panic!("delivery failed for {}", reply.seq),
        );

        scheduler.enqueue("water").unwrap();
        assert!(!scheduler.is_closed());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_closed());
        assert!(scheduler.enqueue("pest").is_err());
    }
}
