//! Expiry Scheduler Task
//!
//! Background task that owns an expiry chain, applies insert/delete
//! instructions sent by the cache, and sweeps expired records when the head
//! of the chain falls due.

use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, Instrument};

use crate::cache::{ConcurrentStore, Snapshot, StatsRecorder};
use crate::tasks::ExpiryChain;

// == Instructions ==
/// Request to track the expiry of one timed write.
#[derive(Debug)]
pub(crate) struct ScheduleExpiry<K> {
    pub key: K,
    pub snapshot: Snapshot,
}

// == Scheduler Handle ==
/// Sending side of a launched scheduler.
#[derive(Debug)]
pub(crate) struct SchedulerHandle<K> {
    pub inserts: mpsc::Sender<ScheduleExpiry<K>>,
    pub deletes: mpsc::Sender<K>,
    pub task: JoinHandle<()>,
    pub generation: u64,
}

// == Launch Parameters ==
/// Everything a scheduler shares with the cache that launches it.
#[derive(Debug)]
pub(crate) struct SchedulerContext<K, V>
where
    K: Eq + Hash,
{
    pub store: Arc<ConcurrentStore<K, V>>,
    pub stats: Arc<StatsRecorder>,
    pub shutdown: CancellationToken,
    pub queue_capacity: usize,
    pub name: String,
}

// == Scheduler ==
pub(crate) struct Scheduler<K, V>
where
    K: Eq + Hash,
{
    chain: ExpiryChain<K>,
    store: Arc<ConcurrentStore<K, V>>,
    stats: Arc<StatsRecorder>,
    inserts: mpsc::Receiver<ScheduleExpiry<K>>,
    deletes: mpsc::Receiver<K>,
    shutdown: CancellationToken,
    /// False once the queues are closed; the task then only sweeps what is left
    accepting: bool,
}

impl<K, V> Scheduler<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Launch ==
    /// Spawns a scheduler task, optionally seeding its chain with `seed`.
    ///
    /// A seeded scheduler starts with a non-empty chain and so cannot
    /// terminate before the seed is swept or removed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(
        ctx: &SchedulerContext<K, V>,
        generation: u64,
        seed: Option<ScheduleExpiry<K>>,
    ) -> SchedulerHandle<K> {
        let (insert_tx, insert_rx) = mpsc::channel(ctx.queue_capacity);
        let (delete_tx, delete_rx) = mpsc::channel(ctx.queue_capacity);

        let mut scheduler = Scheduler {
            chain: ExpiryChain::new(),
            store: Arc::clone(&ctx.store),
            stats: Arc::clone(&ctx.stats),
            inserts: insert_rx,
            deletes: delete_rx,
            shutdown: ctx.shutdown.clone(),
            accepting: true,
        };
        if let Some(request) = seed {
            scheduler.schedule(request);
        }

        ctx.stats.record_launch();
        let span = info_span!("expiry_scheduler", cache = %ctx.name, generation);
        let task = tokio::spawn(scheduler.run().instrument(span));

        SchedulerHandle {
            inserts: insert_tx,
            deletes: delete_tx,
            task,
            generation,
        }
    }

    // == Run Loop ==
    async fn run(mut self) {
        debug!(pending = self.chain.len(), "Expiry scheduler started");
        self.bootstrap();

        let timer = sleep_until(self.chain.next_expiry().unwrap_or_else(Instant::now));
        tokio::pin!(timer);

        loop {
            let Some(deadline) = self.chain.next_expiry() else {
                if !self.accepting {
                    break;
                }
                // Nothing left to wait for: refuse further instructions, then
                // apply whatever was already queued.
                self.stop_accepting().await;
                continue;
            };

            // Re-arming discards a fire that elapsed while the chain was
            // being mutated.
            timer.as_mut().reset(deadline);

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!(pending = self.chain.len(), "Expiry scheduler stopped by shutdown");
                    return;
                }
                () = &mut timer => self.sweep(),
                // Deletes go first: a delete is always issued before any
                // rewrite of the same key that is queued behind it.
                Some(key) = self.deletes.recv(), if self.accepting => self.unschedule(&key),
                Some(request) = self.inserts.recv(), if self.accepting => self.schedule(request),
            }
        }

        debug!("Expiry scheduler terminated with an empty chain");
    }

    // == Bootstrap ==
    /// Applies at most one instruction that is already waiting, without
    /// blocking. A waiting delete wins over a waiting insert.
    fn bootstrap(&mut self) {
        if let Ok(key) = self.deletes.try_recv() {
            self.unschedule(&key);
        } else if let Ok(request) = self.inserts.try_recv() {
            self.schedule(request);
        }
    }

    // == Stop Accepting ==
    /// Closes both queues and drains them.
    ///
    /// Senders waiting for capacity get their instruction back as an error
    /// instead of having it dropped with the receiver.
    async fn stop_accepting(&mut self) {
        self.accepting = false;
        self.inserts.close();
        self.deletes.close();

        while let Some(key) = self.deletes.recv().await {
            self.unschedule(&key);
        }
        while let Some(request) = self.inserts.recv().await {
            self.schedule(request);
        }
        trace!(pending = self.chain.len(), "Instruction queues closed");
    }

    fn schedule(&mut self, request: ScheduleExpiry<K>) {
        let before = self.chain.len();
        self.chain.insert(request.key, request.snapshot);
        self.stats.track_pending(before, self.chain.len());
    }

    fn unschedule(&mut self, key: &K) {
        let before = self.chain.len();
        self.chain.remove(key);
        self.stats.track_pending(before, self.chain.len());
    }

    // == Sweep ==
    fn sweep(&mut self) {
        let before = self.chain.len();
        let report = self.chain.sweep_expired(Instant::now(), &self.store);
        self.stats.track_pending(before, self.chain.len());
        self.stats.record_sweep(&report);

        debug!(
            reclaimed = report.reclaimed,
            stale = report.stale,
            remaining = self.chain.len(),
            "Swept expired records"
        );
    }
}
