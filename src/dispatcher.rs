//! Delivery runs: collect each category, post its items one by one and acknowledge each post.

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::aggregator::{Aggregator, ContentItem};
use crate::db::{Database, RecordOutcome};
use crate::environment::Category;
use crate::telegram::TelegramClient;
use crate::TARGET_PIPELINE;

/// A run that outlives this is assumed dead and its lease may be taken over.
pub const RUN_LEASE_TTL: Duration = Duration::from_secs(2 * 3600);

/// Delay before the first scheduled run.
pub const FIRST_RUN_DELAY: Duration = Duration::from_secs(10);

/// Holds the run lease for one run. If the run is dropped before it finishes, the lease is
/// released from a background task so the next run is not locked out until it expires.
struct RunLease {
    db: Database,
    holder: String,
    released: bool,
}

impl RunLease {
    async fn release(mut self) {
        if let Err(err) = self.db.release_run_lease(&self.holder).await {
            error!(target: TARGET_PIPELINE, "Failed to release run lease {}: {}", self.holder, err);
        }
        self.released = true;
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(target: TARGET_PIPELINE, "Run {} cancelled outside a runtime; lease left to expire", self.holder);
            return;
        };

        warn!(target: TARGET_PIPELINE, "Run {} cancelled, releasing lease", self.holder);
        let db = self.db.clone();
        let holder = std::mem::take(&mut self.holder);
        handle.spawn(async move {
            if let Err(err) = db.release_run_lease(&holder).await {
                error!(target: TARGET_PIPELINE, "Failed to release run lease {}: {}", holder, err);
            }
        });
    }
}

pub struct Dispatcher {
    db: Database,
    aggregator: Aggregator,
    telegram: TelegramClient,
    categories: Vec<Category>,
    post_delay: Duration,
    run_lock: Mutex<()>,
    /// Identifies this dispatcher's runs in the lease table.
    holder: String,
}

impl Dispatcher {
    pub fn new(
        db: Database,
        aggregator: Aggregator,
        telegram: TelegramClient,
        categories: Vec<Category>,
        post_delay: Duration,
    ) -> Self {
        Self {
            db,
            aggregator,
            telegram,
            categories,
            post_delay,
            run_lock: Mutex::new(()),
            holder: format!(
                "{}-{}",
                std::process::id(),
                Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ),
        }
    }

    /// One full run over every category. Returns how many items were delivered.
    ///
    /// Runs in this process queue up behind each other; a run already active in another process
    /// makes this one return 0 without doing anything.
    pub async fn collect_and_send(&self) -> usize {
        let _guard = self.run_lock.lock().await;

        let lease = match self.db.try_acquire_run_lease(&self.holder, RUN_LEASE_TTL).await {
            Ok(true) => RunLease {
                db: self.db.clone(),
                holder: self.holder.clone(),
                released: false,
            },
            Ok(false) => {
                warn!(target: TARGET_PIPELINE, "Another delivery run is in progress, skipping");
                return 0;
            }
            Err(err) => {
                error!(target: TARGET_PIPELINE, "Failed to acquire run lease: {}", err);
                return 0;
            }
        };

        let delivered = self.deliver_all().await;
        lease.release().await;

        info!(target: TARGET_PIPELINE, "Delivery run finished: {} items sent", delivered);
        delivered
    }

    async fn deliver_all(&self) -> usize {
        let mut delivered = 0;

        // Each category is delivered before the next is collected, so a url posted under one
        // category is already in the history when a later category sees it.
        for category in &self.categories {
            let items = self
                .aggregator
                .collect(&category.name, &category.sources, &category.keywords)
                .await;

            for item in items {
                if self.deliver(&item).await {
                    delivered += 1;
                    sleep(self.post_delay).await;
                }
            }
        }

        delivered
    }

    /// Sends and acknowledges a single item. Returns whether it was sent.
    async fn deliver(&self, item: &ContentItem) -> bool {
        match self.db.is_posted(&item.url).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(target: TARGET_PIPELINE, "Already delivered, not sending again: {}", item.url);
                return false;
            }
            Err(err) => {
                error!(target: TARGET_PIPELINE, "Failed to check history for {}: {}", item.url, err);
                return false;
            }
        }

        if let Err(err) = self.telegram.send_to_channel(item).await {
            error!(target: TARGET_PIPELINE, "Error sending content {}: {:#}", item.url, err);
            return false;
        }

        match self
            .db
            .record_posted(&item.title, &item.url, &item.category)
            .await
        {
            Ok(RecordOutcome::Inserted) => {
                debug!(target: TARGET_PIPELINE, "Recorded delivery of {}", item.url);
            }
            Ok(RecordOutcome::AlreadyExists) => {
                warn!(target: TARGET_PIPELINE, "Delivery of {} was already recorded", item.url);
            }
            Err(err) => {
                error!(target: TARGET_PIPELINE, "Sent but failed to record {}: {}", item.url, err);
            }
        }

        true
    }

    /// Waits out any run still holding the in-process lock, then drops this dispatcher's lease.
    /// Call after abandoning `run_forever` so the next process can start right away.
    pub async fn shutdown(&self) {
        let _guard = self.run_lock.lock().await;
        if let Err(err) = self.db.release_run_lease(&self.holder).await {
            error!(target: TARGET_PIPELINE, "Failed to release run lease {}: {}", self.holder, err);
        }
    }

    /// Runs `collect_and_send` every `interval`, starting after `first_delay`. Never returns.
    pub async fn run_forever(&self, interval: Duration, first_delay: Duration) {
        info!(target: TARGET_PIPELINE, "Scheduling delivery runs every {:?}", interval);
        sleep(first_delay).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            info!(target: TARGET_PIPELINE, "Starting scheduled content search");
            let delivered = self.collect_and_send().await;
            info!(target: TARGET_PIPELINE, "Scheduled run delivered {} items", delivered);
        }
    }
}
