use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::{mpsc, Mutex};

use crate::buffer::InsertBuffer;
use crate::config::EngineConfig;
use crate::downloader::Downloader;
use crate::extract::EntryExtractor;
use crate::processors::{process_channel, process_entry, DiscoveredRow};
use crate::store::ChannelStore;
use crate::tracker::reconcile;
use crate::types::{Channel, Entry, Status};

/// Two-stage channel/entry worker pool, generalized from
/// `sws-crawler::crawl_site`'s worker-pool/sentinel shape. Runs on whatever
/// Tokio runtime the caller provides; documented and tested against a
/// current-thread runtime so the whole pipeline is genuinely single-threaded
/// cooperative scheduling (spec.md §5) — `tokio::task::spawn` stands in for
/// `sws-crawler`'s OS-thread-per-worker model since our processors carry no
/// `!Send` state.
pub struct Scheduler {
    config: EngineConfig,
    downloader: Arc<Downloader>,
    entry_extractor: Arc<EntryExtractor>,
    store: Arc<dyn ChannelStore>,
}

/// Counts produced for the CLI's completion message.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub channels: usize,
    pub entries: usize,
}

impl Scheduler {
    pub fn new(config: EngineConfig, store: Arc<dyn ChannelStore>) -> anyhow::Result<Self> {
        let downloader = Arc::new(Downloader::new(&config)?);
        Ok(Self {
            config,
            downloader,
            entry_extractor: Arc::new(EntryExtractor::new()),
            store,
        })
    }

    /// Scrapes every enabled channel and the entries it discovers. A single
    /// channel or entry failing never aborts the run — failures are
    /// recorded on that channel's/entry's own `status`.
    ///
    /// Callers that want a hard deadline on the whole run should wrap this
    /// call in `tokio::time::timeout(config.global_timeout, scheduler.run())`
    /// (spec.md §5) — each worker's `InsertBuffer` flush happens on its own
    /// sentinel-triggered exit path, so a timed-out run still persists
    /// whatever completed entries are already buffered in workers that got
    /// to run to completion before cancellation.
    pub async fn run(&self) -> anyhow::Result<RunStats> {
        let channels = self.store.enabled_channels().await?;
        let channel_count = channels.len();

        // The channel side is a deque seeded up front (spec.md §4.8), not a
        // backpressured queue — size it to hold every channel plus one
        // sentinel per channel worker so the fill below can never block
        // ahead of workers existing to drain it.
        let channel_queue_capacity = (channel_count + self.config.channel_workers).max(1);
        let (channel_tx, channel_rx) = mpsc::channel::<Option<Channel>>(channel_queue_capacity);
        for channel in channels {
            channel_tx.send(Some(channel)).await.ok();
        }
        for _ in 0..self.config.channel_workers {
            channel_tx.send(None).await.ok();
        }
        drop(channel_tx);
        let channel_rx = Arc::new(Mutex::new(channel_rx));

        let (entry_tx, entry_rx) =
            mpsc::channel::<Option<Entry>>(self.config.entry_queue_capacity());
        let entry_rx = Arc::new(Mutex::new(entry_rx));

        let remaining_channel_workers = Arc::new(AtomicUsize::new(self.config.channel_workers));
        let processed_entries = Arc::new(AtomicUsize::new(0));

        let mut channel_handles = Vec::with_capacity(self.config.channel_workers);
        for _ in 0..self.config.channel_workers {
            let channel_rx = channel_rx.clone();
            let entry_tx = entry_tx.clone();
            let downloader = self.downloader.clone();
            let store = self.store.clone();
            let remaining = remaining_channel_workers.clone();
            let entry_workers = self.config.entry_workers;

            channel_handles.push(tokio::task::spawn(async move {
                loop {
                    let next = channel_rx.lock().await.recv().await;
                    match next {
                        Some(Some(channel)) => {
                            channel_worker_step(&downloader, store.as_ref(), &entry_tx, channel).await;
                        }
                        Some(None) | None => break,
                    }
                }
                // Last channel worker to exit owns fanning the entry-queue
                // shutdown sentinel out to every entry worker — entries keep
                // arriving from other channel workers until then.
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    for _ in 0..entry_workers {
                        entry_tx.send(None).await.ok();
                    }
                }
            }));
        }
        drop(entry_tx);

        let mut entry_handles = Vec::with_capacity(self.config.entry_workers);
        for _ in 0..self.config.entry_workers {
            let entry_rx = entry_rx.clone();
            let downloader = self.downloader.clone();
            let extractor = self.entry_extractor.clone();
            let store = self.store.clone();
            let batch_size = self.config.batch_size;
            let processed = processed_entries.clone();

            entry_handles.push(tokio::task::spawn(async move {
                let mut buffer = InsertBuffer::new(batch_size);
                loop {
                    let next = entry_rx.lock().await.recv().await;
                    match next {
                        Some(Some(entry)) => {
                            let processed_entry = process_entry(&downloader, &extractor, entry).await;
                            processed.fetch_add(1, Ordering::Relaxed);
                            if let Some(batch) = buffer.add(processed_entry) {
                                persist_batch(store.as_ref(), &batch).await;
                            }
                        }
                        Some(None) | None => break,
                    }
                }
                if let Some(batch) = buffer.flush() {
                    persist_batch(store.as_ref(), &batch).await;
                }
            }));
        }

        try_join_all(channel_handles).await?;
        try_join_all(entry_handles).await?;

        Ok(RunStats {
            channels: channel_count,
            entries: processed_entries.load(Ordering::Relaxed),
        })
    }
}

async fn persist_batch(store: &dyn ChannelStore, batch: &[Entry]) {
    if let Err(e) = store.bulk_insert(batch).await {
        log::error!("failed to persist a batch of {} entries: {e}", batch.len());
    }
}

async fn channel_worker_step(
    downloader: &Downloader,
    store: &dyn ChannelStore,
    entry_tx: &mpsc::Sender<Option<Entry>>,
    mut channel: Channel,
) {
    match process_channel(downloader, &channel).await {
        Ok(rows) if rows.is_empty() => {
            log::warn!("channel {}: no rows found on index page", channel.id);
            channel.status = Status::Warning;
            let _ = store.save_channel(&channel).await;
        }
        Ok(rows) => {
            let by_url: HashMap<String, DiscoveredRow> =
                rows.into_iter().map(|row| (row.url.clone(), row)).collect();
            let fresh_urls: Vec<String> = by_url.keys().cloned().collect();

            let stored = match store.get_entry_id_urls(channel.id).await {
                Ok(stored) => stored,
                Err(e) => {
                    log::error!("channel {}: failed to load stored entries: {e}", channel.id);
                    channel.status = Status::Error;
                    let _ = store.save_channel(&channel).await;
                    return;
                }
            };

            let diff = reconcile(&stored, &fresh_urls);

            if !diff.stale_ids.is_empty() {
                if let Err(e) = store.delete_entries(&diff.stale_ids).await {
                    log::warn!("channel {}: failed to delete stale entries: {e}", channel.id);
                }
            }

            for url in diff.new_urls {
                let Some(row) = by_url.get(&url) else {
                    continue;
                };
                let entry = Entry::new(channel.id, row.url.clone(), row.title.clone(), row.extra.clone());
                if entry_tx.send(Some(entry)).await.is_err() {
                    break;
                }
            }

            channel.status = Status::Ok;
            if let Err(e) = store.save_channel(&channel).await {
                log::error!("channel {}: failed to save status: {e}", channel.id);
            }
        }
        Err(status) => {
            log::warn!("channel {}: scrape failed with status {status:?}", channel.id);
            channel.status = status;
            let _ = store.save_channel(&channel).await;
        }
    }
}
