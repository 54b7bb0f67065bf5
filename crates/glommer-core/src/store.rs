use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::{Channel, Entry};

/// Persistence boundary the scheduler drives. `sws-crawler` has no
/// equivalent (it writes CSV), so this contract is generalized from the
/// query shapes `original_source/webscraper/services.py`'s `URLTracker` and
/// `managers.py` hit against the ORM: list enabled channels, diff stored
/// entry urls against fresh ones, bulk-write survivors.
///
/// Implementations are expected to be cheap to clone (an `Arc`-wrapped pool
/// handle, typically) since every worker holds its own handle.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Every channel eligible to be scraped this run.
    async fn enabled_channels(&self) -> anyhow::Result<Vec<Channel>>;

    /// `url -> id` for every entry currently stored for `channel`, used by
    /// [`crate::tracker::reconcile`] to compute new/stale urls.
    async fn get_entry_id_urls(&self, channel: i64) -> anyhow::Result<HashMap<String, i64>>;

    /// Removes entries by id (the stale set from a tracker reconciliation).
    async fn delete_entries(&self, ids: &[i64]) -> anyhow::Result<()>;

    /// Persists a batch of newly-processed entries. Called once per full
    /// [`crate::buffer::InsertBuffer`] batch and once more on final flush.
    async fn bulk_insert(&self, entries: &[Entry]) -> anyhow::Result<()>;

    /// Persists a channel's own post-scrape `status` (and any selector
    /// changes an operator made concurrently are left untouched — this
    /// writes only the fields the scheduler owns).
    async fn save_channel(&self, channel: &Channel) -> anyhow::Result<()>;
}
