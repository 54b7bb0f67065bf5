use std::collections::{HashMap, HashSet};

/// Outcome of reconciling a channel's previously stored entry URLs against
/// the URLs freshly discovered on this scrape. Grounded in
/// `original_source/webscraper/services.py`'s `URLTracker`/`list_diff`,
/// generalized here to work against any `ChannelStore` implementation
/// rather than a concrete ORM queryset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackResult {
    /// URLs present in `fresh` but absent from `stored` — these need a new
    /// `Entry` row.
    pub new_urls: Vec<String>,
    /// Ids of stored entries whose URL no longer appears on the channel
    /// page — these are stale and should be deleted.
    pub stale_ids: Vec<i64>,
}

/// Set-difference reconciliation: `new_urls = fresh - stored.keys()`,
/// `stale_ids = stored[stored.keys() - fresh]`. Order of `new_urls` follows
/// `fresh`; order of `stale_ids` is unspecified.
pub fn reconcile(stored: &HashMap<String, i64>, fresh_urls: &[String]) -> TrackResult {
    let fresh_set: HashSet<&str> = fresh_urls.iter().map(String::as_str).collect();

    let new_urls = fresh_urls
        .iter()
        .filter(|url| !stored.contains_key(url.as_str()))
        .cloned()
        .collect();

    let stale_ids = stored
        .iter()
        .filter(|(url, _)| !fresh_set.contains(url.as_str()))
        .map(|(_, id)| *id)
        .collect();

    TrackResult { new_urls, stale_ids }
}
