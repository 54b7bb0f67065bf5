use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How often a channel is re-scraped. The scheduler itself is indifferent to
/// this value — it is read by whatever external job trigger picks channels
/// to hand to `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Manual,
    TenMinutes,
    OneHour,
    OneDay,
}

/// Outcome of the last scrape of a channel or entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    New,
    Ok,
    Warning,
    Error,
}

/// Media bucket an extracted item URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Images,
    Videos,
    Streaming,
}

/// Fixed iteration order used by cross-category deduplication (spec.md
/// §4.3 step 3).
pub const ITEM_CATEGORY_ORDER: [ItemCategory; 3] = [
    ItemCategory::Images,
    ItemCategory::Videos,
    ItemCategory::Streaming,
];

/// A configured scrape target: one index page plus the XPath selectors
/// needed to find rows on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub enabled: bool,
    pub interval: Interval,
    pub slug: String,
    pub status: Status,
    pub row_selector: String,
    pub url_selector: String,
    pub title_selector: String,
    pub extra_selector: Option<String>,
}

impl Channel {
    /// 32-character random slug, set once at creation and never reused.
    pub fn new_slug() -> String {
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..32)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }
}

/// One discovered link off a channel page, with its extracted media items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub channel: i64,
    pub added: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub extra: Option<String>,
    pub final_url: String,
    pub items: BTreeMap<ItemCategory, Vec<String>>,
    pub status: Status,
}

impl Entry {
    pub fn new(channel: i64, url: String, title: String, extra: Option<String>) -> Self {
        Self {
            id: 0,
            channel,
            added: Utc::now(),
            url,
            title,
            extra,
            final_url: String::new(),
            items: BTreeMap::new(),
            status: Status::New,
        }
    }

    /// `final_url` if a redirect happened, otherwise the original `url`.
    pub fn real_url(&self) -> &str {
        if self.final_url.is_empty() {
            &self.url
        } else {
            &self.final_url
        }
    }
}
