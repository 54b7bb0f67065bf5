//! `sqlx`-backed [`ChannelStore`] over the two relations spec.md §6
//! describes (`channel`, `entry`). This crate is ambient persistence
//! plumbing the core engine doesn't own — spec.md explicitly scopes the ORM
//! and migrations out of the engine itself — kept minimal on purpose: no
//! connection pool tuning, no multi-tenancy, matching how little `sws-cli`
//! asks of its own storage target (a flat CSV writer).

use std::collections::HashMap;

use async_trait::async_trait;
use glommer_core::{Channel, ChannelStore, Entry, Interval, ItemCategory, Status};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Row};

/// A `ChannelStore` over a single SQLite database file, created (and
/// migrated) with [`SqliteChannelStore::connect`].
#[derive(Clone)]
pub struct SqliteChannelStore {
    pool: SqlitePool,
}

impl SqliteChannelStore {
    /// Opens (creating if absent) the database at `url` and runs the
    /// bundled migrations, matching `sws-crawler`'s eager-setup-at-start
    /// style rather than a lazily-migrated pool.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options: SqliteConnectOptions = url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(FromRow)]
struct ChannelRow {
    id: i64,
    title: String,
    url: String,
    enabled: bool,
    interval: String,
    slug: String,
    status: String,
    row_selector: String,
    url_selector: String,
    title_selector: String,
    extra_selector: Option<String>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = anyhow::Error;

    fn try_from(row: ChannelRow) -> anyhow::Result<Self> {
        Ok(Channel {
            id: row.id,
            title: row.title,
            url: row.url,
            enabled: row.enabled,
            interval: parse_interval(&row.interval)?,
            slug: row.slug,
            status: parse_status(&row.status)?,
            row_selector: row.row_selector,
            url_selector: row.url_selector,
            title_selector: row.title_selector,
            extra_selector: row.extra_selector,
        })
    }
}

fn parse_interval(s: &str) -> anyhow::Result<Interval> {
    Ok(match s {
        "manual" => Interval::Manual,
        "ten_minutes" => Interval::TenMinutes,
        "one_hour" => Interval::OneHour,
        "one_day" => Interval::OneDay,
        other => anyhow::bail!("unknown interval {other:?}"),
    })
}

fn interval_str(interval: Interval) -> &'static str {
    match interval {
        Interval::Manual => "manual",
        Interval::TenMinutes => "ten_minutes",
        Interval::OneHour => "one_hour",
        Interval::OneDay => "one_day",
    }
}

fn parse_status(s: &str) -> anyhow::Result<Status> {
    Ok(match s {
        "new" => Status::New,
        "ok" => Status::Ok,
        "warning" => Status::Warning,
        "error" => Status::Error,
        other => anyhow::bail!("unknown status {other:?}"),
    })
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::New => "new",
        Status::Ok => "ok",
        Status::Warning => "warning",
        Status::Error => "error",
    }
}

fn category_str(category: ItemCategory) -> &'static str {
    match category {
        ItemCategory::Images => "images",
        ItemCategory::Videos => "videos",
        ItemCategory::Streaming => "streaming",
    }
}

fn category_from_str(s: &str) -> Option<ItemCategory> {
    match s {
        "images" => Some(ItemCategory::Images),
        "videos" => Some(ItemCategory::Videos),
        "streaming" => Some(ItemCategory::Streaming),
        _ => None,
    }
}

/// Serializes `entry.items` the way spec.md §6's `items JSON` column is
/// described: `{category: [url, ...]}` with only non-empty categories
/// present.
fn items_to_json(items: &std::collections::BTreeMap<ItemCategory, Vec<String>>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = items
        .iter()
        .map(|(category, urls)| {
            (
                category_str(*category).to_string(),
                serde_json::Value::Array(urls.iter().cloned().map(serde_json::Value::String).collect()),
            )
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn items_from_json(raw: &str) -> std::collections::BTreeMap<ItemCategory, Vec<String>> {
    let mut items = std::collections::BTreeMap::new();
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str(raw) else {
        return items;
    };
    for (key, value) in map {
        let Some(category) = category_from_str(&key) else {
            continue;
        };
        let urls = value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        items.insert(category, urls);
    }
    items
}

#[async_trait]
impl ChannelStore for SqliteChannelStore {
    async fn enabled_channels(&self) -> anyhow::Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            "SELECT id, title, url, enabled, interval, slug, status, \
             row_selector, url_selector, title_selector, extra_selector \
             FROM channel WHERE enabled = 1",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Channel::try_from).collect()
    }

    async fn get_entry_id_urls(&self, channel: i64) -> anyhow::Result<HashMap<String, i64>> {
        let rows = sqlx::query("SELECT id, url FROM entry WHERE channel_id = ?")
            .bind(channel)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("url"), row.get::<i64, _>("id")))
            .collect())
    }

    async fn delete_entries(&self, ids: &[i64]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(",");
        let sql = format!("DELETE FROM entry WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn bulk_insert(&self, entries: &[Entry]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO entry (channel_id, added, url, title, extra, final_url, items, status) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(channel_id, url) DO UPDATE SET \
                   final_url = excluded.final_url, items = excluded.items, status = excluded.status",
            )
            .bind(entry.channel)
            .bind(entry.added.to_rfc3339())
            .bind(&entry.url)
            .bind(&entry.title)
            .bind(&entry.extra)
            .bind(&entry.final_url)
            .bind(items_to_json(&entry.items))
            .bind(status_str(entry.status))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_channel(&self, channel: &Channel) -> anyhow::Result<()> {
        sqlx::query("UPDATE channel SET status = ? WHERE id = ?")
            .bind(status_str(channel.status))
            .bind(channel.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Reads one persisted entry back by `(channel, url)`, used by tests and by
/// the admin UI's detail view (out of scope here, but the query shape is
/// worth keeping public for callers that embed this store directly).
pub async fn load_entry(
    store: &SqliteChannelStore,
    channel: i64,
    url: &str,
) -> anyhow::Result<Option<Entry>> {
    #[derive(FromRow)]
    struct Row {
        id: i64,
        channel_id: i64,
        added: String,
        url: String,
        title: String,
        extra: Option<String>,
        final_url: String,
        items: String,
        status: String,
    }

    let row: Option<Row> = sqlx::query_as(
        "SELECT id, channel_id, added, url, title, extra, final_url, items, status \
         FROM entry WHERE channel_id = ? AND url = ?",
    )
    .bind(channel)
    .bind(url)
    .fetch_optional(&store.pool)
    .await?;

    let Some(row) = row else { return Ok(None) };

    Ok(Some(Entry {
        id: row.id,
        channel: row.channel_id,
        added: chrono::DateTime::parse_from_rfc3339(&row.added)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        url: row.url,
        title: row.title,
        extra: row.extra,
        final_url: row.final_url,
        items: items_from_json(&row.items),
        status: parse_status(&row.status)?,
    }))
}
