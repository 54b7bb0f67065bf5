//! Scheduled scrape pipeline: channels (index pages) discover entries
//! (linked pages), entries are downloaded and their media items extracted,
//! post-processed and persisted in batches. Generalized from
//! `sws-crawler`'s worker-pool crawler into a two-stage channel/entry
//! pipeline driven by a [`store::ChannelStore`] rather than a seed list.

pub mod buffer;
pub mod config;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod postprocess;
mod processors;
pub mod scheduler;
pub mod store;
pub mod tracker;
pub mod types;

pub use config::EngineConfig;
pub use downloader::{Downloader, FetchedPage};
pub use error::{DownloadError, InvalidStateError, ParseError, ValidationError};
pub use scheduler::{RunStats, Scheduler};
pub use store::ChannelStore;
pub use types::{Channel, Entry, Interval, ItemCategory, Status};
