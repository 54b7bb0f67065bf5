//! `process_channel`/`process_entry`, grounded in
//! `original_source/webscraper/processing.py`'s functions of the same name.

mod channel;
mod entry;

pub use channel::{process_channel, DiscoveredRow};
pub use entry::process_entry;
