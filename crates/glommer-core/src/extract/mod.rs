//! XPath and regex based extraction, mirroring how `sws-crawler::crawler`
//! already drives `sxd_document`/`sxd_xpath` for sitemap parsing, generalized
//! to arbitrary row/field extraction over channel and entry pages.

mod entry;
mod regex_extractor;
mod xpath;

pub use entry::{EntryExtractor, ExtractedItems};
pub use regex_extractor::RegexExtractor;
pub use xpath::{ChannelExtractor, DatasetExtractor, FieldExtractor, ParsedHtml, RowExtractor};
