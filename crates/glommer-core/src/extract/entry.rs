use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::types::ItemCategory;

use super::regex_extractor::RegexExtractor;
use super::xpath::{entry_context, DatasetExtractor, FieldExtractor, ParsedHtml};

/// Extracted media URLs grouped by category, pre-post-processing (relative,
/// possibly duplicated, possibly cross-category).
pub struct ExtractedItems {
    pub items: BTreeMap<ItemCategory, Vec<String>>,
}

/// Fixed, non-configurable extractor applied to every entry page: one
/// `DatasetExtractor` each for images and videos sharing a single parsed
/// tree, plus a `RegexExtractor` over the raw body for streaming links that
/// only ever surface inside inline scripts, never as plain anchors.
pub struct EntryExtractor {
    images: DatasetExtractor,
    videos: DatasetExtractor,
    streaming: RegexExtractor,
}

impl Default for EntryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryExtractor {
    pub fn new() -> Self {
        let images = DatasetExtractor::new(
            r#"//a[re:test(lower(@href), '\.(jpe?g|png|gif|webp)$')]//img[@src]"#,
            vec![("url", "ancestor::a/@href")],
        );
        let videos = DatasetExtractor::new(
            r#"//a[re:test(lower(@href), '\.(avi|mov|wmv|mpe?g|mp4|webm)$')]//img[@src]"#,
            vec![("url", "ancestor::a/@href")],
        );
        let streaming = RegexExtractor::new(&["mp4", "webm", "flv", "mov"]);

        Self {
            images,
            videos,
            streaming,
        }
    }

    /// Runs every built-in extractor against one already-parsed document and
    /// its raw source text. `html` backs both the image and video
    /// `DatasetExtractor`s — it is parsed exactly once by the caller.
    pub fn extract(&self, html: &ParsedHtml, raw_text: &str) -> Result<ExtractedItems, ParseError> {
        let context = entry_context();

        let images = self
            .images
            .extract(html, &context)?
            .into_iter()
            .filter_map(|row| row.get("url").cloned().flatten())
            .collect();

        let videos = self
            .videos
            .extract(html, &context)?
            .into_iter()
            .filter_map(|row| row.get("url").cloned().flatten())
            .collect();

        let streaming = self.streaming.extract(raw_text);

        let mut items = BTreeMap::new();
        items.insert(ItemCategory::Images, images);
        items.insert(ItemCategory::Videos, videos);
        items.insert(ItemCategory::Streaming, streaming);

        Ok(ExtractedItems { items })
    }

    /// Recovers a title from `<title>` when the channel-page title was
    /// empty (spec.md §4.6/§4.7 title fallback).
    pub fn extract_title(&self, html: &ParsedHtml) -> Result<Option<String>, ParseError> {
        let context = super::xpath::default_context();
        let field = FieldExtractor::new("//title/text()");
        let document = html.document();
        field.extract(&context, document.root().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_images_and_videos_from_shared_tree() {
        let html = ParsedHtml::parse(
            r#"<html><body>
                <a href="/pic.JPG"><img src="/pic_tn.JPG"></a>
                <a href="/clip.mp4"><img src="/clip_tn.jpg"></a>
                <a href="/page">not media</a>
            </body></html>"#,
        )
        .unwrap();

        let extractor = EntryExtractor::new();
        let extracted = extractor.extract(&html, "").unwrap();

        assert_eq!(extracted.items[&ItemCategory::Images], vec!["/pic.JPG".to_string()]);
        assert_eq!(extracted.items[&ItemCategory::Videos], vec!["/clip.mp4".to_string()]);
    }

    #[test]
    fn streaming_links_come_from_raw_text_not_the_tree() {
        let html = ParsedHtml::parse("<html><body>no anchors here</body></html>").unwrap();
        let raw = r#"<script>var src = "https://cdn.example.com/s/index.mp4";</script>"#;

        let extractor = EntryExtractor::new();
        let extracted = extractor.extract(&html, raw).unwrap();

        assert_eq!(
            extracted.items[&ItemCategory::Streaming],
            vec!["https://cdn.example.com/s/index.mp4".to_string()]
        );
    }

    #[test]
    fn title_fallback_reads_title_tag() {
        let html = ParsedHtml::parse("<html><head><title>Fallback Title</title></head><body></body></html>").unwrap();
        let extractor = EntryExtractor::new();
        assert_eq!(extractor.extract_title(&html).unwrap().as_deref(), Some("Fallback Title"));
    }

    #[test]
    fn title_fallback_is_none_when_title_tag_missing() {
        let html = ParsedHtml::parse("<html><body></body></html>").unwrap();
        let extractor = EntryExtractor::new();
        assert_eq!(extractor.extract_title(&html).unwrap(), None);
    }
}
