use regex::RegexBuilder;

/// Scans raw document text for URL-shaped substrings ending in one of a
/// fixed set of extensions, grounded in
/// `original_source/webscraper/extractors.py`'s regex-based streaming link
/// finder. Unlike [`super::RowExtractor`]/[`super::FieldExtractor`] this
/// never parses the document as markup — some streaming players embed their
/// source URLs inside inline `<script>` JSON blobs that no selector reaches.
pub struct RegexExtractor {
    regex: regex::Regex,
}

impl RegexExtractor {
    pub fn new(extensions: &[&str]) -> Self {
        let alternation = extensions.join("|");
        let pattern = format!(r"[\w.\-/:]+\.({alternation})");
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("built-in streaming extension pattern is valid");
        Self { regex }
    }

    /// Every non-overlapping match, in document order, duplicates included
    /// (cross-category/duplicate pruning happens later in post-processing).
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.regex.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }
}
