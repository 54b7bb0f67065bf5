use crate::downloader::Downloader;
use crate::extract::{EntryExtractor, ParsedHtml};
use crate::postprocess::postprocess;
use crate::types::{Entry, Status};

/// Fetches one entry's own page, extracts its media items, recovers a
/// fallback title when the channel row didn't supply one, and
/// post-processes the result. Never propagates an error — a failure is
/// recorded on `entry.status` and the entry is returned as-is so the
/// scheduler can still persist it (spec.md §4.7).
pub async fn process_entry(downloader: &Downloader, extractor: &EntryExtractor, mut entry: Entry) -> Entry {
    let page = match downloader.get(&entry.url).await {
        Ok(page) => page,
        Err(_) => {
            entry.status = Status::Error;
            return entry;
        }
    };

    entry.final_url = if page.final_url == entry.url {
        String::new()
    } else {
        page.final_url.clone()
    };

    let html = match ParsedHtml::parse(&page.body) {
        Ok(html) => html,
        Err(_) => {
            entry.status = Status::Error;
            return entry;
        }
    };

    if entry.title.is_empty() {
        match extractor.extract_title(&html) {
            Ok(Some(title)) => entry.title = title,
            _ => {
                entry.status = Status::Error;
                return entry;
            }
        }
    }

    let extracted = match extractor.extract(&html, &page.body) {
        Ok(extracted) => extracted,
        Err(_) => {
            entry.status = Status::Error;
            return entry;
        }
    };

    let base_url = entry.real_url().to_string();
    entry.items = postprocess(extracted.items, &base_url);
    entry.status = Status::Ok;
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::EngineConfig;
    use crate::types::ItemCategory;

    fn new_entry(url: String) -> Entry {
        Entry::new(1, url, String::new(), None)
    }

    #[tokio::test]
    async fn extracts_items_and_marks_entry_ok() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/e/1"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>T</title></head><body><a href="/pic.jpg">p</a></body></html>"#,
            ))
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let extractor = EntryExtractor::new();
        let entry = new_entry(format!("{}/e/1", server.uri()));

        let processed = process_entry(&downloader, &extractor, entry).await;

        assert_eq!(processed.status, Status::Ok);
        assert_eq!(processed.title, "T");
        assert_eq!(
            processed.items[&ItemCategory::Images],
            vec![format!("{}/pic.jpg", server.uri())]
        );
    }

    #[tokio::test]
    async fn unreachable_entry_page_sets_error_status() {
        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let extractor = EntryExtractor::new();
        let entry = new_entry("http://127.0.0.1:1/unreachable".to_string());

        let processed = process_entry(&downloader, &extractor, entry).await;

        assert_eq!(processed.status, Status::Error);
    }

    #[tokio::test]
    async fn final_url_is_blank_when_there_was_no_redirect() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/e/3"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                "<html><head><title>T</title></head><body></body></html>",
            ))
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let extractor = EntryExtractor::new();
        let entry = new_entry(format!("{}/e/3", server.uri()));

        let processed = process_entry(&downloader, &extractor, entry).await;

        assert_eq!(processed.final_url, "");
        assert_eq!(processed.real_url(), format!("{}/e/3", server.uri()));
    }

    #[tokio::test]
    async fn final_url_is_recorded_when_a_redirect_happened() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/e/4"))
            .respond_with(
                wiremock::ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/e/4-final", server.uri())),
            )
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/e/4-final"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                "<html><head><title>T</title></head><body></body></html>",
            ))
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let extractor = EntryExtractor::new();
        let entry = new_entry(format!("{}/e/4", server.uri()));

        let processed = process_entry(&downloader, &extractor, entry).await;

        assert_eq!(processed.final_url, format!("{}/e/4-final", server.uri()));
        assert_eq!(processed.real_url(), format!("{}/e/4-final", server.uri()));
    }

    #[tokio::test]
    async fn missing_title_with_no_title_tag_is_an_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/e/2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let extractor = EntryExtractor::new();
        let entry = new_entry(format!("{}/e/2", server.uri()));

        let processed = process_entry(&downloader, &extractor, entry).await;

        assert_eq!(processed.status, Status::Error);
    }
}
