use url::Url;

use crate::downloader::Downloader;
use crate::error::ValidationError;
use crate::extract::{ChannelExtractor, ParsedHtml};
use crate::types::{Channel, Status};

/// One row discovered on a channel's index page: enough to construct an
/// `Entry` once its own page has been fetched.
#[derive(Debug, Clone)]
pub struct DiscoveredRow {
    pub url: String,
    pub title: String,
    pub extra: Option<String>,
}

/// Fetches a channel's index page and extracts every row it lists. A
/// channel-level failure must not abort the run (spec.md §4.6) — on
/// failure this returns the `Status` the channel should be recorded with
/// instead of propagating.
pub async fn process_channel(
    downloader: &Downloader,
    channel: &Channel,
) -> Result<Vec<DiscoveredRow>, Status> {
    let page = downloader.get(&channel.url).await.map_err(|_| Status::Warning)?;

    let html = ParsedHtml::parse(&page.body).map_err(|_| Status::Error)?;
    let extractor = ChannelExtractor::from_channel(channel);
    let rows = extractor.extract(&html).map_err(|_| Status::Error)?;

    let base = Url::parse(&page.final_url).ok();

    let discovered = rows
        .into_iter()
        .filter_map(|row| match validate_row(row, base.as_ref()) {
            Ok(discovered) => Some(discovered),
            Err(e) => {
                log::warn!("channel {}: rejected row: {e}", channel.id);
                None
            }
        })
        .collect();

    Ok(discovered)
}

/// Strips every field, absolutizes `url`, and rejects the row if `url`
/// doesn't resolve to a well-formed absolute URL. A blank `title` is not
/// rejected here — `process_entry` may still recover one from the entry
/// page's `<title>` (spec.md §4.6/§9 title fallback).
fn validate_row(
    row: std::collections::BTreeMap<String, Option<String>>,
    base: Option<&Url>,
) -> Result<DiscoveredRow, ValidationError> {
    let raw_url = row
        .get("url")
        .cloned()
        .flatten()
        .ok_or_else(|| ValidationError("row has no url field".to_string()))?;
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return Err(ValidationError("url is blank".to_string()));
    }

    let url = absolutize(raw_url, base);
    if Url::parse(&url).is_err() {
        return Err(ValidationError(format!("{url:?} is not a well-formed absolute URL")));
    }

    let title = row
        .get("title")
        .cloned()
        .flatten()
        .unwrap_or_default()
        .trim()
        .to_string();
    let extra = row
        .get("extra")
        .cloned()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(DiscoveredRow { url, title, extra })
}

fn absolutize(url: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => base
            .join(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string()),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::Interval;

    fn channel(url: &str) -> Channel {
        Channel {
            id: 1,
            title: "c".into(),
            url: url.into(),
            enabled: true,
            interval: Interval::Manual,
            slug: "x".repeat(32),
            status: Status::New,
            row_selector: "//a".into(),
            url_selector: "@href".into(),
            title_selector: "text()".into(),
            extra_selector: None,
        }
    }

    #[tokio::test]
    async fn rows_with_relative_hrefs_resolve_against_the_final_url() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/idx"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(r#"<html><body><a href="/e/1">Title</a></body></html>"#),
            )
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let chan = channel(&format!("{}/idx", server.uri()));
        let rows = process_channel(&downloader, &chan).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, format!("{}/e/1", server.uri()));
        assert_eq!(rows[0].title, "Title");
    }

    #[tokio::test]
    async fn rows_with_no_url_are_dropped_rather_than_failing_the_channel() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/idx"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"<html><body><a>No href here</a><a href="/e/1">Title</a></body></html>"#,
            ))
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let chan = channel(&format!("{}/idx", server.uri()));
        let rows = process_channel(&downloader, &chan).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, format!("{}/e/1", server.uri()));
    }

    #[tokio::test]
    async fn a_404_channel_page_yields_warning_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let downloader = Downloader::new(&EngineConfig::default()).unwrap();
        let chan = channel(&format!("{}/missing", server.uri()));
        let status = process_channel(&downloader, &chan).await.unwrap_err();

        assert_eq!(status, Status::Warning);
    }
}
