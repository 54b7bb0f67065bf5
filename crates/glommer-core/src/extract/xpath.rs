use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use sxd_document::Package;
use sxd_xpath::function::{Args, Error as FunctionError, Function};
use sxd_xpath::nodeset::Node;
use sxd_xpath::{context::Evaluation, Context, Factory, Value, XPath};

use crate::error::ParseError;
use crate::types::Channel;

static XPATH_FACTORY: Lazy<Factory> = Lazy::new(Factory::new);

/// Parses HTML leniently (via `sxd_html`, the natural HTML-to-`sxd_document`
/// bridge `sws-crawler`'s sitemap-only use of `sxd_document`/`sxd_xpath`
/// never needed) so that a single tree can be shared by every extractor that
/// runs against a channel or entry page.
pub struct ParsedHtml {
    package: Package,
}

impl ParsedHtml {
    pub fn parse(html: &str) -> Result<Self, ParseError> {
        Ok(Self {
            package: sxd_html::parse_html(html),
        })
    }

    pub fn document(&self) -> sxd_document::dom::Document<'_> {
        self.package.as_document()
    }
}

fn build_xpath(selector: &str) -> Result<XPath, ParseError> {
    XPATH_FACTORY
        .build(selector)
        .map_err(|e| ParseError::new(format!("invalid XPath {selector:?}: {e}")))?
        .ok_or_else(|| ParseError::new(format!("empty XPath {selector:?}")))
}

/// Fresh evaluation context with no extension functions bound — sufficient
/// for the plain XPath 1.0 selectors a channel owner configures.
pub fn default_context<'d>() -> Context<'d> {
    Context::new()
}

/// Evaluation context with the EXSLT-style `re:test` and `lower` extension
/// functions bound, used only by [`super::EntryExtractor`]'s fixed internal
/// image/video link selectors.
pub fn entry_context<'d>() -> Context<'d> {
    let mut context = Context::new();
    context.set_namespace("re", "http://exslt.org/regular-expressions");
    context.set_function("lower", Lower);
    context.set_function(("http://exslt.org/regular-expressions", "test"), ReTest);
    context
}

struct Lower;

impl Function for Lower {
    fn evaluate<'c, 'd>(
        &self,
        _context: &Evaluation<'c, 'd>,
        args: Vec<Value<'d>>,
    ) -> Result<Value<'d>, FunctionError> {
        let mut args = Args(args);
        let s = args.pop_string()?;
        args.done()?;
        Ok(Value::String(s.to_lowercase()))
    }
}

struct ReTest;

impl Function for ReTest {
    fn evaluate<'c, 'd>(
        &self,
        _context: &Evaluation<'c, 'd>,
        args: Vec<Value<'d>>,
    ) -> Result<Value<'d>, FunctionError> {
        let mut args = Args(args);
        let haystack = args.pop_string()?;
        let pattern = args.pop_string()?;
        args.done()?;

        let re = regex::RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|_| FunctionError::Other("invalid re:test pattern".to_string()))?;

        Ok(Value::Boolean(re.is_match(&haystack)))
    }
}

/// Applies an XPath selector to a document or fragment, returning every
/// matching sub-node. Parser or XPath failures raise [`ParseError`].
#[derive(Debug, Clone)]
pub struct RowExtractor {
    selector: String,
}

impl RowExtractor {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn extract<'d>(
        &self,
        context: &Context<'d>,
        node: Node<'d>,
    ) -> Result<Vec<Node<'d>>, ParseError> {
        let xpath = build_xpath(&self.selector)?;
        let value = xpath
            .evaluate(context, node)
            .map_err(|e| ParseError::new(format!("{}: {}", self.selector, e)))?;

        match value {
            Value::Nodeset(ns) => Ok(ns.document_order()),
            other => Err(ParseError::new(format!(
                "selector {:?} expected a node-set, got {:?}",
                self.selector, other
            ))),
        }
    }
}

/// Same evaluation as [`RowExtractor`], but returns only the first result
/// (or `None` if empty). A selector that evaluates to a scalar (string,
/// number, boolean) is returned as-is rather than iterated.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rows: RowExtractor,
}

impl FieldExtractor {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            rows: RowExtractor::new(selector),
        }
    }

    pub fn extract<'d>(
        &self,
        context: &Context<'d>,
        node: Node<'d>,
    ) -> Result<Option<String>, ParseError> {
        let xpath = build_xpath(&self.rows.selector)?;
        let value = xpath
            .evaluate(context, node)
            .map_err(|e| ParseError::new(format!("{}: {}", self.rows.selector, e)))?;

        Ok(match value {
            Value::Nodeset(ns) => ns.document_order().into_iter().next().map(|n| n.string_value()),
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
        })
    }
}

/// Runs a row selector, then for each row applies each field's
/// [`FieldExtractor`] relative to that row.
pub struct DatasetExtractor {
    rows: RowExtractor,
    fields: Vec<(String, FieldExtractor)>,
}

impl DatasetExtractor {
    pub fn new(selector: impl Into<String>, fields: Vec<(&str, &str)>) -> Self {
        Self {
            rows: RowExtractor::new(selector),
            fields: fields
                .into_iter()
                .map(|(name, sel)| (name.to_string(), FieldExtractor::new(sel)))
                .collect(),
        }
    }

    pub fn extract(
        &self,
        html: &ParsedHtml,
        context: &Context<'_>,
    ) -> Result<Vec<BTreeMap<String, Option<String>>>, ParseError> {
        let document = html.document();
        let root: Node<'_> = document.root().into();
        let rows = self.rows.extract(context, root)?;

        rows.into_iter()
            .map(|row| {
                let mut out = BTreeMap::new();
                for (name, field) in &self.fields {
                    out.insert(name.clone(), field.extract(context, row)?);
                }
                Ok(out)
            })
            .collect()
    }
}

/// [`DatasetExtractor`] parameterised from a channel's four selectors.
pub struct ChannelExtractor {
    inner: DatasetExtractor,
}

impl ChannelExtractor {
    pub fn from_channel(channel: &Channel) -> Self {
        let mut fields = vec![
            ("url", channel.url_selector.as_str()),
            ("title", channel.title_selector.as_str()),
        ];
        if let Some(extra) = &channel.extra_selector {
            fields.push(("extra", extra.as_str()));
        }

        Self {
            inner: DatasetExtractor::new(channel.row_selector.clone(), fields),
        }
    }

    pub fn extract(
        &self,
        html: &ParsedHtml,
    ) -> Result<Vec<BTreeMap<String, Option<String>>>, ParseError> {
        let context = default_context();
        self.inner.extract(html, &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(row: &str, url: &str, title: &str) -> Channel {
        Channel {
            id: 1,
            title: "t".into(),
            url: "http://h.com/idx".into(),
            enabled: true,
            interval: crate::types::Interval::Manual,
            slug: "x".repeat(32),
            status: crate::types::Status::New,
            row_selector: row.into(),
            url_selector: url.into(),
            title_selector: title.into(),
            extra_selector: None,
        }
    }

    #[test]
    fn extracts_rows_with_relative_fields() {
        let html = ParsedHtml::parse(r#"<html><body><a href="/e/1">T</a></body></html>"#).unwrap();
        let extractor = ChannelExtractor::from_channel(&channel("//a", "@href", "text()"));
        let rows = extractor.extract(&html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("url").unwrap().as_deref(), Some("/e/1"));
        assert_eq!(rows[0].get("title").unwrap().as_deref(), Some("T"));
    }

    #[test]
    fn empty_channel_page_yields_no_rows() {
        let html = ParsedHtml::parse("<html><body></body></html>").unwrap();
        let extractor = ChannelExtractor::from_channel(&channel("//a", "@href", "text()"));
        assert!(extractor.extract(&html).unwrap().is_empty());
    }

    #[test]
    fn field_extractor_returns_first_match_only() {
        let html = ParsedHtml::parse("<html><body><p>first</p><p>second</p></body></html>").unwrap();
        let context = default_context();
        let field = FieldExtractor::new("//p/text()");
        let doc = html.document();
        let value = field.extract(&context, doc.root().into()).unwrap();
        assert_eq!(value.as_deref(), Some("first"));
    }
}
