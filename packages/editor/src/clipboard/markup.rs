//! # Markup Projection
//!
//! Per-type rules turning a block into block-comment markup and back.
//!
//! ```text
//! <!-- wp:core/heading {"textAlign":"center"} -->
//! <h3>Release notes</h3>
//! <!-- /wp:core/heading -->
//! ```
//!
//! Each rule owns one block type. Types without a rule are written as a
//! generic wrapper carrying the structured form in a `data-block` attribute.
//! Decoding is best effort: a fragment nothing recognizes yields `None` and
//! the codec moves on to its next fallback.

use crate::block::{Attributes, Block};
use crate::clipboard::parse_structured;
use crate::conversions::{CODE, HEADING, LIST, PARAGRAPH, QUOTE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::fmt::Debug;

pub const IMAGE: &str = "core/image";
pub const SEPARATOR: &str = "core/separator";

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--\s*wp:(\S+?)(?:\s+(\{.*?\}))?\s*-->").expect("valid regex"));
static DATA_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-block=(?:"([^"]*)"|'([^']*)')"#).expect("valid regex"));
static FIRST_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9]*)").expect("valid regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static PARAGRAPH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p(?:\s[^>]*)?>(.*?)</p>").expect("valid regex"));
static HEADING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<h([1-6])(?:\s[^>]*)?>(.*?)</h[1-6]>").expect("valid regex"));
static LIST_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(ul|ol)(?:\s[^>]*)?>(.*?)</(?:ul|ol)>").expect("valid regex"));
static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<li(?:\s[^>]*)?>(.*?)</li>").expect("valid regex"));
static QUOTE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<blockquote(?:\s[^>]*)?>(.*?)</blockquote>").expect("valid regex"));
static CITE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<cite>(.*?)</cite>").expect("valid regex"));
static PRE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<pre(?:\s[^>]*)?>(.*?)</pre>").expect("valid regex"));
static CODE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<code(?:\s+class="language-([^"]*)")?[^>]*>(.*?)</code>"#).expect("valid regex"));
static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img\s[^>]*>").expect("valid regex"));
static SRC_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"src="([^"]*)""#).expect("valid regex"));
static ALT_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"alt="([^"]*)""#).expect("valid regex"));
static FIGCAPTION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<figcaption>(.*?)</figcaption>").expect("valid regex"));

/// Encode/decode rule for one block type
pub trait MarkupRule: Debug + Send + Sync {
    fn block_type(&self) -> &'static str;

    /// Tag names this rule recognizes in markup without block comments
    fn tags(&self) -> &'static [&'static str];

    /// Inner markup for a block of this type
    fn encode(&self, block: &Block) -> String;

    /// Content recovered from inner markup, if it has the expected shape
    fn decode(&self, inner: &str) -> Option<Value>;
}

fn str_field<'a>(content: &'a Value, key: &str) -> &'a str {
    content.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn capture(re: &Regex, haystack: &str, group: usize) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug)]
struct ParagraphRule;

impl MarkupRule for ParagraphRule {
    fn block_type(&self) -> &'static str {
        PARAGRAPH
    }

    fn tags(&self) -> &'static [&'static str] {
        &["p"]
    }

    fn encode(&self, block: &Block) -> String {
        format!("<p>{}</p>", escape_html(str_field(&block.content, "text")))
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        let text = capture(&PARAGRAPH_TAG, inner, 1)?;
        Some(json!({ "text": visible_text(&text) }))
    }
}

#[derive(Debug)]
struct HeadingRule;

impl MarkupRule for HeadingRule {
    fn block_type(&self) -> &'static str {
        HEADING
    }

    fn tags(&self) -> &'static [&'static str] {
        &["h1", "h2", "h3", "h4", "h5", "h6"]
    }

    fn encode(&self, block: &Block) -> String {
        let level = block
            .content
            .get("level")
            .and_then(Value::as_u64)
            .unwrap_or(2)
            .clamp(1, 6);
        format!(
            "<h{level}>{}</h{level}>",
            escape_html(str_field(&block.content, "text"))
        )
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        let caps = HEADING_TAG.captures(inner)?;
        let level: u64 = caps[1].parse().ok()?;
        Some(json!({ "text": visible_text(&caps[2]), "level": level }))
    }
}

#[derive(Debug)]
struct ListRule;

impl MarkupRule for ListRule {
    fn block_type(&self) -> &'static str {
        LIST
    }

    fn tags(&self) -> &'static [&'static str] {
        &["ul", "ol"]
    }

    fn encode(&self, block: &Block) -> String {
        let ordered = block
            .content
            .get("ordered")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let tag = if ordered { "ol" } else { "ul" };
        let items: String = block
            .content
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| format!("<li>{}</li>", escape_html(item.as_str().unwrap_or_default())))
                    .collect()
            })
            .unwrap_or_default();
        format!("<{tag}>{items}</{tag}>")
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        let caps = LIST_TAG.captures(inner)?;
        let items: Vec<Value> = LIST_ITEM
            .captures_iter(&caps[2])
            .map(|item| Value::String(visible_text(&item[1])))
            .collect();
        if &caps[1] == "ol" {
            Some(json!({ "items": items, "ordered": true }))
        } else {
            Some(json!({ "items": items }))
        }
    }
}

#[derive(Debug)]
struct QuoteRule;

impl MarkupRule for QuoteRule {
    fn block_type(&self) -> &'static str {
        QUOTE
    }

    fn tags(&self) -> &'static [&'static str] {
        &["blockquote"]
    }

    fn encode(&self, block: &Block) -> String {
        let mut html = format!(
            "<blockquote class=\"wp-block-quote\"><p>{}</p>",
            escape_html(str_field(&block.content, "text"))
        );
        let citation = str_field(&block.content, "citation");
        if !citation.is_empty() {
            html.push_str(&format!("<cite>{}</cite>", escape_html(citation)));
        }
        html.push_str("</blockquote>");
        html
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        let body = capture(&QUOTE_TAG, inner, 1)?;
        let citation = capture(&CITE_TAG, &body, 1);
        let without_cite = CITE_TAG.replace_all(&body, "");
        let text = capture(&PARAGRAPH_TAG, &without_cite, 1)
            .unwrap_or_else(|| without_cite.to_string());

        let mut content = Map::new();
        content.insert("text".into(), Value::String(visible_text(&text)));
        if let Some(citation) = citation {
            content.insert("citation".into(), Value::String(visible_text(&citation)));
        }
        Some(Value::Object(content))
    }
}

#[derive(Debug)]
struct CodeRule;

impl MarkupRule for CodeRule {
    fn block_type(&self) -> &'static str {
        CODE
    }

    fn tags(&self) -> &'static [&'static str] {
        &["pre"]
    }

    fn encode(&self, block: &Block) -> String {
        let code = escape_html(str_field(&block.content, "content"));
        match block.content.get("language").and_then(Value::as_str) {
            Some(language) if !language.is_empty() => format!(
                "<pre class=\"wp-block-code\"><code class=\"language-{}\">{}</code></pre>",
                escape_attribute(language),
                code
            ),
            _ => format!("<pre class=\"wp-block-code\"><code>{}</code></pre>", code),
        }
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        let body = capture(&PRE_TAG, inner, 1)?;
        let mut content = Map::new();
        match CODE_TAG.captures(&body) {
            Some(caps) => {
                content.insert("content".into(), Value::String(visible_text_raw(&caps[2])));
                if let Some(language) = caps.get(1) {
                    content.insert("language".into(), Value::String(unescape_html(language.as_str())));
                }
            }
            None => {
                content.insert("content".into(), Value::String(visible_text_raw(&body)));
            }
        }
        Some(Value::Object(content))
    }
}

#[derive(Debug)]
struct ImageRule;

impl MarkupRule for ImageRule {
    fn block_type(&self) -> &'static str {
        IMAGE
    }

    fn tags(&self) -> &'static [&'static str] {
        &["figure", "img"]
    }

    fn encode(&self, block: &Block) -> String {
        let mut html = format!(
            "<figure class=\"wp-block-image\"><img src=\"{}\" alt=\"{}\"/>",
            escape_attribute(str_field(&block.content, "url")),
            escape_attribute(str_field(&block.content, "alt"))
        );
        let caption = str_field(&block.content, "caption");
        if !caption.is_empty() {
            html.push_str(&format!("<figcaption>{}</figcaption>", escape_html(caption)));
        }
        html.push_str("</figure>");
        html
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        let img = IMG_TAG.find(inner)?.as_str();
        let mut content = Map::new();
        content.insert(
            "url".into(),
            Value::String(unescape_html(&capture(&SRC_ATTR, img, 1).unwrap_or_default())),
        );
        content.insert(
            "alt".into(),
            Value::String(unescape_html(&capture(&ALT_ATTR, img, 1).unwrap_or_default())),
        );
        if let Some(caption) = capture(&FIGCAPTION_TAG, inner, 1) {
            content.insert("caption".into(), Value::String(visible_text(&caption)));
        }
        Some(Value::Object(content))
    }
}

#[derive(Debug)]
struct SeparatorRule;

impl MarkupRule for SeparatorRule {
    fn block_type(&self) -> &'static str {
        SEPARATOR
    }

    fn tags(&self) -> &'static [&'static str] {
        &["hr"]
    }

    fn encode(&self, _block: &Block) -> String {
        "<hr class=\"wp-block-separator\"/>".to_string()
    }

    fn decode(&self, inner: &str) -> Option<Value> {
        inner.contains("<hr").then(|| json!({}))
    }
}

/// Registry of markup rules
#[derive(Debug)]
pub struct MarkupRules {
    rules: Vec<Box<dyn MarkupRule>>,
}

impl MarkupRules {
    /// Registry with the built-in rules
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ParagraphRule),
                Box::new(HeadingRule),
                Box::new(ListRule),
                Box::new(QuoteRule),
                Box::new(CodeRule),
                Box::new(ImageRule),
                Box::new(SeparatorRule),
            ],
        }
    }

    /// Register another rule; it takes precedence over earlier ones
    pub fn register(&mut self, rule: Box<dyn MarkupRule>) {
        self.rules.insert(0, rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn for_type(&self, block_type: &str) -> Option<&dyn MarkupRule> {
        self.rules
            .iter()
            .find(|rule| rule.block_type() == block_type)
            .map(|rule| &**rule)
    }

    fn for_tag(&self, tag: &str) -> Option<&dyn MarkupRule> {
        let tag = tag.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.tags().contains(&tag.as_str()))
            .map(|rule| &**rule)
    }

    /// Full markup for a block: block comments around the per-type body
    ///
    /// `structured` is embedded verbatim when the type has no rule.
    pub fn encode(&self, block: &Block, structured: &str) -> String {
        let inner = match self.for_type(&block.block_type) {
            Some(rule) => rule.encode(block),
            None => format!(
                "<div class=\"wp-block-{}\" data-block=\"{}\"></div>",
                block.block_type.replace('/', "-"),
                escape_attribute(structured)
            ),
        };

        let mut html = format!("<!-- wp:{}", block.block_type);
        if !block.attributes.is_empty() {
            html.push(' ');
            html.push_str(&comment_json(&block.attributes));
        }
        html.push_str(" -->\n");
        html.push_str(&inner);
        html.push_str(&format!("\n<!-- /wp:{} -->", block.block_type));
        html
    }

    /// Recover a block (without ids) from markup
    pub fn decode(&self, markup: &str) -> Option<Block> {
        match BLOCK_COMMENT.captures(markup) {
            Some(caps) => {
                let block_type = caps[1].to_string();
                let attributes = caps
                    .get(2)
                    .and_then(|m| serde_json::from_str::<Attributes>(m.as_str()).ok())
                    .unwrap_or_default();

                let rest = &markup[caps.get(0).map_or(0, |m| m.end())..];
                let closing = format!("<!-- /wp:{} -->", block_type);
                let inner = rest.find(&closing).map_or(rest, |end| &rest[..end]).trim();

                if let Some(embedded) = embedded_block(inner) {
                    return Some(embedded);
                }

                let content = self
                    .for_type(&block_type)
                    .and_then(|rule| rule.decode(inner))
                    .unwrap_or_else(|| json!({ "raw": inner }));

                Some(Block {
                    id: String::new(),
                    block_type,
                    content,
                    attributes,
                    inner_blocks: Vec::new(),
                })
            }
            None => {
                if let Some(embedded) = embedded_block(markup) {
                    return Some(embedded);
                }
                let tag = capture(&FIRST_TAG, markup, 1)?;
                let rule = self.for_tag(&tag)?;
                let content = rule.decode(markup)?;
                Some(Block::new(rule.block_type(), content))
            }
        }
    }
}

impl Default for MarkupRules {
    fn default() -> Self {
        Self::new()
    }
}

fn embedded_block(markup: &str) -> Option<Block> {
    let caps = DATA_BLOCK.captures(markup)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    parse_structured(&unescape_html(raw))
}

/// JSON safe to embed in an HTML comment
fn comment_json(attributes: &Attributes) -> String {
    // These characters only occur inside JSON strings, so escaping them is lossless
    serde_json::to_string(attributes)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("--", "\\u002d\\u002d")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attribute(text: &str) -> String {
    escape_html(text)
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Text with tags removed and entities decoded, trimmed
pub fn visible_text(markup: &str) -> String {
    visible_text_raw(markup).trim().to_string()
}

fn visible_text_raw(markup: &str) -> String {
    unescape_html(&ANY_TAG.replace_all(markup, ""))
}
