//! Webpage reader: fetch a page and reduce it to readable text.
//!
//! Extraction is regex based. Non-content blocks (`script`, `style`,
//! `noscript`, `nav`, `footer`, `header`) are dropped whole, block-level tags
//! become line breaks, all other tags vanish, common entities are decoded and
//! whitespace is collapsed.

use std::sync::LazyLock;

use async_trait::async_trait;
use agentrelay_config::AppConfig;
use agentrelay_core::{
    Arguments, Capability, CapabilityError, CapabilityOutput, CapabilitySpec, ParamSpec,
    TrackingContext,
};
use regex_lite::{Captures, Regex};
use tracing::debug;

use crate::http::{build_client, request_failed};

const DROPPED_BLOCKS: [&str; 6] = ["script", "style", "noscript", "nav", "footer", "header"];

static DROPPED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DROPPED_BLOCKS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}(?:\s[^>]*)?>.*?</{tag}\s*>")).expect("static pattern"))
        .collect()
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static pattern"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title(?:\s[^>]*)?>(.*?)</title\s*>").expect("static pattern"));
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|div|br|li|tr|h[1-6]|section|article|blockquote|pre|table|ul|ol)(?:\s[^>]*)?/?>")
        .expect("static pattern")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static pattern"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("static pattern"));
static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r]+").expect("static pattern"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n(?:\s*\n)+").expect("static pattern"));

/// Readable text pulled out of an HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub title: String,
    pub content: String,
    /// Character count before truncation.
    pub length: usize,
    pub truncated: bool,
}

/// Decode named and numeric character references.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "mdash" => Some('—'),
                    "ndash" => Some('–'),
                    "hellip" => Some('…'),
                    "copy" => Some('©'),
                    _ => None,
                }
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    let text = INLINE_SPACE.replace_all(text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce `html` to its title and readable text, cut at `max_length` chars.
pub fn extract(html: &str, max_length: usize) -> Extracted {
    let title = TITLE
        .captures(html)
        .map(|c| collapse_whitespace(&decode_entities(&ANY_TAG.replace_all(&c[1], ""))))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title".into());

    let mut body = COMMENT.replace_all(html, "").into_owned();
    body = TITLE.replace_all(&body, "").into_owned();
    for re in DROPPED.iter() {
        body = re.replace_all(&body, "").into_owned();
    }
    body = BLOCK_TAG.replace_all(&body, "\n").into_owned();
    body = ANY_TAG.replace_all(&body, "").into_owned();
    let content = collapse_whitespace(&decode_entities(&body));

    let length = content.chars().count();
    let truncated = length > max_length;
    let content = if truncated {
        content.chars().take(max_length).collect()
    } else {
        content
    };

    Extracted {
        title,
        content,
        length,
        truncated,
    }
}

pub struct WebpageReaderTool {
    client: reqwest::Client,
    max_length: usize,
}

impl WebpageReaderTool {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: build_client(&config.http),
            max_length: config.reader.max_length,
        }
    }
}

#[async_trait]
impl Capability for WebpageReaderTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new(
            "webpage_reader",
            "Fetch a webpage and return its title and clean, readable text content.",
        )
        .param(ParamSpec::string(
            "url",
            "The http(s) URL of the webpage to read.",
        ))
        .param(
            ParamSpec::integer("max_length", "Maximum characters of content to return")
                .with_default(self.max_length as u64),
        )
    }

    async fn invoke(
        &self,
        args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let url = args.require_str("url")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CapabilityError::invalid_arguments(format!(
                "webpage_reader: URL must start with http:// or https://, got '{url}'"
            )));
        }
        let max_length = args.u64("max_length").map_or(self.max_length, |n| n as usize);

        debug!(url, max_length, "Reading webpage");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_failed("webpage_reader", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::implementation(format!(
                "webpage_reader: {url} returned HTTP {}",
                status.as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| request_failed("webpage_reader", e))?;
        let page = extract(&html, max_length);

        let status_message = format!(
            "Read \"{}\" ({} characters{})",
            page.title,
            page.length,
            if page.truncated { ", truncated" } else { "" }
        );
        Ok(CapabilityOutput::new(serde_json::json!({
            "url": url,
            "title": page.title,
            "content": page.content,
            "length": page.length,
            "truncated": page.truncated,
        }))
        .with_status(status_message))
    }
}
