//! Content pipeline
//!
//! Article bodies come out of the editor as HTML whose images point into the
//! upload directory (`<img src="/uploads/cat.png">`). Before storage those
//! references are rewritten into named placeholders:
//!
//! ```text
//! <img src="{{ image['cat.png'] }}">
//! ```
//!
//! At render time every placeholder is replaced by a base64 data URI built
//! from the article's stored images, so a rendered article does not depend
//! on the upload directory at all. The editor gets the upload references
//! back instead, so saving it again yields the same placeholders.
//!
//! Matching is done on whole, quote-delimited `src` attribute values, so
//! `img1.png` never matches inside `img10.png`.

use anyhow::{Context, Result};
use data_encoding::BASE64;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Media type used for every embedded image
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// `{{ image['name'] }}`
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*image\['([^']+)'\]\s*\}\}").expect("placeholder pattern is valid")
});

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")
        .expect("script/style pattern is valid")
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Converts article bodies between editor HTML and stored placeholder form
#[derive(Debug, Clone)]
pub struct ContentCodec {
    url_prefix: String,
    upload_ref: Regex,
}

impl ContentCodec {
    /// Create a codec for images served under `url_prefix` (e.g. `/uploads/`)
    pub fn new(url_prefix: &str) -> Result<Self> {
        let prefix = regex::escape(url_prefix);
        let pattern = format!(
            r#"(^|\s)(?i:src)\s*=\s*(?:"{prefix}([^"'\s<>]+)"|'{prefix}([^"'\s<>]+)')"#,
            prefix = prefix
        );
        let upload_ref = Regex::new(&pattern)
            .with_context(|| format!("Invalid upload URL prefix: {}", url_prefix))?;

        Ok(Self {
            url_prefix: url_prefix.to_string(),
            upload_ref,
        })
    }

    /// URL prefix uploads are served under
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Rewrite upload references into placeholders
    ///
    /// Any other `src` value, including data URIs and external URLs, is left
    /// untouched.
    pub fn encode(&self, html: &str) -> String {
        self.upload_ref
            .replace_all(html, |caps: &Captures| {
                let name = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                format!("{}src=\"{}\"", &caps[1], placeholder(name))
            })
            .into_owned()
    }

    /// Distinct image names referenced by a stored body, in order of first use
    pub fn referenced_images(&self, template: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(template) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Substitute every placeholder with a data URI from `images`
    /// (file name to base64 data)
    ///
    /// A placeholder whose image is missing renders as an empty string,
    /// leaving `src=""` behind.
    pub fn render(&self, template: &str, images: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match images.get(&caps[1]) {
                Some(data) => format!("{}{}", DATA_URI_PREFIX, data),
                None => {
                    tracing::debug!("No stored image for placeholder {:?}", &caps[1]);
                    String::new()
                }
            })
            .into_owned()
    }

    /// Turn placeholders back into upload references for the editor
    ///
    /// The editor shows images from the upload directory, so saving the
    /// body again encodes the same placeholders instead of inline data.
    pub fn upload_sources(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| {
                format!("{}{}", self.url_prefix, &caps[1])
            })
            .into_owned()
    }

    /// Plain-text rendition of an HTML body, used for the search index
    pub fn plain_text(&self, html: &str) -> String {
        let without_code = SCRIPT_OR_STYLE.replace_all(html, " ");
        let without_tags = TAG.replace_all(&without_code, " ");
        let decoded = decode_entities(&without_tags);
        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Placeholder token for an image name
pub fn placeholder(name: &str) -> String {
    format!("{{{{ image['{}'] }}}}", name)
}

/// Data URI for raw image bytes
pub fn data_uri(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, BASE64.encode(bytes))
}

fn decode_entities(text: &str) -> String {
    // &amp; goes last so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
