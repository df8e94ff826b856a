//! Website scraping and knowledge-base extraction.
//!
//! Fetch a page, reduce it to visible text, and have the LLM structure it
//! into the knowledge-base shape. Model output that does not parse is kept
//! as `rawContent`.

use regex::Regex;
use sentinels_core::{
    config::ScraperConfig,
    context::Context,
    error::SentinelError,
    model::KnowledgeBase,
    text::truncate_chars,
    traits::Provider,
};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const EXTRACTION_PROMPT: &str = "You extract structured facts about a crypto/web3 project \
from the text of its website. Respond with ONLY a JSON object of this exact shape:\n\
{\n  \"description\": \"one-paragraph summary\",\n  \"features\": [\"feature\"],\n  \
\"tokenomics\": {\"symbol\": \"\", \"supply\": \"\", \"distribution\": \"\"},\n  \
\"roadmap\": [\"milestone\"],\n  \"socialLinks\": {\"twitter\": \"url\"},\n  \
\"faqs\": [{\"question\": \"\", \"answer\": \"\"}]\n}\n\
Use empty strings, arrays, or null when the text says nothing about a field. \
Do not invent facts.";

/// Elements dropped with everything inside them. Inline-content kinds go
/// first so a `<script>` nested in a `<nav>` cannot end the `<nav>` early.
const DROPPED_ELEMENTS: [&str; 6] = ["script", "style", "noscript", "head", "nav", "footer"];

/// Reduces HTML to visible text.
pub struct HtmlCleaner {
    blocks: Vec<Regex>,
    comments: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl HtmlCleaner {
    pub fn new() -> Result<Self, SentinelError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| SentinelError::Scrape(format!("bad pattern: {e}")))
        };
        Ok(Self {
            blocks: DROPPED_ELEMENTS
                .iter()
                .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
                .collect::<Result<_, _>>()?,
            comments: compile(r"(?s)<!--.*?-->")?,
            tags: compile(r"(?s)<[^>]+>")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// Strip non-content blocks, comments, and tags; decode common entities;
    /// collapse whitespace; cap at `max_chars` characters.
    pub fn clean(&self, html: &str, max_chars: usize) -> String {
        let mut text = self.comments.replace_all(html, " ").into_owned();
        for block in &self.blocks {
            text = block.replace_all(&text, " ").into_owned();
        }
        let text = self.tags.replace_all(&text, " ");
        let text = decode_entities(&text);
        let text = self.whitespace.replace_all(&text, " ");
        truncate_chars(text.trim(), max_chars).to_string()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Turn model output into knowledge-base JSON, falling back to `rawContent`.
pub fn parse_extraction(model_text: &str) -> Value {
    let candidate = strip_code_fences(model_text);
    let parsed = serde_json::from_str::<Value>(candidate)
        .map_err(|e| e.to_string())
        .and_then(KnowledgeBase::from_value);
    match parsed.and_then(|kb| serde_json::to_value(kb).map_err(|e| e.to_string())) {
        Ok(value) => value,
        Err(e) => {
            warn!("scraper: extraction output is not a knowledge base ({e}), keeping raw text");
            json!({ "rawContent": model_text })
        }
    }
}

/// Only absolute http(s) URLs are fetched.
pub fn validate_url(raw: &str) -> Result<reqwest::Url, SentinelError> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| SentinelError::Validation(format!("invalid url: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(SentinelError::Validation(
            "url must use http or https".to_string(),
        )),
    }
}

/// Fetches pages and asks the provider to structure them.
pub struct Scraper {
    client: reqwest::Client,
    cleaner: HtmlCleaner,
    max_chars: usize,
    max_page_bytes: usize,
}

impl Scraper {
    pub fn from_config(config: &ScraperConfig) -> Result<Self, SentinelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; SmartSentinelsBot/1.0)")
            .build()
            .map_err(|e| SentinelError::Scrape(format!("http client: {e}")))?;
        Ok(Self {
            client,
            cleaner: HtmlCleaner::new()?,
            max_chars: config.max_chars,
            max_page_bytes: config.max_page_bytes,
        })
    }

    /// Fetch `url` and return its visible text. At most `max_page_bytes` of
    /// the body are read.
    pub async fn fetch_text(&self, url: &reqwest::Url) -> Result<String, SentinelError> {
        let mut resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SentinelError::Scrape(format!("fetch failed: {}", e.without_url())))?;
        if !resp.status().is_success() {
            return Err(SentinelError::Scrape(format!(
                "fetch returned {}",
                resp.status()
            )));
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| {
            SentinelError::Scrape(format!("failed to read page: {}", e.without_url()))
        })? {
            let room = self.max_page_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!("scraper: {url} cut at {} bytes", self.max_page_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        let html = String::from_utf8_lossy(&body);
        Ok(self.cleaner.clean(&html, self.max_chars))
    }

    /// Fetch, clean, and structure one page.
    pub async fn scrape(
        &self,
        provider: &dyn Provider,
        url: &reqwest::Url,
    ) -> Result<Value, SentinelError> {
        let text = self.fetch_text(url).await?;
        if text.is_empty() {
            return Err(SentinelError::Scrape("page has no readable text".into()));
        }
        debug!("scraper: {} chars of text from {url}", text.chars().count());

        let context = Context::new(EXTRACTION_PROMPT, format!("Website text:\n\n{text}"))
            .with_temperature(0.1)
            .json();
        let completion = provider.complete(&context).await?;
        info!(
            "scraper: structured {url} via {} in {}ms",
            completion.metadata.provider_used, completion.metadata.processing_time_ms
        );
        Ok(parse_extraction(&completion.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_script_and_style() {
        let cleaner = HtmlCleaner::new().unwrap();
        let html = r#"<html><head><title>T</title><style>.a{color:red}</style></head>
            <body><nav>Menu</nav><script>var secret = 1;</script>
            <h1>Sentinels</h1><!-- hidden --><p>AI&nbsp;agents &amp; NFTs</p>
            <noscript>enable js</noscript><footer>(c) 2026</footer></body></html>"#;
        let text = cleaner.clean(html, 50_000);
        assert_eq!(text, "Sentinels AI agents & NFTs");
    }

    #[test]
    fn test_clean_strips_each_element_kind_separately() {
        let cleaner = HtmlCleaner::new().unwrap();
        let html = "<nav><script>x</script>Menu</nav><p>Staking</p>\
            <footer><style>p{}</style>Links</footer>";
        assert_eq!(cleaner.clean(html, 50_000), "Staking");
    }

    #[tokio::test]
    async fn test_fetch_text_reads_at_most_the_byte_cap() {
        use axum::{routing::get, Router};

        let page = format!("<p>{}</p>", "a".repeat(10_000));
        let app = Router::new().route("/", get(move || async move { page }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let scraper = Scraper::from_config(&ScraperConfig {
            max_page_bytes: 64,
            ..Default::default()
        })
        .unwrap();
        let url = validate_url(&format!("http://{addr}/")).unwrap();
        let text = scraper.fetch_text(&url).await.unwrap();
        assert_eq!(text, "a".repeat(61));
    }

    #[test]
    fn test_clean_caps_length_by_chars() {
        let cleaner = HtmlCleaner::new().unwrap();
        let html = format!("<p>{}</p>", "é".repeat(100));
        assert_eq!(cleaner.clean(&html, 10).chars().count(), 10);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_extraction_valid() {
        let out = parse_extraction(
            "```json\n{\"description\":\"AI\",\"features\":[\"Agents\"],\"socialLinks\":{\"x\":\"https://x.com/s\"}}\n```",
        );
        assert_eq!(out["description"], "AI");
        assert_eq!(out["features"][0], "Agents");
        assert_eq!(out["social_links"]["x"], "https://x.com/s");
        assert!(out.get("rawContent").is_none());
    }

    #[test]
    fn test_parse_extraction_keeps_fields_next_to_nulls() {
        let out = parse_extraction(
            r#"{"description":"Decentralized AI agents","features":["Staking"],"tokenomics":null,"roadmap":null,"socialLinks":{"twitter":"https://x.com/s","discord":null},"faqs":[]}"#,
        );
        assert!(out.get("rawContent").is_none(), "{out}");
        assert_eq!(out["description"], "Decentralized AI agents");
        assert_eq!(out["features"][0], "Staking");
        assert_eq!(out["social_links"], json!({"twitter": "https://x.com/s"}));

        let out = parse_extraction(r#"{"description":null,"features":["A"]}"#);
        assert!(out.get("rawContent").is_none(), "{out}");
        assert_eq!(out["features"][0], "A");
    }

    #[test]
    fn test_parse_extraction_falls_back_to_raw() {
        let out = parse_extraction("Sorry, I could not read that page.");
        assert_eq!(out["rawContent"], "Sorry, I could not read that page.");

        let wrong_shape = parse_extraction("[1, 2, 3]");
        assert_eq!(wrong_shape["rawContent"], "[1, 2, 3]");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://smartsentinels.net").is_ok());
        assert!(validate_url("http://example.com/page").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }
}
