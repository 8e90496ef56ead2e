//! HTML parser, per spec §4.3. Strips noise subtrees with a regex-first
//! pass, combined with `scraper::Selector` for structure-aware
//! title/meta/lang extraction.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::{Parser, ParserResult, decode_bytes};
use crate::error::CoreError;
use crate::model::ContentType;
use crate::text;

static NOISE_SUBTREE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|nav|header|footer|aside|noscript)\b[^>]*>.*?</\1>").unwrap()
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NEXT_HINT: LazyLock<Regex> = LazyLock::new(|| Regex::new("(?i)next").unwrap());

pub struct HtmlParser;

fn strip_noise(html: &str) -> String {
    // Noise subtrees can nest (e.g. a <nav> inside a <header>); apply until
    // a pass makes no further change.
    let mut current = html.to_string();
    loop {
        let next = NOISE_SUBTREE.replace_all(&current, "").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

fn innermost_content_text(document: &Html) -> String {
    for selector_str in ["article", "main", "body"] {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(el) = document.select(&selector).next() {
            let text: String = el.text().collect::<Vec<_>>().join(" ");
            if !text.trim().is_empty() {
                return text;
            }
        }
    }
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").unwrap();
    if let Some(el) = document.select(&title_sel).next() {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    let og_sel = Selector::parse(r#"meta[property="og:title"]"#).unwrap();
    if let Some(el) = document.select(&og_sel).next() {
        if let Some(content) = el.value().attr("content") {
            if !content.trim().is_empty() {
                return Some(content.trim().to_string());
            }
        }
    }
    let h1_sel = Selector::parse("h1").unwrap();
    document.select(&h1_sel).next().map(|el| el.text().collect::<String>().trim().to_string()).filter(|s| !s.is_empty())
}

fn extract_author(document: &Html) -> Option<String> {
    for selector_str in [r#"meta[name="author"]"#, r#"meta[property="article:author"]"#] {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(el) = document.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                if !content.trim().is_empty() {
                    return Some(content.trim().to_string());
                }
            }
        }
    }
    None
}

fn extract_publish_date(document: &Html) -> Option<chrono::DateTime<chrono::Utc>> {
    for selector_str in [
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="publication_date"]"#,
        r#"meta[name="date"]"#,
    ] {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(el) = document.select(&selector).next() {
            if let Some(content) = el.value().attr("content") {
                if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(content.trim()) {
                    return Some(parsed.with_timezone(&chrono::Utc));
                }
            }
        }
    }
    None
}

fn extract_language(document: &Html) -> Option<String> {
    let html_sel = Selector::parse("html").unwrap();
    document.select(&html_sel).next().and_then(|el| el.value().attr("lang")).map(|s| s.to_string())
}

fn extract_next_page(document: &Html, base_url: &Url) -> Option<String> {
    let a_sel = Selector::parse("a").unwrap();
    for el in document.select(&a_sel) {
        let value = el.value();
        let is_rel_next = value.attr("rel").is_some_and(|r| r.split_whitespace().any(|t| t == "next"));
        let class_or_id_hints = value.attr("class").is_some_and(|c| NEXT_HINT.is_match(c))
            || value.attr("id").is_some_and(|i| NEXT_HINT.is_match(i));
        if is_rel_next || class_or_id_hints {
            if let Some(href) = value.attr("href") {
                if let Ok(joined) = base_url.join(href) {
                    return Some(joined.to_string());
                }
            }
        }
    }
    None
}

#[async_trait]
impl Parser for HtmlParser {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let raw = decode_bytes(bytes);
        let document = Html::parse_document(&raw);
        let stripped = strip_noise(&raw);
        let stripped_document = Html::parse_document(&stripped);

        let body_text = innermost_content_text(&stripped_document);
        let cleaned_text = WHITESPACE.replace_all(text::clean(&body_text).trim(), " ").into_owned();

        let base_url = Url::parse(url).map_err(|e| CoreError::parse_error(e.to_string()))?;

        let mut result = ParserResult::new(url, ContentType::Html, raw.clone(), cleaned_text);
        result.title = extract_title(&document);
        result.author = extract_author(&document);
        result.publish_date = extract_publish_date(&document);
        result.language = extract_language(&document);
        result.next_page = extract_next_page(&document, &base_url);

        Ok(vec![result])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_title_and_cleaned_text() {
        let html = br#"<html lang="en"><head><title>Test Page</title></head>
            <body><script>var x=1;</script><article>Welcome to the site.</article></body></html>"#;
        let parser = HtmlParser;
        let results = parser.parse(html, "https://example.com/page").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title.as_deref(), Some("Test Page"));
        assert!(results[0].cleaned_text.contains("Welcome"));
        assert_eq!(results[0].language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn script_and_nav_text_excluded() {
        let html = br#"<html><body><nav>Home About</nav><script>tracking()</script><main>Body copy</main></body></html>"#;
        let parser = HtmlParser;
        let results = parser.parse(html, "https://example.com/").await.unwrap();
        assert!(!results[0].cleaned_text.contains("tracking"));
        assert!(results[0].cleaned_text.contains("Body copy"));
    }

    #[tokio::test]
    async fn next_page_resolved_against_base() {
        let html = br#"<html><body><a rel="next" href="/page/2">Next</a><main>content</main></body></html>"#;
        let parser = HtmlParser;
        let results = parser.parse(html, "https://example.com/page/1").await.unwrap();
        assert_eq!(results[0].next_page.as_deref(), Some("https://example.com/page/2"));
    }
}
