//! RSS/Atom feed parser, per spec §4.3. One [`ParserResult`] per entry,
//! built on the `feed-rs` crate.

use async_trait::async_trait;
use feed_rs::parser as feed_parser;
use serde_json::json;

use super::{Parser, ParserResult};
use crate::error::CoreError;
use crate::model::ContentType;
use crate::text;

pub struct FeedParser;

fn strip_html(input: &str) -> String {
    let tag = regex::Regex::new(r"<[^>]+>").unwrap();
    tag.replace_all(input, " ").to_string()
}

#[async_trait]
impl Parser for FeedParser {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let feed = feed_parser::parse(bytes).map_err(|e| CoreError::parse_error(e.to_string()))?;

        let mut results = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            let entry_url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_else(|| url.to_string());

            let raw_body = entry
                .content
                .as_ref()
                .and_then(|c| c.body.clone())
                .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
                .unwrap_or_default();
            let cleaned_text = text::clean(&strip_html(&raw_body));

            let title = entry.title.map(|t| t.content);
            let author = entry.authors.first().map(|a| a.name.clone());
            let publish_date = entry.published.or(entry.updated).map(|t| t.into());
            let tags: Vec<String> = entry.categories.iter().map(|c| c.term.clone()).collect();

            let mut result = ParserResult::new(entry_url, ContentType::Rss, raw_body, cleaned_text);
            result.title = title;
            result.author = author;
            result.publish_date = publish_date;
            if !tags.is_empty() {
                result.custom.insert("tags".to_string(), json!(tags));
            }
            results.push(result);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Feed</title>
<item>
  <title>First post</title>
  <link>https://example.com/first</link>
  <description>&lt;p&gt;Hello world&lt;/p&gt;</description>
  <author>writer@example.com</author>
  <category>rust</category>
  <category>crawling</category>
</item>
</channel></rss>"#;

    #[tokio::test]
    async fn parses_one_result_per_entry() {
        let parser = FeedParser;
        let results = parser.parse(SAMPLE_RSS.as_bytes(), "https://example.com/feed").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://example.com/first");
        assert_eq!(results[0].title.as_deref(), Some("First post"));
        assert!(results[0].cleaned_text.contains("Hello world"));
        let tags = results[0].custom.get("tags").unwrap().as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], "rust");
    }

    #[tokio::test]
    async fn invalid_feed_bytes_are_a_parse_error() {
        let parser = FeedParser;
        let result = parser.parse(b"not a feed", "https://example.com/feed").await;
        assert!(result.is_err());
    }
}
