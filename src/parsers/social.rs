//! Social-source parsers, per spec §4.3. Reddit and LinkedIn operate on the
//! bytes already fetched for the source URL; Twitter and YouTube need an
//! out-of-band fetch (a mirror RSS feed / the channel's Atom feed) and so
//! take a [`PoliteFetcher`] as an explicit constructor dependency rather
//! than a singleton, per spec §9.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use feed_rs::parser as feed_parser;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{Parser, ParserResult, decode_bytes};
use crate::error::CoreError;
use crate::fetch::PoliteFetcher;
use crate::model::{ContentType, RetryPolicy};
use crate::text;

// --- Reddit ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(rename = "id")]
    post_id: String,
    title: String,
    author: String,
    selftext: String,
    permalink: String,
    created_utc: f64,
    score: i64,
    num_comments: u64,
}

/// Assumes the source URL already targets a `.json` listing endpoint, per
/// spec §4.3.
pub struct RedditParser;

#[async_trait]
impl Parser for RedditParser {
    async fn parse(&self, bytes: &[u8], _url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let raw = decode_bytes(bytes);
        let listing: RedditListing =
            serde_json::from_str(&raw).map_err(|e| CoreError::parse_error(e.to_string()))?;

        let mut results = Vec::with_capacity(listing.data.children.len());
        for child in listing.data.children {
            let post = child.data;
            let post_url = format!("https://www.reddit.com{}", post.permalink);
            let cleaned_text = text::clean(&post.selftext);

            let mut result =
                ParserResult::new(post_url, ContentType::Reddit, post.selftext.clone(), cleaned_text);
            result.title = Some(post.title);
            result.author = Some(post.author);
            result.publish_date = chrono::DateTime::from_timestamp(post.created_utc as i64, 0);
            result.custom.insert("platform".to_string(), json!("reddit"));
            result.custom.insert("post_id".to_string(), json!(post.post_id));
            result.custom.insert("score".to_string(), json!(post.score));
            result.custom.insert("num_comments".to_string(), json!(post.num_comments));
            results.push(result);
        }

        Ok(results)
    }
}

// --- Shared feed delegation for Twitter/YouTube ----------------------------

fn strip_html(input: &str) -> String {
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
    TAG.replace_all(input, " ").to_string()
}

async fn fetch_and_parse_feed(
    fetcher: &PoliteFetcher,
    feed_url: &str,
    content_type: ContentType,
    platform: &str,
) -> Result<Vec<ParserResult>, CoreError> {
    let parsed_url = Url::parse(feed_url).map_err(|e| CoreError::parse_error(e.to_string()))?;
    let response = fetcher.fetch(&parsed_url, &RetryPolicy::default()).await?;

    let feed = feed_parser::parse(response.body.as_bytes())
        .map_err(|e| CoreError::parse_error(e.to_string()))?;

    let mut results = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let entry_url = entry.links.first().map(|l| l.href.clone()).unwrap_or_else(|| feed_url.to_string());
        let raw_body = entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
            .unwrap_or_default();
        let cleaned_text = text::clean(&strip_html(&raw_body));

        let mut result = ParserResult::new(entry_url, content_type, raw_body, cleaned_text);
        result.title = entry.title.map(|t| t.content);
        result.author = entry.authors.first().map(|a| a.name.clone());
        result.publish_date = entry.published.or(entry.updated).map(|t| t.into());
        result.custom.insert("platform".to_string(), json!(platform));
        results.push(result);
    }

    Ok(results)
}

// --- Twitter ---------------------------------------------------------------

static HANDLE_FROM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:twitter|x)\.com/([A-Za-z0-9_]+)").unwrap());

pub struct TwitterParser {
    fetcher: Arc<PoliteFetcher>,
}

impl TwitterParser {
    pub fn new(fetcher: Arc<PoliteFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Parser for TwitterParser {
    async fn parse(&self, _bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let handle = HANDLE_FROM_URL
            .captures(url)
            .map(|c| c[1].to_string())
            .ok_or_else(|| CoreError::parse_error(format!("could not extract handle from {url}")))?;
        let mirror_feed_url = format!("https://nitter.net/{handle}/rss");
        fetch_and_parse_feed(&self.fetcher, &mirror_feed_url, ContentType::Twitter, "twitter").await
    }
}

// --- YouTube ----------------------------------------------------------------

static CHANNEL_ID_FROM_HTML: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""channelId":"(UC[A-Za-z0-9_-]{22})""#).unwrap());
static CHANNEL_ID_FROM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/channel/(UC[A-Za-z0-9_-]{22})").unwrap());

pub struct YoutubeParser {
    fetcher: Arc<PoliteFetcher>,
}

impl YoutubeParser {
    pub fn new(fetcher: Arc<PoliteFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Parser for YoutubeParser {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let channel_id = CHANNEL_ID_FROM_URL
            .captures(url)
            .or_else(|| CHANNEL_ID_FROM_HTML.captures(&decode_bytes(bytes)))
            .map(|c| c[1].to_string())
            .ok_or_else(|| CoreError::parse_error(format!("could not resolve channel id for {url}")))?;

        let feed_url = format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}");
        fetch_and_parse_feed(&self.fetcher, &feed_url, ContentType::Youtube, "youtube").await
    }
}

// --- LinkedIn ----------------------------------------------------------------

/// Best-effort company-page scraping, per spec §4.3. LinkedIn's markup is
/// heavily obfuscated behind auth walls; this extracts whatever og: metadata
/// the public page exposes.
pub struct LinkedinParser;

#[async_trait]
impl Parser for LinkedinParser {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let raw = decode_bytes(bytes);
        let document = Html::parse_document(&raw);

        let title_sel = Selector::parse(r#"meta[property="og:title"]"#).unwrap();
        let desc_sel = Selector::parse(r#"meta[property="og:description"]"#).unwrap();

        let title = document
            .select(&title_sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.to_string());
        let description = document
            .select(&desc_sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .unwrap_or_default();

        let cleaned_text = text::clean(description);
        let mut result = ParserResult::new(url, ContentType::Linkedin, raw.clone(), cleaned_text);
        result.title = title;
        result.custom.insert("platform".to_string(), json!("linkedin"));

        Ok(vec![result])
    }
}
