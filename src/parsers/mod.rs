//! Parser set, per spec §4.3. All parsers implement [`Parser`]; dispatch is
//! a content-type-keyed lookup (spec §9's "polymorphism over parsers")
//! producing the shared `ParserResult` shape spec §4.3 names.

mod feed;
mod html;
mod pdf;
mod social;
mod txt;

pub use feed::FeedParser;
pub use html::HtmlParser;
pub use pdf::PdfParser;
pub use social::{LinkedinParser, RedditParser, TwitterParser, YoutubeParser};
pub use txt::TxtParser;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::fetch::PoliteFetcher;
use crate::model::ContentType;

/// Normalised output of a parser, per spec §4.3.
#[derive(Debug, Clone)]
pub struct ParserResult {
    pub url: String,
    pub content_type: ContentType,
    pub raw_content: String,
    pub cleaned_text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub word_count: usize,
    /// Shallow, single-hop "next page" detection, per spec §4.3/§9.
    pub next_page: Option<String>,
    pub custom: HashMap<String, serde_json::Value>,
}

impl ParserResult {
    pub fn new(url: impl Into<String>, content_type: ContentType, raw_content: String, cleaned_text: String) -> Self {
        let word_count = cleaned_text.split_whitespace().count();
        Self {
            url: url.into(),
            content_type,
            raw_content,
            cleaned_text,
            title: None,
            author: None,
            publish_date: None,
            language: None,
            word_count,
            next_page: None,
            custom: HashMap::new(),
        }
    }
}

/// Shared parser contract, per spec §4.3. Social parsers that resolve an
/// out-of-band mirror/feed URL (Twitter, YouTube) take the fetcher they
/// need as a constructor dependency rather than a singleton, per spec §9's
/// "replace any monkey-patch-style singleton with an explicit dependency".
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError>;
}

/// Charset sniffing with a confidence threshold, UTF-8-with-replacement
/// fallback, latin-1 as the ultimate fallback, per spec §4.3.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let (encoding, confident) = detector.guess_assess(None, true);
    if confident {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(_) => {
            let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
            if text.contains('\u{FFFD}') {
                let (latin1, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
                latin1.into_owned()
            } else {
                text.into_owned()
            }
        }
    }
}

/// Content-type-keyed dispatch table, per spec §9.
pub struct ParserRegistry {
    fetcher: Arc<PoliteFetcher>,
}

impl ParserRegistry {
    pub fn new(fetcher: Arc<PoliteFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn parser_for(&self, content_type: ContentType) -> Box<dyn Parser> {
        match content_type {
            ContentType::Html => Box::new(HtmlParser),
            ContentType::Rss => Box::new(FeedParser),
            ContentType::Pdf => Box::new(PdfParser),
            ContentType::Txt => Box::new(TxtParser),
            ContentType::Twitter => Box::new(TwitterParser::new(self.fetcher.clone())),
            ContentType::Reddit => Box::new(RedditParser),
            ContentType::Youtube => Box::new(YoutubeParser::new(self.fetcher.clone())),
            ContentType::Linkedin => Box::new(LinkedinParser),
        }
    }
}
