//! Plain-text parser, per spec §4.3. Title is the first non-empty line
//! (bounded to 200 characters); otherwise falls back to the URL's last path
//! segment.

use async_trait::async_trait;
use url::Url;

use super::{Parser, ParserResult, decode_bytes};
use crate::error::CoreError;
use crate::model::ContentType;
use crate::text;

pub struct TxtParser;

fn title_from_first_line(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(200).collect())
}

fn title_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    Some(segment.to_string())
}

#[async_trait]
impl Parser for TxtParser {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let raw = decode_bytes(bytes);
        let cleaned_text = text::clean(&raw);

        let mut result = ParserResult::new(url, ContentType::Txt, raw.clone(), cleaned_text);
        result.title = title_from_first_line(&raw).or_else(|| title_from_url(url));

        Ok(vec![result])
    }
}
