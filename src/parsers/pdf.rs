//! PDF parser, per spec §4.3. Text extraction via `pdf_extract`; metadata is
//! a best-effort regex scan of the raw info dictionary bytes since
//! `pdf_extract` exposes no structured metadata API. Encrypted or otherwise
//! unreadable documents surface as a parse error, per spec §4.3's
//! "ignores encrypted documents" rule.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::bytes::Regex as BytesRegex;

use super::{Parser, ParserResult};
use crate::error::CoreError;
use crate::model::ContentType;
use crate::text;

static TITLE_PATTERN: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"/Title\s*\(([^)]*)\)").unwrap());
static AUTHOR_PATTERN: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"/Author\s*\(([^)]*)\)").unwrap());
static CREATION_DATE_PATTERN: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"/CreationDate\s*\(D:(\d{4})(\d{2})(\d{2})").unwrap());

pub struct PdfParser;

fn decode_pdf_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).replace("\\(", "(").replace("\\)", ")")
}

fn extract_title(bytes: &[u8]) -> Option<String> {
    TITLE_PATTERN.captures(bytes).map(|c| decode_pdf_string(&c[1])).filter(|s| !s.is_empty())
}

fn extract_author(bytes: &[u8]) -> Option<String> {
    AUTHOR_PATTERN.captures(bytes).map(|c| decode_pdf_string(&c[1])).filter(|s| !s.is_empty())
}

fn extract_creation_date(bytes: &[u8]) -> Option<chrono::DateTime<chrono::Utc>> {
    let caps = CREATION_DATE_PATTERN.captures(bytes)?;
    let year: i32 = std::str::from_utf8(&caps[1]).ok()?.parse().ok()?;
    let month: u32 = std::str::from_utf8(&caps[2]).ok()?.parse().ok()?;
    let day: u32 = std::str::from_utf8(&caps[3]).ok()?.parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[async_trait]
impl Parser for PdfParser {
    async fn parse(&self, bytes: &[u8], url: &str) -> Result<Vec<ParserResult>, CoreError> {
        let raw_content = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| CoreError::parse_error(format!("failed to extract PDF text: {e}")))?;

        let cleaned_text = text::clean(&raw_content);
        let mut result = ParserResult::new(url, ContentType::Pdf, raw_content, cleaned_text);
        result.title = extract_title(bytes);
        result.author = extract_author(bytes);
        result.publish_date = extract_creation_date(bytes);

        Ok(vec![result])
    }
}
