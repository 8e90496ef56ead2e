//! Blocking detector, per spec §4.2. A pure function: no I/O, no shared
//! state.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::BlockType;

static CAPTCHA_PATTERNS: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "cloudflare",
    "challenge",
    "verify you are human",
    "security check",
    "unusual traffic",
    "robot",
    "automated",
];

static IP_BAN_PATTERNS: &[&str] = &[
    "ip.*banned",
    "ip.*blocked",
    "access denied",
    "forbidden",
    "too many requests",
    "rate limit exceeded",
    "temporarily blocked",
];

static CAPTCHA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){}", CAPTCHA_PATTERNS.join("|"))).expect("static pattern set compiles")
});

static IP_BAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){}", IP_BAN_PATTERNS.join("|"))).expect("static pattern set compiles")
});

static CAPTCHA_IFRAME_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)recaptcha|hcaptcha").unwrap());
static CAPTCHA_ELEMENT_ID_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)captcha|recaptcha|hcaptcha").unwrap());
static CAPTCHA_FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| Regex::new("(?i)captcha").unwrap());

/// Outcome of `detect`, per spec §4.2.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub blocked: bool,
    pub block_type: Option<BlockType>,
    pub http_block: bool,
    pub captcha: bool,
    pub ip_ban: bool,
    pub status: u16,
}

fn http_block_type(status: u16) -> Option<BlockType> {
    match status {
        403 => Some(BlockType::Http403Forbidden),
        429 => Some(BlockType::Http429RateLimit),
        503 => Some(BlockType::Http503ServiceUnavailable),
        _ => None,
    }
}

fn has_captcha_dom_markers(body: &str) -> bool {
    let document = scraper::Html::parse_document(body);

    let iframe_sel = scraper::Selector::parse("iframe").unwrap();
    if document.select(&iframe_sel).any(|el| {
        el.value().attr("src").is_some_and(|src| CAPTCHA_IFRAME_SRC.is_match(src))
    }) {
        return true;
    }

    let div_sel = scraper::Selector::parse("div").unwrap();
    let form_sel = scraper::Selector::parse("form").unwrap();

    let div_or_form_marked = |el: scraper::ElementRef| {
        el.value()
            .attr("class")
            .is_some_and(|c| CAPTCHA_ELEMENT_ID_CLASS.is_match(c))
            || el.value().attr("id").is_some_and(|id| CAPTCHA_ELEMENT_ID_CLASS.is_match(id))
    };

    if document.select(&div_sel).any(div_or_form_marked) {
        return true;
    }
    if document
        .select(&form_sel)
        .any(|el| el.value().attr("action").is_some_and(|a| CAPTCHA_FORM_ACTION.is_match(a)))
    {
        return true;
    }

    // Cloudflare challenge container.
    if document.select(&div_sel).any(|el| el.value().attr("id") == Some("cf-wrapper")) {
        return true;
    }

    false
}

/// Classifies a response, per spec §4.2. Precedence for `block_type`: first
/// HTTP block wins, otherwise CAPTCHA, otherwise IP-ban. Multiple positive
/// flags may coexist.
pub fn detect(body: &str, status: u16, _url: &str) -> DetectionResult {
    let http_block = http_block_type(status);
    let captcha = CAPTCHA_REGEX.is_match(body) || has_captcha_dom_markers(body);
    let ip_ban = status == 429 || IP_BAN_REGEX.is_match(body);

    let block_type = http_block.or(if captcha {
        Some(BlockType::Captcha)
    } else if ip_ban {
        Some(BlockType::IpBan)
    } else {
        None
    });

    DetectionResult {
        blocked: http_block.is_some() || captcha || ip_ban,
        block_type,
        http_block: http_block.is_some(),
        captcha,
        ip_ban,
        status,
    }
}
