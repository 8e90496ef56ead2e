//! Polite fetcher, per spec §4.1. Robots gating, per-origin pacing and
//! bounded retries with exponential backoff, per the retry/backoff
//! contract of §4.1.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use url::Url;

use crate::error::CoreError;
use crate::model::RetryPolicy;

const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Default, Clone)]
struct RobotsRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl RobotsRules {
    /// Longest matching prefix rule wins; ties favour `Allow`. No match is
    /// allowed.
    fn is_allowed(&self, path: &str) -> bool {
        let mut best_len = -1i64;
        let mut best_allowed = true;

        for rule in &self.disallow {
            if path.starts_with(rule.as_str()) {
                let len = rule.len() as i64;
                if len > best_len {
                    best_len = len;
                    best_allowed = false;
                }
            }
        }
        for rule in &self.allow {
            if path.starts_with(rule.as_str()) {
                let len = rule.len() as i64;
                if len >= best_len {
                    best_len = len;
                    best_allowed = true;
                }
            }
        }
        best_allowed
    }
}

fn parse_robots_txt(body: &str) -> RobotsRules {
    let mut rules = RobotsRules::default();
    let mut in_wildcard_section = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => in_wildcard_section = value == "*",
            "disallow" if in_wildcard_section && !value.is_empty() => {
                rules.disallow.push(value.to_string())
            }
            "allow" if in_wildcard_section && !value.is_empty() => {
                rules.allow.push(value.to_string())
            }
            "crawl-delay" if in_wildcard_section => {
                if let Ok(secs) = value.parse::<f64>() {
                    rules.crawl_delay = Some(Duration::from_secs_f64(secs));
                }
            }
            _ => {}
        }
    }

    rules
}

/// Bytes and status of a completed (possibly non-2xx) fetch, per spec §4.1's
/// "does not raise for ordinary 4xx/5xx" rule.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub bytes_len: usize,
}

/// Per-origin robots.txt cache and per-host pacing table, both process-wide
/// and guarded for concurrent access per spec §5/§9.
pub struct PoliteFetcher {
    client: reqwest::Client,
    user_agent: String,
    /// Floor pacing delay from `CoreConfig::crawler_delay`, per spec §6.
    /// Combined with any robots.txt `Crawl-delay` by taking the larger of
    /// the two, so neither configured politeness nor site-requested
    /// politeness can be dropped.
    crawler_delay: Duration,
    robots_cache: RwLock<HashMap<String, RobotsRules>>,
    last_request: RwLock<HashMap<String, Instant>>,
}

impl PoliteFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self::with_delay(user_agent, 1.0)
    }

    pub fn with_delay(user_agent: impl Into<String>, crawler_delay_secs: f64) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
            crawler_delay: Duration::from_secs_f64(crawler_delay_secs.max(0.0)),
            robots_cache: RwLock::new(HashMap::new()),
            last_request: RwLock::new(HashMap::new()),
        }
    }

    fn origin_of(url: &Url) -> String {
        match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), url.host_str().unwrap_or(""), port),
            None => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("")),
        }
    }

    async fn ensure_robots_cached(&self, url: &Url) -> RobotsRules {
        let origin = Self::origin_of(url);
        if let Some(rules) = self.robots_cache.read().unwrap().get(&origin) {
            return rules.clone();
        }

        let robots_url = format!("{origin}/robots.txt");
        // If the file cannot be retrieved, the origin is permissive and the
        // decision is cached, per spec §4.1.
        let rules = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => parse_robots_txt(&body),
                Err(_) => RobotsRules::default(),
            },
            _ => RobotsRules::default(),
        };

        self.robots_cache.write().unwrap().insert(origin, rules.clone());
        rules
    }

    /// Whether the configured user-agent is allowed to fetch `url`.
    pub async fn can_fetch(&self, url: &Url) -> bool {
        let rules = self.ensure_robots_cached(url).await;
        rules.is_allowed(url.path())
    }

    async fn wait_for_pacing(&self, host: &str, delay: Duration) {
        let wait_until = {
            let mut map = self.last_request.write().unwrap();
            let now = Instant::now();
            let next = match map.get(host) {
                Some(&last) => last + delay,
                None => now,
            };
            map.insert(host, next.max(now));
            next
        };
        if wait_until > Instant::now() {
            tokio::time::sleep(wait_until - Instant::now()).await;
        }
    }

    /// `fetch(url) -> bytes | failure`, per spec §4.1.
    ///
    /// Returns `Err(RobotsDisallowed)` if robots.txt forbids the URL.
    /// Retries connection errors and {429,500,502,503,504} responses up to
    /// `retry_policy.max_retries` times with exponential backoff. Other
    /// 4xx/5xx responses are returned as-is for the blocking detector to
    /// classify. Returns `Err(NetworkFailure)` on exhausted retries.
    pub async fn fetch(&self, url: &Url, retry_policy: &RetryPolicy) -> Result<FetchResponse, CoreError> {
        let rules = self.ensure_robots_cached(url).await;
        if !rules.is_allowed(url.path()) {
            return Err(CoreError::robots_disallowed(url.as_str()));
        }

        let host = url.host_str().unwrap_or("").to_string();
        let pacing_delay = rules.crawl_delay.unwrap_or(self.crawler_delay).max(self.crawler_delay);
        let timeout = Duration::from_secs(retry_policy.timeout_secs);

        let mut last_error = String::new();
        for attempt in 1..=retry_policy.max_retries + 1 {
            self.wait_for_pacing(&host, pacing_delay).await;

            let result = self
                .client
                .get(url.clone())
                .header("User-Agent", &self.user_agent)
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if RETRYABLE_STATUSES.contains(&status) && attempt <= retry_policy.max_retries {
                        last_error = format!("retryable status {status}");
                        tokio::time::sleep(retry_policy.backoff_delay(attempt)).await;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let bytes_len = body.len();
                    return Ok(FetchResponse { status, body, bytes_len });
                }
                Err(err) => {
                    last_error = err.to_string();
                    if attempt <= retry_policy.max_retries {
                        tokio::time::sleep(retry_policy.backoff_delay(attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(CoreError::network_failure(last_error, retry_policy.max_retries + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard_section_only() {
        let body = "User-agent: Googlebot\nDisallow: /private\n\nUser-agent: *\nDisallow: /admin\nAllow: /admin/public\n";
        let rules = parse_robots_txt(body);
        assert!(!rules.is_allowed("/admin/secret"));
        assert!(rules.is_allowed("/admin/public/page"));
        assert!(rules.is_allowed("/private"));
    }

    #[test]
    fn longest_prefix_wins() {
        let rules = RobotsRules {
            disallow: vec!["/a".to_string()],
            allow: vec!["/a/b".to_string()],
            crawl_delay: None,
        };
        assert!(rules.is_allowed("/a/b/c"));
        assert!(!rules.is_allowed("/a/x"));
    }

    #[test]
    fn empty_rules_allow_everything() {
        let rules = RobotsRules::default();
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn crawl_delay_parsed() {
        let rules = parse_robots_txt("User-agent: *\nCrawl-delay: 2\n");
        assert_eq!(rules.crawl_delay, Some(Duration::from_secs(2)));
    }

    #[test]
    fn configured_delay_is_a_floor_over_a_smaller_robots_delay() {
        let fetcher = PoliteFetcher::with_delay("crawlcore-tests/0.1", 3.0);
        let rules = RobotsRules { crawl_delay: Some(Duration::from_secs(1)), ..Default::default() };
        let pacing = rules.crawl_delay.unwrap_or(fetcher.crawler_delay).max(fetcher.crawler_delay);
        assert_eq!(pacing, Duration::from_secs(3));
    }

    #[test]
    fn robots_delay_wins_when_larger_than_configured_delay() {
        let fetcher = PoliteFetcher::with_delay("crawlcore-tests/0.1", 1.0);
        let rules = RobotsRules { crawl_delay: Some(Duration::from_secs(5)), ..Default::default() };
        let pacing = rules.crawl_delay.unwrap_or(fetcher.crawler_delay).max(fetcher.crawler_delay);
        assert_eq!(pacing, Duration::from_secs(5));
    }
}
