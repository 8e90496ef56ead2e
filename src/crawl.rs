//! Crawl manager, per spec §4.5. Per-source orchestration: fetch → detect →
//! parse → store → accumulate stats, sharing one fetcher/parser registry
//! and a `CrawlEventLogger` across the run, with the single-source,
//! `to_visit`/`visited`, `max_hits`-bounded loop spec §4.5 names.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use url::Url;

use crate::blocking;
use crate::error::CoreError;
use crate::fetch::PoliteFetcher;
use crate::logging::CrawlEventLogger;
use crate::model::{ContentType, CrawlStats, Document, DocumentMetadata, Source, SourceStatus};
use crate::parsers::{ParserRegistry, ParserResult};
use crate::store::Store;
use crate::text;

const KEYWORD_TOP_N: usize = 10;

pub struct CrawlManager {
    store: Arc<Store>,
    fetcher: Arc<PoliteFetcher>,
    parsers: ParserRegistry,
}

impl CrawlManager {
    pub fn new(store: Arc<Store>, fetcher: Arc<PoliteFetcher>) -> Self {
        let parsers = ParserRegistry::new(fetcher.clone());
        Self { store, fetcher, parsers }
    }

    /// `crawl_source(source_id) -> CrawlStats`, per spec §4.5.
    pub async fn crawl_source(&self, source_id: &str) -> Result<CrawlStats, CoreError> {
        let mut source = self.store.get_source(source_id)?;
        let mut stats = CrawlStats::started(source_id.to_string());
        let logger = CrawlEventLogger::new(source_id.to_string());
        let run_start = Instant::now();

        source.transition(SourceStatus::Running)?;
        source.last_crawl = Some(chrono::Utc::now());
        self.store.update_source(source.clone())?;

        let delay = source.config.intra_run_delay();
        let is_social = matches!(
            source.content_type,
            ContentType::Twitter | ContentType::Reddit | ContentType::Youtube | ContentType::Linkedin
        );

        let run_outcome = if is_social {
            self.run_social(&source, &logger, &mut stats).await
        } else {
            self.run_traditional(&source, &logger, delay, &mut stats).await
        };

        stats.duration_seconds = run_start.elapsed().as_secs_f64();
        stats.completed_at = Some(chrono::Utc::now());
        self.finish_run(&mut source, &mut stats, run_outcome, &logger)?;
        self.store.save_crawl_stats(stats.clone())?;

        Ok(stats)
    }

    fn finish_run(
        &self,
        source: &mut Source,
        stats: &mut CrawlStats,
        outcome: Result<RunOutcome, RunAbort>,
        logger: &CrawlEventLogger,
    ) -> Result<(), CoreError> {
        match outcome {
            Ok(run) => {
                let stored_delta = self.store_results(source, &run.results, stats)?;
                source.total_documents += stored_delta;
                source.last_error = None;
                // A run already transitioned to `blocked` must stay there.
                if source.status != SourceStatus::Blocked {
                    source.transition(SourceStatus::Completed)?;
                }
            }
            Err(RunAbort::Blocked { reason, results }) => {
                let stored_delta = self.store_results(source, &results, stats)?;
                source.total_documents += stored_delta;
                source.transition(SourceStatus::Blocked)?;
                source.last_error = Some(reason.clone());
                stats.errors.push(reason);
            }
            Err(RunAbort::Fatal { reason }) => {
                source.transition(SourceStatus::Failed)?;
                source.last_error = Some(reason.clone());
                stats.errors.push(reason);
            }
        }
        logger.log_run_completed(stats.pages_crawled, stats.pages_failed, (stats.duration_seconds * 1000.0) as u64);
        self.store.update_source(source.clone())
    }

    fn store_results(
        &self,
        source: &Source,
        results: &[ParserResult],
        stats: &mut CrawlStats,
    ) -> Result<u64, CoreError> {
        let mut stored = 0u64;
        for result in results.iter().take(source.config.max_hits as usize) {
            let corpus: Vec<String> = results.iter().map(|r| r.cleaned_text.clone()).collect();
            let keywords = text::extract_keywords(&result.cleaned_text, KEYWORD_TOP_N, &corpus);

            let metadata = DocumentMetadata {
                title: result.title.clone(),
                author: result.author.clone(),
                publish_date: result.publish_date,
                language: result.language.clone(),
                word_count: result.word_count,
                keywords,
                custom: result.custom.clone(),
            };

            let document = Document::new(
                result.url.clone(),
                source.id.clone(),
                result.content_type,
                result.raw_content.clone(),
                result.cleaned_text.clone(),
                metadata,
                source.config.clone(),
            );

            match self.store.insert_document(document) {
                Ok(Some(_)) => stored += 1,
                Ok(None) => {}
                Err(e) => {
                    stats.pages_failed += 1;
                    stats.errors.push(e.to_string());
                }
            }
        }
        Ok(stored)
    }

    async fn run_social(
        &self,
        source: &Source,
        logger: &CrawlEventLogger,
        stats: &mut CrawlStats,
    ) -> Result<RunOutcome, RunAbort> {
        let url = Url::parse(&source.url).map_err(|e| RunAbort::Fatal { reason: e.to_string() })?;

        logger.log_fetch_attempt(&source.url, 1);
        let response = self.fetch(&url, source, logger).await?;

        stats.bytes_downloaded += response.bytes_len as u64;
        let detection = blocking::detect(&response.body, response.status, &source.url);
        if detection.blocked {
            return Err(self.handle_block(&source.url, &detection, logger, Vec::new()));
        }

        let parser = self.parsers.parser_for(source.content_type);
        match parser.parse(response.body.as_bytes(), &source.url).await {
            Ok(results) => {
                stats.pages_crawled += results.len() as u32;
                Ok(RunOutcome { results })
            }
            Err(e) => {
                logger.log_parse_error(&source.url, &e.to_string());
                stats.pages_failed += 1;
                stats.errors.push(e.to_string());
                Ok(RunOutcome { results: Vec::new() })
            }
        }
    }

    async fn run_traditional(
        &self,
        source: &Source,
        logger: &CrawlEventLogger,
        delay: std::time::Duration,
        stats: &mut CrawlStats,
    ) -> Result<RunOutcome, RunAbort> {
        let mut to_visit: VecDeque<String> = VecDeque::from([source.url.clone()]);
        let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut results: Vec<ParserResult> = Vec::new();

        while let Some(current_url) = to_visit.pop_front() {
            if results.len() >= source.config.max_hits as usize {
                break;
            }
            if visited.contains(&current_url) {
                continue;
            }

            let parsed_url = match Url::parse(&current_url) {
                Ok(u) => u,
                Err(_) => {
                    stats.pages_failed += 1;
                    continue;
                }
            };

            logger.log_fetch_attempt(&current_url, 1);
            let response = match self.fetch(&parsed_url, source, logger).await {
                Ok(response) => response,
                Err(RunAbort::Blocked { .. }) => unreachable!("fetch never returns Blocked"),
                Err(RunAbort::Fatal { reason }) => {
                    if reason == ROBOTS_DISALLOWED_MARKER {
                        continue;
                    }
                    stats.pages_failed += 1;
                    visited.insert(current_url.clone());
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            stats.bytes_downloaded += response.bytes_len as u64;
            let detection = blocking::detect(&response.body, response.status, &current_url);
            if detection.blocked {
                return Err(self.handle_block(&current_url, &detection, logger, results));
            }

            let parser = self.parsers.parser_for(source.content_type);
            match parser.parse(response.body.as_bytes(), &current_url).await {
                Ok(parsed) => {
                    if source.config.follow_links {
                        for result in &parsed {
                            if let Some(next) = &result.next_page {
                                if !visited.contains(next) {
                                    to_visit.push_back(next.clone());
                                }
                            }
                        }
                    }
                    stats.pages_crawled += parsed.len() as u32;
                    results.extend(parsed);
                }
                Err(e) => {
                    logger.log_parse_error(&current_url, &e.to_string());
                    stats.pages_failed += 1;
                    stats.errors.push(e.to_string());
                }
            }

            visited.insert(current_url);
            tokio::time::sleep(delay).await;
        }

        Ok(RunOutcome { results })
    }

    /// Fetches through the polite fetcher, translating `RobotsDisallowed`
    /// into a recognisable marker (skipped, not counted as failure, per spec
    /// §7) rather than aborting the run.
    async fn fetch(
        &self,
        url: &Url,
        source: &Source,
        logger: &CrawlEventLogger,
    ) -> Result<crate::fetch::FetchResponse, RunAbort> {
        match self.fetcher.fetch(url, &source.config.retry_policy).await {
            Ok(response) => {
                logger.log_fetch_success(url.as_str(), response.status, response.bytes_len);
                Ok(response)
            }
            Err(CoreError::RobotsDisallowed { url: disallowed_url }) => {
                logger.log_robots_disallowed(&disallowed_url);
                Err(RunAbort::Fatal { reason: ROBOTS_DISALLOWED_MARKER.to_string() })
            }
            Err(e) => {
                logger.log_fetch_failure(url.as_str(), &e.to_string(), false);
                Err(RunAbort::Fatal { reason: e.to_string() })
            }
        }
    }

    fn handle_block(
        &self,
        url: &str,
        detection: &blocking::DetectionResult,
        logger: &CrawlEventLogger,
        results: Vec<ParserResult>,
    ) -> RunAbort {
        let block_type = detection.block_type.map(|bt| format!("{bt:?}")).unwrap_or_default();
        logger.log_blocked(url, &block_type, &block_type);
        RunAbort::Blocked { reason: block_type, results }
    }
}

const ROBOTS_DISALLOWED_MARKER: &str = "__robots_disallowed__";

struct RunOutcome {
    results: Vec<ParserResult>,
}

enum RunAbort {
    /// Carries whatever pages were already fetched and parsed before the
    /// block was detected, so `finish_run` can still store them.
    Blocked { reason: String, results: Vec<ParserResult> },
    Fatal { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, SourceType};

    #[tokio::test]
    async fn crawl_missing_source_is_not_found() {
        let store = Arc::new(Store::new());
        let fetcher = Arc::new(PoliteFetcher::new("test-agent"));
        let manager = CrawlManager::new(store, fetcher);

        let result = manager.crawl_source("does-not-exist").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn crawl_transitions_source_through_running() {
        let store = Arc::new(Store::new());
        let fetcher = Arc::new(PoliteFetcher::new("test-agent"));
        let manager = CrawlManager::new(store.clone(), fetcher);

        let mut source =
            Source::new("Unreachable", "https://unreachable.invalid/", SourceType::Website, ContentType::Html)
                .unwrap();
        source.config.retry_policy.max_retries = 0;
        source.config.retry_policy.timeout_secs = 1;
        let id = source.id.clone();
        store.insert_source(source).unwrap();

        let stats = manager.crawl_source(&id).await.unwrap();
        assert_eq!(stats.source_id, id);
        // An unreachable host can only fail, never succeed, but the source
        // must have left `running` either way.
        let persisted = store.get_source(&id).unwrap();
        assert_ne!(persisted.status, SourceStatus::Running);
    }
}
