//! Scheduler integration tests, per spec §4.6/§8.

use std::sync::Arc;

use crawlcore::model::{ContentType, SourceStatus, SourceType};
use crawlcore::{CrawlManager, PoliteFetcher, Scheduler, Store};

fn wiring() -> (Arc<Scheduler>, Arc<Store>) {
    let store = Arc::new(Store::new());
    let fetcher = Arc::new(PoliteFetcher::new("crawlcore-tests/0.1"));
    let crawl_manager = Arc::new(CrawlManager::new(store.clone(), fetcher));
    (Arc::new(Scheduler::new(store.clone(), crawl_manager)), store)
}

#[test]
fn load_all_sources_schedules_every_enabled_source_regardless_of_status() {
    let (scheduler, store) = wiring();

    let enabled = crawlcore::model::Source::new("Enabled", "https://x.test/a", SourceType::Website, ContentType::Html).unwrap();
    let mut disabled =
        crawlcore::model::Source::new("Disabled", "https://x.test/b", SourceType::Website, ContentType::Html).unwrap();
    disabled.config.enabled = false;
    let mut completed =
        crawlcore::model::Source::new("Completed", "https://x.test/c", SourceType::Website, ContentType::Html)
            .unwrap();
    completed.status = SourceStatus::Completed;

    store.insert_source(enabled).unwrap();
    store.insert_source(disabled).unwrap();
    store.insert_source(completed).unwrap();

    let scheduled = scheduler.load_all_sources().unwrap();
    assert_eq!(scheduled, 2);
    assert_eq!(scheduler.list_jobs().len(), 2);
}

#[test]
fn pause_then_resume_reschedules_the_job() {
    let (scheduler, store) = wiring();
    let source = crawlcore::model::Source::new("S1", "https://x.test/a", SourceType::Website, ContentType::Html).unwrap();
    let id = source.id.clone();
    store.insert_source(source).unwrap();

    scheduler.add_source_job(&id).unwrap();
    assert_eq!(scheduler.list_jobs().len(), 1);

    scheduler.pause_source_job(&id).unwrap();
    assert_eq!(store.get_source(&id).unwrap().status, SourceStatus::Paused);
    assert!(scheduler.list_jobs().is_empty());

    scheduler.resume_source_job(&id).unwrap();
    assert_eq!(store.get_source(&id).unwrap().status, SourceStatus::Idle);
    assert_eq!(scheduler.list_jobs().len(), 1);
}

#[test]
fn remove_source_job_is_idempotent_on_missing_job() {
    let (scheduler, _store) = wiring();
    scheduler.remove_source_job("does-not-exist");
    scheduler.remove_source_job("does-not-exist");
}

#[test]
fn manual_trigger_on_unknown_source_is_not_found() {
    let (scheduler, _store) = wiring();
    assert!(scheduler.trigger_source_crawl("does-not-exist").is_err());
}

#[test]
fn manual_trigger_queues_a_one_shot_job() {
    let (scheduler, store) = wiring();
    let source = crawlcore::model::Source::new("S1", "https://x.test/a", SourceType::Website, ContentType::Html).unwrap();
    let id = source.id.clone();
    store.insert_source(source).unwrap();

    assert!(scheduler.trigger_source_crawl(&id).unwrap());
    assert_eq!(scheduler.list_jobs().len(), 1);
}
