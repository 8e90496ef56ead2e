//! Scheduler, per spec §4.6. Owns a single in-process clock-based job
//! runtime keyed by `crawl_{source_id}`, with an `active_crawls` overlap
//! guard and a `misfire_grace_time` window, driven by a `tokio` background
//! task.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use crate::crawl::CrawlManager;
use crate::error::CoreError;
use crate::model::SourceStatus;
use crate::store::Store;

/// Misfire grace window, per spec §4.6's "allowing a one-hour misfire grace
/// window".
const MISFIRE_GRACE: Duration = Duration::from_secs(3600);
const TICK_INTERVAL: Duration = Duration::from_secs(1);

fn job_id_for(source_id: &str) -> String {
    format!("crawl_{source_id}")
}

fn manual_job_id_for(source_id: &str, now: DateTime<Utc>) -> String {
    format!("manual_crawl_{source_id}_{}", now.timestamp())
}

/// Parses a spec §3 five-field cron expression into a `cron::Schedule` by
/// prepending a zero-seconds field, since the `cron` crate's grammar is
/// six-field (seconds-first).
fn parse_cron(expression: &str) -> Result<Schedule, CoreError> {
    if expression.split_whitespace().count() != 5 {
        return Err(CoreError::invalid_config(format!(
            "cron expression must have 5 fields: minute hour day month weekday, got '{expression}'"
        )));
    }
    let six_field = format!("0 {expression}");
    Schedule::from_str(&six_field).map_err(|e| CoreError::invalid_config(format!("invalid cron expression: {e}")))
}

#[derive(Clone)]
struct Job {
    source_id: String,
    schedule: Schedule,
    next_fire: DateTime<Utc>,
    manual: bool,
}

/// Returned by `get_job_info`/`list_jobs`, per spec §6.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub next_run_time: DateTime<Utc>,
    pub trigger: String,
}

/// RAII guard clearing a source's `active_crawls` mark on drop, per spec
/// §4.6's "mark is cleared in a guaranteed-release block".
struct ActiveCrawlGuard {
    active_crawls: Arc<Mutex<HashSet<String>>>,
    source_id: String,
}

impl Drop for ActiveCrawlGuard {
    fn drop(&mut self) {
        self.active_crawls.lock().unwrap().remove(&self.source_id);
    }
}

pub struct Scheduler {
    store: Arc<Store>,
    crawl_manager: Arc<CrawlManager>,
    jobs: Mutex<HashMap<String, Job>>,
    active_crawls: Arc<Mutex<HashSet<String>>>,
    driver: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, crawl_manager: Arc<CrawlManager>) -> Self {
        Self {
            store,
            crawl_manager,
            jobs: Mutex::new(HashMap::new()),
            active_crawls: Arc::new(Mutex::new(HashSet::new())),
            driver: Mutex::new(None),
        }
    }

    /// Reads the Source; no-ops if disabled; otherwise parses its cron
    /// expression and replaces any existing job, per spec §4.6.
    pub fn add_source_job(&self, source_id: &str) -> Result<(), CoreError> {
        let source = self.store.get_source(source_id)?;
        if !source.config.enabled {
            return Ok(());
        }
        let schedule = parse_cron(&source.config.frequency)?;
        let next_fire = schedule
            .upcoming(Utc)
            .next()
            .ok_or_else(|| CoreError::invalid_config("cron expression has no upcoming fire time"))?;

        self.jobs.lock().unwrap().insert(
            job_id_for(source_id),
            Job { source_id: source_id.to_string(), schedule, next_fire, manual: false },
        );
        Ok(())
    }

    /// Idempotent on a missing job, per spec §4.6.
    pub fn remove_source_job(&self, source_id: &str) {
        self.jobs.lock().unwrap().remove(&job_id_for(source_id));
    }

    /// Removes the job and writes `status=paused`, per spec §4.6.
    pub fn pause_source_job(&self, source_id: &str) -> Result<(), CoreError> {
        self.remove_source_job(source_id);
        let mut source = self.store.get_source(source_id)?;
        if source.status.can_transition_to(SourceStatus::Paused) {
            source.transition(SourceStatus::Paused)?;
            self.store.update_source(source)?;
        }
        Ok(())
    }

    /// Re-registers the job and writes `status=idle`, per spec §4.6.
    pub fn resume_source_job(&self, source_id: &str) -> Result<(), CoreError> {
        let mut source = self.store.get_source(source_id)?;
        if source.status.can_transition_to(SourceStatus::Idle) {
            source.transition(SourceStatus::Idle)?;
            self.store.update_source(source)?;
        }
        self.add_source_job(source_id)
    }

    /// Enqueues a one-shot immediate job unless the source is already
    /// active, per spec §4.6. Returns whether the trigger was accepted.
    pub fn trigger_source_crawl(&self, source_id: &str) -> Result<bool, CoreError> {
        if self.active_crawls.lock().unwrap().contains(source_id) {
            return Ok(false);
        }
        let _ = self.store.get_source(source_id)?;
        let now = Utc::now();
        let manual_schedule =
            Schedule::from_str("0 * * * * *").expect("'every minute' schedule always parses");
        self.jobs.lock().unwrap().insert(
            manual_job_id_for(source_id, now),
            Job { source_id: source_id.to_string(), schedule: manual_schedule, next_fire: now, manual: true },
        );
        Ok(true)
    }

    /// Schedules every enabled source, per spec §4.6. Returns the count
    /// scheduled.
    /// Schedules every enabled source regardless of its current status, per
    /// spec §4.6 — a source that has already run (`Completed`/`Failed`/
    /// `Blocked`) is just as eligible as one still `Idle`.
    pub fn load_all_sources(&self) -> Result<usize, CoreError> {
        let mut scheduled = 0;
        for source in self.store.list_sources() {
            if source.config.enabled {
                self.add_source_job(&source.id)?;
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }

    pub fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(id, job)| JobInfo {
                id: id.clone(),
                name: format!("crawl {}", job.source_id),
                next_run_time: job.next_fire,
                trigger: job.schedule.to_string(),
            })
            .collect()
    }

    pub fn get_job_info(&self, job_id: &str) -> Option<JobInfo> {
        self.jobs.lock().unwrap().get(job_id).map(|job| JobInfo {
            id: job_id.to_string(),
            name: format!("crawl {}", job.source_id),
            next_run_time: job.next_fire,
            trigger: job.schedule.to_string(),
        })
    }

    /// Starts the background clock driver on the current Tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                ticker.tick().await;
                scheduler.tick().await;
            }
        });
        *self.driver.lock().unwrap() = Some(handle);
    }

    /// Stops the background driver. `wait` has no effect beyond issuing the
    /// abort, since individual crawl runs are not cooperatively
    /// cancellable, per spec §5.
    pub fn shutdown(&self, _wait: bool) {
        if let Some(handle) = self.driver.lock().unwrap().take() {
            handle.abort();
        }
    }

    async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        let due: Vec<(String, Job)> = {
            let jobs = self.jobs.lock().unwrap();
            jobs.iter().filter(|(_, job)| job.next_fire <= now).map(|(id, job)| (id.clone(), job.clone())).collect()
        };

        for (job_id, job) in due {
            let is_stale = (now - job.next_fire).to_std().unwrap_or(Duration::ZERO) > MISFIRE_GRACE;

            if job.manual {
                self.jobs.lock().unwrap().remove(&job_id);
            } else if let Some(next) = job.schedule.after(&job.next_fire).next() {
                if let Some(entry) = self.jobs.lock().unwrap().get_mut(&job_id) {
                    entry.next_fire = next;
                }
            } else {
                self.jobs.lock().unwrap().remove(&job_id);
            }

            if is_stale {
                continue;
            }

            self.spawn_run(job.source_id);
        }
    }

    /// Runs a source's crawl unless it is already active, honouring the
    /// overlap-prevention guarantee of spec §4.6/§8.
    fn spawn_run(self: &Arc<Self>, source_id: String) {
        let mut active = self.active_crawls.lock().unwrap();
        if active.contains(&source_id) {
            return;
        }
        active.insert(source_id.clone());
        drop(active);

        let scheduler = self.clone();
        tokio::spawn(async move {
            let _guard = ActiveCrawlGuard { active_crawls: scheduler.active_crawls.clone(), source_id: source_id.clone() };
            if let Err(e) = scheduler.crawl_manager.crawl_source(&source_id).await {
                tracing::warn!(source_id, error = %e, "scheduled crawl run failed");
            }
        });
    }
}
