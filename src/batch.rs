//! Batch remuxing
//!
//! A batch file lists one `input output` pair per line. Each pair becomes
//! its own media session; sessions run on the blocking thread pool, at most
//! `max_parallel` at a time, and share nothing. An optional daily time
//! window stops dispatching new jobs once the clock leaves it.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::RemuxConfig;
use crate::container::ContainerLibrary;
use crate::convert::convert_with;
use crate::error::{RemuxError, Result};
use crate::session::RemuxSummary;

const SECONDS_PER_DAY: u32 = 86_400;

/// Daily window during which batch jobs may start, `HH:MM:SS-HH:MM:SS`.
///
/// A window whose start is later than its end wraps past midnight. Both
/// bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    /// Seconds from midnight
    pub start: u32,
    /// Seconds from midnight
    pub end: u32,
}

impl TimeRange {
    /// Whether `now` (seconds from midnight) falls inside the window
    pub fn is_in_time_range(&self, now: u32) -> bool {
        let mut now = now;
        let mut end = self.end;
        if self.start > self.end {
            if end > now {
                now += SECONDS_PER_DAY;
            }
            end += SECONDS_PER_DAY;
        }
        self.start < now && end > now
    }

    /// Check the window against the local wall clock
    pub fn contains_now(&self) -> bool {
        self.is_in_time_range(chrono::Local::now().time().num_seconds_from_midnight())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("time range '{}' is not HH:MM:SS-HH:MM:SS", s))?;
        let parse = |part: &str| {
            NaiveTime::parse_from_str(part.trim(), "%H:%M:%S")
                .map(|t| t.num_seconds_from_midnight())
                .map_err(|e| format!("time range '{}': bad time '{}': {}", s, part, e))
        };
        let range = TimeRange {
            start: parse(start)?,
            end: parse(end)?,
        };
        if range.start == range.end {
            return Err(format!("time range '{}' is empty", s));
        }
        Ok(range)
    }
}

impl TryFrom<String> for TimeRange {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hms = |t: u32| format!("{:02}:{:02}:{:02}", t / 3600, t / 60 % 60, t % 60);
        write!(f, "{}-{}", hms(self.start), hms(self.end))
    }
}

/// One line of a batch file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchJob {
    /// 1-based line number in the batch file
    pub line: usize,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of one job
#[derive(Debug, Serialize)]
pub struct JobOutcome {
    #[serde(flatten)]
    pub job: BatchJob,
    pub status: i32,
    pub summary: Option<RemuxSummary>,
    pub error: Option<String>,
}

impl JobOutcome {
    fn new(job: BatchJob, result: Result<RemuxSummary>) -> Self {
        match result {
            Ok(summary) => Self {
                job,
                status: 0,
                summary: Some(summary),
                error: None,
            },
            Err(e) => Self {
                job,
                status: e.exit_code(),
                summary: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// Results of a batch run, in batch file order
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub jobs: Vec<JobOutcome>,
    /// Jobs never started because the time window had closed
    pub skipped: Vec<BatchJob>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.jobs.iter().filter(|j| !j.succeeded()).count()
    }

    /// `Ok` when every job succeeded
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed();
        if failed == 0 {
            Ok(self)
        } else {
            Err(RemuxError::Batch {
                failed,
                total: self.jobs.len(),
            })
        }
    }
}

/// Parse batch file content.
///
/// Fields are separated by a tab when the line contains one (so paths may
/// contain spaces), otherwise by whitespace. Blank lines and `#` comments
/// are skipped. A line without exactly two fields is logged and skipped.
pub fn parse_batch(content: &str) -> Vec<BatchJob> {
    let mut jobs = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = if line.contains('\t') {
            line.split('\t')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .collect()
        } else {
            line.split_whitespace().collect()
        };

        match fields.as_slice() {
            [input, output] => jobs.push(BatchJob {
                line: i + 1,
                input: PathBuf::from(input),
                output: PathBuf::from(output),
            }),
            _ => tracing::warn!(
                "Batch line {}: expected 'input output', got '{}', skipping",
                i + 1,
                line
            ),
        }
    }
    jobs
}

/// Read and parse a batch file
pub fn load_batch_file<P: AsRef<Path>>(path: P) -> Result<Vec<BatchJob>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(parse_batch(&content))
}

/// Run every job, `config.batch.max_parallel` at a time.
///
/// With a time window configured, each job is checked against the clock
/// when it is about to start. Once outside the window, no further jobs are
/// started; running ones complete and the rest are reported as skipped.
pub async fn run_batch<L>(
    library: Arc<L>,
    jobs: Vec<BatchJob>,
    config: Arc<RemuxConfig>,
) -> BatchReport
where
    L: ContainerLibrary + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.batch.max_parallel.max(1)));
    tracing::info!(
        "Running {} batch jobs, {} at a time",
        jobs.len(),
        config.batch.max_parallel.max(1)
    );

    let mut handles = Vec::with_capacity(jobs.len());
    let mut pending = jobs.into_iter();
    let mut skipped = Vec::new();
    while let Some(job) = pending.next() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push((job, None, Some(e.to_string())));
                continue;
            }
        };
        if let Some(window) = config.batch.window {
            if !window.contains_now() {
                skipped.push(job);
                skipped.extend(pending.by_ref());
                tracing::info!(
                    "Outside the batch time window {}, not starting {} remaining jobs",
                    window,
                    skipped.len()
                );
                break;
            }
        }
        let library = Arc::clone(&library);
        let config = Arc::clone(&config);
        let task_job = job.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            convert_with(library.as_ref(), &task_job.input, &task_job.output, &config)
        });
        handles.push((job, Some(handle), None));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (job, handle, acquire_error) in handles {
        let result = match (handle, acquire_error) {
            (Some(handle), _) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(RemuxError::Task(e.to_string())),
            },
            (None, error) => Err(RemuxError::Task(error.unwrap_or_default())),
        };
        if let Err(e) = &result {
            tracing::warn!("Batch line {} failed: {}", job.line, e);
        }
        outcomes.push(JobOutcome::new(job, result));
    }

    let report = BatchReport {
        jobs: outcomes,
        skipped,
    };
    tracing::info!(
        "Batch finished: {} succeeded, {} failed, {} skipped",
        report.jobs.len() - report.failed(),
        report.failed(),
        report.skipped.len()
    );
    report
}
