use std::collections::HashSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use log::{debug, info};
use regex::Regex;

use super::client::Fetch;
use crate::error::{ProwLensError, Result};

const PID_PREFIX: &str = "PID is ";
const SUMMARY_MARKER: &str = "summary:";
const SUMMARY_SEPARATOR: &str = "\n---\n\n";

fn job_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Starting testcase analysis for: (.+)").expect("invalid job start regex")
    })
}

fn job_failed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\] (\d+) finished with ret=1\b").expect("invalid job failure regex"))
}

/// One sub-job process seen in an aggregator log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailureRecord {
    pub job_name: String,
    pub pid: String,
    pub failed: bool,
}

/// Correlates job-start markers, PID lines and failure lines.
///
/// A PID line belongs to the most recent job-start marker above it. PIDs
/// without a failure line are treated as succeeded.
pub fn parse_job_records(aggregator_log: &str) -> Vec<JobFailureRecord> {
    let mut current_job: Option<&str> = None;
    let mut pid_jobs: IndexMap<&str, &str> = IndexMap::new();
    let mut failed_pids: HashSet<&str> = HashSet::new();

    for line in aggregator_log.lines() {
        if let Some(caps) = job_start_regex().captures(line) {
            current_job = caps
                .get(1)
                .map(|m| m.as_str().trim())
                .filter(|job| !job.is_empty());
        }
        if let (Some(pid), Some(job)) = (line.strip_prefix(PID_PREFIX), current_job) {
            pid_jobs.insert(pid.trim(), job);
        }
        if let Some(pid) = job_failed_regex().captures(line).and_then(|caps| caps.get(1)) {
            failed_pids.insert(pid.as_str());
        }
    }

    pid_jobs
        .into_iter()
        .map(|(pid, job)| JobFailureRecord {
            job_name: job.to_string(),
            pid: pid.to_string(),
            failed: failed_pids.contains(pid),
        })
        .collect()
}

/// Folds records into a job → failed map; a job fails if any of its PIDs did.
pub fn job_failure_map(records: &[JobFailureRecord]) -> IndexMap<String, bool> {
    records.iter().fold(IndexMap::new(), |mut jobs, record| {
        *jobs.entry(record.job_name.clone()).or_insert(false) |= record.failed;
        jobs
    })
}

/// Tail of a sub-job log starting at its `summary:` line.
pub fn summary_tail<'a>(job_name: &str, job_log: &'a str) -> Result<&'a str> {
    job_log
        .find(SUMMARY_MARKER)
        .map(|idx| &job_log[idx..])
        .ok_or_else(|| ProwLensError::NoSummaryFound(job_name.to_string()))
}

/// Result of analyzing an aggregator log.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Every sub-job seen, with its failure status
    pub jobs: IndexMap<String, bool>,
    /// Summary tails of the failed sub-jobs, separated by `---`
    pub summaries: String,
}

impl AggregateReport {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &str> {
        self.jobs
            .iter()
            .filter(|(_, failed)| **failed)
            .map(|(job, _)| job.as_str())
    }
}

/// Finds failed sub-jobs and fetches `<base>/<job>/<job>.log` for each.
///
/// Fails when no sub-job failed, since this path is only taken for jobs
/// already known to have failed.
pub async fn resolve_aggregate_failures<F: Fetch>(
    fetcher: &F,
    base_url: &str,
    aggregator_log: &str,
) -> Result<AggregateReport> {
    let records = parse_job_records(aggregator_log);
    let jobs = job_failure_map(&records);
    debug!("Aggregator log lists {} sub-jobs over {} PIDs", jobs.len(), records.len());

    if !jobs.values().any(|failed| *failed) {
        return Err(ProwLensError::NoFailedJobsFound);
    }

    let base_url = base_url.trim_end_matches('/');
    let mut summaries = String::new();
    for (job, _) in jobs.iter().filter(|(_, failed)| **failed) {
        let url = format!("{base_url}/{job}/{job}.log");
        info!("Fetching failed sub-job log: {url}");
        let job_log = fetcher.get_text(&url).await?;
        summaries.push_str(summary_tail(job, &job_log)?);
        summaries.push_str(SUMMARY_SEPARATOR);
    }

    Ok(AggregateReport { jobs, summaries })
}
