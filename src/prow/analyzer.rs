use log::{info, warn};

use super::aggregate::{resolve_aggregate_failures, AggregateReport};
use super::client::Fetch;
use super::locator::{find_failed_step, ArtifactLocator, JobReference, StepDescriptor, TestDescriptor};
use super::timeline::{correlate, spyglass_file_names, Report};
use crate::config::{BlockMarkers, Config};
use crate::error::{ProwLensError, Result};
use crate::logs::{compact, extract_block, CompactionLevel, Extraction};

/// Where a failed step's artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLocation {
    pub job: JobReference,
    pub test: TestDescriptor,
    pub step: StepDescriptor,
}

/// Result of an analysis that needs a failed step.
///
/// When the build log reports no failed step the raw build log is handed
/// back untouched instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAnalysis<T> {
    Step { location: StepLocation, result: T },
    RawBuildLog(String),
}

enum Resolution {
    Located(StepLocation),
    NoFailedStep(String),
}

/// Drives the artifact lookups and log processing for one job URL.
///
/// Each call is a strictly sequential chain of fetches; nothing is shared
/// between calls.
pub struct JobAnalyzer<F: Fetch> {
    fetcher: F,
    locator: ArtifactLocator,
    config: Config,
}

impl<F: Fetch> JobAnalyzer<F> {
    pub fn new(fetcher: F, config: Config) -> Self {
        Self {
            locator: ArtifactLocator::new(&config.storage),
            fetcher,
            config,
        }
    }

    /// Artifact directory with cluster diagnostics gathered after the run.
    pub fn gather_extra_url(&self, job_url: &str) -> Result<String> {
        self.locator.gather_extra_url(job_url)
    }

    async fn resolve(&self, job_url: &str) -> Result<Resolution> {
        let job = JobReference::from_url(job_url)?;
        let build_log_url = self.locator.build_log_url(&job);
        info!("Fetching build log: {build_log_url}");
        let build_log = self.fetcher.get_text(&build_log_url).await?;

        let step_name = match find_failed_step(&build_log) {
            Ok(name) => name,
            Err(ProwLensError::NoStepFailureFound) => {
                warn!("No failed step in build log of {}/{}", job.job_name, job.job_id);
                return Ok(Resolution::NoFailedStep(build_log));
            }
            Err(e) => return Err(e),
        };

        let test = TestDescriptor::from_url(job_url)?;
        let step = StepDescriptor::new(&step_name, &test)?;
        info!("Failed step {} of test {}", step.step_name, test.test_name);

        Ok(Resolution::Located(StepLocation { job, test, step }))
    }

    /// Locates the failed step and fetches its build log.
    pub async fn fetch_step_log(&self, job_url: &str) -> Result<JobAnalysis<String>> {
        match self.resolve(job_url).await? {
            Resolution::NoFailedStep(build_log) => Ok(JobAnalysis::RawBuildLog(build_log)),
            Resolution::Located(location) => {
                let url = self
                    .locator
                    .step_log_url(&location.job, &location.test, &location.step);
                info!("Fetching step log: {url}");
                let text = self.fetcher.get_text(&url).await?;
                Ok(JobAnalysis::Step {
                    location,
                    result: text,
                })
            }
        }
    }

    async fn require_step_log(&self, job_url: &str) -> Result<(StepLocation, String)> {
        match self.fetch_step_log(job_url).await? {
            JobAnalysis::Step { location, result } => Ok((location, result)),
            JobAnalysis::RawBuildLog(_) => Err(ProwLensError::NoStepFailureFound),
        }
    }

    /// Compacts the failed step's log at `level`.
    pub async fn analyze_failures(
        &self,
        job_url: &str,
        level: CompactionLevel,
    ) -> Result<JobAnalysis<String>> {
        Ok(match self.fetch_step_log(job_url).await? {
            JobAnalysis::Step { location, result } => JobAnalysis::Step {
                result: compact(&result, level, &self.config.compaction),
                location,
            },
            raw => raw,
        })
    }

    async fn extract(&self, job_url: &str, markers: &BlockMarkers) -> Result<JobAnalysis<Extraction>> {
        Ok(match self.fetch_step_log(job_url).await? {
            JobAnalysis::Step { location, result } => JobAnalysis::Step {
                result: extract_block(&result, markers, &self.config.compaction),
                location,
            },
            JobAnalysis::RawBuildLog(text) => JobAnalysis::RawBuildLog(text),
        })
    }

    pub async fn failing_tests(&self, job_url: &str) -> Result<JobAnalysis<Extraction>> {
        self.extract(job_url, &self.config.markers.failing).await
    }

    pub async fn flaky_tests(&self, job_url: &str) -> Result<JobAnalysis<Extraction>> {
        self.extract(job_url, &self.config.markers.flaky).await
    }

    pub async fn monitor_failures(&self, job_url: &str) -> Result<JobAnalysis<Extraction>> {
        self.extract(job_url, &self.config.markers.monitor).await
    }

    /// Treats the failed step's log as an aggregator log and collects the
    /// summaries of its failed sub-jobs.
    ///
    /// Sub-job logs are looked up under `base_url`, or under the step's
    /// artifact directory when none is given.
    pub async fn aggregate_failures(
        &self,
        job_url: &str,
        base_url: Option<&str>,
    ) -> Result<AggregateReport> {
        let (location, aggregator_log) = self.require_step_log(job_url).await?;
        let base_url = match base_url {
            Some(url) => url.to_string(),
            None => self
                .locator
                .step_artifacts_url(&location.job, &location.test, &location.step),
        };
        resolve_aggregate_failures(&self.fetcher, &base_url, &aggregator_log).await
    }

    /// Correlates every spyglass trace of the failed step with `test_name`.
    pub async fn correlate_timeline(&self, job_url: &str, test_name: &str) -> Result<String> {
        let location = match self.resolve(job_url).await? {
            Resolution::Located(location) => location,
            Resolution::NoFailedStep(_) => return Err(ProwLensError::NoStepFailureFound),
        };

        let junit_dir = self
            .locator
            .junit_dir_url(&location.job, &location.test, &location.step);
        info!("Listing timeline traces in {junit_dir}");
        let listing = self.fetcher.get_text(&junit_dir).await?;
        let files = spyglass_file_names(&listing);
        if files.is_empty() {
            warn!("No spyglass traces found in {junit_dir}");
            return Ok("no spyglass data".to_string());
        }

        let mut output = String::new();
        for file in &files {
            let trace_url = format!("{junit_dir}{file}");
            info!("Fetching timeline trace: {trace_url}");
            let trace: Report = serde_json::from_str(&self.fetcher.get_text(&trace_url).await?)?;
            let correlation = correlate(&trace, test_name, self.config.timeline.return_all_matches);

            if files.len() > 1 {
                output.push_str(&format!("== {file} ==\n"));
            }
            output.push_str(correlation.to_string().trim_end());
            output.push('\n');
        }
        Ok(output)
    }
}
