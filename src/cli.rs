use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::Config;
use crate::logs::{compact, CompactionLevel, Extraction};
use crate::output::{bright_yellow, dim, sub_job_table, Spinner};
use crate::prow::{correlate, HttpFetcher, JobAnalysis, JobAnalyzer, Report};

#[derive(Parser)]
#[command(name = "prowlens")]
#[command(author, version, about = "OpenShift CI failure log analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./prowlens.toml or the user config dir)
    #[arg(short, long, global = true, env = "PROWLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Write the result to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compact the failed step's log down to its informative lines
    Analyze {
        job_url: String,

        #[arg(short, long, value_enum)]
        level: Option<CompactionLevel>,
    },
    /// Extract the failing tests block of the failed step
    FailingTests { job_url: String },
    /// Extract the flaky tests block of the failed step
    FlakyTests { job_url: String },
    /// Extract the monitor test output of the failed step
    MonitorTests { job_url: String },
    /// Summarize the failed sub-jobs of an aggregated job
    Aggregate {
        job_url: String,

        /// Directory holding `<job>/<job>.log` sub-job logs
        #[arg(short, long)]
        base_url: Option<String>,
    },
    /// List error and warning events leading up to a test in the timeline traces
    Timeline {
        job_url: String,

        #[arg(short, long)]
        test: String,

        /// Keep listing events after the first one for the test
        #[arg(long, default_value_t = false)]
        all_matches: bool,
    },
    /// Print the gather-extra artifacts URL of a job
    GatherExtra { job_url: String },
    /// Compact a local log file, or stdin when no file is given
    Compact {
        file: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        level: Option<CompactionLevel>,
    },
    /// Correlate a local timeline trace with a test
    Events {
        file: PathBuf,

        #[arg(short, long)]
        test: String,

        #[arg(long, default_value_t = false)]
        all_matches: bool,
    },
}

async fn with_spinner<T, Fut>(message: &str, work: Fut) -> Result<T>
where
    Fut: Future<Output = crate::error::Result<T>>,
{
    let spinner = Spinner::start(message);
    match work.await {
        Ok(value) => {
            spinner.finish(message);
            Ok(value)
        }
        Err(e) => {
            spinner.fail(message);
            warn!("{:?} failure: {e}", e.kind());
            Err(e.into())
        }
    }
}

fn render_log(analysis: JobAnalysis<String>) -> String {
    match analysis {
        JobAnalysis::Step { location, result } => {
            info!("Analyzed step {}", location.step.step_name);
            result
        }
        JobAnalysis::RawBuildLog(text) => {
            eprintln!("{}", dim("No failed step found, showing the raw build log"));
            text
        }
    }
}

fn render_block(analysis: JobAnalysis<Extraction>) -> String {
    match analysis {
        JobAnalysis::Step { location, result } => {
            if !result.is_found() {
                eprintln!(
                    "{}",
                    bright_yellow(format!(
                        "Block not found in step {}, showing the deduplicated step log",
                        location.step.step_name
                    ))
                );
            }
            result.into_text()
        }
        JobAnalysis::RawBuildLog(text) => {
            eprintln!("{}", dim("No failed step found, showing the raw build log"));
            text
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read log file: {}", path.display())),
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read log from stdin")?;
            Ok(buffer)
        }
    }
}

impl Cli {
    fn emit(&self, text: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, text)
                .with_context(|| format!("Failed to write output: {}", output_path.display()))?;
            info!("Result written to: {}", output_path.display());
        } else {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }

    fn analyzer(&self, config: Config) -> Result<JobAnalyzer<HttpFetcher>> {
        let fetcher = HttpFetcher::new()?;
        Ok(JobAnalyzer::new(fetcher, config))
    }

    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Analyze { job_url, level } => {
                let level = level.unwrap_or(config.compaction.default_level);
                info!("Analyzing job failures for: {job_url}");
                let analyzer = self.analyzer(config)?;
                let analysis = with_spinner(
                    &format!("Compacting failed step log ({level})"),
                    analyzer.analyze_failures(job_url, level),
                )
                .await?;
                self.emit(&render_log(analysis))
            }
            Commands::FailingTests { job_url } => {
                let analyzer = self.analyzer(config)?;
                let analysis =
                    with_spinner("Extracting failing tests", analyzer.failing_tests(job_url)).await?;
                self.emit(&render_block(analysis))
            }
            Commands::FlakyTests { job_url } => {
                let analyzer = self.analyzer(config)?;
                let analysis =
                    with_spinner("Extracting flaky tests", analyzer.flaky_tests(job_url)).await?;
                self.emit(&render_block(analysis))
            }
            Commands::MonitorTests { job_url } => {
                let analyzer = self.analyzer(config)?;
                let analysis =
                    with_spinner("Extracting monitor tests", analyzer.monitor_failures(job_url))
                        .await?;
                self.emit(&render_block(analysis))
            }
            Commands::Aggregate { job_url, base_url } => {
                let analyzer = self.analyzer(config)?;
                let report = with_spinner(
                    "Resolving aggregated sub-job failures",
                    analyzer.aggregate_failures(job_url, base_url.as_deref()),
                )
                .await?;
                info!("{} failed sub-jobs", report.failed_jobs().count());
                eprintln!("{}", sub_job_table(&report.jobs));
                self.emit(&report.summaries)
            }
            Commands::Timeline {
                job_url,
                test,
                all_matches,
            } => {
                config.timeline.return_all_matches |= *all_matches;
                let analyzer = self.analyzer(config)?;
                let listing = with_spinner(
                    "Correlating timeline events",
                    analyzer.correlate_timeline(job_url, test),
                )
                .await?;
                self.emit(&listing)
            }
            Commands::GatherExtra { job_url } => {
                let analyzer = self.analyzer(config)?;
                let url = analyzer.gather_extra_url(job_url)?;
                self.emit(&url)
            }
            Commands::Compact { file, level } => {
                let level = level.unwrap_or(config.compaction.default_level);
                let input = read_input(file.as_deref())?;
                let compacted = compact(&input, level, &config.compaction);
                info!(
                    "Compacted {} lines down to {}",
                    input.lines().count(),
                    compacted.lines().count()
                );
                self.emit(&compacted)
            }
            Commands::Events {
                file,
                test,
                all_matches,
            } => {
                let contents = std::fs::read_to_string(file)
                    .with_context(|| format!("Failed to read trace: {}", file.display()))?;
                let report: Report = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse trace: {}", file.display()))?;
                let correlation = correlate(
                    &report,
                    test,
                    *all_matches || config.timeline.return_all_matches,
                );
                if report.items.is_empty() {
                    warn!("Trace {} has no events", file.display());
                }
                self.emit(&correlation.to_string())
            }
        }
    }
}
