use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::config::StorageConfig;
use crate::error::{ProwLensError, Result};

fn test_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:ocp-)?e2e-[^/]+").expect("invalid test name regex"))
}

fn step_failure_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Step (.*?) failed after").expect("invalid step regex"))
}

/// Job name and build ID taken from the last two path segments of a job URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReference {
    pub job_name: String,
    pub job_id: String,
}

impl JobReference {
    pub fn from_url(job_url: &str) -> Result<Self> {
        let url = Url::parse(job_url)?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [.., job_name, job_id] => Ok(Self {
                job_name: (*job_name).to_string(),
                job_id: (*job_id).to_string(),
            }),
            _ => Err(ProwLensError::UnexpectedPathShape(job_url.to_string())),
        }
    }
}

/// The e2e test a job runs, e.g. `e2e-aws-ovn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDescriptor {
    pub test_name: String,
}

impl TestDescriptor {
    /// Takes the first `e2e-*` (optionally `ocp-` prefixed) match anywhere in the URL.
    pub fn from_url(job_url: &str) -> Result<Self> {
        test_name_regex()
            .find(job_url)
            .map(|m| Self {
                test_name: m.as_str().to_string(),
            })
            .ok_or_else(|| ProwLensError::NoTestNameFound(job_url.to_string()))
    }
}

/// The failed step of a test and the artifact folder its logs live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub step_name: String,
    pub step_folder: String,
}

impl StepDescriptor {
    /// Binds a step name to its test.
    ///
    /// The step must be named `<test>-<folder>`; anything else means the
    /// artifact layout does not match and is reported as a mismatch.
    pub fn new(step_name: &str, test: &TestDescriptor) -> Result<Self> {
        let prefix = format!("{}-", test.test_name);
        let step_folder = step_name.strip_prefix(prefix.as_str()).ok_or_else(|| {
            ProwLensError::StepTestMismatch {
                step: step_name.to_string(),
                test: test.test_name.clone(),
            }
        })?;

        Ok(Self {
            step_name: step_name.to_string(),
            step_folder: step_folder.to_string(),
        })
    }
}

/// Finds the name of the first step reported as failed in a build log.
pub fn find_failed_step(build_log: &str) -> Result<String> {
    step_failure_regex()
        .captures(build_log)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or(ProwLensError::NoStepFailureFound)
}

/// Derives artifact URLs from job identity and step layout.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    build_log_base: String,
    artifacts_base: String,
}

impl ArtifactLocator {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            build_log_base: storage.build_log_base.trim_end_matches('/').to_string(),
            artifacts_base: storage.artifacts_base.trim_end_matches('/').to_string(),
        }
    }

    /// Top-level build log of a job.
    pub fn build_log_url(&self, job: &JobReference) -> String {
        format!(
            "{}/{}/{}/build-log.txt",
            self.build_log_base, job.job_name, job.job_id
        )
    }

    fn test_artifacts_url(&self, job: &JobReference, test: &TestDescriptor) -> String {
        format!(
            "{}/{}/{}/artifacts/{}",
            self.artifacts_base, job.job_name, job.job_id, test.test_name
        )
    }

    /// Build log of a single step.
    pub fn step_log_url(
        &self,
        job: &JobReference,
        test: &TestDescriptor,
        step: &StepDescriptor,
    ) -> String {
        format!(
            "{}/{}/build-log.txt",
            self.test_artifacts_url(job, test),
            step.step_folder
        )
    }

    /// Directory holding the artifacts a step produced.
    pub fn step_artifacts_url(
        &self,
        job: &JobReference,
        test: &TestDescriptor,
        step: &StepDescriptor,
    ) -> String {
        format!(
            "{}/{}/artifacts",
            self.test_artifacts_url(job, test),
            step.step_folder
        )
    }

    /// JUnit directory of a step, where timeline traces are published.
    pub fn junit_dir_url(
        &self,
        job: &JobReference,
        test: &TestDescriptor,
        step: &StepDescriptor,
    ) -> String {
        format!("{}/junit/", self.step_artifacts_url(job, test, step))
    }

    /// Cluster diagnostics collected by the gather-extra step.
    pub fn gather_extra_url(&self, job_url: &str) -> Result<String> {
        let job = JobReference::from_url(job_url)?;
        let test = TestDescriptor::from_url(job_url)?;
        Ok(format!(
            "{}/gather-extra/artifacts/",
            self.test_artifacts_url(&job, &test)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const JOB_URL: &str = "https://prow.ci.openshift.org/view/gs/test-platform-results/logs/periodic-ci-openshift-release-master-nightly-4.19-e2e-aws-ovn/1932491850917548032";

    fn test_named(name: &str) -> TestDescriptor {
        TestDescriptor {
            test_name: name.to_string(),
        }
    }

    mod job_reference {
        use super::*;

        #[test]
        fn takes_last_two_segments() {
            let job = JobReference::from_url(JOB_URL).unwrap();
            assert_eq!(job.job_name, "periodic-ci-openshift-release-master-nightly-4.19-e2e-aws-ovn");
            assert_eq!(job.job_id, "1932491850917548032");
        }

        #[test]
        fn ignores_trailing_slash() {
            let job = JobReference::from_url("https://example.com/logs/my-job/42/").unwrap();
            assert_eq!(job.job_name, "my-job");
            assert_eq!(job.job_id, "42");
        }

        #[test]
        fn rejects_unparsable_url() {
            let err = JobReference::from_url("not a url").unwrap_err();
            assert!(matches!(err, ProwLensError::MalformedUrl(_)));
        }

        #[test]
        fn rejects_short_paths() {
            let err = JobReference::from_url("https://example.com/only-one").unwrap_err();
            assert!(matches!(err, ProwLensError::UnexpectedPathShape(_)));
            assert_eq!(err.kind(), ErrorKind::MalformedInput);
        }
    }

    mod test_descriptor {
        use super::*;

        #[test]
        fn finds_e2e_inside_job_name() {
            assert_eq!(TestDescriptor::from_url(JOB_URL).unwrap().test_name, "e2e-aws-ovn");
        }

        #[test]
        fn keeps_ocp_prefix() {
            let url = "https://example.com/logs/periodic-ocp-e2e-gcp/7";
            assert_eq!(TestDescriptor::from_url(url).unwrap().test_name, "ocp-e2e-gcp");
        }

        #[test]
        fn missing_test_name_is_not_found() {
            let err = TestDescriptor::from_url("https://example.com/logs/unit-tests/1").unwrap_err();
            assert!(matches!(err, ProwLensError::NoTestNameFound(_)));
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    mod step_descriptor {
        use super::*;

        #[test]
        fn strips_test_prefix_into_folder() {
            let name = find_failed_step("INFO Running step\nStep e2e-foo-bar failed after 5m\n").unwrap();
            assert_eq!(name, "e2e-foo-bar");

            let step = StepDescriptor::new(&name, &test_named("e2e-foo")).unwrap();
            assert_eq!(step.step_folder, "bar");
        }

        #[test]
        fn foreign_step_is_a_mismatch() {
            let name = find_failed_step("Step other-thing failed after 5m").unwrap();
            let err = StepDescriptor::new(&name, &test_named("e2e-foo")).unwrap_err();
            assert!(matches!(err, ProwLensError::StepTestMismatch { .. }));
            assert_eq!(err.kind(), ErrorKind::Inconsistent);
        }

        #[test]
        fn first_failed_step_wins() {
            let log = "Step e2e-a-first failed after 1m\nStep e2e-a-second failed after 2m\n";
            assert_eq!(find_failed_step(log).unwrap(), "e2e-a-first");
        }

        #[test]
        fn no_failed_step() {
            let err = find_failed_step("all steps succeeded\n").unwrap_err();
            assert!(matches!(err, ProwLensError::NoStepFailureFound));
        }
    }

    mod urls {
        use super::*;

        fn locator() -> ArtifactLocator {
            ArtifactLocator::new(&StorageConfig {
                build_log_base: "https://storage.example.com/logs/".to_string(),
                artifacts_base: "https://gcsweb.example.com/gcs/logs".to_string(),
            })
        }

        #[test]
        fn builds_build_log_url() {
            let job = JobReference::from_url("https://prow.example.com/view/my-e2e-job/99").unwrap();
            assert_eq!(
                locator().build_log_url(&job),
                "https://storage.example.com/logs/my-e2e-job/99/build-log.txt"
            );
        }

        #[test]
        fn builds_step_urls() {
            let job = JobReference::from_url("https://prow.example.com/view/my-e2e-job/99").unwrap();
            let test = test_named("e2e-job");
            let step = StepDescriptor::new("e2e-job-openshift-e2e-test", &test).unwrap();
            let locator = locator();

            assert_eq!(
                locator.step_log_url(&job, &test, &step),
                "https://gcsweb.example.com/gcs/logs/my-e2e-job/99/artifacts/e2e-job/openshift-e2e-test/build-log.txt"
            );
            assert_eq!(
                locator.junit_dir_url(&job, &test, &step),
                "https://gcsweb.example.com/gcs/logs/my-e2e-job/99/artifacts/e2e-job/openshift-e2e-test/artifacts/junit/"
            );
        }

        #[test]
        fn builds_gather_extra_url() {
            let url = locator()
                .gather_extra_url("https://prow.example.com/view/my-e2e-job/99")
                .unwrap();
            assert_eq!(
                url,
                "https://gcsweb.example.com/gcs/logs/my-e2e-job/99/artifacts/e2e-job/gather-extra/artifacts/"
            );
        }
    }
}
