use thiserror::Error;

/// Coarse classification of pipeline failures.
///
/// Callers use this to decide whether a failure is worth reporting as a bug
/// in the input, a missing artifact, or an upstream outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    NotFound,
    Inconsistent,
    UpstreamFailure,
}

#[derive(Error, Debug)]
pub enum ProwLensError {
    #[error("Invalid job URL: {0}")]
    MalformedUrl(#[from] url::ParseError),

    #[error("Unexpected URL path structure: {0}")]
    UnexpectedPathShape(String),

    #[error("No e2e test name found in URL: {0}")]
    NoTestNameFound(String),

    #[error("No failed step found in build log")]
    NoStepFailureFound,

    #[error("Step {step} does not belong to test {test}")]
    StepTestMismatch { step: String, test: String },

    #[error("No failed jobs found in aggregator log")]
    NoFailedJobsFound,

    #[error("No summary found in log for job {0}")]
    NoSummaryFound(String),

    #[error("Upstream returned {status} for {url}")]
    Upstream { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ProwLensError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedUrl(_)
            | Self::UnexpectedPathShape(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Config(_) => ErrorKind::MalformedInput,
            Self::NoTestNameFound(_)
            | Self::NoStepFailureFound
            | Self::NoFailedJobsFound
            | Self::NoSummaryFound(_) => ErrorKind::NotFound,
            Self::StepTestMismatch { .. } => ErrorKind::Inconsistent,
            Self::Upstream { .. } | Self::Network(_) => ErrorKind::UpstreamFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProwLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_mismatch_is_inconsistent() {
        let err = ProwLensError::StepTestMismatch {
            step: "other-thing".to_string(),
            test: "e2e-foo".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
        assert!(err.to_string().contains("other-thing"));
    }

    #[test]
    fn test_not_found_variants() {
        assert_eq!(ProwLensError::NoStepFailureFound.kind(), ErrorKind::NotFound);
        assert_eq!(ProwLensError::NoFailedJobsFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            ProwLensError::NoSummaryFound("job".into()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_upstream_and_malformed() {
        let upstream = ProwLensError::Upstream {
            status: 404,
            url: "https://example.com".into(),
        };
        assert_eq!(upstream.kind(), ErrorKind::UpstreamFailure);
        assert!(upstream.to_string().contains("404"));

        let parse = url::Url::parse("not a url").unwrap_err();
        assert_eq!(
            ProwLensError::from(parse).kind(),
            ErrorKind::MalformedInput
        );
    }
}
