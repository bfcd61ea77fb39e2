use log::{debug, warn};

use super::dedup::deduplicate;
use crate::config::{BlockMarkers, CompactionConfig};
use crate::logs::CompactionLevel;

/// Outcome of a block extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The start marker was present; holds the delimited block.
    Found(String),
    /// The start marker was absent; holds the exact-deduplicated full log.
    FallbackCompacted(String),
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Found(text) | Self::FallbackCompacted(text) => text,
        }
    }
}

/// Slices out the block starting at the first line containing `markers.start`.
///
/// The block includes the start line and runs up to, but not including, the
/// next line containing `markers.end`, or to the end of the log if no end
/// marker follows. Without a start marker the whole log is deduplicated at
/// the exact threshold instead.
pub fn extract_block(input: &str, markers: &BlockMarkers, compaction: &CompactionConfig) -> Extraction {
    let mut lines = input.lines();

    let Some(start) = lines.by_ref().find(|line| line.contains(markers.start.as_str())) else {
        warn!("Marker '{}' not found, falling back to exact deduplication", markers.start);
        return Extraction::FallbackCompacted(deduplicate(
            input,
            compaction.threshold(CompactionLevel::Exact),
            compaction.window_size,
        ));
    };

    // The end marker is only honored on lines after the start line, so a
    // start line that also carries the end marker still opens a block.
    let mut block = String::new();
    block.push_str(start);
    block.push('\n');

    for line in lines.take_while(|line| !line.contains(markers.end.as_str())) {
        block.push_str(line);
        block.push('\n');
    }

    debug!(
        "Extracted {} lines after marker '{}'",
        block.lines().count(),
        markers.start
    );
    Extraction::Found(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> BlockMarkers {
        BlockMarkers {
            start: "Failing tests:".to_string(),
            end: "Writing JUnit report to".to_string(),
        }
    }

    fn flaky() -> BlockMarkers {
        BlockMarkers {
            start: "Flaky tests:".to_string(),
            end: "Failing tests:".to_string(),
        }
    }

    const RUN_SUMMARY: &str = "\
started: (0/1/2) \"[sig-node] a\"
passed: (1s) \"[sig-node] a\"
Flaky tests:

[sig-network] services should be reachable [Suite:openshift/conformance]

Failing tests:

[sig-node] pods should start [Suite:openshift/conformance]

Writing JUnit report to /logs/artifacts/junit/junit_e2e.xml
error: 1 fail, 1 pass, 0 skip
";

    #[test]
    fn returns_block_up_to_end_marker() {
        let result = extract_block(RUN_SUMMARY, &failing(), &CompactionConfig::default());
        assert_eq!(
            result,
            Extraction::Found(
                "Failing tests:\n\n[sig-node] pods should start [Suite:openshift/conformance]\n\n".to_string()
            )
        );
        assert!(!result.into_text().contains("Writing JUnit report"));
    }

    #[test]
    fn flaky_block_stops_at_failing_tests() {
        let result = extract_block(RUN_SUMMARY, &flaky(), &CompactionConfig::default());
        assert!(result.is_found());
        let text = result.into_text();
        assert!(text.starts_with("Flaky tests:\n"));
        assert!(text.contains("services should be reachable"));
        assert!(!text.contains("Failing tests:"));
    }

    #[test]
    fn missing_end_marker_runs_to_end_of_log() {
        let input = "noise\nFailing tests:\n[sig-a] one\n[sig-b] two";
        let result = extract_block(input, &failing(), &CompactionConfig::default());
        assert_eq!(
            result,
            Extraction::Found("Failing tests:\n[sig-a] one\n[sig-b] two\n".to_string())
        );
    }

    #[test]
    fn missing_start_marker_falls_back_to_exact_dedup() {
        let input = "step failed\nstep failed\n\nstep failed again\n";
        let result = extract_block(input, &failing(), &CompactionConfig::default());
        assert_eq!(
            result,
            Extraction::FallbackCompacted("step failed\nstep failed again\n".to_string())
        );
        assert!(!result.is_found());
    }

    #[test]
    fn end_marker_on_start_line_is_ignored() {
        let markers = BlockMarkers {
            start: "BEGIN".to_string(),
            end: "END".to_string(),
        };
        let result = extract_block("BEGIN and END\nbody\nEND\ntail", &markers, &CompactionConfig::default());
        assert_eq!(result.into_text(), "BEGIN and END\nbody\n");
    }
}
