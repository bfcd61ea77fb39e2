use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::dedup::deduplicate;
use crate::config::CompactionConfig;

/// How hard compaction squeezes a log.
///
/// Each level maps to a similarity threshold in [`CompactionConfig`]; `Exact`
/// only removes literal duplicates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CompactionLevel {
    Aggressive,
    Moderate,
    Conservative,
    #[default]
    Exact,
}

impl fmt::Display for CompactionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aggressive => "aggressive",
            Self::Moderate => "moderate",
            Self::Conservative => "conservative",
            Self::Exact => "exact",
        };
        f.write_str(name)
    }
}

impl FromStr for CompactionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "moderate" => Ok(Self::Moderate),
            "conservative" => Ok(Self::Conservative),
            "exact" => Ok(Self::Exact),
            other => Err(format!(
                "unknown compaction level '{other}' (expected aggressive, moderate, conservative or exact)"
            )),
        }
    }
}

/// Compacts a log at the threshold configured for `level`.
pub fn compact(input: &str, level: CompactionLevel, config: &CompactionConfig) -> String {
    let threshold = config.threshold(level);
    info!("Compacting log at level {level} (threshold {threshold})");
    compact_with_threshold(input, threshold, config)
}

/// Strips monitored-test status lines, then deduplicates what is left.
///
/// The structural pass only runs when `threshold` is above the configured
/// cutoff. If no block start was seen, the whole input is deduplicated
/// instead.
pub fn compact_with_threshold(input: &str, threshold: f64, config: &CompactionConfig) -> String {
    let filtered = if threshold > config.structural_cutoff {
        strip_status_lines(input, config)
    } else {
        None
    };

    match filtered {
        Some(block) => deduplicate(&block, threshold, config.window_size),
        None => {
            debug!("No monitored-test block found, deduplicating full input");
            deduplicate(input, threshold, config.window_size)
        }
    }
}

/// Keeps non-status lines from the first block-start line onwards.
///
/// Returns `None` only when no block-start line was seen. A block holding
/// nothing but status lines yields an empty string.
fn strip_status_lines(input: &str, config: &CompactionConfig) -> Option<String> {
    let mut in_block = false;
    let mut kept = Vec::new();

    for line in input.lines() {
        if !in_block && line.starts_with(config.block_start_prefix.as_str()) {
            in_block = true;
        }
        if !in_block {
            continue;
        }
        if config
            .status_prefixes
            .iter()
            .any(|prefix| line.starts_with(prefix.as_str()))
        {
            continue;
        }
        kept.push(line);
    }

    if !in_block {
        return None;
    }

    debug!("Structural filter kept {} lines", kept.len());
    let mut block = kept.join("\n");
    block.push('\n');
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONITORED_RUN: &str = "\
setting up cluster
pulling images
started: (0/1/3) \"[sig-network] services should work\"
passed: (2.1s) 2025-06-10T19:10:22 \"[sig-network] services should work\"
started: (0/2/3) \"[sig-storage] volumes should mount\"
skipped: (0.1s) 2025-06-10T19:10:23 \"[sig-storage] volumes should mount\"
started: (0/3/3) \"[sig-node] pods should start\"
fail [k8s.io/kubernetes/test/e2e/node/pods.go:120]: timed out waiting for pod
failed: (5m0s) 2025-06-10T19:15:23 \"[sig-node] pods should start\"
";

    mod level {
        use super::*;

        #[test]
        fn parses_case_insensitively() {
            assert_eq!("Aggressive".parse::<CompactionLevel>().unwrap(), CompactionLevel::Aggressive);
            assert_eq!(" exact ".parse::<CompactionLevel>().unwrap(), CompactionLevel::Exact);
        }

        #[test]
        fn rejects_unknown_names() {
            let err = "extreme".parse::<CompactionLevel>().unwrap_err();
            assert!(err.contains("extreme"));
        }

        #[test]
        fn defaults_to_exact() {
            assert_eq!(CompactionLevel::default(), CompactionLevel::Exact);
            assert_eq!(CompactionLevel::Conservative.to_string(), "conservative");
        }
    }

    mod compaction {
        use super::*;

        #[test]
        fn strips_status_lines_and_preamble() {
            let output = compact(MONITORED_RUN, CompactionLevel::Exact, &CompactionConfig::default());
            assert_eq!(
                output,
                "fail [k8s.io/kubernetes/test/e2e/node/pods.go:120]: timed out waiting for pod\n\
                 failed: (5m0s) 2025-06-10T19:15:23 \"[sig-node] pods should start\"\n"
            );
        }

        #[test]
        fn falls_back_to_full_input_without_block_start() {
            let input = "line one\nline one\nline two\n";
            let output = compact(input, CompactionLevel::Conservative, &CompactionConfig::default());
            assert_eq!(output, "line one\nline two\n");
        }

        #[test]
        fn aggressive_skips_structural_phase() {
            let output = compact(MONITORED_RUN, CompactionLevel::Aggressive, &CompactionConfig::default());
            assert!(output.starts_with("setting up cluster\n"));
        }

        #[test]
        fn block_of_only_status_lines_compacts_to_nothing() {
            let config = CompactionConfig::default();
            assert_eq!(compact("preamble\nstarted: a\npassed: a\n", CompactionLevel::Exact, &config), "");
            assert_eq!(compact("preamble\nstarted: a\n\npassed: a\n", CompactionLevel::Exact, &config), "");
        }

        #[test]
        fn conservative_keeps_at_least_as_much_as_aggressive() {
            let input: String = (0..40)
                .map(|i| format!("I0610 19:10:{:02} reconciling operator etcd generation {i}\n", i % 60))
                .chain(std::iter::once("E0610 19:11:00 etcd member unhealthy: context deadline exceeded\n".to_string()))
                .chain(std::iter::once("W0610 19:11:05 lease renewal took 4.2s\n".to_string()))
                .collect();
            let config = CompactionConfig::default();

            let conservative = compact(&input, CompactionLevel::Conservative, &config);
            let aggressive = compact(&input, CompactionLevel::Aggressive, &config);
            let kept = |s: &str| s.lines().count();
            assert!(
                kept(&conservative) >= kept(&aggressive),
                "conservative kept {} lines, aggressive kept {}",
                kept(&conservative),
                kept(&aggressive)
            );
            assert!(conservative.contains("etcd member unhealthy"));
        }

        #[test]
        fn honors_configured_prefixes() {
            let config = CompactionConfig {
                block_start_prefix: "BEGIN".to_string(),
                status_prefixes: vec!["ok ".to_string()],
                ..CompactionConfig::default()
            };
            let input = "noise\nBEGIN run\nok test-a\nnot ok test-b\n";
            assert_eq!(compact(input, CompactionLevel::Exact, &config), "BEGIN run\nnot ok test-b\n");
        }
    }
}
