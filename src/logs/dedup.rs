use std::collections::VecDeque;

use log::debug;

use super::similarity::similarity;

/// Bounded FIFO of the most recently kept lines.
///
/// Only kept lines enter the window; once it holds `capacity` entries the
/// oldest one is evicted on every insert.
#[derive(Debug)]
pub struct DedupWindow<'a> {
    lines: VecDeque<&'a str>,
    capacity: usize,
}

impl<'a> DedupWindow<'a> {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if `line` scores at least `threshold` against any window member.
    pub fn is_near_duplicate(&self, line: &str, threshold: f64) -> bool {
        self.lines
            .iter()
            .any(|prev| similarity(line, prev) >= threshold)
    }

    pub fn push(&mut self, line: &'a str) {
        self.lines.push_back(line);
        if self.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// Offers a line to the window, returning whether it was kept.
    pub fn offer(&mut self, line: &'a str, threshold: f64) -> bool {
        if self.is_near_duplicate(line, threshold) {
            return false;
        }
        self.push(line);
        true
    }
}

/// Removes lines that are near-duplicates of a recently kept line.
///
/// Lines are trimmed first and blank lines are always dropped. Each remaining
/// line is kept only if its similarity to every line in the trailing window of
/// the last `window_size` kept lines is below `threshold`. Order is preserved
/// and every kept line is terminated with `\n`.
pub fn deduplicate(input: &str, threshold: f64, window_size: usize) -> String {
    let mut window = DedupWindow::new(window_size);
    let mut output = String::with_capacity(input.len());
    let mut total = 0usize;
    let mut kept = 0usize;

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        total += 1;
        if window.offer(line, threshold) {
            kept += 1;
            output.push_str(line);
            output.push('\n');
        }
    }

    debug!("Deduplicated {total} lines down to {kept} (threshold {threshold}, window {window_size})");
    output
}
