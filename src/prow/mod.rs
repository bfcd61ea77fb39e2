mod aggregate;
mod analyzer;
mod client;
mod locator;
#[cfg(test)]
mod testing;
mod timeline;

pub use analyzer::{JobAnalysis, JobAnalyzer};
pub use client::HttpFetcher;
pub use timeline::{correlate, Report};
