mod progress;
mod styling;
mod tables;

pub use progress::Spinner;
pub use styling::{bright_yellow, dim, magenta_bold};
pub use tables::sub_job_table;

/// Prints the `ProwLens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔍 ProwLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("OpenShift CI failure log analysis")
    );
}
