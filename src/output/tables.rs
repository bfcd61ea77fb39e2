use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};
use indexmap::IndexMap;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn status_cell(failed: bool) -> Cell {
    if failed {
        Cell::new("FAILED").fg(TableColor::Red)
    } else {
        Cell::new("PASSED").fg(TableColor::Green)
    }
}

/// One row per aggregated sub-job with its outcome.
pub fn sub_job_table(jobs: &IndexMap<String, bool>) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Sub-job", "Status"]);
    for (job, failed) in jobs {
        table.add_row(vec![Cell::new(job), status_cell(*failed)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_job_table_lists_every_job() {
        let mut jobs = IndexMap::new();
        jobs.insert("aggregated-aws".to_string(), true);
        jobs.insert("aggregated-gcp".to_string(), false);

        let rendered = sub_job_table(&jobs).to_string();
        assert!(rendered.contains("aggregated-aws"));
        assert!(rendered.contains("aggregated-gcp"));
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("PASSED"));
    }
}
